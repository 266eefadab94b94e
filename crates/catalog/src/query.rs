//! Product browse queries: filtering, sorting and paging.
//!
//! The in-memory store evaluates queries with [`ProductQuery::apply`]; the
//! Postgres store translates the same fields into SQL.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use tribal_core::{DomainError, DomainResult, Money, Page, PageRequest, UserId};

use crate::product::normalize_category;
use crate::Product;

const MAX_SEARCH_CHARS: usize = 100;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    /// Lowercased search text.
    pub q: Option<String>,
    pub category: Option<String>,
    pub seller_id: Option<UserId>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub in_stock: bool,
    pub include_inactive: bool,
    pub sort: ProductSort,
}

impl ProductQuery {
    /// Normalise free text and check the price window.
    ///
    /// Blank `q`/`category` are treated as absent.
    pub fn validated(mut self) -> DomainResult<Self> {
        self.q = match self.q.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(q) if q.chars().count() > MAX_SEARCH_CHARS => {
                return Err(DomainError::validation(format!(
                    "search text must be at most {MAX_SEARCH_CHARS} characters"
                )));
            }
            Some(q) => Some(q.to_lowercase()),
        };
        self.category = match self.category.as_deref() {
            Some(c) if c.trim().is_empty() => None,
            Some(c) => Some(normalize_category(c)?),
            None => None,
        };
        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                return Err(DomainError::validation("min_price cannot exceed max_price"));
            }
        }
        Ok(self)
    }

    pub fn matches(&self, product: &Product) -> bool {
        if !self.include_inactive && !product.is_active {
            return false;
        }
        if self.in_stock && product.stock == 0 {
            return false;
        }
        if self.seller_id.is_some_and(|s| s != product.seller_id) {
            return false;
        }
        if self.category.as_deref().is_some_and(|c| c != product.category) {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price > max) {
            return false;
        }
        match &self.q {
            Some(q) => product.matches_text(q),
            None => true,
        }
    }

    /// Ordering for this query's sort key, with id as a stable tiebreaker.
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let primary = match self.sort {
            ProductSort::Newest => b.created_at.cmp(&a.created_at),
            ProductSort::PriceAsc => a.price.cmp(&b.price),
            ProductSort::PriceDesc => b.price.cmp(&a.price),
            ProductSort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        primary.then_with(|| b.id.cmp(&a.id))
    }

    /// Filter, sort and page a product collection.
    pub fn apply<I>(&self, products: I, page: PageRequest) -> Page<Product>
    where
        I: IntoIterator<Item = Product>,
    {
        let mut hits: Vec<Product> = products.into_iter().filter(|p| self.matches(p)).collect();
        hits.sort_by(|a, b| self.compare(a, b));
        page.paginate(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use proptest::prelude::*;

    use crate::NewProduct;

    fn listing(seller: UserId, name: &str, category: &str, paise: u64, stock: u32, age_minutes: i64) -> Product {
        let new = NewProduct {
            name: name.into(),
            description: String::new(),
            category: category.into(),
            price: Money::from_paise(paise),
            stock,
            images: vec![],
            tribe: None,
            region: None,
            material: None,
        };
        Product::create(seller, new, Utc::now() - Duration::minutes(age_minutes)).unwrap()
    }

    fn catalog() -> (UserId, Vec<Product>) {
        let seller = UserId::new();
        let other = UserId::new();
        let mut hidden = listing(seller, "Retired Mask", "masks", 90_000, 1, 50);
        hidden.is_active = false;
        let products = vec![
            listing(seller, "Warli Wall Art", "paintings", 150_000, 4, 30),
            listing(other, "Dokra Horse", "metalwork", 320_000, 0, 20),
            listing(seller, "Bamboo Basket", "baskets", 45_000, 12, 10),
            hidden,
        ];
        (seller, products)
    }

    fn names(page: &Page<Product>) -> Vec<&str> {
        page.items.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn default_query_hides_inactive_and_sorts_newest_first() {
        let (_, products) = catalog();
        let page = ProductQuery::default().apply(products, PageRequest::default());
        assert_eq!(page.total, 3);
        assert_eq!(names(&page), ["Bamboo Basket", "Dokra Horse", "Warli Wall Art"]);
    }

    #[test]
    fn filters_compose() {
        let (seller, products) = catalog();
        let query = ProductQuery {
            seller_id: Some(seller),
            in_stock: true,
            max_price: Some(Money::from_paise(100_000)),
            ..Default::default()
        };
        let page = query.apply(products, PageRequest::default());
        assert_eq!(names(&page), ["Bamboo Basket"]);
    }

    #[test]
    fn owner_listing_includes_inactive() {
        let (seller, products) = catalog();
        let query = ProductQuery {
            seller_id: Some(seller),
            include_inactive: true,
            sort: ProductSort::Name,
            ..Default::default()
        };
        let page = query.apply(products, PageRequest::default());
        assert_eq!(names(&page), ["Bamboo Basket", "Retired Mask", "Warli Wall Art"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let (_, products) = catalog();
        let query = ProductQuery {
            q: Some("  WARLI ".into()),
            ..Default::default()
        }
        .validated()
        .unwrap();
        let page = query.apply(products, PageRequest::default());
        assert_eq!(names(&page), ["Warli Wall Art"]);
    }

    #[test]
    fn category_filter_is_normalised() {
        let (_, products) = catalog();
        let query = ProductQuery {
            category: Some(" MetalWork".into()),
            ..Default::default()
        }
        .validated()
        .unwrap();
        assert_eq!(query.category.as_deref(), Some("metalwork"));
        assert_eq!(query.apply(products, PageRequest::default()).total, 1);
    }

    #[test]
    fn inverted_price_window_is_rejected() {
        let query = ProductQuery {
            min_price: Some(Money::from_paise(500)),
            max_price: Some(Money::from_paise(100)),
            ..Default::default()
        };
        assert!(matches!(query.validated(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn paging_reports_total_matches() {
        let (_, products) = catalog();
        let query = ProductQuery {
            sort: ProductSort::PriceAsc,
            ..Default::default()
        };
        let page = query.apply(products, PageRequest::new(Some(2), Some(2)));
        assert_eq!(page.total, 3);
        assert_eq!(names(&page), ["Dokra Horse"]);
    }

    proptest! {
        #[test]
        fn price_sort_is_monotonic(prices in proptest::collection::vec(1u64..1_000_000, 1..30)) {
            let seller = UserId::new();
            let products: Vec<Product> = prices
                .iter()
                .map(|p| listing(seller, "Item", "misc", *p, 1, 0))
                .collect();
            let query = ProductQuery { sort: ProductSort::PriceDesc, ..Default::default() };
            let page = query.apply(products, PageRequest::new(None, Some(100)));
            prop_assert!(page.items.windows(2).all(|w| w[0].price >= w[1].price));
        }
    }
}
