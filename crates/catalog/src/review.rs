//! Product reviews and rating aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribal_auth::Principal;
use tribal_core::{optional_text, DomainError, DomainResult, Entity, ProductId, ReviewId, UserId};

pub const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// Display name captured when the review was written.
    pub author_name: String,
    pub rating: u8,
    pub comment: String,
    /// The author had a delivered order containing the product.
    pub verified_purchase: bool,
    pub created_at: DateTime<Utc>,
}

impl Entity for Review {
    type Id = ReviewId;

    fn id(&self) -> ReviewId {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
}

impl Review {
    pub fn write(
        product_id: ProductId,
        author: UserId,
        author_name: &str,
        new: NewReview,
        verified_purchase: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Review> {
        if !(1..=5).contains(&new.rating) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }
        Ok(Review {
            id: ReviewId::new(),
            product_id,
            user_id: author,
            author_name: author_name.to_string(),
            rating: new.rating,
            comment: optional_text("comment", &new.comment, MAX_COMMENT_CHARS)?,
            verified_purchase,
            created_at: now,
        })
    }

    pub fn ensure_deletable_by(&self, principal: &Principal) -> DomainResult<()> {
        if principal.owns_or_admin(self.user_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden("only the author may delete this review"))
        }
    }
}

/// Aggregate rating for one product.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RatingSummary {
    pub count: u64,
    /// Mean rating rounded to one decimal place; 0 when there are no reviews.
    pub average: f64,
    /// `histogram[i]` counts reviews with `i + 1` stars.
    pub histogram: [u64; 5],
}

impl RatingSummary {
    pub fn from_ratings<I: IntoIterator<Item = u8>>(ratings: I) -> Self {
        let mut histogram = [0u64; 5];
        for rating in ratings {
            if (1..=5).contains(&rating) {
                histogram[usize::from(rating - 1)] += 1;
            }
        }
        let count: u64 = histogram.iter().sum();
        let stars: u64 = histogram
            .iter()
            .zip(1u64..)
            .map(|(n, star)| n * star)
            .sum();
        let average = if count == 0 {
            0.0
        } else {
            ((stars as f64 / count as f64) * 10.0).round() / 10.0
        };
        Self {
            count,
            average,
            histogram,
        }
    }

    pub fn from_reviews<'a, I: IntoIterator<Item = &'a Review>>(reviews: I) -> Self {
        Self::from_ratings(reviews.into_iter().map(|r| r.rating))
    }
}
