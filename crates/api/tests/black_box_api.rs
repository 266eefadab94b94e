use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use secrecy::SecretString;
use serde_json::{json, Value};

use tribal_api::app::{build_app, services::AppServices};
use tribal_auth::{JwtClaims, Role};
use tribal_core::UserId;

const SECRET: &str = "black-box-secret";
const ADMIN_EMAIL: &str = "admin@tribal.test";
const ADMIN_PASSWORD: &str = "admin-password";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over the in-memory store, bound to an ephemeral port.
        let services = AppServices::in_memory(SECRET);
        services
            .ensure_admin(ADMIN_EMAIL, &SecretString::from(ADMIN_PASSWORD.to_string()))
            .await
            .expect("failed to seed admin");
        let app = build_app(Arc::new(services), None);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = self.client.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let res = req.send().await.unwrap();
        let status = res.status();
        let text = res.text().await.unwrap();
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(reqwest::Method::GET, path, token, None).await
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(reqwest::Method::POST, path, token, Some(body)).await
    }

    async fn register(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({"name": name, "email": email, "password": "handloom-2024", "role": role}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        self.post("/api/auth/login", None, json!({"email": email, "password": password}))
            .await
    }

    async fn admin_token(&self) -> String {
        let (status, body) = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_product(&self, token: &str, name: &str, price: u64, stock: u32) -> Value {
        let (status, body) = self
            .post(
                "/api/products",
                Some(token),
                json!({
                    "name": name,
                    "description": "Handmade by artisans of Bastar",
                    "category": "Metalwork",
                    "price": price,
                    "stock": stock,
                    "images": ["https://cdn.example.in/dhokra.jpg"],
                    "tribe": "Gond",
                    "region": "Chhattisgarh"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, role: Role, issued_ago: ChronoDuration, ttl: ChronoDuration) -> String {
    let claims = JwtClaims::new(sub, role, Utc::now() - issued_ago, ttl);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn shipping() -> Value {
    json!({
        "full_name": "Sunita Bhil",
        "phone": "+91 98765 43210",
        "line1": "House 4, Haat Road",
        "city": "Jhabua",
        "state": "Madhya Pradesh",
        "postal_code": "457661"
    })
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let (status, _) = server.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let server = TestServer::spawn().await;

    let (status, body) = server.get("/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = server.get("/api/cart", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let expired = mint_jwt(UserId::new(), Role::Buyer, ChronoDuration::hours(2), ChronoDuration::hours(1));
    let (status, _) = server.get("/api/orders", Some(&expired)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Well-signed but for an account that does not exist.
    let ghost = mint_jwt(UserId::new(), Role::Admin, ChronoDuration::zero(), ChronoDuration::minutes(10));
    let (status, _) = server.get("/api/dashboard/admin", Some(&ghost)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_and_login() {
    let server = TestServer::spawn().await;
    let (token, id) = server.register("Asha Munda", "Asha@Example.in", "buyer").await;

    let (status, me) = server.get("/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id.as_str());
    assert_eq!(me["email"], "asha@example.in");
    assert_eq!(me["role"], "buyer");
    assert!(me.get("password_hash").is_none());

    let (status, body) = server
        .post(
            "/api/auth/register",
            None,
            json!({"name": "Twin", "email": "asha@example.in", "password": "handloom-2024"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "conflict");

    let (status, _) = server
        .post(
            "/api/auth/register",
            None,
            json!({"name": "Sneaky", "email": "root@example.in", "password": "handloom-2024", "role": "admin"}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .post(
            "/api/auth/register",
            None,
            json!({"name": "Shorty", "email": "short@example.in", "password": "abc"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.login("ASHA@example.in", "handloom-2024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], id.as_str());

    let (status, body) = server.login("asha@example.in", "wrong-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");

    let (status, _) = server.login("nobody@example.in", "handloom-2024").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_and_password_updates() {
    let server = TestServer::spawn().await;
    let (token, _) = server.register("Ravi Oraon", "ravi@example.in", "buyer").await;

    let (status, me) = server
        .send(
            reqwest::Method::PUT,
            "/api/users/me",
            Some(&token),
            Some(json!({"name": "Ravi K. Oraon", "phone": "9876543210"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{me}");
    assert_eq!(me["name"], "Ravi K. Oraon");
    assert_eq!(me["phone"], "9876543210");

    let (status, _) = server
        .send(
            reqwest::Method::PUT,
            "/api/users/me/password",
            Some(&token),
            Some(json!({"current_password": "nope-nope", "new_password": "sohrai-mural-9"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .send(
            reqwest::Method::PUT,
            "/api/users/me/password",
            Some(&token),
            Some(json!({"current_password": "handloom-2024", "new_password": "sohrai-mural-9"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(server.login("ravi@example.in", "handloom-2024").await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(server.login("ravi@example.in", "sohrai-mural-9").await.0, StatusCode::OK);
}

#[tokio::test]
async fn creating_a_product_returns_201_with_the_stored_fields() {
    let server = TestServer::spawn().await;
    let (seller, seller_id) = server.register("Kamla Devi", "kamla@example.in", "seller").await;
    let (buyer, _) = server.register("Asha", "asha@example.in", "buyer").await;

    let product = server.create_product(&seller, "Dhokra Horse", 120_000, 4).await;
    assert_eq!(product["name"], "Dhokra Horse");
    assert_eq!(product["category"], "metalwork");
    assert_eq!(product["price"], 120_000);
    assert_eq!(product["stock"], 4);
    assert_eq!(product["seller_id"], seller_id.as_str());
    assert_eq!(product["is_active"], true);
    let id = product["id"].as_str().unwrap();

    let (status, detail) = server.get(&format!("/api/products/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["name"], "Dhokra Horse");
    assert_eq!(detail["rating"]["count"], 0);

    let (status, _) = server
        .post("/api/products", Some(&buyer), json!({"name": "x", "category": "y", "price": 1}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .post("/api/products", None, json!({"name": "x", "category": "y", "price": 1}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .post("/api/products", Some(&seller), json!({"name": " ", "category": "textile", "price": 100}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn invalid_and_unknown_ids_return_404() {
    let server = TestServer::spawn().await;
    let (buyer, _) = server.register("Asha", "asha@example.in", "buyer").await;

    assert_eq!(server.get("/api/products/not-an-id", None).await.0, StatusCode::NOT_FOUND);
    let unknown = uuid::Uuid::now_v7();
    assert_eq!(server.get(&format!("/api/products/{unknown}"), None).await.0, StatusCode::NOT_FOUND);
    assert_eq!(server.get("/api/orders/42", Some(&buyer)).await.0, StatusCode::NOT_FOUND);
    let (status, _) = server
        .post("/api/cart/items", Some(&buyer), json!({"product_id": "bogus"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn browse_filters_and_soft_delete() {
    let server = TestServer::spawn().await;
    let (seller, seller_id) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (other, _) = server.register("Bhola", "bhola@example.in", "seller").await;
    let horse = server.create_product(&seller, "Dhokra Horse", 120_000, 4).await;
    server.create_product(&seller, "Gond Painting", 45_000, 0).await;
    let horse_id = horse["id"].as_str().unwrap();

    let (_, page) = server.get("/api/products?q=dhokra", None).await;
    assert_eq!(page["total"], 1);
    let (_, page) = server.get("/api/products?in_stock=true&sort=price_asc", None).await;
    assert_eq!(page["total"], 1);
    let (_, page) = server.get("/api/products?sort=price_asc", None).await;
    assert_eq!(page["items"][0]["name"], "Gond Painting");
    let (_, page) = server.get(&format!("/api/products?seller_id={seller_id}&limit=1"), None).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 1);
    let (status, _) = server.get("/api/products?min_price=500&max_price=100", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, categories) = server.get("/api/products/categories", None).await;
    assert_eq!(categories, json!(["metalwork"]));

    // Only the owner (or an admin) may delete.
    let (status, _) = server
        .send(reqwest::Method::DELETE, &format!("/api/products/{horse_id}"), Some(&other), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .send(reqwest::Method::DELETE, &format!("/api/products/{horse_id}"), Some(&seller), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert_eq!(server.get(&format!("/api/products/{horse_id}"), None).await.0, StatusCode::NOT_FOUND);
    let (status, owner_view) = server.get(&format!("/api/products/{horse_id}"), Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner_view["is_active"], false);
    let (_, page) = server.get("/api/products?q=dhokra", None).await;
    assert_eq!(page["total"], 0);
    let (_, mine) = server.get("/api/products/mine", Some(&seller)).await;
    assert_eq!(mine["total"], 2);

    let (status, restored) = server
        .send(
            reqwest::Method::PUT,
            &format!("/api/products/{horse_id}"),
            Some(&seller),
            Some(json!({"is_active": true, "price": 110_000})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{restored}");
    assert_eq!(restored["price"], 110_000);
    assert_eq!(server.get(&format!("/api/products/{horse_id}"), None).await.0, StatusCode::OK);
}

#[tokio::test]
async fn cart_checkout_fulfilment_and_reviews() {
    let server = TestServer::spawn().await;
    let (seller, _) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (buyer, buyer_id) = server.register("Asha", "asha@example.in", "buyer").await;
    let product = server.create_product(&seller, "Dhokra Horse", 30_000, 5).await;
    let id = product["id"].as_str().unwrap();

    // Sellers do not shop.
    let (status, _) = server
        .post("/api/cart/items", Some(&seller), json!({"product_id": id}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, cart) = server
        .post("/api/cart/items", Some(&buyer), json!({"product_id": id, "quantity": 2}))
        .await;
    assert_eq!(status, StatusCode::OK, "{cart}");
    assert_eq!(cart["item_count"], 2);
    assert_eq!(cart["subtotal"], 60_000);
    assert_eq!(cart["shipping_fee"], 0);

    let (status, body) = server
        .post("/api/cart/items", Some(&buyer), json!({"product_id": id, "quantity": 4}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, cart) = server
        .send(
            reqwest::Method::PUT,
            &format!("/api/cart/items/{id}"),
            Some(&buyer),
            Some(json!({"quantity": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal"], 30_000);
    assert_eq!(cart["shipping_fee"], 5_000);
    assert_eq!(cart["total"], 35_000);

    let (status, order) = server
        .post(
            "/api/orders",
            Some(&buyer),
            json!({"shipping_address": shipping(), "payment_method": "cash_on_delivery"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total"], 35_000);
    assert_eq!(order["buyer_id"], buyer_id.as_str());
    let order_id = order["id"].as_str().unwrap().to_string();

    let (_, detail) = server.get(&format!("/api/products/{id}"), None).await;
    assert_eq!(detail["stock"], 4);
    let (_, cart) = server.get("/api/cart", Some(&buyer)).await;
    assert_eq!(cart["item_count"], 0);

    let (status, body) = server
        .post(
            "/api/orders",
            Some(&buyer),
            json!({"shipping_address": shipping(), "payment_method": "upi"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let status_path = format!("/api/orders/{order_id}/status");
    let (status, _) = server
        .send(reqwest::Method::PATCH, &status_path, Some(&buyer), Some(json!({"status": "confirmed"})))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = server
        .send(reqwest::Method::PATCH, &status_path, Some(&seller), Some(json!({"status": "delivered"})))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    for next in ["confirmed", "shipped", "delivered"] {
        let (status, body) = server
            .send(reqwest::Method::PATCH, &status_path, Some(&seller), Some(json!({"status": next})))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["status"], next);
    }
    let (_, order) = server.get(&format!("/api/orders/{order_id}"), Some(&buyer)).await;
    assert_eq!(order["is_paid"], true);

    let (_, listed) = server.get("/api/orders?status=delivered", Some(&seller)).await;
    assert_eq!(listed["total"], 1);
    let (_, listed) = server.get("/api/orders?status=pending", Some(&buyer)).await;
    assert_eq!(listed["total"], 0);

    let reviews_path = format!("/api/products/{id}/reviews");
    let (status, review) = server
        .post(&reviews_path, Some(&buyer), json!({"rating": 5, "comment": "Exquisite casting"}))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    assert_eq!(review["verified_purchase"], true);
    assert_eq!(review["author_name"], "Asha");

    let (status, _) = server
        .post(&reviews_path, Some(&buyer), json!({"rating": 4}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = server
        .post(&reviews_path, Some(&seller), json!({"rating": 5}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (other_token, _) = server.register("Meera", "meera@example.in", "buyer").await;
    let (status, body) = server.post(&reviews_path, Some(&other_token), json!({"rating": 3})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["verified_purchase"], false);
    let other_review = body["id"].as_str().unwrap().to_string();

    let (_, list) = server.get(&reviews_path, None).await;
    assert_eq!(list["summary"]["count"], 2);
    assert_eq!(list["summary"]["average"], 4.0);
    assert_eq!(list["reviews"].as_array().unwrap().len(), 2);

    let (status, _) = server
        .send(reqwest::Method::DELETE, &format!("/api/reviews/{other_review}"), Some(&buyer), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = server
        .send(reqwest::Method::DELETE, &format!("/api/reviews/{other_review}"), Some(&other_token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, dash) = server.get("/api/dashboard/seller", Some(&seller)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["revenue"], 30_000);
    assert_eq!(dash["units_sold"], 1);
    let (status, dash) = server.get("/api/dashboard/buyer", Some(&buyer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["order_count"], 1);
    assert_eq!(server.get("/api/dashboard/admin", Some(&buyer)).await.0, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn cancelling_restocks_and_payment_rules() {
    let server = TestServer::spawn().await;
    let (seller, _) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (buyer, _) = server.register("Asha", "asha@example.in", "buyer").await;
    let (stranger, _) = server.register("Meera", "meera@example.in", "buyer").await;
    let product = server.create_product(&seller, "Bamboo Basket", 60_000, 3).await;
    let id = product["id"].as_str().unwrap();

    server
        .post("/api/cart/items", Some(&buyer), json!({"product_id": id, "quantity": 3}))
        .await;
    let (_, order) = server
        .post("/api/orders", Some(&buyer), json!({"shipping_address": shipping(), "payment_method": "card"}))
        .await;
    let order_id = order["id"].as_str().unwrap().to_string();
    assert_eq!(server.get(&format!("/api/products/{id}"), None).await.1["stock"], 0);

    // Orders the caller cannot see read as missing.
    assert_eq!(
        server.get(&format!("/api/orders/{order_id}"), Some(&stranger)).await.0,
        StatusCode::NOT_FOUND
    );

    let pay_path = format!("/api/orders/{order_id}/pay");
    let (status, paid) = server.post(&pay_path, Some(&buyer), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{paid}");
    assert_eq!(paid["is_paid"], true);
    assert_eq!(server.post(&pay_path, Some(&buyer), json!({})).await.0, StatusCode::CONFLICT);

    let cancel_path = format!("/api/orders/{order_id}/cancel");
    // The seller can see the order but only the buyer or an admin may cancel it.
    let (status, body) = server.post(&cancel_path, Some(&seller), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{body}");
    assert_eq!(body["error"], "forbidden");
    assert_eq!(server.get(&format!("/api/products/{id}"), None).await.1["stock"], 0);

    let (status, cancelled) = server.post(&cancel_path, Some(&buyer), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(server.get(&format!("/api/products/{id}"), None).await.1["stock"], 3);

    // A second cancel is an illegal transition and must not restock again.
    assert_eq!(
        server.post(&cancel_path, Some(&buyer), json!({})).await.0,
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(server.get(&format!("/api/products/{id}"), None).await.1["stock"], 3);
}

#[tokio::test]
async fn losing_checkout_keeps_cart_and_stock() {
    let server = TestServer::spawn().await;
    let (seller, _) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (first, _) = server.register("Asha", "asha@example.in", "buyer").await;
    let (second, _) = server.register("Meera", "meera@example.in", "buyer").await;
    let scarce = server.create_product(&seller, "Sabai Grass Tray", 45_000, 1).await;
    let plenty = server.create_product(&seller, "Paitkar Scroll", 70_000, 4).await;
    let (scarce_id, plenty_id) = (scarce["id"].as_str().unwrap(), plenty["id"].as_str().unwrap());

    for buyer in [&first, &second] {
        let (status, body) = server
            .post("/api/cart/items", Some(buyer), json!({"product_id": scarce_id}))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    server
        .post("/api/cart/items", Some(&second), json!({"product_id": plenty_id, "quantity": 2}))
        .await;

    let checkout = json!({"shipping_address": shipping(), "payment_method": "upi"});
    assert_eq!(server.post("/api/orders", Some(&first), checkout.clone()).await.0, StatusCode::CREATED);
    let (status, body) = server.post("/api/orders", Some(&second), checkout).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["error"], "conflict");

    assert_eq!(server.get(&format!("/api/products/{scarce_id}"), None).await.1["stock"], 0);
    assert_eq!(server.get(&format!("/api/products/{plenty_id}"), None).await.1["stock"], 4);
    let (_, cart) = server.get("/api/cart", Some(&second)).await;
    assert_eq!(cart["lines"].as_array().unwrap().len(), 2, "{cart}");
    let (_, orders) = server.get("/api/orders", Some(&second)).await;
    assert_eq!(orders["total"], 0);
}

#[tokio::test]
async fn malformed_input_gets_json_errors() {
    let server = TestServer::spawn().await;
    let (buyer, _) = server.register("Asha", "asha@example.in", "buyer").await;

    let res = server
        .client
        .post(server.url("/api/cart/items"))
        .bearer_auth(&buyer)
        .header("content-type", "application/json")
        .body("{\"product_id\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");
    assert!(body["message"].is_string());

    let (status, body) = server
        .post("/api/cart/items", Some(&buyer), json!({"product_id": 42}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_body");

    let (status, body) = server.get("/api/products?min_price=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_query");
}

#[tokio::test]
async fn wishlist_round_trip() {
    let server = TestServer::spawn().await;
    let (seller, _) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (buyer, _) = server.register("Asha", "asha@example.in", "buyer").await;
    let product = server.create_product(&seller, "Warli Canvas", 80_000, 2).await;
    let id = product["id"].as_str().unwrap();

    let (status, list) = server.post("/api/wishlist", Some(&buyer), json!({"product_id": id})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(list[0]["product"]["id"], id);
    let (status, _) = server.post("/api/wishlist", Some(&buyer), json!({"product_id": id})).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = server.get("/api/wishlist", Some(&buyer)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let path = format!("/api/wishlist/{id}");
    assert_eq!(
        server.send(reqwest::Method::DELETE, &path, Some(&buyer), None).await.0,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        server.send(reqwest::Method::DELETE, &path, Some(&buyer), None).await.0,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn admin_manages_users() {
    let server = TestServer::spawn().await;
    let admin = server.admin_token().await;
    let (buyer, buyer_id) = server.register("Asha", "asha@example.in", "buyer").await;
    server.register("Kamla", "kamla@example.in", "seller").await;

    let (status, page) = server.get("/api/admin/users?role=seller", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(server.get("/api/admin/users", Some(&buyer)).await.0, StatusCode::FORBIDDEN);

    let (status, user) = server
        .send(
            reqwest::Method::PATCH,
            &format!("/api/admin/users/{buyer_id}/role"),
            Some(&admin),
            Some(json!({"role": "seller"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["role"], "seller");
    // Role changes apply to existing tokens immediately.
    assert_eq!(server.get("/api/cart", Some(&buyer)).await.0, StatusCode::FORBIDDEN);

    let (status, user) = server
        .post(&format!("/api/admin/users/{buyer_id}/deactivate"), Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["is_active"], false);
    assert_eq!(server.get("/api/users/me", Some(&buyer)).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(server.login("asha@example.in", "handloom-2024").await.0, StatusCode::UNAUTHORIZED);

    let (status, _) = server
        .post(&format!("/api/admin/users/{buyer_id}/activate"), Some(&admin), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.get("/api/users/me", Some(&buyer)).await.0, StatusCode::OK);

    let (status, dash) = server.get("/api/dashboard/admin", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["users_by_role"]["seller"], 2);
    assert_eq!(dash["users_by_role"]["admin"], 1);
}

#[tokio::test]
async fn chat_relays_messages_over_sse() {
    let server = TestServer::spawn().await;
    let (seller, seller_id) = server.register("Kamla", "kamla@example.in", "seller").await;
    let (buyer, buyer_id) = server.register("Asha", "asha@example.in", "buyer").await;

    let mut stream = server
        .client
        .get(server.url("/api/chat/stream"))
        .bearer_auth(&seller)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    let (status, sent) = server
        .post(
            "/api/chat/messages",
            Some(&buyer),
            json!({"to": seller_id, "body": "Can you make this basket larger?"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{sent}");
    assert_eq!(sent["from"], buyer_id.as_str());

    let mut received = String::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        while !received.contains("basket larger") {
            match stream.chunk().await.unwrap() {
                Some(chunk) => received.push_str(&String::from_utf8_lossy(&chunk)),
                None => break,
            }
        }
    })
    .await;
    assert!(read.is_ok(), "no SSE event within timeout");
    assert!(received.contains("event: message"));

    let (status, history) = server
        .get(&format!("/api/chat/conversations/{buyer_id}"), Some(&seller))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (status, _) = server
        .post(
            "/api/chat/messages",
            Some(&buyer),
            json!({"to": UserId::new().to_string(), "body": "hello?"}),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
