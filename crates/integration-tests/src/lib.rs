//! Integration tests for Mercado Cart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p mercado-cart-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `remote_cart` - `HttpCartRemote` against the mock REST service
//! - `engine_sync` - Engine mutations and login reconciliation end to end
//!
//! The [`MockCartService`] is an in-process `axum` server bound to an
//! ephemeral port. It keeps carts in memory against a small product catalog
//! and answers in the service's JSON shape (including the Spanish field
//! names older deployments send). Like the real service, adding to a line
//! sums quantities without checking stock.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use mercado_cart_sync::RemoteConfig;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A product the mock service knows about.
#[derive(Debug, Clone)]
pub struct MockProduct {
    pub title: String,
    /// Unit price in minor units.
    pub unit_price: i64,
    pub stock: u32,
    pub free_shipping: bool,
}

impl MockProduct {
    #[must_use]
    pub fn new(title: &str, unit_price: i64, stock: u32) -> Self {
        Self {
            title: title.to_string(),
            unit_price,
            stock,
            free_shipping: false,
        }
    }

    #[must_use]
    pub const fn with_free_shipping(mut self) -> Self {
        self.free_shipping = true;
        self
    }
}

#[derive(Debug, Clone)]
struct MockLine {
    id: i64,
    product_id: i64,
    quantity: u32,
}

#[derive(Debug, Default)]
struct MockState {
    catalog: HashMap<i64, MockProduct>,
    carts: HashMap<String, Vec<MockLine>>,
    next_line_id: i64,
    failing: bool,
    rate_limit: Option<u64>,
    token: Option<String>,
    requests: Vec<String>,
}

type Shared = Arc<Mutex<MockState>>;

fn lock(state: &Shared) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory cart service listening on `127.0.0.1`.
pub struct MockCartService {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl Drop for MockCartService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl MockCartService {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Shared::default();
        let app = Router::new()
            .route("/api/cart/{owner}", get(get_cart).delete(clear_cart))
            .route("/api/cart/{owner}/items", post(add_item))
            .route(
                "/api/cart/{owner}/items/{item_id}",
                put(update_item).delete(remove_item),
            )
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|e| panic!("failed to bind mock cart service: {e}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|e| panic!("mock cart service has no address: {e}"));
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    /// Base URL the client should be configured with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Remote configuration pointing at this service.
    ///
    /// # Panics
    ///
    /// Panics if the base URL does not parse, which would be a bug here.
    #[must_use]
    pub fn remote_config(&self, token: Option<&str>) -> RemoteConfig {
        let mut config = RemoteConfig::new(&self.base_url())
            .unwrap_or_else(|e| panic!("mock base URL is invalid: {e}"));
        config.api_token = token.map(|t| SecretString::from(t.to_string()));
        config
    }

    pub fn add_product(&self, product_id: i64, product: MockProduct) {
        lock(&self.state).catalog.insert(product_id, product);
    }

    /// Put `quantity` units of a catalog product straight into `owner`'s cart.
    pub fn seed_line(&self, owner: &str, product_id: i64, quantity: u32) {
        let mut state = lock(&self.state);
        state.next_line_id += 1;
        let id = state.next_line_id;
        state.carts.entry(owner.to_string()).or_default().push(MockLine {
            id,
            product_id,
            quantity,
        });
    }

    /// Make every request answer 503.
    pub fn set_failing(&self, failing: bool) {
        lock(&self.state).failing = failing;
    }

    /// Make every request answer 429 with `Retry-After: secs`.
    pub fn set_rate_limit(&self, secs: Option<u64>) {
        lock(&self.state).rate_limit = secs;
    }

    /// Require `Authorization: Bearer {token}`.
    pub fn require_token(&self, token: &str) {
        lock(&self.state).token = Some(token.to_string());
    }

    /// Units of `product_id` in `owner`'s cart.
    #[must_use]
    pub fn quantity(&self, owner: &str, product_id: i64) -> u32 {
        lock(&self.state)
            .carts
            .get(owner)
            .and_then(|lines| lines.iter().find(|l| l.product_id == product_id))
            .map_or(0, |l| l.quantity)
    }

    /// Product ids in `owner`'s cart, in order.
    #[must_use]
    pub fn product_ids(&self, owner: &str) -> Vec<i64> {
        lock(&self.state)
            .carts
            .get(owner)
            .map(|lines| lines.iter().map(|l| l.product_id).collect())
            .unwrap_or_default()
    }

    /// Every request received, as `"METHOD owner"` lines.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.state).requests.clone()
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddParams {
    product_id: i64,
    #[serde(default = "one")]
    quantity: u32,
}

#[derive(Debug, Deserialize)]
struct QuantityParams {
    quantity: u32,
}

const fn one() -> u32 {
    1
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, message.to_string()).into_response()
}

/// Log the request and apply the failure toggles.
fn admit(state: &mut MockState, headers: &HeaderMap, request: String) -> Result<(), Response> {
    state.requests.push(request);
    if let Some(secs) = state.rate_limit {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, secs.to_string())],
            "slow down",
        )
            .into_response());
    }
    if state.failing {
        return Err(error(StatusCode::SERVICE_UNAVAILABLE, "cart service down"));
    }
    if let Some(token) = &state.token {
        let expected = format!("Bearer {token}");
        let sent = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if sent != Some(expected.as_str()) {
            return Err(error(StatusCode::UNAUTHORIZED, "invalid token"));
        }
    }
    Ok(())
}

/// Snapshot in the service's JSON shape.
fn snapshot(state: &MockState, owner: &str) -> Value {
    let lines = state.carts.get(owner).cloned().unwrap_or_default();
    let items: Vec<Value> = lines
        .iter()
        .filter_map(|line| {
            let product = state.catalog.get(&line.product_id)?;
            Some(json!({
                "id": line.id,
                "productoId": line.product_id,
                "title": product.title,
                "imageUrl": format!("https://img.example.com/{}.jpg", line.product_id),
                "unitPrice": product.unit_price,
                "quantity": line.quantity,
                "stock": product.stock,
                "freeShipping": product.free_shipping,
                "sellerNickname": "MERCADO_OFICIAL",
                "sellerReputation": "5_green_platinum",
            }))
        })
        .collect();
    let total_price: i64 = lines
        .iter()
        .filter_map(|l| {
            let product = state.catalog.get(&l.product_id)?;
            Some(product.unit_price * i64::from(l.quantity))
        })
        .sum();
    let total_items: u32 = lines.iter().map(|l| l.quantity).sum();
    let owner_id = owner
        .parse::<i64>()
        .map_or_else(|_| json!(owner), |id| json!(id));

    json!({
        "id": 1,
        "usuarioId": owner_id,
        "items": items,
        "totalPrice": total_price,
        "totalItems": total_items,
        "createdAt": "2024-05-01T10:00:00",
        "updatedAt": "2024-05-01T10:05:00",
    })
}

async fn get_cart(
    State(state): State<Shared>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admit(&mut state, &headers, format!("GET {owner}")) {
        return response;
    }
    Json(snapshot(&state, &owner)).into_response()
}

async fn clear_cart(
    State(state): State<Shared>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admit(&mut state, &headers, format!("CLEAR {owner}")) {
        return response;
    }
    state.carts.remove(&owner);
    StatusCode::NO_CONTENT.into_response()
}

async fn add_item(
    State(state): State<Shared>,
    Path(owner): Path<String>,
    Query(params): Query<AddParams>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    let request = format!("ADD {owner} {} {}", params.product_id, params.quantity);
    if let Err(response) = admit(&mut state, &headers, request) {
        return response;
    }
    if !state.catalog.contains_key(&params.product_id) {
        return error(StatusCode::NOT_FOUND, "Producto no encontrado");
    }

    // Like the real service, adding sums quantities without a stock check

    let existing = state
        .carts
        .get_mut(&owner)
        .and_then(|lines| lines.iter_mut().find(|l| l.product_id == params.product_id));
    if let Some(line) = existing {
        line.quantity = line.quantity.saturating_add(params.quantity);
    } else {
        state.next_line_id += 1;
        let id = state.next_line_id;
        state.carts.entry(owner.clone()).or_default().push(MockLine {
            id,
            product_id: params.product_id,
            quantity: params.quantity,
        });
    }
    Json(snapshot(&state, &owner)).into_response()
}

async fn update_item(
    State(state): State<Shared>,
    Path((owner, item_id)): Path<(String, i64)>,
    Query(params): Query<QuantityParams>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    let request = format!("PUT {owner} {item_id} {}", params.quantity);
    if let Err(response) = admit(&mut state, &headers, request) {
        return response;
    }
    let catalog = state.catalog.clone();
    let line = state
        .carts
        .get_mut(&owner)
        .and_then(|lines| lines.iter_mut().find(|l| l.id == item_id));
    let Some(line) = line else {
        return error(StatusCode::NOT_FOUND, "Item no encontrado");
    };
    let stock = catalog.get(&line.product_id).map_or(u32::MAX, |p| p.stock);
    line.quantity = params.quantity.clamp(1, stock.max(1));
    Json(snapshot(&state, &owner)).into_response()
}

async fn remove_item(
    State(state): State<Shared>,
    Path((owner, item_id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Response {
    let mut state = lock(&state);
    if let Err(response) = admit(&mut state, &headers, format!("DELETE {owner} {item_id}")) {
        return response;
    }
    if let Some(lines) = state.carts.get_mut(&owner) {
        lines.retain(|l| l.id != item_id);
    }
    Json(snapshot(&state, &owner)).into_response()
}
