//! In-memory stand-in for the tailor backend.
//!
//! Serves the same routes under `/api` with the same JSON shapes: payloads
//! wrapped as `{ success, data, message }`, failures as `{ success: false,
//! message }`, and every customer/size/order route behind a bearer token
//! issued by login or register.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<Size>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Measurements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collar_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chest_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleeve_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuff_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoulder_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waist_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shirt_length: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legs_length: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Size {
    pub id: u64,
    pub customer_id: u64,
    pub size_name: String,
    pub category: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer_id: u64,
    pub size_id: Vec<u64>,
    pub quantity: Vec<u32>,
    pub price: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct LoginInput {
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct SizeInput {
    pub customer_id: u64,
    pub size_name: String,
    pub category: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderInput {
    pub customer_id: u64,
    pub size_id: Vec<u64>,
    pub quantity: Vec<u32>,
    pub price: f64,
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct StatusInput {
    pub status: String,
}

const STATUSES: [&str; 5] = ["pending", "in_progress", "completed", "delivered", "cancelled"];

#[derive(Default)]
pub struct Store {
    next_id: u64,
    users: Vec<(User, String)>,
    tokens: HashMap<String, u64>,
    customers: BTreeMap<u64, Customer>,
    sizes: BTreeMap<u64, Size>,
    orders: BTreeMap<u64, Order>,
}

impl Store {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn issue_token(&mut self, user_id: u64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), user_id);
        token
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error body in the backend's shape.
pub struct Failure(StatusCode, String);

impl Failure {
    fn not_found(what: &str) -> Self {
        Failure(StatusCode::NOT_FOUND, format!("{what} not found"))
    }

    fn invalid(message: impl Into<String>) -> Self {
        Failure(StatusCode::UNPROCESSABLE_ENTITY, message.into())
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({"success": false, "message": self.1}))).into_response()
    }
}

fn ok<T: Serialize>(data: T) -> Json<serde_json::Value> {
    Json(json!({"success": true, "data": data}))
}

fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::CREATED,
        Json(json!({"success": true, "data": data, "message": message})),
    )
}

fn deleted(message: &str) -> Json<serde_json::Value> {
    Json(json!({"success": true, "message": message}))
}

pub fn app() -> Router {
    app_with(Db::default())
}

pub fn app_with(db: Db) -> Router {
    let protected = Router::new()
        .route("/customer", get(list_customers).post(create_customer))
        .route(
            "/customer/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/customer/size", get(list_sizes).post(create_size))
        .route(
            "/customer/size/{id}",
            get(get_size).put(update_size).delete(delete_size),
        )
        .route("/customer/size/getByCustomer/{customer_id}", get(sizes_by_customer))
        .route("/order", get(list_orders).post(create_order))
        .route(
            "/order/{id}",
            get(get_order)
                .put(update_order)
                .patch(update_order_status)
                .delete(delete_order),
        )
        .route_layer(middleware::from_fn_with_state(db.clone(), require_token));

    let api = Router::new()
        .route("/user/login", post(login))
        .route("/user/register", post(register))
        .merge(protected)
        .with_state(db);

    Router::new().nest("/api", api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_token(State(db): State<Db>, request: Request, next: Next) -> Result<Response, Failure> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned);
    let known = match token {
        Some(token) => db.read().await.tokens.contains_key(&token),
        None => false,
    };
    if !known {
        debug!(path = %request.uri().path(), "rejected request without a valid token");
        return Err(Failure(StatusCode::UNAUTHORIZED, "Unauthenticated.".to_string()));
    }
    Ok(next.run(request).await)
}

// --- auth ---

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    if [&input.name, &input.email, &input.phone, &input.password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(Failure::invalid("All fields are required"));
    }
    let mut store = db.write().await;
    if store
        .users
        .iter()
        .any(|(user, _)| user.email == input.email || user.phone == input.phone)
    {
        return Err(Failure::invalid("The email or phone has already been taken."));
    }
    let now = Utc::now();
    let user = User {
        id: store.next_id(),
        name: input.name,
        email: input.email,
        phone: input.phone,
        created_at: now,
        updated_at: now,
    };
    store.users.push((user.clone(), input.password));
    let token = store.issue_token(user.id);
    info!(user_id = user.id, "registered user");
    Ok((StatusCode::CREATED, Json(json!({"token": token, "user": user}))))
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginInput>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    let user = store
        .users
        .iter()
        .find(|(user, password)| {
            (user.email == input.identifier || user.phone == input.identifier)
                && *password == input.password
        })
        .map(|(user, _)| user.clone())
        .ok_or_else(|| Failure(StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;
    let token = store.issue_token(user.id);
    info!(user_id = user.id, "issued session token");
    Ok(Json(json!({"token": token, "user": user})))
}

// --- customers ---

fn check_customer(input: &CustomerInput) -> Result<(), Failure> {
    if input.name.trim().is_empty() {
        return Err(Failure::invalid("The name field is required."));
    }
    if input.phone.trim().is_empty() {
        return Err(Failure::invalid("The phone field is required."));
    }
    Ok(())
}

async fn list_customers(State(db): State<Db>) -> Json<serde_json::Value> {
    let store = db.read().await;
    ok(store.customers.values().cloned().collect::<Vec<_>>())
}

async fn create_customer(
    State(db): State<Db>,
    Json(input): Json<CustomerInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    check_customer(&input)?;
    let mut store = db.write().await;
    let now = Utc::now();
    let customer = Customer {
        id: store.next_id(),
        name: input.name,
        phone: input.phone,
        email: input.email,
        address: input.address,
        notes: input.notes,
        created_at: now,
        updated_at: now,
        sizes: None,
        orders: None,
    };
    store.customers.insert(customer.id, customer.clone());
    Ok(created(customer, "Customer created successfully"))
}

async fn get_customer(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let store = db.read().await;
    let mut customer = store
        .customers
        .get(&id)
        .cloned()
        .ok_or_else(|| Failure::not_found("Customer"))?;
    customer.sizes = Some(store.sizes.values().filter(|s| s.customer_id == id).cloned().collect());
    customer.orders = Some(store.orders.values().filter(|o| o.customer_id == id).cloned().collect());
    Ok(ok(customer))
}

async fn update_customer(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<CustomerInput>,
) -> Result<Json<serde_json::Value>, Failure> {
    check_customer(&input)?;
    let mut store = db.write().await;
    let customer = store
        .customers
        .get_mut(&id)
        .ok_or_else(|| Failure::not_found("Customer"))?;
    customer.name = input.name;
    customer.phone = input.phone;
    customer.email = input.email;
    customer.address = input.address;
    customer.notes = input.notes;
    customer.updated_at = Utc::now();
    Ok(ok(customer.clone()))
}

async fn delete_customer(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    store
        .customers
        .remove(&id)
        .ok_or_else(|| Failure::not_found("Customer"))?;
    store.sizes.retain(|_, size| size.customer_id != id);
    store.orders.retain(|_, order| order.customer_id != id);
    Ok(deleted("Customer deleted successfully"))
}

// --- sizes ---

fn check_size(store: &Store, input: &SizeInput) -> Result<(), Failure> {
    if !store.customers.contains_key(&input.customer_id) {
        return Err(Failure::invalid("The selected customer id is invalid."));
    }
    if input.size_name.trim().is_empty() || input.category.trim().is_empty() {
        return Err(Failure::invalid("The size name and category fields are required."));
    }
    Ok(())
}

async fn list_sizes(State(db): State<Db>) -> Json<serde_json::Value> {
    let store = db.read().await;
    ok(store.sizes.values().cloned().collect::<Vec<_>>())
}

async fn sizes_by_customer(
    State(db): State<Db>,
    Path(customer_id): Path<u64>,
) -> Json<serde_json::Value> {
    let store = db.read().await;
    ok(store
        .sizes
        .values()
        .filter(|size| size.customer_id == customer_id)
        .cloned()
        .collect::<Vec<_>>())
}

async fn create_size(
    State(db): State<Db>,
    Json(input): Json<SizeInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let mut store = db.write().await;
    check_size(&store, &input)?;
    let now = Utc::now();
    let size = Size {
        id: store.next_id(),
        customer_id: input.customer_id,
        size_name: input.size_name,
        category: input.category,
        measurements: input.measurements,
        description: input.description,
        created_at: now,
        updated_at: now,
    };
    store.sizes.insert(size.id, size.clone());
    Ok(created(size, "Size created successfully"))
}

async fn get_size(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let store = db.read().await;
    store
        .sizes
        .get(&id)
        .cloned()
        .map(ok)
        .ok_or_else(|| Failure::not_found("Size"))
}

async fn update_size(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<SizeInput>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    check_size(&store, &input)?;
    let size = store.sizes.get_mut(&id).ok_or_else(|| Failure::not_found("Size"))?;
    size.customer_id = input.customer_id;
    size.size_name = input.size_name;
    size.category = input.category;
    size.measurements = input.measurements;
    size.description = input.description;
    size.updated_at = Utc::now();
    Ok(ok(size.clone()))
}

async fn delete_size(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    store.sizes.remove(&id).ok_or_else(|| Failure::not_found("Size"))?;
    Ok(deleted("Size deleted successfully"))
}

// --- orders ---

fn check_order(store: &Store, input: &OrderInput) -> Result<(), Failure> {
    if !store.customers.contains_key(&input.customer_id) {
        return Err(Failure::invalid("The selected customer id is invalid."));
    }
    if input.size_id.is_empty() || input.size_id.len() != input.quantity.len() {
        return Err(Failure::invalid("size_id and quantity must be non-empty and the same length."));
    }
    if let Some(missing) = input.size_id.iter().find(|id| !store.sizes.contains_key(id)) {
        return Err(Failure::invalid(format!("The selected size id {missing} is invalid.")));
    }
    check_status(input.status.as_deref())
}

fn check_status(status: Option<&str>) -> Result<(), Failure> {
    match status {
        Some(status) if !STATUSES.contains(&status) => {
            Err(Failure::invalid(format!("The selected status {status} is invalid.")))
        }
        _ => Ok(()),
    }
}

async fn list_orders(State(db): State<Db>) -> Json<serde_json::Value> {
    let store = db.read().await;
    ok(store.orders.values().cloned().collect::<Vec<_>>())
}

async fn create_order(
    State(db): State<Db>,
    Json(input): Json<OrderInput>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let mut store = db.write().await;
    check_order(&store, &input)?;
    let now = Utc::now();
    let order = Order {
        id: store.next_id(),
        customer_id: input.customer_id,
        size_id: input.size_id,
        quantity: input.quantity,
        price: input.price,
        status: input.status.unwrap_or_else(|| "pending".to_string()),
        created_at: now,
        updated_at: now,
    };
    store.orders.insert(order.id, order.clone());
    Ok(created(order, "Order created successfully"))
}

async fn get_order(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let store = db.read().await;
    store
        .orders
        .get(&id)
        .cloned()
        .map(ok)
        .ok_or_else(|| Failure::not_found("Order"))
}

async fn update_order(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<OrderInput>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    check_order(&store, &input)?;
    let order = store.orders.get_mut(&id).ok_or_else(|| Failure::not_found("Order"))?;
    order.customer_id = input.customer_id;
    order.size_id = input.size_id;
    order.quantity = input.quantity;
    order.price = input.price;
    if let Some(status) = input.status {
        order.status = status;
    }
    order.updated_at = Utc::now();
    Ok(ok(order.clone()))
}

async fn update_order_status(
    State(db): State<Db>,
    Path(id): Path<u64>,
    Json(input): Json<StatusInput>,
) -> Result<Json<serde_json::Value>, Failure> {
    check_status(Some(&input.status))?;
    let mut store = db.write().await;
    let order = store.orders.get_mut(&id).ok_or_else(|| Failure::not_found("Order"))?;
    order.status = input.status;
    order.updated_at = Utc::now();
    Ok(ok(order.clone()))
}

async fn delete_order(
    State(db): State<Db>,
    Path(id): Path<u64>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut store = db.write().await;
    store.orders.remove(&id).ok_or_else(|| Failure::not_found("Order"))?;
    Ok(deleted("Order deleted successfully"))
}
