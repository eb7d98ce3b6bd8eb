//! Domain DTOs for the tailor API.
//!
//! # Design
//! Records mirror the backend's JSON field names so they round-trip
//! verbatim. The one place the Rust shape differs from the wire is an
//! order's lines: the server speaks parallel `size_id[]` / `quantity[]`
//! arrays, the client holds `Vec<OrderLine>` and converts at the serde
//! boundary, so the two arrays cannot drift apart.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Id = u64;

/// An authenticated shop user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: Id,
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<Size>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<Order>>,
}

/// Body for creating or fully updating a customer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<&Customer> for CustomerInput {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            phone: customer.phone.clone(),
            email: customer.email.clone(),
            address: customer.address.clone(),
            notes: customer.notes.clone(),
        }
    }
}

/// Body measurements of a size profile. Every field is optional; absent
/// fields are omitted from JSON.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Measurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collar_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chest_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleeve_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuff_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoulder_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shirt_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legs_length: Option<f64>,
}

impl Measurements {
    fn fields(&self) -> [Option<f64>; 8] {
        [
            self.collar_size,
            self.chest_size,
            self.sleeve_length,
            self.cuff_size,
            self.shoulder_size,
            self.waist_size,
            self.shirt_length,
            self.legs_length,
        ]
    }

    /// True when no measurement has been taken.
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(Option::is_none)
    }

    pub fn count(&self) -> usize {
        self.fields().iter().filter(|field| field.is_some()).count()
    }
}

/// A named measurement profile for a customer, scoped to a garment category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Size {
    pub id: Id,
    pub customer_id: Id,
    pub size_name: String,
    pub category: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Box<Customer>>,
}

/// Body for creating or fully updating a size profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SizeInput {
    pub customer_id: Id,
    pub size_name: String,
    pub category: String,
    #[serde(flatten)]
    pub measurements: Measurements,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&Size> for SizeInput {
    fn from(size: &Size) -> Self {
        Self {
            customer_id: size.customer_id,
            size_name: size.size_name.clone(),
            category: size.category.clone(),
            measurements: size.measurements,
            description: size.description.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status: {s}"))
    }
}

/// One line of an order: `quantity` units of the garment measured by
/// `size_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub size_id: Id,
    pub quantity: u32,
}

/// The lines of an order. Serializes as the parallel `size_id` and
/// `quantity` arrays the backend expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LinesWire", into = "LinesWire")]
pub struct OrderLines(Vec<OrderLine>);

#[derive(Serialize, Deserialize)]
struct LinesWire {
    size_id: Vec<Id>,
    quantity: Vec<u32>,
}

impl TryFrom<LinesWire> for OrderLines {
    type Error = String;

    fn try_from(wire: LinesWire) -> Result<Self, Self::Error> {
        OrderLines::from_parallel(wire.size_id, wire.quantity)
    }
}

impl From<OrderLines> for LinesWire {
    fn from(lines: OrderLines) -> Self {
        let (size_id, quantity) = lines.0.iter().map(|line| (line.size_id, line.quantity)).unzip();
        LinesWire { size_id, quantity }
    }
}

impl OrderLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zips the wire arrays. Fails when their lengths differ.
    pub fn from_parallel(size_ids: Vec<Id>, quantities: Vec<u32>) -> Result<Self, String> {
        if size_ids.len() != quantities.len() {
            return Err(format!(
                "size_id has {} entries but quantity has {}",
                size_ids.len(),
                quantities.len()
            ));
        }
        Ok(Self(
            size_ids
                .into_iter()
                .zip(quantities)
                .map(|(size_id, quantity)| OrderLine { size_id, quantity })
                .collect(),
        ))
    }

    /// Adds `quantity` units of `size_id`, merging into an existing line for
    /// the same size.
    pub fn add_line(&mut self, size_id: Id, quantity: u32) {
        match self.0.iter_mut().find(|line| line.size_id == size_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.0.push(OrderLine { size_id, quantity }),
        }
    }

    /// Sets the quantity of an existing line. Returns false if the size is
    /// not part of the order.
    pub fn set_quantity(&mut self, size_id: Id, quantity: u32) -> bool {
        match self.0.iter_mut().find(|line| line.size_id == size_id) {
            Some(line) => {
                line.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn remove_line(&mut self, size_id: Id) -> Option<OrderLine> {
        let index = self.0.iter().position(|line| line.size_id == size_id)?;
        Some(self.0.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderLine> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn size_ids(&self) -> Vec<Id> {
        self.0.iter().map(|line| line.size_id).collect()
    }

    pub fn quantities(&self) -> Vec<u32> {
        self.0.iter().map(|line| line.quantity).collect()
    }

    pub fn total_quantity(&self) -> u64 {
        self.0.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

impl FromIterator<OrderLine> for OrderLines {
    fn from_iter<I: IntoIterator<Item = OrderLine>>(iter: I) -> Self {
        let mut lines = OrderLines::new();
        for line in iter {
            lines.add_line(line.size_id, line.quantity);
        }
        lines
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Id,
    pub customer_id: Id,
    #[serde(flatten)]
    pub lines: OrderLines,
    /// Aggregate price entered by the operator; not derived from the lines.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Box<Customer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<Size>>,
}

/// Body for creating an order, or fully updating one when `status` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderInput {
    pub customer_id: Id,
    #[serde(flatten)]
    pub lines: OrderLines,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
}

impl From<&Order> for OrderInput {
    fn from(order: &Order) -> Self {
        Self {
            customer_id: order.customer_id,
            lines: order.lines.clone(),
            price: order.price,
            status: Some(order.status),
        }
    }
}

/// Body of the status-only PATCH.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Email or phone number.
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response of login and register.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: String,
    pub user: User,
}
