//! Endpoint paths, relative to the configured base URL.
//!
//! # Design
//! Each backend resource is described once by a `Resource` impl: its item
//! and input types, its display names, and where its collection lives. The
//! generic client operations and `ResourceList` are written against the
//! trait, so customers, sizes and orders share one code path.

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{Customer, CustomerInput, Id, Order, OrderInput, Size, SizeInput};
use crate::validate::Validate;

pub const LOGIN: &str = "user/login";
pub const REGISTER: &str = "user/register";

/// A backend collection with list/detail/create/update/delete endpoints.
pub trait Resource: Send + Sync + 'static {
    type Item: DeserializeOwned + Clone + Debug + Send + Sync;
    type Input: Serialize + Validate + Debug + Sync;

    /// Lowercase name of one item, e.g. "customer".
    const SINGULAR: &'static str;
    /// Lowercase name of the collection, e.g. "customers".
    const PLURAL: &'static str;

    fn collection_path() -> String;

    fn item_path(id: Id) -> String {
        format!("{}/{id}", Self::collection_path())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Customers;

impl Resource for Customers {
    type Item = Customer;
    type Input = CustomerInput;

    const SINGULAR: &'static str = "customer";
    const PLURAL: &'static str = "customers";

    fn collection_path() -> String {
        "customer".to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Sizes;

impl Resource for Sizes {
    type Item = Size;
    type Input = SizeInput;

    const SINGULAR: &'static str = "size";
    const PLURAL: &'static str = "sizes";

    fn collection_path() -> String {
        "customer/size".to_string()
    }
}

impl Sizes {
    pub fn by_customer_path(customer_id: Id) -> String {
        format!("{}/getByCustomer/{customer_id}", Self::collection_path())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Orders;

impl Resource for Orders {
    type Item = Order;
    type Input = OrderInput;

    const SINGULAR: &'static str = "order";
    const PLURAL: &'static str = "orders";

    fn collection_path() -> String {
        "order".to_string()
    }
}

impl Orders {
    /// The status PATCH shares the detail path.
    pub fn status_path(id: Id) -> String {
        Self::item_path(id)
    }
}
