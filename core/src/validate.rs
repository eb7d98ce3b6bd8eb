//! Client-side input checks.
//!
//! Required-field and format checks run before any request is built, so a
//! failing form never reaches the transport. Errors are keyed by field name
//! for inline display.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use crate::types::{CustomerInput, LoginRequest, OrderInput, RegisterRequest, SizeInput};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("Invalid regex"));

/// Field name to message, in the order the checks ran (form order).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an error. The first message for a field wins.
    pub fn add(&mut self, field: &str, message: &str) {
        if self.get(field).is_none() {
            self.fields.push((field.to_string(), message.to_string()));
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(field, message)| (field.as_str(), message.as_str()))
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (_, message) in &self.fields {
            if !first {
                f.write_str("; ")?;
            }
            f.write_str(message)?;
            first = false;
        }
        Ok(())
    }
}

/// Input that can be checked before it is sent.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

impl Validate for CustomerInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if blank(&self.name) {
            errors.add("name", "Name is required");
        }
        if blank(&self.phone) {
            errors.add("phone", "Phone number is required");
        }
        if let Some(email) = self.email.as_deref().filter(|email| !email.is_empty()) {
            if !is_valid_email(email) {
                errors.add("email", "Email is invalid");
            }
        }
        errors.into_result()
    }
}

impl Validate for SizeInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.customer_id == 0 {
            errors.add("customer_id", "Please select a customer");
        }
        if blank(&self.category) {
            errors.add("category", "Please select a measurement type");
        }
        if blank(&self.size_name) {
            errors.add("size_name", "Please enter a name for this measurement");
        }
        if self.measurements.is_empty() {
            errors.add("measurements", "Please add at least one measurement");
        }
        errors.into_result()
    }
}

impl Validate for OrderInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.customer_id == 0 {
            errors.add("customer_id", "Please select a customer");
        }
        if self.lines.is_empty() {
            errors.add("size_id", "Please select at least one measurement");
        } else if self.lines.iter().any(|line| line.quantity == 0) {
            errors.add("quantity", "Quantity must be at least 1");
        }
        if self.price <= Decimal::ZERO {
            errors.add("price", "Please enter a price for this order");
        }
        errors.into_result()
    }
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if blank(&self.identifier) {
            errors.add("identifier", "Email or phone is required");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()
    }
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if blank(&self.name) {
            errors.add("name", "Name is required");
        }
        if blank(&self.email) {
            errors.add("email", "Email is required");
        } else if !is_valid_email(&self.email) {
            errors.add("email", "Email is invalid");
        }
        if blank(&self.phone) {
            errors.add("phone", "Phone number is required");
        }
        if self.password.is_empty() {
            errors.add("password", "Password is required");
        }
        errors.into_result()
    }
}
