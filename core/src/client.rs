//! The single chokepoint for HTTP calls to the tailor backend.
//!
//! # Design
//! `ApiClient` is cheap to clone and shares its transport and token store.
//! Every call is split the same way: `build_request` (pure) produces an
//! `HttpRequest`, the `Transport` executes it, and `parse_response` (pure)
//! turns the `HttpResponse` into JSON or a normalized `ApiError`. The bearer
//! token is read from the `TokenStore` on every call and never cached, so a
//! login or logout is visible to the very next request.
//!
//! The per-resource operations are thin path/body builders over `request`.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::config::ClientConfig;
use crate::endpoints::{self, Customers, Orders, Resource, Sizes};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::token::TokenStore;
use crate::types::{
    AuthResponse, Customer, CustomerInput, Id, LoginRequest, Order, OrderInput, OrderStatus,
    OrderStatusUpdate, RegisterRequest, Size, SizeInput,
};
use crate::validate::Validate;

/// Per-call options for `ApiClient::request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: HttpMethod,
    /// Serialized JSON body.
    pub body: Option<String>,
    /// Extra headers; these override the defaults by name.
    pub headers: Vec<(String, String)>,
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn delete() -> Self {
        Self {
            method: HttpMethod::Delete,
            ..Self::default()
        }
    }

    pub fn json<T: Serialize + ?Sized>(method: HttpMethod, body: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(Self {
            method,
            body: Some(body),
            ..Self::default()
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Authenticated JSON client for the tailor API.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    tokens: Arc<dyn TokenStore>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("scoped", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            tokens,
            cancel: None,
        }
    }

    /// Client over a blocking `ureq` transport using `config.timeout`.
    pub fn with_ureq(config: ClientConfig, tokens: Arc<dyn TokenStore>) -> Self {
        let transport = Arc::new(UreqTransport::new(config.timeout));
        Self::new(config, transport, tokens)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// A clone whose requests all observe `token`.
    pub fn scoped(&self, token: CancellationToken) -> Self {
        Self {
            cancel: Some(token),
            ..self.clone()
        }
    }

    /// The persisted session token, if any.
    pub fn stored_token(&self) -> Result<Option<String>, ApiError> {
        self.tokens.get(&self.config.token_key)
    }

    /// Builds the full request for `endpoint`. Pure: no I/O.
    pub fn build_request(&self, endpoint: &str, options: &RequestOptions, token: Option<&str>) -> HttpRequest {
        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ];
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        for (name, value) in &options.headers {
            match headers.iter_mut().find(|(key, _)| key.eq_ignore_ascii_case(name)) {
                Some(existing) => existing.1 = value.clone(),
                None => headers.push((name.clone(), value.clone())),
            }
        }
        HttpRequest {
            method: options.method,
            url: self.config.url_for(endpoint),
            headers,
            body: options.body.clone(),
        }
    }

    /// Issues one call and returns the parsed JSON body.
    pub fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value, ApiError> {
        let cancel = options.cancel.clone().or_else(|| self.cancel.clone());
        let token = self.stored_token()?;
        let request = self.build_request(endpoint, &options, token.as_deref());

        ensure_live(cancel.as_ref())?;
        debug!(
            method = %request.method,
            url = %request.url,
            authenticated = token.is_some(),
            "sending request"
        );
        let response = self.transport.execute(&request).inspect_err(|e| {
            warn!(method = %request.method, url = %request.url, error = %e, "request failed");
        })?;
        ensure_live(cancel.as_ref())?;

        parse_response(response).inspect_err(|e| {
            if let ApiError::Http { status, message } = e {
                warn!(method = %request.method, url = %request.url, status, %message, "request rejected");
            }
        })
    }

    // -----------------------------------------------------------------------
    // Generic resource operations
    // -----------------------------------------------------------------------

    pub fn list<R: Resource>(&self) -> Result<Vec<R::Item>, ApiError> {
        decode_data(self.request(&R::collection_path(), RequestOptions::get())?)
    }

    pub fn fetch<R: Resource>(&self, id: Id) -> Result<R::Item, ApiError> {
        decode_data(self.request(&R::item_path(id), RequestOptions::get())?)
    }

    /// Validates and POSTs `input`; returns the raw response body.
    pub fn create<R: Resource>(&self, input: &R::Input) -> Result<Value, ApiError> {
        input.validate().map_err(ApiError::Validation)?;
        self.request(&R::collection_path(), RequestOptions::json(HttpMethod::Post, input)?)
    }

    /// Validates and PUTs `input`; returns the raw response body.
    pub fn update<R: Resource>(&self, id: Id, input: &R::Input) -> Result<Value, ApiError> {
        input.validate().map_err(ApiError::Validation)?;
        self.request(&R::item_path(id), RequestOptions::json(HttpMethod::Put, input)?)
    }

    pub fn remove<R: Resource>(&self, id: Id) -> Result<(), ApiError> {
        self.request(&R::item_path(id), RequestOptions::delete())?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Session
    // -----------------------------------------------------------------------

    /// Logs in and persists the returned token. Nothing is written on failure.
    pub fn login(&self, identifier: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = LoginRequest {
            identifier: identifier.to_string(),
            password: password.to_string(),
        };
        body.validate().map_err(ApiError::Validation)?;
        let value = self.request(endpoints::LOGIN, RequestOptions::json(HttpMethod::Post, &body)?)?;
        self.store_session(value)
    }

    /// Registers and persists the returned token. Nothing is written on failure.
    pub fn register(&self, body: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        body.validate().map_err(ApiError::Validation)?;
        let value = self.request(endpoints::REGISTER, RequestOptions::json(HttpMethod::Post, body)?)?;
        self.store_session(value)
    }

    /// Forgets the persisted token. No request is sent.
    pub fn logout(&self) -> Result<(), ApiError> {
        self.tokens.remove(&self.config.token_key)
    }

    fn store_session(&self, value: Value) -> Result<AuthResponse, ApiError> {
        let auth: AuthResponse = decode_data(value)?;
        if !auth.token.is_empty() {
            self.tokens.set(&self.config.token_key, &auth.token)?;
        }
        Ok(auth)
    }

    // -----------------------------------------------------------------------
    // Customers
    // -----------------------------------------------------------------------

    pub fn get_customers(&self) -> Result<Vec<Customer>, ApiError> {
        self.list::<Customers>()
    }

    pub fn get_customer(&self, id: Id) -> Result<Customer, ApiError> {
        self.fetch::<Customers>(id)
    }

    pub fn create_customer(&self, input: &CustomerInput) -> Result<Option<Customer>, ApiError> {
        Ok(decode_written(self.create::<Customers>(input)?, Customers::SINGULAR))
    }

    pub fn update_customer(&self, id: Id, input: &CustomerInput) -> Result<Option<Customer>, ApiError> {
        Ok(decode_written(self.update::<Customers>(id, input)?, Customers::SINGULAR))
    }

    pub fn delete_customer(&self, id: Id) -> Result<(), ApiError> {
        self.remove::<Customers>(id)
    }

    // -----------------------------------------------------------------------
    // Sizes
    // -----------------------------------------------------------------------

    pub fn get_sizes(&self) -> Result<Vec<Size>, ApiError> {
        self.list::<Sizes>()
    }

    pub fn get_size(&self, id: Id) -> Result<Size, ApiError> {
        self.fetch::<Sizes>(id)
    }

    pub fn get_sizes_by_customer(&self, customer_id: Id) -> Result<Vec<Size>, ApiError> {
        decode_data(self.request(&Sizes::by_customer_path(customer_id), RequestOptions::get())?)
    }

    pub fn create_size(&self, input: &SizeInput) -> Result<Option<Size>, ApiError> {
        Ok(decode_written(self.create::<Sizes>(input)?, Sizes::SINGULAR))
    }

    pub fn update_size(&self, id: Id, input: &SizeInput) -> Result<Option<Size>, ApiError> {
        Ok(decode_written(self.update::<Sizes>(id, input)?, Sizes::SINGULAR))
    }

    pub fn delete_size(&self, id: Id) -> Result<(), ApiError> {
        self.remove::<Sizes>(id)
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    pub fn get_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.list::<Orders>()
    }

    pub fn get_order(&self, id: Id) -> Result<Order, ApiError> {
        self.fetch::<Orders>(id)
    }

    pub fn create_order(&self, input: &OrderInput) -> Result<Option<Order>, ApiError> {
        Ok(decode_written(self.create::<Orders>(input)?, Orders::SINGULAR))
    }

    pub fn update_order(&self, id: Id, input: &OrderInput) -> Result<Option<Order>, ApiError> {
        Ok(decode_written(self.update::<Orders>(id, input)?, Orders::SINGULAR))
    }

    pub fn update_order_status(&self, id: Id, status: OrderStatus) -> Result<Option<Order>, ApiError> {
        Ok(decode_written(self.patch_order_status(id, status)?, Orders::SINGULAR))
    }

    pub(crate) fn patch_order_status(&self, id: Id, status: OrderStatus) -> Result<Value, ApiError> {
        let body = OrderStatusUpdate { status };
        self.request(&Orders::status_path(id), RequestOptions::json(HttpMethod::Patch, &body)?)
    }

    pub fn delete_order(&self, id: Id) -> Result<(), ApiError> {
        self.remove::<Orders>(id)
    }
}

fn ensure_live(cancel: Option<&CancellationToken>) -> Result<(), ApiError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(ApiError::Cancelled),
        _ => Ok(()),
    }
}

/// Maps a response to its JSON body or a normalized error. Pure: no I/O.
///
/// An empty 2xx body (e.g. `204 No Content`) parses as `null`.
pub fn parse_response(response: HttpResponse) -> Result<Value, ApiError> {
    if !response.is_success() {
        return Err(ApiError::from_status(response.status, &response.body));
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// Decodes the item echoed back by a write that already succeeded.
///
/// Success is decided by the status alone; a body that does not carry the
/// item (e.g. `{ success, message }`) yields `None` instead of an error.
pub fn decode_written<T: DeserializeOwned>(value: Value, resource: &str) -> Option<T> {
    match decode_data(value) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!(resource, error = %e, "write accepted but response did not carry the item");
            None
        }
    }
}

/// Decodes a payload that may be wrapped as `{ success, data, message }`.
/// A non-null `data` field wins; otherwise the whole body is decoded.
pub fn decode_data<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    let payload = match value {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) if !data.is_null() => data,
            Some(data) => {
                map.insert("data".to_string(), data);
                Value::Object(map)
            }
            None => Value::Object(map),
        },
        other => other,
    };
    serde_json::from_value(payload).map_err(|e| ApiError::Deserialization(e.to_string()))
}
