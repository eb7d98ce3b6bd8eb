//! Data-access core for the tailor shop app.
//!
//! # Overview
//! Customers, their measurement profiles ("sizes") and orders live on a
//! remote REST service. This crate is everything between the screens and
//! that service: an authenticated JSON client, session-token storage,
//! resource state units that stay in sync with the server, and the sign-in
//! lifecycle.
//!
//! # Design
//! - `ApiClient` is the only thing that talks HTTP. Request building and
//!   response parsing are pure; a `Transport` does the I/O (`UreqTransport`
//!   in production, scripted doubles in tests).
//! - The bearer token is re-read from the `TokenStore` on every call.
//! - `ResourceList<R>` / `ResourceQuery<T>` are generic over the `Resource`
//!   trait and re-fetch after every successful write instead of patching
//!   local state.
//! - `Session` is an explicit service, not a global.

pub mod cancel;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod resource;
pub mod session;
pub mod token;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use client::{decode_data, decode_written, parse_response, ApiClient, RequestOptions};
pub use config::{ClientConfig, AUTH_TOKEN_KEY, DEFAULT_BASE_URL};
pub use endpoints::{Customers, Orders, Resource, Sizes};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use resource::{ListState, QueryState, ResourceList, ResourceQuery};
pub use session::{Navigator, NoopNavigator, Route, Session, SessionState};
pub use token::{
    default_token_store, FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore,
    KEYRING_SERVICE,
};
pub use types::{
    AuthResponse, Customer, CustomerInput, Id, LoginRequest, Measurements, Order, OrderInput,
    OrderLine, OrderLines, OrderStatus, OrderStatusUpdate, RegisterRequest, Size, SizeInput, User,
};
pub use validate::{Validate, ValidationErrors};
