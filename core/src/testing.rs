//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde_json::{json, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};

/// Replays queued responses in order and records every request it sees.
/// An empty queue answers 500 so unexpected calls fail loudly.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(response));
    }

    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded requests with `method` whose URL ends in `suffix`.
    pub fn count(&self, method: HttpMethod, suffix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|req| req.method == method && req.url.ends_with(suffix))
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let next = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ApiError::Transport(message)),
            None => Ok(json_response(500, json!({"message": "unscripted request"}))),
        }
    }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: body.to_string(),
    }
}

pub fn customer_json(id: u64, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "phone": "0700000000",
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    })
}

pub fn size_json(id: u64, customer_id: u64) -> Value {
    json!({
        "id": id,
        "customer_id": customer_id,
        "size_name": "Shirt",
        "category": "shirt",
        "collar_size": 15.5,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    })
}

pub fn order_json(id: u64, status: &str) -> Value {
    json!({
        "id": id,
        "customer_id": 1,
        "size_id": [10, 11],
        "quantity": [2, 1],
        "price": 80.0,
        "status": status,
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-01T10:00:00Z"
    })
}
