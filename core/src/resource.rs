//! Resource state units: a list with mutations, and a read-only query.
//!
//! # Design
//! The server is the single source of truth. `ResourceList` never patches
//! its items locally: every successful create/update/delete is followed by
//! exactly one full re-fetch, and the list is replaced wholesale. List-fetch
//! failures land in the unit's `error` slot; mutation failures are returned
//! to the caller and leave `error`/`loading` alone.
//!
//! Each unit owns a `CancellationToken` and talks through an `ApiClient`
//! scoped to it. `deactivate` (or drop) cancels the token, after which late
//! responses are discarded instead of written to state.
//!
//! Overlapping fetches are ordered by a generation counter: only the most
//! recently started fetch may write items or clear `loading`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::client::{decode_data, decode_written, ApiClient, RequestOptions};
use crate::endpoints::{Orders, Resource, Sizes};
use crate::error::{message_or, ApiError};
use crate::types::{Id, Order, OrderStatus, Size};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Snapshot of a list unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ListState<T> {
    pub items: Vec<T>,
    /// True only while a list fetch is in flight.
    pub loading: bool,
    /// Message of the last failed list fetch; cleared when a fetch starts.
    pub error: Option<String>,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

/// Live list of one resource plus its mutations.
pub struct ResourceList<R: Resource> {
    client: ApiClient,
    cancel: CancellationToken,
    generation: AtomicU64,
    state: Mutex<ListState<R::Item>>,
}

impl<R: Resource> ResourceList<R> {
    /// Creates an inactive unit; nothing is fetched until `fetch_all`.
    pub fn new(client: &ApiClient) -> Self {
        let cancel = CancellationToken::new();
        Self {
            client: client.scoped(cancel.clone()),
            cancel,
            generation: AtomicU64::new(0),
            state: Mutex::new(ListState::default()),
        }
    }

    /// Creates the unit and runs the initial fetch.
    pub fn activate(client: &ApiClient) -> Self {
        let list = Self::new(client);
        list.fetch_all();
        list
    }

    /// Re-reads the whole collection. Failures are stored, not returned.
    pub fn fetch_all(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }
        debug!(resource = R::PLURAL, generation, "fetching list");
        let result = self.client.list::<R>();

        let mut state = lock(&self.state);
        if self.cancel.is_cancelled() {
            debug!(resource = R::PLURAL, "list unit deactivated, dropping result");
            state.loading = false;
            return;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(resource = R::PLURAL, generation, "superseded by a newer fetch, dropping result");
            return;
        }
        match result {
            Ok(items) => state.items = items,
            Err(err) => {
                state.error = Some(message_or(&err, &format!("Failed to fetch {}", R::PLURAL)));
            }
        }
        state.loading = false;
    }

    pub fn snapshot(&self) -> ListState<R::Item> {
        lock(&self.state).clone()
    }

    pub fn items(&self) -> Vec<R::Item> {
        lock(&self.state).items.clone()
    }

    pub fn loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Creates an item, then refreshes. Returns the created item when the
    /// response carries one; the write itself is judged by status only.
    pub fn create(&self, input: &R::Input) -> Result<Option<R::Item>, ApiError> {
        let value = self
            .client
            .create::<R>(input)
            .map_err(|e| e.for_resource(&mutation_fallback::<R>("create")))?;
        self.fetch_all();
        Ok(decode_written(value, R::SINGULAR))
    }

    pub fn update(&self, id: Id, input: &R::Input) -> Result<Option<R::Item>, ApiError> {
        let value = self
            .client
            .update::<R>(id, input)
            .map_err(|e| e.for_resource(&mutation_fallback::<R>("update")))?;
        self.fetch_all();
        Ok(decode_written(value, R::SINGULAR))
    }

    pub fn delete(&self, id: Id) -> Result<(), ApiError> {
        self.client
            .remove::<R>(id)
            .map_err(|e| e.for_resource(&mutation_fallback::<R>("delete")))?;
        self.fetch_all();
        Ok(())
    }

    /// Handle that deactivates this unit from elsewhere.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stops applying results. Further calls send nothing.
    pub fn deactivate(&self) {
        self.cancel.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}

impl ResourceList<Orders> {
    /// PATCHes only the status, then refreshes the list.
    pub fn update_status(&self, id: Id, status: OrderStatus) -> Result<Option<Order>, ApiError> {
        let value = self
            .client
            .patch_order_status(id, status)
            .map_err(|e| e.for_resource("Failed to update order status"))?;
        self.fetch_all();
        Ok(decode_written(value, Orders::SINGULAR))
    }
}

impl<R: Resource> Drop for ResourceList<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn mutation_fallback<R: Resource>(verb: &str) -> String {
    format!("Failed to {verb} {}", R::SINGULAR)
}

/// Snapshot of a query unit.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
        }
    }
}

/// Read-only fetch keyed by an id: one item, or a customer's sizes.
/// Re-fetches when the id changes.
pub struct ResourceQuery<T> {
    client: ApiClient,
    cancel: CancellationToken,
    path_for: fn(Id) -> String,
    fallback: String,
    id: Mutex<Option<Id>>,
    generation: AtomicU64,
    state: Mutex<QueryState<T>>,
}

impl<T: DeserializeOwned + Clone> ResourceQuery<T> {
    fn activate_with(client: &ApiClient, path_for: fn(Id) -> String, fallback: String, id: Id) -> Self {
        let cancel = CancellationToken::new();
        let query = Self {
            client: client.scoped(cancel.clone()),
            cancel,
            path_for,
            fallback,
            id: Mutex::new(Some(id)),
            generation: AtomicU64::new(0),
            state: Mutex::new(QueryState::default()),
        };
        query.refresh();
        query
    }

    /// Single item of `R` by id.
    pub fn item<R: Resource<Item = T>>(client: &ApiClient, id: Id) -> Self {
        Self::activate_with(
            client,
            R::item_path,
            format!("Failed to fetch {}", R::SINGULAR),
            id,
        )
    }

    /// Fetches for the current id. Failures are stored, not returned.
    pub fn refresh(&self) {
        let Some(id) = *lock(&self.id) else {
            return;
        };
        if self.cancel.is_cancelled() {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = lock(&self.state);
            state.loading = true;
            state.error = None;
        }
        let path = (self.path_for)(id);
        debug!(%path, "fetching");
        let result = self
            .client
            .request(&path, RequestOptions::get())
            .and_then(decode_data::<T>);

        let mut state = lock(&self.state);
        if self.cancel.is_cancelled() {
            debug!(%path, "query deactivated, dropping result");
            state.loading = false;
            return;
        }
        if self.generation.load(Ordering::SeqCst) != generation || *lock(&self.id) != Some(id) {
            debug!(%path, "query moved on, dropping result");
            return;
        }
        match result {
            Ok(value) => state.value = Some(value),
            Err(err) => state.error = Some(message_or(&err, &self.fallback)),
        }
        state.loading = false;
    }

    /// Points the query at `id`; fetches only when it actually changed.
    pub fn set_id(&self, id: Id) {
        {
            let mut current = lock(&self.id);
            if *current == Some(id) {
                return;
            }
            *current = Some(id);
        }
        self.refresh();
    }

    pub fn id(&self) -> Option<Id> {
        *lock(&self.id)
    }

    pub fn snapshot(&self) -> QueryState<T> {
        lock(&self.state).clone()
    }

    pub fn value(&self) -> Option<T> {
        lock(&self.state).value.clone()
    }

    pub fn loading(&self) -> bool {
        lock(&self.state).loading
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    pub fn deactivate(&self) {
        self.cancel.cancel();
    }
}

impl ResourceQuery<Vec<Size>> {
    /// Every size profile of one customer.
    pub fn sizes_by_customer(client: &ApiClient, customer_id: Id) -> Self {
        Self::activate_with(
            client,
            Sizes::by_customer_path,
            "Failed to fetch customer sizes".to_string(),
            customer_id,
        )
    }
}

impl<T> Drop for ResourceQuery<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, OnceLock, Weak};

    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;
    use crate::endpoints::Customers;
    use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
    use crate::testing::{customer_json, json_response, order_json, size_json, ScriptedTransport};
    use crate::token::MemoryTokenStore;
    use crate::types::{Customer, CustomerInput, OrderInput, OrderLines};

    fn client(transport: &Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::new(
            ClientConfig::default().with_base_url("http://localhost:3000/api"),
            transport.clone(),
            Arc::new(MemoryTokenStore::new()),
        )
    }

    fn customers(items: &[(u64, &str)]) -> HttpResponse {
        let data: Vec<_> = items.iter().map(|(id, name)| customer_json(*id, name)).collect();
        json_response(200, json!({"success": true, "data": data}))
    }

    fn amina() -> CustomerInput {
        CustomerInput {
            name: "Amina".to_string(),
            phone: "0700000000".to_string(),
            ..CustomerInput::default()
        }
    }

    #[test]
    fn activation_fetches_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(customers(&[(1, "Amina"), (2, "Baraka")]));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 1);
        let names: Vec<String> = list.items().into_iter().map(|c: Customer| c.name).collect();
        assert_eq!(names, vec!["Amina", "Baraka"]);
        assert!(!list.loading());
        assert_eq!(list.error(), None);
    }

    #[test]
    fn each_successful_mutation_refetches_exactly_once() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(customers(&[]));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        transport.push(json_response(201, json!({"success": true, "data": customer_json(1, "Amina")})));
        transport.push(customers(&[(1, "Amina")]));
        let created = list.create(&amina()).unwrap().unwrap();
        assert_eq!(created.id, 1);
        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 2);
        assert_eq!(list.items().len(), 1);

        transport.push(json_response(200, json!({"success": true, "data": customer_json(1, "Amina K")})));
        transport.push(customers(&[(1, "Amina K")]));
        list.update(1, &amina()).unwrap();
        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 3);
        assert_eq!(list.items()[0].name, "Amina K");

        transport.push(json_response(200, json!({"success": true, "message": "deleted"})));
        transport.push(customers(&[]));
        list.delete(1).unwrap();
        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 4);
        assert!(list.items().is_empty());
    }

    #[test]
    fn accepted_create_without_item_still_refreshes() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(customers(&[]));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        transport.push(json_response(
            201,
            json!({"success": true, "message": "Customer created successfully"}),
        ));
        transport.push(customers(&[(1, "Amina")]));
        assert_eq!(list.create(&amina()).unwrap(), None);
        assert_eq!(transport.count(HttpMethod::Post, "/customer"), 1);
        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 2);
        assert_eq!(list.items().len(), 1);
        assert_eq!(list.error(), None);
    }

    #[test]
    fn status_update_with_bare_ack_is_ok() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!([order_json(7, "pending")])));
        let list = ResourceList::<Orders>::activate(&client(&transport));

        transport.push(json_response(200, json!({"success": true})));
        transport.push(json_response(200, json!([order_json(7, "completed")])));
        assert_eq!(list.update_status(7, OrderStatus::Completed).unwrap(), None);
        assert_eq!(list.items()[0].status, OrderStatus::Completed);
    }

    #[test]
    fn sparse_record_does_not_fail_the_list() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut sparse = customer_json(2, "Baraka");
        sparse["updated_at"] = serde_json::Value::Null;
        sparse.as_object_mut().unwrap().remove("created_at");
        transport.push(json_response(
            200,
            json!({"success": true, "data": [customer_json(1, "Amina"), sparse]}),
        ));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        assert_eq!(list.error(), None);
        assert_eq!(list.items().len(), 2);
        assert_eq!(list.items()[1].created_at, None);
    }

    #[test]
    fn failed_fetch_is_stored_and_cleared_on_next_attempt() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(503, json!({"message": "Service down"})));
        let list = ResourceList::<Customers>::activate(&client(&transport));
        assert_eq!(list.error().as_deref(), Some("Service down"));
        assert!(!list.loading());

        transport.push(customers(&[(3, "Chen")]));
        list.fetch_all();
        assert_eq!(list.error(), None);
        assert_eq!(list.items().len(), 1);
    }

    #[test]
    fn blank_fetch_error_uses_resource_fallback() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_error("");
        let list = ResourceList::<Customers>::activate(&client(&transport));
        assert_eq!(list.error().as_deref(), Some("Failed to fetch customers"));
    }

    #[test]
    fn mutation_failure_leaves_list_state_alone() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(500, json!({})));
        let list = ResourceList::<Customers>::activate(&client(&transport));
        let before = list.snapshot();
        assert_eq!(before.error.as_deref(), Some("HTTP error! status: 500"));

        transport.push(json_response(422, json!({"message": "Phone already taken"})));
        let err = list.create(&amina()).unwrap_err();
        assert_eq!(err.to_string(), "Phone already taken");
        assert_eq!(err.status(), Some(422));
        assert_eq!(list.snapshot(), before);
        assert_eq!(transport.count(HttpMethod::Get, "/customer"), 1);
    }

    #[test]
    fn mutation_failure_does_not_clear_existing_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(500, json!({"message": "boom"})));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        transport.push(json_response(404, json!({})));
        let err = list.delete(9).unwrap_err();
        assert_eq!(err.to_string(), "HTTP error! status: 404");
        assert_eq!(list.error().as_deref(), Some("boom"));
    }

    #[test]
    fn invalid_input_is_wrapped_and_never_sent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(customers(&[]));
        let list = ResourceList::<Customers>::activate(&client(&transport));

        let err = list.create(&CustomerInput::default()).unwrap_err();
        let fields = err.validation_errors().unwrap();
        assert_eq!(fields.get("name"), Some("Name is required"));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn order_status_update_refreshes_orders() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!([order_json(7, "pending")])));
        let list = ResourceList::<Orders>::activate(&client(&transport));

        transport.push(json_response(200, json!({"data": order_json(7, "delivered")})));
        transport.push(json_response(200, json!([order_json(7, "delivered")])));
        let order = list.update_status(7, OrderStatus::Delivered).unwrap().unwrap();

        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(transport.count(HttpMethod::Patch, "/order/7"), 1);
        assert_eq!(transport.count(HttpMethod::Get, "/order"), 2);
        assert_eq!(list.items()[0].status, OrderStatus::Delivered);
    }

    #[test]
    fn order_update_sends_aligned_arrays() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!([order_json(7, "pending")])));
        let list = ResourceList::<Orders>::activate(&client(&transport));

        let mut input = OrderInput::from(&list.items()[0]);
        input.lines.set_quantity(11, 3);
        input.price = Decimal::new(95, 0);
        transport.push(json_response(200, order_json(7, "pending")));
        transport.push(json_response(200, json!([order_json(7, "pending")])));
        list.update(7, &input).unwrap();

        let requests = transport.requests();
        let put = requests.iter().find(|req| req.method == HttpMethod::Put).unwrap();
        let body: serde_json::Value = serde_json::from_str(put.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["size_id"], json!([10, 11]));
        assert_eq!(body["quantity"], json!([2, 3]));
        assert_eq!(body["status"], "pending");
    }

    #[test]
    fn empty_order_lines_fail_validation() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!([])));
        let list = ResourceList::<Orders>::activate(&client(&transport));
        let input = OrderInput {
            customer_id: 1,
            lines: OrderLines::new(),
            price: Decimal::new(10, 0),
            status: None,
        };
        let err = list.create(&input).unwrap_err();
        assert!(err.validation_errors().is_some());
        assert_eq!(err.to_string(), "Please select at least one measurement");
    }

    /// Cancels the list's token while its request is "on the wire".
    struct CancelMidFlight {
        inner: ScriptedTransport,
        target: OnceLock<CancellationToken>,
    }

    impl Transport for CancelMidFlight {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            if let Some(token) = self.target.get() {
                token.cancel();
            }
            self.inner.execute(request)
        }
    }

    #[test]
    fn results_after_deactivation_are_dropped() {
        let transport = Arc::new(CancelMidFlight {
            inner: ScriptedTransport::new(),
            target: OnceLock::new(),
        });
        transport.inner.push(customers(&[(1, "Amina")]));
        let client = ApiClient::new(
            ClientConfig::default().with_base_url("http://localhost:3000/api"),
            transport.clone(),
            Arc::new(MemoryTokenStore::new()),
        );
        let list = ResourceList::<Customers>::new(&client);
        transport.target.set(list.cancel_handle()).unwrap();

        list.fetch_all();
        assert_eq!(transport.inner.requests().len(), 1);
        assert!(list.items().is_empty());
        assert!(!list.loading());
        assert!(!list.is_active());

        list.fetch_all();
        assert_eq!(transport.inner.requests().len(), 1);
    }

    /// Starts a second fetch on the list while the first one is on the wire.
    struct RefetchMidFlight {
        inner: ScriptedTransport,
        list: OnceLock<Weak<ResourceList<Customers>>>,
        fired: AtomicBool,
    }

    impl Transport for RefetchMidFlight {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            let response = self.inner.execute(request);
            if !self.fired.swap(true, Ordering::SeqCst) {
                if let Some(list) = self.list.get().and_then(Weak::upgrade) {
                    list.fetch_all();
                }
            }
            response
        }
    }

    #[test]
    fn older_fetch_never_overwrites_newer_one() {
        let transport = Arc::new(RefetchMidFlight {
            inner: ScriptedTransport::new(),
            list: OnceLock::new(),
            fired: AtomicBool::new(false),
        });
        transport.inner.push(customers(&[(1, "Amina")]));
        transport.inner.push(customers(&[(1, "Amina"), (2, "Baraka")]));
        let client = ApiClient::new(
            ClientConfig::default().with_base_url("http://localhost:3000/api"),
            transport.clone(),
            Arc::new(MemoryTokenStore::new()),
        );
        let list = Arc::new(ResourceList::<Customers>::new(&client));
        transport.list.set(Arc::downgrade(&list)).unwrap();

        list.fetch_all();
        assert_eq!(transport.inner.requests().len(), 2);
        assert_eq!(list.items().len(), 2);
        assert!(!list.loading());
        assert_eq!(list.error(), None);
    }

    #[test]
    fn item_query_refetches_only_on_id_change() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!({"data": customer_json(1, "Amina")})));
        let query = ResourceQuery::item::<Customers>(&client(&transport), 1);
        assert_eq!(query.value().unwrap().name, "Amina");

        query.set_id(1);
        assert_eq!(transport.requests().len(), 1);

        transport.push(json_response(200, customer_json(2, "Baraka")));
        query.set_id(2);
        assert_eq!(query.id(), Some(2));
        assert_eq!(query.value().unwrap().name, "Baraka");
        assert!(transport.requests()[1].url.ends_with("/customer/2"));
    }

    #[test]
    fn item_query_not_found_sets_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(404, json!({"message": "Size not found"})));
        let query = ResourceQuery::item::<Sizes>(&client(&transport), 42);
        assert_eq!(query.error().as_deref(), Some("Size not found"));
        assert!(query.value().is_none());
        assert!(!query.loading());
    }

    #[test]
    fn sizes_by_customer_query() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(json_response(200, json!({"success": true, "data": [size_json(1, 5), size_json(2, 5)]})));
        let query = ResourceQuery::sizes_by_customer(&client(&transport), 5);
        assert_eq!(query.value().unwrap().len(), 2);
        assert!(transport.requests()[0].url.ends_with("/customer/size/getByCustomer/5"));

        transport.push_error("");
        query.refresh();
        assert_eq!(query.error().as_deref(), Some("Failed to fetch customer sizes"));
        assert_eq!(query.value().unwrap().len(), 2);
    }
}
