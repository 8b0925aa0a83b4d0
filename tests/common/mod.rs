//! Shared harness for the integration tests: an in-memory application
//! wired exactly like `main`, with a recording notification channel in
//! place of the webhook.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storefront_api::{
    admin::{AdminFlow, AdminStateStore},
    chat::Dispatcher,
    checkout::{CheckoutFlow, SessionStore},
    config::AppConfig,
    db,
    errors::ServiceError,
    events::{self, EventSender},
    notifications::{NotificationChannel, OutboundMessage, Recipient},
    services::{
        cart::CartService, catalog::CatalogService, confirmation::ConfirmationService,
        content::ContentService, discounts::DiscountService, orders::OrderService,
        payment_methods::PaymentMethodService,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Client id the harness configures as the operator.
pub const OPERATOR_ID: i64 = 900;

/// Notification channel that captures every message instead of sending it.
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn operator_messages(&self) -> Vec<OutboundMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.recipient == Recipient::Operator)
            .collect()
    }

    pub fn client_messages(&self, client_id: i64) -> Vec<OutboundMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.recipient == Recipient::Client(client_id))
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl NotificationChannel for RecordingNotifier {
    async fn send(&self, message: OutboundMessage) -> Result<(), ServiceError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// A full application over an in-memory SQLite database, plus handles on
/// the individual services for seeding and direct assertions.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub notifier: Arc<RecordingNotifier>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub discounts: Arc<DiscountService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub content: Arc<ContentService>,
    pub orders: Arc<OrderService>,
    pub confirmations: Arc<ConfirmationService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.operator_id = OPERATOR_ID;
        cfg.eur_usd_rate = dec!(1.10);
        // one connection, so every query sees the same in-memory database
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let notifier = RecordingNotifier::new();
        let channel: Arc<dyn NotificationChannel> = notifier.clone();

        let catalog = Arc::new(CatalogService::new(db_arc.clone(), event_sender.clone()));
        let cart = Arc::new(CartService::new(db_arc.clone(), event_sender.clone()));
        let discounts = Arc::new(DiscountService::new(db_arc.clone()));
        let payment_methods = Arc::new(PaymentMethodService::new(db_arc.clone()));
        let content = Arc::new(ContentService::new(db_arc.clone()));
        let orders = Arc::new(OrderService::new(db_arc.clone(), event_sender.clone()));
        let confirmations = Arc::new(ConfirmationService::new(
            db_arc.clone(),
            event_sender.clone(),
            channel.clone(),
            content.clone(),
        ));

        let checkout = Arc::new(CheckoutFlow::new(
            Arc::new(SessionStore::new()),
            catalog.clone(),
            cart.clone(),
            discounts.clone(),
            payment_methods.clone(),
            orders.clone(),
            content.clone(),
            channel,
            event_sender.clone(),
            cfg.eur_usd_rate,
        ));
        let admin = Arc::new(AdminFlow::new(
            Arc::new(AdminStateStore::new()),
            catalog.clone(),
            cart.clone(),
            discounts.clone(),
            payment_methods.clone(),
            content.clone(),
            orders.clone(),
            confirmations.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            cfg.operator_id,
            cfg.eur_usd_rate,
            catalog.clone(),
            cart.clone(),
            content.clone(),
            checkout,
            admin,
        ));

        let state = Arc::new(AppState {
            db: db_arc,
            config: cfg,
            dispatcher,
        });
        let router = storefront_api::app_router(state.clone());

        Self {
            router,
            state,
            notifier,
            catalog,
            cart,
            discounts,
            payment_methods,
            content,
            orders,
            confirmations,
            _event_task: event_task,
        }
    }

    /// Send a GET request against the router.
    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Send a JSON POST request against the router.
    pub async fn post_json(&self, uri: &str, body: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Post a chat event and unwrap the reply envelope down to the
    /// outbound messages.
    pub async fn dispatch(&self, event: Value) -> Vec<Value> {
        let response = self.post_json("/api/v1/chat/events", event).await;
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = response_json(response).await;
        assert_eq!(envelope["success"], json!(true), "envelope: {envelope}");
        envelope["data"]["messages"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    pub async fn send_action(&self, client_id: i64, action: &str) -> Vec<Value> {
        self.dispatch(action_event(client_id, action)).await
    }

    pub async fn send_text(&self, client_id: i64, text: &str) -> Vec<Value> {
        self.dispatch(text_event(client_id, text)).await
    }

    pub async fn send_photo(&self, client_id: i64, file_id: &str) -> Vec<Value> {
        self.dispatch(photo_event(client_id, file_id)).await
    }

    /// Seeds an active product and returns its id.
    pub async fn seed_product(&self, name: &str, price: Decimal, quantity: i32) -> i32 {
        self.catalog
            .create(
                name.to_string(),
                price,
                Some(format!("{} description", name)),
                quantity,
                None,
                None,
                None,
            )
            .await
            .expect("seed product for tests")
    }

    /// Seeds a product carrying images and pickup coordinates.
    pub async fn seed_product_with_media(
        &self,
        name: &str,
        price: Decimal,
        quantity: i32,
        image1: &str,
        image2: Option<&str>,
        coordinates: Option<&str>,
    ) -> i32 {
        self.catalog
            .create(
                name.to_string(),
                price,
                Some(format!("{} description", name)),
                quantity,
                Some(image1.to_string()),
                image2.map(str::to_string),
                coordinates.map(str::to_string),
            )
            .await
            .expect("seed product with media for tests")
    }

    pub async fn seed_payment_method(&self, code: &str, address: &str) {
        self.payment_methods
            .upsert(code, address.to_string(), None)
            .await
            .expect("seed payment method for tests");
    }

    /// Drives a buy-now checkout to completion with no discount and
    /// returns the new order id. Expects a `btc` payment method.
    pub async fn place_pending_order(&self, client_id: i64, product_id: i32) -> String {
        self.send_action(client_id, &format!("buy_now_{}", product_id))
            .await;
        self.send_action(client_id, "no_discount").await;
        self.send_action(client_id, "payment_btc").await;
        self.send_action(client_id, "payment_made").await;
        let screens = self.send_text(client_id, "bc1qsender").await;
        assert!(
            message_text(&screens[0]).starts_with("✅ Notified admin"),
            "order placement did not produce a receipt: {screens:?}"
        );

        let rows = self.orders.pending_rows().await.expect("pending rows");
        rows.iter()
            .filter(|row| row.client_id == client_id)
            .map(|row| row.order_id.clone())
            .next_back()
            .expect("freshly placed order")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Decode a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Button-press event, as the transport adapter would post it.
pub fn action_event(client_id: i64, action: &str) -> Value {
    json!({
        "client_id": client_id,
        "conversation_id": client_id,
        "username": format!("user{}", client_id),
        "first_name": "Test",
        "kind": "action",
        "action": action,
    })
}

/// Free-text message event.
pub fn text_event(client_id: i64, text: &str) -> Value {
    json!({
        "client_id": client_id,
        "conversation_id": client_id,
        "username": format!("user{}", client_id),
        "first_name": "Test",
        "kind": "text",
        "text": text,
    })
}

/// Photo upload event.
pub fn photo_event(client_id: i64, file_id: &str) -> Value {
    json!({
        "client_id": client_id,
        "conversation_id": client_id,
        "username": format!("user{}", client_id),
        "first_name": "Test",
        "kind": "photo",
        "file_id": file_id,
    })
}

/// Text of a serialized outbound message.
pub fn message_text(message: &Value) -> &str {
    message["text"].as_str().unwrap_or_default()
}

/// Every button action of a serialized outbound message, flattened.
pub fn keyboard_actions(message: &Value) -> Vec<String> {
    message["keyboard"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .flat_map(|row| row.as_array().cloned().unwrap_or_default())
                .filter_map(|b| b["action"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
