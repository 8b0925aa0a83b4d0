use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, instrument};

use crate::chat::screen::{self, Screen};
use crate::checkout::discount::{evaluate, DiscountDecision, RejectReason};
use crate::checkout::session::{CheckoutSession, CheckoutStep, LineItem, SessionStore};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::notifications::{NotificationChannel, OutboundMessage};
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::content::ContentService;
use crate::services::discounts::DiscountService;
use crate::services::orders::OrderService;
use crate::services::payment_methods::PaymentMethodService;

/// Drives a buyer's checkout conversation from entry to the committed
/// order.
///
/// Button presses and free text arrive through the dispatcher; every
/// method loads the live session, applies one transition, stores the
/// session back, and returns the screen(s) to show the buyer. No database
/// write happens before the final source-address step, so an abandoned
/// session costs nothing.
pub struct CheckoutFlow {
    sessions: Arc<SessionStore>,
    catalog: Arc<CatalogService>,
    cart: Arc<CartService>,
    discounts: Arc<DiscountService>,
    payment_methods: Arc<PaymentMethodService>,
    orders: Arc<OrderService>,
    content: Arc<ContentService>,
    notifier: Arc<dyn NotificationChannel>,
    event_sender: Arc<EventSender>,
    eur_usd_rate: Decimal,
}

impl CheckoutFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<SessionStore>,
        catalog: Arc<CatalogService>,
        cart: Arc<CartService>,
        discounts: Arc<DiscountService>,
        payment_methods: Arc<PaymentMethodService>,
        orders: Arc<OrderService>,
        content: Arc<ContentService>,
        notifier: Arc<dyn NotificationChannel>,
        event_sender: Arc<EventSender>,
        eur_usd_rate: Decimal,
    ) -> Self {
        Self {
            sessions,
            catalog,
            cart,
            discounts,
            payment_methods,
            orders,
            content,
            notifier,
            event_sender,
            eur_usd_rate,
        }
    }

    /// The step the conversation's live checkout is waiting on, if any.
    /// The dispatcher uses this to decide where free text belongs.
    pub fn active_step(&self, client_id: i64, conversation_id: i64) -> Option<CheckoutStep> {
        self.sessions
            .get(client_id, conversation_id)
            .map(|session| session.step)
    }

    /// Drops any live session for the conversation, e.g. when the buyer
    /// navigates home mid-checkout.
    pub fn abandon(&self, client_id: i64, conversation_id: i64) {
        if self.sessions.remove(client_id, conversation_id).is_some() {
            info!(client_id, "Checkout session abandoned");
        }
    }

    /// Starts a single-product checkout from the product detail screen.
    #[instrument(skip(self, username, first_name))]
    pub async fn start_buy_now(
        &self,
        client_id: i64,
        conversation_id: i64,
        username: Option<String>,
        first_name: String,
        product_id: i32,
    ) -> Result<Screen, ServiceError> {
        let Some(product) = self.catalog.get_active(product_id).await? else {
            return Ok(Screen::new("Product not found!"));
        };

        let item = LineItem {
            product_id: product.id,
            name: product.name,
            price: product.price,
            quantity: 1,
        };
        let session =
            CheckoutSession::buy_now(client_id, conversation_id, username, first_name, item);
        let prompt = screen::discount_prompt(session.total, self.eur_usd_rate);

        info!(client_id, product_id, total = %session.total, "Buy-now checkout started");
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                client_id,
                item_count: 1,
                total: session.total,
            })
            .await;
        self.sessions.put(session);

        Ok(prompt)
    }

    /// Starts a checkout over the whole cart. An empty cart never enters
    /// the machine; the buyer just sees the empty-cart screen.
    #[instrument(skip(self, username, first_name))]
    pub async fn start_cart_checkout(
        &self,
        client_id: i64,
        conversation_id: i64,
        username: Option<String>,
        first_name: String,
    ) -> Result<Screen, ServiceError> {
        let entries = self.cart.entries(client_id).await?;
        if entries.is_empty() {
            return Ok(screen::cart_view(&[], self.eur_usd_rate));
        }

        let items: Vec<LineItem> = entries
            .iter()
            .map(|entry| LineItem {
                product_id: entry.product_id,
                name: entry.name.clone(),
                price: entry.price,
                quantity: entry.quantity,
            })
            .collect();
        let session =
            CheckoutSession::from_cart(client_id, conversation_id, username, first_name, items);
        let prompt = screen::discount_prompt(session.total, self.eur_usd_rate);

        info!(
            client_id,
            lines = session.item_count(),
            total = %session.total,
            "Cart checkout started"
        );
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                client_id,
                item_count: session.item_count(),
                total: session.total,
            })
            .await;
        self.sessions.put(session);

        Ok(prompt)
    }

    /// Validates a typed discount code against the registry. A rejected
    /// code keeps the buyer on the discount step with a corrective
    /// message; a valid one reprices the session and moves it to payment
    /// selection.
    #[instrument(skip(self, code_text))]
    pub async fn submit_discount_code(
        &self,
        client_id: i64,
        conversation_id: i64,
        code_text: &str,
    ) -> Result<Screen, ServiceError> {
        let Some(mut session) = self.sessions.get(client_id, conversation_id) else {
            return self.home_screen().await;
        };

        let today = Utc::now().date_naive();
        match self.discounts.lookup(code_text).await? {
            None => {
                session.mark_discount_rejected();
                self.sessions.put(session);
                Ok(Screen::new(RejectReason::NotFound.user_message()))
            }
            Some(model) => {
                match evaluate(Some(&model), client_id, session.username.as_deref(), today) {
                    DiscountDecision::Invalid(reason) => {
                        session.mark_discount_rejected();
                        self.sessions.put(session);
                        Ok(Screen::new(reason.user_message()))
                    }
                    DiscountDecision::Valid(percentage) => {
                        let original = session.original_total;
                        session.apply_discount(model.code.clone(), percentage);
                        let applied = screen::discount_applied(
                            original,
                            percentage,
                            session.total,
                            self.eur_usd_rate,
                        );

                        info!(client_id, code = %model.code, %percentage, "Discount applied");
                        self.event_sender
                            .send_or_log(Event::DiscountApplied {
                                client_id,
                                code: model.code,
                                percentage,
                            })
                            .await;
                        self.sessions.put(session);

                        Ok(applied)
                    }
                }
            }
        }
    }

    /// Advances to (or returns to) payment selection. Serves the no-code
    /// skip, the continue button after an applied discount, and the back
    /// button on the payment details screen.
    #[instrument(skip(self))]
    pub async fn show_payment_methods(
        &self,
        client_id: i64,
        conversation_id: i64,
    ) -> Result<Screen, ServiceError> {
        let Some(mut session) = self.sessions.get(client_id, conversation_id) else {
            return self.home_screen().await;
        };

        if matches!(
            session.step,
            CheckoutStep::DiscountPrompt | CheckoutStep::DiscountValidation
        ) {
            session.skip_discount();
        } else {
            session.retry_from_payment_selection();
        }

        let methods = self.payment_methods.list().await?;
        let list = screen::payment_method_list(&session, &methods, self.eur_usd_rate);
        self.sessions.put(session);

        Ok(list)
    }

    /// Locks in a currency and shows the receiving address.
    #[instrument(skip(self))]
    pub async fn select_payment_method(
        &self,
        client_id: i64,
        conversation_id: i64,
        currency: &str,
    ) -> Result<Screen, ServiceError> {
        let Some(mut session) = self.sessions.get(client_id, conversation_id) else {
            return self.home_screen().await;
        };
        let Some(method) = self.payment_methods.get(currency).await? else {
            return Ok(Screen::new("Payment method not found!"));
        };

        session.choose_payment_method(method.currency_code.clone(), method.address.clone());
        let details = screen::payment_details(&session, &method, self.eur_usd_rate);
        self.sessions.put(session);

        Ok(details)
    }

    /// Buyer claims the transfer went out; asks for the sending address.
    #[instrument(skip(self))]
    pub async fn payment_made(
        &self,
        client_id: i64,
        conversation_id: i64,
    ) -> Result<Screen, ServiceError> {
        let Some(mut session) = self.sessions.get(client_id, conversation_id) else {
            return self.home_screen().await;
        };

        session.acknowledge_payment();
        self.sessions.put(session);

        Ok(screen::payment_source_prompt())
    }

    /// Final step: commits the order with the captured source address.
    ///
    /// On success the session is gone, the operator gets the confirmation
    /// alert, and the buyer lands back on the home screen. A capacity
    /// failure (stock or discount cap ran out under us) keeps the session
    /// alive at payment selection for a retry.
    #[instrument(skip(self, text))]
    pub async fn submit_source_address(
        &self,
        client_id: i64,
        conversation_id: i64,
        text: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        let Some(session) = self.sessions.get(client_id, conversation_id) else {
            return Ok(vec![self.home_screen().await?]);
        };

        let source = text.trim();
        if source.is_empty() {
            return Ok(vec![screen::payment_source_prompt()]);
        }

        match self.orders.place_order(&session, source).await {
            Ok(placed) => {
                self.sessions.remove(client_id, conversation_id);

                let alert = screen::operator_payment_alert(
                    &session,
                    &placed.order_id,
                    source,
                    placed.placed_at,
                );
                let message = OutboundMessage::to_operator(alert.text).with_keyboard(alert.keyboard);
                if let Err(e) = self.notifier.send(message).await {
                    error!(
                        error = %e,
                        order_id = %placed.order_id,
                        "Failed to deliver operator payment alert"
                    );
                }

                let receipt = screen::order_placed(&placed.order_id, session.total, source);
                let home = self.home_screen().await?;
                Ok(vec![receipt, home])
            }
            Err(ServiceError::CapacityExceeded(reason)) => {
                let mut session = session;
                session.retry_from_payment_selection();
                let methods = self.payment_methods.list().await?;
                let retry = screen::payment_method_list(&session, &methods, self.eur_usd_rate);
                self.sessions.put(session);

                Ok(vec![Screen::new(format!("⚠️ {}.", reason)), retry])
            }
            Err(e) => Err(e),
        }
    }

    async fn home_screen(&self) -> Result<Screen, ServiceError> {
        let welcome = self.content.get("welcome_message").await?;
        Ok(screen::main_menu(&welcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{discount_code, payment_method, product};
    use crate::notifications::Recipient;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, Set};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct RecordingNotifier {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl RecordingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn messages(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl NotificationChannel for RecordingNotifier {
        async fn send(&self, message: OutboundMessage) -> Result<(), ServiceError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    async fn test_db() -> Arc<crate::db::DbPool> {
        let mut opt = sea_orm::ConnectOptions::new("sqlite::memory:".to_string());
        // one connection, so every query sees the same in-memory database
        opt.max_connections(1);
        let db = sea_orm::Database::connect(opt)
            .await
            .expect("in-memory sqlite");
        use sea_orm_migration::MigratorTrait;
        crate::migrator::Migrator::up(&db, None)
            .await
            .expect("migrations");
        Arc::new(db)
    }

    fn flow(db: Arc<crate::db::DbPool>, notifier: Arc<RecordingNotifier>) -> CheckoutFlow {
        let (tx, _rx) = mpsc::channel(16);
        let event_sender = Arc::new(EventSender::new(tx));
        CheckoutFlow::new(
            Arc::new(SessionStore::new()),
            Arc::new(CatalogService::new(db.clone(), event_sender.clone())),
            Arc::new(CartService::new(db.clone(), event_sender.clone())),
            Arc::new(DiscountService::new(db.clone())),
            Arc::new(PaymentMethodService::new(db.clone())),
            Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            Arc::new(ContentService::new(db)),
            notifier,
            event_sender,
            dec!(1.10),
        )
    }

    async fn seed_product(db: &crate::db::DbPool, name: &str, price: Decimal, quantity: i32) -> i32 {
        product::ActiveModel {
            name: Set(name.to_string()),
            price: Set(price),
            quantity: Set(quantity),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed product")
        .id
    }

    async fn seed_btc(db: &crate::db::DbPool) {
        payment_method::ActiveModel {
            currency_code: Set("btc".to_string()),
            address: Set("bc1qshop".to_string()),
            network: Set(Some("Bitcoin".to_string())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed payment method");
    }

    async fn seed_code(db: &crate::db::DbPool, code: &str, percentage: Decimal) {
        discount_code::ActiveModel {
            code: Set(code.to_string()),
            discount_percentage: Set(percentage),
            expiry_date: Set(None),
            max_uses: Set(-1),
            used_count: Set(0),
            is_general: Set(true),
            client_id: Set(None),
            client_username: Set(None),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("seed discount code");
    }

    #[tokio::test]
    async fn buy_now_walks_to_a_committed_order() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db.clone(), notifier.clone());
        let id = seed_product(&db, "Product A", dec!(10.00), 5).await;
        seed_btc(&db).await;

        let prompt = flow
            .start_buy_now(10, 10, Some("alice".to_string()), "Alice".to_string(), id)
            .await
            .unwrap();
        assert!(prompt.text.contains("Do you have a discount code?"));
        assert_eq!(
            flow.active_step(10, 10),
            Some(CheckoutStep::DiscountPrompt)
        );

        let methods = flow.show_payment_methods(10, 10).await.unwrap();
        assert!(methods.text.starts_with("💳 Choose payment method:"));
        assert_eq!(methods.keyboard[0][0].action, "payment_btc");

        let details = flow.select_payment_method(10, 10, "btc").await.unwrap();
        assert!(details.text.contains("SEND PAYMENT TO ADDRESS"));
        assert!(details.text.contains("`bc1qshop`"));

        let source_prompt = flow.payment_made(10, 10).await.unwrap();
        assert!(source_prompt.text.contains("PAYMENT CONFIRMATION"));

        let screens = flow
            .submit_source_address(10, 10, "bc1qbuyer")
            .await
            .unwrap();
        assert_eq!(screens.len(), 2);
        assert!(screens[0].text.starts_with("✅ Notified admin of your payment!"));
        // session is gone once the order is committed
        assert_eq!(flow.active_step(10, 10), None);

        // operator got the confirmation alert with the resolution buttons
        let alerts = notifier.messages();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].recipient, Recipient::Operator);
        assert!(alerts[0].text.starts_with("🔄 PAYMENT AWAITING CONFIRMATION!"));
        assert!(alerts[0].keyboard[0][0].action.starts_with("admin_confirm_"));
    }

    #[tokio::test]
    async fn empty_cart_checkout_never_opens_a_session() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db, notifier);

        let screen = flow
            .start_cart_checkout(10, 10, None, "Alice".to_string())
            .await
            .unwrap();

        assert_eq!(screen.text, "🛒 Your cart is empty!");
        assert_eq!(flow.active_step(10, 10), None);
    }

    #[tokio::test]
    async fn rejected_code_reprompts_and_keeps_the_session() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db.clone(), notifier);
        let id = seed_product(&db, "Product A", dec!(10.00), 5).await;

        flow.start_buy_now(10, 10, None, "Alice".to_string(), id)
            .await
            .unwrap();

        let retry = flow.submit_discount_code(10, 10, "NOPE").await.unwrap();
        assert_eq!(
            retry.text,
            "❌ Invalid discount code. Please try again or press 'No Code':"
        );
        assert!(retry.keyboard.is_empty());
        assert_eq!(
            flow.active_step(10, 10),
            Some(CheckoutStep::DiscountValidation)
        );
    }

    #[tokio::test]
    async fn valid_code_reprices_and_advances() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db.clone(), notifier);
        let id = seed_product(&db, "Product A", dec!(10.00), 5).await;
        seed_code(&db, "SAVE20", dec!(20)).await;

        flow.start_buy_now(10, 10, None, "Alice".to_string(), id)
            .await
            .unwrap();

        // codes are matched case-insensitively
        let applied = flow.submit_discount_code(10, 10, " save20 ").await.unwrap();
        assert!(applied.text.contains("🎫 Discount Applied!"));
        assert!(applied.text.contains("💵 New Total: 8.00€ ($8.80)"));
        assert_eq!(
            flow.active_step(10, 10),
            Some(CheckoutStep::PaymentMethodSelection)
        );
    }

    #[tokio::test]
    async fn capacity_failure_returns_to_payment_selection() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db.clone(), notifier.clone());
        let id = seed_product(&db, "Product A", dec!(10.00), 1).await;
        seed_btc(&db).await;

        flow.start_buy_now(10, 10, None, "Alice".to_string(), id)
            .await
            .unwrap();
        flow.show_payment_methods(10, 10).await.unwrap();
        flow.select_payment_method(10, 10, "btc").await.unwrap();
        flow.payment_made(10, 10).await.unwrap();

        // stock vanishes while the buyer is paying
        product::ActiveModel {
            id: Set(id),
            quantity: Set(0),
            ..Default::default()
        }
        .update(&*db)
        .await
        .unwrap();

        let screens = flow
            .submit_source_address(10, 10, "bc1qbuyer")
            .await
            .unwrap();
        assert_eq!(screens.len(), 2);
        assert!(screens[0].text.contains("Not enough stock left for Product A"));
        assert!(screens[1].text.starts_with("💳 Choose payment method:"));
        assert_eq!(
            flow.active_step(10, 10),
            Some(CheckoutStep::PaymentMethodSelection)
        );
        // no operator alert went out for the failed commit
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn unknown_payment_method_is_reported() {
        let db = test_db().await;
        let notifier = RecordingNotifier::new();
        let flow = flow(db.clone(), notifier);
        let id = seed_product(&db, "Product A", dec!(10.00), 5).await;

        flow.start_buy_now(10, 10, None, "Alice".to_string(), id)
            .await
            .unwrap();
        flow.show_payment_methods(10, 10).await.unwrap();

        let screen = flow.select_payment_method(10, 10, "xrp").await.unwrap();
        assert_eq!(screen.text, "Payment method not found!");
    }
}
