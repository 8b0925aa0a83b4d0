use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a checkout was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Single product bought straight from its detail screen, quantity 1
    BuyNow,
    /// Everything in the buyer's cart at checkout start
    CartCheckout,
}

/// Snapshot of one purchasable line, frozen when the checkout starts so a
/// later price edit cannot change what the buyer agreed to pay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: i32,
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

impl LineItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// The step a checkout conversation is waiting on. A session always sits in
/// exactly one of these; browsing with no session is the implicit idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutStep {
    /// "Do you have a discount code?" shown, waiting for a code or a skip
    DiscountPrompt,
    /// A code was rejected; waiting for another attempt or a skip
    DiscountValidation,
    /// Currency buttons shown
    PaymentMethodSelection,
    /// Payment details shown, waiting for the payment-made acknowledgement
    PaymentSubmission,
    /// Waiting for the free-text payment source address
    SourceCapture,
}

/// In-progress purchase state for one conversation. Ephemeral: lives only in
/// memory and is discarded on completion or abandonment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub client_id: i64,
    pub conversation_id: i64,
    pub username: Option<String>,
    pub first_name: String,

    pub kind: OrderKind,
    pub step: CheckoutStep,
    pub items: Vec<LineItem>,

    /// Total before any discount
    pub original_total: Decimal,
    /// Total the buyer owes right now
    pub total: Decimal,

    pub discount_code: Option<String>,
    pub discount_percentage: Option<Decimal>,

    pub payment_currency: Option<String>,
    pub payment_address: Option<String>,

    pub started_at: DateTime<Utc>,
}

impl CheckoutSession {
    fn seeded(
        client_id: i64,
        conversation_id: i64,
        username: Option<String>,
        first_name: String,
        kind: OrderKind,
        items: Vec<LineItem>,
    ) -> Self {
        let total: Decimal = items.iter().map(LineItem::line_total).sum();
        Self {
            client_id,
            conversation_id,
            username,
            first_name,
            kind,
            step: CheckoutStep::DiscountPrompt,
            items,
            original_total: total,
            total,
            discount_code: None,
            discount_percentage: None,
            payment_currency: None,
            payment_address: None,
            started_at: Utc::now(),
        }
    }

    /// Seeds a session with a single line of quantity 1.
    pub fn buy_now(
        client_id: i64,
        conversation_id: i64,
        username: Option<String>,
        first_name: String,
        item: LineItem,
    ) -> Self {
        Self::seeded(
            client_id,
            conversation_id,
            username,
            first_name,
            OrderKind::BuyNow,
            vec![item],
        )
    }

    /// Seeds a session from a cart snapshot.
    pub fn from_cart(
        client_id: i64,
        conversation_id: i64,
        username: Option<String>,
        first_name: String,
        items: Vec<LineItem>,
    ) -> Self {
        Self::seeded(
            client_id,
            conversation_id,
            username,
            first_name,
            OrderKind::CartCheckout,
            items,
        )
    }

    /// Name recorded on order rows: the handle if present, else first name.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.first_name)
    }

    /// A rejected code keeps the buyer on the discount step for a retry.
    pub fn mark_discount_rejected(&mut self) {
        self.step = CheckoutStep::DiscountValidation;
    }

    /// Applies a validated discount and advances to payment selection.
    pub fn apply_discount(&mut self, code: String, percentage: Decimal) {
        self.total = self.original_total * (Decimal::ONE - percentage / Decimal::ONE_HUNDRED);
        self.discount_code = Some(code);
        self.discount_percentage = Some(percentage);
        self.step = CheckoutStep::PaymentMethodSelection;
    }

    /// Skips the discount step, leaving the total unchanged.
    pub fn skip_discount(&mut self) {
        self.step = CheckoutStep::PaymentMethodSelection;
    }

    /// Records the chosen currency and its receiving address.
    pub fn choose_payment_method(&mut self, currency: String, address: String) {
        self.payment_currency = Some(currency);
        self.payment_address = Some(address);
        self.step = CheckoutStep::PaymentSubmission;
    }

    /// Buyer pressed the payment-made acknowledgement.
    pub fn acknowledge_payment(&mut self) {
        self.step = CheckoutStep::SourceCapture;
    }

    /// Returns to payment selection after a commit-time capacity failure so
    /// the buyer can retry without restarting the whole checkout.
    pub fn retry_from_payment_selection(&mut self) {
        self.step = CheckoutStep::PaymentMethodSelection;
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

/// Live checkout sessions keyed by (client, conversation). The transport
/// serializes events within one conversation, so clone-mutate-put is safe.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<(i64, i64), CheckoutSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, client_id: i64, conversation_id: i64) -> Option<CheckoutSession> {
        self.sessions
            .get(&(client_id, conversation_id))
            .map(|entry| entry.value().clone())
    }

    pub fn put(&self, session: CheckoutSession) {
        self.sessions
            .insert((session.client_id, session.conversation_id), session);
    }

    pub fn remove(&self, client_id: i64, conversation_id: i64) -> Option<CheckoutSession> {
        self.sessions
            .remove(&(client_id, conversation_id))
            .map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
