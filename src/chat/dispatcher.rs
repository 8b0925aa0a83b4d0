//! Routes inbound chat events to the right flow.
//!
//! The transport adapter posts every button press, text message, and photo
//! here as a [`ChatEvent`]. The dispatcher parses actions into [`Command`]s,
//! enforces the operator guard, decides which conversation a free-text
//! message belongs to, and returns the messages to deliver back.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::admin::AdminFlow;
use crate::chat::command::Command;
use crate::chat::screen::{self, Screen};
use crate::checkout::{CheckoutFlow, CheckoutStep};
use crate::errors::ServiceError;
use crate::notifications::OutboundMessage;
use crate::services::cart::{CartAddOutcome, CartService};
use crate::services::catalog::CatalogService;
use crate::services::content::ContentService;

/// What the buyer (or operator) actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// A keyboard button press, carrying the button's action string.
    Action { action: String },
    /// A free-text message.
    Text { text: String },
    /// An uploaded image, by transport file id.
    Photo { file_id: String },
}

/// One inbound chat event, as posted by the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    pub client_id: i64,
    pub conversation_id: i64,
    #[serde(default)]
    pub username: Option<String>,
    pub first_name: String,
    #[serde(flatten)]
    pub payload: Payload,
}

pub struct Dispatcher {
    operator_id: i64,
    eur_usd_rate: Decimal,
    catalog: Arc<CatalogService>,
    cart: Arc<CartService>,
    content: Arc<ContentService>,
    checkout: Arc<CheckoutFlow>,
    admin: Arc<AdminFlow>,
}

impl Dispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        operator_id: i64,
        eur_usd_rate: Decimal,
        catalog: Arc<CatalogService>,
        cart: Arc<CartService>,
        content: Arc<ContentService>,
        checkout: Arc<CheckoutFlow>,
        admin: Arc<AdminFlow>,
    ) -> Self {
        Self {
            operator_id,
            eur_usd_rate,
            catalog,
            cart,
            content,
            checkout,
            admin,
        }
    }

    /// Handles one inbound event and returns the messages to deliver.
    ///
    /// Every reply is addressed to the sender; messages to third parties
    /// (the payment alert, fulfillment) are sent by the flows themselves
    /// through the notification channel.
    #[instrument(skip(self, event), fields(client_id = event.client_id))]
    pub async fn handle(&self, event: ChatEvent) -> Result<Vec<OutboundMessage>, ServiceError> {
        let screens = match event.payload.clone() {
            Payload::Action { action } => self.handle_action(&event, &action).await?,
            Payload::Text { text } => self.handle_text(&event, &text).await?,
            Payload::Photo { file_id } => self.handle_photo(&event, &file_id).await?,
        };

        Ok(screens
            .into_iter()
            .map(|screen| {
                OutboundMessage::to_client(event.client_id, screen.text)
                    .with_keyboard(screen.keyboard)
            })
            .collect())
    }

    async fn handle_action(
        &self,
        event: &ChatEvent,
        action: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        let command = Command::parse(action);

        if command.requires_operator() && event.client_id != self.operator_id {
            warn!(
                client_id = event.client_id,
                action, "Operator action from a non-operator"
            );
            return Ok(vec![Screen::new("Access denied!")]);
        }

        let screens = match command {
            // Buyer navigation
            Command::MainMenu => {
                self.checkout
                    .abandon(event.client_id, event.conversation_id);
                vec![self.home_screen().await?]
            }
            Command::BrowseProducts => {
                let products = self.catalog.list_available().await?;
                vec![screen::product_list(&products)]
            }
            Command::ViewCart => vec![self.cart_screen(event.client_id).await?],
            Command::About => vec![self.static_page("about_us").await?],
            Command::Contact => vec![self.static_page("contact").await?],
            Command::Rules => vec![self.static_page("rules").await?],
            Command::Faq => vec![self.static_page("faq").await?],
            Command::Website => {
                let url = self.content.get("website").await?;
                vec![screen::website_page(&url)]
            }

            // Catalog and cart
            Command::ShowProduct(product_id) => match self.catalog.get_active(product_id).await? {
                Some(product) => vec![screen::product_detail(&product)],
                None => vec![Screen::new("Product not found!")],
            },
            Command::AddToCart(product_id) => {
                let outcome = self.cart.add(event.client_id, product_id).await?;
                vec![match outcome {
                    CartAddOutcome::Added { product_name } => {
                        Screen::new(format!("Added {} to cart!", product_name))
                    }
                    CartAddOutcome::NotAvailable => Screen::new("Product not available!"),
                    CartAddOutcome::InsufficientStock => {
                        Screen::new("Not enough quantity available!")
                    }
                }]
            }
            Command::ClearCart => {
                self.cart.clear(event.client_id).await?;
                vec![
                    Screen::new("Cart cleared!"),
                    self.cart_screen(event.client_id).await?,
                ]
            }

            // Checkout
            Command::BuyNow(product_id) => vec![
                self.checkout
                    .start_buy_now(
                        event.client_id,
                        event.conversation_id,
                        event.username.clone(),
                        event.first_name.clone(),
                        product_id,
                    )
                    .await?,
            ],
            Command::CheckoutAll => vec![
                self.checkout
                    .start_cart_checkout(
                        event.client_id,
                        event.conversation_id,
                        event.username.clone(),
                        event.first_name.clone(),
                    )
                    .await?,
            ],
            Command::NoDiscount | Command::ContinueToPayment | Command::BackToPaymentMethods => {
                vec![
                    self.checkout
                        .show_payment_methods(event.client_id, event.conversation_id)
                        .await?,
                ]
            }
            Command::SelectPaymentMethod(currency) => vec![
                self.checkout
                    .select_payment_method(event.client_id, event.conversation_id, &currency)
                    .await?,
            ],
            Command::PaymentMade => vec![
                self.checkout
                    .payment_made(event.client_id, event.conversation_id)
                    .await?,
            ],

            // Operator panel
            Command::AdminPanel => vec![self.admin.panel()],
            Command::ProductManagement => vec![self.admin.product_management().await?],
            Command::ContentManagement => vec![self.admin.content_management()],
            Command::PaymentSettings => vec![self.admin.payment_settings().await?],
            Command::DiscountCodes => vec![self.admin.discount_management()],
            Command::Statistics => vec![self.admin.statistics().await?],
            Command::PendingOrders => vec![self.admin.pending_orders().await?],

            Command::AddNewProduct => vec![self.admin.start_add_product(event.client_id)],
            Command::EditProduct(product_id) => vec![self.admin.product_detail(product_id).await?],
            Command::ToggleProductActive(product_id) => {
                vec![self.admin.toggle_product(product_id).await?]
            }
            Command::DeleteProduct(product_id) => {
                vec![self.admin.confirm_delete(product_id).await?]
            }
            Command::ConfirmDelete(product_id) => self.admin.delete_product(product_id).await?,
            Command::CancelDelete(product_id) => vec![self.admin.cancel_delete(product_id).await?],

            Command::EditContent(key) => {
                vec![self.admin.start_content_edit(event.client_id, &key)]
            }
            Command::AddNewCrypto => vec![self.admin.start_add_crypto(event.client_id)],
            Command::EditPaymentMethod(code) => {
                vec![self.admin.start_edit_payment(event.client_id, &code).await?]
            }
            Command::RemovePaymentMethod(code) => self.admin.remove_payment(&code).await?,
            Command::ViewAllCodes => vec![self.admin.view_all_codes().await?],

            Command::ShowPendingOrder(order_id) => {
                vec![self.admin.show_pending_order(&order_id).await?]
            }
            Command::ConfirmOrder(order_id) => vec![self.admin.ask_confirmation(&order_id)],
            Command::ConfirmOrderYes(order_id) => {
                vec![self.admin.confirm_payment(&order_id).await?]
            }
            Command::ConfirmOrderNo(order_id) => {
                vec![self.admin.cancel_confirmation(&order_id).await?]
            }
            Command::RejectOrder(order_id) => vec![self.admin.reject_payment(&order_id).await?],

            Command::Unknown(raw) => {
                warn!(client_id = event.client_id, action = %raw, "Unknown action ignored");
                Vec::new()
            }
        };

        Ok(screens)
    }

    /// Free text belongs to whichever conversation is waiting for it: the
    /// buyer's checkout session first, then an open operator wizard. Text
    /// nobody is waiting for is dropped.
    async fn handle_text(
        &self,
        event: &ChatEvent,
        text: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        if text.trim() == "/start" {
            info!(client_id = event.client_id, "Conversation started");
            return if event.client_id == self.operator_id {
                Ok(vec![self.admin.panel()])
            } else {
                Ok(vec![self.home_screen().await?])
            };
        }

        match self
            .checkout
            .active_step(event.client_id, event.conversation_id)
        {
            Some(CheckoutStep::DiscountPrompt) | Some(CheckoutStep::DiscountValidation) => {
                return Ok(vec![
                    self.checkout
                        .submit_discount_code(event.client_id, event.conversation_id, text)
                        .await?,
                ]);
            }
            Some(CheckoutStep::SourceCapture) => {
                return self
                    .checkout
                    .submit_source_address(event.client_id, event.conversation_id, text)
                    .await;
            }
            _ => {}
        }

        if event.client_id == self.operator_id {
            if let Some(screens) = self.admin.handle_text(event.client_id, text).await? {
                return Ok(screens);
            }
        }

        Ok(Vec::new())
    }

    async fn handle_photo(
        &self,
        event: &ChatEvent,
        file_id: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        if event.client_id != self.operator_id {
            return Ok(Vec::new());
        }
        Ok(self
            .admin
            .handle_photo(event.client_id, file_id)
            .await?
            .unwrap_or_default())
    }

    async fn home_screen(&self) -> Result<Screen, ServiceError> {
        let welcome = self.content.get("welcome_message").await?;
        Ok(screen::main_menu(&welcome))
    }

    async fn cart_screen(&self, client_id: i64) -> Result<Screen, ServiceError> {
        let entries = self.cart.entries(client_id).await?;
        Ok(screen::cart_view(&entries, self.eur_usd_rate))
    }

    async fn static_page(&self, key: &str) -> Result<Screen, ServiceError> {
        let body = self.content.get(key).await?;
        Ok(screen::static_page(&body))
    }
}
