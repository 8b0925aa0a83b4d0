use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::admin::screens::{self, StoreStats};
use crate::admin::state::{
    AdminStateStore, AdminWizard, PaymentDraft, PaymentField, ProductDraft, ProductField,
};
use crate::chat::screen::{currency_button_label, Screen};
use crate::errors::ServiceError;
use crate::services::cart::CartService;
use crate::services::catalog::CatalogService;
use crate::services::confirmation::ConfirmationService;
use crate::services::content::ContentService;
use crate::services::discounts::DiscountService;
use crate::services::orders::OrderService;
use crate::services::payment_methods::PaymentMethodService;

const NAME_PROMPT: &str = "Enter product name:";
const PRICE_PROMPT: &str = "Enter product price (example: 25.00):";
const PRICE_INVALID: &str = "Invalid price format. Please enter a number (example: 25.00):";
const DESCRIPTION_PROMPT: &str = "Enter product description:";
const QUANTITY_PROMPT: &str = "Enter product quantity (example: 5):";
const QUANTITY_INVALID: &str = "Invalid quantity. Please enter a whole number (example: 5):";
const FIRST_IMAGE_PROMPT: &str = "Now send the first product image:";
const IMAGE_EXPECTED: &str = "Please send an image file:";
const SECOND_IMAGE_CHOICE_PROMPT: &str =
    "Would you like to add a second image? Send 'yes' to add second image or 'no' to skip:";
const SECOND_IMAGE_CHOICE_INVALID: &str = "Please send 'yes' or 'no':";
const SECOND_IMAGE_PROMPT: &str = "Please send the second product image:";
const COORDINATES_PROMPT: &str = "Now you can add map coordinates (optional). Enter coordinates in format: 59.4370, 24.7536\nOr send 'skip' to skip.";
const COORDINATES_INVALID: &str =
    "Invalid coordinates format. Please use format: 59.4370, 24.7536\nOr send 'skip' to skip.";

const CURRENCY_PROMPT: &str = "Enter cryptocurrency code (example: btc):";
const CURRENCY_INVALID: &str =
    "Invalid cryptocurrency code. Please enter a short code (example: btc):";
const ADDRESS_PROMPT: &str = "Enter the receiving wallet address:";
const NETWORK_PROMPT: &str =
    "Enter blockchain network (example: Bitcoin, ERC-20, TRC-20):\nOr send 'skip' to skip.";

/// Drives the operator panel: catalog and content curation, payment
/// settings, discount inventory, statistics, and order resolution.
///
/// Multi-step edits run through [`AdminStateStore`] wizards; free text and
/// photos reach them via [`AdminFlow::handle_text`] and
/// [`AdminFlow::handle_photo`] once the dispatcher has verified the sender
/// is the operator.
pub struct AdminFlow {
    wizards: Arc<AdminStateStore>,
    catalog: Arc<CatalogService>,
    cart: Arc<CartService>,
    discounts: Arc<DiscountService>,
    payment_methods: Arc<PaymentMethodService>,
    content: Arc<ContentService>,
    orders: Arc<OrderService>,
    confirmations: Arc<ConfirmationService>,
}

impl AdminFlow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wizards: Arc<AdminStateStore>,
        catalog: Arc<CatalogService>,
        cart: Arc<CartService>,
        discounts: Arc<DiscountService>,
        payment_methods: Arc<PaymentMethodService>,
        content: Arc<ContentService>,
        orders: Arc<OrderService>,
        confirmations: Arc<ConfirmationService>,
    ) -> Self {
        Self {
            wizards,
            catalog,
            cart,
            discounts,
            payment_methods,
            content,
            orders,
            confirmations,
        }
    }

    pub fn panel(&self) -> Screen {
        screens::admin_panel()
    }

    pub async fn product_management(&self) -> Result<Screen, ServiceError> {
        let products = self.catalog.list_all().await?;
        Ok(screens::product_management(&products))
    }

    pub async fn product_detail(&self, product_id: i32) -> Result<Screen, ServiceError> {
        match self.catalog.get(product_id).await? {
            Some(product) => Ok(screens::product_detail(&product)),
            None => Ok(Screen::new("Product not found!")),
        }
    }

    pub async fn toggle_product(&self, product_id: i32) -> Result<Screen, ServiceError> {
        match self.catalog.toggle_active(product_id).await {
            Ok(product) => Ok(screens::product_detail(&product)),
            Err(ServiceError::NotFound(_)) => Ok(Screen::new("Product not found!")),
            Err(other) => Err(other),
        }
    }

    pub async fn confirm_delete(&self, product_id: i32) -> Result<Screen, ServiceError> {
        match self.catalog.get(product_id).await? {
            Some(product) => Ok(screens::delete_confirmation(&product)),
            None => Ok(Screen::new("Product not found!")),
        }
    }

    pub async fn delete_product(&self, product_id: i32) -> Result<Vec<Screen>, ServiceError> {
        match self.catalog.delete(product_id).await {
            Ok(()) => {}
            Err(ServiceError::NotFound(_)) => return Ok(vec![Screen::new("Product not found!")]),
            Err(other) => return Err(other),
        }
        Ok(vec![
            Screen::new("Product deleted!"),
            self.product_management().await?,
        ])
    }

    pub async fn cancel_delete(&self, product_id: i32) -> Result<Screen, ServiceError> {
        self.product_detail(product_id).await
    }

    pub fn start_add_product(&self, operator_id: i64) -> Screen {
        self.wizards.put(
            operator_id,
            AdminWizard::AddProduct {
                step: ProductField::Name,
                draft: ProductDraft::default(),
            },
        );
        Screen::new(NAME_PROMPT)
    }

    pub fn content_management(&self) -> Screen {
        screens::content_management()
    }

    pub fn start_content_edit(&self, operator_id: i64, key: &str) -> Screen {
        match screens::content_key_label(key) {
            Some(label) => {
                self.wizards.put(
                    operator_id,
                    AdminWizard::EditContent {
                        key: key.to_string(),
                    },
                );
                Screen::new(format!("Enter new text for {}:", label))
            }
            None => Screen::new("Unknown content page!"),
        }
    }

    pub async fn payment_settings(&self) -> Result<Screen, ServiceError> {
        let methods = self.payment_methods.list().await?;
        Ok(screens::payment_settings(&methods))
    }

    pub fn start_add_crypto(&self, operator_id: i64) -> Screen {
        self.wizards.put(
            operator_id,
            AdminWizard::PaymentMethod {
                step: PaymentField::Currency,
                draft: PaymentDraft::default(),
            },
        );
        Screen::new(CURRENCY_PROMPT)
    }

    pub async fn start_edit_payment(
        &self,
        operator_id: i64,
        currency_code: &str,
    ) -> Result<Screen, ServiceError> {
        match self.payment_methods.get(currency_code).await? {
            Some(method) => {
                let label = currency_button_label(&method.currency_code);
                self.wizards.put(
                    operator_id,
                    AdminWizard::PaymentMethod {
                        step: PaymentField::Address,
                        draft: PaymentDraft {
                            currency: method.currency_code,
                            address: String::new(),
                        },
                    },
                );
                Ok(Screen::new(format!(
                    "Enter new wallet address for {}:",
                    label
                )))
            }
            None => Ok(Screen::new("Payment method not found!")),
        }
    }

    pub async fn remove_payment(&self, currency_code: &str) -> Result<Vec<Screen>, ServiceError> {
        match self.payment_methods.remove(currency_code).await {
            Ok(()) => {}
            Err(ServiceError::NotFound(_)) => {
                return Ok(vec![Screen::new("Payment method not found!")])
            }
            Err(other) => return Err(other),
        }
        let label = currency_button_label(&currency_code.trim().to_lowercase());
        Ok(vec![
            Screen::new(format!("🗑️ {} removed!", label)),
            self.payment_settings().await?,
        ])
    }

    pub fn discount_management(&self) -> Screen {
        screens::discount_management()
    }

    pub async fn view_all_codes(&self) -> Result<Screen, ServiceError> {
        let codes = self.discounts.list_all().await?;
        Ok(screens::discount_code_list(&codes))
    }

    pub async fn statistics(&self) -> Result<Screen, ServiceError> {
        let (total_products, active_products) = self.catalog.counts().await?;
        let (total_orders, completed_orders, pending_orders) =
            self.orders.status_counts().await?;
        let products_in_carts = self.cart.count_lines().await?;
        let (total_codes, active_codes) = self.discounts.counts().await?;

        Ok(screens::statistics(&StoreStats {
            total_products,
            active_products,
            total_orders,
            completed_orders,
            pending_orders,
            products_in_carts,
            total_codes,
            active_codes,
        }))
    }

    pub async fn pending_orders(&self) -> Result<Screen, ServiceError> {
        let rows = self.orders.pending_rows().await?;
        Ok(screens::pending_orders(&rows))
    }

    pub async fn show_pending_order(&self, order_id: &str) -> Result<Screen, ServiceError> {
        let rows = self.orders.rows(order_id).await?;
        match rows.first() {
            Some(row) => Ok(screens::pending_payment_alert(row)),
            None => Ok(Screen::new(format!("Order {} not found!", order_id))),
        }
    }

    pub fn ask_confirmation(&self, order_id: &str) -> Screen {
        screens::confirmation_guard(order_id)
    }

    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, order_id: &str) -> Result<Screen, ServiceError> {
        match self.confirmations.confirm(order_id).await {
            Ok(()) => Ok(Screen::new(format!(
                "✅ Payment for order {} confirmed and client notified!",
                order_id
            ))),
            Err(ServiceError::NotFound(_)) => {
                Ok(Screen::new(format!("Order {} not found!", order_id)))
            }
            Err(ServiceError::InvalidOperation(message)) => Ok(Screen::new(message)),
            Err(other) => Err(other),
        }
    }

    /// Backing out of the guard re-renders the alert so the buttons stay
    /// available.
    pub async fn cancel_confirmation(&self, order_id: &str) -> Result<Screen, ServiceError> {
        self.show_pending_order(order_id).await
    }

    #[instrument(skip(self))]
    pub async fn reject_payment(&self, order_id: &str) -> Result<Screen, ServiceError> {
        match self.confirmations.reject(order_id).await {
            Ok(()) => Ok(Screen::new(format!(
                "❌ Payment for order {} rejected!",
                order_id
            ))),
            Err(ServiceError::NotFound(_)) => {
                Ok(Screen::new(format!("Order {} not found!", order_id)))
            }
            Err(ServiceError::InvalidOperation(message)) => Ok(Screen::new(message)),
            Err(other) => Err(other),
        }
    }

    /// Feeds operator free text into whichever wizard is open. `None` means
    /// no wizard is running and the text is not ours to answer.
    pub async fn handle_text(
        &self,
        operator_id: i64,
        text: &str,
    ) -> Result<Option<Vec<Screen>>, ServiceError> {
        let Some(wizard) = self.wizards.get(operator_id) else {
            return Ok(None);
        };

        let screens = match wizard {
            AdminWizard::AddProduct { step, draft } => {
                self.advance_product_wizard(operator_id, step, draft, text)
                    .await?
            }
            AdminWizard::PaymentMethod { step, draft } => {
                self.advance_payment_wizard(operator_id, step, draft, text)
                    .await?
            }
            AdminWizard::EditContent { key } => {
                self.finish_content_edit(operator_id, &key, text).await?
            }
        };
        Ok(Some(screens))
    }

    /// Feeds an operator photo into the add-product wizard. Photos sent
    /// outside an image step are ignored, like any other stray upload.
    pub async fn handle_photo(
        &self,
        operator_id: i64,
        file_id: &str,
    ) -> Result<Option<Vec<Screen>>, ServiceError> {
        let Some(AdminWizard::AddProduct { step, mut draft }) = self.wizards.get(operator_id)
        else {
            return Ok(None);
        };

        match step {
            ProductField::FirstImage => {
                draft.image1 = Some(file_id.to_string());
                self.wizards.put(
                    operator_id,
                    AdminWizard::AddProduct {
                        step: ProductField::SecondImageChoice,
                        draft,
                    },
                );
                Ok(Some(vec![Screen::new(SECOND_IMAGE_CHOICE_PROMPT)]))
            }
            ProductField::SecondImage => {
                draft.image2 = Some(file_id.to_string());
                self.wizards.put(
                    operator_id,
                    AdminWizard::AddProduct {
                        step: ProductField::Coordinates,
                        draft,
                    },
                );
                Ok(Some(vec![Screen::new(COORDINATES_PROMPT)]))
            }
            _ => Ok(None),
        }
    }

    async fn advance_product_wizard(
        &self,
        operator_id: i64,
        step: ProductField,
        mut draft: ProductDraft,
        text: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        let trimmed = text.trim();
        match step {
            ProductField::Name => {
                if trimmed.is_empty() {
                    return Ok(vec![Screen::new(NAME_PROMPT)]);
                }
                draft.name = trimmed.to_string();
                self.wizards.put(
                    operator_id,
                    AdminWizard::AddProduct {
                        step: ProductField::Price,
                        draft,
                    },
                );
                Ok(vec![Screen::new(PRICE_PROMPT)])
            }
            ProductField::Price => match trimmed.parse::<Decimal>() {
                Ok(price) if price > Decimal::ZERO => {
                    draft.price = price;
                    self.wizards.put(
                        operator_id,
                        AdminWizard::AddProduct {
                            step: ProductField::Description,
                            draft,
                        },
                    );
                    Ok(vec![Screen::new(DESCRIPTION_PROMPT)])
                }
                _ => Ok(vec![Screen::new(PRICE_INVALID)]),
            },
            ProductField::Description => {
                draft.description = trimmed.to_string();
                self.wizards.put(
                    operator_id,
                    AdminWizard::AddProduct {
                        step: ProductField::Quantity,
                        draft,
                    },
                );
                Ok(vec![Screen::new(QUANTITY_PROMPT)])
            }
            ProductField::Quantity => match trimmed.parse::<i32>() {
                Ok(quantity) if quantity >= 0 => {
                    draft.quantity = quantity;
                    self.wizards.put(
                        operator_id,
                        AdminWizard::AddProduct {
                            step: ProductField::FirstImage,
                            draft,
                        },
                    );
                    Ok(vec![Screen::new(FIRST_IMAGE_PROMPT)])
                }
                _ => Ok(vec![Screen::new(QUANTITY_INVALID)]),
            },
            ProductField::FirstImage | ProductField::SecondImage => {
                Ok(vec![Screen::new(IMAGE_EXPECTED)])
            }
            ProductField::SecondImageChoice => match trimmed.to_lowercase().as_str() {
                "yes" => {
                    self.wizards.put(
                        operator_id,
                        AdminWizard::AddProduct {
                            step: ProductField::SecondImage,
                            draft,
                        },
                    );
                    Ok(vec![Screen::new(SECOND_IMAGE_PROMPT)])
                }
                "no" => {
                    self.wizards.put(
                        operator_id,
                        AdminWizard::AddProduct {
                            step: ProductField::Coordinates,
                            draft,
                        },
                    );
                    Ok(vec![Screen::new(COORDINATES_PROMPT)])
                }
                _ => Ok(vec![Screen::new(SECOND_IMAGE_CHOICE_INVALID)]),
            },
            ProductField::Coordinates => {
                if trimmed.eq_ignore_ascii_case("skip") {
                    draft.coordinates = None;
                    return self.finish_product_wizard(operator_id, draft).await;
                }
                match parse_coordinates(trimmed) {
                    Some(coordinates) => {
                        draft.coordinates = Some(coordinates);
                        self.finish_product_wizard(operator_id, draft).await
                    }
                    None => Ok(vec![Screen::new(COORDINATES_INVALID)]),
                }
            }
        }
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn finish_product_wizard(
        &self,
        operator_id: i64,
        draft: ProductDraft,
    ) -> Result<Vec<Screen>, ServiceError> {
        let image_count = 1 + usize::from(draft.image2.is_some());
        let coordinate_note = match &draft.coordinates {
            Some(coordinates) => format!("📍 Coordinates: {}\n\n", coordinates),
            None => String::new(),
        };

        let product_id = self
            .catalog
            .create(
                draft.name.clone(),
                draft.price,
                Some(draft.description.clone()),
                draft.quantity,
                draft.image1.clone(),
                draft.image2.clone(),
                draft.coordinates.clone(),
            )
            .await?;
        self.wizards.clear(operator_id);
        info!(operator_id, product_id, "Product wizard completed");

        let summary = format!(
            "🎉 Product added completely!\n{}\n📦 {}\n💰 {:.2}€\n🖼️ {} image(s) attached\n\nProduct is now available to clients.",
            coordinate_note, draft.name, draft.price, image_count
        );
        Ok(vec![
            Screen::new(summary),
            self.product_management().await?,
        ])
    }

    async fn advance_payment_wizard(
        &self,
        operator_id: i64,
        step: PaymentField,
        mut draft: PaymentDraft,
        text: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        let trimmed = text.trim();
        match step {
            PaymentField::Currency => {
                let code = trimmed.to_lowercase();
                if code.len() < 2
                    || code.len() > 10
                    || !code.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    return Ok(vec![Screen::new(CURRENCY_INVALID)]);
                }
                draft.currency = code;
                self.wizards.put(
                    operator_id,
                    AdminWizard::PaymentMethod {
                        step: PaymentField::Address,
                        draft,
                    },
                );
                Ok(vec![Screen::new(ADDRESS_PROMPT)])
            }
            PaymentField::Address => {
                if trimmed.is_empty() {
                    return Ok(vec![Screen::new(ADDRESS_PROMPT)]);
                }
                draft.address = trimmed.to_string();
                self.wizards.put(
                    operator_id,
                    AdminWizard::PaymentMethod {
                        step: PaymentField::Network,
                        draft,
                    },
                );
                Ok(vec![Screen::new(NETWORK_PROMPT)])
            }
            PaymentField::Network => {
                let network = if trimmed.eq_ignore_ascii_case("skip") {
                    None
                } else {
                    Some(trimmed.to_string())
                };
                let stored = self
                    .payment_methods
                    .upsert(&draft.currency, draft.address.clone(), network)
                    .await?;
                self.wizards.clear(operator_id);
                info!(operator_id, currency = %stored.currency_code, "Payment wizard completed");

                let label = currency_button_label(&stored.currency_code);
                Ok(vec![
                    Screen::new(format!("✅ {} saved!", label)),
                    self.payment_settings().await?,
                ])
            }
        }
    }

    async fn finish_content_edit(
        &self,
        operator_id: i64,
        key: &str,
        text: &str,
    ) -> Result<Vec<Screen>, ServiceError> {
        self.content.set(key, text.to_string()).await?;
        self.wizards.clear(operator_id);
        info!(operator_id, key, "Content page updated");

        let label = screens::content_key_label(key).unwrap_or(key);
        Ok(vec![
            Screen::new(format!("✅ {} updated!", label)),
            self.content_management(),
        ])
    }
}

/// Accepts "lat, lon" with both halves parsing as finite numbers, and keeps
/// the operator's spelling rather than reformatting it.
fn parse_coordinates(text: &str) -> Option<String> {
    let mut parts = text.splitn(2, ',');
    let latitude = parts.next()?.trim().parse::<f64>().ok()?;
    let longitude = parts.next()?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    Some(text.to_string())
}
