//! Typed parsing of the action strings carried on keyboard buttons.
//!
//! Every button press arrives as an opaque string. Parsing happens in one
//! place so the dispatcher can match exhaustively on a real enum instead of
//! scattering `starts_with` checks; exact names are tried before prefixed
//! forms, and longer prefixes before their own prefixes, so
//! `payment_made` is never read as the currency "made" and
//! `admin_confirm_yes_X` is never read as a confirmation request for "yes".

/// A parsed button action. `Unknown` keeps the raw string so it can be
/// logged without panicking on malformed or stale callback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Buyer navigation
    MainMenu,
    BrowseProducts,
    ViewCart,
    About,
    Contact,
    Website,
    Rules,
    Faq,

    // Catalog and cart
    ShowProduct(i32),
    AddToCart(i32),
    BuyNow(i32),
    CheckoutAll,
    ClearCart,

    // Checkout steps
    NoDiscount,
    ContinueToPayment,
    SelectPaymentMethod(String),
    PaymentMade,
    BackToPaymentMethods,

    // Operator panel
    AdminPanel,
    ProductManagement,
    ContentManagement,
    PaymentSettings,
    DiscountCodes,
    Statistics,
    PendingOrders,

    // Operator product management
    AddNewProduct,
    EditProduct(i32),
    ToggleProductActive(i32),
    DeleteProduct(i32),
    ConfirmDelete(i32),
    CancelDelete(i32),

    // Operator content / payment settings
    EditContent(String),
    AddNewCrypto,
    EditPaymentMethod(String),
    RemovePaymentMethod(String),
    ViewAllCodes,

    // Order confirmation
    ShowPendingOrder(String),
    ConfirmOrder(String),
    ConfirmOrderYes(String),
    ConfirmOrderNo(String),
    RejectOrder(String),

    Unknown(String),
}

impl Command {
    pub fn parse(action: &str) -> Self {
        match action {
            "main_menu" => Self::MainMenu,
            // three buttons, one screen
            "browse_products" | "back_to_products" | "continue_shopping" => Self::BrowseProducts,
            "view_cart" => Self::ViewCart,
            "about" => Self::About,
            "contact" => Self::Contact,
            "website" => Self::Website,
            "rules" => Self::Rules,
            "faq" => Self::Faq,
            "checkout_all" => Self::CheckoutAll,
            "clear_cart" => Self::ClearCart,
            "no_discount" => Self::NoDiscount,
            "continue_to_payment" => Self::ContinueToPayment,
            "payment_made" => Self::PaymentMade,
            "back_to_payment_methods" => Self::BackToPaymentMethods,
            "admin_panel" => Self::AdminPanel,
            "product_management" => Self::ProductManagement,
            "content_management" => Self::ContentManagement,
            "payment_settings" => Self::PaymentSettings,
            "discount_codes" => Self::DiscountCodes,
            "statistics" => Self::Statistics,
            "pending_orders" => Self::PendingOrders,
            "add_new_product" => Self::AddNewProduct,
            "add_new_crypto" => Self::AddNewCrypto,
            "view_all_codes" => Self::ViewAllCodes,
            _ => Self::parse_prefixed(action),
        }
    }

    fn parse_prefixed(action: &str) -> Self {
        // admin_confirm_yes_ / admin_confirm_no_ before admin_confirm_
        if let Some(id) = action.strip_prefix("admin_confirm_yes_") {
            return Self::order_command(id, Self::ConfirmOrderYes);
        }
        if let Some(id) = action.strip_prefix("admin_confirm_no_") {
            return Self::order_command(id, Self::ConfirmOrderNo);
        }
        if let Some(id) = action.strip_prefix("admin_confirm_") {
            return Self::order_command(id, Self::ConfirmOrder);
        }
        if let Some(id) = action.strip_prefix("admin_reject_") {
            return Self::order_command(id, Self::RejectOrder);
        }
        if let Some(id) = action.strip_prefix("pending_order_") {
            return Self::order_command(id, Self::ShowPendingOrder);
        }

        if let Some(id) = action.strip_prefix("add_to_cart_") {
            return Self::product_command(action, id, Self::AddToCart);
        }
        if let Some(id) = action.strip_prefix("buy_now_") {
            return Self::product_command(action, id, Self::BuyNow);
        }
        if let Some(id) = action.strip_prefix("product_") {
            return Self::product_command(action, id, Self::ShowProduct);
        }
        if let Some(id) = action.strip_prefix("edit_product_") {
            return Self::product_command(action, id, Self::EditProduct);
        }
        if let Some(id) = action.strip_prefix("toggle_active_") {
            return Self::product_command(action, id, Self::ToggleProductActive);
        }
        if let Some(id) = action.strip_prefix("delete_product_") {
            return Self::product_command(action, id, Self::DeleteProduct);
        }
        if let Some(id) = action.strip_prefix("confirm_delete_") {
            return Self::product_command(action, id, Self::ConfirmDelete);
        }
        if let Some(id) = action.strip_prefix("cancel_delete_") {
            return Self::product_command(action, id, Self::CancelDelete);
        }

        if let Some(key) = action.strip_prefix("edit_content_") {
            if !key.is_empty() {
                return Self::EditContent(key.to_string());
            }
        }
        if let Some(code) = action.strip_prefix("edit_payment_") {
            if !code.is_empty() {
                return Self::EditPaymentMethod(code.to_string());
            }
        }
        if let Some(code) = action.strip_prefix("remove_payment_") {
            if !code.is_empty() {
                return Self::RemovePaymentMethod(code.to_string());
            }
        }
        if let Some(code) = action.strip_prefix("payment_") {
            if !code.is_empty() {
                return Self::SelectPaymentMethod(code.to_string());
            }
        }

        Self::Unknown(action.to_string())
    }

    fn product_command(action: &str, id: &str, build: impl FnOnce(i32) -> Self) -> Self {
        match id.parse::<i32>() {
            Ok(id) => build(id),
            Err(_) => Self::Unknown(action.to_string()),
        }
    }

    fn order_command(id: &str, build: impl FnOnce(String) -> Self) -> Self {
        if id.is_empty() {
            return Self::Unknown(id.to_string());
        }
        build(id.to_string())
    }

    /// Actions only the storefront operator may perform. The dispatcher
    /// answers these with "Access denied!" for anyone else.
    pub fn requires_operator(&self) -> bool {
        matches!(
            self,
            Self::AdminPanel
                | Self::ProductManagement
                | Self::ContentManagement
                | Self::PaymentSettings
                | Self::DiscountCodes
                | Self::Statistics
                | Self::PendingOrders
                | Self::AddNewProduct
                | Self::EditProduct(_)
                | Self::ToggleProductActive(_)
                | Self::DeleteProduct(_)
                | Self::ConfirmDelete(_)
                | Self::CancelDelete(_)
                | Self::EditContent(_)
                | Self::AddNewCrypto
                | Self::EditPaymentMethod(_)
                | Self::RemovePaymentMethod(_)
                | Self::ViewAllCodes
                | Self::ShowPendingOrder(_)
                | Self::ConfirmOrder(_)
                | Self::ConfirmOrderYes(_)
                | Self::ConfirmOrderNo(_)
                | Self::RejectOrder(_)
        )
    }
}
