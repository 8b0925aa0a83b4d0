//! Builders for everything the buyer sees: message texts and the inline
//! keyboards under them. Keeping them in one place keeps the wording and
//! button wiring testable without a database or a transport.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::checkout::session::{CheckoutSession, OrderKind};
use crate::entities::{payment_method, product};
use crate::services::cart::CartEntry;

/// One tappable button. `action` is the opaque string echoed back by the
/// transport when the button is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub label: String,
    pub action: String,
}

impl Button {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// A rendered chat screen: the text plus its keyboard rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub text: String,
    pub keyboard: Vec<Vec<Button>>,
}

impl Screen {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Button label for a payment currency, with its ticker symbol.
pub fn currency_button_label(code: &str) -> String {
    match code {
        "btc" => "₿ Bitcoin".to_string(),
        "eth" => "Ξ Ethereum".to_string(),
        "sol" => "◎ Solana".to_string(),
        "ltc" => "💎 Litecoin".to_string(),
        "usdt" => "💵 USDT".to_string(),
        other => other.to_uppercase(),
    }
}

/// Plain currency name used inside message bodies.
pub fn currency_display_name(code: &str) -> String {
    match code {
        "btc" => "Bitcoin".to_string(),
        "eth" => "Ethereum".to_string(),
        "sol" => "Solana".to_string(),
        "ltc" => "Litecoin".to_string(),
        "usdt" => "USDT".to_string(),
        other => other.to_uppercase(),
    }
}

pub fn main_menu(welcome_text: &str) -> Screen {
    Screen::with_keyboard(
        welcome_text,
        vec![
            vec![
                Button::new("🛍️ Browse Products", "browse_products"),
                Button::new("🛒 My Cart", "view_cart"),
            ],
            vec![
                Button::new("ℹ️ About Us", "about"),
                Button::new("📞 Contact", "contact"),
            ],
            vec![
                Button::new("🌐 Website", "website"),
                Button::new("📝 Rules", "rules"),
            ],
            vec![Button::new("🔍 FAQ", "faq")],
        ],
    )
}

/// Catalog screen. Each product gets its own row; the label shows the
/// remaining quantity except when exactly one is left.
pub fn product_list(products: &[product::Model]) -> Screen {
    let mut text = String::from("🛍️ Our Products:");
    if products.is_empty() {
        text.push_str("\n\nNo products available at the moment.");
    }

    let mut keyboard: Vec<Vec<Button>> = products
        .iter()
        .map(|p| {
            let label = if p.quantity == 1 {
                format!("{} - {:.2}€", p.name, p.price)
            } else {
                format!("{} - {:.2}€ ({} pcs)", p.name, p.price, p.quantity)
            };
            vec![Button::new(label, format!("product_{}", p.id))]
        })
        .collect();

    keyboard.push(vec![
        Button::new("🛒 View Cart", "view_cart"),
        Button::new("🔙 Back", "main_menu"),
    ]);

    Screen::with_keyboard(text, keyboard)
}

pub fn product_detail(product: &product::Model) -> Screen {
    let text = format!(
        "🛍️ {}\n\n📝 {}\n💰 Price: {:.2}€\n📦 Available: {} pcs",
        product.name,
        product.description.as_deref().unwrap_or(""),
        product.price,
        product.quantity
    );

    Screen::with_keyboard(
        text,
        vec![
            vec![
                Button::new("💰 Buy Now", format!("buy_now_{}", product.id)),
                Button::new("🛒 Add to Cart", format!("add_to_cart_{}", product.id)),
            ],
            vec![
                Button::new("🔙 Back to Products", "browse_products"),
                Button::new("🔙 Main Menu", "main_menu"),
            ],
        ],
    )
}

pub fn cart_view(entries: &[CartEntry], eur_usd_rate: Decimal) -> Screen {
    if entries.is_empty() {
        return Screen::with_keyboard(
            "🛒 Your cart is empty!",
            vec![vec![
                Button::new("🛍️ Continue Shopping", "browse_products"),
                Button::new("🔙 Main Menu", "main_menu"),
            ]],
        );
    }

    let mut text = String::from("🛒 Your Cart:\n\n");
    let mut total = Decimal::ZERO;
    for entry in entries {
        let line_total = entry.line_total();
        total += line_total;
        text.push_str(&format!(
            "🛍️ {}\n 💰 {:.2}€ × {} = {:.2}€\n\n",
            entry.name, entry.price, entry.quantity, line_total
        ));
    }
    text.push_str(&format!(
        "💵 Total: {:.2}€ (${:.2})",
        total,
        total * eur_usd_rate
    ));

    Screen::with_keyboard(
        text,
        vec![
            vec![
                Button::new("💰 Checkout All", "checkout_all"),
                Button::new("🗑️ Clear Cart", "clear_cart"),
            ],
            vec![
                Button::new("🛍️ Continue Shopping", "continue_shopping"),
                Button::new("🔙 Main Menu", "main_menu"),
            ],
        ],
    )
}

pub fn discount_prompt(total: Decimal, eur_usd_rate: Decimal) -> Screen {
    let text = format!(
        "💰 {:.2}€ (${:.2})\n\nDo you have a discount code? Enter it below or press 'No Code' to continue:",
        total,
        total * eur_usd_rate
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new("🚫 No Code", "no_discount"),
            Button::new("✅ Continue to Payment", "continue_to_payment"),
        ]],
    )
}

pub fn discount_applied(
    original_total: Decimal,
    percentage: Decimal,
    new_total: Decimal,
    eur_usd_rate: Decimal,
) -> Screen {
    let text = format!(
        "🎫 Discount Applied!\n💰 Original: {:.2}€\n📊 Discount: {}%\n💵 New Total: {:.2}€ (${:.2})",
        original_total,
        percentage,
        new_total,
        new_total * eur_usd_rate
    );

    Screen::with_keyboard(
        text,
        vec![vec![Button::new(
            "✅ Continue to Payment",
            "continue_to_payment",
        )]],
    )
}

/// Currency choice screen. One row per configured method, then a back row.
pub fn payment_method_list(
    session: &CheckoutSession,
    methods: &[payment_method::Model],
    eur_usd_rate: Decimal,
) -> Screen {
    let product_text = match (session.kind, session.items.first()) {
        (OrderKind::BuyNow, Some(item)) => {
            format!("🛍️ {}\n💰 Price: {:.2}€", item.name, item.price)
        }
        _ => "🛍️ Multiple products from cart".to_string(),
    };

    let text = format!(
        "💳 Choose payment method:\n\n{}\n💰 Total: {:.2}€ (${:.2})",
        product_text,
        session.total,
        session.total * eur_usd_rate
    );

    let mut keyboard: Vec<Vec<Button>> = methods
        .iter()
        .map(|m| {
            vec![Button::new(
                currency_button_label(&m.currency_code),
                format!("payment_{}", m.currency_code),
            )]
        })
        .collect();
    keyboard.push(vec![Button::new("🔙 Back", "view_cart")]);

    Screen::with_keyboard(text, keyboard)
}

pub fn payment_details(
    session: &CheckoutSession,
    method: &payment_method::Model,
    eur_usd_rate: Decimal,
) -> Screen {
    let order_line = match session.kind {
        OrderKind::BuyNow => "Single product",
        OrderKind::CartCheckout => "Cart items",
    };
    let currency_name = currency_display_name(&method.currency_code);

    let text = format!(
        "💳 **PAYMENT DETAILS**\n\n\
         🛍️ {}\n\
         💰 Total: {:.2}€ (${:.2})\n\
         ⛓️ Blockchain: {}\n\n\
         📧 **SEND PAYMENT TO ADDRESS:**\n\
         `{}`\n\n\
         ⚠️ **IMPORTANT:**\n\
         • Send exactly {:.2}€ worth of {}\n\
         • Copy address exactly\n\n\
         After payment, click the button below:",
        order_line,
        session.total,
        session.total * eur_usd_rate,
        method.network.as_deref().unwrap_or(""),
        method.address,
        session.total,
        currency_name
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new("✅ PAYMENT MADE", "payment_made"),
            Button::new("🔙 Back to Payment Methods", "back_to_payment_methods"),
        ]],
    )
}

/// Free-text prompt; the next plain message from the buyer is the answer.
pub fn payment_source_prompt() -> Screen {
    Screen::new(
        "🔍 **PAYMENT CONFIRMATION**\n\n\
         Please enter the payment source address (where you sent from):\n\n\
         ⚠️ **IMPORTANT:** This helps us identify your payment and link it to your order!\n\n\
         Example: `1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa`",
    )
}

pub fn order_placed(order_id: &str, total: Decimal, source_address: &str) -> Screen {
    Screen::new(format!(
        "✅ Notified admin of your payment!\n\
         🆔 Order ID: {}\n\
         💰 Total: {:.2}€\n\
         📧 Payment source address: {}\n\n\
         Admin will check your transaction and send products after confirmation.",
        order_id, total, source_address
    ))
}

/// Operator-side alert raised the moment an order is committed. The buttons
/// carry the order id so the confirmation can happen days later.
pub fn operator_payment_alert(
    session: &CheckoutSession,
    order_id: &str,
    source_address: &str,
    placed_at: DateTime<Utc>,
) -> Screen {
    let client = session
        .username
        .as_ref()
        .map(|u| format!("@{}", u))
        .unwrap_or_else(|| session.first_name.clone());

    let product = match (session.kind, session.items.first()) {
        (OrderKind::BuyNow, Some(item)) => item.name.clone(),
        _ => "Cart checkout".to_string(),
    };

    let text = format!(
        "🔄 PAYMENT AWAITING CONFIRMATION!\n\n\
         👤 Client: {}\n\
         🆔 User ID: {}\n\
         🛍️ Product: {}\n\
         💰 Price: {:.2}€\n\
         🆔 Order ID: {}\n\
         ⛓️ Crypto: {}\n\
         📧 Payment source address: {}\n\
         🎫 Discount Code: {}\n\
         ⏰ Time: {}\n\n\
         Is payment visible in your wallet?",
        client,
        session.client_id,
        product,
        session.total,
        order_id,
        session
            .payment_currency
            .as_deref()
            .unwrap_or("")
            .to_uppercase(),
        source_address,
        session.discount_code.as_deref().unwrap_or("None"),
        placed_at.format("%Y-%m-%d %H:%M:%S")
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new("✅ Confirm Payment", format!("admin_confirm_{}", order_id)),
            Button::new("❌ Reject", format!("admin_reject_{}", order_id)),
        ]],
    )
}

/// About / contact / rules / FAQ bodies all render the same way.
pub fn static_page(body: &str) -> Screen {
    Screen::with_keyboard(body, vec![vec![Button::new("🔙 Back", "main_menu")]])
}

pub fn website_page(url: &str) -> Screen {
    Screen::with_keyboard(
        format!("🌐 Visit our website: {}", url),
        vec![vec![Button::new("🔙 Back", "main_menu")]],
    )
}
