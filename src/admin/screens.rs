//! Screen builders for the operator panel. Pure functions from models to
//! [`Screen`] values; the admin flow decides what to load and when.

use crate::chat::screen::{currency_button_label, Button, Screen};
use crate::entities::{discount_code, order, payment_method, product};

/// Content keys the operator can edit, with their button labels.
pub const CONTENT_KEYS: [(&str, &str); 7] = [
    ("welcome_message", "👋 Welcome Message"),
    ("about_us", "ℹ️ About Us"),
    ("contact", "📞 Contact"),
    ("website", "🌐 Website"),
    ("rules", "📝 Rules"),
    ("faq", "🔍 FAQ"),
    ("success_message", "🎉 Success Message"),
];

pub fn content_key_label(key: &str) -> Option<&'static str> {
    CONTENT_KEYS
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, label)| *label)
}

pub fn admin_panel() -> Screen {
    Screen::with_keyboard(
        "🛠️ Admin Panel:",
        vec![
            vec![Button::new("📦 Product Management", "product_management")],
            vec![Button::new("📝 Content Management", "content_management")],
            vec![Button::new("💳 Payment Settings", "payment_settings")],
            vec![Button::new("🎫 Discount Codes", "discount_codes")],
            vec![Button::new("📊 Statistics", "statistics")],
            vec![Button::new("📋 Pending Orders", "pending_orders")],
            vec![Button::new("🔙 Main Menu", "main_menu")],
        ],
    )
}

pub fn product_management(products: &[product::Model]) -> Screen {
    let mut keyboard: Vec<Vec<Button>> = products
        .iter()
        .map(|product| {
            let status = if product.is_active { "✅" } else { "❌" };
            vec![Button::new(
                format!("{} {} - {:.2}€", status, product.name, product.price),
                format!("edit_product_{}", product.id),
            )]
        })
        .collect();
    keyboard.push(vec![Button::new("➕ Add New Product", "add_new_product")]);
    keyboard.push(vec![Button::new("🔙 Back to Admin Panel", "admin_panel")]);

    Screen::with_keyboard("📦 Product Management:", keyboard)
}

pub fn product_detail(product: &product::Model) -> Screen {
    let status = if product.is_active { "Active" } else { "Inactive" };
    let text = format!(
        "📦 Product: {}\n💰 Price: {:.2}€\n📝 Description: {}\n📦 Quantity: {}\n📍 Coordinates: {}\n🎯 Status: {}",
        product.name,
        product.price,
        product.description.as_deref().unwrap_or(""),
        product.quantity,
        product.coordinates.as_deref().unwrap_or("Not set"),
        status
    );

    Screen::with_keyboard(
        text,
        vec![
            vec![Button::new(
                "🔄 Toggle Active",
                format!("toggle_active_{}", product.id),
            )],
            vec![Button::new(
                "🗑️ Delete Product",
                format!("delete_product_{}", product.id),
            )],
            vec![Button::new("🔙 Back to Products", "product_management")],
        ],
    )
}

pub fn delete_confirmation(product: &product::Model) -> Screen {
    let text = format!(
        "🗑️ **DELETE CONFIRMATION**\n\nAre you sure you want to delete this product?\n\n📦 {}\n💰 {:.2}€\n\n⚠️ **This action cannot be undone!**",
        product.name, product.price
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new("✅ YES, delete", format!("confirm_delete_{}", product.id)),
            Button::new("❌ NO, cancel", format!("cancel_delete_{}", product.id)),
        ]],
    )
}

pub fn content_management() -> Screen {
    let mut keyboard: Vec<Vec<Button>> = CONTENT_KEYS
        .iter()
        .map(|(key, label)| vec![Button::new(*label, format!("edit_content_{}", key))])
        .collect();
    keyboard.push(vec![Button::new("🔙 Back to Admin Panel", "admin_panel")]);

    Screen::with_keyboard("📝 Content Management:", keyboard)
}

pub fn payment_settings(methods: &[payment_method::Model]) -> Screen {
    let mut text = String::from("💳 Payment Settings:\n\n");
    let mut keyboard: Vec<Vec<Button>> = Vec::new();

    for method in methods {
        let label = currency_button_label(&method.currency_code);
        text.push_str(&format!("{}:\n`{}`\n\n", label, method.address));
        keyboard.push(vec![
            Button::new(
                format!("✏️ Edit {}", label),
                format!("edit_payment_{}", method.currency_code),
            ),
            Button::new(
                format!("🗑️ Remove {}", label),
                format!("remove_payment_{}", method.currency_code),
            ),
        ]);
    }

    keyboard.push(vec![Button::new("➕ Add New Crypto", "add_new_crypto")]);
    keyboard.push(vec![Button::new("🔙 Back to Admin Panel", "admin_panel")]);

    Screen::with_keyboard(text, keyboard)
}

pub fn discount_management() -> Screen {
    Screen::with_keyboard(
        "🎫 Discount Code Management:",
        vec![
            vec![Button::new("📋 View All Codes", "view_all_codes")],
            vec![Button::new("🔙 Back to Admin Panel", "admin_panel")],
        ],
    )
}

pub fn discount_code_list(codes: &[discount_code::Model]) -> Screen {
    let back = vec![vec![Button::new("🔙 Back", "discount_codes")]];
    if codes.is_empty() {
        return Screen::with_keyboard("🎫 All Discount Codes:\n\nNo discount codes yet.", back);
    }

    let mut text = String::from("🎫 All Discount Codes:\n\n");
    for code in codes {
        let status = if code.is_active { "✅" } else { "❌" };
        let usage = if code.max_uses == -1 {
            format!("{} (unlimited)", code.used_count)
        } else {
            format!("{}/{}", code.used_count, code.max_uses)
        };
        let expiry = code
            .expiry_date
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Never".to_string());
        let scope = if code.is_general {
            "General".to_string()
        } else if let Some(username) = &code.client_username {
            format!("@{}", username)
        } else if let Some(client_id) = code.client_id {
            format!("Client {}", client_id)
        } else {
            "Client-specific".to_string()
        };

        text.push_str(&format!(
            "{} {} - {}%\n• Uses: {}\n• Expires: {}\n• Scope: {}\n\n",
            status, code.code, code.discount_percentage, usage, expiry, scope
        ));
    }

    Screen::with_keyboard(text.trim_end(), back)
}

/// Row counts backing the statistics screen.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreStats {
    pub total_products: u64,
    pub active_products: u64,
    pub total_orders: u64,
    pub completed_orders: u64,
    pub pending_orders: u64,
    pub products_in_carts: u64,
    pub total_codes: u64,
    pub active_codes: u64,
}

pub fn statistics(stats: &StoreStats) -> Screen {
    let text = format!(
        "📊 STORE STATISTICS\n\n🛍️ PRODUCTS:\n• All products: {}\n• Active products: {}\n\n📦 ORDERS:\n• All orders: {}\n• Completed: {}\n• Pending: {}\n\n🛒 CARTS:\n• Products in carts: {}\n\n🎫 DISCOUNT CODES:\n• All codes: {}\n• Active: {}",
        stats.total_products,
        stats.active_products,
        stats.total_orders,
        stats.completed_orders,
        stats.pending_orders,
        stats.products_in_carts,
        stats.total_codes,
        stats.active_codes
    );

    Screen::with_keyboard(
        text,
        vec![vec![Button::new("🔙 Back to Admin Panel", "admin_panel")]],
    )
}

/// One button per distinct pending order; rows of one order share the id,
/// so only the first row contributes a line.
pub fn pending_orders(rows: &[order::Model]) -> Screen {
    let mut keyboard: Vec<Vec<Button>> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for row in rows {
        if seen.contains(&row.order_id.as_str()) {
            continue;
        }
        seen.push(&row.order_id);
        keyboard.push(vec![Button::new(
            format!(
                "🆔 {} - {:.2}€ ({})",
                row.order_id, row.total_price, row.client_name
            ),
            format!("pending_order_{}", row.order_id),
        )]);
    }

    let text = if seen.is_empty() {
        "📋 Pending Orders:\n\nNo pending orders."
    } else {
        "📋 Pending Orders:"
    };
    keyboard.push(vec![Button::new("🔙 Back to Admin Panel", "admin_panel")]);

    Screen::with_keyboard(text, keyboard)
}

/// Yes/no guard before a confirmation goes through.
pub fn confirmation_guard(order_id: &str) -> Screen {
    let text = format!(
        "🔍 **CONFIRMATION**\n\nAre you sure you want to approve this payment?\n\n🆔 Order ID: {}",
        order_id
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new(
                "✅ YES, confirm payment",
                format!("admin_confirm_yes_{}", order_id),
            ),
            Button::new("❌ NO, cancel", format!("admin_confirm_no_{}", order_id)),
        ]],
    )
}

/// The payment alert re-rendered from a ledger row, used when the operator
/// backs out of the guard or opens a pending order later. Unlike the
/// checkout-time alert this one only knows what the row stored.
pub fn pending_payment_alert(row: &order::Model) -> Screen {
    let text = format!(
        "🔄 PAYMENT AWAITING CONFIRMATION!\n\n👤 Client: {}\n🆔 User ID: {}\n🛍️ Product: {}\n💰 Price: {:.2}€\n🆔 Order ID: {}\n⛓️ Crypto: {}\n📧 Payment source address: {}\n🎫 Discount Code: {}\n⏰ Time: {}\n\nIs payment visible in your wallet?",
        row.client_name,
        row.client_id,
        row.product_name,
        row.total_price,
        row.order_id,
        row.payment_currency,
        row.payment_source_address,
        row.discount_code.as_deref().unwrap_or("None"),
        row.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    Screen::with_keyboard(
        text,
        vec![vec![
            Button::new("✅ Confirm Payment", format!("admin_confirm_{}", row.order_id)),
            Button::new("❌ Reject", format!("admin_reject_{}", row.order_id)),
        ]],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn sample_product(id: i32, active: bool) -> product::Model {
        product::Model {
            id,
            name: "Product A".to_string(),
            price: dec!(10.00),
            description: Some("Fresh".to_string()),
            quantity: 5,
            image1: None,
            image2: None,
            coordinates: None,
            is_active: active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_order_row(order_id: &str) -> order::Model {
        order::Model {
            id: 1,
            order_id: order_id.to_string(),
            client_id: 10,
            client_name: "alice".to_string(),
            product_id: 1,
            product_name: "Product A".to_string(),
            quantity: 2,
            total_price: dec!(25.00),
            payment_currency: "btc".to_string(),
            payment_source_address: "bc1qbuyer".to_string(),
            discount_code: None,
            status: order::OrderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn panel_lists_every_section() {
        let screen = admin_panel();
        assert_eq!(screen.text, "🛠️ Admin Panel:");
        let actions: Vec<&str> = screen
            .keyboard
            .iter()
            .map(|row| row[0].action.as_str())
            .collect();
        assert_eq!(
            actions,
            vec![
                "product_management",
                "content_management",
                "payment_settings",
                "discount_codes",
                "statistics",
                "pending_orders",
                "main_menu"
            ]
        );
    }

    #[test]
    fn product_rows_show_status_and_price() {
        let screen = product_management(&[sample_product(3, true), sample_product(4, false)]);
        assert_eq!(screen.keyboard[0][0].label, "✅ Product A - 10.00€");
        assert_eq!(screen.keyboard[0][0].action, "edit_product_3");
        assert_eq!(screen.keyboard[1][0].label, "❌ Product A - 10.00€");
        assert_eq!(screen.keyboard[2][0].label, "➕ Add New Product");
    }

    #[test]
    fn product_detail_renders_coordinates_fallback() {
        let screen = product_detail(&sample_product(3, true));
        assert!(screen.text.contains("📍 Coordinates: Not set"));
        assert!(screen.text.contains("🎯 Status: Active"));
        assert_eq!(screen.keyboard[0][0].action, "toggle_active_3");
        assert_eq!(screen.keyboard[1][0].action, "delete_product_3");
    }

    #[test]
    fn delete_guard_wires_both_choices() {
        let screen = delete_confirmation(&sample_product(3, true));
        assert!(screen.text.starts_with("🗑️ **DELETE CONFIRMATION**"));
        assert_eq!(screen.keyboard[0][0].action, "confirm_delete_3");
        assert_eq!(screen.keyboard[0][1].action, "cancel_delete_3");
    }

    #[test]
    fn content_keys_cover_all_editable_pages() {
        let screen = content_management();
        assert_eq!(screen.keyboard.len(), CONTENT_KEYS.len() + 1);
        assert_eq!(screen.keyboard[0][0].action, "edit_content_welcome_message");
        assert_eq!(content_key_label("faq"), Some("🔍 FAQ"));
        assert_eq!(content_key_label("bogus"), None);
    }

    #[test]
    fn payment_settings_show_addresses_in_code_spans() {
        let method = payment_method::Model {
            id: 1,
            currency_code: "btc".to_string(),
            address: "bc1qshop".to_string(),
            network: Some("Bitcoin".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let screen = payment_settings(&[method]);
        assert!(screen.text.contains("₿ Bitcoin:\n`bc1qshop`"));
        assert_eq!(screen.keyboard[0][0].action, "edit_payment_btc");
        assert_eq!(screen.keyboard[0][1].action, "remove_payment_btc");
        assert_eq!(screen.keyboard[1][0].action, "add_new_crypto");
    }

    #[test]
    fn discount_list_renders_usage_expiry_and_scope() {
        let codes = vec![
            discount_code::Model {
                id: 1,
                code: "SAVE20".to_string(),
                discount_percentage: dec!(20),
                expiry_date: None,
                max_uses: -1,
                used_count: 3,
                is_general: true,
                client_id: None,
                client_username: None,
                is_active: true,
                created_at: Utc::now(),
            },
            discount_code::Model {
                id: 2,
                code: "VIP10".to_string(),
                discount_percentage: dec!(10),
                expiry_date: NaiveDate::from_ymd_opt(2025, 12, 31),
                max_uses: 1,
                used_count: 1,
                is_general: false,
                client_id: None,
                client_username: Some("alice".to_string()),
                is_active: false,
                created_at: Utc::now(),
            },
        ];

        let screen = discount_code_list(&codes);
        assert!(screen.text.contains("✅ SAVE20 - 20%"));
        assert!(screen.text.contains("• Uses: 3 (unlimited)"));
        assert!(screen.text.contains("• Expires: Never"));
        assert!(screen.text.contains("❌ VIP10 - 10%"));
        assert!(screen.text.contains("• Uses: 1/1"));
        assert!(screen.text.contains("• Expires: 2025-12-31"));
        assert!(screen.text.contains("• Scope: @alice"));
    }

    #[test]
    fn statistics_text_matches_layout() {
        let stats = StoreStats {
            total_products: 4,
            active_products: 3,
            total_orders: 7,
            completed_orders: 5,
            pending_orders: 2,
            products_in_carts: 6,
            total_codes: 2,
            active_codes: 1,
        };

        let screen = statistics(&stats);
        assert_eq!(
            screen.text,
            "📊 STORE STATISTICS\n\n🛍️ PRODUCTS:\n• All products: 4\n• Active products: 3\n\n📦 ORDERS:\n• All orders: 7\n• Completed: 5\n• Pending: 2\n\n🛒 CARTS:\n• Products in carts: 6\n\n🎫 DISCOUNT CODES:\n• All codes: 2\n• Active: 1"
        );
    }

    #[test]
    fn pending_orders_collapse_rows_by_order_id() {
        let mut second = sample_order_row("3F9A21BC");
        second.id = 2;
        second.product_name = "Product B".to_string();
        let other = {
            let mut row = sample_order_row("AB12CD34");
            row.id = 3;
            row
        };

        let screen = pending_orders(&[sample_order_row("3F9A21BC"), second, other]);
        // two orders, plus the back row
        assert_eq!(screen.keyboard.len(), 3);
        assert_eq!(screen.keyboard[0][0].action, "pending_order_3F9A21BC");
        assert_eq!(screen.keyboard[1][0].action, "pending_order_AB12CD34");
        assert_eq!(screen.keyboard[0][0].label, "🆔 3F9A21BC - 25.00€ (alice)");
    }

    #[test]
    fn guard_and_alert_wire_the_resolution_actions() {
        let guard = confirmation_guard("3F9A21BC");
        assert!(guard.text.contains("🆔 Order ID: 3F9A21BC"));
        assert_eq!(guard.keyboard[0][0].action, "admin_confirm_yes_3F9A21BC");
        assert_eq!(guard.keyboard[0][1].action, "admin_confirm_no_3F9A21BC");

        let alert = pending_payment_alert(&sample_order_row("3F9A21BC"));
        assert!(alert.text.starts_with("🔄 PAYMENT AWAITING CONFIRMATION!"));
        assert!(alert.text.contains("👤 Client: alice"));
        assert!(alert.text.contains("🎫 Discount Code: None"));
        assert_eq!(alert.keyboard[0][0].action, "admin_confirm_3F9A21BC");
        assert_eq!(alert.keyboard[0][1].action, "admin_reject_3F9A21BC");
    }
}
