//! Tests for the discount code registry and for code redemption inside
//! the checkout conversation.

mod common;

use chrono::{Duration, Utc};
use common::{message_text, TestApp};
use rust_decimal_macros::dec;
use storefront_api::errors::ServiceError;
use storefront_api::services::discounts::UsageOutcome;

const BUYER: i64 = 1001;

// ==================== Registry ====================

#[tokio::test]
async fn codes_normalize_to_uppercase() {
    let app = TestApp::new().await;
    app.discounts
        .create_general(" summer20 ", dec!(15), None, -1)
        .await
        .expect("create code");

    let found = app
        .discounts
        .lookup("Summer20")
        .await
        .expect("lookup")
        .expect("code exists");
    assert_eq!(found.code, "SUMMER20");
    assert_eq!(found.discount_percentage, dec!(15));
    assert_eq!(found.max_uses, -1);
    assert!(found.is_general);
    assert!(found.is_active);

    assert!(app.discounts.lookup("  sUmMeR20 ").await.unwrap().is_some());
    assert!(app.discounts.lookup("WINTER20").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_definitions_are_rejected() {
    let app = TestApp::new().await;

    let empty = app.discounts.create_general("   ", dec!(10), None, -1).await;
    assert!(matches!(empty, Err(ServiceError::ValidationError(_))));

    let zero_pct = app.discounts.create_general("ZERO", dec!(0), None, -1).await;
    assert!(matches!(zero_pct, Err(ServiceError::ValidationError(_))));

    let over_pct = app.discounts.create_general("BIG", dec!(101), None, -1).await;
    assert!(matches!(over_pct, Err(ServiceError::ValidationError(_))));

    let zero_uses = app.discounts.create_general("NONE", dec!(10), None, 0).await;
    assert!(matches!(zero_uses, Err(ServiceError::ValidationError(_))));

    let negative_uses = app.discounts.create_general("NEG", dec!(10), None, -2).await;
    assert!(matches!(negative_uses, Err(ServiceError::ValidationError(_))));

    app.discounts
        .create_general("TAKEN", dec!(10), None, 5)
        .await
        .expect("first definition");
    let duplicate = app.discounts.create_general("taken", dec!(25), None, -1).await;
    assert!(matches!(duplicate, Err(ServiceError::ValidationError(_))));

    let unbound = app
        .discounts
        .create_client_bound("LONER", dec!(10), None, -1, None, None)
        .await;
    assert!(matches!(unbound, Err(ServiceError::ValidationError(_))));
}

#[tokio::test]
async fn usage_increments_stop_at_the_cap() {
    let app = TestApp::new().await;
    app.discounts
        .create_general("TWICE", dec!(10), None, 2)
        .await
        .expect("create code");

    assert_eq!(
        app.discounts.increment_usage("TWICE").await.unwrap(),
        UsageOutcome::Incremented
    );
    assert_eq!(
        app.discounts.increment_usage("twice").await.unwrap(),
        UsageOutcome::Incremented
    );
    assert_eq!(
        app.discounts.increment_usage("TWICE").await.unwrap(),
        UsageOutcome::CapReached
    );

    let code = app.discounts.lookup("TWICE").await.unwrap().unwrap();
    assert_eq!(code.used_count, 2);
}

#[tokio::test]
async fn unlimited_codes_never_cap() {
    let app = TestApp::new().await;
    app.discounts
        .create_general("FOREVER", dec!(5), None, -1)
        .await
        .expect("create code");

    for _ in 0..5 {
        assert_eq!(
            app.discounts.increment_usage("FOREVER").await.unwrap(),
            UsageOutcome::Incremented
        );
    }
    assert_eq!(
        app.discounts.lookup("FOREVER").await.unwrap().unwrap().used_count,
        5
    );
}

#[tokio::test]
async fn missing_codes_consume_nothing() {
    let app = TestApp::new().await;

    assert_eq!(
        app.discounts.increment_usage("GHOST").await.unwrap(),
        UsageOutcome::CapReached
    );
}

// ==================== Redemption in checkout ====================

/// Walks a buy-now checkout to the discount prompt.
async fn open_discount_prompt(app: &TestApp, client_id: i64, product_id: i32) {
    let messages = app
        .send_action(client_id, &format!("buy_now_{}", product_id))
        .await;
    assert!(message_text(&messages[0]).contains("Do you have a discount code?"));
}

#[tokio::test]
async fn a_valid_code_reprices_the_order() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;
    app.discounts
        .create_general("SAVE20", dec!(20), None, -1)
        .await
        .expect("create code");

    open_discount_prompt(&app, BUYER, kit).await;

    let messages = app.send_text(BUYER, "save20").await;
    let applied = message_text(&messages[0]);
    assert!(applied.starts_with("🎫 Discount Applied!"));
    assert!(applied.contains("💰 Original: 25.00€"));
    assert!(applied.contains("📊 Discount: 20%"));
    assert!(applied.contains("💵 New Total: 20.00€ ($22.00)"));

    app.send_action(BUYER, "continue_to_payment").await;
    app.send_action(BUYER, "payment_btc").await;
    app.send_action(BUYER, "payment_made").await;
    let messages = app.send_text(BUYER, "bc1qsender").await;
    assert!(message_text(&messages[0]).contains("💰 Total: 20.00€"));

    let rows = app.orders.pending_rows().await.expect("pending rows");
    assert_eq!(rows[0].total_price, dec!(20.00));
    assert_eq!(rows[0].discount_code.as_deref(), Some("SAVE20"));

    let alerts = app.notifier.operator_messages();
    assert!(alerts[0].text.contains("🎫 Discount Code: SAVE20"));

    // the use is consumed at commit
    let code = app.discounts.lookup("SAVE20").await.unwrap().unwrap();
    assert_eq!(code.used_count, 1);
}

#[tokio::test]
async fn unknown_codes_keep_the_buyer_on_the_prompt() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;
    app.discounts
        .create_general("SAVE20", dec!(20), None, -1)
        .await
        .expect("create code");

    open_discount_prompt(&app, BUYER, kit).await;

    let messages = app.send_text(BUYER, "WRONG1").await;
    assert_eq!(
        message_text(&messages[0]),
        "❌ Invalid discount code. Please try again or press 'No Code':"
    );

    // a second wrong attempt is handled the same way
    let messages = app.send_text(BUYER, "WRONG2").await;
    assert!(message_text(&messages[0]).starts_with("❌ Invalid discount code."));

    // and the buyer can still land the real one
    let messages = app.send_text(BUYER, "SAVE20").await;
    assert!(message_text(&messages[0]).starts_with("🎫 Discount Applied!"));
}

#[tokio::test]
async fn expired_codes_are_refused() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;

    let yesterday = (Utc::now() - Duration::days(1)).date_naive();
    app.discounts
        .create_general("OLDIE", dec!(20), Some(yesterday), -1)
        .await
        .expect("create code");

    // a code expiring today is still honoured
    let today = Utc::now().date_naive();
    app.discounts
        .create_general("TODAY", dec!(10), Some(today), -1)
        .await
        .expect("create code");

    open_discount_prompt(&app, BUYER, kit).await;

    let messages = app.send_text(BUYER, "OLDIE").await;
    assert_eq!(
        message_text(&messages[0]),
        "❌ Discount code has expired. Please try another code or press 'No Code':"
    );

    let messages = app.send_text(BUYER, "TODAY").await;
    assert!(message_text(&messages[0]).starts_with("🎫 Discount Applied!"));
}

#[tokio::test]
async fn exhausted_codes_are_refused() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;
    app.discounts
        .create_general("ONCE", dec!(20), None, 1)
        .await
        .expect("create code");
    app.discounts
        .increment_usage("ONCE")
        .await
        .expect("consume the only use");

    open_discount_prompt(&app, BUYER, kit).await;

    let messages = app.send_text(BUYER, "ONCE").await;
    assert_eq!(
        message_text(&messages[0]),
        "❌ Discount code has reached maximum uses. Please try another code or press 'No Code':"
    );
}

#[tokio::test]
async fn client_bound_codes_stay_personal() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;
    let stranger: i64 = 1002;
    app.discounts
        .create_client_bound("VIPDEAL", dec!(30), None, -1, Some(BUYER), None)
        .await
        .expect("create bound code");

    open_discount_prompt(&app, stranger, kit).await;
    let messages = app.send_text(stranger, "VIPDEAL").await;
    assert_eq!(
        message_text(&messages[0]),
        "❌ This discount code is not for you. Please try another code or press 'No Code':"
    );

    open_discount_prompt(&app, BUYER, kit).await;
    let messages = app.send_text(BUYER, "VIPDEAL").await;
    assert!(message_text(&messages[0]).contains("📊 Discount: 30%"));
}

#[tokio::test]
async fn username_bound_codes_match_the_handle() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;

    // the harness posts events with username "user<id>"
    app.discounts
        .create_client_bound("HANDLE10", dec!(10), None, -1, None, Some("user1001".to_string()))
        .await
        .expect("create bound code");

    open_discount_prompt(&app, 1002, kit).await;
    let messages = app.send_text(1002, "HANDLE10").await;
    assert!(message_text(&messages[0]).starts_with("❌ This discount code is not for you."));

    open_discount_prompt(&app, BUYER, kit).await;
    let messages = app.send_text(BUYER, "HANDLE10").await;
    assert!(message_text(&messages[0]).starts_with("🎫 Discount Applied!"));
}

#[tokio::test]
async fn skipping_the_discount_keeps_the_full_price() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;

    open_discount_prompt(&app, BUYER, kit).await;
    let messages = app.send_action(BUYER, "no_discount").await;
    assert!(message_text(&messages[0]).contains("💰 Total: 25.00€"));

    app.send_action(BUYER, "payment_btc").await;
    app.send_action(BUYER, "payment_made").await;
    app.send_text(BUYER, "bc1qsender").await;

    let rows = app.orders.pending_rows().await.expect("pending rows");
    assert_eq!(rows[0].total_price, dec!(25.00));
    assert_eq!(rows[0].discount_code, None);
}

// ==================== The cap under concurrency ====================

#[tokio::test]
async fn a_single_use_code_cannot_be_spent_twice() {
    let app = TestApp::new().await;
    let kit = app.seed_product("Starter Kit", dec!(25.00), 5).await;
    app.seed_payment_method("btc", "bc1qstorefront").await;
    app.discounts
        .create_general("LASTONE", dec!(20), None, 1)
        .await
        .expect("create code");
    let rival: i64 = 1002;

    // both buyers validate the code before either commits
    for buyer in [BUYER, rival] {
        open_discount_prompt(&app, buyer, kit).await;
        let messages = app.send_text(buyer, "LASTONE").await;
        assert!(message_text(&messages[0]).starts_with("🎫 Discount Applied!"));
        app.send_action(buyer, "continue_to_payment").await;
        app.send_action(buyer, "payment_btc").await;
        app.send_action(buyer, "payment_made").await;
    }

    let messages = app.send_text(BUYER, "bc1qfirst").await;
    assert!(message_text(&messages[0]).starts_with("✅ Notified admin"));

    // the slower buyer loses the race at commit and is sent back to retry
    let messages = app.send_text(rival, "bc1qsecond").await;
    assert_eq!(messages.len(), 2);
    assert_eq!(
        message_text(&messages[0]),
        "⚠️ Discount code LASTONE has no uses left."
    );
    assert!(message_text(&messages[1]).starts_with("💳 Choose payment method:"));

    let code = app.discounts.lookup("LASTONE").await.unwrap().unwrap();
    assert_eq!(code.used_count, 1, "the failed commit consumed nothing");

    let rows = app.orders.pending_rows().await.expect("pending rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].client_id, BUYER);
    assert_eq!(rows[0].total_price, dec!(20.00));

    // stock from the rolled-back commit was returned
    assert_eq!(app.catalog.get(kit).await.unwrap().unwrap().quantity, 4);
}
