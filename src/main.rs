use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use tokio::{signal, sync::mpsc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use storefront_api as api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = Arc::new(api::events::EventSender::new(event_tx));
    tokio::spawn(api::events::process_events(event_rx));

    // Outbound notification channel (payment alerts, fulfillment)
    let notifier: Arc<dyn api::notifications::NotificationChannel> =
        match cfg.notification_webhook_url.clone() {
            Some(url) => {
                info!("Notification webhook configured: {}", url);
                Arc::new(api::notifications::WebhookNotifier::new(url))
            }
            None => {
                info!("Notification webhook not configured; outbound messages will be logged");
                Arc::new(api::notifications::LogNotifier)
            }
        };

    // Build services
    let catalog = Arc::new(api::services::catalog::CatalogService::new(
        db_arc.clone(),
        event_sender.clone(),
    ));
    let cart = Arc::new(api::services::cart::CartService::new(
        db_arc.clone(),
        event_sender.clone(),
    ));
    let discounts = Arc::new(api::services::discounts::DiscountService::new(
        db_arc.clone(),
    ));
    let payment_methods = Arc::new(api::services::payment_methods::PaymentMethodService::new(
        db_arc.clone(),
    ));
    let content = Arc::new(api::services::content::ContentService::new(db_arc.clone()));
    let orders = Arc::new(api::services::orders::OrderService::new(
        db_arc.clone(),
        event_sender.clone(),
    ));
    let confirmations = Arc::new(api::services::confirmation::ConfirmationService::new(
        db_arc.clone(),
        event_sender.clone(),
        notifier.clone(),
        content.clone(),
    ));

    // Conversation state and flows
    let sessions = Arc::new(api::checkout::SessionStore::new());
    let wizards = Arc::new(api::admin::AdminStateStore::new());
    let checkout = Arc::new(api::checkout::CheckoutFlow::new(
        sessions,
        catalog.clone(),
        cart.clone(),
        discounts.clone(),
        payment_methods.clone(),
        orders.clone(),
        content.clone(),
        notifier.clone(),
        event_sender.clone(),
        cfg.eur_usd_rate,
    ));
    let admin = Arc::new(api::admin::AdminFlow::new(
        wizards,
        catalog.clone(),
        cart.clone(),
        discounts,
        payment_methods,
        content.clone(),
        orders,
        confirmations,
    ));
    let dispatcher = Arc::new(api::chat::Dispatcher::new(
        cfg.operator_id,
        cfg.eur_usd_rate,
        catalog,
        cart,
        content,
        checkout,
        admin,
    ));

    // Compose shared app state
    let app_state = Arc::new(api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        dispatcher,
    });

    // Build CORS layer from config
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .filter_map(|origin| {
                    let trimmed = origin.trim();
                    if trimmed.is_empty() {
                        None
                    } else {
                        HeaderValue::from_str(trimmed).ok()
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    let cors_layer = if let Some(origins) = configured_origins {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        CorsLayer::permissive()
    } else {
        error!("Missing CORS configuration detected; set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true");
        anyhow::bail!(
            "Missing CORS configuration: set APP__CORS_ALLOWED_ORIGINS or APP__CORS_ALLOW_ANY_ORIGIN=true"
        );
    };

    let app = api::app_router(app_state).layer(cors_layer);

    // Bind and serve
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("🚀 storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
