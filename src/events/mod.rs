use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Event delivery must never abort the storefront operation that emitted it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropping event: {}", e);
        }
    }
}

// The events that can occur in the storefront.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded {
        client_id: i64,
        product_id: i32,
        quantity: i32,
    },
    CartCleared(i64),

    // Checkout events
    CheckoutStarted {
        client_id: i64,
        item_count: usize,
        total: Decimal,
    },
    DiscountApplied {
        client_id: i64,
        code: String,
        percentage: Decimal,
    },

    // Order events
    OrderPlaced {
        order_id: String,
        client_id: i64,
        total: Decimal,
    },
    OrderCompleted(String),
    OrderRejected(String),

    // Catalog events
    ProductCreated(i32),
    ProductUpdated(i32),
    ProductDeleted(i32),
    StockDepleted {
        product_id: i32,
        product_name: String,
    },
}

// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

// Drains the event channel and dispatches each event to its handler.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderPlaced {
                ref order_id,
                client_id,
                total,
            } => {
                if let Err(e) = handle_order_placed(order_id, client_id, total).await {
                    error!(
                        "Failed to handle order placed event: order_id={}, error={}",
                        order_id, e
                    );
                }
            }
            Event::StockDepleted {
                product_id,
                ref product_name,
            } => {
                warn!(
                    "Product sold out: id={}, name={:?}. Restock to keep it listed.",
                    product_id, product_name
                );
            }
            Event::OrderCompleted(ref order_id) => {
                info!("Order completed: {}", order_id);
            }
            Event::OrderRejected(ref order_id) => {
                warn!("Order rejected: {}", order_id);
            }
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}

async fn handle_order_placed(order_id: &str, client_id: i64, total: Decimal) -> Result<(), String> {
    info!(
        "Processing order placed event: order_id={}, client_id={}, total={}",
        order_id, client_id, total
    );
    Ok(())
}
