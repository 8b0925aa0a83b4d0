pub mod discount;
pub mod flow;
pub mod session;

pub use discount::{evaluate, DiscountDecision, RejectReason};
pub use flow::CheckoutFlow;
pub use session::{CheckoutSession, CheckoutStep, LineItem, OrderKind, SessionStore};
