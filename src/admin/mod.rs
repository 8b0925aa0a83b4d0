//! Operator panel: catalog curation, content pages, payment settings,
//! discount inventory, statistics, and manual order resolution.

pub mod flow;
pub mod screens;
pub mod state;

pub use flow::AdminFlow;
pub use state::{AdminStateStore, AdminWizard};
