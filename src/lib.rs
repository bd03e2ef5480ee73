pub mod config;
pub mod dashboard;
pub mod edgar;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod trade;

// Re-exports
pub use config::MonitorConfig;
pub use pipeline::{RunStatus, RunSummary};
pub use trade::{TradeRecord, TransactionCode};
