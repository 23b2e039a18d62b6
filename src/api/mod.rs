//! Typed endpoint methods on [`DashboardClient`](crate::service::DashboardClient),
//! grouped by feature area. Reads go through the query cache; mutations hit
//! the transport directly and invalidate their dependent cache keys only
//! after the server confirmed success.

mod alerts;
mod analytics;
mod market;
mod patterns;
mod scanner;
mod trading;

pub use alerts::AlertResponse;
pub use analytics::DetectionLogQuery;
pub use patterns::SignalRequest;
pub use scanner::ScanSettings;
pub use trading::{CloseRequest, PreTradeCheck, ProfileData, TradeRequest};
