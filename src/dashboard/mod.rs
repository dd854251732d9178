//! The dashboard: this month's totals, recent transactions and exceeded spending limits.
//!
//! The same figures are available as JSON for client-side widgets.

mod handlers;
mod stats;

pub use handlers::{DashboardState, get_dashboard_page, get_dashboard_stats_api};
pub use stats::{
    DashboardStats, RECENT_TRANSACTION_COUNT, RecentTransaction, SpendingLimitAlert,
    get_dashboard_stats, get_exceeded_limits, month_bounds,
};
