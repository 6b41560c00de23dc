//! Dashboard controller for Meteora
//!
//! Connects UI events to the weather gateway and the state store, and runs
//! the auto-refresh timer.

pub mod dashboard;
pub mod events;
pub mod refresh;
pub mod search;

pub use dashboard::{needs_refresh, Dashboard};
pub use events::{DashboardEvent, Feedback};
pub use refresh::AutoRefresh;
pub use search::SearchDebouncer;
