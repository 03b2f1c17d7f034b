//! Streak engine: records, persistence, transitions, sessions, rollup.

pub mod error;
pub mod machine;
pub mod notify;
pub mod rollup;
pub mod service;
pub mod session;
pub mod store;
pub mod types;

pub use error::{CreditError, ServiceError, StoreError};
pub use service::{StreakHandle, StreakService};
pub use types::{Population, StreakRecord, UserId};
