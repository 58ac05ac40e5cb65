//! Shared-account coordination and message-passing vector products.
//!
//! Two independent pieces live here:
//!
//! - [`account`], [`accrual`], [`messages`] and [`teller`]: one balance
//!   behind one lock, mutated by a sequential foreground context and by a
//!   periodic accrual thread.
//! - [`partition`], [`worker`], [`aggregate`] and [`pool`]: an elementwise
//!   product split into contiguous ranges, computed on isolated threads and
//!   reassembled in index order.

pub mod account;
pub mod accrual;
pub mod aggregate;
pub mod config;
pub mod error;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod messages;
pub mod partition;
pub mod pool;
pub mod teller;
pub mod worker;

pub use account::SharedAccount;
pub use accrual::{AccrualHandle, AccrualScheduler};
pub use config::Config;
pub use error::{ConfigError, PoolError, SchedulerError, TellerError, WorkerError};
pub use partition::Partition;
pub use pool::{MultiplyReport, PoolState, WorkerPool};
pub use teller::{Command, Outcome, Teller};
