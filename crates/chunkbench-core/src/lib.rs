//! Bounded concurrent chunk dispatch, result collection and the sweep driver

pub mod aggregate;
pub mod dispatch;
pub mod driver;
pub mod partition;
pub mod payload;
pub mod pool;
pub mod report;

pub use aggregate::{Collector, Event, EventSender, ResultRecord, SweepSummary};
pub use dispatch::{dispatch, Dispatcher, SweepStats};
pub use driver::run_benchmark;
pub use partition::{partition, Partition};
pub use pool::{Token, TokenPool};
pub use report::Report;
