//! 分配模块
//!
//! - [`strategy`]: pluggable agent selection
//! - [`ledger`]: assignment lifecycle and history

pub mod ledger;
pub mod strategy;

pub use ledger::{AssignmentLedger, AutoAssignOutcome};
pub use strategy::{AssignmentStrategy, LeastLoadedStrategy, RoundRobinStrategy, strategy_from_name};
