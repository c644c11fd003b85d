pub mod addr;
pub mod cache;
pub mod config;
pub mod hierarchy;
pub mod metrics;
pub mod report;
pub mod set;
pub mod sim;
pub mod sweep;
pub mod trace;

#[cfg(feature = "stat")]
pub mod stat;
