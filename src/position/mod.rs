//! Day-ahead power position reporting.
//!
//! The steps of a computation (fetch the day's trades, validate them,
//! aggregate them into a position, format the report, write it) are plain
//! functions in [`report`]. [`stages`] chains them into a
//! [`Pipeline`](crate::pipeline::Pipeline).

pub mod config;
mod error;
pub mod model;
pub mod report;
pub mod service;
pub mod settlement;
pub mod stages;

pub use config::ToolArgs;
pub use error::PositionError;
pub use model::{PowerPeriod, PowerTrade, PowerTrades, Position, Report, ReportSpec};
pub use service::{SimulatedTradeSource, StaticTradeSource, TradeSource};
pub use settlement::{local_times, settlement_day, SettlementDay};
pub use stages::{build_pipeline, Environment};
