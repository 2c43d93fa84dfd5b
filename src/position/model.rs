//! Domain types for the day-ahead power position.

use chrono::{DateTime, FixedOffset, NaiveDate};
use std::path::PathBuf;

/// Volume traded for one hourly settlement period (numbered from 1).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerPeriod {
    pub period: u32,
    pub volume: f64,
}

/// A single trade: one volume per settlement period of its day.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerTrade {
    pub date: NaiveDate,
    pub periods: Vec<PowerPeriod>,
}

impl PowerTrade {
    /// A trade with `periods` zero-volume periods numbered 1..=periods
    pub fn create(date: NaiveDate, periods: usize) -> Self {
        Self {
            date,
            periods: (1..=periods as u32)
                .map(|period| PowerPeriod {
                    period,
                    volume: 0.0,
                })
                .collect(),
        }
    }

    /// A trade with the given volumes, numbered from period 1
    pub fn with_volumes(date: NaiveDate, volumes: &[f64]) -> Self {
        Self {
            date,
            periods: volumes
                .iter()
                .zip(1u32..)
                .map(|(&volume, period)| PowerPeriod { period, volume })
                .collect(),
        }
    }
}

/// All trades fetched for one computation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PowerTrades {
    /// The moment the computation was requested, in UK local time
    pub day: DateTime<FixedOffset>,
    pub trades: Vec<PowerTrade>,
}

/// Aggregated volume per settlement period.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub day: DateTime<FixedOffset>,
    pub periods: Vec<PowerPeriod>,
}

/// The formatted report, one line per entry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Report {
    pub day: DateTime<FixedOffset>,
    pub contents: Vec<String>,
}

/// How reports are formatted and where they are written.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReportSpec {
    pub output_dir: PathBuf,
    /// File name with a `{}` placeholder for the formatted date
    pub filename_format: String,
    /// `chrono` format applied to the report's local date and time
    pub filename_date_format: String,
    /// First line of every report
    pub headers: String,
    /// `chrono` format applied to each period's local start time
    pub local_time_format: String,
}

impl Default for ReportSpec {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("reports"),
            filename_format: "PowerPosition_{}.csv".to_string(),
            filename_date_format: "%Y%m%d_%H%M".to_string(),
            headers: "Local Time,Volume".to_string(),
            local_time_format: "%H:%M".to_string(),
        }
    }
}
