//! Command line and environment configuration for the report tool.

use chrono::format::{Item, StrftimeItems};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use super::error::PositionError;
use super::model::ReportSpec;

/// Produces a day-ahead power position report at a fixed interval.
#[derive(Debug, Clone, Parser)]
#[command(name = "power-position", version, about)]
pub struct ToolArgs {
    /// Minutes between reports; the first report is produced immediately
    #[arg(long, env = "POWER_POSITION_INTERVAL_MINUTES", default_value_t = 5)]
    pub interval_minutes: u64,

    /// Capacity of every pipeline stage
    #[arg(long, env = "POWER_POSITION_BUFFER_SIZE", default_value_t = 4)]
    pub buffer_size: usize,

    #[arg(long, env = "POWER_POSITION_OUTPUT_DIR", default_value = "./reports")]
    pub output_dir: PathBuf,

    /// Report file name, `{}` is replaced with the formatted date
    #[arg(long, env = "POWER_POSITION_FILENAME_FORMAT", default_value = "PowerPosition_{}.csv")]
    pub filename_format: String,

    #[arg(long, env = "POWER_POSITION_FILENAME_DATE_FORMAT", default_value = "%Y%m%d_%H%M")]
    pub filename_date_format: String,

    #[arg(long, env = "POWER_POSITION_HEADERS", default_value = "Local Time,Volume")]
    pub headers: String,

    #[arg(long, env = "POWER_POSITION_LOCAL_TIME_FORMAT", default_value = "%H:%M")]
    pub local_time_format: String,

    /// Probability that a call to the simulated trade service fails
    #[arg(long, env = "POWER_POSITION_FAILURE_RATE", default_value_t = 0.0)]
    pub failure_rate: f64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "POWER_POSITION_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ToolArgs {
    /// Check the values clap cannot.
    pub fn validate(&self) -> Result<(), PositionError> {
        if self.interval_minutes == 0 {
            return Err(invalid("interval must be at least one minute"));
        }
        if self.interval_minutes.checked_mul(60).is_none() {
            return Err(invalid(format!(
                "interval of {} minutes is too long",
                self.interval_minutes
            )));
        }
        if self.buffer_size == 0 {
            return Err(invalid("buffer size must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(invalid(format!(
                "failure rate {} is not between 0 and 1",
                self.failure_rate
            )));
        }
        if !self.filename_format.contains("{}") {
            return Err(invalid(format!(
                "filename format '{}' has no '{{}}' placeholder",
                self.filename_format
            )));
        }
        for format in [&self.filename_date_format, &self.local_time_format] {
            if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                return Err(invalid(format!("'{}' is not a valid date format", format)));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn report_spec(&self) -> ReportSpec {
        ReportSpec {
            output_dir: self.output_dir.clone(),
            filename_format: self.filename_format.clone(),
            filename_date_format: self.filename_date_format.clone(),
            headers: self.headers.clone(),
            local_time_format: self.local_time_format.clone(),
        }
    }
}

fn invalid(message: impl Into<String>) -> PositionError {
    PositionError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ToolArgs {
        ToolArgs::try_parse_from(std::iter::once("power-position").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn defaults_match_the_report_format() {
        let args = parse(&[]);
        args.validate().expect("defaults are valid");

        assert_eq!(args.interval(), Duration::from_secs(300));
        assert_eq!(args.buffer_size, 4);
        let spec = args.report_spec();
        assert_eq!(spec.output_dir, PathBuf::from("./reports"));
        assert_eq!(spec.filename_format, "PowerPosition_{}.csv");
        assert_eq!(spec.filename_date_format, "%Y%m%d_%H%M");
        assert_eq!(spec.headers, "Local Time,Volume");
        assert_eq!(spec.local_time_format, "%H:%M");
    }

    #[test]
    fn flags_override_defaults() {
        let args = parse(&[
            "--interval-minutes",
            "1",
            "--buffer-size",
            "8",
            "--output-dir",
            "/tmp/positions",
            "--failure-rate",
            "0.25",
        ]);
        args.validate().expect("valid");

        assert_eq!(args.interval(), Duration::from_secs(60));
        assert_eq!(args.buffer_size, 8);
        assert_eq!(args.report_spec().output_dir, PathBuf::from("/tmp/positions"));
        assert_eq!(args.failure_rate, 0.25);
    }

    #[test]
    fn rejects_unusable_values() {
        for bad in [
            &["--interval-minutes", "0"][..],
            &["--interval-minutes", "18446744073709551615"][..],
            &["--buffer-size", "0"][..],
            &["--failure-rate", "1.5"][..],
            &["--filename-format", "report.csv"][..],
            &["--local-time-format", "%Q"][..],
        ] {
            let err = parse(bad).validate().expect_err("should be rejected");
            assert!(matches!(err, PositionError::InvalidConfig(_)), "{:?}", bad);
        }
    }
}
