//! The position computation as a five stage pipeline:
//!
//! `fetch-trades → validate-trades → build-position → build-report → write-report`
//!
//! Every stage is bounded by the environment's buffer size and observes its
//! cancellation token.

use async_trait::async_trait;
use chrono::{DateTime, Offset, Utc};
use chrono_tz::Europe::London;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::model::{PowerTrades, Position, Report, ReportSpec};
use super::report::{build_position, build_report, fetch_trades, validate_trades, write_report};
use super::service::TradeSource;
use crate::core::{BoxError, Outcome, Processor, Result, Sink};
use crate::pipeline::{Pipeline, StageConfig};
use crate::util::CancellableExt;

/// Everything a position pipeline needs, built once at startup.
#[derive(Clone)]
pub struct Environment {
    pub source: Arc<dyn TradeSource>,
    pub spec: Arc<ReportSpec>,
    /// Capacity of every stage
    pub buffer_size: usize,
    pub token: CancellationToken,
}

impl Environment {
    pub fn new(
        source: Arc<dyn TradeSource>,
        spec: ReportSpec,
        buffer_size: usize,
        token: CancellationToken,
    ) -> Self {
        Self {
            source,
            spec: Arc::new(spec),
            buffer_size,
            token,
        }
    }

    fn stage(&self, name: &str) -> StageConfig {
        StageConfig::new(name).bounded(self.buffer_size)
    }
}

/// Assemble and start the position pipeline. Each submitted instant
/// produces one report.
pub fn build_pipeline(env: &Environment) -> Result<Pipeline<DateTime<Utc>>> {
    Pipeline::builder(env.token.clone())
        .stage(
            env.stage("fetch-trades"),
            FetchTrades {
                source: env.source.clone(),
                token: env.token.clone(),
            },
        )
        .stage(env.stage("validate-trades"), ValidateTrades)
        .stage(env.stage("build-position"), BuildPosition)
        .stage(
            env.stage("build-report"),
            BuildReport {
                spec: env.spec.clone(),
            },
        )
        .sink(
            env.stage("write-report"),
            WriteReport {
                spec: env.spec.clone(),
            },
        )
}

/// Requests the trades for the UK local date of the submitted instant.
pub struct FetchTrades {
    source: Arc<dyn TradeSource>,
    token: CancellationToken,
}

#[async_trait]
impl Processor for FetchTrades {
    type Input = DateTime<Utc>;
    type Output = PowerTrades;

    async fn process(&self, at: DateTime<Utc>) -> std::result::Result<PowerTrades, BoxError> {
        let local = at.with_timezone(&London);
        let day = local.with_timezone(&local.offset().fix());
        let trades = fetch_trades(self.source.as_ref(), day)
            .cancellable(self.token.clone())
            .await??;
        Ok(trades)
    }

    fn describe(&self, at: &DateTime<Utc>) -> Option<String> {
        Some(format!("getting trades for {}", at.with_timezone(&London)))
    }
}

pub struct ValidateTrades;

#[async_trait]
impl Processor for ValidateTrades {
    type Input = PowerTrades;
    type Output = PowerTrades;

    async fn process(&self, trades: PowerTrades) -> std::result::Result<PowerTrades, BoxError> {
        Ok(validate_trades(trades)?)
    }

    fn describe(&self, trades: &PowerTrades) -> Option<String> {
        Some(format!("validating trades for {}", trades.day))
    }
}

pub struct BuildPosition;

#[async_trait]
impl Processor for BuildPosition {
    type Input = PowerTrades;
    type Output = Position;

    async fn process(&self, trades: PowerTrades) -> std::result::Result<Position, BoxError> {
        Ok(build_position(trades)?)
    }

    fn describe(&self, trades: &PowerTrades) -> Option<String> {
        Some(format!("building position for {}", trades.day))
    }
}

pub struct BuildReport {
    spec: Arc<ReportSpec>,
}

#[async_trait]
impl Processor for BuildReport {
    type Input = Position;
    type Output = Report;

    async fn process(&self, position: Position) -> std::result::Result<Report, BoxError> {
        Ok(build_report(&self.spec, position)?)
    }

    fn describe(&self, position: &Position) -> Option<String> {
        Some(format!("building report for {}", position.day))
    }
}

/// Writes successful reports to disk; failed computations are logged and
/// dropped.
pub struct WriteReport {
    spec: Arc<ReportSpec>,
}

impl WriteReport {
    async fn write_one(&self, report: &Report) -> std::result::Result<PathBuf, BoxError> {
        Ok(write_report(&self.spec, report).await?)
    }
}

#[async_trait]
impl Sink for WriteReport {
    type Item = Report;

    async fn write(&self, outcome: Outcome<Report>) -> std::result::Result<(), BoxError> {
        match outcome {
            Outcome::Ok(report) => {
                let path = self.write_one(&report).await?;
                info!(day = %report.day, path = %path.display(), "position report written");
                Ok(())
            }
            Outcome::Err(fault) => {
                error!(context = %fault.context(), cause = %fault.cause(), "no report written");
                Ok(())
            }
        }
    }

    fn describe(&self, report: &Report) -> Option<String> {
        Some(format!("writing report for {}", report.day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Completion;
    use crate::position::model::PowerTrade;
    use crate::position::service::{SimulatedTradeSource, StaticTradeSource};
    use chrono::{NaiveDate, TimeZone};

    fn env(source: Arc<dyn TradeSource>, dir: &std::path::Path) -> Environment {
        let spec = ReportSpec {
            output_dir: dir.to_path_buf(),
            ..ReportSpec::default()
        };
        Environment::new(source, spec, 2, CancellationToken::new())
    }

    #[tokio::test]
    async fn one_submission_writes_one_report() {
        let dir = tempfile::tempdir().expect("temp dir");
        let date = NaiveDate::from_ymd_opt(2015, 5, 10).expect("valid date");
        let source = StaticTradeSource::new(vec![
            PowerTrade::with_volumes(date, &[10.0; 24]),
            PowerTrade::with_volumes(date, &[5.0; 24]),
        ]);
        let pipeline = build_pipeline(&env(Arc::new(source.clone()), dir.path())).expect("pipeline");

        // 11:05 UTC is 12:05 BST
        let at = Utc.with_ymd_and_hms(2015, 5, 10, 11, 5, 0).single().expect("valid time");
        pipeline.submit(at).await.expect("accepted");
        assert_eq!(pipeline.shutdown().await, Completion::Completed);

        assert_eq!(source.requests().await, vec![date]);
        let written = std::fs::read_to_string(dir.path().join("PowerPosition_20150510_1205.csv"))
            .expect("report written");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 25);
        assert_eq!(lines[0], "Local Time,Volume");
        assert_eq!(lines[1], "23:00,15");
    }

    #[tokio::test]
    async fn invalid_trades_write_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let date = NaiveDate::from_ymd_opt(2015, 5, 10).expect("valid date");
        let source = StaticTradeSource::new(vec![PowerTrade::create(date, 23)]);
        let pipeline = build_pipeline(&env(Arc::new(source), dir.path())).expect("pipeline");

        let at = Utc.with_ymd_and_hms(2015, 5, 10, 11, 5, 0).single().expect("valid time");
        pipeline.submit(at).await.expect("accepted");
        assert_eq!(pipeline.shutdown().await, Completion::Completed);

        assert_eq!(std::fs::read_dir(dir.path()).expect("listable").count(), 0);
    }

    #[tokio::test]
    async fn service_failure_is_dropped_at_the_sink() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = SimulatedTradeSource::new().with_failure_rate(1.0);
        let pipeline = build_pipeline(&env(Arc::new(source), dir.path())).expect("pipeline");

        pipeline.submit(Utc::now()).await.expect("accepted");
        assert_eq!(pipeline.shutdown().await, Completion::Completed);
        assert_eq!(std::fs::read_dir(dir.path()).expect("listable").count(), 0);
    }
}
