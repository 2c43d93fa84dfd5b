//! The steps of a position computation.
//!
//! Each step is a plain function (async where it does I/O) so it can be
//! tested without a pipeline. [`super::stages`] wraps them as stage
//! functions.

use chrono::{DateTime, FixedOffset};
use std::path::PathBuf;
use tracing::debug;

use super::error::PositionError;
use super::model::{PowerTrade, PowerTrades, Position, Report, ReportSpec};
use super::service::TradeSource;
use super::settlement::{local_times, settlement_day};

/// Fetch every trade for the settlement day containing `day`.
pub async fn fetch_trades<S>(source: &S, day: DateTime<FixedOffset>) -> Result<PowerTrades, PositionError>
where
    S: TradeSource + ?Sized,
{
    let trades = source.trades(day.date_naive()).await?;
    Ok(PowerTrades { day, trades })
}

/// Reject the batch if any trade's period count differs from the settlement day's.
pub fn validate_trades(trades: PowerTrades) -> Result<PowerTrades, PositionError> {
    let expected = settlement_day(trades.day)?.periods;
    if trades.trades.iter().any(|t| t.periods.len() != expected) {
        return Err(PositionError::InvalidTrades {
            day: trades.day,
            expected,
        });
    }
    Ok(trades)
}

/// Sum the volume of every trade per period.
pub fn build_position(trades: PowerTrades) -> Result<Position, PositionError> {
    let periods = settlement_day(trades.day)?.periods;
    let seed = PowerTrade::create(trades.day.date_naive(), periods).periods;

    let periods = trades.trades.iter().fold(seed, |mut acc, trade| {
        for (total, period) in acc.iter_mut().zip(&trade.periods) {
            total.volume += period.volume;
        }
        acc
    });

    Ok(Position {
        day: trades.day,
        periods,
    })
}

/// Format a position as the header line followed by one
/// `<local time>,<volume>` line per period.
pub fn build_report(spec: &ReportSpec, position: Position) -> Result<Report, PositionError> {
    let times = local_times(position.day)?;
    let lines = position.periods.iter().zip(times).map(|(period, time)| {
        format!(
            "{},{}",
            time.format(&spec.local_time_format),
            period.volume
        )
    });

    let contents = std::iter::once(spec.headers.clone()).chain(lines).collect();
    Ok(Report {
        day: position.day,
        contents,
    })
}

/// The path a report for `day` is written to.
pub fn report_path(spec: &ReportSpec, day: DateTime<FixedOffset>) -> PathBuf {
    let date = day.format(&spec.filename_date_format).to_string();
    spec.output_dir
        .join(spec.filename_format.replacen("{}", &date, 1))
}

/// Write a report next to its final name, then rename it into place so
/// readers never observe a partial file.
pub async fn write_report(spec: &ReportSpec, report: &Report) -> Result<PathBuf, PositionError> {
    tokio::fs::create_dir_all(&spec.output_dir).await?;

    let path = report_path(spec, report.day);
    let mut temporary = path.clone().into_os_string();
    temporary.push(".tmp");
    let temporary = PathBuf::from(temporary);

    let mut body = report.contents.join("\n");
    body.push('\n');
    tokio::fs::write(&temporary, body).await?;
    tokio::fs::rename(&temporary, &path).await?;

    debug!(path = %path.display(), lines = report.contents.len(), "report written");
    Ok(path)
}
