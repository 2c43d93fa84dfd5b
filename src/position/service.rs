//! Sources of power trades.

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::error::PositionError;
use super::model::PowerTrade;
use super::settlement::SettlementDay;

/// Anything that can return the trades booked against a settlement date.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn trades(&self, date: NaiveDate) -> Result<Vec<PowerTrade>, PositionError>;
}

#[async_trait]
impl<S: TradeSource + ?Sized> TradeSource for Arc<S> {
    async fn trades(&self, date: NaiveDate) -> Result<Vec<PowerTrade>, PositionError> {
        (**self).trades(date).await
    }
}

/// Generates a random book of trades for any date.
///
/// Stands in for the trading system. Each call fails with probability
/// `failure_rate` and otherwise returns between one and `max_trades`
/// trades with the right number of periods for the date.
#[derive(Debug, Clone)]
pub struct SimulatedTradeSource {
    failure_rate: f64,
    max_trades: usize,
    latency: Duration,
}

impl SimulatedTradeSource {
    pub fn new() -> Self {
        Self {
            failure_rate: 0.0,
            max_trades: 5,
            latency: Duration::ZERO,
        }
    }

    /// Probability in `[0, 1]` that a call fails. Out of range values are clamped.
    pub fn with_failure_rate(mut self, failure_rate: f64) -> Self {
        self.failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_max_trades(mut self, max_trades: usize) -> Self {
        self.max_trades = max_trades.max(1);
        self
    }

    /// Delay applied to every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn generate(&self, date: NaiveDate, periods: usize) -> Result<Vec<PowerTrade>, PositionError> {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.failure_rate) {
            return Err(PositionError::Service(format!(
                "trade service unavailable for {}",
                date
            )));
        }

        let count = rng.gen_range(1..=self.max_trades);
        let trades = (0..count)
            .map(|_| {
                let volumes: Vec<f64> = (0..periods)
                    .map(|_| (rng.gen_range(-500.0..500.0_f64) * 100.0).round() / 100.0)
                    .collect();
                PowerTrade::with_volumes(date, &volumes)
            })
            .collect();
        Ok(trades)
    }
}

impl Default for SimulatedTradeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeSource for SimulatedTradeSource {
    async fn trades(&self, date: NaiveDate) -> Result<Vec<PowerTrade>, PositionError> {
        let periods = SettlementDay::for_date(date)?.periods;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.generate(date, periods)
    }
}

/// Returns the same trades for every date and records which dates were asked for.
#[derive(Debug, Clone, Default)]
pub struct StaticTradeSource {
    trades: Vec<PowerTrade>,
    requests: Arc<Mutex<Vec<NaiveDate>>>,
}

impl StaticTradeSource {
    pub fn new(trades: Vec<PowerTrade>) -> Self {
        Self {
            trades,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Dates requested so far, in call order
    pub async fn requests(&self) -> Vec<NaiveDate> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TradeSource for StaticTradeSource {
    async fn trades(&self, date: NaiveDate) -> Result<Vec<PowerTrade>, PositionError> {
        self.requests.lock().await.push(date);
        Ok(self.trades.clone())
    }
}
