//! Writes a day-ahead power position report at a fixed interval until
//! interrupted with Ctrl-C.

use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use powerflow::core::BoxError;
use powerflow::position::{build_pipeline, Environment, SimulatedTradeSource, ToolArgs};
use powerflow::sources::IntervalSource;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    let args = ToolArgs::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    args.validate()?;

    let token = CancellationToken::new();
    let source = SimulatedTradeSource::new().with_failure_rate(args.failure_rate);
    let env = Environment::new(
        Arc::new(source),
        args.report_spec(),
        args.buffer_size,
        token.clone(),
    );
    let pipeline = build_pipeline(&env)?;

    info!(
        interval_minutes = args.interval_minutes,
        output_dir = %args.output_dir.display(),
        "power position tool started"
    );

    let trigger = tokio::spawn(
        IntervalSource::new(args.interval())?.run(pipeline.entry().clone(), token.clone()),
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, stopping");
    pipeline.cancel();

    let completion = pipeline.completion().await;
    match trigger.await {
        Ok(submitted) => info!(submitted, "trigger stopped"),
        Err(e) => error!(error = %e, "trigger task failed"),
    }

    if completion.is_cancelled() {
        info!("the power position tool was cancelled");
    } else {
        info!("the power position tool completed");
    }
    Ok(())
}
