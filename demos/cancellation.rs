//! Stopping a periodic pipeline with a deadline
//!
//! Run with: cargo run --example cancellation

use chrono::{DateTime, Utc};
use std::time::Duration;
use powerflow::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let token = CancellationToken::new();
    let pipeline = Pipeline::builder(token.clone())
        .stage(
            StageConfig::new("work").bounded(1),
            processor_from_fn(|at: DateTime<Utc>| async move {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok::<_, Error>(at.format("%H:%M:%S%.3f").to_string())
            }),
        )
        .sink(
            StageConfig::new("print").bounded(1),
            sink_from_fn(|outcome: Outcome<String>| async move {
                println!("  {:?}", outcome.into_result());
                Ok::<(), Error>(())
            }),
        )?;

    cancel_after(token.clone(), Duration::from_secs(2));
    let submitted = IntervalSource::new(Duration::from_millis(250))?
        .run(pipeline.entry().clone(), token.clone())
        .await;

    let completion = pipeline.completion().await;
    println!("submitted {}, finished with {:?}", submitted, completion);
    for (stage, state) in pipeline.stage_states() {
        println!("  {}: {:?}", stage, state);
    }
    Ok(())
}
