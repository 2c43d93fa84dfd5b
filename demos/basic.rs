//! Chaining stages and observing faults
//!
//! Run with: cargo run --example basic

use powerflow::prelude::*;

/// Example 1: three chained stages
async fn chain_example() -> Result<()> {
    println!("=== Chained stages ===");

    let collector = CollectSink::new();
    let pipeline = Pipeline::builder(CancellationToken::new())
        .stage(StageConfig::new("double").bounded(2), MapProcessor::new(|x: i64| 2 * x))
        .stage(StageConfig::new("add-one").bounded(2), MapProcessor::new(|y: i64| y + 1))
        .stage(
            StageConfig::new("to-string").bounded(2),
            MapProcessor::new(|z: i64| z.to_string()),
        )
        .sink(StageConfig::new("collect").bounded(2), collector.clone())?;

    IterSource::new(1..=5).run(pipeline.entry()).await;
    let completion = pipeline.shutdown().await;

    println!("completion: {:?}", completion);
    println!("outputs: {:?}", collector.values().await);
    Ok(())
}

/// Example 2: a failing stage short-circuits the rest of the chain
async fn fault_example() -> Result<()> {
    println!("\n=== Faults ===");

    let pipeline = Pipeline::builder(CancellationToken::new())
        .stage(StageConfig::new("double").bounded(2), MapProcessor::new(|x: i64| 2 * x))
        .stage(
            StageConfig::new("add-one").bounded(2),
            TryMapProcessor::new(|y: i64| {
                if y == 6 {
                    Err(Error::custom("six is not allowed"))
                } else {
                    Ok(y + 1)
                }
            }),
        )
        .sink(
            StageConfig::new("print").bounded(2),
            sink_from_fn(|outcome: Outcome<i64>| async move {
                match outcome {
                    Outcome::Ok(value) => println!("  ok: {}", value),
                    Outcome::Err(fault) => println!("  failed: {}", fault),
                }
                Ok::<(), Error>(())
            }),
        )?;

    IterSource::new(1..=5).run(pipeline.entry()).await;
    pipeline.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    chain_example().await?;
    fault_example().await?;
    Ok(())
}
