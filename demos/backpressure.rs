//! A slow sink holding back a fast producer
//!
//! Run with: cargo run --example backpressure

use std::time::{Duration, Instant};
use powerflow::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let pipeline = Pipeline::builder(CancellationToken::new())
        .stage(StageConfig::new("label").bounded(2), MapProcessor::new(|x: u32| format!("item-{}", x)))
        .sink(
            StageConfig::new("slow").bounded(2),
            sink_from_fn(|outcome: Outcome<String>| async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                if let Outcome::Ok(label) = outcome {
                    println!("  wrote {}", label);
                }
                Ok::<(), Error>(())
            }),
        )?;

    let started = Instant::now();
    for x in 0..10 {
        pipeline.submit(x).await?;
        println!("submitted {} after {:?}", x, started.elapsed());
    }

    pipeline.shutdown().await;
    println!("done after {:?}", started.elapsed());
    Ok(())
}
