// Wrapping a whole training function with track().
//
// Usage:
// 1. Start the server: cargo run -- serve
// 2. Run: EXPTRACK_URL=http://localhost:8000 cargo run --example tracked_fn

use exptrack::{track, Result, TrackOptions};
use serde::Serialize;

#[derive(Serialize)]
struct TrainingReport {
    accuracy: f64,
    loss: f64,
    epochs: u32,
}

async fn train() -> Result<TrainingReport> {
    let epochs = 3;
    let mut loss = 1.8_f64;

    for _ in 0..epochs {
        loss *= 0.5;
    }

    Ok(TrainingReport {
        accuracy: 1.0 - loss,
        loss,
        epochs,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,exptrack=debug")
        .init();

    let base_url =
        std::env::var("EXPTRACK_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

    let options = TrackOptions::new("demo-tracked-fn")
        .base_url(&base_url)
        .description("Function-wrapped training run")
        .param("lr", 0.01)
        .param("epochs", 3);

    let report = track(options, train).await?;

    println!(
        "🏁 Training done: accuracy={:.2} loss={:.2}",
        report.accuracy, report.loss
    );

    Ok(())
}
