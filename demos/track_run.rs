// Manual run tracking against a running exptrack server.
//
// Usage:
// 1. Start the server: cargo run -- serve
// 2. Run: EXPTRACK_URL=http://localhost:8000 cargo run --example track_run

use exptrack::TrackedRun;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info,exptrack=debug")
        .init();

    let base_url =
        std::env::var("EXPTRACK_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

    println!("🔌 Tracking against {}", base_url);

    let mut run = TrackedRun::builder("demo-cnn-baseline")
        .base_url(&base_url)
        .description("Baseline CNN with hand-picked hyperparameters")
        .dataset_version("v2.1")
        .start()
        .await?;

    println!("✅ Experiment #{} ({}) created", run.id(), run.name());

    run.log_param("lr", 0.001).await;
    run.log_param("batch_size", 32).await;
    run.log_param("optimizer", "adam").await;

    // Fake training loop
    let mut loss = 2.3_f64;
    for epoch in 1..=5 {
        loss *= 0.6;
        let accuracy = 1.0 - loss / 3.0;
        run.log_metric("loss", loss).await;
        run.log_metric("accuracy", accuracy).await;
        run.log_metric("epochs", epoch).await;
        println!("  epoch {}: loss={:.4} accuracy={:.4}", epoch, loss, accuracy);
    }

    let path = run
        .save_artifact("final_metrics", &json!({ "loss": loss, "epochs": 5 }))
        .await?;
    println!("💾 Artifact written to {}", path.display());

    run.end().await;
    println!("🏁 Run completed");

    Ok(())
}
