mod common;

use exptrack::api::types::ListExperimentsQuery;
use exptrack::domain::JsonMap;
use exptrack::{
    create_router, track, ApiClient, AppState, ExperimentStatus, ExperimentStore, TrackOptions,
    TrackedRun, TrackerError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn serve(store: ExperimentStore, listener: tokio::net::TcpListener) -> tokio::task::JoinHandle<()> {
    let state = AppState::new(Arc::new(store));
    let app = create_router(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    })
}

async fn spawn_server(store: ExperimentStore) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test listener");
    let addr = listener.local_addr().expect("failed to read listener addr");

    (format!("http://{addr}"), serve(store, listener))
}

async fn succeed() -> exptrack::Result<Value> {
    Ok(json!({ "accuracy": 0.95 }))
}

async fn fail_run() -> exptrack::Result<Value> {
    Err(TrackerError::Internal("training diverged".to_string()))
}

#[tokio::test]
async fn tracked_run_reports_to_server() {
    let Some(db) = common::TestDb::connect().await else {
        return;
    };
    let (base_url, server) = spawn_server(db.store.clone()).await;
    let artifacts_dir = tempfile::tempdir().expect("failed to create tempdir");

    let run_name = common::unique("it-run");
    let mut run = TrackedRun::builder(run_name.clone())
        .base_url(&base_url)
        .user("it-client")
        .description("integration run")
        .auto_git(false)
        .artifacts_dir(artifacts_dir.path())
        .start()
        .await
        .expect("failed to start tracked run");

    let id = run.id();
    assert!(id > 0);
    assert_eq!(run.name(), run_name);

    run.log_param("lr", 0.005).await;

    let mut metrics = JsonMap::new();
    metrics.insert("accuracy".to_string(), json!(0.9));
    metrics.insert("loss".to_string(), json!(0.31));
    run.log_metrics(metrics).await;

    let artifact_path = run
        .save_artifact("report", &json!({ "f1": 0.77 }))
        .await
        .expect("failed to save artifact");
    assert!(artifact_path.exists());

    run.end().await;

    let client = ApiClient::new(&base_url).expect("failed to build client");
    let exp = client
        .get_experiment(id)
        .await
        .expect("failed to fetch experiment");

    assert_eq!(exp.status, ExperimentStatus::Completed);
    assert_eq!(exp.user.as_deref(), Some("it-client"));
    assert_eq!(exp.params.get("lr"), Some(&json!(0.005)));
    assert_eq!(exp.metrics.get("accuracy"), Some(&json!(0.9)));
    assert_eq!(exp.metrics.get("loss"), Some(&json!(0.31)));

    let recorded = exp
        .artifacts
        .get("report")
        .and_then(|v| v.as_str())
        .expect("artifact path should be recorded");
    assert!(recorded.ends_with("report.json"), "got: {recorded}");

    client
        .delete_experiment(id)
        .await
        .expect("failed to delete experiment");
    let err = client
        .get_experiment(id)
        .await
        .expect_err("deleted experiment should be gone");
    assert!(err.is_not_found(), "unexpected error: {err}");

    server.abort();
}

#[tokio::test]
async fn track_records_success_and_failure() {
    let Some(db) = common::TestDb::connect().await else {
        return;
    };
    let (base_url, server) = spawn_server(db.store.clone()).await;
    let client = ApiClient::new(&base_url).expect("failed to build client");

    // Successful run: result becomes metrics, status completed
    let ok_user = common::unique("it-ok");
    let options = TrackOptions::new(common::unique("it-fn"))
        .base_url(&base_url)
        .user(&ok_user)
        .param("lr", 0.01);

    let value = track(options, succeed).await.expect("tracked fn failed");
    assert_eq!(value["accuracy"], json!(0.95));

    let query = ListExperimentsQuery {
        user: Some(ok_user),
        ..Default::default()
    };
    let rows = client
        .list_experiments(&query)
        .await
        .expect("failed to list experiments");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ExperimentStatus::Completed);
    assert_eq!(rows[0].params.get("lr"), Some(&json!(0.01)));
    assert_eq!(rows[0].metrics.get("accuracy"), Some(&json!(0.95)));

    // Failing run: error propagates, experiment marked failed
    let fail_user = common::unique("it-fail");
    let options = TrackOptions::new(common::unique("it-fn-fail"))
        .base_url(&base_url)
        .user(&fail_user);

    let result = track(options, fail_run).await;
    assert!(result.is_err());

    let query = ListExperimentsQuery {
        user: Some(fail_user),
        ..Default::default()
    };
    let rows = client
        .list_experiments(&query)
        .await
        .expect("failed to list experiments");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ExperimentStatus::Failed);

    server.abort();
}

#[tokio::test]
async fn start_fails_when_server_unreachable() {
    // Nothing listens on the discard port
    let result = TrackedRun::builder("unreachable")
        .base_url("http://127.0.0.1:9")
        .auto_git(false)
        .start()
        .await;
    assert!(result.is_err());

    let ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&ran);
    let result = track(
        TrackOptions::new("unreachable-fn").base_url("http://127.0.0.1:9"),
        move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, TrackerError>(Value::Null)
        },
    )
    .await;

    assert!(result.is_err());
    assert!(
        !ran.load(Ordering::SeqCst),
        "training must not run when the experiment cannot be created"
    );
}

#[tokio::test]
async fn logging_survives_server_going_away() {
    let Some(db) = common::TestDb::connect().await else {
        return;
    };
    let (base_url, server) = spawn_server(db.store.clone()).await;
    let artifacts_dir = tempfile::tempdir().expect("failed to create tempdir");

    let mut run = TrackedRun::builder(common::unique("it-offline"))
        .base_url(&base_url)
        .auto_git(false)
        .artifacts_dir(artifacts_dir.path())
        .start()
        .await
        .expect("failed to start tracked run");

    server.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Metric pushes fail against the dead server but must not error out
    run.log_metric("loss", 0.5).await;

    // Local artifact writes keep working
    let path = run
        .save_artifact("offline", &json!({ "ok": true }))
        .await
        .expect("local artifact write should succeed");
    assert!(path.exists());

    run.end().await;
}

#[tokio::test]
async fn sync_self_heals_after_server_restart() {
    let Some(db) = common::TestDb::connect().await else {
        return;
    };
    let (base_url, server) = spawn_server(db.store.clone()).await;
    let addr: std::net::SocketAddr = base_url["http://".len()..]
        .parse()
        .expect("server url should carry a socket addr");

    let mut run = TrackedRun::builder(common::unique("it-heal"))
        .base_url(&base_url)
        .auto_git(false)
        .start()
        .await
        .expect("failed to start tracked run");
    let id = run.id();

    run.log_param("alpha", 1).await;

    server.abort();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // This push hits a dead server and is swallowed
    run.log_metric("during_outage", 0.5).await;

    // Restart on the same address; the port stays free only briefly
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    let listener = loop {
        match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => break listener,
            Err(_) if std::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => panic!("failed to rebind {addr}: {e}"),
        }
    };
    let server = serve(db.store.clone(), listener);

    // The next push carries the complete local state, outage-era keys included
    run.log_metric("after_recovery", 0.9).await;
    run.end().await;

    let client = ApiClient::new(&base_url).expect("failed to build client");
    let exp = client
        .get_experiment(id)
        .await
        .expect("failed to fetch experiment");
    assert_eq!(exp.params.get("alpha"), Some(&json!(1)));
    assert_eq!(exp.metrics.get("during_outage"), Some(&json!(0.5)));
    assert_eq!(exp.metrics.get("after_recovery"), Some(&json!(0.9)));
    assert_eq!(exp.status, ExperimentStatus::Completed);

    server.abort();
}
