use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::error::Result;
use crate::store::ExperimentStore;

/// Start the API server
pub async fn start_api_server(store: Arc<ExperimentStore>, addr: &str) -> Result<()> {
    let app_state = AppState::new(store);
    let app = create_router(app_state);

    info!("🚀 API server listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
