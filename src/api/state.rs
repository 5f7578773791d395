use crate::store::ExperimentStore;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Database-backed experiment store
    pub store: Arc<ExperimentStore>,
}

impl AppState {
    pub fn new(store: Arc<ExperimentStore>) -> Self {
        Self { store }
    }
}
