pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod store;

pub use api::{create_router, start_api_server, AppState};
pub use client::{track, ApiClient, TrackOptions, TrackedRun, TrackedRunBuilder, DEFAULT_BASE_URL};
pub use config::AppConfig;
pub use domain::{
    Experiment, ExperimentComparison, ExperimentFilter, ExperimentStatus, ExperimentUpdate,
    NewExperiment,
};
pub use error::{Result, TrackerError};
pub use store::ExperimentStore;
