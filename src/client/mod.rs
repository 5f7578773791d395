pub mod rest;
pub mod run;
pub mod track;

pub use rest::{ApiClient, DEFAULT_BASE_URL};
pub use run::{TrackedRun, TrackedRunBuilder};
pub use track::{track, TrackOptions};
