pub mod postgres;

pub use postgres::ExperimentStore;
