pub mod experiment;

pub use experiment::*;
