pub mod assembler;
pub mod classifier;
pub mod dedup;
pub mod normalizer;
pub mod predictor;
pub mod rolling;

pub use predictor::PredictionEngine;
