/// Prediction pipeline orchestration
pub mod executor;
/// Prediction results and follow-up queries
pub mod result;
