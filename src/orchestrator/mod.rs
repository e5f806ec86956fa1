//! 試行とリトライのオーケストレーション

mod attempt;
mod retry;
mod types;

pub use attempt::AttemptOrchestrator;
pub use retry::RetryOrchestrator;
pub use types::{AttemptFailure, AttemptResult, RunMetadata, RunSummary};
