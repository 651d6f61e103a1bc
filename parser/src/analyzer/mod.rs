#[allow(clippy::module_inception)]
pub mod analyzer;
pub mod debug_log;
pub mod event_dump;
pub mod lifecycle;

pub use analyzer::*;
pub use lifecycle::{LifecycleAnalyzer, MatchAnalysis, UnitStatus, analyze};
