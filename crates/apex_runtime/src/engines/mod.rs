pub mod llm;
pub mod orchestrator;

pub use orchestrator::{AnalysisEngine, AnalysisObserver, NoopObserver};
