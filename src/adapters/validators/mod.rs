//! Validator port adapters.

pub mod static_analysis;

pub use static_analysis::StaticAnalysisValidator;
