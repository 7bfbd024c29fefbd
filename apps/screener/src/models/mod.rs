pub mod document;
pub mod result;

pub use document::{Document, TargetDocument};
pub use result::{MatchAnalysis, ScreeningResult, Verdict, VerdictThresholds};
