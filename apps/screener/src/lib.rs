//! Client for the resume screening service: single analysis, and bulk / reverse
//! batches whose results stream back incrementally.

pub mod batch;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod report;

pub use errors::{ErrorKind, ScreenerError, ScreenerResult};
