// Bulk and reverse screening: request packaging, the progress stream protocol,
// and the result store the presentation layer reads from.

pub mod events;
pub mod frames;
pub mod request;
pub mod store;
pub mod submitter;
pub mod ticker;

pub use events::{Completion, ProgressEvent};
pub use request::{BatchMode, BatchRequest};
pub use store::{BatchPhase, BatchResultStore, ResultFilter, SortDirection, SortKey, SortSpec};
pub use submitter::{BatchOutcome, BatchStream, BatchSubmitter};
pub use ticker::ElapsedTicker;
