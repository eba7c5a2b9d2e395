//! Dynamic Operating Envelope core.
//!
//! Pure calculation over an immutable topology snapshot: no I/O, no locks and
//! no state carried between calls, so single and batch entry points can be
//! invoked concurrently from any number of request handlers.

pub mod batch;
pub mod calculator;
pub mod error;
pub mod service;

pub use batch::{
    BatchEntryError, DoeBatchCalculateResponse, DoeBatchEntry, DoeBatchResult, StatusCounts,
};
pub use calculator::{
    ConstraintEnvelope, Direction, DoeCalculator, DoeThresholds, OperatingPoint,
    OperatingPointSource,
};
pub use error::{DoeError, DoeErrorKind};
pub use service::{DoeCalculateResponse, DoeService};
