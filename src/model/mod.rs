//! Record and job model
//!
//! # Components
//!
//! - `RawRecord`: an item as an adapter pulled it out of markup
//! - `Record`: a normalized item, ready for the store
//! - `Job`: one harvesting run for a single query, with its lifecycle

mod job;
mod record;

pub use job::{FailureReason, Job, JobStatus};
pub use record::{
    normalize_record, AvailabilityStatus, ItemCondition, ItemFields, RawRecord, Record,
    RecordContext,
};
