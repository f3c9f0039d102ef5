//! Dead-letter failure analysis.
//!
//! # Data Flow
//! ```text
//! DeadLetterQueue::receive
//!     → entry.rs     (FailureInfo, decode original message)
//!     → analyzer.rs  (failure type, retry, criticality)
//!     → processor.rs (redeliver / escalate, side channels, delete)
//!         → sinks.rs (metrics, archive)
//! ```

pub mod analyzer;
pub mod entry;
pub mod processor;
pub mod queue;
pub mod sinks;

pub use analyzer::{
    analyze_failure, analyze_failure_at, FailureAnalysis, FailureType, MAX_RECEIVE_COUNT,
};
pub use entry::{decode_original, DeadLetterEntry, FailureInfo};
pub use processor::{
    BatchSummary, DeadLetterError, DeadLetterProcessor, EntryAction, EntryResult, EntryStatus,
};
pub use queue::{DeadLetterQueue, FileDeadLetterQueue};
pub use sinks::{
    EscalationNotice, FailureArchive, FailureMetrics, FailureRecord, JsonlFileArchive, LogArchive,
    RecorderMetrics,
};
