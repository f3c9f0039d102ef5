//! Webhook ingestion subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → tracking.rs   (correlation / request ids)
//!     → dispatcher.rs (method gate)
//!     → headers.rs    (sanitize, advisory validation)
//!     → event.rs      (canonical Event)
//!     → partition.rs  (collection name from path)
//!     → dispatcher.rs (store ‖ fan-out, settle-all, compose response)
//!         → fanout.rs (message body + attributes)
//! ```

pub mod dispatcher;
pub mod event;
pub mod fanout;
pub mod headers;
pub mod partition;
pub mod tracking;

pub use dispatcher::{
    DispatchError, DispatchSettings, DispatchState, Operation, OperationOutcome,
    WebhookDispatcher, ALLOWED_METHODS,
};
pub use event::{ContentType, Event, InboundRequest, Transport};
pub use fanout::FanoutMessage;
pub use headers::{create_headers_attribute, sanitize_headers, validate_headers, HeaderIssue};
pub use partition::partition_name;
pub use tracking::{extract_tracking_ids, TrackingIds};
