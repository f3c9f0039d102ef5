//! HTTP front door.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs   (Axum setup, limits, tracing)
//!     → request.rs  (axum request → InboundRequest)
//!     → [ingest::WebhookDispatcher]
//!     → response.rs (status, JSON body, Allow / tracking headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::inbound_request;
pub use response::{ResponseBody, WebhookResponse};
pub use server::HttpServer;
