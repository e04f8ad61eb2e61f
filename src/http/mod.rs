//! HTTP/1.1 wire handling subsystem.
//!
//! # Data Flow
//! ```text
//! byte stream
//!     → framing.rs (header block, then exact body per framing headers)
//!     → classify.rs (request / response start-line checks)
//!     → headers.rs (lookup and edits on the raw block)
//!     → forwarded bytes
//!
//! rejected message
//!     → response.rs (literal 400 Bad Request)
//! ```
//!
//! # Design Decisions
//! - Messages stay raw bytes end to end; nothing is re-serialized
//! - Framing reads exactly one message so keep-alive streams stay aligned

pub mod classify;
pub mod framing;
pub mod headers;
pub mod response;

pub use classify::{is_request, is_response};
pub use framing::{read_body, read_header_block, BodyFraming, FramingError};
pub use headers::{add_header, field_values, remove_header, set_header_value, Occurrence};
pub use response::bad_request;
