//! # credential-api
//!
//! Shared request/response types for the credential service.
//! This crate has no server dependencies so that clients can reuse the
//! exact field sets the service speaks.
//!
//! ## Example
//!
//! ```rust
//! use credential_api::{LoginRequest, SessionMetadata};
//!
//! let request = LoginRequest {
//!     email: "jane@example.com".to_string(),
//!     password: "Str0ng!Pass".to_string(),
//! };
//! let meta = SessionMetadata::default();
//! assert!(meta.user_agent.is_none());
//! ```

pub mod error;
pub mod requests;
pub mod responses;
pub mod result;

// Re-exports for convenient access
pub use error::ErrorResponse;
pub use requests::*;
pub use responses::*;
pub use result::{AppResponse, StatusCode};
