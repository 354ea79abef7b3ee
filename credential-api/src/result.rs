use serde::{Deserialize, Serialize};

/// HTTP status codes the credential endpoints answer with.
/// Kept independent of any HTTP crate so clients can match on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Ok = 200,
    Created = 201,
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    RequestTimeout = 408,
    Conflict = 409,
    InternalServerError = 500,
}

impl StatusCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Caller's fault (4xx) as opposed to a server fault (5xx).
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.as_u16())
    }
}

/// Generic API response wrapper
///
/// The backend wraps this in a type that implements Axum's `IntoResponse`.
///
/// # Examples
///
/// ```rust
/// use credential_api::{AppResponse, StatusCode, SuccessResponse};
///
/// let response = AppResponse::ok(SuccessResponse { success: true });
/// assert_eq!(response.status, StatusCode::Ok);
///
/// let response = AppResponse::created("new_account");
/// assert_eq!(response.status, StatusCode::Created);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub status: StatusCode,
}

impl<T> AppResponse<T> {
    /// Creates a new response with a status code and data
    pub fn new(status: StatusCode, data: T) -> Self {
        Self {
            status,
            data: Some(data),
        }
    }

    /// 200 OK with data
    pub fn ok(data: T) -> Self {
        Self::new(StatusCode::Ok, data)
    }

    /// 201 Created with data
    pub fn created(data: T) -> Self {
        Self::new(StatusCode::Created, data)
    }
}
