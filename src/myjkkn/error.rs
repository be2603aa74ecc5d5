//! Outcome types for MyJKKN API calls.
//!
//! Expected failures (bad key, HTTP error statuses, network trouble) are values, not
//! panics: every client method returns [`ApiResult`]. [`ApiResponse`] is the tagged
//! `{success, data, error}` form used when a result crosses the JSON boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of a MyJKKN API call. `Display` is the message shown to end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Mock mode is switched on but synthetic data no longer exists
    #[error(
        "Mock mode is disabled: mock data has been removed. Turn mock mode off and configure an API key."
    )]
    MockModeDisabled,

    /// No API key has been configured
    #[error("No MyJKKN API key configured")]
    MissingApiKey,

    /// The configured key does not have the expected shape
    #[error("Invalid API key format: expected jk_<id>_<secret> or jkkn_<id>_<secret>")]
    InvalidApiKey,

    /// HTTP 401
    #[error("Authentication failed: the API key is invalid or has expired")]
    Unauthorized,

    /// HTTP 403
    #[error("Access forbidden: the API key is not allowed to read this resource")]
    Forbidden,

    /// HTTP 404, or a lookup that returned nothing
    #[error("Resource not found: {endpoint}")]
    NotFound {
        /// Endpoint that was requested
        endpoint: String,
    },

    /// HTTP 429
    #[error("Rate limit exceeded: too many requests, please wait and try again")]
    RateLimited,

    /// HTTP 5xx
    #[error("MyJKKN server error ({status}): please try again later")]
    Server {
        /// Status code returned
        status: u16,
    },

    /// Any other non-success status
    #[error("Request failed ({status}): {message}")]
    Http {
        /// Status code returned
        status: u16,
        /// Message extracted from the body, or a generic line
        message: String,
    },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The response body was not what we expected
    #[error("Invalid response from MyJKKN API: {0}")]
    Decode(String),

    /// A nested value could not be reduced to a display string (strict mode only)
    #[error("Unrecognised value shape in field '{field}'")]
    UnrecognizedShape {
        /// Field holding the unrecognised object
        field: String,
    },
}

impl ApiError {
    /// Classifies a non-2xx response.
    #[must_use]
    pub fn from_status(status: u16, endpoint: &str, body: &str) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound {
                endpoint: endpoint.to_string(),
            },
            429 => Self::RateLimited,
            500..=599 => Self::Server { status },
            _ => Self::Http {
                status,
                message: body_message(body)
                    .unwrap_or_else(|| format!("HTTP {status} from {endpoint}")),
            },
        }
    }

    /// HTTP status this error should be reported with by the local API.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::MissingApiKey | Self::InvalidApiKey | Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound { .. } => 404,
            Self::RateLimited => 429,
            Self::MockModeDisabled => 503,
            Self::Http { status, .. } => *status,
            Self::Server { .. }
            | Self::Network(_)
            | Self::Decode(_)
            | Self::UnrecognizedShape { .. } => 502,
        }
    }
}

fn body_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(serde_json::Value::as_str))
        .filter(|msg| !msg.trim().is_empty())
        .map(str::to_string)
}

/// Result of every MyJKKN client call
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Tagged result as exchanged with the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether `data` is meaningful
    pub success: bool,
    /// Payload on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// User-facing message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Failed response with a message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<ApiResult<T>> for ApiResponse<T> {
    fn from(result: ApiResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}
