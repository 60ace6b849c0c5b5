use hyper::{header, Body, Response, StatusCode};
use tracing::error;

/// Result type alias for naming directory operations.
pub type Result<T> = std::result::Result<T, NamingError>;

/// Errors raised by the naming directory and the components resolving through it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    /// The name could not be parsed into a naming URI.
    #[error("invalid naming URI '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Nothing is bound at the requested name.
    #[error("{0} is not bound")]
    NotBound(String),

    /// The terminal node already holds a value.
    #[error("{0} is already bound")]
    AlreadyBound(String),

    /// A path segment on the way to the target is a leaf, or the target has children.
    #[error("can't bind {uri}: segment '{segment}' conflicts with an existing binding")]
    Conflict { uri: String, segment: String },

    /// An alias chain did not terminate within the hop bound.
    #[error("reference chain starting at {uri} exceeds {hops} hops")]
    CyclicBinding { uri: String, hops: usize },

    /// A manager registered under a well-known identifier is missing.
    #[error("manager {0} is not available")]
    MissingManager(String),

    /// A proxied method call was rejected or failed.
    #[error("can't invoke {bean}::{method}: {reason}")]
    Invocation {
        bean: String,
        method: String,
        reason: String,
    },
}

impl NamingError {
    pub(crate) fn invalid_name(name: &str, reason: impl Into<String>) -> Self {
        NamingError::InvalidName {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            NamingError::NotBound(_) => StatusCode::NOT_FOUND,
            NamingError::InvalidName { .. } => StatusCode::BAD_REQUEST,
            NamingError::AlreadyBound(_) | NamingError::Conflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Turns an error that reached the HTTP layer into a JSON error response.
pub fn handle_error_response(err: anyhow::Error) -> Response<Body> {
    let status = err
        .downcast_ref::<NamingError>()
        .map(NamingError::status_code)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {:#}", err);
    }

    let body = serde_json::json!({
        "success": false,
        "error": err.to_string(),
    });

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}
