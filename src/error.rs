use crate::identifier::IdentifierError;
use crate::models::ProxyFailure;
use crate::upstream::TransportError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};

const MISSING_URL_HINT: &str =
    "Missing 'url' query param. Example: /api/download/ytmp3?url=https://m.youtube.com/shorts/PcY3LMfDxmc";

// Every way a proxy request can fail. Each one renders as the failure shape of
// the normalized contract.
#[derive(Debug)]
pub enum ProxyError {
    MissingIdentifier,
    InvalidIdentifier(String),
    UpstreamStatus { status: u16, preview: String },
    UpstreamShape { reason: &'static str, status: u16, preview: String },
    UpstreamBinary { status: u16, content_type: Option<String>, bytes: usize },
    Transport(TransportError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::MissingIdentifier | ProxyError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamStatus { .. }
            | ProxyError::UpstreamShape { .. }
            | ProxyError::UpstreamBinary { .. } => StatusCode::BAD_GATEWAY,
            ProxyError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_failure(&self) -> ProxyFailure {
        let (error, upstream_status, debug) = match self {
            ProxyError::MissingIdentifier => (MISSING_URL_HINT.to_string(), None, None),
            ProxyError::InvalidIdentifier(raw) => {
                (format!("Invalid YouTube URL: '{}'", raw), None, None)
            }
            ProxyError::UpstreamStatus { status, preview } => (
                format!("Upstream returned HTTP {}", status),
                Some(*status),
                Some(preview.clone()),
            ),
            ProxyError::UpstreamShape { reason, status, preview } => {
                (reason.to_string(), Some(*status), Some(preview.clone()))
            }
            ProxyError::UpstreamBinary { status, content_type, bytes } => (
                "Upstream returned binary data instead of a download descriptor".to_string(),
                Some(*status),
                Some(format!(
                    "{} bytes of {}",
                    bytes,
                    content_type.as_deref().unwrap_or("unknown content type")
                )),
            ),
            ProxyError::Transport(e) => (e.message.clone(), e.status, None),
        };

        ProxyFailure {
            status: false,
            error,
            upstream_status,
            debug,
        }
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_failure().error)
    }
}

// This implementation allows us to convert a ProxyError into a valid HTTP response.
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::Transport(e) => {
                tracing::error!("Upstream transport failure: {} (status {:?})", e.message, e.status)
            }
            ProxyError::MissingIdentifier | ProxyError::InvalidIdentifier(_) => {
                tracing::info!("Rejected proxy request: {}", self)
            }
            _ => tracing::warn!("Upstream answer rejected: {}", self),
        }

        (self.status_code(), Json(self.to_failure())).into_response()
    }
}

impl From<IdentifierError> for ProxyError {
    fn from(err: IdentifierError) -> Self {
        match err {
            IdentifierError::Missing => ProxyError::MissingIdentifier,
            IdentifierError::Invalid(raw) => ProxyError::InvalidIdentifier(raw),
        }
    }
}

impl From<TransportError> for ProxyError {
    fn from(err: TransportError) -> Self {
        ProxyError::Transport(err)
    }
}
