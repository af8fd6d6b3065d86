//! axum middleware for signed requests.
//!
//! `verify_and_identify` runs first and records who signed the request;
//! the `require_*` layers then decide whether to let it through.
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/internal", post(handler))
//!     .route_layer(middleware::from_fn(require_internal_application))
//!     .layer(middleware::from_fn_with_state(signatures, verify_and_identify));
//! ```

use std::sync::Arc;

use axum::body::{to_bytes, Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, warn};

use crate::authenticate::{verify_with, Authenticator, KeySource};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::resolver::Application;

pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

const SIGNATURE_INVALID: &str = "Access Denied - Signature is invalid";
const APPLICATION_NOT_ALLOWED: &str = "Access Denied - Application ID is not allowed";
const NOT_PROPERLY_SIGNED: &str = "Access Denied - Message is not properly signed";

/// The authenticated caller, or `None` when the request was unsigned or the
/// signature did not check out.
#[derive(Debug, Clone)]
pub struct CallerApplication(pub Option<Application>);

/// State for [`verify_and_identify`].
#[derive(Clone)]
pub struct SignatureState {
    authenticator: Authenticator,
    header: HeaderName,
    body_limit: usize,
}

impl SignatureState {
    pub fn new(authenticator: Authenticator, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            authenticator,
            header: header_name(config)?,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        Self::new(Authenticator::from_config(config)?, config)
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

/// Allowed application IDs for [`require_application_ids`].
#[derive(Debug, Clone)]
pub struct AllowedApplications(pub Arc<Vec<String>>);

impl AllowedApplications {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(Arc::new(ids.into_iter().map(Into::into).collect()))
    }
}

/// Trusted keys for [`require_signed_by`].
#[derive(Clone)]
pub struct TrustedKeys {
    keys: Arc<Vec<KeySource>>,
    header: HeaderName,
    max_clock_skew_secs: u64,
    body_limit: usize,
}

impl TrustedKeys {
    pub fn new(keys: Vec<KeySource>, config: &ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            keys: Arc::new(keys),
            header: header_name(config)?,
            max_clock_skew_secs: config.max_clock_skew_secs,
            body_limit: DEFAULT_BODY_LIMIT,
        })
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }
}

fn header_name(config: &ClientConfig) -> Result<HeaderName, ClientError> {
    HeaderName::from_bytes(config.signature_header.as_bytes())
        .map_err(|e| ClientError::InvalidHeader(e.to_string()))
}

fn forbidden(message: &'static str) -> Response {
    (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
}

fn signature_from(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Buffer the body so it can be both verified and passed on.
async fn buffer(req: Request, limit: usize) -> Result<(Request, Bytes), Response> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(|e| {
        warn!(error = %e, "could not buffer request body for signature check");
        StatusCode::PAYLOAD_TOO_LARGE.into_response()
    })?;
    Ok((Request::from_parts(parts, Body::from(bytes.clone())), bytes))
}

fn caller(req: &Request) -> Option<&Application> {
    req.extensions()
        .get::<CallerApplication>()
        .and_then(|caller| caller.0.as_ref())
}

/// Authenticate the request signature and attach [`CallerApplication`].
///
/// Never rejects for a missing or bad signature; pair it with one of the
/// `require_*` layers.
pub async fn verify_and_identify(
    State(state): State<SignatureState>,
    req: Request,
    next: Next,
) -> Response {
    let signature = signature_from(req.headers(), &state.header);
    let (mut req, body) = match buffer(req, state.body_limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let application = match (signature, std::str::from_utf8(&body)) {
        (Some(_), Err(e)) => {
            warn!(error = %e, "signed request body is not UTF-8");
            None
        }
        (Some(signature), Ok(message)) => {
            match state.authenticator.authenticate(&signature, message).await {
                Ok(application) => {
                    debug!(app_id = %application.id, "request authenticated");
                    Some(application)
                }
                Err(e) => {
                    warn!(error = %e, "request signature not accepted");
                    None
                }
            }
        }
        (None, _) => None,
    };

    req.extensions_mut().insert(CallerApplication(application));
    next.run(req).await
}

pub async fn require_valid_application(req: Request, next: Next) -> Response {
    if caller(&req).is_none() {
        warn!(path = %req.uri().path(), "rejected: no authenticated application");
        return forbidden(SIGNATURE_INVALID);
    }
    next.run(req).await
}

pub async fn require_internal_application(req: Request, next: Next) -> Response {
    if !caller(&req).is_some_and(Application::is_internal) {
        warn!(path = %req.uri().path(), "rejected: application is not internal");
        return forbidden(SIGNATURE_INVALID);
    }
    next.run(req).await
}

pub async fn require_application_ids(
    State(allowed): State<AllowedApplications>,
    req: Request,
    next: Next,
) -> Response {
    if !caller(&req).is_some_and(|app| app.is_in_list(allowed.0.as_slice())) {
        warn!(path = %req.uri().path(), "rejected: application not in allow list");
        return forbidden(APPLICATION_NOT_ALLOWED);
    }
    next.run(req).await
}

/// Accept the request when any trusted key verifies the body signature.
pub async fn require_signed_by(
    State(trusted): State<TrustedKeys>,
    req: Request,
    next: Next,
) -> Response {
    let signature = signature_from(req.headers(), &trusted.header);
    let (req, body) = match buffer(req, trusted.body_limit).await {
        Ok(buffered) => buffered,
        Err(response) => return response,
    };

    let Some(signature) = signature else {
        warn!(path = %req.uri().path(), "rejected: unsigned request");
        return forbidden(NOT_PROPERLY_SIGNED);
    };
    let Ok(message) = std::str::from_utf8(&body) else {
        warn!(path = %req.uri().path(), "rejected: signed body is not UTF-8");
        return forbidden(NOT_PROPERLY_SIGNED);
    };
    let accepted = trusted.keys.iter().any(|key| {
        matches!(
            verify_with(message, &signature, key, trusted.max_clock_skew_secs),
            Ok(true)
        )
    });
    if !accepted {
        warn!(path = %req.uri().path(), "rejected: no trusted key verifies the signature");
        return forbidden(NOT_PROPERLY_SIGNED);
    }
    next.run(req).await
}
