//! Request identifier middleware.
//!
//! # Responsibilities
//! - Assign a request ID to every request on entry
//! - Expose it to handlers through request extensions
//! - Mirror it into the primary and compat response headers
//!
//! # Design Decisions
//! - An ID already attached by an outer layer is reused
//! - Inbound client IDs are ignored unless propagation is enabled, and
//!   then only accepted when well formed
//! - Response headers set by the handler are never overwritten

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::RequestIdConfig;

/// Primary response header carrying the request ID.
pub const X_OPENSTACK_REQUEST_ID: &str = "x-openstack-request-id";

const REQUEST_ID_PREFIX: &str = "req-";

/// Identifier for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Fresh `req-<uuid4>` identifier.
    pub fn generate() -> Self {
        Self(format!("{}{}", REQUEST_ID_PREFIX, Uuid::new_v4()))
    }

    /// Accept `value` only if it has the shape of a generated identifier.
    pub fn parse(value: &str) -> Option<Self> {
        let uuid = value.strip_prefix(REQUEST_ID_PREFIX)?;
        Uuid::parse_str(uuid).ok()?;
        Some(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access the request ID attached by [`request_id_middleware`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Middleware settings, shared by every request.
#[derive(Debug, Clone)]
pub struct RequestIdState {
    headers: Arc<[HeaderName]>,
    propagate_inbound: bool,
}

impl RequestIdState {
    /// Primary header first, then each distinct compat header.
    pub fn new(compat_headers: impl IntoIterator<Item = HeaderName>, propagate_inbound: bool) -> Self {
        let mut headers = vec![HeaderName::from_static(X_OPENSTACK_REQUEST_ID)];
        for header in compat_headers {
            if !headers.contains(&header) {
                headers.push(header);
            }
        }
        Self {
            headers: headers.into(),
            propagate_inbound,
        }
    }

    /// Build from configuration, skipping header names that do not parse.
    pub fn from_config(config: &RequestIdConfig) -> Self {
        let compat = config.compat_headers.iter().filter_map(|name| {
            match HeaderName::from_bytes(name.as_bytes()) {
                Ok(header) => Some(header),
                Err(_) => {
                    tracing::warn!(header = %name, "Ignoring invalid compat header name");
                    None
                }
            }
        });
        Self::new(compat, config.propagate_inbound)
    }

    pub fn headers(&self) -> &[HeaderName] {
        &self.headers
    }

    fn resolve<B>(&self, request: &Request<B>) -> RequestId {
        if let Some(existing) = request.request_id() {
            return existing.clone();
        }
        if self.propagate_inbound {
            let inbound = request
                .headers()
                .get(X_OPENSTACK_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .and_then(RequestId::parse);
            if let Some(id) = inbound {
                return id;
            }
        }
        RequestId::generate()
    }

    /// Add `id` under every configured header the response lacks.
    fn mirror(&self, id: &RequestId, response_headers: &mut HeaderMap) {
        let Ok(value) = HeaderValue::from_str(id.as_str()) else {
            tracing::warn!(request_id = %id, "Request ID is not a valid header value");
            return;
        };
        for header in self.headers.iter() {
            if !response_headers.contains_key(header) {
                response_headers.insert(header.clone(), value.clone());
            }
        }
    }
}

impl Default for RequestIdState {
    fn default() -> Self {
        Self::new(std::iter::empty(), false)
    }
}

pub async fn request_id_middleware(
    State(state): State<RequestIdState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let id = state.resolve(&request);
    request.extensions_mut().insert(id.clone());

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = next.run(request).instrument(span).await;
    state.mirror(&id, response.headers_mut());
    response
}

/// Wrap every route of `router` with the request ID middleware.
pub fn wrap<S>(router: Router<S>, state: RequestIdState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(state, request_id_middleware))
}
