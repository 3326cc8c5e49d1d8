//! Per-request tenant and actor, taken from headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{ActorId, TenantId};

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Who is calling and on behalf of which tenant.
///
/// `x-tenant-id` is required. A missing `x-actor-id` is recorded as
/// `anonymous`.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub tenant_id: TenantId,
    pub actor: ActorId,
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant = parts
            .headers
            .get(TENANT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("missing {TENANT_HEADER} header")))?;
        let tenant_id = tenant
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("invalid {TENANT_HEADER}: {e}")))?;

        let actor = parts
            .headers
            .get(ACTOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ActorId::new)
            .unwrap_or_else(|| ActorId::new("anonymous"));

        Ok(Self { tenant_id, actor })
    }
}
