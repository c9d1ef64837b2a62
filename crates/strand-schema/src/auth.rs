//! Authorization of schema requests.

use async_trait::async_trait;
use tracing::debug;

use strand_core::config::AdminListConfig;
use strand_core::{Kind, Principal, Result, StrandError};

/// Verbs used in authorization requests.
pub mod verbs {
    pub const CREATE: &str = "create";
    pub const DELETE: &str = "delete";
    pub const UPDATE: &str = "update";
    pub const GET: &str = "get";
    pub const LIST: &str = "list";
}

/// Resource covering every schema kind.
pub const ALL_SCHEMA: &str = "schema/*";

/// `schema/things` or `schema/actions`.
pub fn schema_resource(kind: Kind) -> String {
    format!("schema/{}", kind.plural())
}

#[async_trait]
pub trait Authorizer: Send + Sync {
    /// `Ok(())` if `principal` may apply `verb` to `resource`. A `None`
    /// principal is an anonymous request.
    async fn authorize(&self, principal: Option<&Principal>, verb: &str, resource: &str) -> Result<()>;
}

/// Allows admins everything and read-only users the read verbs. Everyone,
/// including anonymous requests, is allowed when the list is disabled.
pub struct AdminListAuthorizer {
    config: AdminListConfig,
}

impl AdminListAuthorizer {
    pub fn new(config: AdminListConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

#[async_trait]
impl Authorizer for AdminListAuthorizer {
    async fn authorize(&self, principal: Option<&Principal>, verb: &str, resource: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let username = principal.map(|p| p.username.as_str());
        let allowed = match username {
            None => false,
            Some(user) if self.config.users.iter().any(|u| u == user) => true,
            Some(user) => {
                matches!(verb, verbs::GET | verbs::LIST)
                    && self.config.read_only_users.iter().any(|u| u == user)
            }
        };

        if allowed {
            return Ok(());
        }
        debug!(user = username.unwrap_or("anonymous"), verb, resource, "Request denied");
        Err(StrandError::unauthorized(verb, resource))
    }
}
