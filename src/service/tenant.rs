//! Caller to tenant resolution.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The authenticated identity making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caller {
    pub user_id: String,
}

impl Caller {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// Maps a caller to the organization whose data they may see.
///
/// The result is trusted: it becomes the tenant every compiled query is
/// scoped to.
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// The caller's organization id, or `None` if they belong to none.
    async fn resolve(&self, caller: &Caller) -> Option<String>;
}

/// Fixed user → organization table. Backs the CLI and the tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTenantResolver {
    organizations: HashMap<String, String>,
}

impl StaticTenantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: impl Into<String>, organization: impl Into<String>) -> Self {
        self.organizations.insert(user_id.into(), organization.into());
        self
    }
}

#[async_trait]
impl TenantResolver for StaticTenantResolver {
    async fn resolve(&self, caller: &Caller) -> Option<String> {
        self.organizations.get(&caller.user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticTenantResolver::new().with_user("u1", "org-a");
        assert_eq!(resolver.resolve(&Caller::new("u1")).await.as_deref(), Some("org-a"));
        assert_eq!(resolver.resolve(&Caller::new("u2")).await, None);
    }
}
