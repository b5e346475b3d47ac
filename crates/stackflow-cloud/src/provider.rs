//! Cloud provider trait definition

use crate::error::{CloudError, Result};
use crate::state::{GlobalState, ResourceState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_core::{Reference, Resource, Tags};
use std::collections::{BTreeMap, HashMap};

/// Tag key carrying the owning stack name on every created resource
pub const MANAGED_TAG_KEY: &str = "stackflow:stack";

/// Cloud provider abstraction trait
///
/// The engine drives one resource at a time through this trait; the
/// provider never sees the rest of the stack except through the ids
/// resolved into [`ResolvedResource`].
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Returns the provider name (e.g., "aws")
    fn name(&self) -> &str;

    /// Returns the provider display name for UI
    fn display_name(&self) -> &str;

    /// Check if the provider is properly configured and authenticated
    async fn check_auth(&self) -> Result<AuthStatus>;

    /// Create a resource
    async fn create(&self, resource: &ResolvedResource<'_>) -> Result<ProvisionResult>;

    /// Bring an existing resource in line with its new definition
    async fn update(
        &self,
        resource: &ResolvedResource<'_>,
        current: &ResourceState,
    ) -> Result<ProvisionResult>;

    /// Delete a recorded resource
    async fn delete(&self, current: &ResourceState) -> Result<()>;

    /// Whether moving from `previous` to `desired` cannot be done in place
    fn requires_replacement(&self, previous: &Resource, desired: &Resource) -> bool;
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}

/// A resource whose references have been resolved to provider ids
#[derive(Debug, Clone)]
pub struct ResolvedResource<'a> {
    /// Owning stack name
    pub stack: &'a str,

    /// Desired definition
    pub resource: &'a Resource,

    ids: HashMap<String, String>,
}

impl<'a> ResolvedResource<'a> {
    /// Resolve every reference of `resource` against recorded state
    pub fn resolve(stack: &'a str, resource: &'a Resource, state: &GlobalState) -> Result<Self> {
        let mut ids = HashMap::new();
        for reference in resource.spec.references() {
            let name = reference.target.name();
            let recorded = state.get_resource(name).ok_or_else(|| {
                CloudError::ResourceNotFound(format!(
                    "{} (referenced by {}) has not been created",
                    name, resource.name
                ))
            })?;
            ids.insert(name.to_string(), recorded.id.clone());
        }
        Ok(Self::with_ids(stack, resource, ids))
    }

    /// Resolve with explicit ids
    pub fn with_ids(
        stack: &'a str,
        resource: &'a Resource,
        ids: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            stack,
            resource,
            ids: ids.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.name
    }

    /// Provider id of a referenced resource
    pub fn id_of(&self, reference: &Reference) -> Result<&str> {
        self.ids
            .get(reference.name())
            .map(String::as_str)
            .ok_or_else(|| {
                CloudError::ResourceNotFound(format!(
                    "{} (referenced by {})",
                    reference, self.resource.name
                ))
            })
    }

    /// Declared tags plus the managed stack tag
    pub fn tags(&self) -> Tags {
        let mut tags = self.resource.tags.clone();
        tags.insert(MANAGED_TAG_KEY.to_string(), self.stack.to_string());
        tags
    }
}

/// What the provider reports back after creating or updating a resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionResult {
    /// Provider-generated id
    pub id: String,

    /// Runtime attributes (public IP, DNS name, etc.)
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl ProvisionResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set an attribute only when the provider returned a value
    pub fn with_optional(self, key: impl Into<String>, value: Option<String>) -> Self {
        match value {
            Some(v) => self.with_attribute(key, serde_json::Value::String(v)),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackflow_core::{Subnet, Vpc};

    fn subnet() -> Resource {
        Resource::new(
            "app-subnet",
            Subnet {
                vpc: Reference::new("app-vpc"),
                cidr_block: "10.0.1.0/24".to_string(),
                availability_zone: "eu-central-1a".to_string(),
                map_public_ip_on_launch: true,
            },
        )
        .with_tag("Name", "app-subnet")
    }

    #[test]
    fn test_resolve_from_state() {
        let vpc = Resource::new("app-vpc", Vpc::new("10.0.0.0/16"));
        let mut state = GlobalState::new();
        state.set_resource("app-vpc", ResourceState::new("vpc-0abc", &vpc));

        let subnet = subnet();
        let resolved = ResolvedResource::resolve("app", &subnet, &state).unwrap();
        assert_eq!(resolved.id_of(&Reference::new("app-vpc")).unwrap(), "vpc-0abc");
        assert!(resolved.id_of(&Reference::new("other")).is_err());
    }

    #[test]
    fn test_resolve_missing_dependency() {
        let subnet = subnet();
        let err = ResolvedResource::resolve("app", &subnet, &GlobalState::new()).unwrap_err();
        assert!(matches!(err, CloudError::ResourceNotFound(msg) if msg.contains("app-vpc")));
    }

    #[test]
    fn test_tags_include_stack() {
        let subnet = subnet();
        let resolved = ResolvedResource::with_ids("app", &subnet, Vec::new());
        let tags = resolved.tags();
        assert_eq!(tags.get("Name").map(String::as_str), Some("app-subnet"));
        assert_eq!(tags.get(MANAGED_TAG_KEY).map(String::as_str), Some("app"));
    }
}
