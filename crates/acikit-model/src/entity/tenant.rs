//! Tenants and application profiles.

use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::tree::{NodeId, Tree};

/// Top-level configuration container, wire class `fvTenant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub(crate) NodeId);

impl Tenant {
    pub fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(EntityData::Tenant, name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    /// The URL configuration for this tenant is pushed to.
    pub fn get_url(fmt: &str) -> String {
        format!("/api/mo/uni.{fmt}")
    }

    /// Subscription URL for this specific tenant instance.
    pub fn instance_subscription_url(self, tree: &Tree) -> String {
        format!("/api/mo/uni/tn-{}.json?subscription=yes", self.name(tree))
    }

    /// Wrap an existing tenant node.
    pub fn from_node(tree: &Tree, id: NodeId) -> Result<Self, ModelError> {
        if tree.kind(id) == Kind::Tenant {
            Ok(Self(id))
        } else {
            Err(ModelError::validation("node is not a tenant"))
        }
    }

    /// Tenant name from a DN like `uni/tn-cisco/...`.
    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("uni/tn-").nth(1)?.split('/').next()
    }
}

/// Application profile, wire class `fvAp`. Owned by a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppProfile(pub(crate) NodeId);

impl AppProfile {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.0,
            EntityData::AppProfile,
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn tenant(self, tree: &Tree) -> Option<Tenant> {
        tree.parent(self.0).map(Tenant)
    }

    pub fn url_extension(self, tree: &Tree) -> String {
        format!("/ap-{}", self.name(tree))
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/ap-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        dn.split("/ap-").next()
    }
}
