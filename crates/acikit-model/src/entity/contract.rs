//! Contracts, taboos, and filter entries.

use crate::entity::tenant::Tenant;
use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::tree::{NodeId, Tree};

/// Contract scope, attribute `scope` on `vzBrCP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    Context,
    Global,
    Tenant,
    ApplicationProfile,
}

impl Scope {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Global => "global",
            Self::Tenant => "tenant",
            Self::ApplicationProfile => "application-profile",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "context" => Ok(Self::Context),
            "global" => Ok(Self::Global),
            "tenant" => Ok(Self::Tenant),
            "application-profile" => Ok(Self::ApplicationProfile),
            other => Err(ModelError::validation(format!(
                "invalid contract scope {other:?}"
            ))),
        }
    }
}

/// Contract, wire class `vzBrCP`. Owned by a tenant; provided and
/// consumed by EPGs through relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract(pub(crate) NodeId);

impl Contract {
    pub fn create(
        tree: &mut Tree,
        parent: Tenant,
        name: &str,
        scope: Scope,
    ) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.id(),
            EntityData::Contract(scope),
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

    pub fn get_scope(self, tree: &Tree) -> Scope {
        match tree.data(self.0) {
            EntityData::Contract(scope) => *scope,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn set_scope(self, tree: &mut Tree, scope: Scope) {
        if let EntityData::Contract(s) = tree.data_mut(self.0) {
            *s = scope;
        }
    }

    pub fn get_entries(self, tree: &Tree) -> Vec<FilterEntry> {
        tree.children_of_kind(self.0, Kind::FilterEntry)
            .into_iter()
            .map(FilterEntry)
            .collect()
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/brc-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        dn.split("/brc-").next()
    }
}

/// Taboo contract, wire class `vzTaboo`. Owned by a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Taboo(pub(crate) NodeId);

impl Taboo {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(parent.id(), EntityData::Taboo, name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn get_entries(self, tree: &Tree) -> Vec<FilterEntry> {
        tree.children_of_kind(self.0, Kind::FilterEntry)
            .into_iter()
            .map(FilterEntry)
            .collect()
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/taboo-").nth(1)?.split('/').next()
    }
}

/// Typed fields of a filter entry. The controller treats every field
/// as a string and `"0"` as unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterEntryData {
    pub apply_to_frag: String,
    pub arp_opc: String,
    pub d_from_port: String,
    pub d_to_port: String,
    pub ether_t: String,
    pub prot: String,
    pub s_from_port: String,
    pub s_to_port: String,
    pub tcp_rules: String,
}

impl Default for FilterEntryData {
    fn default() -> Self {
        let unspecified = || "0".to_owned();
        Self {
            apply_to_frag: unspecified(),
            arp_opc: unspecified(),
            d_from_port: unspecified(),
            d_to_port: unspecified(),
            ether_t: unspecified(),
            prot: unspecified(),
            s_from_port: unspecified(),
            s_to_port: unspecified(),
            tcp_rules: unspecified(),
        }
    }
}

/// Filter entry, wire class `vzEntry`. Owned by a contract or taboo;
/// the serializer also renders a sibling `vzFilter` per entry, named
/// `<parent><entry>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterEntry(pub(crate) NodeId);

impl FilterEntry {
    /// Create an entry under a contract or taboo.
    pub fn create(tree: &mut Tree, parent: NodeId, name: &str) -> Result<Self, ModelError> {
        if !matches!(tree.kind(parent), Kind::Contract | Kind::Taboo) {
            return Err(ModelError::validation(
                "filter entry parent must be a contract or taboo",
            ));
        }
        Ok(Self(tree.create_child(
            parent,
            EntityData::FilterEntry(FilterEntryData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &FilterEntryData {
        match tree.data(self.0) {
            EntityData::FilterEntry(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut FilterEntryData {
        match tree.data_mut(self.0) {
            EntityData::FilterEntry(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }
}
