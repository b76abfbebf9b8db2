//! Layer-2/3 forwarding entities: bridge domains, subnets, contexts.

use crate::entity::{EntityData, Kind, Tenant};
use crate::error::ModelError;
use crate::relation::Relation;
use crate::tree::{NodeId, Tree};

/// Flooding behavior for unknown unicast frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnicastMode {
    #[default]
    Proxy,
    Flood,
}

impl UnicastMode {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Flood => "flood",
        }
    }
}

/// Forwarding behavior for unknown multicast frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MulticastMode {
    #[default]
    Flood,
    OptimizedFlood,
}

impl MulticastMode {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Flood => "flood",
            Self::OptimizedFlood => "opt-flood",
        }
    }
}

/// Typed fields of a bridge domain.
#[derive(Debug, Clone)]
pub struct BridgeDomainData {
    pub unknown_mac_unicast: UnicastMode,
    pub unknown_multicast: MulticastMode,
    pub arp_flood: bool,
    pub unicast_route: bool,
}

impl Default for BridgeDomainData {
    fn default() -> Self {
        Self {
            unknown_mac_unicast: UnicastMode::Proxy,
            unknown_multicast: MulticastMode::Flood,
            arp_flood: false,
            unicast_route: true,
        }
    }
}

/// Bridge domain, wire class `fvBD`. Owned by a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeDomain(pub(crate) NodeId);

impl BridgeDomain {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.id(),
            EntityData::BridgeDomain(BridgeDomainData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &BridgeDomainData {
        match tree.data(self.0) {
            EntityData::BridgeDomain(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut BridgeDomainData {
        match tree.data_mut(self.0) {
            EntityData::BridgeDomain(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    // ── Context relation ─────────────────────────────────────────────

    pub fn add_context(self, tree: &mut Tree, context: Context) {
        tree.detach_all_of_kind(self.0, Kind::Context, None);
        tree.add_relation(self.0, Relation::attached(context.0));
    }

    pub fn remove_context(self, tree: &mut Tree) {
        tree.detach_all_of_kind(self.0, Kind::Context, None);
    }

    pub fn get_context(self, tree: &Tree) -> Option<Context> {
        tree.first_attached(self.0, Kind::Context).map(Context)
    }

    pub fn has_context(self, tree: &Tree) -> bool {
        tree.first_attached(self.0, Kind::Context).is_some()
    }

    // ── Subnets ──────────────────────────────────────────────────────

    pub fn get_subnets(self, tree: &Tree) -> Vec<Subnet> {
        tree.children_of_kind(self.0, Kind::Subnet)
            .into_iter()
            .map(Subnet)
            .collect()
    }

    pub fn has_subnet(self, tree: &Tree, subnet: Subnet) -> bool {
        tree.children(self.0).contains(&subnet.0)
    }

    /// Wrap an existing bridge-domain node.
    pub fn from_node(tree: &Tree, id: NodeId) -> Result<Self, ModelError> {
        if tree.kind(id) == Kind::BridgeDomain {
            Ok(Self(id))
        } else {
            Err(ModelError::validation("node is not a bridge domain"))
        }
    }

    pub fn url_extension(self, tree: &Tree) -> String {
        format!("/BD-{}", self.name(tree))
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/BD-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        dn.split("/BD-").next()
    }
}

/// Typed fields of a subnet.
#[derive(Debug, Clone, Default)]
pub struct SubnetData {
    /// Address in `<ip>/<mask>` form. Required before serialization.
    pub addr: Option<String>,
}

/// Subnet, wire class `fvSubnet`. Owned by a bridge domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet(pub(crate) NodeId);

impl Subnet {
    pub fn create(tree: &mut Tree, parent: BridgeDomain, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.0,
            EntityData::Subnet(SubnetData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn get_addr(self, tree: &Tree) -> Option<&str> {
        match tree.data(self.0) {
            EntityData::Subnet(d) => d.addr.as_deref(),
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn set_addr(self, tree: &mut Tree, addr: &str) {
        if let EntityData::Subnet(d) = tree.data_mut(self.0) {
            d.addr = Some(addr.to_owned());
        }
    }
}

/// Typed fields of a context (VRF).
#[derive(Debug, Clone, Default)]
pub struct ContextData {
    /// When set, contracts are not enforced in this context
    /// (`pcEnfPref: "unenforced"`).
    pub allow_all: bool,
}

/// Private layer-3 network, wire class `fvCtx`. Owned by a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context(pub(crate) NodeId);

impl Context {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.id(),
            EntityData::Context(ContextData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn get_allow_all(self, tree: &Tree) -> bool {
        match tree.data(self.0) {
            EntityData::Context(d) => d.allow_all,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn set_allow_all(self, tree: &mut Tree, value: bool) {
        if let EntityData::Context(d) = tree.data_mut(self.0) {
            d.allow_all = value;
        }
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/ctx-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        dn.split("/ctx-").next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_domain_defaults() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();

        let data = bd.data(&tree);
        assert_eq!(data.unknown_mac_unicast, UnicastMode::Proxy);
        assert_eq!(data.unknown_multicast, MulticastMode::Flood);
        assert!(!data.arp_flood);
        assert!(data.unicast_route);
    }

    #[test]
    fn context_assignment_replaces_previous() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let ctx1 = Context::create(&mut tree, t, "ctx1").unwrap();
        let ctx2 = Context::create(&mut tree, t, "ctx2").unwrap();

        bd.add_context(&mut tree, ctx1);
        assert_eq!(bd.get_context(&tree), Some(ctx1));

        bd.add_context(&mut tree, ctx2);
        assert_eq!(bd.get_context(&tree), Some(ctx2));

        bd.remove_context(&mut tree);
        assert!(!bd.has_context(&tree));
    }

    #[test]
    fn subnet_addr_lifecycle() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let subnet = Subnet::create(&mut tree, bd, "s1").unwrap();

        assert!(subnet.get_addr(&tree).is_none());
        subnet.set_addr(&mut tree, "10.0.0.1/24");
        assert_eq!(subnet.get_addr(&tree), Some("10.0.0.1/24"));
        assert!(bd.has_subnet(&tree, subnet));
        assert_eq!(bd.get_subnets(&tree), vec![subnet]);
    }

    #[test]
    fn dn_parsing() {
        assert_eq!(BridgeDomain::name_from_dn("uni/tn-t1/BD-bd1"), Some("bd1"));
        assert_eq!(Context::name_from_dn("uni/tn-t1/ctx-main"), Some("main"));
        assert_eq!(Context::parent_dn("uni/tn-t1/ctx-main"), Some("uni/tn-t1"));
    }
}
