//! Endpoint groups, outside (L3) EPGs, and endpoints.

use crate::entity::contract::Contract;
use crate::entity::interface::L2Interface;
use crate::entity::network::BridgeDomain;
use crate::entity::routing::{BgpSession, OspfInterface};
use crate::entity::tenant::{AppProfile, Tenant};
use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::relation::{Relation, RelationRole};
use crate::tree::{NodeId, Tree};

/// Endpoint group, wire class `fvAEPg`. Owned by an application
/// profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epg(pub(crate) NodeId);

impl Epg {
    pub fn create(tree: &mut Tree, parent: AppProfile, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(parent.id(), EntityData::Epg, name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn app_profile(self, tree: &Tree) -> Option<AppProfile> {
        tree.parent(self.0).map(AppProfile)
    }

    // ── Bridge domain ────────────────────────────────────────────────

    /// Assign the bridge domain, replacing any previous assignment.
    pub fn add_bd(self, tree: &mut Tree, bd: BridgeDomain) {
        tree.detach_all_of_kind(self.0, Kind::BridgeDomain, None);
        tree.add_relation(self.0, Relation::attached(bd.id()));
    }

    pub fn remove_bd(self, tree: &mut Tree) {
        tree.detach_all_of_kind(self.0, Kind::BridgeDomain, None);
    }

    pub fn get_bd(self, tree: &Tree) -> Option<BridgeDomain> {
        tree.first_attached(self.0, Kind::BridgeDomain)
            .map(BridgeDomain)
    }

    pub fn has_bd(self, tree: &Tree) -> bool {
        tree.first_attached(self.0, Kind::BridgeDomain).is_some()
    }

    // ── Contracts ────────────────────────────────────────────────────

    pub fn provide(self, tree: &mut Tree, contract: Contract) {
        provide(tree, self.0, contract);
    }

    pub fn consume(self, tree: &mut Tree, contract: Contract) {
        consume(tree, self.0, contract);
    }

    pub fn dont_provide(self, tree: &mut Tree, contract: Contract) {
        tree.detach_relation(self.0, contract.id(), Some(RelationRole::Provided));
    }

    pub fn dont_consume(self, tree: &mut Tree, contract: Contract) {
        tree.detach_relation(self.0, contract.id(), Some(RelationRole::Consumed));
    }

    pub fn does_provide(self, tree: &Tree, contract: Contract) -> bool {
        tree.has_relation(self.0, contract.id(), Some(RelationRole::Provided))
    }

    pub fn does_consume(self, tree: &Tree, contract: Contract) -> bool {
        tree.has_relation(self.0, contract.id(), Some(RelationRole::Consumed))
    }

    pub fn get_all_provided(self, tree: &Tree) -> Vec<Contract> {
        contracts_with_role(tree, self.0, RelationRole::Provided)
    }

    pub fn get_all_consumed(self, tree: &Tree) -> Vec<Contract> {
        contracts_with_role(tree, self.0, RelationRole::Consumed)
    }

    // ── Interface attachment ─────────────────────────────────────────

    pub fn attach(self, tree: &mut Tree, interface: L2Interface) {
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    /// Detach a switchport. The relation survives as detached so the
    /// serializer can emit the teardown document once.
    pub fn detach(self, tree: &mut Tree, interface: L2Interface) {
        tree.detach_relation(self.0, interface.id(), None);
    }

    pub fn get_interfaces(self, tree: &Tree) -> Vec<L2Interface> {
        tree.attached_targets(self.0, Kind::L2Interface)
            .into_iter()
            .map(L2Interface)
            .collect()
    }

    /// Wrap an existing EPG node.
    pub fn from_node(tree: &Tree, id: NodeId) -> Result<Self, ModelError> {
        if tree.kind(id) == Kind::Epg {
            Ok(Self(id))
        } else {
            Err(ModelError::validation("node is not an EPG"))
        }
    }

    pub fn url_extension(self, tree: &Tree) -> String {
        format!("/epg-{}", self.name(tree))
    }

    pub fn name_from_dn(dn: &str) -> Option<&str> {
        dn.split("/epg-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        dn.split("/epg-").next()
    }
}

/// Outside (routed) endpoint group, wire class `l3extOut`. Owned by a
/// tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutsideEpg(pub(crate) NodeId);

impl OutsideEpg {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.id(),
            EntityData::OutsideEpg,
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

    pub fn provide(self, tree: &mut Tree, contract: Contract) {
        provide(tree, self.0, contract);
    }

    pub fn consume(self, tree: &mut Tree, contract: Contract) {
        consume(tree, self.0, contract);
    }

    pub fn does_provide(self, tree: &Tree, contract: Contract) -> bool {
        tree.has_relation(self.0, contract.id(), Some(RelationRole::Provided))
    }

    pub fn does_consume(self, tree: &Tree, contract: Contract) -> bool {
        tree.has_relation(self.0, contract.id(), Some(RelationRole::Consumed))
    }

    pub fn get_all_provided(self, tree: &Tree) -> Vec<Contract> {
        contracts_with_role(tree, self.0, RelationRole::Provided)
    }

    pub fn get_all_consumed(self, tree: &Tree) -> Vec<Contract> {
        contracts_with_role(tree, self.0, RelationRole::Consumed)
    }

    /// Attach a routed interface profile. Its rendering lands inside
    /// this `l3extOut` document.
    pub fn attach(self, tree: &mut Tree, interface: OspfInterface) {
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    pub fn get_routed_interfaces(self, tree: &Tree) -> Vec<OspfInterface> {
        tree.attached_targets(self.0, Kind::OspfInterface)
            .into_iter()
            .map(OspfInterface)
            .collect()
    }

    /// Attach a BGP peering session; rendered inside this `l3extOut`.
    pub fn attach_bgp(self, tree: &mut Tree, session: BgpSession) {
        tree.add_relation(self.0, Relation::attached(session.id()));
    }

    pub fn get_bgp_sessions(self, tree: &Tree) -> Vec<BgpSession> {
        tree.attached_targets(self.0, Kind::BgpSession)
            .into_iter()
            .map(BgpSession)
            .collect()
    }
}

fn provide(tree: &mut Tree, id: NodeId, contract: Contract) {
    tree.add_relation(id, Relation::with_role(contract.id(), RelationRole::Provided));
}

fn consume(tree: &mut Tree, id: NodeId, contract: Contract) {
    tree.add_relation(id, Relation::with_role(contract.id(), RelationRole::Consumed));
}

fn contracts_with_role(tree: &Tree, id: NodeId, role: RelationRole) -> Vec<Contract> {
    tree.attached_targets_with_role(id, Kind::Contract, Some(role))
        .into_iter()
        .map(Contract)
        .collect()
}

/// Typed fields of an endpoint, read back from the controller.
#[derive(Debug, Clone, Default)]
pub struct EndpointData {
    pub mac: Option<String>,
    pub ip: Option<String>,
    pub encap: Option<String>,
}

/// Learned endpoint, wire class `fvCEp`. Owned by an EPG; read-only
/// inventory, never pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint(pub(crate) NodeId);

impl Endpoint {
    pub fn create(tree: &mut Tree, parent: Epg, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.0,
            EntityData::Endpoint(EndpointData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn epg(self, tree: &Tree) -> Option<Epg> {
        tree.parent(self.0).map(Epg)
    }

    pub fn data(self, tree: &Tree) -> &EndpointData {
        match tree.data(self.0) {
            EntityData::Endpoint(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut EndpointData {
        match tree.data_mut(self.0) {
            EntityData::Endpoint(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    /// Record which L2 interface the endpoint was learned on.
    pub fn attach(self, tree: &mut Tree, interface: L2Interface) {
        tree.detach_all_of_kind(self.0, Kind::L2Interface, None);
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    pub fn get_interface(self, tree: &Tree) -> Option<L2Interface> {
        tree.first_attached(self.0, Kind::L2Interface).map(L2Interface)
    }

    /// Endpoint name from a DN; both learned (`cep-`) and static
    /// (`stcep-`) forms occur.
    pub fn name_from_dn(dn: &str) -> Option<&str> {
        if let Some(rest) = dn.split("/stcep-").nth(1) {
            return rest.split('/').next();
        }
        dn.split("/cep-").nth(1)?.split('/').next()
    }

    pub fn parent_dn(dn: &str) -> Option<&str> {
        if dn.contains("/stcep-") {
            dn.split("/stcep-").next()
        } else {
            dn.split("/cep-").next()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::contract::{Contract, Scope};
    use crate::entity::network::BridgeDomain;

    fn fixture(tree: &mut Tree) -> (Tenant, Epg) {
        let t = Tenant::create(tree, "t1").unwrap();
        let app = AppProfile::create(tree, t, "app").unwrap();
        let epg = Epg::create(tree, app, "web").unwrap();
        (t, epg)
    }

    #[test]
    fn bd_assignment_is_exclusive() {
        let mut tree = Tree::new();
        let (t, epg) = fixture(&mut tree);
        let bd1 = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let bd2 = BridgeDomain::create(&mut tree, t, "bd2").unwrap();

        epg.add_bd(&mut tree, bd1);
        epg.add_bd(&mut tree, bd2);
        assert_eq!(epg.get_bd(&tree), Some(bd2));

        epg.remove_bd(&mut tree);
        assert!(!epg.has_bd(&tree));
    }

    #[test]
    fn provide_and_consume_are_independent() {
        let mut tree = Tree::new();
        let (t, epg) = fixture(&mut tree);
        let c = Contract::create(&mut tree, t, "http", Scope::default()).unwrap();

        epg.provide(&mut tree, c);
        assert!(epg.does_provide(&tree, c));
        assert!(!epg.does_consume(&tree, c));

        epg.consume(&mut tree, c);
        assert_eq!(epg.get_all_provided(&tree), vec![c]);
        assert_eq!(epg.get_all_consumed(&tree), vec![c]);

        epg.dont_provide(&mut tree, c);
        assert!(!epg.does_provide(&tree, c));
        assert!(epg.does_consume(&tree, c), "consume side untouched");
    }

    #[test]
    fn endpoint_dn_parsing() {
        assert_eq!(
            Endpoint::name_from_dn("uni/tn-t/ap-a/epg-e/cep-00:11:22:33:44:55"),
            Some("00:11:22:33:44:55")
        );
        assert_eq!(
            Endpoint::name_from_dn("uni/tn-t/ap-a/epg-e/stcep-00:11:22:33:44:55"),
            Some("00:11:22:33:44:55")
        );
        assert_eq!(
            Endpoint::parent_dn("uni/tn-t/ap-a/epg-e/cep-00:11:22:33:44:55"),
            Some("uni/tn-t/ap-a/epg-e")
        );
    }
}
