//! Routing protocol entities: OSPF interfaces and policies, BGP peers.

use serde_json::{Value, json};

use crate::entity::interface::L3Interface;
use crate::entity::tenant::Tenant;
use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::relation::Relation;
use crate::tree::{NodeId, Tree};

/// Typed fields of an OSPF interface profile.
#[derive(Debug, Clone, Default)]
pub struct OspfInterfaceData {
    pub area_id: Option<String>,
    pub auth_key: Option<String>,
    pub auth_keyid: Option<String>,
    pub auth_type: Option<String>,
    /// Advertised networks, rendered as `l3extSubnet` children of the
    /// outside EPG.
    pub networks: Vec<String>,
}

/// OSPF interface profile, wire class `ospfIfP`. Parentless; attached
/// to an outside EPG, wrapping an [`L3Interface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OspfInterface(pub(crate) NodeId);

impl OspfInterface {
    pub fn create(tree: &mut Tree, name: &str, area_id: Option<&str>) -> Result<Self, ModelError> {
        let data = OspfInterfaceData {
            area_id: area_id.map(str::to_owned),
            ..OspfInterfaceData::default()
        };
        Ok(Self(tree.create_root(EntityData::OspfInterface(data), name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &OspfInterfaceData {
        match tree.data(self.0) {
            EntityData::OspfInterface(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut OspfInterfaceData {
        match tree.data_mut(self.0) {
            EntityData::OspfInterface(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn add_network(self, tree: &mut Tree, network: &str) {
        let networks = &mut self.data_mut(tree).networks;
        if !networks.iter().any(|n| n == network) {
            networks.push(network.to_owned());
        }
    }

    pub fn attach(self, tree: &mut Tree, interface: L3Interface) {
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    pub fn get_interface(self, tree: &Tree) -> Option<L3Interface> {
        tree.first_attached(self.0, Kind::L3Interface).map(L3Interface)
    }

    /// The node/interface profile document carrying the OSPF config
    /// and the wrapped L3 interface binding.
    pub fn to_json(self, tree: &Tree) -> Result<Value, ModelError> {
        let l3 = self
            .get_interface(tree)
            .ok_or_else(|| ModelError::validation("OSPF interface has no L3 interface attached"))?;
        let d = self.data(tree);
        let name = self.name(tree);

        let ospf_ifp = json!({"ospfIfP": {
            "attributes": {
                "authKey": d.auth_key.as_deref().unwrap_or_default(),
                "authKeyId": d.auth_keyid.as_deref().unwrap_or_default(),
                "authType": d.auth_type.as_deref().unwrap_or_default(),
                "name": name,
            },
            "children": []}});
        Ok(json!({"l3extLNodeP": {
            "attributes": {"name": name},
            "children": [{"l3extLIfP": {
                "attributes": {"name": name},
                "children": [ospf_ifp, l3.to_json(tree)?]}}]}}))
    }
}

/// OSPF interface timer and network-type policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OspfNetworkType {
    Broadcast,
    PointToPoint,
}

impl OspfNetworkType {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Broadcast => "bcast",
            Self::PointToPoint => "p2p",
        }
    }
}

/// Typed fields of an OSPF interface policy.
#[derive(Debug, Clone)]
pub struct OspfPolicyData {
    pub hello_interval: u32,
    pub dead_interval: u32,
    pub network_type: OspfNetworkType,
}

impl Default for OspfPolicyData {
    fn default() -> Self {
        Self {
            hello_interval: 10,
            dead_interval: 40,
            network_type: OspfNetworkType::Broadcast,
        }
    }
}

/// OSPF interface policy, wire class `ospfIfPol`. Owned by a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OspfInterfacePolicy(pub(crate) NodeId);

impl OspfInterfacePolicy {
    pub fn create(tree: &mut Tree, parent: Tenant, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_child(
            parent.id(),
            EntityData::OspfInterfacePolicy(OspfPolicyData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &OspfPolicyData {
        match tree.data(self.0) {
            EntityData::OspfInterfacePolicy(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut OspfPolicyData {
        match tree.data_mut(self.0) {
            EntityData::OspfInterfacePolicy(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn to_json(self, tree: &Tree) -> Value {
        let d = self.data(tree);
        json!({"ospfIfPol": {
            "attributes": {
                "name": self.name(tree),
                "helloIntvl": d.hello_interval.to_string(),
                "deadIntvl": d.dead_interval.to_string(),
                "nwT": d.network_type.wire_value(),
            },
            "children": []}})
    }
}

/// Typed fields of the OSPF router process.
#[derive(Debug, Clone, Default)]
pub struct OspfRouterData {
    pub router_id: Option<String>,
    pub node: Option<String>,
}

/// Global OSPF router settings, wire class `ospfRtrP`. Accessor-only;
/// not rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OspfRouter(pub(crate) NodeId);

impl OspfRouter {
    pub fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(
            EntityData::OspfRouter(OspfRouterData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &OspfRouterData {
        match tree.data(self.0) {
            EntityData::OspfRouter(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut OspfRouterData {
        match tree.data_mut(self.0) {
            EntityData::OspfRouter(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }
}

/// Typed fields of a BGP peering session.
#[derive(Debug, Clone, Default)]
pub struct BgpSessionData {
    pub peer_ip: Option<String>,
    pub remote_as: Option<String>,
}

/// BGP peer, wire class `bgpPeerP`. Parentless; attached to an
/// outside EPG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BgpSession(pub(crate) NodeId);

impl BgpSession {
    pub fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(
            EntityData::BgpSession(BgpSessionData::default()),
            name,
        )?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &BgpSessionData {
        match tree.data(self.0) {
            EntityData::BgpSession(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut BgpSessionData {
        match tree.data_mut(self.0) {
            EntityData::BgpSession(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    /// Peer document with the remote AS as a child.
    pub fn to_json(self, tree: &Tree) -> Result<Value, ModelError> {
        let d = self.data(tree);
        let peer_ip = d
            .peer_ip
            .as_deref()
            .ok_or_else(|| ModelError::validation("BGP session has no peer address"))?;
        let remote_as = d
            .remote_as
            .as_deref()
            .ok_or_else(|| ModelError::validation("BGP session has no remote AS"))?;
        Ok(json!({"bgpPeerP": {
            "attributes": {"addr": peer_ip},
            "children": [{"bgpAsP": {
                "attributes": {"asn": remote_as},
                "children": []}}]}}))
    }
}
