//! Physical and logical interfaces.
//!
//! [`Interface`] is a physical switchport; its configuration is pushed
//! through three separate documents (physical domain, fabric, infra).
//! [`L2Interface`] layers an encapsulation on top of a port or port
//! channel, and [`L3Interface`] layers an address on top of an
//! [`L2Interface`].

use serde_json::{Value, json};

use crate::entity::network::Context;
use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::relation::Relation;
use crate::tree::{NodeId, Tree};

/// L2 encapsulation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncapType {
    Vlan,
    Vxlan,
    Nvgre,
}

impl EncapType {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::Vlan => "vlan",
            Self::Vxlan => "vxlan",
            Self::Nvgre => "nvgre",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ModelError> {
        match value {
            "vlan" => Ok(Self::Vlan),
            "vxlan" => Ok(Self::Vxlan),
            "nvgre" => Ok(Self::Nvgre),
            other => Err(ModelError::validation(format!(
                "invalid encapsulation type {other:?}"
            ))),
        }
    }
}

/// Encapsulation identifier, rendered as e.g. `vlan-5`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encap {
    pub kind: EncapType,
    pub id: String,
}

impl Encap {
    pub fn new(kind: EncapType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn text(&self) -> String {
        format!("{}-{}", self.kind.wire_value(), self.id)
    }
}

/// Interface admin state pushed to the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminStatus {
    Up,
    Down,
}

/// Typed fields of a physical interface. Numeric coordinates stay as
/// strings; the controller treats them that way in every document.
#[derive(Debug, Clone)]
pub struct InterfaceData {
    pub interface_type: String,
    pub pod: String,
    pub node: String,
    pub module: String,
    pub port: String,
    pub speed: String,
    pub admin_status: Option<AdminStatus>,
    pub mtu: String,
    pub port_type: String,
    /// CDP protocol config: `Some(true)` enabled, `Some(false)`
    /// disabled, `None` unconfigured.
    pub cdp: Option<bool>,
    pub lldp: Option<bool>,
}

impl InterfaceData {
    fn new(interface_type: &str, pod: &str, node: &str, module: &str, port: &str) -> Self {
        Self {
            interface_type: interface_type.to_owned(),
            pod: pod.to_owned(),
            node: node.to_owned(),
            module: module.to_owned(),
            port: port.to_owned(),
            speed: "10G".to_owned(),
            admin_status: None,
            mtu: String::new(),
            port_type: String::new(),
            cdp: None,
            lldp: None,
        }
    }
}

/// Physical switchport, wire class `l1PhysIf`. Parentless; named
/// `<type> <pod>/<node>/<module>/<port>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interface(pub(crate) NodeId);

impl Interface {
    pub fn create(
        tree: &mut Tree,
        interface_type: &str,
        pod: &str,
        node: &str,
        module: &str,
        port: &str,
    ) -> Result<Self, ModelError> {
        let name = format!("{interface_type} {pod}/{node}/{module}/{port}");
        let data = InterfaceData::new(interface_type, pod, node, module, port);
        Ok(Self(tree.create_root(EntityData::Interface(data), &name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn data(self, tree: &Tree) -> &InterfaceData {
        match tree.data(self.0) {
            EntityData::Interface(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn data_mut(self, tree: &mut Tree) -> &mut InterfaceData {
        match tree.data_mut(self.0) {
            EntityData::Interface(d) => d,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn enable_cdp(self, tree: &mut Tree) {
        self.data_mut(tree).cdp = Some(true);
    }

    pub fn disable_cdp(self, tree: &mut Tree) {
        self.data_mut(tree).cdp = Some(false);
    }

    pub fn enable_lldp(self, tree: &mut Tree) {
        self.data_mut(tree).lldp = Some(true);
    }

    pub fn disable_lldp(self, tree: &mut Tree) {
        self.data_mut(tree).lldp = Some(false);
    }

    /// Fabric path, used as `tDn` in path attachments.
    pub fn path(self, tree: &Tree) -> String {
        let d = self.data(tree);
        format!(
            "topology/pod-{}/paths-{}/pathep-[eth{}/{}]",
            d.pod, d.node, d.module, d.port
        )
    }

    /// Name used inside selector and policy-group documents.
    pub fn selector_name(self, tree: &Tree) -> String {
        let d = self.data(tree);
        format!("{}-{}-{}-{}", d.pod, d.node, d.module, d.port)
    }

    /// Selector documents tying this port to an access port group.
    /// Returns (node profile, access port selector).
    pub fn port_selector_json(self, tree: &Tree) -> (Value, Value) {
        let name = self.selector_name(tree);
        port_selector_json(self.data(tree), &name, "accportgrp", &name)
    }

    /// Same selector pair, but tied to a port-channel bundle group.
    pub fn port_channel_selector_json(self, tree: &Tree, port_name: &str) -> (Value, Value) {
        let name = self.selector_name(tree);
        port_selector_json(self.data(tree), &name, "accbundle", port_name)
    }

    /// Target URLs for the three configuration documents:
    /// (physical domain, fabric, infra).
    pub fn get_url() -> (&'static str, &'static str, &'static str) {
        ("/api/mo/uni.json", "/api/mo/uni/fabric.json", "/api/mo/uni.json")
    }

    /// The three configuration documents for this port. The fabric
    /// document is only present when an admin status is set.
    pub fn get_json(self, tree: &Tree) -> (Value, Option<Value>, Value) {
        let d = self.data(tree);
        let name = self.selector_name(tree);

        let phys_domain = json!({"physDomP": {
            "attributes": {"name": "allvlans"},
            "children": [
                {"infraRsVlanNs": {
                    "attributes": {"tDn": "uni/infra/vlanns-allvlans-static"},
                    "children": []}},
            ]}});

        let mut infra_children = Vec::new();
        let (node_profile, accport_selector) = self.port_selector_json(tree);
        infra_children.push(node_profile);
        infra_children.push(accport_selector);

        let speed_name = format!("speed{}", d.speed);
        infra_children.push(json!({"fabricHIfPol": {
            "attributes": {
                "autoNeg": "on",
                "dn": format!("uni/infra/hintfpol-{speed_name}"),
                "name": speed_name,
                "speed": d.speed,
            },
            "children": []}}));

        let mut portgrp_children = vec![
            json!({"infraRsHIfPol": {
                "attributes": {"tnFabricHIfPolName": speed_name},
                "children": []}}),
            json!({"infraRsAttEntP": {
                "attributes": {"tDn": "uni/infra/attentp-allvlans"},
                "children": []}}),
        ];
        if let Some(cdp) = d.cdp {
            portgrp_children.push(json!({"infraRsCdpIfPol": {
                "attributes": {"tnCdpIfPolName": format!("CDP_{}", admin_st(cdp))}}}));
        }
        if let Some(lldp) = d.lldp {
            portgrp_children.push(json!({"infraRsLldpIfPol": {
                "attributes": {"tnLldpIfPolName": format!("LLDP_{}", admin_st(lldp))}}}));
        }
        infra_children.push(json!({"infraFuncP": {
            "attributes": {},
            "children": [{"infraAccPortGrp": {
                "attributes": {
                    "dn": format!("uni/infra/funcprof/accportgrp-{name}"),
                    "name": name,
                },
                "children": portgrp_children}}]}}));

        infra_children.push(json!({"infraAttEntityP": {
            "attributes": {"name": "allvlans"},
            "children": [{"infraRsDomP": {
                "attributes": {"tDn": "uni/phys-allvlans"}}}]}}));

        if let Some(cdp) = d.cdp {
            let st = admin_st(cdp);
            infra_children.push(json!({"cdpIfPol": {
                "attributes": {"adminSt": st, "name": format!("CDP_{st}")}}}));
        }
        if let Some(lldp) = d.lldp {
            let st = admin_st(lldp);
            infra_children.push(json!({"lldpIfPol": {
                "attributes": {
                    "adminRxSt": st,
                    "adminTxSt": st,
                    "name": format!("LLDP_{st}"),
                }}}));
        }

        let fabric = d.admin_status.map(|status| {
            let path = self.path(tree);
            let attributes = match status {
                AdminStatus::Up => json!({
                    "tDn": path,
                    "dn": format!("uni/fabric/outofsvc/rsoosPath-[{path}]"),
                    "status": "deleted",
                }),
                AdminStatus::Down => json!({"tDn": path, "lc": "blacklist"}),
            };
            json!({"fabricOOServicePol": {
                "children": [{"fabricRsOosPath": {
                    "attributes": attributes,
                    "children": []}}]}})
        });

        infra_children.push(json!({"fvnsVlanInstP": {
            "attributes": {"name": "allvlans", "allocMode": "static"},
            "children": [{"fvnsEncapBlk": {
                "attributes": {
                    "name": "encap",
                    "from": "vlan-1",
                    "to": "vlan-4092",
                }}}]}}));

        let infra = json!({"infraInfra": {"children": infra_children}});
        (phys_domain, fabric, infra)
    }

    /// Parse a display name of the form `eth 1/101/1/8`.
    pub fn parse_name(name: &str) -> Result<(String, String, String, String, String), ModelError> {
        let mut words = name.split_whitespace();
        let interface_type = words
            .next()
            .ok_or_else(|| ModelError::validation("empty interface name"))?;
        let coords = words
            .next()
            .ok_or_else(|| ModelError::validation("interface name missing coordinates"))?;
        let parts: Vec<&str> = coords.split('/').collect();
        let [pod, node, module, port] = parts[..] else {
            return Err(ModelError::validation(format!(
                "invalid interface coordinates {coords:?}"
            )));
        };
        Ok((
            interface_type.to_owned(),
            pod.to_owned(),
            node.to_owned(),
            module.to_owned(),
            port.to_owned(),
        ))
    }

    /// Parse coordinates from either DN form the controller uses:
    /// `topology/pod-1/node-103/sys/phys-[eth1/12]` or
    /// `topology/pod-1/paths-102/pathep-[eth1/12]`.
    pub fn parse_dn(dn: &str) -> Result<(String, String, String, String, String), ModelError> {
        let parts: Vec<&str> = dn.split('/').collect();
        let invalid = || ModelError::validation(format!("invalid interface dn {dn:?}"));

        let physical = parts.contains(&"sys");
        let (bracket_idx, port_idx) = if physical { (4, 5) } else { (3, 4) };
        if parts.len() <= port_idx {
            return Err(invalid());
        }

        let pod = parts[1].split('-').nth(1).ok_or_else(invalid)?;
        let node = parts[2].split('-').nth(1).ok_or_else(invalid)?;
        let typed_module = parts[bracket_idx].split('[').nth(1).ok_or_else(invalid)?;
        if typed_module.len() < 3 {
            return Err(invalid());
        }
        let (interface_type, module) = typed_module.split_at(3);
        let port = parts[port_idx].split(']').next().ok_or_else(invalid)?;

        Ok((
            interface_type.to_owned(),
            pod.to_owned(),
            node.to_owned(),
            module.to_owned(),
            port.to_owned(),
        ))
    }
}

fn admin_st(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

fn port_selector_json(
    data: &InterfaceData,
    name: &str,
    group_type: &str,
    group_name: &str,
) -> (Value, Value) {
    let port_blk = json!({"infraPortBlk": {
        "attributes": {
            "name": name,
            "fromCard": data.module,
            "toCard": data.module,
            "fromPort": data.port,
            "toPort": data.port,
        },
        "children": []}});
    let accbasegrp = json!({"infraRsAccBaseGrp": {
        "attributes": {"tDn": format!("uni/infra/funcprof/{group_type}-{group_name}")},
        "children": []}});
    let portselect = json!({"infraHPortS": {
        "attributes": {"name": name, "type": "range"},
        "children": [port_blk, accbasegrp]}});
    let accport_selector = json!({"infraAccPortP": {
        "attributes": {"name": name},
        "children": [portselect]}});

    let node_blk = json!({"infraNodeBlk": {
        "attributes": {"name": name, "from_": data.node, "to_": data.node},
        "children": []}});
    let leaf_selector = json!({"infraLeafS": {
        "attributes": {"name": name, "type": "range"},
        "children": [node_blk]}});
    let accport = json!({"infraRsAccPortP": {
        "attributes": {"tDn": format!("uni/infra/accportprof-{name}")},
        "children": []}});
    let node_profile = json!({"infraNodeP": {
        "attributes": {"name": name},
        "children": [leaf_selector, accport]}});

    (node_profile, accport_selector)
}

/// Logical L2 interface: an encapsulation bound to a port or port
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Interface(pub(crate) NodeId);

impl L2Interface {
    pub fn create(tree: &mut Tree, name: &str, encap: Encap) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(EntityData::L2Interface(encap), name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn encap(self, tree: &Tree) -> &Encap {
        match tree.data(self.0) {
            EntityData::L2Interface(encap) => encap,
            _ => unreachable!("kind checked at construction"),
        }
    }

    /// Bind this encapsulation to a physical port or port channel.
    pub fn attach(self, tree: &mut Tree, target: NodeId) -> Result<(), ModelError> {
        use crate::entity::AttachKind;
        if !matches!(
            tree.kind(target).attach_kind(),
            Some(AttachKind::Physical | AttachKind::Bundle)
        ) {
            return Err(ModelError::validation(
                "L2 interface attaches to a port or port channel",
            ));
        }
        tree.add_relation(self.0, Relation::attached(target));
        Ok(())
    }

    /// Fabric path of the underlying port or port channel.
    pub fn path(self, tree: &Tree) -> Option<String> {
        if let Some(port) = tree.first_attached(self.0, Kind::Interface) {
            return Some(Interface(port).path(tree));
        }
        tree.first_attached(self.0, Kind::PortChannel)
            .map(|pc| crate::entity::portchannel::PortChannel(pc).path(tree))
    }
}

/// L3 interface type, attribute `ifInstT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L3IfType {
    SubInterface,
    L3Port,
    ExtSvi,
}

impl L3IfType {
    pub fn wire_value(self) -> &'static str {
        match self {
            Self::SubInterface => "sub-interface",
            Self::L3Port => "l3-port",
            Self::ExtSvi => "ext-svi",
        }
    }
}

/// Typed fields of a logical L3 interface.
#[derive(Debug, Clone, Default)]
pub struct L3InterfaceData {
    pub addr: Option<String>,
    pub l3if_type: Option<L3IfType>,
}

/// Logical L3 interface: an address on top of an [`L2Interface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L3Interface(pub(crate) NodeId);

impl L3Interface {
    pub fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(
            EntityData::L3Interface(L3InterfaceData::default()),
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
            EntityData::L3Interface(d) => d.addr.as_deref(),
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn set_addr(self, tree: &mut Tree, addr: &str) {
        if let EntityData::L3Interface(d) = tree.data_mut(self.0) {
            d.addr = Some(addr.to_owned());
        }
    }

    pub fn get_l3if_type(self, tree: &Tree) -> Option<L3IfType> {
        match tree.data(self.0) {
            EntityData::L3Interface(d) => d.l3if_type,
            _ => unreachable!("kind checked at construction"),
        }
    }

    pub fn set_l3if_type(self, tree: &mut Tree, l3if_type: L3IfType) {
        if let EntityData::L3Interface(d) = tree.data_mut(self.0) {
            d.l3if_type = Some(l3if_type);
        }
    }

    // ── Context ──────────────────────────────────────────────────────

    pub fn add_context(self, tree: &mut Tree, context: Context) {
        tree.detach_all_of_kind(self.0, Kind::Context, None);
        tree.add_relation(self.0, Relation::attached(context.id()));
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

    pub fn attach(self, tree: &mut Tree, interface: L2Interface) {
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    pub fn get_interface(self, tree: &Tree) -> Option<L2Interface> {
        tree.first_attached(self.0, Kind::L2Interface).map(L2Interface)
    }

    /// The `l3extRsPathL3OutAtt` document binding the address to the
    /// underlying path.
    pub fn to_json(self, tree: &Tree) -> Result<Value, ModelError> {
        let l2 = self
            .get_interface(tree)
            .ok_or_else(|| ModelError::validation("L3 interface has no L2 interface attached"))?;
        let path = l2
            .path(tree)
            .ok_or_else(|| ModelError::validation("L2 interface has no port attached"))?;
        let addr = self
            .get_addr(tree)
            .ok_or_else(|| ModelError::validation("L3 interface has no address"))?;
        let l3if_type = self
            .get_l3if_type(tree)
            .ok_or_else(|| ModelError::validation("L3 interface has no interface type"))?;

        Ok(json!({"l3extRsPathL3OutAtt": {
            "attributes": {
                "encap": l2.encap(tree).text(),
                "ifInstT": l3if_type.wire_value(),
                "addr": addr,
                "tDn": path,
            },
            "children": []}}))
    }
}
