//! Port channels, including virtual port channels across node pairs.

use serde_json::{Value, json};

use crate::entity::interface::Interface;
use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::relation::Relation;
use crate::tree::{NodeId, Tree};

/// Aggregated link, wire class `infraAccBndlGrp`. Parentless; member
/// ports are relations. When members span two nodes the channel is a
/// VPC and additionally needs a fabric protocol policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortChannel(pub(crate) NodeId);

impl PortChannel {
    pub fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(EntityData::PortChannel, name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }

    pub fn attach(self, tree: &mut Tree, interface: Interface) {
        tree.add_relation(self.0, Relation::attached(interface.id()));
    }

    pub fn detach(self, tree: &mut Tree, interface: Interface) {
        tree.detach_relation(self.0, interface.id(), None);
    }

    pub fn members(self, tree: &Tree) -> Vec<Interface> {
        tree.attached_targets(self.0, Kind::Interface)
            .into_iter()
            .map(Interface)
            .collect()
    }

    /// Distinct node ids of the member ports, numerically ordered.
    fn nodes(self, tree: &Tree) -> Vec<String> {
        let mut nodes: Vec<String> = self
            .members(tree)
            .into_iter()
            .map(|m| m.data(tree).node.clone())
            .collect();
        // Numeric order, not lexical: node 99 sorts before node 100.
        nodes.sort_by_key(|n| n.parse::<u32>().unwrap_or(u32::MAX));
        nodes.dedup();
        nodes
    }

    pub fn is_vpc(self, tree: &Tree) -> bool {
        self.nodes(tree).len() > 1
    }

    /// Fabric path. VPCs use the protected-paths form across both
    /// nodes; plain channels hang off the single member node.
    pub fn path(self, tree: &Tree) -> String {
        let members = self.members(tree);
        let Some(first) = members.first() else {
            return String::new();
        };
        let pod = &first.data(tree).pod;
        let name = self.name(tree);
        let nodes = self.nodes(tree);
        if let [node1, node2, ..] = &nodes[..] {
            format!("topology/pod-{pod}/protpaths-{node1}-{node2}/pathep-[{name}]")
        } else {
            let node = &first.data(tree).node;
            format!("topology/pod-{pod}/paths-{node}/pathep-{name}")
        }
    }

    /// Configuration documents: (fabric protocol policy, infra). The
    /// fabric document exists only for VPCs.
    pub fn get_json(self, tree: &Tree) -> (Option<Value>, Value) {
        let name = self.name(tree);
        let vpc = self.is_vpc(tree);

        let mut infra_children = Vec::new();
        for member in self.members(tree) {
            let (node_profile, accport_selector) = member.port_channel_selector_json(tree, name);
            infra_children.push(node_profile);
            infra_children.push(accport_selector);
        }
        infra_children.push(json!({"infraFuncP": {
            "attributes": {},
            "children": [{"infraAccBndlGrp": {
                "attributes": {
                    "name": name,
                    "lagT": if vpc { "node" } else { "link" },
                },
                "children": []}}]}}));
        let infra = json!({"infraInfra": {"children": infra_children}});

        if !vpc {
            return (None, infra);
        }

        // The lowest node id names the VPC group.
        let nodes = self.nodes(tree);
        let unique_id = &nodes[0];
        let fabric_nodes: Vec<Value> = nodes
            .iter()
            .map(|node| json!({"fabricNodePEp": {"attributes": {"id": node}}}))
            .collect();
        let fabric_prot_pol = json!({"fabricProtPol": {
            "attributes": {"name": format!("vpc{unique_id}")},
            "children": [{"fabricExplicitGEp": {
                "attributes": {"name": format!("vpc{unique_id}"), "id": unique_id},
                "children": fabric_nodes}}]}});

        (Some(fabric_prot_pol), infra)
    }
}
