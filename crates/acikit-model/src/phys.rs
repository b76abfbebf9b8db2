//! Physical fabric inventory: pods, nodes, cards, links.
//!
//! These entities are read back from the controller and never pushed;
//! the serializer refuses them. The query layer populates the typed
//! fields from class reads.

use crate::entity::{EntityData, Kind};
use crate::error::ModelError;
use crate::tree::{NodeId, Tree};

/// Typed fields of a pod.
#[derive(Debug, Clone, Default)]
pub struct PodData {
    pub pod: String,
}

/// Typed fields of a fabric switch.
#[derive(Debug, Clone, Default)]
pub struct FabricNodeData {
    pub pod: String,
    pub node: String,
    pub role: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
}

/// Typed fields shared by every removable card: linecards,
/// supervisors, fan trays, power supplies, system controllers.
#[derive(Debug, Clone, Default)]
pub struct CardData {
    pub pod: String,
    pub node: String,
    pub slot: String,
    pub serial: Option<String>,
    pub model: Option<String>,
    pub oper_st: Option<String>,
}

/// Typed fields of a fabric link between two node/slot/port triples.
#[derive(Debug, Clone, Default)]
pub struct LinkData {
    pub pod: String,
    pub link: String,
    pub node1: String,
    pub slot1: String,
    pub port1: String,
    pub node2: String,
    pub slot2: String,
    pub port2: String,
}

macro_rules! inventory_handle {
    ($(#[$doc:meta])* $handle:ident, $variant:ident, $data:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $handle(pub(crate) NodeId);

        impl $handle {
            pub(crate) fn create(
                tree: &mut Tree,
                parent: Option<NodeId>,
                name: &str,
                data: $data,
            ) -> Result<Self, ModelError> {
                let data = EntityData::$variant(data);
                let id = match parent {
                    Some(parent) => tree.create_child(parent, data, name)?,
                    None => tree.create_root(data, name)?,
                };
                Ok(Self(id))
            }

            pub fn id(self) -> NodeId {
                self.0
            }

            pub fn name(self, tree: &Tree) -> &str {
                tree.name(self.0)
            }

            pub fn data(self, tree: &Tree) -> &$data {
                match tree.data(self.0) {
                    EntityData::$variant(d) => d,
                    _ => unreachable!("kind checked at construction"),
                }
            }

            pub fn from_node(tree: &Tree, id: NodeId) -> Result<Self, ModelError> {
                if tree.kind(id) == Kind::$variant {
                    Ok(Self(id))
                } else {
                    Err(ModelError::validation(concat!(
                        "node is not a ",
                        stringify!($variant)
                    )))
                }
            }
        }
    };
}

inventory_handle!(
    /// Fabric pod, wire class `fabricPod`.
    Pod, Pod, PodData
);
inventory_handle!(
    /// Fabric switch, wire class `fabricNode`.
    FabricNode, FabricNode, FabricNodeData
);
inventory_handle!(
    /// Linecard, wire class `eqptLC`.
    Linecard, Linecard, CardData
);
inventory_handle!(
    /// Supervisor card, wire class `eqptSupC`.
    Supervisor, Supervisor, CardData
);
inventory_handle!(
    /// Fan tray, wire class `eqptFt`.
    Fantray, Fantray, CardData
);
inventory_handle!(
    /// Power supply, wire class `eqptPsu`.
    PowerSupply, PowerSupply, CardData
);
inventory_handle!(
    /// System controller, wire class `eqptSysC`.
    SystemController, SystemController, CardData
);
inventory_handle!(
    /// Fabric link, wire class `fabricLink`.
    Link, Link, LinkData
);

/// Switch outside the fabric, learned via LLDP/CDP. No wire class of
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalSwitch(pub(crate) NodeId);

impl ExternalSwitch {
    pub(crate) fn create(tree: &mut Tree, name: &str) -> Result<Self, ModelError> {
        Ok(Self(tree.create_root(EntityData::ExternalSwitch, name)?))
    }

    pub fn id(self) -> NodeId {
        self.0
    }

    pub fn name(self, tree: &Tree) -> &str {
        tree.name(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_nest_under_pods() {
        let mut tree = Tree::new();
        let pod = Pod::create(
            &mut tree,
            None,
            "1",
            PodData {
                pod: "1".to_owned(),
            },
        )
        .unwrap();
        let node = FabricNode::create(
            &mut tree,
            Some(pod.id()),
            "leaf101",
            FabricNodeData {
                pod: "1".to_owned(),
                node: "101".to_owned(),
                role: Some("leaf".to_owned()),
                ..FabricNodeData::default()
            },
        )
        .unwrap();

        assert_eq!(tree.parent(node.id()), Some(pod.id()));
        assert_eq!(node.data(&tree).role.as_deref(), Some("leaf"));
        assert!(tree.kind(node.id()).is_physical());
    }

    #[test]
    fn from_node_checks_kind() {
        let mut tree = Tree::new();
        let pod = Pod::create(&mut tree, None, "1", PodData::default()).unwrap();
        assert!(Pod::from_node(&tree, pod.id()).is_ok());
        assert!(FabricNode::from_node(&tree, pod.id()).is_err());
    }
}
