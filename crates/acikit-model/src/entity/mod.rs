//! Typed entities of the object model.
//!
//! Every node in the [`Tree`](crate::tree::Tree) carries an
//! [`EntityData`] payload; the per-entity modules define thin `NodeId`
//! wrappers (handles) with constructors and accessors that enforce
//! parent constraints and field invariants.

pub mod contract;
pub mod epg;
pub mod interface;
pub mod network;
pub mod portchannel;
pub mod routing;
pub mod tenant;

pub use contract::{Contract, FilterEntry, FilterEntryData, Scope, Taboo};
pub use epg::{Endpoint, EndpointData, Epg, OutsideEpg};
pub use interface::{
    AdminStatus, Encap, EncapType, Interface, InterfaceData, L2Interface, L3IfType, L3Interface,
    L3InterfaceData,
};
pub use network::{
    BridgeDomain, BridgeDomainData, Context, ContextData, MulticastMode, Subnet, SubnetData,
    UnicastMode,
};
pub use portchannel::PortChannel;
pub use routing::{
    BgpSession, BgpSessionData, OspfInterface, OspfInterfaceData, OspfInterfacePolicy,
    OspfNetworkType, OspfPolicyData, OspfRouter, OspfRouterData,
};
pub use tenant::{AppProfile, Tenant};

use crate::phys::{CardData, FabricNodeData, LinkData, PodData};

/// Discriminant for every node kind the model knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Tenant,
    AppProfile,
    Epg,
    OutsideEpg,
    Endpoint,
    BridgeDomain,
    Subnet,
    Context,
    Contract,
    Taboo,
    FilterEntry,
    Interface,
    L2Interface,
    L3Interface,
    PortChannel,
    OspfInterface,
    OspfInterfacePolicy,
    OspfRouter,
    BgpSession,
    Pod,
    FabricNode,
    Linecard,
    Supervisor,
    Fantray,
    PowerSupply,
    SystemController,
    Link,
    ExternalSwitch,
}

impl Kind {
    /// The controller class this kind maps to, when one exists.
    /// Purely logical kinds (L2/L3 interfaces) have none.
    pub fn wire_class(self) -> Option<&'static str> {
        match self {
            Self::Tenant => Some("fvTenant"),
            Self::AppProfile => Some("fvAp"),
            Self::Epg => Some("fvAEPg"),
            Self::OutsideEpg => Some("l3extOut"),
            Self::Endpoint => Some("fvCEp"),
            Self::BridgeDomain => Some("fvBD"),
            Self::Subnet => Some("fvSubnet"),
            Self::Context => Some("fvCtx"),
            Self::Contract => Some("vzBrCP"),
            Self::Taboo => Some("vzTaboo"),
            Self::FilterEntry => Some("vzEntry"),
            Self::Interface => Some("l1PhysIf"),
            Self::PortChannel => Some("infraAccBndlGrp"),
            Self::OspfInterface => Some("ospfIfP"),
            Self::OspfInterfacePolicy => Some("ospfIfPol"),
            Self::OspfRouter => Some("ospfRtrP"),
            Self::BgpSession => Some("bgpPeerP"),
            Self::Pod => Some("fabricPod"),
            Self::FabricNode => Some("fabricNode"),
            Self::Linecard => Some("eqptLC"),
            Self::Supervisor => Some("eqptSupC"),
            Self::Fantray => Some("eqptFt"),
            Self::PowerSupply => Some("eqptPsu"),
            Self::SystemController => Some("eqptSysC"),
            Self::Link => Some("fabricLink"),
            Self::L2Interface | Self::L3Interface | Self::ExternalSwitch => None,
        }
    }

    /// How this kind participates in attachments, when it does.
    pub fn attach_kind(self) -> Option<AttachKind> {
        match self {
            Self::Interface => Some(AttachKind::Physical),
            Self::L2Interface => Some(AttachKind::L2),
            Self::L3Interface => Some(AttachKind::L3),
            Self::PortChannel => Some(AttachKind::Bundle),
            Self::OspfInterface => Some(AttachKind::Routing),
            _ => None,
        }
    }

    /// Read-only inventory kinds: populated from the controller,
    /// never pushed back.
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            Self::Pod
                | Self::FabricNode
                | Self::Linecard
                | Self::Supervisor
                | Self::Fantray
                | Self::PowerSupply
                | Self::SystemController
                | Self::Link
                | Self::ExternalSwitch
        )
    }
}

/// Attachment capability of an interface-like entity. Attach sites
/// switch on this instead of enumerating concrete kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachKind {
    Physical,
    L2,
    L3,
    Bundle,
    Routing,
}

/// Per-node payload: the entity kind plus its typed fields.
#[derive(Debug, Clone)]
pub enum EntityData {
    Tenant,
    AppProfile,
    Epg,
    OutsideEpg,
    Endpoint(EndpointData),
    BridgeDomain(BridgeDomainData),
    Subnet(SubnetData),
    Context(ContextData),
    Contract(Scope),
    Taboo,
    FilterEntry(FilterEntryData),
    Interface(InterfaceData),
    L2Interface(Encap),
    L3Interface(L3InterfaceData),
    PortChannel,
    OspfInterface(OspfInterfaceData),
    OspfInterfacePolicy(OspfPolicyData),
    OspfRouter(OspfRouterData),
    BgpSession(BgpSessionData),
    Pod(PodData),
    FabricNode(FabricNodeData),
    Linecard(CardData),
    Supervisor(CardData),
    Fantray(CardData),
    PowerSupply(CardData),
    SystemController(CardData),
    Link(LinkData),
    ExternalSwitch,
}

impl EntityData {
    pub fn kind(&self) -> Kind {
        match self {
            Self::Tenant => Kind::Tenant,
            Self::AppProfile => Kind::AppProfile,
            Self::Epg => Kind::Epg,
            Self::OutsideEpg => Kind::OutsideEpg,
            Self::Endpoint(_) => Kind::Endpoint,
            Self::BridgeDomain(_) => Kind::BridgeDomain,
            Self::Subnet(_) => Kind::Subnet,
            Self::Context(_) => Kind::Context,
            Self::Contract(_) => Kind::Contract,
            Self::Taboo => Kind::Taboo,
            Self::FilterEntry(_) => Kind::FilterEntry,
            Self::Interface(_) => Kind::Interface,
            Self::L2Interface(_) => Kind::L2Interface,
            Self::L3Interface(_) => Kind::L3Interface,
            Self::PortChannel => Kind::PortChannel,
            Self::OspfInterface(_) => Kind::OspfInterface,
            Self::OspfInterfacePolicy(_) => Kind::OspfInterfacePolicy,
            Self::OspfRouter(_) => Kind::OspfRouter,
            Self::BgpSession(_) => Kind::BgpSession,
            Self::Pod(_) => Kind::Pod,
            Self::FabricNode(_) => Kind::FabricNode,
            Self::Linecard(_) => Kind::Linecard,
            Self::Supervisor(_) => Kind::Supervisor,
            Self::Fantray(_) => Kind::Fantray,
            Self::PowerSupply(_) => Kind::PowerSupply,
            Self::SystemController(_) => Kind::SystemController,
            Self::Link(_) => Kind::Link,
            Self::ExternalSwitch => Kind::ExternalSwitch,
        }
    }
}
