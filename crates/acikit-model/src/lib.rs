//! Typed object model for APIC-managed fabrics.
//!
//! Entities live in an arena [`Tree`] and are addressed through
//! copyable typed handles. The renderer produces the
//! `{class: {"attributes", "children"}}` documents the controller
//! accepts, and the query layer reads controller state back into the
//! same tree through an [`acikit_api::Session`].
//!
//! ```ignore
//! let mut tree = Tree::new();
//! let tenant = Tenant::create(&mut tree, "cisco")?;
//! let app = AppProfile::create(&mut tree, tenant, "app1")?;
//! let epg = Epg::create(&mut tree, app, "web")?;
//! push_to_apic(&session, &tree, tenant).await?;
//! ```

pub mod entity;
pub mod error;
pub mod json;
pub mod phys;
pub mod query;
pub mod relation;
pub mod render;
pub mod tree;

pub use entity::{
    AdminStatus, AppProfile, AttachKind, BgpSession, BridgeDomain, Contract, Context, Encap,
    EncapType, Endpoint, Epg, FilterEntry, Interface, Kind, L2Interface, L3IfType, L3Interface,
    MulticastMode, OspfInterface, OspfInterfacePolicy, OspfNetworkType, OspfRouter, OutsideEpg,
    PortChannel, Scope, Subnet, Taboo, Tenant, UnicastMode,
};
pub use error::ModelError;
pub use phys::{ExternalSwitch, FabricNode, Fantray, Linecard, Link, Pod, PowerSupply, Supervisor, SystemController};
pub use query::{
    ClassEvent, class_has_events, next_class_event, push_to_apic, subscribe_class,
    unsubscribe_class,
};
pub use relation::{Relation, RelationRole, RelationStatus};
pub use render::{render_docs, to_json, to_xml};
pub use tree::{NodeId, Tag, Tree};
