//! Controller queries and tree deserialization.
//!
//! URL builders are pure functions; the typed `get` operations fetch
//! class or subtree reads through a [`Session`] and materialize the
//! records into a [`Tree`]. Repeated reads unify with existing nodes
//! on (kind, name, parent) instead of duplicating them.

use acikit_api::Session;
use serde_json::Value;
use tracing::debug;

use crate::entity::{
    AppProfile, BridgeDomain, Contract, Context, Endpoint, EntityData, Epg, FilterEntry,
    Interface, Kind, MulticastMode, OspfInterfacePolicy, OspfNetworkType, PortChannel, Scope,
    Subnet, Taboo, Tenant, UnicastMode,
};
use crate::error::ModelError;
use crate::phys::{FabricNode, FabricNodeData, Pod, PodData};
use crate::render;
use crate::tree::{NodeId, Tree};

// ── URL builders ─────────────────────────────────────────────────────

pub fn class_query_url(class: &str) -> String {
    format!("/api/node/class/{class}.json?query-target=self")
}

/// Subtree query under `uni`, optionally scoped to a tenant and a
/// further URL extension such as `/ap-<name>`.
pub fn subtree_url(tenant: Option<&str>, extension: &str, class: &str) -> String {
    let scope = match tenant {
        Some(name) => format!("/tn-{name}{extension}"),
        None => String::new(),
    };
    format!("/api/mo/uni{scope}.json?query-target=subtree&target-subtree-class={class}")
}

pub fn deep_url(tenant: &str) -> String {
    format!("/api/mo/uni/tn-{tenant}.json?query-target=self&rsp-subtree=full")
}

pub fn class_subscription_url(class: &str) -> String {
    format!("/api/class/{class}.json?subscription=yes")
}

// ── Record helpers ───────────────────────────────────────────────────

fn attributes<'a>(record: &'a Value, class: &str) -> Result<&'a Value, ModelError> {
    record
        .get(class)
        .and_then(|body| body.get("attributes"))
        .ok_or_else(|| ModelError::serialization(format!("record is not a {class}")))
}

fn required<'a>(attributes: &'a Value, key: &str) -> Result<&'a str, ModelError> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::serialization(format!("record missing attribute {key:?}")))
}

fn attrs_of(body: &Value) -> Result<&Value, ModelError> {
    body.get("attributes")
        .ok_or_else(|| ModelError::serialization("record missing attributes"))
}

fn optional(attributes: &Value, key: &str) -> Option<String> {
    attributes
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn find_root(tree: &Tree, kind: Kind, name: &str) -> Option<NodeId> {
    tree.roots()
        .into_iter()
        .find(|&id| tree.kind(id) == kind && tree.name(id) == name)
}

fn find_or_create_tenant(tree: &mut Tree, name: &str) -> Result<Tenant, ModelError> {
    match find_root(tree, Kind::Tenant, name) {
        Some(id) => Tenant::from_node(tree, id),
        None => Tenant::create(tree, name),
    }
}

/// Find-or-create an owned child; existing nodes are reused so
/// repeated reads keep their subtrees.
fn unify_child(
    tree: &mut Tree,
    parent: NodeId,
    kind: Kind,
    name: &str,
    data: impl FnOnce() -> EntityData,
) -> Result<NodeId, ModelError> {
    match tree.find_child(parent, kind, name) {
        Some(id) => Ok(id),
        None => tree.create_child(parent, data(), name),
    }
}

// ── Typed class reads ────────────────────────────────────────────────

impl Tenant {
    /// All tenants on the controller.
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("fvTenant")).await?;
        debug!("fetched {} tenants", records.len());
        let mut tenants = Vec::with_capacity(records.len());
        for record in &records {
            let name = required(attributes(record, "fvTenant")?, "name")?.to_owned();
            tenants.push(find_or_create_tenant(tree, &name)?);
        }
        Ok(tenants)
    }

    pub async fn exists(session: &Session, name: &str) -> Result<bool, ModelError> {
        let records = session.get(&class_query_url("fvTenant")).await?;
        for record in &records {
            if required(attributes(record, "fvTenant")?, "name")? == name {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Full-subtree read of the named tenants, or of every tenant
    /// when `names` is empty.
    pub async fn get_deep(
        session: &Session,
        tree: &mut Tree,
        names: &[&str],
    ) -> Result<Vec<Self>, ModelError> {
        let names: Vec<String> = if names.is_empty() {
            let records = session.get(&class_query_url("fvTenant")).await?;
            records
                .iter()
                .map(|r| Ok(required(attributes(r, "fvTenant")?, "name")?.to_owned()))
                .collect::<Result<_, ModelError>>()?
        } else {
            names.iter().map(|&n| n.to_owned()).collect()
        };

        let mut tenants = Vec::with_capacity(names.len());
        for name in &names {
            let records = session.get(&deep_url(name)).await?;
            let record = records
                .first()
                .ok_or_else(|| ModelError::serialization(format!("tenant {name:?} not found")))?;
            tenants.push(parse_deep_tenant(tree, record)?);
        }
        Ok(tenants)
    }
}

impl AppProfile {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let url = subtree_url(Some(&tenant.name(tree).to_owned()), "", "fvAp");
        let records = session.get(&url).await?;
        let mut profiles = Vec::with_capacity(records.len());
        for record in &records {
            let name = required(attributes(record, "fvAp")?, "name")?.to_owned();
            let id = unify_child(tree, tenant.id(), Kind::AppProfile, &name, || {
                EntityData::AppProfile
            })?;
            profiles.push(Self(id));
        }
        Ok(profiles)
    }
}

impl Epg {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        app: AppProfile,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let tenant_name = tenant.name(tree).to_owned();
        let extension = app.url_extension(tree);
        let url = subtree_url(Some(&tenant_name), &extension, "fvAEPg");
        let records = session.get(&url).await?;
        let mut epgs = Vec::with_capacity(records.len());
        for record in &records {
            let name = required(attributes(record, "fvAEPg")?, "name")?.to_owned();
            let id = unify_child(tree, app.id(), Kind::Epg, &name, || EntityData::Epg)?;
            epgs.push(Self(id));
        }
        Ok(epgs)
    }
}

impl BridgeDomain {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let url = subtree_url(Some(&tenant.name(tree).to_owned()), "", "fvBD");
        let records = session.get(&url).await?;
        let mut domains = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fvBD")?;
            let name = required(attrs, "name")?.to_owned();
            let id = unify_child(tree, tenant.id(), Kind::BridgeDomain, &name, || {
                EntityData::BridgeDomain(Default::default())
            })?;
            let bd = Self(id);
            populate_bridge_domain(bd, tree, attrs)?;
            domains.push(bd);
        }
        Ok(domains)
    }
}

impl Context {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let url = subtree_url(Some(&tenant.name(tree).to_owned()), "", "fvCtx");
        let records = session.get(&url).await?;
        let mut contexts = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fvCtx")?;
            let name = required(attrs, "name")?.to_owned();
            let id = unify_child(tree, tenant.id(), Kind::Context, &name, || {
                EntityData::Context(Default::default())
            })?;
            let context = Self(id);
            context.set_allow_all(tree, attrs.get("pcEnfPref").and_then(Value::as_str)
                == Some("unenforced"));
            contexts.push(context);
        }
        Ok(contexts)
    }
}

impl Contract {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let url = subtree_url(Some(&tenant.name(tree).to_owned()), "", "vzBrCP");
        let records = session.get(&url).await?;
        let mut contracts = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "vzBrCP")?;
            let name = required(attrs, "name")?.to_owned();
            let scope = match attrs.get("scope").and_then(Value::as_str) {
                Some(value) => Scope::parse(value)?,
                None => Scope::default(),
            };
            let id = unify_child(tree, tenant.id(), Kind::Contract, &name, || {
                EntityData::Contract(scope)
            })?;
            let contract = Self(id);
            contract.set_scope(tree, scope);
            contracts.push(contract);
        }
        Ok(contracts)
    }
}

impl Subnet {
    pub async fn get(
        session: &Session,
        tree: &mut Tree,
        bd: BridgeDomain,
        tenant: Tenant,
    ) -> Result<Vec<Self>, ModelError> {
        let tenant_name = tenant.name(tree).to_owned();
        let extension = bd.url_extension(tree);
        let url = subtree_url(Some(&tenant_name), &extension, "fvSubnet");
        let records = session.get(&url).await?;
        let mut subnets = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fvSubnet")?;
            let name = required(attrs, "name")?.to_owned();
            let subnet = Self(unify_child(tree, bd.id(), Kind::Subnet, &name, || {
                EntityData::Subnet(Default::default())
            })?);
            subnet.set_addr(tree, required(attrs, "ip")?);
            subnets.push(subnet);
        }
        Ok(subnets)
    }
}

impl Interface {
    /// All physical ports in the fabric.
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("l1PhysIf")).await?;
        debug!("fetched {} interfaces", records.len());
        let mut interfaces = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "l1PhysIf")?;
            let dn = required(attrs, "dn")?;
            let (interface_type, pod, node, module, port) = Self::parse_dn(dn)?;
            let name = format!("{interface_type} {pod}/{node}/{module}/{port}");
            let interface = match find_root(tree, Kind::Interface, &name) {
                Some(id) => Self(id),
                None => Self::create(tree, &interface_type, &pod, &node, &module, &port)?,
            };
            {
                let data = interface.data_mut(tree);
                if let Some(speed) = optional(attrs, "speed") {
                    data.speed = speed;
                }
                if let Some(mtu) = optional(attrs, "mtu") {
                    data.mtu = mtu;
                }
                if let Some(port_type) = optional(attrs, "portT") {
                    data.port_type = port_type;
                }
            }
            interfaces.push(interface);
        }
        Ok(interfaces)
    }
}

impl PortChannel {
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("infraAccBndlGrp")).await?;
        let mut channels = Vec::with_capacity(records.len());
        for record in &records {
            let name = required(attributes(record, "infraAccBndlGrp")?, "name")?.to_owned();
            let channel = match find_root(tree, Kind::PortChannel, &name) {
                Some(id) => Self(id),
                None => Self::create(tree, &name)?,
            };
            channels.push(channel);
        }
        Ok(channels)
    }
}

impl Endpoint {
    /// All learned endpoints, placed under their owning tenant, app
    /// profile, and EPG as named in the endpoint DN.
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("fvCEp")).await?;
        let mut endpoints = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fvCEp")?;
            let dn = required(attrs, "dn")?.to_owned();

            let tenant_name = Tenant::name_from_dn(&dn)
                .ok_or_else(|| ModelError::serialization(format!("bad endpoint dn {dn:?}")))?
                .to_owned();
            let app_name = AppProfile::name_from_dn(&dn)
                .ok_or_else(|| ModelError::serialization(format!("bad endpoint dn {dn:?}")))?
                .to_owned();
            let epg_name = Epg::name_from_dn(&dn)
                .ok_or_else(|| ModelError::serialization(format!("bad endpoint dn {dn:?}")))?
                .to_owned();
            let name = Self::name_from_dn(&dn)
                .ok_or_else(|| ModelError::serialization(format!("bad endpoint dn {dn:?}")))?
                .to_owned();

            let tenant = find_or_create_tenant(tree, &tenant_name)?;
            let app = unify_child(tree, tenant.id(), Kind::AppProfile, &app_name, || {
                EntityData::AppProfile
            })?;
            let epg = unify_child(tree, app, Kind::Epg, &epg_name, || EntityData::Epg)?;
            let id = unify_child(tree, epg, Kind::Endpoint, &name, || {
                EntityData::Endpoint(Default::default())
            })?;
            let endpoint = Self(id);
            {
                let data = endpoint.data_mut(tree);
                data.mac = optional(attrs, "mac").or_else(|| Some(name.clone()));
                data.ip = optional(attrs, "ip");
                data.encap = optional(attrs, "encap");
            }
            endpoints.push(endpoint);
        }
        Ok(endpoints)
    }
}

impl Pod {
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("fabricPod")).await?;
        let mut pods = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fabricPod")?;
            let id = required(attrs, "id")?.to_owned();
            let pod = match find_root(tree, Kind::Pod, &id) {
                Some(node) => Self::from_node(tree, node)?,
                None => Self::create(tree, None, &id, PodData { pod: id.clone() })?,
            };
            pods.push(pod);
        }
        Ok(pods)
    }
}

impl FabricNode {
    pub async fn get(session: &Session, tree: &mut Tree) -> Result<Vec<Self>, ModelError> {
        let records = session.get(&class_query_url("fabricNode")).await?;
        let mut nodes = Vec::with_capacity(records.len());
        for record in &records {
            let attrs = attributes(record, "fabricNode")?;
            let dn = required(attrs, "dn")?;
            let pod_id = dn
                .split('/')
                .nth(1)
                .and_then(|p| p.split('-').nth(1))
                .ok_or_else(|| ModelError::serialization(format!("bad node dn {dn:?}")))?
                .to_owned();
            let node_id = required(attrs, "id")?.to_owned();
            let name = required(attrs, "name")?.to_owned();
            let data = FabricNodeData {
                pod: pod_id.clone(),
                node: node_id,
                role: optional(attrs, "role"),
                model: optional(attrs, "model"),
                serial: optional(attrs, "serial"),
            };

            let pod = match find_root(tree, Kind::Pod, &pod_id) {
                Some(id) => id,
                None => Pod::create(tree, None, &pod_id, PodData { pod: pod_id.clone() })?.id(),
            };
            let node = match tree.find_child(pod, Kind::FabricNode, &name) {
                Some(id) => Self::from_node(tree, id)?,
                None => Self::create(tree, Some(pod), &name, data)?,
            };
            nodes.push(node);
        }
        Ok(nodes)
    }
}

// ── Deep deserialization ─────────────────────────────────────────────

fn children_of<'a>(body: &'a Value) -> &'a [Value] {
    body.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn populate_bridge_domain(
    bd: BridgeDomain,
    tree: &mut Tree,
    attrs: &Value,
) -> Result<(), ModelError> {
    let data = bd.data_mut(tree);
    match attrs.get("unkMacUcastAct").and_then(Value::as_str) {
        Some("flood") => data.unknown_mac_unicast = UnicastMode::Flood,
        Some("proxy") | None => data.unknown_mac_unicast = UnicastMode::Proxy,
        Some(other) => {
            return Err(ModelError::serialization(format!(
                "invalid unkMacUcastAct {other:?}"
            )));
        }
    }
    if attrs.get("unkMcastAct").and_then(Value::as_str) == Some("opt-flood") {
        data.unknown_multicast = MulticastMode::OptimizedFlood;
    }
    data.arp_flood = attrs.get("arpFlood").and_then(Value::as_str) == Some("yes");
    data.unicast_route = attrs.get("unicastRoute").and_then(Value::as_str) != Some("no");
    Ok(())
}

/// Materialize one `rsp-subtree=full` tenant record.
fn parse_deep_tenant(tree: &mut Tree, record: &Value) -> Result<Tenant, ModelError> {
    let body = record
        .get("fvTenant")
        .ok_or_else(|| ModelError::serialization("record is not a fvTenant"))?;
    let name = required(attrs_of(body)?, "name")?.to_owned();
    let tenant = find_or_create_tenant(tree, &name)?;

    // Relation targets are resolved after the whole subtree exists.
    let mut epg_bds: Vec<(Epg, String)> = Vec::new();
    let mut epg_provided: Vec<(Epg, String)> = Vec::new();
    let mut epg_consumed: Vec<(Epg, String)> = Vec::new();
    let mut bd_contexts: Vec<(BridgeDomain, String)> = Vec::new();
    let mut contract_filters: Vec<(NodeId, String)> = Vec::new();

    for child in children_of(body) {
        if let Some(app_body) = child.get("fvAp") {
            let app_name = required(attrs_of(app_body)?, "name")?;
            let app = unify_child(tree, tenant.id(), Kind::AppProfile, app_name, || {
                EntityData::AppProfile
            })?;
            for epg_child in children_of(app_body) {
                let Some(epg_body) = epg_child.get("fvAEPg") else {
                    continue;
                };
                let epg_name = required(attrs_of(epg_body)?, "name")?;
                let epg = Epg(unify_child(tree, app, Kind::Epg, epg_name, || {
                    EntityData::Epg
                })?);
                for grandchild in children_of(epg_body) {
                    if let Some(rel) = grandchild.get("fvRsBd") {
                        let target = required(attrs_of(rel)?, "tnFvBDName")?;
                        epg_bds.push((epg, target.to_owned()));
                    } else if let Some(rel) = grandchild.get("fvRsProv") {
                        let target = required(attrs_of(rel)?, "tnVzBrCPName")?;
                        epg_provided.push((epg, target.to_owned()));
                    } else if let Some(rel) = grandchild.get("fvRsCons") {
                        let target = required(attrs_of(rel)?, "tnVzBrCPName")?;
                        epg_consumed.push((epg, target.to_owned()));
                    } else if let Some(ep_body) =
                        grandchild.get("fvCEp").or_else(|| grandchild.get("fvStCEp"))
                    {
                        let attrs = attrs_of(ep_body)?;
                        let ep_name = required(attrs, "name")?.to_owned();
                        let id = unify_child(tree, epg.id(), Kind::Endpoint, &ep_name, || {
                            EntityData::Endpoint(Default::default())
                        })?;
                        let data = Endpoint(id).data_mut(tree);
                        data.mac = optional(attrs, "mac").or(Some(ep_name));
                        data.ip = optional(attrs, "ip");
                        data.encap = optional(attrs, "encap");
                    }
                }
            }
        } else if let Some(bd_body) = child.get("fvBD") {
            let attrs = attrs_of(bd_body)?;
            let bd_name = required(attrs, "name")?.to_owned();
            let bd = BridgeDomain(unify_child(
                tree,
                tenant.id(),
                Kind::BridgeDomain,
                &bd_name,
                || EntityData::BridgeDomain(Default::default()),
            )?);
            populate_bridge_domain(bd, tree, attrs)?;
            for bd_child in children_of(bd_body) {
                if let Some(subnet_body) = bd_child.get("fvSubnet") {
                    let attrs = attrs_of(subnet_body)?;
                    let subnet_name = required(attrs, "name")?.to_owned();
                    let subnet = Subnet(unify_child(
                        tree,
                        bd.id(),
                        Kind::Subnet,
                        &subnet_name,
                        || EntityData::Subnet(Default::default()),
                    )?);
                    subnet.set_addr(tree, required(attrs, "ip")?);
                } else if let Some(rel) = bd_child.get("fvRsCtx") {
                    let target = required(attrs_of(rel)?, "tnFvCtxName")?;
                    bd_contexts.push((bd, target.to_owned()));
                }
            }
        } else if let Some(ctx_body) = child.get("fvCtx") {
            let attrs = attrs_of(ctx_body)?;
            let ctx_name = required(attrs, "name")?.to_owned();
            let context = Context(unify_child(
                tree,
                tenant.id(),
                Kind::Context,
                &ctx_name,
                || EntityData::Context(Default::default()),
            )?);
            context.set_allow_all(
                tree,
                attrs.get("pcEnfPref").and_then(Value::as_str) == Some("unenforced"),
            );
        } else if let Some(contract_body) = child.get("vzBrCP") {
            let attrs = attrs_of(contract_body)?;
            let contract_name = required(attrs, "name")?.to_owned();
            let scope = match attrs.get("scope").and_then(Value::as_str) {
                Some(value) => Scope::parse(value)?,
                None => Scope::default(),
            };
            let contract = Contract(unify_child(
                tree,
                tenant.id(),
                Kind::Contract,
                &contract_name,
                || EntityData::Contract(scope),
            )?);
            contract.set_scope(tree, scope);
            collect_subject_filters(contract_body, "vzSubj", contract.id(), &mut contract_filters);
        } else if let Some(taboo_body) = child.get("vzTaboo") {
            let taboo_name = required(attrs_of(taboo_body)?, "name")?.to_owned();
            let taboo = Taboo(unify_child(
                tree,
                tenant.id(),
                Kind::Taboo,
                &taboo_name,
                || EntityData::Taboo,
            )?);
            collect_subject_filters(taboo_body, "vzTSubj", taboo.id(), &mut contract_filters);
        } else if let Some(policy_body) = child.get("ospfIfPol") {
            let attrs = attrs_of(policy_body)?;
            let policy_name = required(attrs, "name")?.to_owned();
            let policy = OspfInterfacePolicy(unify_child(
                tree,
                tenant.id(),
                Kind::OspfInterfacePolicy,
                &policy_name,
                || EntityData::OspfInterfacePolicy(Default::default()),
            )?);
            let data = policy.data_mut(tree);
            if let Some(hello) = attrs.get("helloIntvl").and_then(Value::as_str) {
                data.hello_interval = hello.parse().map_err(|_| {
                    ModelError::serialization(format!("invalid helloIntvl {hello:?}"))
                })?;
            }
            if let Some(dead) = attrs.get("deadIntvl").and_then(Value::as_str) {
                data.dead_interval = dead.parse().map_err(|_| {
                    ModelError::serialization(format!("invalid deadIntvl {dead:?}"))
                })?;
            }
            if attrs.get("nwT").and_then(Value::as_str) == Some("p2p") {
                data.network_type = OspfNetworkType::PointToPoint;
            }
        }
    }

    // Filter entries live in sibling vzFilter documents.
    for (owner, filter_name) in contract_filters {
        for child in children_of(body) {
            let Some(filter_body) = child.get("vzFilter") else {
                continue;
            };
            if required(attrs_of(filter_body)?, "name")? != filter_name {
                continue;
            }
            for entry_child in children_of(filter_body) {
                let Some(entry_body) = entry_child.get("vzEntry") else {
                    continue;
                };
                let attrs = attrs_of(entry_body)?;
                let entry_name = required(attrs, "name")?.to_owned();
                let entry = FilterEntry(unify_child(
                    tree,
                    owner,
                    Kind::FilterEntry,
                    &entry_name,
                    || EntityData::FilterEntry(Default::default()),
                )?);
                let data = entry.data_mut(tree);
                for (field, key) in [
                    (&mut data.apply_to_frag, "applyToFrag"),
                    (&mut data.arp_opc, "arpOpc"),
                    (&mut data.d_from_port, "dFromPort"),
                    (&mut data.d_to_port, "dToPort"),
                    (&mut data.ether_t, "etherT"),
                    (&mut data.prot, "prot"),
                    (&mut data.s_from_port, "sFromPort"),
                    (&mut data.s_to_port, "sToPort"),
                    (&mut data.tcp_rules, "tcpRules"),
                ] {
                    if let Some(value) = attrs.get(key).and_then(Value::as_str) {
                        *field = value.to_owned();
                    }
                }
            }
        }
    }

    // Resolve name references now that every target exists.
    for (epg, bd_name) in epg_bds {
        if let Some(bd) = tree.find_child(tenant.id(), Kind::BridgeDomain, &bd_name) {
            epg.add_bd(tree, BridgeDomain(bd));
        }
    }
    for (epg, contract_name) in epg_provided {
        if let Some(c) = tree.find_child(tenant.id(), Kind::Contract, &contract_name) {
            epg.provide(tree, Contract(c));
        }
    }
    for (epg, contract_name) in epg_consumed {
        if let Some(c) = tree.find_child(tenant.id(), Kind::Contract, &contract_name) {
            epg.consume(tree, Contract(c));
        }
    }
    for (bd, ctx_name) in bd_contexts {
        if let Some(ctx) = tree.find_child(tenant.id(), Kind::Context, &ctx_name) {
            bd.add_context(tree, Context(ctx));
        }
    }

    Ok(tenant)
}

fn collect_subject_filters(
    body: &Value,
    subject_class: &str,
    owner: NodeId,
    out: &mut Vec<(NodeId, String)>,
) {
    for child in children_of(body) {
        let Some(subject_body) = child.get(subject_class) else {
            continue;
        };
        for subject_child in children_of(subject_body) {
            let filter_name = subject_child
                .get("vzRsSubjFiltAtt")
                .or_else(|| subject_child.get("vzRsDenyRule"))
                .and_then(|rel| rel.get("attributes"))
                .and_then(|attrs| attrs.get("tnVzFilterName"))
                .and_then(Value::as_str);
            if let Some(filter_name) = filter_name {
                out.push((owner, filter_name.to_owned()));
            }
        }
    }
}

// ── Class subscriptions ──────────────────────────────────────────────

/// One change notification for an object of a subscribed class.
#[derive(Debug, Clone)]
pub struct ClassEvent {
    pub class: String,
    pub name: String,
    pub dn: String,
    pub is_deleted: bool,
    pub attributes: Value,
}

impl ClassEvent {
    fn from_frame(frame: &Value) -> Result<Self, ModelError> {
        let record = frame
            .get("imdata")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .ok_or_else(|| ModelError::serialization("event frame missing imdata"))?;
        let object = record
            .as_object()
            .and_then(|o| o.iter().next())
            .ok_or_else(|| ModelError::serialization("event frame missing class record"))?;
        let (class, body) = object;
        let attrs = body
            .get("attributes")
            .ok_or_else(|| ModelError::serialization("event record missing attributes"))?;
        let dn = optional(attrs, "dn").unwrap_or_default();
        let name = optional(attrs, "name")
            .or_else(|| dn.rsplit('/').next().map(str::to_owned))
            .unwrap_or_default();
        Ok(Self {
            class: class.clone(),
            name,
            dn,
            is_deleted: attrs.get("status").and_then(Value::as_str) == Some("deleted"),
            attributes: attrs.clone(),
        })
    }
}

/// Subscribe to change events for a class.
pub async fn subscribe_class(session: &Session, class: &str) -> Result<(), ModelError> {
    Ok(session.subscribe(&class_subscription_url(class)).await?)
}

pub async fn class_has_events(session: &Session, class: &str) -> Result<bool, ModelError> {
    Ok(session.has_events(&class_subscription_url(class)).await?)
}

/// Next queued event for the class; fails when none is waiting.
pub async fn next_class_event(session: &Session, class: &str) -> Result<ClassEvent, ModelError> {
    let frame = session.get_event(&class_subscription_url(class)).await?;
    ClassEvent::from_frame(&frame)
}

pub async fn unsubscribe_class(session: &Session, class: &str) -> Result<(), ModelError> {
    Ok(session.unsubscribe(&class_subscription_url(class)).await?)
}

// ── Push ─────────────────────────────────────────────────────────────

/// Serialize the tenant subtree and post it to the controller.
pub async fn push_to_apic(
    session: &Session,
    tree: &Tree,
    tenant: Tenant,
) -> Result<(), ModelError> {
    let doc = render::to_json(tree, tenant.id())?;
    debug!("pushing tenant {}", tenant.name(tree));
    Ok(session.post(&Tenant::get_url("json"), &doc).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn url_builders() {
        assert_eq!(
            class_query_url("fvTenant"),
            "/api/node/class/fvTenant.json?query-target=self"
        );
        assert_eq!(
            subtree_url(None, "", "fvAp"),
            "/api/mo/uni.json?query-target=subtree&target-subtree-class=fvAp"
        );
        assert_eq!(
            subtree_url(Some("cisco"), "/ap-app1", "fvAEPg"),
            "/api/mo/uni/tn-cisco/ap-app1.json?query-target=subtree&target-subtree-class=fvAEPg"
        );
        assert_eq!(
            deep_url("cisco"),
            "/api/mo/uni/tn-cisco.json?query-target=self&rsp-subtree=full"
        );
        assert_eq!(
            class_subscription_url("fvTenant"),
            "/api/class/fvTenant.json?subscription=yes"
        );
    }

    #[test]
    fn deep_parse_builds_tree_and_relations() {
        let record = json!({"fvTenant": {
            "attributes": {"name": "cisco"},
            "children": [
                {"fvCtx": {"attributes": {"name": "main", "pcEnfPref": "unenforced"}}},
                {"fvBD": {
                    "attributes": {"name": "bd1", "arpFlood": "yes"},
                    "children": [
                        {"fvSubnet": {"attributes": {"name": "s1", "ip": "10.0.0.1/24"}}},
                        {"fvRsCtx": {"attributes": {"tnFvCtxName": "main"}}},
                    ]}},
                {"vzBrCP": {
                    "attributes": {"name": "http", "scope": "tenant"},
                    "children": [
                        {"vzSubj": {
                            "attributes": {"name": "http80"},
                            "children": [{"vzRsSubjFiltAtt": {
                                "attributes": {"tnVzFilterName": "http80"}}}]}},
                    ]}},
                {"vzFilter": {
                    "attributes": {"name": "http80"},
                    "children": [{"vzEntry": {
                        "attributes": {
                            "name": "80",
                            "dFromPort": "80",
                            "dToPort": "80",
                            "etherT": "ip",
                            "prot": "6",
                        }}}]}},
                {"fvAp": {
                    "attributes": {"name": "app"},
                    "children": [{"fvAEPg": {
                        "attributes": {"name": "web"},
                        "children": [
                            {"fvRsBd": {"attributes": {"tnFvBDName": "bd1"}}},
                            {"fvRsProv": {"attributes": {"tnVzBrCPName": "http"}}},
                        ]}}]}},
            ]}});

        let mut tree = Tree::new();
        let tenant = parse_deep_tenant(&mut tree, &record).unwrap();
        assert_eq!(tenant.name(&tree), "cisco");

        let ctx = Context(tree.find_child(tenant.id(), Kind::Context, "main").unwrap());
        assert!(ctx.get_allow_all(&tree));

        let bd = BridgeDomain(
            tree.find_child(tenant.id(), Kind::BridgeDomain, "bd1").unwrap(),
        );
        assert!(bd.data(&tree).arp_flood);
        assert_eq!(bd.get_context(&tree), Some(ctx));
        let subnets = bd.get_subnets(&tree);
        assert_eq!(subnets.len(), 1);
        assert_eq!(subnets[0].get_addr(&tree), Some("10.0.0.1/24"));

        let contract = Contract(
            tree.find_child(tenant.id(), Kind::Contract, "http").unwrap(),
        );
        assert_eq!(contract.get_scope(&tree), Scope::Tenant);
        let entries = contract.get_entries(&tree);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].data(&tree).d_from_port, "80");

        let app = tree.find_child(tenant.id(), Kind::AppProfile, "app").unwrap();
        let epg = Epg(tree.find_child(app, Kind::Epg, "web").unwrap());
        assert_eq!(epg.get_bd(&tree), Some(bd));
        assert!(epg.does_provide(&tree, contract));
    }

    #[test]
    fn deep_parse_is_idempotent() {
        let record = json!({"fvTenant": {
            "attributes": {"name": "t1"},
            "children": [
                {"fvAp": {"attributes": {"name": "app"}, "children": []}},
            ]}});

        let mut tree = Tree::new();
        let first = parse_deep_tenant(&mut tree, &record).unwrap();
        let second = parse_deep_tenant(&mut tree, &record).unwrap();
        assert_eq!(first, second);
        assert_eq!(tree.children(first.id()).len(), 1);
    }

    #[test]
    fn class_event_from_frame() {
        let frame = json!({
            "totalCount": "1",
            "subscriptionId": ["72057598349672459"],
            "imdata": [{"fvTenant": {"attributes": {
                "name": "cisco",
                "dn": "uni/tn-cisco",
                "status": "deleted",
            }}}]});
        let event = ClassEvent::from_frame(&frame).unwrap();
        assert_eq!(event.class, "fvTenant");
        assert_eq!(event.name, "cisco");
        assert_eq!(event.dn, "uni/tn-cisco");
        assert!(event.is_deleted);
    }

    #[test]
    fn malformed_event_frame_is_rejected() {
        assert!(ClassEvent::from_frame(&json!({"imdata": []})).is_err());
        assert!(ClassEvent::from_frame(&json!({})).is_err());
    }
}
