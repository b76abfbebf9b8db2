//! Configuration document rendering.
//!
//! [`render_docs`] turns a node into the document list to push. Most
//! entities render exactly one document; contracts and taboos also
//! emit one sibling `vzFilter` document per filter entry, which a
//! parent tenant flattens into its own child list so everything lands
//! in a single post.

use serde_json::{Map, Value, json};

use crate::entity::{
    BridgeDomain, Contract, Epg, FilterEntry, Kind, L2Interface, OspfInterfacePolicy, OutsideEpg,
    Subnet,
};
use crate::error::ModelError;
use crate::json::{envelope, name_attributes, tag_children};
use crate::relation::RelationRole;
use crate::tree::{NodeId, Tree};

/// Render the documents for a node. The first document is the entity
/// itself; any further documents are siblings that must be posted to
/// the same target.
pub fn render_docs(tree: &Tree, id: NodeId) -> Result<Vec<Value>, ModelError> {
    match tree.kind(id) {
        Kind::Tenant => Ok(vec![render_container(tree, id, "fvTenant", Vec::new())?]),
        Kind::AppProfile => Ok(vec![render_container(tree, id, "fvAp", Vec::new())?]),
        Kind::Epg => Ok(vec![render_epg(tree, id)?]),
        Kind::OutsideEpg => Ok(vec![render_outside_epg(tree, id)?]),
        Kind::Endpoint => Ok(Vec::new()),
        Kind::BridgeDomain => Ok(vec![render_bridge_domain(tree, id)?]),
        Kind::Subnet => Ok(vec![render_subnet(tree, id)?]),
        Kind::Context => Ok(vec![render_context(tree, id)]),
        Kind::Contract => render_contract(tree, id, "vzBrCP", "vzSubj", "vzRsSubjFiltAtt"),
        Kind::Taboo => render_contract(tree, id, "vzTaboo", "vzTSubj", "vzRsDenyRule"),
        Kind::FilterEntry => Ok(vec![render_filter(tree, id)]),
        Kind::OspfInterfacePolicy => Ok(vec![OspfInterfacePolicy(id).to_json(tree)]),
        _ => Err(ModelError::NotImplemented),
    }
}

/// The primary document for a node.
pub fn to_json(tree: &Tree, id: NodeId) -> Result<Value, ModelError> {
    let mut docs = render_docs(tree, id)?;
    if docs.is_empty() {
        return Err(ModelError::NotImplemented);
    }
    Ok(docs.swap_remove(0))
}

/// XML rendering of the primary document.
pub fn to_xml(tree: &Tree, id: NodeId) -> Result<String, ModelError> {
    crate::json::to_xml(&to_json(tree, id)?)
}

fn base_attributes(tree: &Tree, id: NodeId) -> Map<String, Value> {
    let mut attributes = name_attributes(tree.name(id));
    if tree.is_deleted(id) {
        attributes.insert("status".to_owned(), Value::String("deleted".to_owned()));
    }
    attributes
}

/// Assemble the standard envelope: relation documents first, then
/// tags, then the flattened documents of owned children.
fn assemble(
    tree: &Tree,
    id: NodeId,
    class: &str,
    attributes: Map<String, Value>,
    mut children: Vec<Value>,
) -> Result<Value, ModelError> {
    children.extend(tag_children(tree.tags(id)));
    for &child in tree.children(id) {
        children.extend(render_docs(tree, child)?);
    }
    Ok(envelope(class, attributes, children))
}

fn render_container(
    tree: &Tree,
    id: NodeId,
    class: &str,
    children: Vec<Value>,
) -> Result<Value, ModelError> {
    assemble(tree, id, class, base_attributes(tree, id), children)
}

fn contract_relation_docs(tree: &Tree, id: NodeId) -> Vec<Value> {
    let mut docs = Vec::new();
    for target in tree.attached_targets_with_role(id, Kind::Contract, Some(RelationRole::Provided))
    {
        docs.push(json!({"fvRsProv": {"attributes": {"tnVzBrCPName": tree.name(target)}}}));
    }
    for target in tree.attached_targets_with_role(id, Kind::Contract, Some(RelationRole::Consumed))
    {
        docs.push(json!({"fvRsCons": {"attributes": {"tnVzBrCPName": tree.name(target)}}}));
    }
    docs
}

fn render_epg(tree: &Tree, id: NodeId) -> Result<Value, ModelError> {
    let epg = Epg(id);
    let mut children = contract_relation_docs(tree, id);

    if let Some(bd) = epg.get_bd(tree) {
        children.push(json!({"fvRsBd": {"attributes": {"tnFvBDName": bd.name(tree)}}}));
    }

    let interfaces = epg.get_interfaces(tree);
    for interface in &interfaces {
        let path = interface.path(tree).ok_or_else(|| {
            ModelError::validation("attached L2 interface has no port attached")
        })?;
        children.push(json!({"fvRsPathAtt": {"attributes": {
            "encap": interface.encap(tree).text(),
            "tDn": path,
        }}}));
    }
    if !interfaces.is_empty() {
        children.push(json!({"fvRsDomAtt": {"attributes": {"tDn": "uni/phys-allvlans"}}}));
    }

    // Detached ports get one teardown document each.
    for target in tree.detached_targets(id, Kind::L2Interface) {
        let interface = L2Interface(target);
        let path = interface.path(tree).ok_or_else(|| {
            ModelError::validation("detached L2 interface has no port attached")
        })?;
        children.push(json!({"fvRsPathAtt": {"attributes": {
            "encap": interface.encap(tree).text(),
            "status": "deleted",
            "tDn": path,
        }}}));
    }

    assemble(tree, id, "fvAEPg", base_attributes(tree, id), children)
}

fn render_outside_epg(tree: &Tree, id: NodeId) -> Result<Value, ModelError> {
    let epg = OutsideEpg(id);
    let mut children = Vec::new();

    for ospf in epg.get_routed_interfaces(tree) {
        if let Some(area_id) = &ospf.data(tree).area_id {
            children.push(json!({"ospfExtP": {
                "attributes": {"areaId": area_id},
                "children": []}}));
        }
        let mut instp_children: Vec<Value> = ospf
            .data(tree)
            .networks
            .iter()
            .map(|network| json!({"l3extSubnet": {"attributes": {"ip": network}, "children": []}}))
            .collect();
        instp_children.extend(contract_relation_docs(tree, id));
        children.push(json!({"l3extInstP": {
            "attributes": {"name": tree.name(id)},
            "children": instp_children}}));
    }
    for ospf in epg.get_routed_interfaces(tree) {
        children.push(ospf.to_json(tree)?);
    }

    let sessions = epg.get_bgp_sessions(tree);
    if !sessions.is_empty() {
        children.push(json!({"bgpExtP": {"attributes": {}, "children": []}}));
        for session in sessions {
            children.push(session.to_json(tree)?);
        }
    }

    assemble(tree, id, "l3extOut", base_attributes(tree, id), children)
}

fn render_bridge_domain(tree: &Tree, id: NodeId) -> Result<Value, ModelError> {
    let bd = BridgeDomain(id);
    let data = bd.data(tree);

    let mut attributes = base_attributes(tree, id);
    attributes.insert(
        "unkMacUcastAct".to_owned(),
        Value::String(data.unknown_mac_unicast.wire_value().to_owned()),
    );
    attributes.insert(
        "unkMcastAct".to_owned(),
        Value::String(data.unknown_multicast.wire_value().to_owned()),
    );
    attributes.insert(
        "arpFlood".to_owned(),
        Value::String(yes_no(data.arp_flood).to_owned()),
    );
    attributes.insert(
        "unicastRoute".to_owned(),
        Value::String(yes_no(data.unicast_route).to_owned()),
    );

    let mut children = Vec::new();
    if let Some(context) = bd.get_context(tree) {
        children.push(json!({"fvRsCtx": {"attributes": {"tnFvCtxName": context.name(tree)}}}));
    }
    assemble(tree, id, "fvBD", attributes, children)
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn render_subnet(tree: &Tree, id: NodeId) -> Result<Value, ModelError> {
    let subnet = Subnet(id);
    let addr = subnet
        .get_addr(tree)
        .ok_or_else(|| ModelError::validation("subnet address is not set"))?;
    let mut attributes = base_attributes(tree, id);
    attributes.insert("ip".to_owned(), Value::String(addr.to_owned()));
    assemble(tree, id, "fvSubnet", attributes, Vec::new())
}

fn render_context(tree: &Tree, id: NodeId) -> Value {
    let context = crate::entity::Context(id);
    let mut attributes = base_attributes(tree, id);
    let enforcement = if context.get_allow_all(tree) {
        "unenforced"
    } else {
        "enforced"
    };
    attributes.insert(
        "pcEnfPref".to_owned(),
        Value::String(enforcement.to_owned()),
    );
    envelope("fvCtx", attributes, tag_children(tree.tags(id)))
}

/// One subject per entry inside the contract, plus a sibling
/// `vzFilter` per entry. Subject and filter share the name
/// `<contract><entry>`.
fn render_contract(
    tree: &Tree,
    id: NodeId,
    contract_class: &str,
    subject_class: &str,
    subject_relation_class: &str,
) -> Result<Vec<Value>, ModelError> {
    let mut attributes = base_attributes(tree, id);
    if contract_class == "vzBrCP" {
        let scope = Contract(id).get_scope(tree);
        attributes.insert(
            "scope".to_owned(),
            Value::String(scope.wire_value().to_owned()),
        );
    }

    let entries = tree.children_of_kind(id, Kind::FilterEntry);
    let mut subjects = Vec::new();
    for &entry in &entries {
        let subject_name = format!("{}{}", tree.name(id), tree.name(entry));
        subjects.push(json!({subject_class: {
            "attributes": {"name": subject_name},
            "children": [{subject_relation_class: {
                "attributes": {"tnVzFilterName": subject_name}}}]}}));
    }
    subjects.extend(tag_children(tree.tags(id)));

    let mut docs = vec![envelope(contract_class, attributes, subjects)];
    for entry in entries {
        docs.push(render_filter(tree, entry));
    }
    Ok(docs)
}

fn render_filter(tree: &Tree, id: NodeId) -> Value {
    let entry = FilterEntry(id);
    let d = entry.data(tree);

    let mut attributes = base_attributes(tree, id);
    for (key, value) in [
        ("applyToFrag", &d.apply_to_frag),
        ("arpOpc", &d.arp_opc),
        ("dFromPort", &d.d_from_port),
        ("dToPort", &d.d_to_port),
        ("etherT", &d.ether_t),
        ("prot", &d.prot),
        ("sFromPort", &d.s_from_port),
        ("sToPort", &d.s_to_port),
        ("tcpRules", &d.tcp_rules),
    ] {
        attributes.insert(key.to_owned(), Value::String(value.clone()));
    }
    let entry_doc = envelope("vzEntry", attributes, Vec::new());

    let filter_name = match tree.parent(id) {
        Some(parent) => format!("{}{}", tree.name(parent), tree.name(id)),
        None => tree.name(id).to_owned(),
    };
    envelope("vzFilter", name_attributes(&filter_name), vec![entry_doc])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{
        AppProfile, BridgeDomain, Context, Encap, EncapType, Interface, L2Interface, Scope, Taboo,
        Tenant,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn tenant_envelope_flattens_contract_filters() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let c = Contract::create(&mut tree, t, "http", Scope::default()).unwrap();
        FilterEntry::create(&mut tree, c.id(), "80").unwrap();

        let doc = to_json(&tree, t.id()).unwrap();
        let children = doc["fvTenant"]["children"].as_array().unwrap();
        assert_eq!(children.len(), 2, "contract plus sibling filter");
        assert_eq!(children[0]["vzBrCP"]["attributes"]["name"], "http");
        assert_eq!(children[1]["vzFilter"]["attributes"]["name"], "http80");

        let subject = &children[0]["vzBrCP"]["children"][0]["vzSubj"];
        assert_eq!(subject["attributes"]["name"], "http80");
        assert_eq!(
            subject["children"][0]["vzRsSubjFiltAtt"]["attributes"]["tnVzFilterName"],
            "http80"
        );
    }

    #[test]
    fn taboo_uses_deny_rule_relation() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let taboo = Taboo::create(&mut tree, t, "deny").unwrap();
        FilterEntry::create(&mut tree, taboo.id(), "all").unwrap();

        let docs = render_docs(&tree, taboo.id()).unwrap();
        let subject = &docs[0]["vzTaboo"]["children"][0]["vzTSubj"];
        assert_eq!(subject["attributes"]["name"], "denyall");
        assert!(subject["children"][0].get("vzRsDenyRule").is_some());
        assert!(docs[0]["vzTaboo"]["attributes"].get("scope").is_none());
    }

    #[test]
    fn epg_children_follow_relation_order() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let app = AppProfile::create(&mut tree, t, "app").unwrap();
        let epg = Epg::create(&mut tree, app, "web").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let c = Contract::create(&mut tree, t, "http", Scope::default()).unwrap();
        let port = Interface::create(&mut tree, "eth", "1", "101", "1", "1").unwrap();
        let vlan = L2Interface::create(&mut tree, "v5", Encap::new(EncapType::Vlan, "5")).unwrap();
        vlan.attach(&mut tree, port.id()).unwrap();

        epg.provide(&mut tree, c);
        epg.add_bd(&mut tree, bd);
        epg.attach(&mut tree, vlan);

        let doc = to_json(&tree, epg.id()).unwrap();
        let children = doc["fvAEPg"]["children"].as_array().unwrap();
        assert_eq!(children[0]["fvRsProv"]["attributes"]["tnVzBrCPName"], "http");
        assert_eq!(children[1]["fvRsBd"]["attributes"]["tnFvBDName"], "bd1");
        let path_att = &children[2]["fvRsPathAtt"]["attributes"];
        assert_eq!(path_att["encap"], "vlan-5");
        assert_eq!(path_att["tDn"], "topology/pod-1/paths-101/pathep-[eth1/1]");
        assert_eq!(
            children[3]["fvRsDomAtt"]["attributes"]["tDn"],
            "uni/phys-allvlans"
        );
    }

    #[test]
    fn detached_port_renders_deleted_attachment() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let app = AppProfile::create(&mut tree, t, "app").unwrap();
        let epg = Epg::create(&mut tree, app, "web").unwrap();
        let port = Interface::create(&mut tree, "eth", "1", "101", "1", "1").unwrap();
        let vlan = L2Interface::create(&mut tree, "v5", Encap::new(EncapType::Vlan, "5")).unwrap();
        vlan.attach(&mut tree, port.id()).unwrap();

        epg.attach(&mut tree, vlan);
        epg.detach(&mut tree, vlan);

        let doc = to_json(&tree, epg.id()).unwrap();
        let children = doc["fvAEPg"]["children"].as_array().unwrap();
        assert_eq!(children.len(), 1);
        let attrs = &children[0]["fvRsPathAtt"]["attributes"];
        assert_eq!(attrs["status"], "deleted");
        assert_eq!(attrs["encap"], "vlan-5");
    }

    #[test]
    fn bridge_domain_defaults_and_context() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let ctx = Context::create(&mut tree, t, "main").unwrap();
        bd.add_context(&mut tree, ctx);

        let doc = to_json(&tree, bd.id()).unwrap();
        let attrs = &doc["fvBD"]["attributes"];
        assert_eq!(attrs["unkMacUcastAct"], "proxy");
        assert_eq!(attrs["unkMcastAct"], "flood");
        assert_eq!(attrs["arpFlood"], "no");
        assert_eq!(attrs["unicastRoute"], "yes");
        assert_eq!(
            doc["fvBD"]["children"][0]["fvRsCtx"]["attributes"]["tnFvCtxName"],
            "main"
        );
    }

    #[test]
    fn subnet_requires_address() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let bd = BridgeDomain::create(&mut tree, t, "bd1").unwrap();
        let subnet = Subnet::create(&mut tree, bd, "s1").unwrap();

        assert!(to_json(&tree, subnet.id()).is_err());
        subnet.set_addr(&mut tree, "10.0.0.1/24");
        let doc = to_json(&tree, subnet.id()).unwrap();
        assert_eq!(doc["fvSubnet"]["attributes"]["ip"], "10.0.0.1/24");
    }

    #[test]
    fn context_enforcement_attribute() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let ctx = Context::create(&mut tree, t, "main").unwrap();

        let doc = to_json(&tree, ctx.id()).unwrap();
        assert_eq!(doc["fvCtx"]["attributes"]["pcEnfPref"], "enforced");

        ctx.set_allow_all(&mut tree, true);
        let doc = to_json(&tree, ctx.id()).unwrap();
        assert_eq!(doc["fvCtx"]["attributes"]["pcEnfPref"], "unenforced");
    }

    #[test]
    fn deleted_node_carries_status() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        let app = AppProfile::create(&mut tree, t, "app").unwrap();
        tree.mark_deleted(app.id());

        let doc = to_json(&tree, app.id()).unwrap();
        assert_eq!(doc["fvAp"]["attributes"]["status"], "deleted");
    }

    #[test]
    fn physical_nodes_are_not_renderable() {
        let mut tree = Tree::new();
        let port = Interface::create(&mut tree, "eth", "1", "101", "1", "1").unwrap();
        assert!(matches!(
            to_json(&tree, port.id()),
            Err(ModelError::NotImplemented)
        ));
    }

    #[test]
    fn tags_render_before_child_docs() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        AppProfile::create(&mut tree, t, "app").unwrap();
        tree.add_tag(t.id(), "prod");
        tree.remove_tag(t.id(), "prod");

        let doc = to_json(&tree, t.id()).unwrap();
        let children = doc["fvTenant"]["children"].as_array().unwrap();
        assert_eq!(children[0]["tagInst"]["attributes"]["status"], "deleted");
        assert!(children[1].get("fvAp").is_some());
    }

    #[test]
    fn xml_of_tenant() {
        let mut tree = Tree::new();
        let t = Tenant::create(&mut tree, "t1").unwrap();
        assert_eq!(to_xml(&tree, t.id()).unwrap(), "<fvTenant name=\"t1\"/>");
    }
}
