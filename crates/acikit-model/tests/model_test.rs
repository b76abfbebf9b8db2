// Integration tests for the query layer against a mock controller.
//
// The WebSocket channel connects in the background and retries quietly,
// so class subscriptions are exercised through the snapshot records the
// subscribe reply carries.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use acikit_api::{Session, SessionConfig};
use acikit_model::{
    AppProfile, BridgeDomain, Contract, Encap, EncapType, Endpoint, Epg, FabricNode, Interface,
    Kind, L2Interface, Scope, Tenant, Tree, next_class_event, push_to_apic, subscribe_class,
};

async fn setup() -> (MockServer, Session) {
    let server = MockServer::start().await;
    let config = SessionConfig::new(
        Url::parse(&server.uri()).unwrap(),
        "admin",
        SecretString::from("secret"),
    );
    let session = Session::new(config).unwrap();
    (server, session)
}

async fn mount_login(server: &MockServer) {
    let reply = json!({
        "totalCount": "1",
        "imdata": [{"aaaLogin": {"attributes": {
            "token": "tok-1",
            "refreshTimeoutSeconds": "600",
        }}}]
    });
    Mock::given(method("POST"))
        .and(path("/api/aaaLogin.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .mount(server)
        .await;
}

fn envelope(records: Vec<serde_json::Value>) -> serde_json::Value {
    json!({"totalCount": records.len().to_string(), "imdata": records})
}

#[tokio::test]
async fn tenant_class_read_materializes_roots() {
    let (server, session) = setup().await;
    let records = vec![
        json!({"fvTenant": {"attributes": {"name": "cisco", "dn": "uni/tn-cisco"}}}),
        json!({"fvTenant": {"attributes": {"name": "lab", "dn": "uni/tn-lab"}}}),
    ];
    Mock::given(method("GET"))
        .and(path("/api/node/class/fvTenant.json"))
        .and(query_param("query-target", "self"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let tenants = Tenant::get(&session, &mut tree).await.unwrap();
    assert_eq!(tenants.len(), 2);
    assert_eq!(tenants[0].name(&tree), "cisco");
    assert_eq!(tenants[1].name(&tree), "lab");

    // A second read unifies with the existing roots.
    let again = Tenant::get(&session, &mut tree).await.unwrap();
    assert_eq!(again, tenants);
    assert!(Tenant::exists(&session, "lab").await.unwrap());
    assert!(!Tenant::exists(&session, "absent").await.unwrap());
    session.close();
}

#[tokio::test]
async fn deep_read_restores_relations() {
    let (server, session) = setup().await;
    let record = json!({"fvTenant": {
        "attributes": {"name": "cisco", "dn": "uni/tn-cisco"},
        "children": [
            {"fvBD": {
                "attributes": {"name": "bd1"},
                "children": [{"fvRsCtx": {"attributes": {"tnFvCtxName": "main"}}}]}},
            {"fvCtx": {"attributes": {"name": "main", "pcEnfPref": "enforced"}}},
            {"fvAp": {
                "attributes": {"name": "app"},
                "children": [{"fvAEPg": {
                    "attributes": {"name": "web"},
                    "children": [{"fvRsBd": {"attributes": {"tnFvBDName": "bd1"}}}]}}]}},
        ]}});
    Mock::given(method("GET"))
        .and(path("/api/mo/uni/tn-cisco.json"))
        .and(query_param("rsp-subtree", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![record])))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let tenants = Tenant::get_deep(&session, &mut tree, &["cisco"]).await.unwrap();
    let tenant = tenants[0];

    let bd_id = tree
        .find_child(tenant.id(), Kind::BridgeDomain, "bd1")
        .unwrap();
    let bd = BridgeDomain::from_node(&tree, bd_id).unwrap();
    let app = tree.find_child(tenant.id(), Kind::AppProfile, "app").unwrap();
    let epg = Epg::from_node(&tree, tree.find_child(app, Kind::Epg, "web").unwrap()).unwrap();
    assert_eq!(epg.get_bd(&tree), Some(bd));
    assert!(bd.has_context(&tree));
    session.close();
}

#[tokio::test]
async fn epg_vlan_attachment_pushes_expected_document() {
    let (server, session) = setup().await;
    Mock::given(method("POST"))
        .and(path("/api/mo/uni.json"))
        .and(body_partial_json(json!({"fvTenant": {
            "attributes": {"name": "cisco"}}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"totalCount": "0", "imdata": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let tenant = Tenant::create(&mut tree, "cisco").unwrap();
    let app = AppProfile::create(&mut tree, tenant, "app").unwrap();
    let epg = Epg::create(&mut tree, app, "web").unwrap();
    let port = Interface::create(&mut tree, "eth", "1", "101", "1", "1").unwrap();
    let vlan = L2Interface::create(&mut tree, "v5", Encap::new(EncapType::Vlan, "5")).unwrap();
    vlan.attach(&mut tree, port.id()).unwrap();
    epg.attach(&mut tree, vlan);

    let doc = acikit_model::to_json(&tree, epg.id()).unwrap();
    let attrs = &doc["fvAEPg"]["children"][0]["fvRsPathAtt"]["attributes"];
    assert_eq!(attrs["encap"], "vlan-5");
    assert_eq!(attrs["tDn"], "topology/pod-1/paths-101/pathep-[eth1/1]");

    push_to_apic(&session, &tree, tenant).await.unwrap();
    session.close();
}

#[tokio::test]
async fn class_subscription_delivers_typed_events() {
    let (server, session) = setup().await;
    mount_login(&server).await;
    session.login().await.unwrap();

    let reply = json!({
        "totalCount": "1",
        "subscriptionId": "72057598349672459",
        "imdata": [{"fvTenant": {"attributes": {
            "name": "cisco",
            "dn": "uni/tn-cisco",
        }}}]
    });
    Mock::given(method("GET"))
        .and(path("/api/class/fvTenant.json"))
        .and(query_param("subscription", "yes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/class/fvTenant.json"))
        .and(query_param("subscription", "no"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"totalCount": "0", "imdata": []})),
        )
        .mount(&server)
        .await;

    subscribe_class(&session, "fvTenant").await.unwrap();
    assert!(acikit_model::class_has_events(&session, "fvTenant")
        .await
        .unwrap());

    let event = next_class_event(&session, "fvTenant").await.unwrap();
    assert_eq!(event.class, "fvTenant");
    assert_eq!(event.name, "cisco");
    assert_eq!(event.dn, "uni/tn-cisco");
    assert!(!event.is_deleted);

    acikit_model::unsubscribe_class(&session, "fvTenant")
        .await
        .unwrap();
    session.close();
}

#[tokio::test]
async fn endpoint_read_builds_owning_chain() {
    let (server, session) = setup().await;
    let records = vec![json!({"fvCEp": {"attributes": {
        "name": "00:11:22:33:44:55",
        "mac": "00:11:22:33:44:55",
        "ip": "10.0.0.5",
        "encap": "vlan-5",
        "dn": "uni/tn-cisco/ap-app/epg-web/cep-00:11:22:33:44:55",
    }}})];
    Mock::given(method("GET"))
        .and(path("/api/node/class/fvCEp.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let endpoints = Endpoint::get(&session, &mut tree).await.unwrap();
    assert_eq!(endpoints.len(), 1);

    let ep = endpoints[0];
    assert_eq!(ep.data(&tree).ip.as_deref(), Some("10.0.0.5"));
    let epg = ep.epg(&tree).unwrap();
    assert_eq!(epg.name(&tree), "web");
    let app = epg.app_profile(&tree).unwrap();
    assert_eq!(app.name(&tree), "app");
    assert_eq!(app.tenant(&tree).unwrap().name(&tree), "cisco");
    session.close();
}

#[tokio::test]
async fn interface_read_parses_physical_dns() {
    let (server, session) = setup().await;
    let records = vec![json!({"l1PhysIf": {"attributes": {
        "id": "eth1/8",
        "dn": "topology/pod-1/node-101/sys/phys-[eth1/8]",
        "speed": "40G",
        "mtu": "9000",
        "portT": "leaf",
    }}})];
    Mock::given(method("GET"))
        .and(path("/api/node/class/l1PhysIf.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let interfaces = Interface::get(&session, &mut tree).await.unwrap();
    assert_eq!(interfaces.len(), 1);

    let intf = interfaces[0];
    assert_eq!(intf.name(&tree), "eth 1/101/1/8");
    assert_eq!(intf.data(&tree).speed, "40G");
    assert_eq!(intf.data(&tree).mtu, "9000");
    session.close();
}

#[tokio::test]
async fn fabric_node_read_nests_under_pod() {
    let (server, session) = setup().await;
    let records = vec![json!({"fabricNode": {"attributes": {
        "id": "101",
        "name": "leaf101",
        "role": "leaf",
        "dn": "topology/pod-1/node-101",
    }}})];
    Mock::given(method("GET"))
        .and(path("/api/node/class/fabricNode.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(records)))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let nodes = FabricNode::get(&session, &mut tree).await.unwrap();
    assert_eq!(nodes.len(), 1);

    let node = nodes[0];
    assert_eq!(node.name(&tree), "leaf101");
    assert_eq!(node.data(&tree).role.as_deref(), Some("leaf"));
    let pod = tree.parent(node.id()).unwrap();
    assert_eq!(tree.name(pod), "1");
    session.close();
}

#[tokio::test]
async fn contract_scope_round_trips_through_class_read() {
    let (server, session) = setup().await;
    Mock::given(method("GET"))
        .and(path("/api/mo/uni/tn-cisco.json"))
        .and(query_param("target-subtree-class", "vzBrCP"))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope(vec![json!({
            "vzBrCP": {"attributes": {"name": "http", "scope": "global"}}})])))
        .mount(&server)
        .await;

    let mut tree = Tree::new();
    let tenant = Tenant::create(&mut tree, "cisco").unwrap();
    let contracts = Contract::get(&session, &mut tree, tenant).await.unwrap();
    assert_eq!(contracts.len(), 1);
    assert_eq!(contracts[0].get_scope(&tree), Scope::Global);
    session.close();
}
