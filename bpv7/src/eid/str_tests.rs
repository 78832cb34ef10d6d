use super::*;

fn roundtrip(s: &str) -> EndpointId {
    let eid: EndpointId = s.parse().unwrap();
    assert_eq!(eid.to_string(), s);
    eid
}

#[test]
fn parse_and_display() {
    assert!(matches!(roundtrip("dtn:none"), EndpointId::Null));
    roundtrip("dtn://node/");
    roundtrip("dtn://node/service");
    roundtrip("dtn://node/some/nested/demux");
    roundtrip("dtn://node/~group");
}

#[test]
fn invalid_uris() {
    assert!("ipn:1.0".parse::<EndpointId>().is_err());
    assert!("dtn:node".parse::<EndpointId>().is_err());
    assert!("dtn://node".parse::<EndpointId>().is_err());
    assert!("dtn:///service".parse::<EndpointId>().is_err());
    assert!("node/service".parse::<EndpointId>().is_err());
}

#[test]
fn singletons() {
    assert!("dtn://a/x".parse::<EndpointId>().unwrap().is_singleton());
    assert!(!"dtn://a/~x".parse::<EndpointId>().unwrap().is_singleton());
    assert!(!EndpointId::Null.is_singleton());
}

#[test]
fn node_ids() {
    let eid: EndpointId = "dtn://a/b/c".parse().unwrap();
    assert_eq!(eid.node_id().to_string(), "dtn://a/");
    assert!(eid.same_node(&"dtn://a/other".parse().unwrap()));
    assert!(!eid.same_node(&"dtn://b/other".parse().unwrap()));
    assert!(!eid.same_node(&EndpointId::Null));
}
