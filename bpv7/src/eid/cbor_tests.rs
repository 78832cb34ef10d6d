use super::*;
use hex_literal::hex;

fn roundtrip(eid: EndpointId) -> Vec<u8> {
    let encoded = cbor::encode::emit(&eid);
    let decoded: EndpointId = cbor::decode::parse(&encoded).unwrap();
    assert_eq!(eid, decoded);
    encoded
}

#[test]
fn null_endpoint() {
    // [1, 0]
    assert_eq!(*roundtrip(EndpointId::Null), hex!("820100"));
}

#[test]
fn dtn_endpoint() {
    // [1, "//a/x"]
    assert_eq!(
        *roundtrip("dtn://a/x".parse().unwrap()),
        hex!("820165 2f2f612f78")
    );
}

#[test]
fn empty_demux() {
    assert_eq!(
        *roundtrip("dtn://node/".parse().unwrap()),
        hex!("820167 2f2f6e6f64652f")
    );
}

#[test]
fn rejects_unknown_scheme() {
    // [2, [1, 0]] is an ipn EID
    assert!(matches!(
        cbor::decode::parse::<EndpointId>(&hex!("8202820100")),
        Err(EidError::UnsupportedScheme(2))
    ));
}

#[test]
fn rejects_bad_ssp() {
    // [1, 7]
    assert!(cbor::decode::parse::<EndpointId>(&hex!("820107")).is_err());
    // [1, "none"] - the null endpoint must use the numeric form
    assert!(cbor::decode::parse::<EndpointId>(&hex!("8201646e6f6e65")).is_err());
    // [1]
    assert!(cbor::decode::parse::<EndpointId>(&hex!("8101")).is_err());
}
