use super::encode::*;
use hex_literal::hex;

#[test]
fn rfc_tests() {
    // RFC 8949, Appendix A, restricted to the supported subset:
    // https://www.rfc-editor.org/rfc/rfc8949.html#section-appendix.a

    assert_eq!(*emit(&0u64), hex!("00"));
    assert_eq!(*emit(&1u64), hex!("01"));
    assert_eq!(*emit(&10u64), hex!("0a"));
    assert_eq!(*emit(&23u64), hex!("17"));
    assert_eq!(*emit(&24u64), hex!("1818"));
    assert_eq!(*emit(&25u64), hex!("1819"));
    assert_eq!(*emit(&100u64), hex!("1864"));
    assert_eq!(*emit(&1000u64), hex!("1903e8"));
    assert_eq!(*emit(&1000000u64), hex!("1a000f4240"));
    assert_eq!(*emit(&1000000000000u64), hex!("1b000000e8d4a51000"));
    assert_eq!(*emit(&18446744073709551615u64), hex!("1bffffffffffffffff"));

    assert_eq!(*emit(&-1i64), hex!("20"));
    assert_eq!(*emit(&-10i64), hex!("29"));
    assert_eq!(*emit(&-100i64), hex!("3863"));
    assert_eq!(*emit(&-1000i64), hex!("3903e7"));

    assert_eq!(*emit(&false), hex!("f4"));
    assert_eq!(*emit(&true), hex!("f5"));
    assert_eq!(*emit(&None::<u64>), hex!("f6"));

    assert_eq!(*emit::<[u8]>(&[]), hex!("40"));
    assert_eq!(*emit::<[u8]>(&hex!("01020304")), hex!("4401020304"));

    assert_eq!(*emit(""), hex!("60"));
    assert_eq!(*emit("a"), hex!("6161"));
    assert_eq!(*emit("IETF"), hex!("6449455446"));
    assert_eq!(*emit("\"\\"), hex!("62225c"));
    assert_eq!(*emit("\u{00fc}"), hex!("62c3bc"));

    assert_eq!(*emit_array(Some(0), |_| {}), hex!("80"));
    assert_eq!(
        *emit_array(Some(3), |a| {
            a.emit(&1u64);
            a.emit(&2u64);
            a.emit(&3u64);
        }),
        hex!("83010203")
    );
    assert_eq!(
        *emit_array(Some(3), |a| {
            a.emit(&1u64);
            a.emit_array(Some(2), |a| {
                a.emit(&2u64);
                a.emit(&3u64);
            });
            a.emit_array(Some(2), |a| {
                a.emit(&4u64);
                a.emit(&5u64);
            });
        }),
        hex!("8301820203820405")
    );
    assert_eq!(
        *emit_array(Some(25), |a| {
            for i in 1u64..=25 {
                a.emit(&i);
            }
        }),
        hex!("98190102030405060708090a0b0c0d0e0f101112131415161718181819")
    );
    assert_eq!(*emit_array(None, |_| {}), hex!("9fff"));
    assert_eq!(
        *emit_array(None, |a| {
            a.emit(&1u64);
            a.emit_array(Some(2), |a| {
                a.emit(&2u64);
                a.emit(&3u64);
            });
            a.emit_array(None, |a| {
                a.emit(&4u64);
                a.emit(&5u64);
            });
        }),
        hex!("9f018202039f0405ffff")
    );
}

#[test]
fn byte_string_headers() {
    assert_eq!(*byte_string_header(0), hex!("40"));
    assert_eq!(*byte_string_header(23), hex!("57"));
    assert_eq!(*byte_string_header(24), hex!("5818"));
    assert_eq!(*byte_string_header(256), hex!("590100"));
    assert_eq!(*byte_string_header(65536), hex!("5a00010000"));
}

#[test]
fn raw_splicing() {
    let inner = emit_array(Some(1), |a| a.emit(&7u64));
    let outer = emit_array(Some(2), |a| {
        a.emit(&1u64);
        a.emit_raw(&inner);
    });
    assert_eq!(*outer, hex!("82018107"));
}

#[test]
#[should_panic]
fn definite_array_too_few_items() {
    emit_array(Some(2), |a| {
        a.emit(&1u64);
    });
}

#[test]
#[should_panic]
fn definite_array_too_many_items() {
    emit_array(Some(1), |a| {
        a.emit(&1u64);
        a.emit(&2u64);
    });
}
