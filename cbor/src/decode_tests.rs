use super::decode::*;
use hex_literal::hex;

#[test]
fn rfc_tests() {
    // RFC 8949, Appendix A, restricted to the supported subset

    assert_eq!(parse::<u64>(&hex!("00")).unwrap(), 0);
    assert_eq!(parse::<u64>(&hex!("01")).unwrap(), 1);
    assert_eq!(parse::<u64>(&hex!("0a")).unwrap(), 10);
    assert_eq!(parse::<u64>(&hex!("17")).unwrap(), 23);
    assert_eq!(parse::<u64>(&hex!("1818")).unwrap(), 24);
    assert_eq!(parse::<u64>(&hex!("1819")).unwrap(), 25);
    assert_eq!(parse::<u64>(&hex!("1864")).unwrap(), 100);
    assert_eq!(parse::<u64>(&hex!("1903e8")).unwrap(), 1000);
    assert_eq!(parse::<u64>(&hex!("1a000f4240")).unwrap(), 1000000);
    assert_eq!(
        parse::<u64>(&hex!("1b000000e8d4a51000")).unwrap(),
        1000000000000
    );
    assert_eq!(
        parse::<u64>(&hex!("1bffffffffffffffff")).unwrap(),
        18446744073709551615
    );

    assert!(!parse::<bool>(&hex!("f4")).unwrap());
    assert!(parse::<bool>(&hex!("f5")).unwrap());

    assert_eq!(parse::<Vec<u8>>(&hex!("40")).unwrap(), Vec::<u8>::new());
    assert_eq!(
        parse::<Vec<u8>>(&hex!("4401020304")).unwrap(),
        hex!("01020304")
    );

    assert_eq!(parse::<String>(&hex!("60")).unwrap(), "");
    assert_eq!(parse::<String>(&hex!("6161")).unwrap(), "a");
    assert_eq!(parse::<String>(&hex!("6449455446")).unwrap(), "IETF");
    assert_eq!(parse::<String>(&hex!("62c3bc")).unwrap(), "\u{00fc}");
}

#[test]
fn arrays() {
    let ((), len) = parse_array(&hex!("80"), |a| {
        assert_eq!(a.count(), Some(0));
        assert!(a.end().unwrap().is_some());
        Ok::<_, Error>(())
    })
    .unwrap();
    assert_eq!(len, 1);

    let (items, len) = parse_array(&hex!("83010203"), |a| {
        let mut items = Vec::new();
        while let Some(n) = a.try_parse::<u64>()? {
            items.push(n);
        }
        Ok::<_, Error>(items)
    })
    .unwrap();
    assert_eq!(items, [1, 2, 3]);
    assert_eq!(len, 4);

    // Nested definite arrays
    let (sum, _) = parse_array(&hex!("8301820203820405"), |a| {
        let mut sum = a.parse::<u64>()?;
        for _ in 0..2 {
            sum += a.parse_array(|inner| {
                Ok::<_, Error>(inner.parse::<u64>()? + inner.parse::<u64>()?)
            })?;
        }
        assert!(a.end()?.is_some());
        Ok::<_, Error>(sum)
    })
    .unwrap();
    assert_eq!(sum, 15);

    // Indefinite array with nested indefinite array
    let (items, len) = parse_array(&hex!("9f018202039f0405ffff"), |a| {
        let first = a.parse::<u64>()?;
        let second = a.parse_array(|inner| {
            Ok::<_, Error>((inner.parse::<u64>()?, inner.parse::<u64>()?))
        })?;
        let third = a.parse_array(|inner| {
            Ok::<_, Error>((inner.parse::<u64>()?, inner.parse::<u64>()?))
        })?;
        assert!(a.end()?.is_some());
        Ok::<_, Error>((first, second, third))
    })
    .unwrap();
    assert_eq!(items, (1, (2, 3), (4, 5)));
    assert_eq!(len, 10);
}

#[test]
fn unconsumed_items_are_drained() {
    // The outer parse still reports the correct total length when the
    // closure leaves items unread.
    let ((), len) = parse_array(&hex!("83010203"), |_| Ok::<_, Error>(())).unwrap();
    assert_eq!(len, 4);

    let ((), len) = parse_array(&hex!("9f018202039f0405ffff"), |a| {
        a.parse::<u64>()?;
        Ok::<_, Error>(())
    })
    .unwrap();
    assert_eq!(len, 10);
}

#[test]
fn item_offsets_track_extents() {
    // [1, h'0203', 4]
    let data = hex!("830142020304");
    parse_array(&data, |a| {
        assert_eq!(a.offset(), 1);
        a.parse::<u64>()?;
        assert_eq!(a.offset(), 2);
        a.parse::<Vec<u8>>()?;
        assert_eq!(a.offset(), 5);
        a.parse::<u64>()?;
        assert_eq!(a.end()?, Some(6));
        Ok::<_, Error>(())
    })
    .unwrap();
}

#[test]
fn rejections() {
    // Truncated integer
    assert!(matches!(
        parse::<u64>(&hex!("19")),
        Err(Error::NotEnoughData)
    ));

    // Truncated byte string
    assert!(matches!(
        parse::<Vec<u8>>(&hex!("4401")),
        Err(Error::NotEnoughData)
    ));

    // Indefinite array missing its break
    assert!(parse_array(&hex!("9f0102"), |a| {
        while a.try_parse::<u64>()?.is_some() {}
        Ok::<_, Error>(())
    })
    .is_err());

    // Chunked strings
    assert!(matches!(
        parse::<Vec<u8>>(&hex!("5f42010243030405ff")),
        Err(Error::InvalidChunk)
    ));

    // Maps and tags are outside the supported subset
    assert!(matches!(
        parse::<u64>(&hex!("a201020304")),
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        parse::<u64>(&hex!("c11a514b67b0")),
        Err(Error::Unsupported(_))
    ));

    // Wrong type
    assert!(matches!(
        parse::<u64>(&hex!("6161")),
        Err(Error::IncorrectType(_, _))
    ));

    // Integer narrowing
    assert!(parse::<u8>(&hex!("1903e8")).is_err());
}
