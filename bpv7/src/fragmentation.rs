/*!
Bundle fragmentation and reassembly (RFC 9171 §5.8).

A bundle is split so that each serialized fragment fits within an MTU.
The first fragment carries every extension block; later fragments carry
only those flagged for replication. Reassembly verifies that the sorted
fragments cover the total data length without gaps and merges their
payloads, trusting earlier fragments where extents overlap.
*/

use crate::{
    block::{BlockData, CanonicalBlock},
    bundle::Bundle,
    bundle_id::FragmentInfo,
    cbor, Error,
};

/// CBOR framing overhead of a bundle: the indefinite-length array header
/// and the break code.
const BUNDLE_OVERHEAD: usize = 2;

impl Bundle {
    /// Split this bundle into fragments whose serialized size does not
    /// exceed `mtu` bytes.
    ///
    /// A bundle that already fits is returned unchanged as a single
    /// element. Fails if the bundle forbids fragmentation, or if the
    /// per-fragment overhead alone exceeds the MTU.
    pub fn fragment(&self, mtu: usize) -> Result<Vec<Bundle>, Error> {
        if self.primary.flags.must_not_fragment {
            return Err(Error::MustNotFragment);
        }

        let Some(payload_block) = self.blocks.iter().find(|b| b.is_payload()) else {
            return Err(Error::MissingPayload);
        };
        let BlockData::Payload(payload) = &payload_block.data else {
            unreachable!()
        };
        if payload.is_empty() {
            return Ok(vec![self.clone()]);
        }

        let extensions: Vec<&CanonicalBlock> =
            self.blocks.iter().filter(|b| !b.is_payload()).collect();

        let mut ext_first = 0;
        let mut ext_others = 0;
        for block in &extensions {
            let len = block.to_cbor().len();
            ext_first += len;
            if block.flags.must_replicate {
                ext_others += len;
            }
        }

        // The payload block overhead is its encoding with no content,
        // corrected for the worst-case byte-string header of a payload
        // slice up to mtu bytes long.
        let empty_payload = CanonicalBlock {
            number: payload_block.number,
            flags: payload_block.flags.clone(),
            crc_type: payload_block.crc_type,
            data: BlockData::Payload(Vec::new()),
        }
        .to_cbor()
        .len();
        let payload_overhead =
            empty_payload - 1 + cbor::encode::byte_string_header(mtu as u64).len();

        let mut fragments = Vec::new();
        let mut offset = 0;
        while offset < payload.len() {
            let mut primary = self.primary.clone();
            primary.flags.is_fragment = true;
            primary.fragment = Some(FragmentInfo {
                offset: offset as u64,
                total_len: payload.len() as u64,
            });

            let overhead = BUNDLE_OVERHEAD
                + primary.to_cbor().len()
                + if offset == 0 { ext_first } else { ext_others }
                + payload_overhead;
            if overhead >= mtu {
                return Err(Error::FragmentOverhead(overhead, mtu));
            }

            let chunk = (mtu - overhead).min(payload.len() - offset);

            let mut blocks: Vec<CanonicalBlock> = extensions
                .iter()
                .filter(|b| offset == 0 || b.flags.must_replicate)
                .map(|b| (*b).clone())
                .collect();
            blocks.push(CanonicalBlock {
                number: payload_block.number,
                flags: payload_block.flags.clone(),
                crc_type: payload_block.crc_type,
                data: BlockData::Payload(payload[offset..offset + chunk].to_vec()),
            });

            let mut fragment = Bundle { primary, blocks };
            fragment.sort_blocks();
            fragments.push(fragment);

            offset += chunk;
        }

        if fragments.len() == 1 {
            return Ok(vec![self.clone()]);
        }
        Ok(fragments)
    }
}

/// Sort fragments by offset and verify they form a complete set:
/// everything is a fragment, offsets are contiguous from zero, and the
/// covered extent matches the total data length. Returns the total.
fn prepare_reassembly(fragments: &mut [Bundle]) -> Result<u64, Error> {
    if fragments.is_empty() {
        return Err(Error::NoFragments);
    }

    for fragment in fragments.iter() {
        if !fragment.primary.flags.is_fragment || fragment.primary.fragment.is_none() {
            return Err(Error::NotAFragment);
        }
    }

    fragments.sort_by_key(|b| b.primary.fragment.map(|f| f.offset).unwrap_or(0));

    let total_len = fragments[0]
        .primary
        .fragment
        .map(|f| f.total_len)
        .unwrap_or(0);

    let mut end = 0u64;
    for fragment in fragments.iter() {
        let Some(info) = fragment.primary.fragment else {
            return Err(Error::NotAFragment);
        };
        if info.offset > end {
            return Err(Error::FragmentGap {
                end,
                next: info.offset,
            });
        }
        let len = fragment.payload().map(|p| p.len() as u64).unwrap_or(0);
        end = end.max(info.offset + len);
    }

    if end != total_len {
        return Err(Error::TotalLengthMismatch(end, total_len));
    }
    Ok(total_len)
}

/// Whether a bundle can be reassembled from the given fragments. Sorts
/// the slice as a side effect.
pub fn is_reassemblable(fragments: &mut [Bundle]) -> bool {
    prepare_reassembly(fragments).is_ok()
}

/// Merge a complete set of fragments back into the original bundle.
pub fn reassemble(mut fragments: Vec<Bundle>) -> Result<Bundle, Error> {
    let total_len = prepare_reassembly(&mut fragments)?;

    let mut payload = Vec::with_capacity(total_len as usize);
    let mut end = 0usize;
    for fragment in &fragments {
        let start = fragment
            .primary
            .fragment
            .map(|f| f.offset as usize)
            .unwrap_or(0);
        let data = fragment.payload().ok_or(Error::MissingPayload)?;
        if start + data.len() <= end {
            // Fully contained in what earlier fragments already supplied
            continue;
        }
        payload.extend_from_slice(&data[end - start..]);
        end = start + data.len();
    }

    let first = &fragments[0];
    let mut primary = first.primary.clone();
    primary.flags.is_fragment = false;
    primary.fragment = None;

    let Some(payload_block) = first.blocks.iter().find(|b| b.is_payload()) else {
        return Err(Error::MissingPayload);
    };

    let mut blocks: Vec<CanonicalBlock> = first
        .blocks
        .iter()
        .filter(|b| !b.is_payload())
        .cloned()
        .collect();
    blocks.push(CanonicalBlock {
        number: payload_block.number,
        flags: payload_block.flags.clone(),
        crc_type: payload_block.crc_type,
        data: BlockData::Payload(payload),
    });

    let mut bundle = Bundle { primary, blocks };
    bundle.sort_blocks();
    bundle.check_valid()?;
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        block::HopInfo, block_flags::BlockFlags, builder::Builder, crc::CrcType,
        creation_timestamp::CreationTimestamp,
    };
    use rand::RngCore;

    fn test_bundle(payload: Vec<u8>) -> Bundle {
        Builder::new(
            "dtn://a/x".parse().unwrap(),
            "dtn://b/y".parse().unwrap(),
        )
        .lifetime(600_000)
        .payload(payload)
        .add_extension(
            BlockFlags {
                must_replicate: true,
                ..Default::default()
            },
            BlockData::HopCount(HopInfo { limit: 16, count: 2 }),
        )
        .add_extension(
            BlockFlags::default(),
            BlockData::Unrecognised {
                type_code: 192,
                data: crate::cbor::encode::emit(&7u64),
            },
        )
        .build(CreationTimestamp::now())
    }

    #[test]
    fn fragmentation_is_lossless() {
        let mut payload = vec![0u8; 1024];
        rand::thread_rng().fill_bytes(&mut payload);
        let bundle = test_bundle(payload.clone());

        let fragments = bundle.fragment(300).unwrap();
        assert!(fragments.len() >= 4);

        for (i, fragment) in fragments.iter().enumerate() {
            assert!(fragment.to_cbor().len() <= 300);
            assert!(fragment.is_fragment());
            // Only the first fragment carries the non-replicated block
            assert_eq!(
                fragment.has_extension_block(crate::block_type::BlockType::Unrecognised(192)),
                i == 0
            );
            assert!(fragment.has_extension_block(crate::block_type::BlockType::HopCount));
        }

        let reassembled = reassemble(fragments).unwrap();
        assert_eq!(reassembled, bundle);
        assert_eq!(reassembled.payload().unwrap(), payload);
    }

    #[test]
    fn fragments_survive_the_wire() {
        let mut payload = vec![0u8; 600];
        rand::thread_rng().fill_bytes(&mut payload);
        let bundle = test_bundle(payload.clone());

        let fragments = bundle
            .fragment(300)
            .unwrap()
            .into_iter()
            .map(|f| Bundle::parse(&f.to_cbor()).unwrap())
            .collect::<Vec<_>>();

        let reassembled = reassemble(fragments).unwrap();
        assert_eq!(reassembled.payload().unwrap(), payload);
    }

    #[test]
    fn reassembly_in_any_order() {
        let bundle = test_bundle((0..=255u8).cycle().take(900).collect());
        let mut fragments = bundle.fragment(300).unwrap();
        fragments.reverse();
        let reassembled = reassemble(fragments).unwrap();
        assert_eq!(reassembled, bundle);
    }

    #[test]
    fn missing_fragment_is_detected() {
        let bundle = test_bundle(vec![0x5a; 900]);
        let mut fragments = bundle.fragment(300).unwrap();
        fragments.remove(1);
        assert!(!is_reassemblable(&mut fragments));
        assert!(matches!(
            reassemble(fragments),
            Err(Error::FragmentGap { .. })
        ));
    }

    #[test]
    fn tiny_mtu_fails() {
        let bundle = test_bundle(vec![1; 64]);
        assert!(matches!(
            bundle.fragment(40),
            Err(Error::FragmentOverhead(_, 40))
        ));
    }

    #[test]
    fn must_not_fragment_is_honoured() {
        let mut bundle = test_bundle(vec![1; 1024]);
        bundle.primary.flags.must_not_fragment = true;
        assert!(matches!(bundle.fragment(300), Err(Error::MustNotFragment)));
    }

    #[test]
    fn small_bundle_is_a_no_op() {
        let bundle = test_bundle(vec![1; 16]);
        let fragments = bundle.fragment(64 * 1024).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0], bundle);
        assert!(!fragments[0].is_fragment());
    }

    #[test]
    fn crc_types_are_preserved() {
        let bundle = Builder::new(
            "dtn://a/x".parse().unwrap(),
            "dtn://b/y".parse().unwrap(),
        )
        .crc_type(CrcType::Crc16)
        .lifetime(600_000)
        .payload(vec![9; 700])
        .build(CreationTimestamp::now());

        let fragments = bundle.fragment(300).unwrap();
        for fragment in &fragments {
            assert_eq!(fragment.primary.crc_type, CrcType::Crc16);
            Bundle::parse(&fragment.to_cbor()).unwrap();
        }
        assert_eq!(reassemble(fragments).unwrap(), bundle);
    }
}
