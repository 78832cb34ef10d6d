use crate::{
    block::{BlockData, CanonicalBlock},
    block_flags::BlockFlags,
    bundle::Bundle,
    bundle_flags::BundleFlags,
    crc::CrcType,
    creation_timestamp::CreationTimestamp,
    eid::EndpointId,
    primary_block::PrimaryBlock,
};

/// Default bundle lifetime: 24 hours.
const DEFAULT_LIFETIME_MS: u64 = 24 * 60 * 60 * 1_000;

/// A fluent builder for locally-originated bundles.
///
/// ```
/// use brant_bpv7::builder::Builder;
/// use brant_bpv7::creation_timestamp::CreationTimestamp;
///
/// let bundle = Builder::new(
///     "dtn://a/ping".parse().unwrap(),
///     "dtn://b/pong".parse().unwrap(),
/// )
/// .lifetime(600_000)
/// .payload(b"hello".to_vec())
/// .build(CreationTimestamp::now());
///
/// assert_eq!(bundle.payload().unwrap(), b"hello");
/// ```
pub struct Builder {
    flags: BundleFlags,
    crc_type: CrcType,
    source: EndpointId,
    destination: EndpointId,
    report_to: Option<EndpointId>,
    lifetime: u64,
    payload: Vec<u8>,
    payload_flags: BlockFlags,
    extensions: Vec<(BlockFlags, BlockData)>,
}

impl Builder {
    pub fn new(source: EndpointId, destination: EndpointId) -> Self {
        Self {
            flags: BundleFlags::default(),
            crc_type: CrcType::default(),
            source,
            destination,
            report_to: None,
            lifetime: DEFAULT_LIFETIME_MS,
            payload: Vec::new(),
            payload_flags: BlockFlags::default(),
            extensions: Vec::new(),
        }
    }

    pub fn flags(mut self, flags: BundleFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn crc_type(mut self, crc_type: CrcType) -> Self {
        self.crc_type = crc_type;
        self
    }

    pub fn report_to(mut self, report_to: EndpointId) -> Self {
        self.report_to = Some(report_to);
        self
    }

    /// Bundle lifetime in milliseconds.
    pub fn lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn payload_flags(mut self, flags: BlockFlags) -> Self {
        self.payload_flags = flags;
        self
    }

    pub fn add_extension(mut self, flags: BlockFlags, data: BlockData) -> Self {
        self.extensions.push((flags, data));
        self
    }

    /// Assemble the bundle. The sequence number of the timestamp is
    /// typically assigned afterwards by the node's sequence-id keeper.
    pub fn build(self, timestamp: CreationTimestamp) -> Bundle {
        let mut bundle = Bundle {
            primary: PrimaryBlock {
                flags: self.flags,
                crc_type: self.crc_type,
                destination: self.destination,
                report_to: self.report_to.unwrap_or_else(|| self.source.clone()),
                source: self.source,
                timestamp,
                lifetime: self.lifetime,
                fragment: None,
            },
            blocks: vec![CanonicalBlock {
                number: 1,
                flags: self.payload_flags,
                crc_type: self.crc_type,
                data: BlockData::Payload(self.payload),
            }],
        };

        for (flags, data) in self.extensions {
            bundle.add_extension_block(flags, self.crc_type, data);
        }
        bundle
    }
}
