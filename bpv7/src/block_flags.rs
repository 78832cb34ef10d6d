use crate::cbor;

/// Block processing control flags (RFC 9171 §4.2.4).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BlockFlags {
    /// Replicate this block in every fragment.
    pub must_replicate: bool,
    /// Transmit a status report if the block cannot be processed.
    pub report_on_failure: bool,
    /// Delete the whole bundle if the block cannot be processed.
    pub delete_bundle_on_failure: bool,
    /// Discard just this block if it cannot be processed.
    pub delete_block_on_failure: bool,

    pub unrecognised: u64,
}

impl From<u64> for BlockFlags {
    fn from(value: u64) -> Self {
        let mut flags = Self::default();
        for b in 0..64 {
            if value & (1 << b) != 0 {
                match b {
                    0 => flags.must_replicate = true,
                    1 => flags.report_on_failure = true,
                    2 => flags.delete_bundle_on_failure = true,
                    4 => flags.delete_block_on_failure = true,
                    b => flags.unrecognised |= 1 << b,
                }
            }
        }
        flags
    }
}

impl From<&BlockFlags> for u64 {
    fn from(value: &BlockFlags) -> Self {
        let mut flags = value.unrecognised;
        if value.must_replicate {
            flags |= 1 << 0;
        }
        if value.report_on_failure {
            flags |= 1 << 1;
        }
        if value.delete_bundle_on_failure {
            flags |= 1 << 2;
        }
        if value.delete_block_on_failure {
            flags |= 1 << 4;
        }
        flags
    }
}

impl cbor::encode::ToCbor for BlockFlags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(self))
    }
}

impl cbor::decode::FromCbor for BlockFlags {
    type Error = cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        u64::from_cbor(data).map(|(value, len)| (value.into(), len))
    }
}
