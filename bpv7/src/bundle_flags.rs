use crate::cbor;

/// Bundle processing control flags (RFC 9171 §4.2.3).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct BundleFlags {
    pub is_fragment: bool,
    pub is_admin_record: bool,
    pub must_not_fragment: bool,
    pub app_ack_requested: bool,
    pub report_status_time: bool,
    pub receipt_report_requested: bool,
    pub forward_report_requested: bool,
    pub delivery_report_requested: bool,
    pub delete_report_requested: bool,

    /// Any set bits this implementation does not recognise, preserved so
    /// the flags re-emit unchanged.
    pub unrecognised: u64,
}

impl From<u64> for BundleFlags {
    fn from(value: u64) -> Self {
        let mut flags = Self::default();
        for b in 0..64 {
            if value & (1 << b) != 0 {
                match b {
                    0 => flags.is_fragment = true,
                    1 => flags.is_admin_record = true,
                    2 => flags.must_not_fragment = true,
                    5 => flags.app_ack_requested = true,
                    6 => flags.report_status_time = true,
                    14 => flags.receipt_report_requested = true,
                    16 => flags.forward_report_requested = true,
                    17 => flags.delivery_report_requested = true,
                    18 => flags.delete_report_requested = true,
                    b => flags.unrecognised |= 1 << b,
                }
            }
        }
        flags
    }
}

impl From<&BundleFlags> for u64 {
    fn from(value: &BundleFlags) -> Self {
        let mut flags = value.unrecognised;
        if value.is_fragment {
            flags |= 1 << 0;
        }
        if value.is_admin_record {
            flags |= 1 << 1;
        }
        if value.must_not_fragment {
            flags |= 1 << 2;
        }
        if value.app_ack_requested {
            flags |= 1 << 5;
        }
        if value.report_status_time {
            flags |= 1 << 6;
        }
        if value.receipt_report_requested {
            flags |= 1 << 14;
        }
        if value.forward_report_requested {
            flags |= 1 << 16;
        }
        if value.delivery_report_requested {
            flags |= 1 << 17;
        }
        if value.delete_report_requested {
            flags |= 1 << 18;
        }
        flags
    }
}

impl cbor::encode::ToCbor for BundleFlags {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(self))
    }
}

impl cbor::decode::FromCbor for BundleFlags {
    type Error = cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        u64::from_cbor(data).map(|(value, len)| (value.into(), len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_unrecognised_bits() {
        let raw = (1 << 0) | (1 << 2) | (1 << 6) | (1 << 9) | (1 << 20);
        let flags = BundleFlags::from(raw);
        assert!(flags.is_fragment);
        assert!(flags.must_not_fragment);
        assert!(flags.report_status_time);
        assert_eq!(flags.unrecognised, (1 << 9) | (1 << 20));
        assert_eq!(u64::from(&flags), raw);
    }
}
