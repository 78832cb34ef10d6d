use crate::cbor;

/// Seconds between the Unix epoch and the DTN epoch (2000-01-01T00:00:00Z).
const DTN_EPOCH_UNIX_SECS: u64 = 946_684_800;

/// A point in DTN time: milliseconds since 2000-01-01 00:00:00 UTC.
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct DtnTime(u64);

impl DtnTime {
    pub const fn new(millisecs: u64) -> Self {
        Self(millisecs)
    }

    pub fn now() -> Self {
        let since_unix = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self(
            since_unix
                .as_millis()
                .saturating_sub(DTN_EPOCH_UNIX_SECS as u128 * 1_000) as u64,
        )
    }

    pub const fn millisecs(&self) -> u64 {
        self.0
    }

    pub const fn saturating_add_millis(&self, millisecs: u64) -> Self {
        Self(self.0.saturating_add(millisecs))
    }

    pub const fn saturating_sub_millis(&self, millisecs: u64) -> Self {
        Self(self.0.saturating_sub(millisecs))
    }
}

impl std::fmt::Display for DtnTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl cbor::encode::ToCbor for DtnTime {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&self.0)
    }
}

impl cbor::decode::FromCbor for DtnTime {
    type Error = cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        u64::from_cbor(data).map(|(millisecs, len)| (Self(millisecs), len))
    }
}
