use crate::{cbor, dtn_time::DtnTime, error::CaptureFieldErr, Error};

/// A bundle creation timestamp: the DTN time of creation paired with a
/// sequence number disambiguating bundles created in the same millisecond.
///
/// A zero creation time is the "epoch" sentinel: the source node has no
/// clock and bundle age must come from a Bundle Age extension block.
#[derive(
    Default, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct CreationTimestamp {
    pub time: DtnTime,
    pub sequence_number: u64,
}

impl CreationTimestamp {
    pub fn now() -> Self {
        Self {
            time: DtnTime::now(),
            sequence_number: 0,
        }
    }

    pub fn is_epoch(&self) -> bool {
        self.time.millisecs() == 0
    }
}

impl std::fmt::Display for CreationTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.time.millisecs(), self.sequence_number)
    }
}

impl cbor::encode::ToCbor for CreationTimestamp {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&self.time);
            a.emit(&self.sequence_number);
        })
    }
}

impl cbor::decode::FromCbor for CreationTimestamp {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        cbor::decode::parse_array(data, |a| {
            let timestamp = CreationTimestamp {
                time: a.parse().map_field_err("bundle creation time")?,
                sequence_number: a.parse().map_field_err("sequence number")?,
            };
            if a.end()?.is_none() {
                Err(Error::InvalidField {
                    field: "creation timestamp",
                    source: "additional items in array".into(),
                })
            } else {
                Ok(timestamp)
            }
        })
    }
}
