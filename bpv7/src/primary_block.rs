/*!
Parsing and emission of the BPv7 Primary Block (RFC 9171 §4.3.1).

The primary block is a definite-length CBOR array with the fields in RFC
order, an optional pair of fragment fields, and an optional trailing CRC.
*/

use crate::{
    bundle_flags::BundleFlags,
    bundle_id::{BundleId, FragmentInfo},
    cbor, crc,
    crc::CrcType,
    creation_timestamp::CreationTimestamp,
    eid::EndpointId,
    error::CaptureFieldErr,
    Error,
};

pub const BP_VERSION: u64 = 7;

#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub crc_type: CrcType,
    pub destination: EndpointId,
    pub source: EndpointId,
    pub report_to: EndpointId,
    pub timestamp: CreationTimestamp,
    /// Bundle lifetime in milliseconds.
    pub lifetime: u64,
    pub fragment: Option<FragmentInfo>,
}

impl PrimaryBlock {
    pub fn bundle_id(&self) -> BundleId {
        BundleId {
            source: self.source.clone(),
            timestamp: self.timestamp,
            fragment: self.fragment,
        }
    }

    /// Absolute DTN time at which this bundle's lifetime ends.
    pub fn expires(&self) -> crate::dtn_time::DtnTime {
        self.timestamp.time.saturating_add_millis(self.lifetime)
    }

    /// Serialize this block, CRC included.
    pub fn to_cbor(&self) -> Vec<u8> {
        let mut count = if let CrcType::None = self.crc_type {
            8
        } else {
            9
        };
        if self.fragment.is_some() {
            count += 2;
        }

        crc::append_crc_value(
            self.crc_type,
            cbor::encode::emit_array(Some(count), |a| {
                a.emit(&BP_VERSION);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit(&self.destination);
                a.emit(&self.source);
                a.emit(&self.report_to);
                a.emit(&self.timestamp);
                a.emit(&self.lifetime);

                if let Some(fragment) = &self.fragment {
                    a.emit(&fragment.offset);
                    a.emit(&fragment.total_len);
                }

                if !matches!(self.crc_type, CrcType::None) {
                    a.skip_value();
                }
            }),
        )
    }

    pub fn emit(&self, array: &mut cbor::encode::Array) {
        array.emit_raw(&self.to_cbor());
    }
}

impl cbor::decode::FromCbor for PrimaryBlock {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        cbor::decode::parse_array(data, |block| {
            let version: u64 = block.parse().map_field_err("version")?;
            if version != BP_VERSION {
                return Err(Error::InvalidVersion(version));
            }

            let flags: BundleFlags = block
                .parse()
                .map_field_err("bundle processing control flags")?;
            let crc_type = block.parse().map_field_err("CRC type")?;
            let destination = block.parse().map_field_err("destination EID")?;
            let source = block.parse().map_field_err("source EID")?;
            let report_to = block.parse().map_field_err("report-to EID")?;
            let timestamp = block.parse().map_field_err("creation timestamp")?;
            let lifetime = block.parse().map_field_err("lifetime")?;

            let fragment = if !flags.is_fragment {
                None
            } else {
                let offset: u64 = block.parse().map_field_err("fragment offset")?;
                let total_len: u64 = block.parse().map_field_err("total application data unit length")?;
                if offset >= total_len {
                    return Err(Error::InvalidFragmentInfo(offset, total_len));
                }
                Some(FragmentInfo { offset, total_len })
            };

            crc::parse_crc_value(data, block, crc_type)?;
            if block.end()?.is_none() {
                return Err(Error::AdditionalItems);
            }

            Ok(PrimaryBlock {
                flags,
                crc_type,
                destination,
                source,
                report_to,
                timestamp,
                lifetime,
                fragment,
            })
        })
    }
}
