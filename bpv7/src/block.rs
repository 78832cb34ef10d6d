use crate::{
    block_flags::BlockFlags,
    block_type::BlockType,
    cbor, crc,
    crc::CrcType,
    eid::EndpointId,
    error::CaptureFieldErr,
    Error,
};

/// Hop-count state carried by a Hop Count extension block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HopInfo {
    pub limit: u64,
    pub count: u64,
}

/// The type-specific data of a canonical block.
///
/// Unrecognised type codes retain their content verbatim so the block can
/// be re-emitted unchanged on the next hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockData {
    Payload(Vec<u8>),
    PreviousNode(EndpointId),
    /// Age of the bundle in milliseconds.
    BundleAge(u64),
    HopCount(HopInfo),
    Unrecognised { type_code: u64, data: Vec<u8> },
}

impl BlockData {
    pub fn block_type(&self) -> BlockType {
        match self {
            BlockData::Payload(_) => BlockType::Payload,
            BlockData::PreviousNode(_) => BlockType::PreviousNode,
            BlockData::BundleAge(_) => BlockType::BundleAge,
            BlockData::HopCount(_) => BlockType::HopCount,
            BlockData::Unrecognised { type_code, .. } => BlockType::Unrecognised(*type_code),
        }
    }

    /// Decode the content of a block's data byte-string according to its
    /// type code.
    fn decode(block_type: BlockType, content: &[u8]) -> Result<Self, Error> {
        match block_type {
            BlockType::Payload => Ok(BlockData::Payload(content.to_vec())),
            BlockType::PreviousNode => {
                let (eid, len) = cbor::decode::try_parse::<EndpointId>(content)
                    .map_field_err("previous node ID")?;
                if len != content.len() {
                    Err(Error::InvalidField {
                        field: "previous node ID",
                        source: "trailing data in block content".into(),
                    })
                } else {
                    Ok(BlockData::PreviousNode(eid))
                }
            }
            BlockType::BundleAge => {
                let (age, len) =
                    cbor::decode::try_parse::<u64>(content).map_field_err("bundle age")?;
                if len != content.len() {
                    Err(Error::InvalidField {
                        field: "bundle age",
                        source: "trailing data in block content".into(),
                    })
                } else {
                    Ok(BlockData::BundleAge(age))
                }
            }
            BlockType::HopCount => {
                let (info, len) = cbor::decode::parse_array(content, |a| {
                    let limit = a.parse().map_field_err("hop limit")?;
                    let count = a.parse().map_field_err("hop count")?;
                    if a.end()?.is_none() {
                        Err(Error::InvalidField {
                            field: "hop count",
                            source: "additional items in array".into(),
                        })
                    } else {
                        Ok(HopInfo { limit, count })
                    }
                })?;
                if len != content.len() {
                    Err(Error::InvalidField {
                        field: "hop count",
                        source: "trailing data in block content".into(),
                    })
                } else {
                    Ok(BlockData::HopCount(info))
                }
            }
            BlockType::Unrecognised(type_code) => Ok(BlockData::Unrecognised {
                type_code,
                data: content.to_vec(),
            }),
        }
    }

    /// Encode the block-type-specific data, i.e. the content of the
    /// block's data byte-string.
    fn content(&self) -> Vec<u8> {
        match self {
            BlockData::Payload(data) => data.clone(),
            BlockData::PreviousNode(eid) => cbor::encode::emit(eid),
            BlockData::BundleAge(age) => cbor::encode::emit(age),
            BlockData::HopCount(info) => cbor::encode::emit_array(Some(2), |a| {
                a.emit(&info.limit);
                a.emit(&info.count);
            }),
            BlockData::Unrecognised { data, .. } => data.clone(),
        }
    }
}

/// A canonical block: every block of a bundle other than the primary
/// block (RFC 9171 §4.3). The payload block is the canonical block with
/// type code 1 and block number 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalBlock {
    pub number: u64,
    pub flags: BlockFlags,
    pub crc_type: CrcType,
    pub data: BlockData,
}

impl CanonicalBlock {
    pub fn new(number: u64, flags: BlockFlags, data: BlockData) -> Self {
        Self {
            number,
            flags,
            crc_type: CrcType::default(),
            data,
        }
    }

    pub fn block_type(&self) -> BlockType {
        self.data.block_type()
    }

    pub fn is_payload(&self) -> bool {
        matches!(self.data, BlockData::Payload(_))
    }

    /// Serialize this block, CRC included, and splice it into a bundle
    /// array.
    pub fn emit(&self, array: &mut cbor::encode::Array) {
        array.emit_raw(&self.to_cbor());
    }

    pub fn to_cbor(&self) -> Vec<u8> {
        let count = if let CrcType::None = self.crc_type {
            5
        } else {
            6
        };
        crc::append_crc_value(
            self.crc_type,
            cbor::encode::emit_array(Some(count), |a| {
                a.emit(&self.block_type());
                a.emit(&self.number);
                a.emit(&self.flags);
                a.emit(&self.crc_type);
                a.emit(&self.data.content());
                if !matches!(self.crc_type, CrcType::None) {
                    a.skip_value();
                }
            }),
        )
    }
}

impl cbor::decode::FromCbor for CanonicalBlock {
    type Error = Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        cbor::decode::parse_array(data, |block| {
            let block_type: BlockType = block.parse().map_field_err("block type code")?;
            let number: u64 = block.parse().map_field_err("block number")?;
            match (number, block_type) {
                (1, BlockType::Payload) => {}
                (0, _) | (1, _) | (_, BlockType::Payload) => {
                    return Err(Error::InvalidBlockNumber(number, block_type));
                }
                _ => {}
            }

            let flags = block
                .parse()
                .map_field_err("block processing control flags")?;
            let crc_type = block.parse().map_field_err("CRC type")?;

            let content = block
                .parse_value(|value| match value {
                    cbor::decode::Value::Bytes(b) => Ok(b.to_vec()),
                    value => Err(Error::from(cbor::decode::Error::IncorrectType(
                        "Byte String".to_string(),
                        value.type_name(),
                    ))),
                })
                .map_field_err("block data")?;

            crc::parse_crc_value(data, block, crc_type)?;
            if block.end()?.is_none() {
                return Err(Error::AdditionalItems);
            }

            Ok(CanonicalBlock {
                number,
                flags,
                crc_type,
                data: BlockData::decode(block_type, &content)?,
            })
        })
    }
}
