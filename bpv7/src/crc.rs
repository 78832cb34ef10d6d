use crate::cbor;
use thiserror::Error;

const CRC16: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_IBM_3740);
const CRC32: ::crc::Crc<u32> = ::crc::Crc::<u32>::new(&::crc::CRC_32_ISCSI);

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid CRC type {0}")]
    InvalidType(u64),

    #[error("Block has unexpected CRC value length {0}")]
    InvalidLength(usize),

    #[error("Block has a CRC value but no CRC type specified")]
    UnexpectedCrcValue,

    #[error("Incorrect CRC value")]
    IncorrectCrc,

    #[error("Missing CRC value")]
    MissingCrc,

    #[error(transparent)]
    InvalidCbor(#[from] cbor::decode::Error),
}

/// The CRC variant protecting a block (RFC 9171 §4.2.1): CRC-16/IBM-3740
/// (CCITT-FALSE) or CRC-32/Castagnoli.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum CrcType {
    None,
    Crc16,
    #[default]
    Crc32,
    Unrecognised(u64),
}

impl CrcType {
    /// Length in bytes of the encoded CRC value item, including its
    /// byte-string header.
    pub fn encoded_len(&self) -> usize {
        match self {
            CrcType::None => 0,
            CrcType::Crc16 => 3,
            CrcType::Crc32 => 5,
            CrcType::Unrecognised(_) => 0,
        }
    }
}

impl From<u64> for CrcType {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Crc16,
            2 => Self::Crc32,
            value => Self::Unrecognised(value),
        }
    }
}

impl From<CrcType> for u64 {
    fn from(value: CrcType) -> Self {
        match value {
            CrcType::None => 0,
            CrcType::Crc16 => 1,
            CrcType::Crc32 => 2,
            CrcType::Unrecognised(value) => value,
        }
    }
}

impl cbor::encode::ToCbor for CrcType {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit(&u64::from(*self))
    }
}

impl cbor::decode::FromCbor for CrcType {
    type Error = cbor::decode::Error;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        u64::from_cbor(data).map(|(value, len)| (value.into(), len))
    }
}

/// Parse and verify the optional trailing CRC item of a block.
///
/// `data` must be the block's own encoding, i.e. the buffer the `block`
/// array was parsed from, so that the digest can cover the serialization
/// with the CRC bytes replaced by zeroes.
pub fn parse_crc_value(
    data: &[u8],
    block: &mut cbor::decode::Array,
    crc_type: CrcType,
) -> Result<(), Error> {
    let crc_value = block.try_parse_value(|value| match value {
        cbor::decode::Value::Bytes(crc) => match crc_type {
            CrcType::None => Err(Error::UnexpectedCrcValue),
            CrcType::Crc16 => {
                if crc.len() != 2 {
                    Err(Error::InvalidLength(crc.len()))
                } else {
                    Ok(u16::from_be_bytes(crc.try_into().unwrap()) as u32)
                }
            }
            CrcType::Crc32 => {
                if crc.len() != 4 {
                    Err(Error::InvalidLength(crc.len()))
                } else {
                    Ok(u32::from_be_bytes(crc.try_into().unwrap()))
                }
            }
            CrcType::Unrecognised(_) => Ok(0),
        },
        value => Err(cbor::decode::Error::IncorrectType(
            "Byte String".to_string(),
            value.type_name(),
        )
        .into()),
    })?;

    let crc_val_end = block.offset();
    let crc_end = block.end()?.unwrap_or(crc_val_end);

    match (crc_type, crc_value) {
        (CrcType::None, None) => Ok(()),
        (CrcType::Crc16, Some(crc_value)) => {
            let mut digest = CRC16.digest();
            digest.update(&data[0..crc_val_end - 2]);
            digest.update(&[0u8; 2]);
            digest.update(&data[crc_val_end..crc_end]);
            if crc_value != digest.finalize() as u32 {
                Err(Error::IncorrectCrc)
            } else {
                Ok(())
            }
        }
        (CrcType::Crc32, Some(crc_value)) => {
            let mut digest = CRC32.digest();
            digest.update(&data[0..crc_val_end - 4]);
            digest.update(&[0u8; 4]);
            digest.update(&data[crc_val_end..crc_end]);
            if crc_value != digest.finalize() {
                Err(Error::IncorrectCrc)
            } else {
                Ok(())
            }
        }
        (CrcType::Unrecognised(t), _) => Err(Error::InvalidType(t)),
        _ => Err(Error::MissingCrc),
    }
}

/// Append the CRC item to a block serialized with its CRC slot skipped.
///
/// The digest covers the block with the CRC value bytes set to zero, then
/// the real bytes are substituted.
pub fn append_crc_value(crc_type: CrcType, mut data: Vec<u8>) -> Vec<u8> {
    match crc_type {
        CrcType::None => {}
        CrcType::Crc16 => {
            data.push(0x42);
            let mut digest = CRC16.digest();
            digest.update(&data);
            digest.update(&[0; 2]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        CrcType::Crc32 => {
            data.push(0x44);
            let mut digest = CRC32.digest();
            digest.update(&data);
            digest.update(&[0; 4]);
            data.extend_from_slice(&digest.finalize().to_be_bytes());
        }
        CrcType::Unrecognised(_) => unreachable!(),
    }
    data
}
