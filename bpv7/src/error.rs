/*!
The primary error type for the `bpv7` crate, covering parsing failures and
semantic validation failures.
*/

use crate::{block_type::BlockType, cbor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A bundle must be encoded as an indefinite-length CBOR array.
    #[error("Bundle is not an indefinite-length CBOR array")]
    NotIndefiniteArray,

    /// Additional data after the end of the bundle's CBOR array.
    #[error("Bundle has additional data after end of CBOR array")]
    AdditionalData,

    /// A block's CBOR array carries more items than its layout allows.
    #[error("Block has additional items")]
    AdditionalItems,

    #[error("Unsupported bundle protocol version {0}")]
    InvalidVersion(u64),

    #[error("Bundle has no payload block")]
    MissingPayload,

    #[error("Final block of bundle is not a payload block")]
    PayloadNotFinal,

    #[error("Bundle has more than one payload block")]
    DuplicatePayload,

    #[error("Bundle has more than one block with block number {0}")]
    DuplicateBlockNumber(u64),

    #[error("{1:?} block cannot be block number {0}")]
    InvalidBlockNumber(u64, BlockType),

    #[error("Invalid fragment information: offset {0}, total length {1}")]
    InvalidFragmentInfo(u64, u64),

    /// The payload of an administrative-record bundle must not request a
    /// status report for being unprocessable (RFC 9171 §4.3.2).
    #[error(
        "Bundle is an administrative record, but the payload block requests \
         a status report if it cannot be processed"
    )]
    ReportOnAdminRecord,

    #[error("Bundle source has no clock, and there is no Bundle Age extension block")]
    MissingBundleAge,

    #[error("Bundle lifetime is exceeded")]
    LifetimeExceeded,

    #[error("Bundle control flags forbid fragmentation")]
    MustNotFragment,

    #[error("Per-fragment overhead of {0} bytes exceeds the MTU of {1} bytes")]
    FragmentOverhead(usize, usize),

    #[error("No fragments to reassemble")]
    NoFragments,

    #[error("Bundle is not a fragment")]
    NotAFragment,

    #[error("Next fragment starts at offset {next}, gap from {end}")]
    FragmentGap { end: u64, next: u64 },

    #[error("Reassembled length {0} does not match total data length {1}")]
    TotalLengthMismatch(u64, u64),

    /// Multiple independent validation failures.
    #[error("Bundle is invalid: {}", FormatList(.0))]
    Invalid(Vec<Error>),

    #[error(transparent)]
    InvalidCrc(#[from] crate::crc::Error),

    #[error(transparent)]
    InvalidEid(#[from] crate::eid::EidError),

    #[error(transparent)]
    InvalidCbor(#[from] cbor::decode::Error),

    #[error("Failed to parse {field}: {source}")]
    InvalidField {
        field: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

struct FormatList<'a>(&'a Vec<Error>);

impl std::fmt::Display for FormatList<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{e}")?;
        }
        Ok(())
    }
}

/// Maps errors to [`Error::InvalidField`], adding the field name for
/// context when parsing a specific field fails.
pub trait CaptureFieldErr<T> {
    fn map_field_err(self, field: &'static str) -> Result<T, Error>;
}

impl<T, E: Into<Box<dyn std::error::Error + Send + Sync>>> CaptureFieldErr<T>
    for std::result::Result<T, E>
{
    fn map_field_err(self, field: &'static str) -> Result<T, Error> {
        self.map_err(|e| Error::InvalidField {
            field,
            source: e.into(),
        })
    }
}
