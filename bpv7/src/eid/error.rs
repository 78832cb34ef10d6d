use thiserror::Error;

#[derive(Error, Debug)]
pub enum EidError {
    #[error("Unsupported EID scheme number {0}")]
    UnsupportedScheme(u64),

    #[error("URI does not start with the \"dtn\" URI prefix")]
    MissingDtnPrefix,

    #[error("SSP does not match a dtn endpoint: {0}")]
    InvalidSsp(String),

    #[error("Numeric dtn SSP must be 0, found {0}")]
    InvalidSspNumber(u64),

    #[error("dtn node name must not be empty")]
    EmptyNodeName,

    #[error("Invalid dtn node name: {0}")]
    InvalidNodeName(String),

    #[error("Additional items found in EID array")]
    AdditionalItems,

    #[error(transparent)]
    InvalidCbor(#[from] brant_cbor::decode::Error),
}
