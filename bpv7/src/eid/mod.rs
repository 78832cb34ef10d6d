use crate::cbor;

mod error;
mod parse;

#[cfg(test)]
mod cbor_tests;

#[cfg(test)]
mod str_tests;

pub use error::EidError;

const DTN_SCHEME_NUMBER: u64 = 1;

/// An Endpoint Identifier for the `dtn` URI scheme (RFC 9171 §4.2.5.1).
///
/// The null endpoint `dtn:none` is its own variant.
#[derive(Default, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum EndpointId {
    #[default]
    Null,
    Dtn {
        node_name: Box<str>,
        demux: Box<str>,
    },
}

impl EndpointId {
    /// Create an endpoint under a node name, e.g. `node("a", "echo")` is
    /// `dtn://a/echo`.
    pub fn new(node_name: &str, demux: &str) -> Result<Self, EidError> {
        let eid = Self::Dtn {
            node_name: node_name.into(),
            demux: demux.into(),
        };
        eid.check_valid()?;
        Ok(eid)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, EndpointId::Null)
    }

    /// A `dtn` endpoint whose demux starts with `~` identifies a
    /// non-singleton endpoint; `dtn:none` is never a singleton.
    pub fn is_singleton(&self) -> bool {
        match self {
            EndpointId::Null => false,
            EndpointId::Dtn { demux, .. } => !demux.starts_with('~'),
        }
    }

    /// The administrative root endpoint of the node this endpoint lives
    /// on: `dtn://node/x` becomes `dtn://node/`.
    pub fn node_id(&self) -> EndpointId {
        match self {
            EndpointId::Null => EndpointId::Null,
            EndpointId::Dtn { node_name, .. } => EndpointId::Dtn {
                node_name: node_name.clone(),
                demux: "".into(),
            },
        }
    }

    /// True when both endpoints belong to the same node.
    pub fn same_node(&self, other: &EndpointId) -> bool {
        match (self, other) {
            (
                EndpointId::Dtn { node_name: a, .. },
                EndpointId::Dtn { node_name: b, .. },
            ) => a == b,
            _ => false,
        }
    }

    fn check_valid(&self) -> Result<(), EidError> {
        if let EndpointId::Dtn { node_name, .. } = self {
            if node_name.is_empty() {
                return Err(EidError::EmptyNodeName);
            }
            if node_name.contains('/') {
                return Err(EidError::InvalidNodeName(node_name.to_string()));
            }
        }
        Ok(())
    }

    fn ssp(&self) -> String {
        match self {
            EndpointId::Null => "none".to_string(),
            EndpointId::Dtn { node_name, demux } => format!("//{node_name}/{demux}"),
        }
    }
}

impl cbor::encode::ToCbor for EndpointId {
    fn to_cbor(&self, encoder: &mut cbor::encode::Encoder) {
        encoder.emit_array(Some(2), |a| {
            a.emit(&DTN_SCHEME_NUMBER);
            match self {
                EndpointId::Null => a.emit(&0u64),
                EndpointId::Dtn { .. } => a.emit(self.ssp().as_str()),
            }
        })
    }
}

impl cbor::decode::FromCbor for EndpointId {
    type Error = EidError;

    fn from_cbor(data: &[u8]) -> Result<(Self, usize), Self::Error> {
        cbor::decode::parse_array(data, |a| {
            let scheme = a.parse::<u64>()?;
            if scheme != DTN_SCHEME_NUMBER {
                return Err(EidError::UnsupportedScheme(scheme));
            }
            let eid = a.parse_value(|value| match value {
                cbor::decode::Value::UnsignedInteger(0) => Ok(EndpointId::Null),
                cbor::decode::Value::UnsignedInteger(n) => Err(EidError::InvalidSspNumber(n)),
                cbor::decode::Value::Text(ssp) => parse::parse_dtn_ssp(ssp),
                value => Err(cbor::decode::Error::IncorrectType(
                    "Unsigned Integer or Text String".to_string(),
                    value.type_name(),
                )
                .into()),
            })?;
            if a.end()?.is_none() {
                Err(EidError::AdditionalItems)
            } else {
                Ok(eid)
            }
        })
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointId::Null => f.write_str("dtn:none"),
            EndpointId::Dtn { node_name, demux } => {
                write!(f, "dtn://{node_name}/{demux}")
            }
        }
    }
}

impl std::fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl serde::Serialize for EndpointId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for EndpointId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl serde::de::Visitor<'_> for Visitor {
            type Value = EndpointId;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a dtn-scheme endpoint identifier")
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}
