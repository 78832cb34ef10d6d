use super::*;

/// Parse the scheme-specific part of a `dtn` URI: either `none` or
/// `//<node-name>/<demux>` where the demux may be empty and may itself
/// contain `/` separators.
pub(super) fn parse_dtn_ssp(ssp: &str) -> Result<EndpointId, EidError> {
    if ssp == "none" {
        return Ok(EndpointId::Null);
    }

    let Some(rest) = ssp.strip_prefix("//") else {
        return Err(EidError::InvalidSsp(ssp.to_string()));
    };

    let Some((node_name, demux)) = rest.split_once('/') else {
        return Err(EidError::InvalidSsp(ssp.to_string()));
    };

    if node_name.is_empty() {
        return Err(EidError::EmptyNodeName);
    }

    Ok(EndpointId::Dtn {
        node_name: node_name.into(),
        demux: demux.into(),
    })
}

impl std::str::FromStr for EndpointId {
    type Err = EidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(ssp) = s.strip_prefix("dtn:") else {
            return Err(EidError::MissingDtnPrefix);
        };
        parse_dtn_ssp(ssp)
    }
}
