//! The handshake wire form: an endpoint ID is sent as a CBOR byte-string
//! length prefix followed by the CBOR encoding of the ID itself.

use brant_bpa::cla;
use brant_bpv7::eid::EndpointId;
use brant_cbor as cbor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// EIDs are tiny; anything larger is a broken peer.
const MAX_EID_SIZE: u64 = 4096;

pub(crate) async fn write_endpoint_id<W>(writer: &mut W, eid: &EndpointId) -> cla::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let encoded = cbor::encode::emit(eid);
    writer
        .write_all(&cbor::encode::byte_string_header(encoded.len() as u64))
        .await?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

pub(crate) async fn read_endpoint_id<R>(reader: &mut R) -> cla::Result<EndpointId>
where
    R: AsyncRead + Unpin,
{
    let initial = reader.read_u8().await?;
    let (major, minor) = (initial >> 5, initial & 0x1F);
    if major != 2 {
        return Err(cla::Error::Handshake(format!(
            "endpoint id is not framed as a byte string (major type {major})"
        )));
    }
    let len = match minor {
        0..=23 => minor as u64,
        24 => reader.read_u8().await? as u64,
        25 => reader.read_u16().await? as u64,
        26 => reader.read_u32().await? as u64,
        27 => reader.read_u64().await?,
        minor => {
            return Err(cla::Error::Handshake(format!(
                "invalid byte-string header minor value {minor}"
            )));
        }
    };
    if len == 0 || len > MAX_EID_SIZE {
        return Err(cla::Error::Handshake(format!(
            "implausible endpoint id length {len}"
        )));
    }

    let mut encoded = vec![0u8; len as usize];
    reader.read_exact(&mut encoded).await?;
    cbor::decode::parse::<EndpointId>(&encoded)
        .map_err(|e| cla::Error::Handshake(format!("bad endpoint id: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn endpoint_id_roundtrips() {
        for eid in ["dtn:none", "dtn://node/", "dtn://node/some/service"] {
            let eid: EndpointId = eid.parse().unwrap();
            let mut buffer = Vec::new();
            write_endpoint_id(&mut buffer, &eid).await.unwrap();

            let mut reader = std::io::Cursor::new(buffer);
            assert_eq!(read_endpoint_id(&mut reader).await.unwrap(), eid);
        }
    }

    #[tokio::test]
    async fn zero_length_ids_are_rejected() {
        let mut reader = std::io::Cursor::new(vec![0x40]);
        assert!(matches!(
            read_endpoint_id(&mut reader).await,
            Err(cla::Error::Handshake(_))
        ));
    }
}
