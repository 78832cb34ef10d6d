//! The MTCP frame: a CBOR byte-string header followed by that many raw
//! bytes. Zero-length frames are keep-alives.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Read the byte-string header of the next frame, returning its length.
pub(crate) async fn read_frame_len<R>(reader: &mut R) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let initial = reader.read_u8().await?;
    let (major, minor) = (initial >> 5, initial & 0x1F);
    if major != 2 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame is not a CBOR byte string (major type {major})"),
        ));
    }
    match minor {
        0..=23 => Ok(minor as u64),
        24 => Ok(reader.read_u8().await? as u64),
        25 => Ok(reader.read_u16().await? as u64),
        26 => Ok(reader.read_u32().await? as u64),
        27 => Ok(reader.read_u64().await?),
        minor => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("invalid byte-string header minor value {minor}"),
        )),
    }
}

/// The header bytes announcing a frame of `len` bytes. A `len` of zero
/// produces a keep-alive frame.
pub(crate) fn frame_header(len: u64) -> Vec<u8> {
    brant_cbor::encode::byte_string_header(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    async fn roundtrip(len: u64) {
        let header = frame_header(len);
        let mut reader = std::io::Cursor::new(header);
        assert_eq!(read_frame_len(&mut reader).await.unwrap(), len);
    }

    #[tokio::test]
    async fn header_roundtrips() {
        for len in [0, 1, 23, 24, 255, 256, 65535, 65536, u32::MAX as u64 + 1] {
            roundtrip(len).await;
        }
    }

    #[tokio::test]
    async fn keepalive_is_a_single_byte() {
        assert_eq!(*frame_header(0), hex!("40"));
    }

    #[tokio::test]
    async fn non_byte_string_frames_are_rejected() {
        // A CBOR unsigned integer
        let mut reader = std::io::Cursor::new(hex!("17").to_vec());
        assert!(read_frame_len(&mut reader).await.is_err());

        // An indefinite-length byte string
        let mut reader = std::io::Cursor::new(hex!("5f").to_vec());
        assert!(read_frame_len(&mut reader).await.is_err());
    }
}
