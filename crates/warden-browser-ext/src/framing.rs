//! Native-messaging frame I/O
//!
//! Chrome's native messaging wraps each JSON message in a 4-byte
//! little-endian length prefix and caps host-bound messages at 1 MiB.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Chrome limits native messages to 1 MiB
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Read one length-prefixed frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max {})", len, MAX_FRAME_LEN),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Write one length-prefixed frame.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {} bytes (max {})", payload.len(), MAX_FRAME_LEN),
        ));
    }

    writer.write_all(&(payload.len() as u32).to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_round_trip() {
        let (mut near, mut far) = tokio::io::duplex(4096);

        write_frame(&mut near, b"{\"type\":\"ping\"}").await.unwrap();

        let payload = read_frame(&mut far).await.unwrap();
        assert_eq!(payload, b"{\"type\":\"ping\"}");
    }

    #[tokio::test]
    async fn empty_frame_round_trip() {
        let (mut near, mut far) = tokio::io::duplex(64);

        write_frame(&mut near, b"").await.unwrap();
        let payload = read_frame(&mut far).await.unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn oversized_incoming_frame_is_rejected() {
        let (mut near, mut far) = tokio::io::duplex(64);

        let huge = (MAX_FRAME_LEN as u32 + 1).to_le_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut near, &huge)
            .await
            .unwrap();

        let err = read_frame(&mut far).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn oversized_outgoing_frame_is_rejected() {
        let (mut near, _far) = tokio::io::duplex(64);

        let payload = vec![b'x'; MAX_FRAME_LEN + 1];
        let err = write_frame(&mut near, &payload).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
