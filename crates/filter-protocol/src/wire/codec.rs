//! Length-prefixed frame codec.
//!
//! Each frame is a 4-byte big-endian body length followed by a `bincode`
//! body. The length is checked against the caller's limit before any body
//! buffer is allocated.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default maximum frame body size (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Frame encoding/decoding errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The announced frame exceeds the limit.
    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced body length
        size: usize,
        /// Accepted maximum
        max: usize,
    },

    /// Body (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Stream I/O failed (including EOF before a full frame).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialize `value` and write it as one frame.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let body = bincode::serialize(value)?;
    let len = u32::try_from(body.len()).map_err(|_| CodecError::FrameTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;

    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame of at most `max_frame_size` bytes and decode it.
pub async fn read_frame<R, T>(reader: &mut R, max_frame_size: usize) -> Result<T, CodecError>
where
    R: AsyncRead + Unpin + ?Sized,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > max_frame_size {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{FilterSubscribeRequest, MessagePush};
    use shared_types::Message;

    #[tokio::test]
    async fn test_frame_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let push = MessagePush::new("/t", Message::new("A", b"hello".to_vec()));

        write_frame(&mut a, &push).await.unwrap();
        let decoded: MessagePush = read_frame(&mut b, DEFAULT_MAX_FRAME_SIZE).await.unwrap();
        assert_eq!(decoded, push);
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected_before_body() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let push = MessagePush::new("/t", Message::new("A", vec![0u8; 200]));

        write_frame(&mut a, &push).await.unwrap();
        let err = read_frame::<_, MessagePush>(&mut b, 64).await.unwrap_err();
        assert!(matches!(err, CodecError::FrameTooLarge { max: 64, .. }));
    }

    #[tokio::test]
    async fn test_truncated_frame_is_io_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(&[1, 2, 3]).await.unwrap();
        drop(a);

        let err = read_frame::<_, FilterSubscribeRequest>(&mut b, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[tokio::test]
    async fn test_garbage_body_is_serialization_error() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        a.write_all(&2u32.to_be_bytes()).await.unwrap();
        a.write_all(&[0xFF, 0xFF]).await.unwrap();

        let err = read_frame::<_, FilterSubscribeRequest>(&mut b, DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap_err();
        assert!(matches!(err, CodecError::Serialization(_)));
    }
}
