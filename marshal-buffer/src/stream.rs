//! Length-prefixed string helpers.
//!
//! Used where a lone string travels outside a managed message:
//!
//! ```text
//! +-----------------+----------------------+
//! | length (u32 LE) | UTF-8 bytes (length) |
//! +-----------------+----------------------+
//! ```

use crate::codec::DEFAULT_MAX_MANAGED_LENGTH;
use crate::error::BufferError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

fn invalid_utf8(e: std::string::FromUtf8Error) -> BufferError {
    BufferError::InvalidEncoding {
        type_name: std::any::type_name::<String>(),
        reason: e.to_string(),
    }
}

/// Writes `value` with a u32 length prefix and flushes.
pub async fn write_string<S>(stream: &mut S, value: &str) -> Result<(), BufferError>
where
    S: AsyncWrite + Unpin,
{
    let length = u32::try_from(value.len()).map_err(|_| BufferError::LengthTooLarge {
        length: value.len() as u64,
        max: u32::MAX as u64,
    })?;

    stream.write_all(&length.to_le_bytes()).await?;
    stream.write_all(value.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads a u32-prefixed string, refusing lengths above the default managed
/// limit.
pub async fn read_string<S>(stream: &mut S) -> Result<String, BufferError>
where
    S: AsyncRead + Unpin,
{
    let length = stream.read_u32_le().await?;
    if length > DEFAULT_MAX_MANAGED_LENGTH {
        return Err(BufferError::LengthTooLarge {
            length: length as u64,
            max: DEFAULT_MAX_MANAGED_LENGTH as u64,
        });
    }
    read_string_exact(stream, length as usize).await
}

/// Reads exactly `length` bytes as UTF-8.
pub async fn read_string_exact<S>(stream: &mut S, length: usize) -> Result<String, BufferError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; length];
    stream.read_exact(&mut buf).await?;
    String::from_utf8(buf).map_err(invalid_utf8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_layout() {
        let mut out = Vec::new();
        write_string(&mut out, "héllo").await.unwrap();
        assert_eq!(&out[..4], &6u32.to_le_bytes());
        assert_eq!(&out[4..], "héllo".as_bytes());
    }

    #[tokio::test]
    async fn test_roundtrip_sequence() {
        let mut out = Vec::new();
        write_string(&mut out, "first").await.unwrap();
        write_string(&mut out, "").await.unwrap();
        write_string(&mut out, "third").await.unwrap();

        let mut input = Cursor::new(out);
        assert_eq!(read_string(&mut input).await.unwrap(), "first");
        assert_eq!(read_string(&mut input).await.unwrap(), "");
        assert_eq!(read_string(&mut input).await.unwrap(), "third");
    }

    #[tokio::test]
    async fn test_read_exact() {
        let mut input = Cursor::new(b"abcdef".to_vec());
        assert_eq!(read_string_exact(&mut input, 3).await.unwrap(), "abc");
        assert_eq!(read_string_exact(&mut input, 3).await.unwrap(), "def");
        assert!(matches!(
            read_string_exact(&mut input, 1).await,
            Err(BufferError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let mut input = Cursor::new(vec![2, 0, 0, 0, 0xFF, 0xFF]);
        assert!(matches!(
            read_string(&mut input).await,
            Err(BufferError::InvalidEncoding { .. })
        ));
    }

    #[tokio::test]
    async fn test_split_reads() {
        // Prefix and payload arrive in separate chunks
        let mut input = tokio_test::io::Builder::new()
            .read(&[3, 0])
            .read(&[0, 0, b'a'])
            .read(b"bc")
            .build();
        assert_eq!(read_string(&mut input).await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_write_is_flushed() {
        let mut output = tokio_test::io::Builder::new()
            .write(&2u32.to_le_bytes())
            .write(b"ok")
            .build();
        write_string(&mut output, "ok").await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_length() {
        let mut input = Cursor::new(u32::MAX.to_le_bytes().to_vec());
        assert!(matches!(
            read_string(&mut input).await,
            Err(BufferError::LengthTooLarge { .. })
        ));
    }
}
