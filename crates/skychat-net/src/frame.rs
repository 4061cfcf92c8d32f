//! Length-prefixed framing.
//!
//! `| 4-byte big-endian length N | N bytes of JSON |`, repeated. The body is
//! accumulated through a buffer of at most [`READ_CHUNK_SIZE`] bytes per read
//! and never reads past the declared length.

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use skychat_shared::constants::{FRAME_HEADER_SIZE, MAX_FRAME_SIZE, READ_CHUNK_SIZE};
use skychat_shared::Message;

use crate::error::FrameError;

/// Read one frame body.
///
/// Returns [`FrameError::Closed`] when the stream ends before the first
/// prefix byte, and a truncation error when it ends anywhere later.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Bytes, FrameError> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    let mut got = 0;
    while got < FRAME_HEADER_SIZE {
        let n = reader.read(&mut header[got..]).await?;
        if n == 0 {
            return Err(if got == 0 {
                FrameError::Closed
            } else {
                FrameError::TruncatedPrefix { got }
            });
        }
        got += n;
    }

    let expected = u32::from_be_bytes(header) as usize;
    if expected > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(expected));
    }

    let mut body = BytesMut::with_capacity(expected);
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    while body.len() < expected {
        let want = READ_CHUNK_SIZE.min(expected - body.len());
        let n = reader.read(&mut chunk[..want]).await?;
        if n == 0 {
            return Err(FrameError::Truncated {
                expected,
                got: body.len(),
            });
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Ok(body.freeze())
}

/// Write the prefix, then the body. Callers must hold the connection's
/// writer lock across the call so frames never interleave.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    body: &[u8],
) -> Result<(), FrameError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge(body.len()));
    }
    let prefix = (body.len() as u32).to_be_bytes();
    writer.write_all(&prefix).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    message.to_bytes()
}

pub fn decode_message(body: &[u8]) -> Result<Message, serde_json::Error> {
    Message::from_bytes(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skychat_shared::{PeerId, Route};

    fn sample(text: &str) -> Message {
        Message::text(PeerId([1u8; 32]), Route::p2p(PeerId([2u8; 32])), text)
    }

    #[tokio::test]
    async fn test_message_roundtrip_over_stream() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        let msg = sample("hello");

        write_frame(&mut a, &encode_message(&msg).unwrap()).await.unwrap();
        let body = read_frame(&mut b).await.unwrap();
        assert_eq!(decode_message(&body).unwrap(), msg);
    }

    #[tokio::test]
    async fn test_large_body_is_read_in_chunks() {
        // smaller pipe than the body forces many partial reads
        let (mut a, mut b) = tokio::io::duplex(512);
        let msg = sample(&"x".repeat(10 * READ_CHUNK_SIZE));
        let body = encode_message(&msg).unwrap();

        let writer = tokio::spawn(async move {
            write_frame(&mut a, &body).await.unwrap();
        });
        let read = read_frame(&mut b).await.unwrap();
        writer.await.unwrap();
        assert_eq!(decode_message(&read).unwrap(), msg);
    }

    #[tokio::test]
    async fn test_back_to_back_frames_do_not_bleed() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        write_frame(&mut a, b"first").await.unwrap();
        write_frame(&mut a, b"second").await.unwrap();

        assert_eq!(&read_frame(&mut b).await.unwrap()[..], b"first");
        assert_eq!(&read_frame(&mut b).await.unwrap()[..], b"second");
    }

    #[tokio::test]
    async fn test_clean_close_between_frames() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(matches!(read_frame(&mut b).await, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn test_truncated_prefix() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0]).await.unwrap();
        drop(a);
        assert!(matches!(
            read_frame(&mut b).await,
            Err(FrameError::TruncatedPrefix { got: 2 })
        ));
    }

    #[tokio::test]
    async fn test_truncated_body() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&10u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);
        assert!(matches!(
            read_frame(&mut b).await,
            Err(FrameError::Truncated {
                expected: 10,
                got: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        assert!(matches!(read_frame(&mut b).await, Err(FrameError::TooLarge(_))));
    }
}
