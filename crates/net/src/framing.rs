//! Length-delimited message framing over TCP.
//!
//! Wire format: a 4-byte big-endian length `N`, then exactly `N` bytes of UTF-8 JSON
//! encoding one [`Message`]. Frames are never split or merged: the length and body go
//! out in a single buffer, and each connection has exactly one writer task.
//!
//! `N` must be in `1..=MAX_FRAME_LEN`. Anything else means the stream is out of sync
//! and the connection is dropped.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::NetError;
use crate::protocol::Message;

/// Largest frame body accepted in either direction (1 MiB).
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

/// Encoded frame body shared between every recipient of a broadcast.
pub type FrameBytes = Arc<[u8]>;

/// Frames that may wait on one connection's writer before the peer counts as stalled.
pub const OUTBOUND_QUEUE_FRAMES: usize = 256;

/// Outbound queue feeding a [`spawn_frame_writer`] task.
pub fn outbound_channel() -> (mpsc::Sender<FrameBytes>, mpsc::Receiver<FrameBytes>) {
    mpsc::channel(OUTBOUND_QUEUE_FRAMES)
}

/// Serialize a message to its JSON body (no length prefix).
pub fn encode_message(msg: &Message) -> Result<FrameBytes, NetError> {
    let body = serde_json::to_vec(msg).map_err(NetError::Encode)?;
    if body.is_empty() || body.len() > MAX_FRAME_LEN as usize {
        return Err(NetError::FrameLength(body.len().min(u32::MAX as usize) as u32));
    }
    Ok(body.into())
}

/// Parse one JSON body into a message.
pub fn decode_message(body: &[u8]) -> Result<Message, NetError> {
    serde_json::from_slice(body).map_err(NetError::Decode)
}

/// Write one already-encoded body as a frame and flush.
pub async fn write_frame_bytes<W>(writer: &mut W, body: &[u8]) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let len = body.len();
    if len == 0 || len > MAX_FRAME_LEN as usize {
        return Err(NetError::FrameLength(len.min(u32::MAX as usize) as u32));
    }

    let mut buf = Vec::with_capacity(4 + len);
    buf.extend_from_slice(&(len as u32).to_be_bytes());
    buf.extend_from_slice(body);

    writer.write_all(&buf).await.map_err(NetError::from_stream)?;
    writer.flush().await.map_err(NetError::from_stream)?;
    Ok(())
}

/// Encode and write one message.
pub async fn write_frame<W>(writer: &mut W, msg: &Message) -> Result<(), NetError>
where
    W: AsyncWrite + Unpin,
{
    let body = encode_message(msg)?;
    write_frame_bytes(writer, &body).await
}

/// Read one frame body.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly before a new frame began.
/// EOF in the middle of a frame is [`NetError::ConnectionLost`].
pub async fn read_frame_bytes<R>(reader: &mut R) -> Result<Option<Vec<u8>>, NetError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut filled = 0;
    while filled < len_buf.len() {
        let n = reader
            .read(&mut len_buf[filled..])
            .await
            .map_err(NetError::from_stream)?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(NetError::ConnectionLost);
        }
        filled += n;
    }

    let len = u32::from_be_bytes(len_buf);
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(NetError::FrameLength(len));
    }

    let mut body = vec![0u8; len as usize];
    reader
        .read_exact(&mut body)
        .await
        .map_err(NetError::from_stream)?;
    Ok(Some(body))
}

/// Read and decode one message.
///
/// A body that is not a valid message yields [`NetError::Decode`]; the frame has been
/// consumed, so the caller may keep reading.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>, NetError>
where
    R: AsyncRead + Unpin,
{
    match read_frame_bytes(reader).await? {
        Some(body) => decode_message(&body).map(Some),
        None => Ok(None),
    }
}

/// Spawn the single writer task for a connection.
///
/// Frames queued on `rx` go out in order. The task ends when every sender is dropped
/// or the stream fails; either way the write half is shut down.
pub fn spawn_frame_writer<W>(mut writer: W, mut rx: mpsc::Receiver<FrameBytes>) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(body) = rx.recv().await {
            if let Err(e) = write_frame_bytes(&mut writer, &body).await {
                log::debug!("frame writer stopped: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frame_roundtrip_over_duplex() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        let msg = Message::RoundReadyRequest { round: 7 };
        write_frame(&mut a, &msg).await.unwrap();
        let got = read_frame(&mut b).await.unwrap();
        assert_eq!(got, Some(msg));
    }

    #[tokio::test]
    async fn length_prefix_is_big_endian() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_frame_bytes(&mut a, b"{}").await.unwrap();
        let mut raw = [0u8; 6];
        b.read_exact(&mut raw).await.unwrap();
        assert_eq!(&raw[..4], &[0, 0, 0, 2]);
        assert_eq!(&raw[4..], b"{}");
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let (mut a, mut b) = tokio::io::duplex(64 * 1024);
        for round in 1..=20 {
            write_frame(&mut a, &Message::PrepareNextPiece { round })
                .await
                .unwrap();
        }
        for round in 1..=20 {
            let got = read_frame(&mut b).await.unwrap();
            assert_eq!(got, Some(Message::PrepareNextPiece { round }));
        }
    }

    #[tokio::test]
    async fn clean_eof_yields_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(read_frame_bytes(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_lost() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0, 0, 10, b'{']).await.unwrap();
        drop(a);
        let err = read_frame_bytes(&mut b).await.unwrap_err();
        assert!(matches!(err, NetError::ConnectionLost));
    }

    #[tokio::test]
    async fn rejects_zero_and_oversized_lengths() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&0u32.to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame_bytes(&mut b).await,
            Err(NetError::FrameLength(0))
        ));

        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME_LEN + 1).to_be_bytes()).await.unwrap();
        assert!(matches!(
            read_frame_bytes(&mut b).await,
            Err(NetError::FrameLength(_))
        ));

        let (mut a, _b) = tokio::io::duplex(64);
        let big = vec![b' '; MAX_FRAME_LEN as usize + 1];
        assert!(matches!(
            write_frame_bytes(&mut a, &big).await,
            Err(NetError::FrameLength(_))
        ));
    }

    #[tokio::test]
    async fn undecodable_body_is_recoverable() {
        let (mut a, mut b) = tokio::io::duplex(4096);
        write_frame_bytes(&mut a, br#"{"type":"Bogus"}"#).await.unwrap();
        write_frame(&mut a, &Message::StartGame { seed: 3 })
            .await
            .unwrap();

        let err = read_frame(&mut b).await.unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(
            read_frame(&mut b).await.unwrap(),
            Some(Message::StartGame { seed: 3 })
        );
    }

    #[tokio::test]
    async fn writer_task_drains_queue() {
        let (a, mut b) = tokio::io::duplex(64 * 1024);
        let (tx, rx) = outbound_channel();
        let handle = spawn_frame_writer(a, rx);
        for round in 1..=3 {
            tx.try_send(encode_message(&Message::RoundReadyRequest { round }).unwrap())
                .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        for round in 1..=3 {
            assert_eq!(
                read_frame(&mut b).await.unwrap(),
                Some(Message::RoundReadyRequest { round })
            );
        }
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }
}
