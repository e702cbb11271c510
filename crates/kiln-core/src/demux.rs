//! Stream demultiplexer.
//!
//! Splits the sandbox's combined framed channel into independent stdout and
//! stderr byte streams. Frames are decoded here and nowhere earlier; the
//! payload stays binary until after the split.
//!
//! Delivery policy: buffered. Chunks flow into unbounded channels, so a slow
//! consumer delays delivery but never blocks the sandbox's writer and never
//! loses data within the session's lifetime. End-of-stream and failures
//! propagate to both derived streams.

use crate::error::CoreError;
use bytes::Bytes;
use kiln_runtime::frame::{self, StreamTag, HEADER_LEN};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;

/// One item on a derived stream: a chunk, or the failure that ended it.
/// End-of-stream is the channel closing.
pub(crate) type StreamItem = std::result::Result<Bytes, CoreError>;

/// The two derived streams of a session.
pub(crate) struct DemuxStreams {
    pub(crate) output: mpsc::UnboundedReceiver<StreamItem>,
    pub(crate) errors: mpsc::UnboundedReceiver<StreamItem>,
}

/// Spawn the demultiplexing task over a combined channel.
pub(crate) fn spawn(combined: Box<dyn AsyncRead + Send + Unpin>) -> DemuxStreams {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (err_tx, err_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        if let Err(e) = split(combined, &out_tx, &err_tx).await {
            tracing::debug!(error = %e, "Combined stream failed");
            let _ = out_tx.send(Err(CoreError::Stream(e.to_string())));
            let _ = err_tx.send(Err(CoreError::Stream(e.to_string())));
        }
        // Dropping both senders closes the derived streams.
    });

    DemuxStreams {
        output: out_rx,
        errors: err_rx,
    }
}

/// Frame-decode loop. Returns Ok on a clean end-of-stream at a frame
/// boundary; any mid-frame EOF or decode failure is an error for both
/// derived streams.
async fn split(
    mut combined: Box<dyn AsyncRead + Send + Unpin>,
    out_tx: &mpsc::UnboundedSender<StreamItem>,
    err_tx: &mpsc::UnboundedSender<StreamItem>,
) -> std::io::Result<()> {
    let mut header = [0u8; HEADER_LEN];
    loop {
        match combined.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e),
        }

        let decoded = frame::decode_header(&header)
            .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, e))?;
        if decoded.len == 0 {
            continue;
        }

        let mut payload = vec![0u8; decoded.len];
        combined.read_exact(&mut payload).await?;

        let tx = match decoded.tag {
            StreamTag::Stdout => out_tx,
            StreamTag::Stderr => err_tx,
        };
        // A gone consumer is fine; keep draining so frame boundaries stay
        // aligned for the other stream.
        let _ = tx.send(Ok(Bytes::from(payload)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn feed(frames: Vec<Bytes>) -> DemuxStreams {
        let (mut writer, reader) = tokio::io::duplex(64 * 1024);
        let streams = spawn(Box::new(reader));
        for f in frames {
            writer.write_all(&f).await.unwrap();
        }
        drop(writer);
        streams
    }

    #[tokio::test]
    async fn test_split_by_tag() {
        let mut streams = feed(vec![
            frame::encode(StreamTag::Stdout, b"out"),
            frame::encode(StreamTag::Stderr, b"err"),
        ])
        .await;

        assert_eq!(streams.output.recv().await.unwrap().unwrap(), "out");
        assert_eq!(streams.errors.recv().await.unwrap().unwrap(), "err");
        // Clean end-of-stream on both.
        assert!(streams.output.recv().await.is_none());
        assert!(streams.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_order_preserved_within_stream() {
        let mut streams = feed(vec![
            frame::encode(StreamTag::Stdout, b"A"),
            frame::encode(StreamTag::Stderr, b"X"),
            frame::encode(StreamTag::Stdout, b"B"),
        ])
        .await;

        assert_eq!(streams.output.recv().await.unwrap().unwrap(), "A");
        assert_eq!(streams.output.recv().await.unwrap().unwrap(), "B");
        assert!(streams.output.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_truncated_frame_fails_both_streams() {
        let mut bad = frame::encode(StreamTag::Stdout, b"full payload").to_vec();
        bad.truncate(HEADER_LEN + 3);
        let mut streams = feed(vec![Bytes::from(bad)]).await;

        assert!(streams.output.recv().await.unwrap().is_err());
        assert!(streams.errors.recv().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_unknown_tag_fails_both_streams() {
        let mut streams = feed(vec![Bytes::from_static(&[7, 0, 0, 0, 0, 0, 0, 1, b'x'])]).await;
        assert!(streams.output.recv().await.unwrap().is_err());
        assert!(streams.errors.recv().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_empty_frames_are_skipped() {
        let mut streams = feed(vec![
            frame::encode(StreamTag::Stdout, b""),
            frame::encode(StreamTag::Stdout, b"data"),
        ])
        .await;
        assert_eq!(streams.output.recv().await.unwrap().unwrap(), "data");
        assert!(streams.output.recv().await.is_none());
    }
}
