// Capture feed abstraction. The capture mechanism itself lives outside this crate;
// it hands over decoded packets through one of these adapters.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;

use crate::error::CaptureError;
use crate::models::DecodedPacket;

/// A live sequence of decoded packets. `Ok(None)` means the feed has ended.
pub trait CaptureFeed: Send {
    fn next_packet(
        &mut self,
    ) -> impl Future<Output = Result<Option<DecodedPacket>, CaptureError>> + Send;

    /// Input the feed discarded as undecodable so far.
    fn skipped(&self) -> u64 {
        0
    }
}

/// In-process feed: a capture thread pushes packets into an mpsc channel.
/// Dropping every sender ends the feed.
pub struct ChannelFeed {
    rx: mpsc::Receiver<DecodedPacket>,
}

impl ChannelFeed {
    pub fn new(rx: mpsc::Receiver<DecodedPacket>) -> Self {
        Self { rx }
    }

    /// Feed plus the sender half for the capture side.
    pub fn channel(capacity: usize) -> (mpsc::Sender<DecodedPacket>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

impl CaptureFeed for ChannelFeed {
    async fn next_packet(&mut self) -> Result<Option<DecodedPacket>, CaptureError> {
        Ok(self.rx.recv().await)
    }
}

/// One JSON-encoded `DecodedPacket` per line (file, pipe or stdin).
/// Blank and malformed lines are skipped; read errors end the session.
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
    line_no: u64,
    skipped: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send> CaptureFeed for JsonLinesFeed<R> {
    async fn next_packet(&mut self) -> Result<Option<DecodedPacket>, CaptureError> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<DecodedPacket>(line) {
                Ok(packet) => return Ok(Some(packet)),
                Err(e) => {
                    self.skipped += 1;
                    tracing::warn!(
                        error = %e,
                        line = self.line_no,
                        operation = "parse_packet",
                        "skipping malformed packet line"
                    );
                }
            }
        }
        Ok(None)
    }

    fn skipped(&self) -> u64 {
        self.skipped
    }
}
