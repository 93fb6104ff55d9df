pub mod protocol;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::BridgeError;

/// How long the input must stay quiet before the post-reset drain stops.
const DRAIN_QUIET: Duration = Duration::from_millis(50);

/// A stream of controller lines.
///
/// `Ok(None)` means the link closed cleanly. An `Err` is a stream fault and
/// ends the dispatch loop.
#[async_trait]
pub trait LineSource: Send {
    async fn next_line(&mut self) -> Result<Option<String>, BridgeError>;
}

/// Line source over any buffered async reader (serial device, stdin, pipe).
pub struct ReaderLineSource<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin + Send> ReaderLineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(128),
        }
    }

    /// Throw away whatever is already buffered (boot banner, lines queued
    /// while the controller reset). Stops once nothing arrives for `quiet`
    /// or the input ends. Returns the number of bytes dropped.
    pub async fn discard_pending(&mut self, quiet: Duration) -> Result<usize, BridgeError> {
        let mut dropped = 0;
        loop {
            let n = match timeout(quiet, self.reader.fill_buf()).await {
                Err(_) => break,
                Ok(res) => res.map_err(BridgeError::Stream)?.len(),
            };
            if n == 0 {
                break;
            }
            self.reader.consume(n);
            dropped += n;
        }
        Ok(dropped)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> LineSource for ReaderLineSource<R> {
    async fn next_line(&mut self) -> Result<Option<String>, BridgeError> {
        self.buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.buf)
            .await
            .map_err(BridgeError::Stream)?;

        if n == 0 {
            return Ok(None);
        }

        // The controller occasionally emits garbage while resetting
        let line = String::from_utf8_lossy(&self.buf);
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Boxed reader so a device and stdin share one concrete source type.
pub type DeviceLineSource = ReaderLineSource<BufReader<Box<dyn tokio::io::AsyncRead + Unpin + Send>>>;

/// Open the controller link.
///
/// `-` reads from stdin (pipe `controller-sim` into the bridge). Anything else
/// is opened as a character device; line settings (baud, 8N1) are expected to
/// be applied by the system, e.g. `stty -F /dev/ttyACM0 115200 raw`.
/// `settle` gives the controller time to finish its reset after the port
/// opens.
pub async fn open_device(path: &Path, settle: Duration) -> Result<DeviceLineSource, BridgeError> {
    if path == Path::new("-") {
        info!("Reading controller lines from stdin");
        let stdin: Box<dyn tokio::io::AsyncRead + Unpin + Send> = Box::new(tokio::io::stdin());
        return Ok(ReaderLineSource::new(BufReader::new(stdin)));
    }

    let file = tokio::fs::OpenOptions::new()
        .read(true)
        .open(path)
        .await
        .map_err(BridgeError::Stream)?;
    info!("Opened controller link {}", path.display());

    let device: Box<dyn tokio::io::AsyncRead + Unpin + Send> = Box::new(file);
    let mut source = ReaderLineSource::new(BufReader::new(device));

    if !settle.is_zero() {
        debug!("Waiting {:?} for controller to settle", settle);
        tokio::time::sleep(settle).await;
        let dropped = source.discard_pending(DRAIN_QUIET).await?;
        debug!("Discarded {} stale bytes from controller link", dropped);
    }

    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_reads_lines_until_eof() {
        let input: &[u8] = b"Data:1,2,3,4,5,6,7,8\r\nLoaded\nPump:";
        let mut source = ReaderLineSource::new(input);

        assert_eq!(
            assert_ok!(source.next_line().await),
            Some("Data:1,2,3,4,5,6,7,8".to_string())
        );
        assert_eq!(assert_ok!(source.next_line().await), Some("Loaded".to_string()));
        assert_eq!(assert_ok!(source.next_line().await), Some("Pump:".to_string()));
        assert_eq!(assert_ok!(source.next_line().await), None);
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_lossy() {
        let input: &[u8] = b"Lo\xffaded\n";
        let mut source = ReaderLineSource::new(input);
        let line = source.next_line().await.unwrap().unwrap();
        assert_eq!(line, "Lo\u{fffd}aded");
    }

    #[tokio::test]
    async fn test_missing_device_is_stream_fault() {
        let result = open_device(Path::new("/nonexistent/ttyACM9"), Duration::ZERO).await;
        assert!(matches!(result, Err(BridgeError::Stream(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_pending_drops_stale_lines() {
        let (mut controller, link) = tokio::io::duplex(256);
        let mut source = ReaderLineSource::new(BufReader::new(link));

        controller.write_all(b"GIGA R1 ready
Loaded
").await.unwrap();
        let dropped = assert_ok!(source.discard_pending(DRAIN_QUIET).await);
        assert_eq!(dropped, 23);

        controller.write_all(b"Pump:
").await.unwrap();
        assert_eq!(assert_ok!(source.next_line().await), Some("Pump:".to_string()));
    }

    #[tokio::test]
    async fn test_discard_pending_stops_at_eof() {
        let input: &[u8] = b"Loaded
";
        let mut source = ReaderLineSource::new(input);
        assert_eq!(assert_ok!(source.discard_pending(DRAIN_QUIET).await), 7);
        assert_eq!(assert_ok!(source.next_line().await), None);
    }
}
