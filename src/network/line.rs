/// Line-oriented text transport over any async byte stream
///
/// `LineReader` owns the read half and yields one line per call.
/// `Output` is a cloneable handle to the write half; every write takes an
/// async mutex for its whole duration, so lines written from different
/// places never interleave mid-line.

use crate::error::{MudError, Result};
use crate::network::ansi::{colorize, Color, ColorMode, CLEAR_LINE};
use std::sync::Arc;
use tokio::io::{
    self, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
};
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// How a received line is cleaned up before use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Trim whitespace and strip control characters
    #[default]
    Clean,

    /// Strip the terminator and control characters, keeping spacing
    Raw,
}

/// Buffered line reader with a hard length limit
pub struct LineReader<R> {
    reader: BufReader<R>,
    max_length: usize,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(reader: R, max_length: usize) -> Self {
        Self {
            reader: BufReader::new(reader),
            max_length,
        }
    }

    /// Read the next line
    ///
    /// # Errors
    /// - `MudError::ConnectionClosed`: the peer closed the stream
    /// - `MudError::LineTooLong`: the line, without its terminator, is over the limit
    /// - `MudError::Io`: the read itself failed
    pub async fn read_line(&mut self, mode: InputMode) -> Result<String> {
        let mut buffer = Vec::new();
        // Room for the longest allowed line plus "\r\n"
        let limit = self.max_length as u64 + 2;

        let n = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut buffer)
            .await?;

        if n == 0 {
            debug!("Peer closed the connection");
            return Err(MudError::ConnectionClosed);
        }

        let body = buffer.strip_suffix(b"\n").unwrap_or(&buffer[..]);
        let length = body.strip_suffix(b"\r").unwrap_or(body).len();
        if length > self.max_length {
            warn!("Rejecting line longer than {} bytes", self.max_length);
            return Err(MudError::LineTooLong {
                length,
                max: self.max_length,
            });
        }

        let text = String::from_utf8_lossy(&buffer);
        let line = clean_line(&text, mode);
        trace!("Read line ({} bytes)", line.len());
        Ok(line)
    }
}

fn clean_line(text: &str, mode: InputMode) -> String {
    let text = text.trim_end_matches(['\n', '\r']);
    match mode {
        InputMode::Raw => text.chars().filter(|c| !c.is_control()).collect(),
        InputMode::Clean => text.trim().chars().filter(|c| !c.is_control()).collect(),
    }
}

/// A peer that went away is a closed connection, not an I/O fault
fn write_error(e: std::io::Error) -> MudError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => MudError::ConnectionClosed,
        _ => MudError::Io(e),
    }
}

type SharedWriter = Arc<Mutex<Box<dyn AsyncWrite + Send + Unpin>>>;

/// Shared write half of a connection
#[derive(Clone)]
pub struct Output {
    writer: SharedWriter,
    color: ColorMode,
}

impl Output {
    pub fn new(writer: impl AsyncWrite + Send + Unpin + 'static, color: ColorMode) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            color,
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color
    }

    /// Write `text` as-is and flush
    pub async fn write_str(&self, text: &str) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(text.as_bytes()).await.map_err(write_error)?;
        writer.flush().await.map_err(write_error)?;
        Ok(())
    }

    /// Write `text` followed by CRLF
    pub async fn write_line(&self, text: &str) -> Result<()> {
        self.write_str(&format!("{}\r\n", text)).await
    }

    pub async fn write_colored(&self, color: Color, text: &str) -> Result<()> {
        self.write_line(&colorize(self.color, color, text)).await
    }

    /// Clear the current line, print `text`, then reprint `prompt`, as one
    /// write so nothing can land in between
    pub async fn interrupt(&self, text: &str, prompt: &str) -> Result<()> {
        self.write_str(&format!("{}{}\r\n{}", CLEAR_LINE, text, prompt)).await
    }

    /// Shut down the write half
    pub async fn close(&self) -> Result<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Split a bidirectional stream into a line reader and a shared output
pub fn line_transport<S>(stream: S, max_length: usize, color: ColorMode) -> (LineReader<ReadHalf<S>>, Output)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, writer) = io::split(stream);
    (LineReader::new(reader, max_length), Output::new(writer, color))
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").field("color", &self.color).finish_non_exhaustive()
    }
}
