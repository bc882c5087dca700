use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use super::{SourceError, StreamSource};

/// Replays JSON-lines, one message per line. Blank lines are empty polls.
pub struct ReplaySource<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin + Send> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

impl ReplaySource<File> {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        Ok(Self::new(File::open(path).await?))
    }
}

impl ReplaySource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> StreamSource for ReplaySource<R> {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, SourceError> {
        match tokio::time::timeout(timeout, self.lines.next_line()).await {
            Err(_) => Ok(None),
            Ok(Ok(Some(line))) if line.trim().is_empty() => Ok(None),
            Ok(Ok(Some(line))) => Ok(Some(line.into_bytes())),
            Ok(Ok(None)) => Err(SourceError::Exhausted),
            Ok(Err(err)) => Err(SourceError::Io(err)),
        }
    }
}
