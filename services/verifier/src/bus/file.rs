use super::{Delivery, ReplaySource};
use crate::error::BusError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Replays a file, one message per non-blank line. Acks are no-ops.
pub struct FileReplaySource {
    path: PathBuf,
    reader: BufReader<File>,
    line: Vec<u8>,
    sequence: u64,
}

impl FileReplaySource {
    pub async fn open(path: &Path) -> Result<Self, BusError> {
        let file = File::open(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line: Vec::with_capacity(512),
            sequence: 0,
        })
    }
}

#[async_trait]
impl ReplaySource for FileReplaySource {
    async fn next_delivery(&mut self) -> Result<Option<Delivery>, BusError> {
        loop {
            self.line.clear();
            if self.reader.read_until(b'\n', &mut self.line).await? == 0 {
                return Ok(None);
            }
            let text = self.line.trim_ascii();
            if text.is_empty() {
                continue;
            }
            self.sequence += 1;
            return Ok(Some(Delivery::new(self.sequence, text.to_vec(), None)));
        }
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_lines_become_deliveries() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "8=FIX.4.2|55=A|\n\n   \n8=FIX.4.2|55=B|").unwrap();

        let mut source = FileReplaySource::open(file.path()).await.unwrap();
        let first = source.next_delivery().await.unwrap().unwrap();
        assert_eq!(first.sequence(), 1);
        assert_eq!(first.payload(), b"8=FIX.4.2|55=A|");
        first.ack();

        let second = source.next_delivery().await.unwrap().unwrap();
        assert_eq!(second.sequence(), 2);
        assert_eq!(second.payload(), b"8=FIX.4.2|55=B|");

        assert!(source.next_delivery().await.unwrap().is_none());
    }
}
