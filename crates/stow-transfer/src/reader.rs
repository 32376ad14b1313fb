//! Presents a manifest as one byte stream with file-boundary reporting.

use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::TRACING_TARGET_READER;
use crate::error::{TransferError, TransferResult};
use crate::manifest::Manifest;

/// Outcome of a single [`ManifestReader::read`] call, carrying the number of
/// bytes written into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// The buffer was filled and the current file has more data.
    ShortBuffer(usize),
    /// The current file ended and further files follow.
    More(usize),
    /// The final file ended; the stream is drained.
    Exhausted(usize),
}

impl ReadStatus {
    pub fn len(&self) -> usize {
        match *self {
            Self::ShortBuffer(n) | Self::More(n) | Self::Exhausted(n) => n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether no more data will ever be produced.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Exhausted(_))
    }
}

/// Position of a reader within its manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferCursor {
    /// Index into [`Manifest::entries`].
    pub file_index: usize,
    /// Offset within the current file.
    pub offset: u64,
    /// Bytes produced so far across all files.
    pub total: u64,
}

struct OpenFile {
    file: File,
    len: u64,
}

/// Sequential reader over every data file of a [`Manifest`].
///
/// A reader is single-use: once it reports [`ReadStatus::Exhausted`] every
/// further call returns `Exhausted(0)`.
pub struct ManifestReader {
    manifest: Manifest,
    cursor: TransferCursor,
    current: Option<OpenFile>,
    drained: bool,
}

impl ManifestReader {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            cursor: TransferCursor::default(),
            current: None,
            drained: false,
        }
    }

    pub fn cursor(&self) -> TransferCursor {
        self.cursor
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Reads the next segment of the current file into `buf`.
    ///
    /// A segment never crosses a file boundary. Local read failures are fatal.
    /// The file length is re-read whenever the recorded one would end the
    /// file within this segment, so data appended during the transfer is
    /// included; a file that shrinks fails with an i/o error.
    pub async fn read(&mut self, buf: &mut [u8]) -> TransferResult<ReadStatus> {
        if buf.is_empty() {
            return Err(TransferError::InvalidConfig(
                "read buffer must have a positive capacity".into(),
            ));
        }
        if self.manifest.is_root_marker(self.cursor.file_index) {
            self.cursor.file_index += 1;
        }
        if self.drained || self.cursor.file_index >= self.manifest.entries().len() {
            self.drained = true;
            return Ok(ReadStatus::Exhausted(0));
        }

        let path = self.manifest.entries()[self.cursor.file_index].clone();
        let mut current = match self.current.take() {
            Some(current) => current,
            None => {
                let file = File::open(&path)
                    .await
                    .map_err(|e| TransferError::io(&path, e))?;
                let len = file
                    .metadata()
                    .await
                    .map_err(|e| TransferError::io(&path, e))?
                    .len();
                tracing::debug!(
                    target: TRACING_TARGET_READER,
                    path = %path.display(),
                    len,
                    "opened manifest file"
                );
                OpenFile { file, len }
            }
        };

        let capacity = buf.len() as u64;
        if current.len - self.cursor.offset < capacity {
            let len = current
                .file
                .metadata()
                .await
                .map_err(|e| TransferError::io(&path, e))?
                .len();
            if len > current.len {
                tracing::debug!(
                    target: TRACING_TARGET_READER,
                    path = %path.display(),
                    from = current.len,
                    to = len,
                    "manifest file grew while reading"
                );
                current.len = len;
            }
        }
        let remaining = current.len - self.cursor.offset;
        if remaining >= capacity {
            current
                .file
                .read_exact(buf)
                .await
                .map_err(|e| TransferError::io(&path, e))?;
            self.cursor.offset += capacity;
            self.cursor.total += capacity;
            self.current = Some(current);
            return Ok(ReadStatus::ShortBuffer(buf.len()));
        }

        // remaining < capacity, so it fits in usize
        let n = remaining as usize;
        current
            .file
            .read_exact(&mut buf[..n])
            .await
            .map_err(|e| TransferError::io(&path, e))?;
        self.cursor.total += remaining;
        self.cursor.offset = 0;
        self.cursor.file_index += 1;

        if self.cursor.file_index >= self.manifest.entries().len() {
            self.drained = true;
            Ok(ReadStatus::Exhausted(n))
        } else {
            Ok(ReadStatus::More(n))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    async fn drain(reader: &mut ManifestReader, cap: usize) -> (Vec<ReadStatus>, Vec<u8>) {
        let mut buf = vec![0u8; cap];
        let mut statuses = Vec::new();
        let mut out = Vec::new();
        loop {
            let status = reader.read(&mut buf).await.unwrap();
            out.extend_from_slice(&buf[..status.len()]);
            statuses.push(status);
            if status.is_final() {
                return (statuses, out);
            }
        }
    }

    #[tokio::test]
    async fn data_appended_while_reading_is_included() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", &[b'A'; 6]);
        let mut reader = ManifestReader::new(Manifest::from_files([a.clone()]));
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).await.unwrap(), ReadStatus::ShortBuffer(4));

        let mut file = std::fs::OpenOptions::new().append(true).open(&a).unwrap();
        std::io::Write::write_all(&mut file, &[b'B'; 4]).unwrap();
        drop(file);

        let (statuses, out) = drain(&mut reader, 4).await;
        assert_eq!(
            statuses,
            vec![ReadStatus::ShortBuffer(4), ReadStatus::Exhausted(2)]
        );
        assert_eq!(out, b"AABBBB");
        assert_eq!(reader.cursor().total, 10);
    }

    #[tokio::test]
    async fn truncated_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", &[b'A'; 10]);
        let mut reader = ManifestReader::new(Manifest::from_files([a.clone()]));
        let mut buf = [0u8; 4];
        reader.read(&mut buf).await.unwrap();

        std::fs::OpenOptions::new()
            .write(true)
            .open(&a)
            .unwrap()
            .set_len(2)
            .unwrap();
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
    }

    #[tokio::test]
    async fn single_file_is_split_into_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", &[b'A'; 10]);

        let mut reader = ManifestReader::new(Manifest::from_files([a]));
        let (statuses, out) = drain(&mut reader, 4).await;
        assert_eq!(
            statuses,
            vec![
                ReadStatus::ShortBuffer(4),
                ReadStatus::ShortBuffer(4),
                ReadStatus::Exhausted(2),
            ]
        );
        assert_eq!(out, vec![b'A'; 10]);
        assert_eq!(reader.cursor().total, 10);
    }

    #[tokio::test]
    async fn file_boundaries_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"hello");
        let b = write(&dir, "b", b"world!");

        let mut reader = ManifestReader::new(Manifest::from_files([a, b]));
        let (statuses, out) = drain(&mut reader, 4).await;
        assert_eq!(
            statuses,
            vec![
                ReadStatus::ShortBuffer(4),
                ReadStatus::More(1),
                ReadStatus::ShortBuffer(4),
                ReadStatus::Exhausted(2),
            ]
        );
        assert_eq!(out, b"helloworld!");
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_segment() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a", b"abcd");

        let mut reader = ManifestReader::new(Manifest::from_files([a]));
        let (statuses, _) = drain(&mut reader, 4).await;
        assert_eq!(
            statuses,
            vec![ReadStatus::ShortBuffer(4), ReadStatus::Exhausted(0)]
        );
    }

    #[tokio::test]
    async fn root_marker_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "a", b"xyz");

        let mut reader = ManifestReader::new(Manifest::from_dir(dir.path()).unwrap());
        let (statuses, out) = drain(&mut reader, 8).await;
        assert_eq!(statuses, vec![ReadStatus::Exhausted(3)]);
        assert_eq!(out, b"xyz");
    }

    #[tokio::test]
    async fn drained_reader_stays_drained() {
        let mut reader = ManifestReader::new(Manifest::default());
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).await.unwrap(), ReadStatus::Exhausted(0));
        assert_eq!(reader.read(&mut buf).await.unwrap(), ReadStatus::Exhausted(0));
    }

    #[tokio::test]
    async fn missing_file_is_fatal() {
        let mut reader = ManifestReader::new(Manifest::from_files(["/no/such/file"]));
        let mut buf = [0u8; 4];
        let err = reader.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransferError::Io { .. }));
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let mut reader = ManifestReader::new(Manifest::default());
        assert!(reader.read(&mut []).await.is_err());
    }
}
