use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PagerError {
    #[error("failed to seek to page offset: {0}")]
    Seek(#[source] std::io::Error),
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reads fixed-size pages out of a single-file database. Page numbers are
/// 1-based; page 1 is returned whole, including its 100-byte file header —
/// callers that need the B-tree header on page 1 account for that offset
/// themselves.
#[derive(Debug)]
pub struct Pager {
    file: File,
    page_size: u32,
}

impl Pager {
    pub fn open(path: &str, page_size: u32) -> Result<Self, PagerError> {
        Ok(Pager {
            file: File::open(path)?,
            page_size,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn read_page(&mut self, page_number: u32) -> Result<Vec<u8>, PagerError> {
        let offset = (page_number as u64 - 1) * self.page_size as u64;
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(PagerError::Seek)?;

        let mut buffer = vec![0u8; self.page_size as usize];
        let got = self.file.read(&mut buffer)?;
        if got != buffer.len() {
            return Err(PagerError::ShortRead {
                expected: buffer.len(),
                got,
            });
        }

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_file(contents: &[u8]) -> std::path::PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let unique = COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut path = std::env::temp_dir();
        path.push(format!(
            "pagequery-pager-test-{}-{}",
            std::process::id(),
            unique
        ));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    #[test]
    fn reads_page_at_correct_offset() {
        let mut contents = vec![0u8; 8];
        contents.extend(vec![1u8; 8]);
        let path = write_temp_file(&contents);

        let mut pager = Pager::open(path.to_str().unwrap(), 8).unwrap();
        assert_eq!(pager.read_page(1).unwrap(), vec![0u8; 8]);
        assert_eq!(pager.read_page(2).unwrap(), vec![1u8; 8]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn short_read_past_eof_errors() {
        let contents = vec![0u8; 8];
        let path = write_temp_file(&contents);

        let mut pager = Pager::open(path.to_str().unwrap(), 8).unwrap();
        assert!(pager.read_page(1).is_ok());
        assert!(matches!(
            pager.read_page(2),
            Err(PagerError::ShortRead { .. })
        ));

        std::fs::remove_file(path).ok();
    }
}
