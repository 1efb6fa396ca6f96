use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use log::debug;

use crate::error::{BitmapError, Result};
use crate::helpers::helper::read_u32;
use crate::storage::page_store::PageId;

const REDO_MAGIC: u32 = 0x5244_4F31;
const RECORD_HEADER_SIZE: usize = 4 + 4 + 4 + 4;

/// Single-record full-page-image journal.
///
/// Record layout:
/// ```text
/// [ magic (u32) | page_id (u32) | image_len (u32) | crc32 (u32) | image ]
/// ```
/// The CRC covers `page_id`, `image_len` and the image. A record that fails
/// validation was torn before the in-place write started and is ignored.
pub struct RedoLog {
    path: PathBuf,
    file: File,
}

impl RedoLog {
    /// Journal path for a page file: the same name with `.redo` appended.
    pub fn path_for(store_path: &Path) -> PathBuf {
        let mut name = store_path.as_os_str().to_owned();
        name.push(".redo");
        PathBuf::from(name)
    }

    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| BitmapError::io(format!("open redo journal {}", path.display()), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn checksum(page_id: PageId, image: &[u8]) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&page_id.to_le_bytes());
        hasher.update(&(image.len() as u32).to_le_bytes());
        hasher.update(image);
        hasher.finalize()
    }

    /// Durably records the new image of `page_id`, replacing any previous record.
    pub fn log_page(&mut self, page_id: PageId, image: &[u8]) -> Result<()> {
        let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + image.len());
        record.extend_from_slice(&REDO_MAGIC.to_le_bytes());
        record.extend_from_slice(&page_id.to_le_bytes());
        record.extend_from_slice(&(image.len() as u32).to_le_bytes());
        record.extend_from_slice(&Self::checksum(page_id, image).to_le_bytes());
        record.extend_from_slice(image);

        let context = || format!("log page {page_id} to {}", self.path.display());
        self.file.set_len(0).map_err(|e| BitmapError::io(context(), e))?;
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&record))
            .and_then(|_| self.file.sync_data())
            .map_err(|e| BitmapError::io(context(), e))?;

        debug!("redo: logged page {} ({} bytes)", page_id, image.len());
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.file
            .set_len(0)
            .and_then(|_| self.file.sync_data())
            .map_err(|e| BitmapError::io(format!("clear redo journal {}", self.path.display()), e))
    }

    /// Returns the logged page image if the journal holds a complete record.
    pub fn pending(&mut self) -> Result<Option<(PageId, Vec<u8>)>> {
        let mut buf = Vec::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_end(&mut buf))
            .map_err(|e| BitmapError::io(format!("read redo journal {}", self.path.display()), e))?;

        if buf.len() < RECORD_HEADER_SIZE {
            return Ok(None);
        }

        let (Some(magic), Some(page_id), Some(image_len), Some(crc)) = (
            read_u32(&buf, 0),
            read_u32(&buf, 4),
            read_u32(&buf, 8),
            read_u32(&buf, 12),
        ) else {
            return Ok(None);
        };

        let image = &buf[RECORD_HEADER_SIZE..];
        if magic != REDO_MAGIC
            || image.len() != image_len as usize
            || Self::checksum(page_id, image) != crc
        {
            debug!("redo: ignoring torn journal record");
            return Ok(None);
        }

        Ok(Some((page_id, image.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logged_page_is_pending_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut redo = RedoLog::open(&dir.path().join("index.redo")).unwrap();
        assert!(redo.pending().unwrap().is_none());

        redo.log_page(3, &[9u8; 64]).unwrap();
        let (page_id, image) = redo.pending().unwrap().unwrap();
        assert_eq!(page_id, 3);
        assert_eq!(image, vec![9u8; 64]);

        redo.clear().unwrap();
        assert!(redo.pending().unwrap().is_none());
    }

    #[test]
    fn torn_record_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.redo");
        let mut redo = RedoLog::open(&path).unwrap();
        redo.log_page(1, &[5u8; 64]).unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        redo.file.set_len(len - 10).unwrap();
        assert!(redo.pending().unwrap().is_none());
    }

    #[test]
    fn journal_path_appends_suffix() {
        let path = RedoLog::path_for(Path::new("/tmp/idx.fbmp"));
        assert_eq!(path, PathBuf::from("/tmp/idx.fbmp.redo"));
    }
}
