use crate::errors::Error;
use crate::pages::{PageId, PAGE_SIZE};
use anyhow::{bail, Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg(test)]
pub fn test_path() -> String {
    use uuid::Uuid;

    std::fs::create_dir_all("data/test").unwrap();
    format!("data/test/{}", Uuid::new_v4())
}

/// Handle over a single file of [`PAGE_SIZE`]-byte blocks. The file stays
/// open for the lifetime of the handle; block `n` lives at byte offset
/// `n * PAGE_SIZE`.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    total_pages: usize,
    path: String,
}

impl DiskManager {
    /// Creates the file with a single zeroed block for page 0.
    pub fn create(path: &str) -> Result<Self> {
        if let Some(dir) = Path::new(path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("creating page file {path}"))?;

        file.write_all(&[0u8; PAGE_SIZE])?;

        Ok(Self {
            file,
            total_pages: 1,
            path: path.to_string(),
        })
    }

    pub fn open(path: &str) -> Result<Self> {
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(_) => bail!(Error::FileNotFound(path.to_string())),
        };

        let total_pages = file.metadata()?.len() as usize / PAGE_SIZE;

        Ok(Self {
            file,
            total_pages,
            path: path.to_string(),
        })
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn read_block(&mut self, page_id: PageId, buf: &mut [u8; PAGE_SIZE]) -> Result<()> {
        if page_id < 0 || page_id as usize >= self.total_pages {
            bail!(Error::ReadNonExistingPage(page_id));
        }

        self.file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        self.file
            .read_exact(buf)
            .with_context(|| format!("reading block {page_id}"))?;

        Ok(())
    }

    pub fn write_block(&mut self, page_id: PageId, buf: &[u8; PAGE_SIZE]) -> Result<()> {
        if page_id < 0 || page_id as usize >= self.total_pages {
            bail!(Error::WriteFailed(page_id));
        }

        self.file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        self.file
            .write_all(buf)
            .with_context(|| format!("writing block {page_id}"))?;

        Ok(())
    }

    pub fn append_empty_block(&mut self) -> Result<()> {
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.total_pages += 1;

        Ok(())
    }

    /// Grows the file with zeroed blocks until it holds at least `n` pages.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        while self.total_pages < n {
            self.append_empty_block()?;
        }

        Ok(())
    }

    pub fn destroy(path: &str) -> Result<()> {
        if !Path::new(path).exists() {
            bail!(Error::FileNotFound(path.to_string()));
        }

        std::fs::remove_file(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn test_create_then_open() -> Result<()> {
        let path = test_path();

        let disk = DiskManager::create(&path)?;
        assert_eq!(disk.total_pages(), 1);
        drop(disk);

        let disk = DiskManager::open(&path)?;
        assert_eq!(disk.total_pages(), 1);

        DiskManager::destroy(&path)?;
        Ok(())
    }

    #[test]
    fn test_open_missing_file() {
        let err = DiskManager::open("data/test/does-not-exist").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_write_then_read_block() -> Result<()> {
        let path = test_path();
        let mut disk = DiskManager::create(&path)?;

        disk.ensure_capacity(3)?;
        assert_eq!(disk.total_pages(), 3);

        let mut block = [0u8; PAGE_SIZE];
        block[0] = 0xde;
        block[PAGE_SIZE - 1] = 0xad;
        disk.write_block(2, &block)?;

        let mut read = [0u8; PAGE_SIZE];
        disk.read_block(2, &mut read)?;
        assert_eq!(read, block);

        // the block in between stayed zeroed
        disk.read_block(1, &mut read)?;
        assert_eq!(read, [0u8; PAGE_SIZE]);

        DiskManager::destroy(&path)?;
        Ok(())
    }

    #[test]
    fn test_read_past_end_fails() -> Result<()> {
        let path = test_path();
        let mut disk = DiskManager::create(&path)?;

        let mut buf = [0u8; PAGE_SIZE];
        let err = disk.read_block(1, &mut buf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::ReadNonExistingPage(1))
        ));

        let err = disk.write_block(5, &buf).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::WriteFailed(5))
        ));

        DiskManager::destroy(&path)?;
        Ok(())
    }
}
