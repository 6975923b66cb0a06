//! # Read-Only File System
//!
//! A flat directory of at most 63 files in an image of 4 KiB blocks:
//!
//! ```text
//! block 0                 boot block
//!   0..4     dir count
//!   4..8     inode count  (N)
//!   8..12    data-block count (D)
//!   12..64   reserved
//!   64..     63 dentries x 64 bytes: name[32], type u32, inode u32, reserved[24]
//! block 1..=N             inodes: length u32, data-block index u32 x 1023
//! block N+1..=N+D         data blocks
//! ```
//!
//! All integers are little-endian. File names are up to 32 bytes and are not
//! NUL-terminated when they use all 32.

pub const BLOCK_SIZE: usize = 4096;
pub const NAME_LEN: usize = 32;
pub const MAX_DENTRIES: usize = 63;

const DENTRY_SIZE: usize = 64;
const DENTRY_TABLE_OFFSET: usize = 64;
const BLOCKS_PER_INODE: usize = BLOCK_SIZE / 4 - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    BadIndex,
    BadInode,
    Corrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

impl FileType {
    fn from_raw(raw: u32) -> Result<Self, FsError> {
        match raw {
            0 => Ok(Self::Rtc),
            1 => Ok(Self::Directory),
            2 => Ok(Self::Regular),
            _ => Err(FsError::Corrupt),
        }
    }

    pub fn as_raw(self) -> u32 {
        match self {
            Self::Rtc => 0,
            Self::Directory => 1,
            Self::Regular => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    name: [u8; NAME_LEN],
    pub file_type: FileType,
    pub inode: u32,
}

impl DirEntry {
    pub fn name(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FileSystem<'a> {
    image: &'a [u8],
    dir_count: u32,
    inode_count: u32,
    data_block_count: u32,
}

impl<'a> FileSystem<'a> {
    /// Validates the boot block and the image size.
    pub fn mount(image: &'a [u8]) -> Result<Self, FsError> {
        if image.len() < BLOCK_SIZE {
            return Err(FsError::Corrupt);
        }
        let dir_count = read_u32(image, 0);
        let inode_count = read_u32(image, 4);
        let data_block_count = read_u32(image, 8);
        let blocks = 1 + inode_count as usize + data_block_count as usize;
        if dir_count as usize > MAX_DENTRIES || image.len() < blocks * BLOCK_SIZE {
            return Err(FsError::Corrupt);
        }
        Ok(Self {
            image,
            dir_count,
            inode_count,
            data_block_count,
        })
    }

    pub fn dir_count(&self) -> u32 {
        self.dir_count
    }

    pub fn read_dentry_by_name(&self, name: &[u8]) -> Result<DirEntry, FsError> {
        if name.is_empty() || name.len() > NAME_LEN {
            return Err(FsError::NotFound);
        }
        for index in 0..self.dir_count {
            let entry = self.read_dentry_by_index(index)?;
            if entry.name() == name {
                return Ok(entry);
            }
        }
        Err(FsError::NotFound)
    }

    pub fn read_dentry_by_index(&self, index: u32) -> Result<DirEntry, FsError> {
        if index >= self.dir_count {
            return Err(FsError::BadIndex);
        }
        let at = DENTRY_TABLE_OFFSET + index as usize * DENTRY_SIZE;
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&self.image[at..at + NAME_LEN]);
        Ok(DirEntry {
            name,
            file_type: FileType::from_raw(read_u32(self.image, at + NAME_LEN))?,
            inode: read_u32(self.image, at + NAME_LEN + 4),
        })
    }

    /// Size in bytes of the file behind `inode`.
    pub fn file_length(&self, inode: u32) -> Result<u32, FsError> {
        Ok(read_u32(self.image, self.inode_offset(inode)?))
    }

    /// Copies file bytes starting at `offset` into `buf`.
    ///
    /// Returns the number of bytes copied; 0 at or past the end of file.
    pub fn read_data(&self, inode: u32, offset: u32, buf: &mut [u8]) -> Result<usize, FsError> {
        let inode_at = self.inode_offset(inode)?;
        let length = read_u32(self.image, inode_at) as usize;
        let offset = offset as usize;
        if offset >= length {
            return Ok(0);
        }
        let total = buf.len().min(length - offset);

        let mut copied = 0;
        while copied < total {
            let pos = offset + copied;
            let slot = pos / BLOCK_SIZE;
            if slot >= BLOCKS_PER_INODE {
                return Err(FsError::Corrupt);
            }
            let block = read_u32(self.image, inode_at + 4 + slot * 4);
            if block >= self.data_block_count {
                return Err(FsError::Corrupt);
            }
            let block_at = (1 + self.inode_count as usize + block as usize) * BLOCK_SIZE;
            let within = pos % BLOCK_SIZE;
            let n = (BLOCK_SIZE - within).min(total - copied);
            buf[copied..copied + n]
                .copy_from_slice(&self.image[block_at + within..block_at + within + n]);
            copied += n;
        }
        Ok(copied)
    }

    fn inode_offset(&self, inode: u32) -> Result<usize, FsError> {
        if inode >= self.inode_count {
            return Err(FsError::BadInode);
        }
        Ok((1 + inode as usize) * BLOCK_SIZE)
    }
}

fn read_u32(image: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&image[at..at + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FsImageBuilder;

    fn sample() -> &'static [u8] {
        let big: std::vec::Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        FsImageBuilder::new()
            .directory(".")
            .rtc("rtc")
            .file("frame0.txt", b"fish")
            .file("verylargetextwithverylongname.tx", &big)
            .build()
    }

    #[test]
    fn test_mount_rejects_truncated_image() {
        let image = sample();
        assert_eq!(FileSystem::mount(&image[..100]).err(), Some(FsError::Corrupt));
        assert_eq!(
            FileSystem::mount(&image[..image.len() - 1]).err(),
            Some(FsError::Corrupt)
        );
    }

    #[test]
    fn test_lookup_by_name_and_index() {
        let fs = FileSystem::mount(sample()).unwrap();
        assert_eq!(fs.dir_count(), 4);
        let dot = fs.read_dentry_by_index(0).unwrap();
        assert_eq!(dot.name(), b".");
        assert_eq!(dot.file_type, FileType::Directory);
        assert_eq!(fs.read_dentry_by_name(b"rtc").unwrap().file_type, FileType::Rtc);
        assert_eq!(fs.read_dentry_by_index(4).err(), Some(FsError::BadIndex));
        assert_eq!(fs.read_dentry_by_name(b"frame1.txt").err(), Some(FsError::NotFound));
        assert_eq!(fs.read_dentry_by_name(b"frame0").err(), Some(FsError::NotFound));
    }

    #[test]
    fn test_full_length_name() {
        let fs = FileSystem::mount(sample()).unwrap();
        let name = b"verylargetextwithverylongname.tx";
        assert_eq!(name.len(), NAME_LEN);
        let e = fs.read_dentry_by_name(name).unwrap();
        assert_eq!(e.name(), name);
        assert_eq!(
            fs.read_dentry_by_name(b"verylargetextwithverylongname.txt").err(),
            Some(FsError::NotFound)
        );
    }

    #[test]
    fn test_read_data_across_blocks() {
        let fs = FileSystem::mount(sample()).unwrap();
        let e = fs.read_dentry_by_name(b"verylargetextwithverylongname.tx").unwrap();
        assert_eq!(fs.file_length(e.inode).unwrap(), 10_000);

        let mut buf = [0u8; 200];
        let n = fs.read_data(e.inode, 4000, &mut buf).unwrap();
        assert_eq!(n, 200);
        for (i, b) in buf.iter().enumerate() {
            assert_eq!(*b, ((4000 + i) % 251) as u8);
        }

        let n = fs.read_data(e.inode, 9_950, &mut buf).unwrap();
        assert_eq!(n, 50);
        assert_eq!(fs.read_data(e.inode, 10_000, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_bad_inode() {
        let fs = FileSystem::mount(sample()).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fs.read_data(99, 0, &mut buf).err(), Some(FsError::BadInode));
    }
}
