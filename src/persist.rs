//! Binary persistence for trees over fixed-width payload types.
//!
//! The on-disk layout is a fixed little-endian header followed by every
//! key-value pair in ascending key order, key first, tightly packed:
//!
//! | offset | width | field |
//! |--------|-------|----------------------------------|
//! | 0      | 4     | magic `0x54504221` ("!BPT")      |
//! | 4      | 4     | format version                   |
//! | 8      | 8     | tree order                       |
//! | 16     | 8     | element count N                  |
//! | 24     | N × (size_of K + size_of V) | payload    |
//!
//! Only bitwise-copyable keys and values can be persisted; the zerocopy
//! bounds on these methods reject anything with indirection (`String`,
//! `Vec`, references) at compile time.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::Path;

use zerocopy::byteorder::{LittleEndian, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::error::{Result, TreeError};
use crate::tree::BPlusTreeMap;

/// "!BPT" when the little-endian file is read byte by byte.
const TREE_MAGIC: u32 = 0x5450_4221;
const TREE_VERSION: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct FileHeader {
    magic: U32<LittleEndian>,
    version: U32<LittleEndian>,
    order: U64<LittleEndian>,
    count: U64<LittleEndian>,
}

impl FileHeader {
    fn new(order: usize, count: usize) -> Self {
        Self {
            magic: U32::new(TREE_MAGIC),
            version: U32::new(TREE_VERSION),
            order: U64::new(order as u64),
            count: U64::new(count as u64),
        }
    }
}

impl<K, V> BPlusTreeMap<K, V>
where
    K: Ord + Clone + FromBytes + IntoBytes + Immutable,
    V: FromBytes + IntoBytes + Immutable,
{
    /// Saves the map to a binary file, overwriting any existing file.
    ///
    /// Writes the header, then streams every entry by walking the leaf
    /// chain once.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::Io`] if the file cannot be created or written.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let path = dir.path().join("tree.dat");
    ///
    /// let mut map: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
    /// map.insert(1, 100);
    /// map.save(&path).unwrap();
    ///
    /// let mut restored: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
    /// restored.load(&path).unwrap();
    /// assert_eq!(restored.get(&1), Some(&100));
    /// ```
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        let header = FileHeader::new(self.order(), self.len());
        writer.write_all(header.as_bytes())?;

        for (key, value) in self.iter() {
            writer.write_all(key.as_bytes())?;
            writer.write_all(value.as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Replaces the map's contents with those of a saved file.
    ///
    /// The file's order must match this map's order: entries saved at one
    /// order do not lay out the same way at another, so adopting them
    /// silently would be misleading. Use [`load_from_file`] to construct a
    /// map with whatever order the file carries. Reconstruction goes
    /// through the bulk loader, since the payload is already sorted.
    ///
    /// # Errors
    ///
    /// [`TreeError::Io`] for open/read failures (including a truncated
    /// payload), [`TreeError::BadMagic`] / [`TreeError::BadVersion`] for
    /// files this build does not understand, [`TreeError::OrderMismatch`]
    /// if the file's order differs from this map's.
    ///
    /// [`load_from_file`]: Self::load_from_file
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        let file_order = header.order.get() as usize;
        if file_order != self.order() {
            return Err(TreeError::OrderMismatch {
                file: file_order,
                tree: self.order(),
            });
        }

        let entries = read_entries::<K, V, _>(&mut reader, header.count.get() as usize)?;
        self.bulk_load(entries);
        Ok(())
    }

    /// Constructs a new map from a saved file, adopting the order recorded
    /// in its header.
    ///
    /// # Errors
    ///
    /// As for [`load`](Self::load), minus the order mismatch.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);

        let header = read_header(&mut reader)?;
        let mut tree = Self::with_order(header.order.get() as usize);
        let entries = read_entries::<K, V, _>(&mut reader, header.count.get() as usize)?;
        tree.bulk_load(entries);
        Ok(tree)
    }
}

fn read_header<R: Read>(reader: &mut R) -> Result<FileHeader> {
    let mut buffer = [0u8; size_of::<FileHeader>()];
    reader.read_exact(&mut buffer)?;
    let header = FileHeader::read_from_bytes(&buffer).expect("buffer is exactly header-sized");

    if header.magic.get() != TREE_MAGIC {
        return Err(TreeError::BadMagic { found: header.magic.get() });
    }
    if header.version.get() != TREE_VERSION {
        return Err(TreeError::BadVersion {
            expected: TREE_VERSION,
            found: header.version.get(),
        });
    }
    Ok(header)
}

fn read_entries<K, V, R>(reader: &mut R, count: usize) -> Result<Vec<(K, V)>>
where
    K: FromBytes,
    V: FromBytes,
    R: Read,
{
    let key_size = size_of::<K>();
    let mut entry = vec![0u8; key_size + size_of::<V>()];
    let mut entries = Vec::new();
    for _ in 0..count {
        reader.read_exact(&mut entry)?;
        let key = K::read_from_bytes(&entry[..key_size]).expect("slice is exactly key-sized");
        let value = V::read_from_bytes(&entry[key_size..]).expect("slice is exactly value-sized");
        entries.push((key, value));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use tempfile::tempdir;

    fn sample_tree(order: usize, n: u32) -> BPlusTreeMap<u32, u64> {
        let mut tree = BPlusTreeMap::with_order(order);
        for i in 0..n {
            tree.insert(i, u64::from(i) * 3);
        }
        tree
    }

    #[test]
    fn header_layout_is_packed() {
        assert_eq!(size_of::<FileHeader>(), 24);
        let header = FileHeader::new(5, 7);
        let bytes = header.as_bytes();
        assert_eq!(&bytes[0..4], &TREE_MAGIC.to_le_bytes());
        assert_eq!(&bytes[4..8], &TREE_VERSION.to_le_bytes());
        assert_eq!(&bytes[8..16], &5u64.to_le_bytes());
        assert_eq!(&bytes[16..24], &7u64.to_le_bytes());
    }

    #[test]
    fn round_trip_preserves_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("round_trip.dat");

        let tree = sample_tree(4, 500);
        tree.save(&path).unwrap();

        let mut restored: BPlusTreeMap<u32, u64> = BPlusTreeMap::with_order(4);
        restored.load(&path).unwrap();
        assert_eq!(restored.len(), 500);
        assert!(restored.validate());
        for i in 0..500 {
            assert_eq!(restored.get(&i), Some(&(u64::from(i) * 3)));
        }
    }

    #[test]
    fn empty_tree_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.dat");

        let tree: BPlusTreeMap<u32, u64> = BPlusTreeMap::with_order(4);
        tree.save(&path).unwrap();

        let mut restored: BPlusTreeMap<u32, u64> = BPlusTreeMap::with_order(4);
        restored.insert(9, 9);
        restored.load(&path).unwrap();
        assert!(restored.is_empty());
        assert!(restored.validate());
    }

    #[test]
    fn load_rejects_order_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("order.dat");

        sample_tree(5, 100).save(&path).unwrap();

        let mut other: BPlusTreeMap<u32, u64> = BPlusTreeMap::with_order(7);
        let err = other.load(&path).unwrap_err();
        assert!(matches!(err, TreeError::OrderMismatch { file: 5, tree: 7 }));
    }

    #[test]
    fn load_from_file_adopts_the_files_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adopt.dat");

        sample_tree(5, 100).save(&path).unwrap();

        let restored: BPlusTreeMap<u32, u64> = BPlusTreeMap::load_from_file(&path).unwrap();
        assert_eq!(restored.order(), 5);
        assert_eq!(restored.len(), 100);
        assert!(restored.validate());
    }

    #[test]
    fn load_rejects_bad_magic() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("magic.dat");
        std::fs::write(&path, [0u8; 64]).unwrap();

        let mut tree: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
        let err = tree.load(&path).unwrap_err();
        assert!(matches!(err, TreeError::BadMagic { found: 0 }));
    }

    #[test]
    fn load_rejects_bad_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("version.dat");

        let mut header = FileHeader::new(4, 0);
        header.version = U32::new(99);
        std::fs::write(&path, header.as_bytes()).unwrap();

        let mut tree: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
        let err = tree.load(&path).unwrap_err();
        assert!(matches!(err, TreeError::BadVersion { expected: 1, found: 99 }));
    }

    #[test]
    fn truncated_payload_is_an_io_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("truncated.dat");

        // Header promises 10 entries, payload carries none.
        let header = FileHeader::new(4, 10);
        std::fs::write(&path, header.as_bytes()).unwrap();

        let mut tree: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
        match tree.load(&path).unwrap_err() {
            TreeError::Io(err) => assert_eq!(err.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected an I/O error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let mut tree: BPlusTreeMap<u32, u64> = BPlusTreeMap::new();
        let err = tree.load(dir.path().join("absent.dat")).unwrap_err();
        assert!(matches!(err, TreeError::Io(_)));
    }
}
