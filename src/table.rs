//! # Table Module
//!
//! Keyed store of integer or float rows addressed by instance index.
//!
//! Two backends sit behind the [`RowStore`] trait:
//! - [`MemoryRowStore`]: rows in a hash map keyed by instance index.
//! - [`MmapRowStore`]: rows in a memory-mapped file at `key * record_width`.
//!
//! Both read and write the format in [`crate::persistence`], so the choice of
//! backend only changes footprint and latency.

use crate::error::{Result, ShortlistError};
use crate::model::RowSlot;
use crate::persistence::{
    decode_row, encode_row, read_table_header, write_table_file, TableHeader, TableValue,
};
use hashbrown::HashMap;
use memmap2::{Mmap, MmapMut};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MIN_GROWTH_ROWS: usize = 64;

/// Storage backend of a [`KeyedTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TableBackend {
    #[default]
    Memory,
    Mmap,
}

impl TableBackend {
    pub fn from_in_memory(in_memory: bool) -> Self {
        if in_memory {
            TableBackend::Memory
        } else {
            TableBackend::Mmap
        }
    }
}

/// Row storage behind a [`KeyedTable`].
pub trait RowStore<T: TableValue>: Send + Sync {
    /// Write `values` under `key`. `path` names the build file for backends that need one.
    fn put(&mut self, key: u64, values: &[T], path: &Path) -> Result<()>;

    fn get(&self, key: u64) -> Option<Vec<T>>;

    /// One past the largest key written.
    fn num_rows(&self) -> u64;

    /// Number of keys holding a row.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;
}

/// In-process rows keyed by instance index.
#[derive(Debug, Clone)]
pub struct MemoryRowStore<T> {
    rows: HashMap<u64, Vec<T>>,
    num_rows: u64,
}

impl<T: TableValue> MemoryRowStore<T> {
    pub fn new() -> Self {
        Self {
            rows: HashMap::new(),
            num_rows: 0,
        }
    }
}

impl<T: TableValue> Default for MemoryRowStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TableValue> RowStore<T> for MemoryRowStore<T> {
    fn put(&mut self, key: u64, values: &[T], _path: &Path) -> Result<()> {
        self.rows.insert(key, values.to_vec());
        self.num_rows = self.num_rows.max(key + 1);
        Ok(())
    }

    fn get(&self, key: u64) -> Option<Vec<T>> {
        self.rows.get(&key).cloned()
    }

    fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn save(&self, path: &Path) -> Result<()> {
        let width = self.rows.values().map(Vec::len).max().unwrap_or(0);
        let lengths = (0..self.num_rows)
            .map(|key| self.rows.get(&key).map(|row| row.len() as u32))
            .collect();
        let header = TableHeader::new::<T>(width, lengths);
        let record_bytes = header.record_bytes::<T>();

        write_table_file::<T, _>(path, &header, |writer| {
            let mut record = vec![0u8; record_bytes];
            for key in 0..self.num_rows {
                record.fill(0);
                if let Some(row) = self.rows.get(&key) {
                    encode_row(row, &mut record);
                }
                writer.write_all(&record)?;
            }
            Ok(())
        })
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        let (header, data_offset) = read_table_header::<T>(&bytes)?;
        let record_bytes = header.record_bytes::<T>();

        let mut rows = HashMap::with_capacity(header.num_rows());
        for (key, len) in header.lengths.iter().enumerate() {
            if let Some(len) = len {
                let start = data_offset + key * record_bytes;
                let row = decode_row::<T>(&bytes[start..start + record_bytes], *len as usize);
                rows.insert(key as u64, row);
            }
        }
        self.rows = rows;
        self.num_rows = header.num_rows() as u64;
        Ok(())
    }
}

enum Region {
    /// Writable build file, grown geometrically.
    Building {
        file: File,
        path: PathBuf,
        map: Option<MmapMut>,
        capacity_rows: usize,
    },
    /// Read-only view of a saved table file.
    Mapped {
        map: Mmap,
        path: PathBuf,
        data_offset: usize,
    },
}

/// Fixed-width rows in a memory-mapped file.
pub struct MmapRowStore<T> {
    region: Option<Region>,
    record_width: Option<usize>,
    lengths: Vec<Option<u32>>,
    _marker: PhantomData<T>,
}

impl<T: TableValue> MmapRowStore<T> {
    pub fn new() -> Self {
        Self {
            region: None,
            record_width: None,
            lengths: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn record_bytes(&self) -> usize {
        self.record_width.unwrap_or(0) * T::WIDTH
    }

    /// Bytes of the dense row section currently visible.
    fn row_bytes(&self) -> &[u8] {
        match &self.region {
            Some(Region::Building { map: Some(map), .. }) => &map[..],
            Some(Region::Mapped {
                map, data_offset, ..
            }) => &map[*data_offset..],
            _ => &[],
        }
    }

    fn ensure_building(&mut self, path: &Path) -> Result<()> {
        match &self.region {
            Some(Region::Building { path: current, .. }) => {
                if current != path {
                    warn!(
                        current = %current.display(),
                        requested = %path.display(),
                        "table already building into another file"
                    );
                }
                return Ok(());
            }
            Some(Region::Mapped { path: source, .. }) if source == path => {
                return Err(ShortlistError::invalid_config(format!(
                    "cannot build into mapped table file {}",
                    path.display()
                )));
            }
            _ => {}
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        // Carry rows of a loaded table over into the new build file.
        let live_rows = self.lengths.len();
        let live_bytes = live_rows * self.record_bytes();
        if live_bytes > 0 {
            let mut writer = &file;
            writer.write_all(&self.row_bytes()[..live_bytes])?;
        }
        let map = if live_bytes > 0 {
            // SAFETY: the build file is private to this store until `save`.
            Some(unsafe { MmapMut::map_mut(&file)? })
        } else {
            None
        };

        debug!(path = %path.display(), rows = live_rows, "opened table build file");
        self.region = Some(Region::Building {
            file,
            path: path.to_path_buf(),
            map,
            capacity_rows: live_rows,
        });
        Ok(())
    }

    fn grow_to(&mut self, rows: usize) -> Result<()> {
        let record_bytes = self.record_bytes();
        let Some(Region::Building {
            file,
            map,
            capacity_rows,
            ..
        }) = &mut self.region
        else {
            return Ok(());
        };
        if rows <= *capacity_rows || record_bytes == 0 {
            return Ok(());
        }

        let new_capacity = rows.max(*capacity_rows * 2).max(MIN_GROWTH_ROWS);
        if let Some(old) = map.take() {
            old.flush()?;
        }
        file.set_len((new_capacity * record_bytes) as u64)?;
        // SAFETY: the build file is private to this store until `save`.
        *map = Some(unsafe { MmapMut::map_mut(&*file)? });
        *capacity_rows = new_capacity;
        Ok(())
    }

    /// Re-lay the build file at a larger record width, keeping every row in place by key.
    fn widen(&mut self, width: usize) -> Result<()> {
        let old_bytes = self.record_bytes();
        self.record_width = Some(width);
        let new_bytes = self.record_bytes();
        let rows = self.lengths.len();
        let Some(Region::Building {
            file,
            map,
            capacity_rows,
            path,
        }) = &mut self.region
        else {
            return Ok(());
        };
        let capacity = (*capacity_rows).max(rows);
        if capacity == 0 || new_bytes <= old_bytes {
            return Ok(());
        }

        if let Some(old) = map.take() {
            old.flush()?;
        }
        file.set_len((capacity * new_bytes) as u64)?;
        // SAFETY: the build file is private to this store until `save`.
        let mut widened = unsafe { MmapMut::map_mut(&*file)? };
        // Highest key first: each record moves up, never onto a row not yet moved.
        for key in (0..rows).rev() {
            let src = key * old_bytes;
            let dst = key * new_bytes;
            widened.copy_within(src..src + old_bytes, dst);
            widened[dst + old_bytes..dst + new_bytes].fill(0);
        }

        debug!(path = %path.display(), rows, width, "widened table records");
        *map = Some(widened);
        *capacity_rows = capacity;
        Ok(())
    }
}

impl<T: TableValue> Default for MmapRowStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TableValue> RowStore<T> for MmapRowStore<T> {
    fn put(&mut self, key: u64, values: &[T], path: &Path) -> Result<()> {
        self.ensure_building(path)?;
        if self.record_width.map_or(true, |width| values.len() > width) {
            self.widen(values.len())?;
        }
        let key = key as usize;
        self.grow_to(key + 1)?;

        let record_bytes = self.record_bytes();
        if let Some(Region::Building { map: Some(map), .. }) = &mut self.region {
            let record = &mut map[key * record_bytes..(key + 1) * record_bytes];
            record.fill(0);
            encode_row(values, record);
        }

        if self.lengths.len() <= key {
            self.lengths.resize(key + 1, None);
        }
        self.lengths[key] = Some(values.len() as u32);
        Ok(())
    }

    fn get(&self, key: u64) -> Option<Vec<T>> {
        let key = usize::try_from(key).ok()?;
        let len = (*self.lengths.get(key)?)? as usize;
        let record_bytes = self.record_bytes();
        if record_bytes == 0 {
            return Some(Vec::new());
        }
        let start = key * record_bytes;
        let record = self.row_bytes().get(start..start + record_bytes)?;
        Some(decode_row(record, len))
    }

    fn num_rows(&self) -> u64 {
        self.lengths.len() as u64
    }

    fn len(&self) -> usize {
        self.lengths.iter().filter(|len| len.is_some()).count()
    }

    fn save(&self, path: &Path) -> Result<()> {
        match &self.region {
            Some(Region::Mapped { path: source, .. }) if source == path => {
                debug!(path = %path.display(), "table already persisted at target");
                return Ok(());
            }
            Some(Region::Building { path: build, .. }) if build == path => {
                return Err(ShortlistError::invalid_config(format!(
                    "cannot save table over its own build file {}",
                    path.display()
                )));
            }
            _ => {}
        }

        let header = TableHeader::new::<T>(self.record_width.unwrap_or(0), self.lengths.clone());
        let data_bytes = header.data_bytes::<T>();
        let rows = &self.row_bytes()[..data_bytes];
        write_table_file::<T, _>(path, &header, |writer| {
            writer.write_all(rows)?;
            Ok(())
        })
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        let file = File::open(path)?;
        // SAFETY: saved tables are read-only once training starts.
        let map = unsafe { Mmap::map(&file)? };
        let (header, data_offset) = read_table_header::<T>(&map)?;

        self.record_width = Some(header.record_width as usize);
        self.lengths = header.lengths;
        self.region = Some(Region::Mapped {
            map,
            path: path.to_path_buf(),
            data_offset,
        });
        Ok(())
    }
}

/// Keyed table of rows backed by memory or a memory-mapped file.
pub struct KeyedTable<T: TableValue> {
    name: &'static str,
    backend: TableBackend,
    store: Box<dyn RowStore<T>>,
    data_init: bool,
}

impl<T: TableValue> KeyedTable<T> {
    pub fn new(backend: TableBackend) -> Self {
        Self::named("keyed", backend)
    }

    /// Create a table whose name shows up in lookup errors.
    pub fn named(name: &'static str, backend: TableBackend) -> Self {
        let store: Box<dyn RowStore<T>> = match backend {
            TableBackend::Memory => Box::new(MemoryRowStore::<T>::new()),
            TableBackend::Mmap => Box::new(MmapRowStore::<T>::new()),
        };
        Self {
            name,
            backend,
            store,
            data_init: false,
        }
    }

    pub fn backend(&self) -> TableBackend {
        self.backend
    }

    /// Whether any row has been written or loaded.
    pub fn data_init(&self) -> bool {
        self.data_init
    }

    /// Write a row and return the key it landed under.
    pub fn create(&mut self, values: &[T], path: impl AsRef<Path>, slot: RowSlot) -> Result<u64> {
        let key = match slot {
            RowSlot::Append => self.store.num_rows(),
            RowSlot::At(key) => key,
        };
        self.store.put(key, values, path.as_ref())?;
        self.data_init = true;
        Ok(key)
    }

    pub fn query(&self, key: u64) -> Result<Vec<T>> {
        self.store.get(key).ok_or(ShortlistError::MissingKey {
            table: self.name,
            key,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.store.save(path)?;
        debug!(table = self.name, path = %path.display(), rows = self.store.len(), "saved table");
        Ok(())
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.store.load(path)?;
        self.data_init = true;
        debug!(table = self.name, path = %path.display(), rows = self.store.len(), "loaded table");
        Ok(())
    }

    /// Number of keys holding a row.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// One past the largest key written.
    pub fn num_rows(&self) -> u64 {
        self.store.num_rows()
    }
}

impl<T: TableValue> std::fmt::Debug for KeyedTable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedTable")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .field("rows", &self.store.len())
            .field("data_init", &self.data_init)
            .finish()
    }
}
