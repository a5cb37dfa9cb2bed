//! # Persistence Module
//!
//! On-disk layout shared by every table backend.
//!
//! ```text
//! ┌──────────┬──────────────┬──────────────────┬──────────────────────────────┐
//! │ magic(8) │ hdr_len(u64) │ TableHeader      │ rows: num_rows × width × T   │
//! │          │ little-end.  │ (bincode)        │ little-endian, zero-padded   │
//! └──────────┴──────────────┴──────────────────┴──────────────────────────────┘
//! ```
//!
//! Rows are stored at a fixed record width so the memory-mapped backend can
//! address row `k` at `data_offset + k * width * size_of::<T>()`. The header
//! records the true length of every row (`None` for keys never written).

use crate::error::{Result, ShortlistError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const TABLE_MAGIC: &[u8; 8] = b"SLTABLE\0";
const HEADER_LEN_BYTES: usize = 8;

pub const TABLE_FORMAT_VERSION: u32 = 1;

/// Element type of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DType {
    I64,
    F32,
}

/// Fixed-size scalar that can live in a table.
pub trait TableValue: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DType;
    /// Encoded size in bytes.
    const WIDTH: usize;

    fn write_le(self, out: &mut [u8]);
    fn read_le(bytes: &[u8]) -> Self;
}

impl TableValue for i64 {
    const DTYPE: DType = DType::I64;
    const WIDTH: usize = 8;

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[..8].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        i64::from_le_bytes(buf)
    }
}

impl TableValue for f32 {
    const DTYPE: DType = DType::F32;
    const WIDTH: usize = 4;

    #[inline]
    fn write_le(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }

    #[inline]
    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        f32::from_le_bytes(buf)
    }
}

/// Metadata needed to rebuild row boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableHeader {
    pub format_version: u32,
    pub app_version: String,
    pub dtype: DType,
    /// Elements per stored record.
    pub record_width: u64,
    /// True length of each row; `None` marks keys that were never written.
    pub lengths: Vec<Option<u32>>,
}

impl TableHeader {
    pub fn new<T: TableValue>(record_width: usize, lengths: Vec<Option<u32>>) -> Self {
        Self {
            format_version: TABLE_FORMAT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            dtype: T::DTYPE,
            record_width: record_width as u64,
            lengths,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.lengths.len()
    }

    pub fn record_bytes<T: TableValue>(&self) -> usize {
        self.record_width as usize * T::WIDTH
    }

    /// Size of the dense row section in bytes.
    pub fn data_bytes<T: TableValue>(&self) -> usize {
        self.num_rows() * self.record_bytes::<T>()
    }

    pub fn ensure_dtype<T: TableValue>(&self) -> Result<()> {
        if self.dtype != T::DTYPE {
            return Err(ShortlistError::DTypeMismatch {
                expected: T::DTYPE,
                found: self.dtype,
            });
        }
        Ok(())
    }
}

/// Encode `values` into the front of `out`.
pub fn encode_row<T: TableValue>(values: &[T], out: &mut [u8]) {
    for (value, chunk) in values.iter().zip(out.chunks_exact_mut(T::WIDTH)) {
        value.write_le(chunk);
    }
}

/// Decode the first `len` values of a record.
pub fn decode_row<T: TableValue>(bytes: &[u8], len: usize) -> Vec<T> {
    bytes
        .chunks_exact(T::WIDTH)
        .take(len)
        .map(T::read_le)
        .collect()
}

/// Write a table file: header first, then whatever `write_rows` emits.
///
/// `write_rows` must emit exactly `header.data_bytes::<T>()` bytes.
pub fn write_table_file<T, F>(path: &Path, header: &TableHeader, write_rows: F) -> Result<()>
where
    T: TableValue,
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    header.ensure_dtype::<T>()?;
    let header_bytes = bincode::serialize(header)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(TABLE_MAGIC)?;
    writer.write_all(&(header_bytes.len() as u64).to_le_bytes())?;
    writer.write_all(&header_bytes)?;
    write_rows(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Parse the header of a table file and return it with the row section offset.
pub fn read_table_header<T: TableValue>(bytes: &[u8]) -> Result<(TableHeader, usize)> {
    let prefix = TABLE_MAGIC.len() + HEADER_LEN_BYTES;
    if bytes.len() < prefix || &bytes[..TABLE_MAGIC.len()] != TABLE_MAGIC {
        return Err(ShortlistError::format("missing table magic"));
    }
    let mut len_buf = [0u8; HEADER_LEN_BYTES];
    len_buf.copy_from_slice(&bytes[TABLE_MAGIC.len()..prefix]);
    let header_len = u64::from_le_bytes(len_buf) as usize;
    let data_offset = prefix
        .checked_add(header_len)
        .filter(|&end| end <= bytes.len())
        .ok_or_else(|| ShortlistError::format("header extends past end of file"))?;

    let header: TableHeader = bincode::deserialize(&bytes[prefix..data_offset])?;
    if header.format_version != TABLE_FORMAT_VERSION {
        return Err(ShortlistError::format(format!(
            "table format version mismatch: expected {}, found {}",
            TABLE_FORMAT_VERSION, header.format_version
        )));
    }
    header.ensure_dtype::<T>()?;

    let needed = usize::try_from(header.record_width)
        .ok()
        .and_then(|width| width.checked_mul(T::WIDTH))
        .and_then(|record_bytes| record_bytes.checked_mul(header.num_rows()))
        .and_then(|data_bytes| data_bytes.checked_add(data_offset))
        .ok_or_else(|| ShortlistError::format("row section size overflows"))?;
    if bytes.len() < needed {
        return Err(ShortlistError::format(format!(
            "row section truncated: need {needed} bytes, file has {}",
            bytes.len()
        )));
    }
    if let Some(len) = header
        .lengths
        .iter()
        .flatten()
        .find(|&&len| len as u64 > header.record_width)
    {
        return Err(ShortlistError::format(format!(
            "row length {len} exceeds record width {}",
            header.record_width
        )));
    }
    Ok((header, data_offset))
}
