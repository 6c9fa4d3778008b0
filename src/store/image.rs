//! Whole-image operations: scan, compare, append and delete.
//!
//! The image is always handled as one in-memory buffer. Mutations build a
//! new buffer and leave the input untouched.

use log::{debug, warn};

use super::header::StoreHeader;
use super::record::{KEY_INFO_LEN, KeyInfo};
use crate::blob::try_alloc;
use crate::cursor::Cursor;
use crate::error::{Error, Result};

/// An image holding `header` and no records.
pub fn empty_image(header: &StoreHeader) -> Vec<u8> {
    header.with_counts(0, StoreHeader::LEN as u32).to_bytes()
}

/// Reads the fixed record fields needed to step over the record at
/// `offset`: its stride and its alias.
fn read_stride_and_alias(image: &[u8], offset: usize) -> Result<(usize, &[u8])> {
    let corrupt = |msg: String| Error::CorruptImage(format!("record at {offset}: {msg}"));
    let mut cur = Cursor::at(image, offset).map_err(|e| corrupt(e.to_string()))?;

    let fixed = cur
        .read_bytes(KEY_INFO_LEN)
        .map_err(|e| corrupt(e.to_string()))?;
    let stride = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]) as usize;
    let alias_size = u16::from_le_bytes([fixed[KEY_INFO_LEN - 2], fixed[KEY_INFO_LEN - 1]]) as usize;

    if stride < KEY_INFO_LEN + alias_size {
        return Err(corrupt(format!(
            "keyInfoLen {stride} cannot hold a {alias_size} byte alias"
        )));
    }
    if stride > image.len() - offset {
        return Err(corrupt(format!(
            "keyInfoLen {stride} runs past image end {}",
            image.len()
        )));
    }

    let alias = cur
        .read_bytes(alias_size)
        .map_err(|e| corrupt(e.to_string()))?;
    Ok((stride, alias))
}

/// Locates the record stored under `alias`.
///
/// Walks `keyCount` records from the end of the header, stepping by each
/// record's stored `keyInfoLen`. `Ok(None)` means the image is sound and
/// simply lacks the alias; any field pointing outside `image` is a
/// `CorruptImage` error.
pub fn find_offset_by_alias(image: &[u8], alias: &[u8]) -> Result<Option<usize>> {
    let header = StoreHeader::from_bytes(image)?;

    let mut offset = StoreHeader::LEN;
    for i in 0..header.key_count() {
        let (stride, stored) = read_stride_and_alias(image, offset).inspect_err(|e| {
            warn!("scan stopped at record {i} of {}: {e}", header.key_count());
        })?;
        if stored == alias {
            return Ok(Some(offset));
        }
        offset += stride;
    }
    Ok(None)
}

/// Parses every record in order.
pub fn records(image: &[u8]) -> Result<Vec<KeyInfo<'_>>> {
    let header = StoreHeader::from_bytes(image)?;

    let mut out = Vec::new();
    out.try_reserve(header.key_count() as usize)
        .map_err(|_| Error::Allocation(header.key_count() as usize))?;

    let mut offset = StoreHeader::LEN;
    for _ in 0..header.key_count() {
        let info = KeyInfo::parse(image, offset)?;
        offset += info.key_info_len() as usize;
        out.push(info);
    }
    Ok(out)
}

/// Checks that the header bookkeeping matches the buffer exactly.
pub fn check_integrity(image: &[u8]) -> Result<()> {
    let header = StoreHeader::from_bytes(image)?;
    if header.total_len() as usize != image.len() {
        return Err(Error::CorruptImage(format!(
            "header totalLen {} but image holds {} bytes",
            header.total_len(),
            image.len()
        )));
    }

    let end = records(image)?
        .last()
        .map(|info| info.offset() + info.key_info_len() as usize)
        .unwrap_or(StoreHeader::LEN);
    if end != image.len() {
        return Err(Error::CorruptImage(format!(
            "{} bytes after the last record",
            image.len() - end
        )));
    }
    Ok(())
}

/// The record stored under `alias`, or `Ok(None)`.
pub fn key_info<'a>(image: &'a [u8], alias: &[u8]) -> Result<Option<KeyInfo<'a>>> {
    find_offset_by_alias(image, alias)?
        .map(|offset| KeyInfo::parse(image, offset))
        .transpose()
}

/// Compares the full records stored under two aliases.
///
/// Both aliases must exist. Records of different length are unequal;
/// otherwise every one of the `keyInfoLen` bytes is examined.
pub fn compare_records(image: &[u8], alias_a: &[u8], alias_b: &[u8]) -> Result<bool> {
    let not_found = |alias: &[u8]| Error::NotFound(String::from_utf8_lossy(alias).into_owned());

    let a = find_offset_by_alias(image, alias_a)?.ok_or_else(|| not_found(alias_a))?;
    let b = find_offset_by_alias(image, alias_b)?.ok_or_else(|| not_found(alias_b))?;

    let (len_a, _) = read_stride_and_alias(image, a)?;
    let (len_b, _) = read_stride_and_alias(image, b)?;
    if len_a != len_b {
        return Ok(false);
    }

    Ok(bytes_equal(&image[a..a + len_a], &image[b..b + len_b]))
}

/// Equality over every byte; never stops at the first difference.
fn bytes_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Returns a new image with `record` appended.
///
/// The record's own `keyInfoLen` must equal its length, and the input
/// image must be internally consistent.
pub fn append_record(image: &[u8], record: &[u8]) -> Result<Vec<u8>> {
    check_integrity(image)?;
    let header = StoreHeader::from_bytes(image)?;

    let (stride, alias) = read_stride_and_alias(record, 0)
        .map_err(|e| Error::Serialization(format!("new record: {e}")))?;
    if stride != record.len() {
        return Err(Error::Serialization(format!(
            "record declares {stride} bytes but holds {}",
            record.len()
        )));
    }

    let key_count = header
        .key_count()
        .checked_add(1)
        .ok_or_else(|| Error::InvalidArgument("key store is full".to_string()))?;
    let total_len = u32::try_from(image.len() + record.len())
        .map_err(|_| Error::InvalidArgument("key store image too large".to_string()))?;

    let mut out = try_alloc(total_len as usize)?;
    out.extend_from_slice(&header.with_counts(key_count, total_len).to_bytes());
    out.extend_from_slice(&image[StoreHeader::LEN..]);
    out.extend_from_slice(record);

    debug!(
        "appended {} byte record for alias of {} bytes; {key_count} keys",
        record.len(),
        alias.len()
    );
    Ok(out)
}

/// Returns a new image without the record stored under `alias`.
pub fn delete_record(image: &[u8], alias: &[u8]) -> Result<Vec<u8>> {
    check_integrity(image)?;
    let header = StoreHeader::from_bytes(image)?;

    let offset = find_offset_by_alias(image, alias)?
        .ok_or_else(|| Error::NotFound(String::from_utf8_lossy(alias).into_owned()))?;
    let (stride, _) = read_stride_and_alias(image, offset)?;

    let total_len = (image.len() - stride) as u32;
    let mut out = try_alloc(total_len as usize)?;
    out.extend_from_slice(&header.with_counts(header.key_count() - 1, total_len).to_bytes());
    out.extend_from_slice(&image[StoreHeader::LEN..offset]);
    out.extend_from_slice(&image[offset + stride..]);

    debug!("deleted {stride} byte record at offset {offset}");
    Ok(out)
}
