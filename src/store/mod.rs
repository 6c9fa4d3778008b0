//! Binary key store image.
//!
//! ```text
//! HEADER (84) | RECORD | RECORD | ...
//! ```
//! See [`StoreHeader`] for the header fields and [`serialize_key_info`]
//! for the record layout. Each record begins with its own length, which is
//! the only value a scan uses to reach the next record.

mod header;
mod image;
mod record;

pub use header::{MAGIC, StoreHeader, VERSION_V1, sealing};
pub use image::{
    append_record, check_integrity, compare_records, delete_record, empty_image,
    find_offset_by_alias, key_info, records,
};
pub use record::{
    KEY_INFO_LEN, KeyInfo, KeyMetadata, MAX_ALIAS_LEN, RECORD_ALIGN, serialize_key_info,
};
pub(crate) use record::check_alias;
