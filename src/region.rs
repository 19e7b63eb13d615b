// Copyright 2023 TiKV Project Authors. Licensed under Apache-2.0.

use derive_new::new;

use crate::kv::Key;

/// The ID of a region
pub type RegionId = u64;

/// Leading byte of every key in the table keyspace. Regions outside of it
/// (meta, coordinator index) are never scanned for locks.
pub const TABLE_PREFIX: u8 = b't';

/// The kind of shard service a region is served by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum RegionType {
    #[default]
    Data,
    Index,
}

/// A contiguous key-range shard of the key-value store.
///
/// All data is partitioned by range; each partition is called a region.
#[derive(new, Clone, Default, Debug, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub region_type: RegionType,
    pub start_key: Key,
    pub end_key: Key,
}

impl Region {
    pub fn contains(&self, key: &Key) -> bool {
        let key: &[u8] = key.into();
        let start_key: &[u8] = (&self.start_key).into();
        let end_key: &[u8] = (&self.end_key).into();
        key >= start_key && (key < end_key || end_key.is_empty())
    }

    /// Whether this region's range lies in the table keyspace.
    pub fn is_table_space(&self) -> bool {
        self.start_key.first_byte() == Some(TABLE_PREFIX)
    }
}
