//! Tag acquisition: the reader capability interface and the sector loop.
//!
//! # Reader
//! [`TagReader`] is the one seam between the decoder and a transport. A
//! transport implements it once (serial PN532, libnfc, a replayed dump);
//! nothing is detected at runtime.
//!
//! # Acquisition
//! [`acquire`] reads the manufacturer block without authentication, then
//! walks the sectors in order: authenticate with that sector's key, read its
//! data blocks, skip the trailer. A sector that refuses its key is recorded
//! and skipped; the session carries on with the rest. Authenticated reads
//! overwrite anything the unauthenticated pass stored.

use crate::block::{first_block, is_trailer, BlockData, RawBlock, BLOCKS_PER_SECTOR, BLOCK_COUNT};
use crate::crypto::{SectorKey, SectorKeys, SECTOR_COUNT};
use crate::table::{BlockTable, InsertOutcome, MergePolicy};

// ── Capability interface ─────────────────────────────────────────────────────

/// A connected tag.
pub trait TagReader {
    /// Factory UID of the tag in the field.
    fn identifier(&self) -> &[u8];

    /// Authenticate `sector` with `key`. Returns `false` on rejection.
    fn authenticate(&mut self, sector: u8, key: &SectorKey) -> bool;

    /// Read one block. `None` when the read fails or is not permitted.
    fn read_block(&mut self, index: u8) -> Option<BlockData>;
}

// ── Options / report ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Also read each sector's trailer block.
    pub include_trailers: bool,
    /// Number of sectors to walk, starting at 0.
    pub sectors:          u8,
    /// Try block 0 before any authentication.
    pub read_manufacturer_block: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            include_trailers:        false,
            sectors:                 SECTOR_COUNT as u8,
            read_manufacturer_block: true,
        }
    }
}

/// Result of one acquisition pass.
#[derive(Debug, Clone, Default)]
pub struct AcquireReport {
    pub table:              BlockTable,
    /// Sectors whose key was accepted.
    pub authenticated:      Vec<u8>,
    /// Sectors whose key was rejected.
    pub failed_sectors:     Vec<u8>,
    /// Block reads that returned nothing after a successful authentication.
    pub failed_reads:       Vec<u8>,
    /// Authenticated reads that replaced an unauthenticated block.
    pub replaced:           usize,
}

impl AcquireReport {
    pub fn summary(&self) -> String {
        format!(
            "{} block(s) read, {}/{} sector(s) authenticated, {} failed read(s)",
            self.table.len(),
            self.authenticated.len(),
            self.authenticated.len() + self.failed_sectors.len(),
            self.failed_reads.len(),
        )
    }
}

// ── Acquisition ──────────────────────────────────────────────────────────────

/// Read every reachable block of the tag into a fresh [`BlockTable`].
pub fn acquire<R: TagReader + ?Sized>(reader: &mut R, keys: &SectorKeys, opts: &AcquireOptions) -> AcquireReport {
    let mut report = AcquireReport::default();

    if opts.read_manufacturer_block {
        match reader.read_block(0) {
            Some(data) => {
                report.table.insert_block(RawBlock { index: 0, data }, MergePolicy::FirstWins);
                tracing::debug!("manufacturer block read without authentication");
            }
            None => tracing::debug!("manufacturer block needs authentication"),
        }
    }

    let sectors = opts.sectors.min(SECTOR_COUNT as u8);
    for sector in 0..sectors {
        let key = &keys[sector as usize];
        if !reader.authenticate(sector, key) {
            tracing::debug!(sector, "authentication rejected");
            report.failed_sectors.push(sector);
            continue;
        }
        report.authenticated.push(sector);

        let base = first_block(sector);
        for index in base..base + BLOCKS_PER_SECTOR as u8 {
            if is_trailer(index) && !opts.include_trailers {
                continue;
            }
            let Some(data) = reader.read_block(index) else {
                tracing::debug!(sector, index, "read failed");
                report.failed_reads.push(index);
                continue;
            };
            let outcome = report.table.insert_block(RawBlock { index, data }, MergePolicy::Overwrite);
            if outcome == InsertOutcome::Replaced {
                report.replaced += 1;
            }
        }
    }

    tracing::info!(uid = %hex::encode_upper(reader.identifier()), "{}", report.summary());
    report
}

// ── MemoryTag ────────────────────────────────────────────────────────────────

/// A tag held in memory: replays a dump through the [`TagReader`] interface.
///
/// Blocks are readable only inside the currently authenticated sector;
/// block 0 is also readable before any authentication when
/// `open_manufacturer_block` is set, as many readers allow.
#[derive(Debug, Clone)]
pub struct MemoryTag {
    uid:           Vec<u8>,
    blocks:        BlockTable,
    keys:          Option<SectorKeys>,
    authenticated: Option<u8>,
    pub open_manufacturer_block: bool,
}

impl MemoryTag {
    /// A tag that accepts exactly `keys`.
    pub fn new(uid: impl Into<Vec<u8>>, blocks: BlockTable, keys: SectorKeys) -> Self {
        Self {
            uid: uid.into(),
            blocks,
            keys: Some(keys),
            authenticated: None,
            open_manufacturer_block: true,
        }
    }

    /// A tag that accepts any key.
    pub fn unlocked(uid: impl Into<Vec<u8>>, blocks: BlockTable) -> Self {
        Self {
            uid: uid.into(),
            blocks,
            keys: None,
            authenticated: None,
            open_manufacturer_block: true,
        }
    }
}

impl TagReader for MemoryTag {
    fn identifier(&self) -> &[u8] {
        &self.uid
    }

    fn authenticate(&mut self, sector: u8, key: &SectorKey) -> bool {
        let ok = (sector as usize) < SECTOR_COUNT
            && self.keys.as_ref().map_or(true, |k| k[sector as usize] == *key);
        self.authenticated = ok.then_some(sector);
        ok
    }

    fn read_block(&mut self, index: u8) -> Option<BlockData> {
        if index as usize >= BLOCK_COUNT {
            return None;
        }
        let allowed = (index == 0 && self.open_manufacturer_block)
            || self.authenticated == Some(crate::block::sector_of(index));
        if !allowed {
            return None;
        }
        self.blocks.get(index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{derive_keys, MasterSecret};

    const UID: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];

    fn full_table() -> BlockTable {
        let mut t = BlockTable::new();
        for i in 0..BLOCK_COUNT {
            t.insert(i, &[i as u8; 16]).unwrap();
        }
        t
    }

    #[test]
    fn reads_all_data_blocks() {
        let keys = derive_keys(&UID, &MasterSecret::default()).unwrap();
        let mut tag = MemoryTag::new(UID, full_table(), keys);
        let report = acquire(&mut tag, &keys, &AcquireOptions::default());

        assert_eq!(report.authenticated.len(), SECTOR_COUNT);
        assert!(report.failed_sectors.is_empty());
        // 16 sectors × 3 data blocks; trailers skipped
        assert_eq!(report.table.len(), 48);
        assert!(!report.table.contains(3));
        assert!(report.table.contains(16));
        assert_eq!(report.table.get(16), Some(&[16u8; 16]));
    }

    #[test]
    fn trailers_on_request() {
        let keys = derive_keys(&UID, &MasterSecret::default()).unwrap();
        let mut tag = MemoryTag::new(UID, full_table(), keys);
        let opts = AcquireOptions { include_trailers: true, ..Default::default() };
        let report = acquire(&mut tag, &keys, &opts);
        assert_eq!(report.table.len(), BLOCK_COUNT);
    }

    #[test]
    fn wrong_keys_leave_only_manufacturer_block() {
        let keys = derive_keys(&UID, &MasterSecret::default()).unwrap();
        let wrong = derive_keys(&UID, &MasterSecret::new([1u8; 16])).unwrap();
        let mut tag = MemoryTag::new(UID, full_table(), keys);
        let report = acquire(&mut tag, &wrong, &AcquireOptions::default());

        assert_eq!(report.failed_sectors.len(), SECTOR_COUNT);
        assert_eq!(report.table.len(), 1);
        assert!(report.table.contains(0));
    }

    #[test]
    fn one_bad_sector_is_skipped() {
        let keys = derive_keys(&UID, &MasterSecret::default()).unwrap();
        let mut presented = keys;
        presented[4] = SectorKey([0u8; 6]);
        let mut tag = MemoryTag::new(UID, full_table(), keys);
        let report = acquire(&mut tag, &presented, &AcquireOptions::default());

        assert_eq!(report.failed_sectors, vec![4]);
        assert!(!report.table.contains(16));
        assert!(!report.table.contains(15) && report.table.contains(14));
        assert!(report.summary().contains("15/16 sector(s) authenticated"));
    }

    /// Reader whose unauthenticated block 0 differs from the authenticated one.
    struct NoisyManufacturerBlock {
        inner: MemoryTag,
    }

    impl TagReader for NoisyManufacturerBlock {
        fn identifier(&self) -> &[u8] {
            self.inner.identifier()
        }
        fn authenticate(&mut self, sector: u8, key: &SectorKey) -> bool {
            self.inner.authenticate(sector, key)
        }
        fn read_block(&mut self, index: u8) -> Option<BlockData> {
            if index == 0 && self.inner.authenticated.is_none() {
                return Some([0xEE; 16]);
            }
            self.inner.read_block(index)
        }
    }

    #[test]
    fn authenticated_read_supersedes_raw_block_0() {
        let keys = derive_keys(&UID, &MasterSecret::default()).unwrap();
        let mut reader = NoisyManufacturerBlock {
            inner: MemoryTag::new(UID, full_table(), keys),
        };
        let report = acquire(&mut reader, &keys, &AcquireOptions::default());
        assert_eq!(report.table.get(0), Some(&[0u8; 16]));
        assert_eq!(report.replaced, 1);
    }

    #[test]
    fn sparse_tag_records_failed_reads() {
        let mut blocks = BlockTable::new();
        blocks.insert(1, &[1u8; 16]).unwrap();
        let mut tag = MemoryTag::unlocked(UID, blocks);
        let opts = AcquireOptions { sectors: 1, ..Default::default() };
        let report = acquire(&mut tag, &[SectorKey::default(); SECTOR_COUNT], &opts);
        assert_eq!(report.table.len(), 1);
        assert_eq!(report.failed_reads, vec![0, 2]);
    }

    #[test]
    fn memory_tag_enforces_sector_scope() {
        let mut tag = MemoryTag::unlocked(UID, full_table());
        assert_eq!(tag.read_block(5), None);
        assert!(tag.authenticate(1, &SectorKey::default()));
        assert_eq!(tag.read_block(5), Some([5u8; 16]));
        assert_eq!(tag.read_block(8), None);
        assert_eq!(tag.read_block(0), Some([0u8; 16]));
        tag.open_manufacturer_block = false;
        assert_eq!(tag.read_block(0), None);
        assert!(!tag.authenticate(16, &SectorKey::default()));
    }
}
