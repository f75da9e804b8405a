//! Sparse block table: the in-memory image of one tag session.
//!
//! Blocks arrive from any acquisition strategy in any order, possibly more
//! than once. The table keeps at most one 16-byte payload per index.
//!
//! ## Merge policy
//!
//! | Policy | Existing entry | Result |
//! |--------|----------------|--------|
//! | `FirstWins` | none | stored |
//! | `FirstWins` | same bytes | `Duplicate`, no change |
//! | `FirstWins` | different bytes | `Conflict`, stored value kept |
//! | `Overwrite` | different bytes | `Replaced` |
//!
//! `Overwrite` is for a later, authenticated read superseding an earlier
//! unauthenticated one of the same block.

use std::collections::BTreeMap;
use std::fmt;

use crate::block::{BlockData, BlockError, BlockRecord, RawBlock, BLOCK_COUNT, BLOCK_SIZE, MAX_DUMP_LEN};
use crate::layout;

// ── Merge ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    #[default]
    FirstWins,
    Overwrite,
}

/// What `insert` did with a valid block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Same bytes as the stored block.
    Duplicate,
    /// Different bytes; the stored block was kept.
    Conflict,
    /// Different bytes; the stored block was replaced.
    Replaced,
}

// ── BlockTable ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTable {
    blocks: BTreeMap<u8, BlockData>,
}

impl BlockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert with first-wins semantics.
    pub fn insert(&mut self, index: usize, data: &[u8]) -> Result<InsertOutcome, BlockError> {
        self.insert_with(index, data, MergePolicy::FirstWins)
    }

    /// Insert under an explicit merge policy. Blocks that are not exactly
    /// 16 bytes are rejected and never stored.
    pub fn insert_with(
        &mut self,
        index:  usize,
        data:   &[u8],
        policy: MergePolicy,
    ) -> Result<InsertOutcome, BlockError> {
        let block = RawBlock::new(index, data)?;
        Ok(self.insert_block(block, policy))
    }

    pub fn insert_block(&mut self, block: RawBlock, policy: MergePolicy) -> InsertOutcome {
        match self.blocks.get_mut(&block.index) {
            None => {
                self.blocks.insert(block.index, block.data);
                InsertOutcome::Inserted
            }
            Some(existing) if *existing == block.data => InsertOutcome::Duplicate,
            Some(existing) => match policy {
                MergePolicy::FirstWins => {
                    tracing::debug!(index = block.index, "conflicting reread ignored");
                    InsertOutcome::Conflict
                }
                MergePolicy::Overwrite => {
                    *existing = block.data;
                    InsertOutcome::Replaced
                }
            },
        }
    }

    pub fn get(&self, index: usize) -> Option<&BlockData> {
        u8::try_from(index).ok().and_then(|i| self.blocks.get(&i))
    }

    pub fn contains(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = RawBlock> + '_ {
        self.blocks.iter().map(|(&index, &data)| RawBlock { index, data })
    }

    pub fn completeness(&self) -> Completeness {
        let mut bits = 0u64;
        for &i in self.blocks.keys() {
            bits |= 1u64 << i;
        }
        Completeness { bits }
    }

    // ── Bulk loaders ─────────────────────────────────────────────────────────

    /// Build from exchange records with first-wins semantics. Records that
    /// fail validation are logged and skipped.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a BlockRecord>,
    {
        let mut table = Self::new();
        for rec in records {
            match rec.to_block() {
                Ok(block) => {
                    table.insert_block(block, MergePolicy::FirstWins);
                }
                Err(e) => tracing::warn!("skipping block record: {e}"),
            }
        }
        table
    }

    /// Chunk a contiguous image into blocks indexed by `offset / 16`.
    ///
    /// A short trailing chunk is rejected; bytes beyond 1024 are ignored.
    pub fn from_dump_bytes(bytes: &[u8]) -> Self {
        if bytes.len() > MAX_DUMP_LEN {
            tracing::warn!(len = bytes.len(), "dump longer than {MAX_DUMP_LEN} bytes, truncating");
        }
        let image = &bytes[..bytes.len().min(MAX_DUMP_LEN)];
        let mut table = Self::new();
        for (i, chunk) in image.chunks(BLOCK_SIZE).enumerate() {
            if let Err(e) = table.insert(i, chunk) {
                tracing::warn!("skipping dump chunk: {e}");
            }
        }
        table
    }

    /// Contiguous 1024-byte image; absent blocks are zero-filled.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; MAX_DUMP_LEN];
        for (&i, data) in &self.blocks {
            let off = i as usize * BLOCK_SIZE;
            out[off..off + BLOCK_SIZE].copy_from_slice(data);
        }
        out
    }

    pub fn to_records(&self) -> Vec<BlockRecord> {
        self.iter().map(|b| b.to_record()).collect()
    }
}

// ── Completeness ─────────────────────────────────────────────────────────────

/// Coarse verdict over the blocks the field layout reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// Every block the layout reads is present.
    Complete,
    /// Some layout blocks present.
    Partial,
    /// No layout block present.
    Empty,
}

/// Presence bitmap of the 64 block indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Completeness {
    bits: u64,
}

impl Completeness {
    pub fn is_present(&self, index: usize) -> bool {
        index < BLOCK_COUNT && self.bits & (1u64 << index) != 0
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones() as usize
    }

    pub fn is_full(&self) -> bool {
        self.bits == u64::MAX
    }

    pub fn present(&self) -> Vec<usize> {
        (0..BLOCK_COUNT).filter(|&i| self.is_present(i)).collect()
    }

    pub fn missing(&self) -> Vec<usize> {
        (0..BLOCK_COUNT).filter(|&i| !self.is_present(i)).collect()
    }

    pub fn covers(&self, indices: &[usize]) -> bool {
        indices.iter().all(|&i| self.is_present(i))
    }

    /// Layout blocks that are absent.
    pub fn missing_layout_blocks(&self) -> Vec<usize> {
        layout::referenced_blocks().into_iter().filter(|&i| !self.is_present(i)).collect()
    }

    pub fn coverage(&self) -> Coverage {
        let wanted = layout::referenced_blocks();
        if self.covers(&wanted) {
            Coverage::Complete
        } else if wanted.iter().any(|&i| self.is_present(i)) {
            Coverage::Partial
        } else {
            Coverage::Empty
        }
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        let wanted = layout::referenced_blocks().len();
        let missing = self.missing_layout_blocks();
        format!(
            "{:?} coverage: {}/{} blocks present, {}/{} layout blocks present{}",
            self.coverage(),
            self.count(),
            BLOCK_COUNT,
            wanted - missing.len(),
            wanted,
            if missing.is_empty() { String::new() } else { format!(" (missing {missing:?})") },
        )
    }
}

impl fmt::Display for Completeness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn first_wins_by_default() {
        let mut t = BlockTable::new();
        assert_eq!(t.insert(3, &[1u8; 16]), Ok(InsertOutcome::Inserted));
        assert_eq!(t.insert(3, &[1u8; 16]), Ok(InsertOutcome::Duplicate));
        assert_eq!(t.insert(3, &[2u8; 16]), Ok(InsertOutcome::Conflict));
        assert_eq!(t.get(3), Some(&[1u8; 16]));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn explicit_overwrite_replaces() {
        let mut t = BlockTable::new();
        t.insert(0, &[0xAA; 16]).unwrap();
        assert_eq!(
            t.insert_with(0, &[0xBB; 16], MergePolicy::Overwrite),
            Ok(InsertOutcome::Replaced)
        );
        assert_eq!(t.get(0), Some(&[0xBB; 16]));
        assert_eq!(
            t.insert_with(0, &[0xBB; 16], MergePolicy::Overwrite),
            Ok(InsertOutcome::Duplicate)
        );
    }

    #[test]
    fn out_of_order_arrival() {
        let mut t = BlockTable::new();
        for i in [16usize, 2, 0, 9, 5, 1] {
            t.insert(i, &[i as u8; 16]).unwrap();
        }
        let order: Vec<u8> = t.iter().map(|b| b.index).collect();
        assert_eq!(order, vec![0, 1, 2, 5, 9, 16]);
        assert_eq!(t.completeness().present(), vec![0, 1, 2, 5, 9, 16]);
    }

    #[test]
    fn rejects_bad_index() {
        let mut t = BlockTable::new();
        assert_eq!(t.insert(64, &[0u8; 16]), Err(BlockError::IndexOutOfRange(64)));
        assert!(t.get(300).is_none());
        assert!(t.is_empty());
    }

    #[test]
    fn bad_records_are_skipped() {
        let records = vec![
            BlockRecord::new(2, &[0x50; 16]),
            BlockRecord { index: 5, data: "AABBC".into() },
            BlockRecord { index: 6, data: format!("ZZ{}", "00".repeat(15)) },
            BlockRecord { index: 7, data: "AABBCC".into() },
            BlockRecord::new(2, &[0x99; 16]),
        ];
        let t = BlockTable::from_records(&records);
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(2), Some(&[0x50; 16]));
    }

    #[test]
    fn dump_bytes_chunking() {
        let mut image = vec![0u8; 40];
        image[16] = 0x11;
        let t = BlockTable::from_dump_bytes(&image);
        // 40 bytes = two full blocks and an 8-byte tail that is dropped
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(1).unwrap()[0], 0x11);
        assert!(!t.contains(2));

        let oversized = vec![0u8; MAX_DUMP_LEN + 16];
        assert_eq!(BlockTable::from_dump_bytes(&oversized).len(), BLOCK_COUNT);
    }

    #[test]
    fn image_zero_fills_gaps() {
        let mut t = BlockTable::new();
        t.insert(63, &[0xFF; 16]).unwrap();
        let img = t.to_bytes();
        assert_eq!(img.len(), MAX_DUMP_LEN);
        assert!(img[..MAX_DUMP_LEN - 16].iter().all(|&b| b == 0));
        assert!(img[MAX_DUMP_LEN - 16..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn coverage_verdicts() {
        let mut t = BlockTable::new();
        assert_eq!(t.completeness().coverage(), Coverage::Empty);
        // block 3 is a trailer, not read by the layout
        t.insert(3, &[0u8; 16]).unwrap();
        assert_eq!(t.completeness().coverage(), Coverage::Empty);
        t.insert(5, &[0u8; 16]).unwrap();
        assert_eq!(t.completeness().coverage(), Coverage::Partial);
        for i in layout::referenced_blocks() {
            t.insert(i, &[0u8; 16]).unwrap();
        }
        let c = t.completeness();
        assert_eq!(c.coverage(), Coverage::Complete);
        assert!(c.missing_layout_blocks().is_empty());
        assert!(!c.is_full());
        assert!(c.covers(&[0, 5, 16]));
        assert!(c.covers(&[3, 5]));
        assert!(!c.covers(&[62]));
        assert!(c.summary().starts_with("Complete coverage"));
    }

    proptest! {
        #[test]
        fn malformed_lengths_never_stored(
            index in 0usize..64,
            len in (0usize..64).prop_filter("not a block", |l| *l != BLOCK_SIZE),
        ) {
            let mut t = BlockTable::new();
            t.insert(1, &[7u8; 16]).unwrap();
            let before = t.completeness();
            let err = t.insert(index, &vec![0u8; len]).unwrap_err();
            prop_assert_eq!(err, BlockError::MalformedBlockLength { index: index as u8, len });
            prop_assert_eq!(t.completeness(), before);
        }

        #[test]
        fn insertion_order_does_not_matter(mut indices in proptest::collection::vec(0usize..64, 0..40)) {
            let mut a = BlockTable::new();
            for &i in &indices {
                a.insert(i, &[i as u8; 16]).unwrap();
            }
            indices.reverse();
            let mut b = BlockTable::new();
            for &i in &indices {
                b.insert(i, &[i as u8; 16]).unwrap();
            }
            prop_assert_eq!(a, b);
        }
    }
}
