use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per tag block.
pub const BLOCK_SIZE: usize = 16;
/// Blocks on a 1K tag.
pub const BLOCK_COUNT: usize = 64;
/// Blocks per sector; the last one is the sector trailer.
pub const BLOCKS_PER_SECTOR: usize = 4;
/// Largest contiguous dump image.
pub const MAX_DUMP_LEN: usize = BLOCK_SIZE * BLOCK_COUNT;

pub type BlockData = [u8; BLOCK_SIZE];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Block {index} is {len} bytes, expected 16")]
    MalformedBlockLength { index: u8, len: usize },
    #[error("Block index {0} out of range (0..64)")]
    IndexOutOfRange(usize),
    #[error("Block {index} is not valid hex: {reason}")]
    InvalidHex { index: usize, reason: String },
}

/// Sector that owns block `index`.
pub fn sector_of(index: u8) -> u8 {
    index / BLOCKS_PER_SECTOR as u8
}

/// First block of `sector`.
pub fn first_block(sector: u8) -> u8 {
    sector * BLOCKS_PER_SECTOR as u8
}

pub fn is_trailer(index: u8) -> bool {
    index as usize % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
}

/// One block as produced by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBlock {
    pub index: u8,
    pub data:  BlockData,
}

impl RawBlock {
    /// Validate index range and length.
    pub fn new(index: usize, data: &[u8]) -> Result<Self, BlockError> {
        if index >= BLOCK_COUNT {
            return Err(BlockError::IndexOutOfRange(index));
        }
        let index = index as u8;
        let data: BlockData = data
            .try_into()
            .map_err(|_| BlockError::MalformedBlockLength { index, len: data.len() })?;
        Ok(Self { index, data })
    }

    pub fn to_record(&self) -> BlockRecord {
        BlockRecord::new(self.index as usize, &self.data)
    }
}

// ── BlockRecord ──────────────────────────────────────────────────────────────

/// Exchange form of a block: `{"index": 5, "data": "AABBCC00..."}`.
///
/// `data` stays as text so a dump with one bad entry still loads; hex and
/// length checks happen when the record enters a `BlockTable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub index: usize,
    pub data:  String,
}

impl BlockRecord {
    pub fn new(index: usize, data: &[u8]) -> Self {
        Self { index, data: hex::encode_upper(data) }
    }

    /// Decoded payload. Case-insensitive; whitespace is ignored.
    pub fn bytes(&self) -> Result<Vec<u8>, BlockError> {
        let cleaned: String = self.data.chars().filter(|c| !c.is_whitespace()).collect();
        hex::decode(cleaned).map_err(|e| BlockError::InvalidHex {
            index:  self.index,
            reason: e.to_string(),
        })
    }

    pub fn to_block(&self) -> Result<RawBlock, BlockError> {
        if self.index >= BLOCK_COUNT {
            return Err(BlockError::IndexOutOfRange(self.index));
        }
        RawBlock::new(self.index, &self.bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_block_validates() {
        assert!(RawBlock::new(5, &[0u8; 16]).is_ok());
        assert_eq!(
            RawBlock::new(5, &[0u8; 15]),
            Err(BlockError::MalformedBlockLength { index: 5, len: 15 })
        );
        assert_eq!(RawBlock::new(64, &[0u8; 16]), Err(BlockError::IndexOutOfRange(64)));
    }

    #[test]
    fn sector_geometry() {
        assert_eq!(sector_of(0), 0);
        assert_eq!(sector_of(16), 4);
        assert_eq!(sector_of(63), 15);
        assert_eq!(first_block(4), 16);
        assert!(is_trailer(3));
        assert!(is_trailer(63));
        assert!(!is_trailer(16));
    }

    #[test]
    fn record_hex_is_lenient_on_input() {
        let r = BlockRecord { index: 1, data: "aa bb cc dd".into() };
        assert_eq!(r.bytes(), Ok(vec![0xAA, 0xBB, 0xCC, 0xDD]));
        assert!(matches!(
            BlockRecord { index: 1, data: "xyz".into() }.bytes(),
            Err(BlockError::InvalidHex { index: 1, .. })
        ));
    }

    #[test]
    fn record_to_block_checks_everything() {
        let good = BlockRecord::new(5, &[0x11; 16]);
        assert_eq!(good.to_block(), Ok(RawBlock { index: 5, data: [0x11; 16] }));

        let short = BlockRecord { index: 5, data: "AABBCC".into() };
        assert_eq!(short.to_block(), Err(BlockError::MalformedBlockLength { index: 5, len: 3 }));

        let odd = BlockRecord { index: 5, data: "AABBC".into() };
        assert!(matches!(odd.to_block(), Err(BlockError::InvalidHex { index: 5, .. })));

        let far = BlockRecord { index: 300, data: "zz".into() };
        assert_eq!(far.to_block(), Err(BlockError::IndexOutOfRange(300)));
    }

    #[test]
    fn record_json_uses_upper_hex() {
        let r = RawBlock::new(2, &[0xab; 16]).unwrap().to_record();
        let js = serde_json::to_string(&r).unwrap();
        assert_eq!(js, format!(r#"{{"index":2,"data":"{}"}}"#, "AB".repeat(16)));

        // bad hex still parses as a record; it is rejected at the table
        let back: BlockRecord = serde_json::from_str(r#"{"index":2,"data":"not hex"}"#).unwrap();
        assert!(back.to_block().is_err());
    }
}
