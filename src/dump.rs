//! Tag dump files.
//!
//! Two on-disk forms are understood:
//!
//! | Extension | Layout |
//! |-----------|--------|
//! | `.json` | `{"uid": "DEADBEEF", "blocks": [{"index": 0, "data": "<32 hex>"}, ...]}` |
//! | anything else (`.bin`, `.mfd`) | contiguous image, block `n` at byte `16 * n`, at most 1024 bytes |
//!
//! JSON dumps may list blocks in any order and may repeat an index; the
//! first occurrence wins when the dump is turned into a [`BlockTable`].

use std::fs;
use std::io;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::block::BlockRecord;
use crate::table::BlockTable;

#[derive(Error, Debug)]
pub enum DumpError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid JSON dump: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagDump {
    /// Tag UID as upper-case hex, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid:    Option<String>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
}

impl TagDump {
    pub fn from_table(uid: Option<&[u8]>, table: &BlockTable) -> Self {
        Self {
            uid:    uid.map(hex::encode_upper),
            blocks: table.to_records(),
        }
    }

    /// First-wins table of the dump's well-formed blocks.
    pub fn to_table(&self) -> BlockTable {
        BlockTable::from_records(&self.blocks)
    }

    /// UID bytes, falling back to the first four bytes of block 0.
    pub fn uid_bytes(&self) -> Option<Vec<u8>> {
        if let Some(bytes) = self.uid.as_deref().and_then(|s| hex::decode(s).ok()) {
            return Some(bytes);
        }
        self.to_table().get(0).map(|b| b[..4].to_vec())
    }

    pub fn from_json(s: &str) -> Result<Self, DumpError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<String, DumpError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a dump, picking the format from the file extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DumpError> {
        let path = path.as_ref();
        let dump = if is_json(path) {
            Self::from_json(&fs::read_to_string(path)?)?
        } else {
            let table = BlockTable::from_dump_bytes(&fs::read(path)?);
            Self::from_table(None, &table)
        };
        tracing::debug!(path = %path.display(), blocks = dump.blocks.len(), "loaded dump");
        Ok(dump)
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<(), DumpError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Write the 1024-byte image; missing blocks are zero-filled.
    pub fn save_bin<P: AsRef<Path>>(&self, path: P) -> Result<(), DumpError> {
        fs::write(path, self.to_table().to_bytes())?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// `bambu_<UID>_<YYYYmmdd_HHMMSS>`, the usual stem for saved dumps.
pub fn default_stem(uid: Option<&[u8]>) -> String {
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    match uid {
        Some(uid) => format!("bambu_{}_{ts}", hex::encode_upper(uid)),
        None      => format!("bambu_tag_{ts}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_dump_parses_and_skips_bad_blocks() {
        let js = r#"{
            "uid": "deadbeef",
            "blocks": [
                {"index": 2, "data": "504C41000000000000000000000000 00"},
                {"index": 1, "data": "00"},
                {"index": 2, "data": "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF"}
            ]
        }"#;
        let dump = TagDump::from_json(js).unwrap();
        assert_eq!(dump.blocks.len(), 3);
        let t = dump.to_table();
        assert_eq!(t.len(), 1);
        assert_eq!(&t.get(2).unwrap()[..3], b"PLA");
        assert_eq!(dump.uid_bytes(), Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn uid_falls_back_to_block_0() {
        let mut t = BlockTable::new();
        t.insert(0, &[0x01, 0x02, 0x03, 0x04, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        let dump = TagDump::from_table(None, &t);
        assert_eq!(dump.uid, None);
        assert_eq!(dump.uid_bytes(), Some(vec![1, 2, 3, 4]));
        assert_eq!(TagDump::default().uid_bytes(), None);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(TagDump::from_json("{not json"), Err(DumpError::Json(_))));
    }

    #[test]
    fn stem_shape() {
        let stem = default_stem(Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
        assert!(stem.starts_with("bambu_DEADBEEF_"));
        assert_eq!(stem.len(), "bambu_DEADBEEF_".len() + 15);
        assert!(default_stem(None).starts_with("bambu_tag_"));
    }
}
