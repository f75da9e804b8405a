//! High-level [`Session`] API, the primary embedding surface.
//!
//! ```no_run
//! use spooltag::reader::MemoryTag;
//! use spooltag::session::{Session, SessionConfig};
//! use spooltag::table::BlockTable;
//!
//! let mut tag = MemoryTag::unlocked(vec![0xDE, 0xAD, 0xBE, 0xEF], BlockTable::new());
//! let outcome = Session::read(&mut tag, &SessionConfig::default())?;
//! println!("{}", outcome.report.summary());
//! println!("{:?}", outcome.spool.filament_type);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::crypto::{derive_keys, CryptoError, MasterSecret, SectorKeys};
use crate::decode::{decode, DecodedSpool};
use crate::reader::{acquire, AcquireOptions, AcquireReport, TagReader};
use crate::table::BlockTable;

// ── SessionConfig ────────────────────────────────────────────────────────────

/// Configuration for [`Session::read`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionConfig {
    /// Salt for sector key derivation. Defaults to the compiled-in secret.
    pub master_secret: MasterSecret,
    pub acquire:       AcquireOptions,
}

impl SessionConfig {
    pub fn with_master_secret(mut self, master_secret: MasterSecret) -> Self {
        self.master_secret = master_secret;
        self
    }
}

// ── SessionOutcome ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub keys:   SectorKeys,
    pub report: AcquireReport,
    pub spool:  DecodedSpool,
}

impl SessionOutcome {
    pub fn table(&self) -> &BlockTable {
        &self.report.table
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

pub struct Session;

impl Session {
    /// Derive keys for the tag in `reader`, acquire its blocks and decode them.
    ///
    /// Fails only when the tag identifier cannot be used for key derivation;
    /// in that case no block is read. Any other shortfall shows up as
    /// missing fields in the decoded record.
    pub fn read<R: TagReader + ?Sized>(
        reader: &mut R,
        config: &SessionConfig,
    ) -> Result<SessionOutcome, CryptoError> {
        let keys = derive_keys(reader.identifier(), &config.master_secret)?;
        let report = acquire(reader, &keys, &config.acquire);
        let spool = decode(&report.table);
        Ok(SessionOutcome { keys, report, spool })
    }
}
