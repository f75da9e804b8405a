pub mod block;
pub mod crypto;
pub mod table;
pub mod layout;
pub mod decode;
pub mod reader;
pub mod session;
pub mod dump;
pub mod payload;

pub use block::{BlockData, BlockError, BlockRecord, RawBlock};
pub use crypto::{derive_keys, CryptoError, MasterSecret, SectorKey, SectorKeys};
pub use table::{BlockTable, Completeness, Coverage, InsertOutcome, MergePolicy};
pub use layout::{Field, FieldSpec, FIELDS};
pub use decode::{decode, decode_fields, DecodedSpool, Temperatures, Value};
pub use reader::{acquire, AcquireOptions, AcquireReport, MemoryTag, TagReader};
pub use session::{Session, SessionConfig, SessionOutcome};
pub use dump::{DumpError, TagDump};
pub use payload::SpoolmanPayload;
