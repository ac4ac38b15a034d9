/// Maximum number of hops when collapsing a redirect chain.
///
/// Chains needing more substitutions than this resolve to nothing. The cap is
/// part of the output contract: every component that follows redirects must
/// use the same value or runs stop being reproducible.
pub const REDIRECT_MAX_HOPS: u32 = 100;

/// Progress update interval (tick every N rows)
pub const PROGRESS_INTERVAL: u64 = 100_000;

/// Buffer size for stdout data writers
pub const WRITE_BUF_SIZE: usize = 128 * 1024;

/// Buffer size for decompressing readers
pub const READ_BUF_SIZE: usize = 256 * 1024;

/// Delimiter between ids inside a serialized link list
pub const LIST_DELIMITER: char = '|';

/// Rows handed to rayon per batch by the in-memory join strategy
pub const JOIN_BATCH_SIZE: usize = 65_536;

/// Expected extension for raw dump inputs
pub const DUMP_EXTENSION: &str = ".sql.bz2";

/// Expected extension for intermediate record files
pub const RECORD_EXTENSION: &str = ".bz2";

/// Default filename for the streaming join strategy's relation store
pub const DEFAULT_STORE_FILE: &str = "relations.db";
