//! Full-scan micro-benchmarks for LevelDB databases.
//! Opens an existing database read-only in spirit, walks every record in key order
//! and folds keys and values through CRC32C so the reads cannot be optimised away.

pub mod checksum;
pub mod codec;
pub mod leveldb;
pub mod memstore;
pub mod scan;
pub mod store;

use std::path::PathBuf;

use thiserror::Error;

pub use crate::codec::{CodecKind, CodecRegistry};
pub use crate::scan::{run, run_scan, ScanSummary};
pub use crate::store::{Cursor, ReadOptions, Store};

/// Where both benchmark binaries expect the world database, relative to the
/// working directory.
pub const DEFAULT_DB_PATH: &str = "../put-mc-world-db-here/db";

/// Errors raised by a block codec or while building a codec registry.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("no codec registered for compression id {0}")]
    UnknownId(u8),
    #[error("compression id {0} is registered in more than one slot")]
    DuplicateId(u8),
    #[error("{0:?} stream ended before the block was fully decoded")]
    Truncated(CodecKind),
    #[error("inflate error: {0}")]
    Inflate(#[from] flate2::DecompressError),
    #[error("I/O error: {0}")]
    IO(#[from] std::io::Error),
}

/// Errors surfaced by a [`Store`] or one of its cursors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no database directory at {}", .0.display())]
    Missing(PathBuf),
    #[error("storage engine error ({code}): {message}")]
    Engine { code: String, message: String },
    #[error("corruption: {0}")]
    Corruption(String),
    #[error("codec setup failed: {0}")]
    Codec(#[from] CodecError),
}

impl From<rusty_leveldb::Status> for StoreError {
    fn from(status: rusty_leveldb::Status) -> Self {
        StoreError::Engine {
            code: format!("{:?}", status.code),
            message: status.err,
        }
    }
}

/// Fatal outcomes of a benchmark run. Each maps to a distinct process exit status.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to open database at {}: {}", .path.display(), .source)]
    Open {
        path: PathBuf,
        #[source]
        source: StoreError,
    },
    #[error("failed to create a cursor: {0}")]
    Cursor(#[source] StoreError),
    #[error("iteration stopped after {entries} entries: {source}")]
    Iteration {
        entries: u32,
        #[source]
        source: StoreError,
    },
    #[error("failed to write scan output: {0}")]
    Output(#[from] std::io::Error),
}

impl ScanError {
    /// Process exit status reported for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScanError::Open { .. } => 1,
            ScanError::Cursor(_) => 2,
            ScanError::Iteration { .. } => 3,
            ScanError::Output(_) => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Configuration for one benchmark variant.
///
/// Nothing here is read from the command line; each binary picks a constructor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Database directory
    pub db_path: PathBuf,
    /// Bloom filter size used for point lookups
    pub filter_bits_per_key: u32,
    /// Capacity of the engine's block cache in bytes
    pub block_cache_bytes: usize,
    /// Memtable size before it is written out as a table
    pub write_buffer_bytes: usize,
    /// Keep appending to the previous write-ahead log instead of rewriting it on open.
    /// Killing the process mid-run risks corrupting the log with this enabled.
    pub reuse_logs_on_open: bool,
    /// Whether blocks read by the scan are inserted into the block cache
    pub fill_cache_on_scan: bool,
    /// Codec slots in priority order. Slot 0 compresses new blocks, every slot
    /// is available for reading. Empty keeps the engine's built-in codecs.
    pub compressor_slots: Vec<CodecKind>,
    /// Reuse one inflate state per codec instead of allocating one per block
    pub reuse_inflate_state: bool,
    /// Print a progress line every this many entries; 0 disables progress lines
    pub progress_interval: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            filter_bits_per_key: 10,
            block_cache_bytes: 40 << 20, // 40MB, sized for ~1GB devices
            write_buffer_bytes: 4 << 20,
            reuse_logs_on_open: true,
            fill_cache_on_scan: false,
            compressor_slots: Vec::new(),
            reuse_inflate_state: false,
            progress_interval: 10_000,
        }
    }
}

impl ScanConfig {
    /// Raw deflate for writes with zlib kept readable for blocks written by
    /// older versions, decoded through a reused inflate state.
    pub fn zlib() -> Self {
        ScanConfig {
            compressor_slots: vec![CodecKind::ZlibRaw, CodecKind::Zlib],
            reuse_inflate_state: true,
            ..Self::default()
        }
    }

    /// The engine's own codecs and allocation behaviour.
    pub fn engine_default() -> Self {
        Self::default()
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            fill_cache: self.fill_cache_on_scan,
        }
    }
}
