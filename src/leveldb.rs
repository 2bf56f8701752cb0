//! [`Store`] backed by an on-disk LevelDB database through `rusty-leveldb`.

use std::marker::PhantomData;
use std::path::Path;
use std::rc::Rc;

use log::{debug, info};
use rusty_leveldb::{BloomPolicy, DBIterator, LdbIterator, Options, DB};

use crate::codec::{CodecHealth, CodecRegistry};
use crate::store::{Cursor, ReadOptions, Store};
use crate::{ScanConfig, StoreError};

pub struct LevelDbStore {
    db: DB,
    health: CodecHealth,
}

impl LevelDbStore {
    /// Opens an existing database. Never creates one: a missing directory or a
    /// directory without a database is an error, as is a database locked by
    /// another process.
    pub fn open(path: impl AsRef<Path>, config: &ScanConfig) -> Result<Self, StoreError> {
        let path = path.as_ref();
        // the engine would otherwise create the directory before failing
        if !path.is_dir() {
            return Err(StoreError::Missing(path.to_path_buf()));
        }
        Self::open_with(path, config, false)
    }

    /// Opens the database at `path`, creating it if needed. Used to seed
    /// databases for tests and benchmarks.
    pub fn create(path: impl AsRef<Path>, config: &ScanConfig) -> Result<Self, StoreError> {
        Self::open_with(path.as_ref(), config, true)
    }

    fn open_with(
        path: &Path,
        config: &ScanConfig,
        create_if_missing: bool,
    ) -> Result<Self, StoreError> {
        let health = CodecHealth::default();
        let options = engine_options(config, &health, create_if_missing)?;

        let db = DB::open(path, options)?;
        info!("opened database at {}", path.display());

        Ok(LevelDbStore { db, health })
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.db.put(key, value)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Decode counters of the codecs registered by this store.
    pub fn codec_health(&self) -> &CodecHealth {
        &self.health
    }
}

fn engine_options(
    config: &ScanConfig,
    health: &CodecHealth,
    create_if_missing: bool,
) -> Result<Options, StoreError> {
    let mut options = Options {
        filter_policy: Rc::new(Box::new(BloomPolicy::new(config.filter_bits_per_key))),
        block_cache_capacity_bytes: config.block_cache_bytes,
        write_buffer_size: config.write_buffer_bytes,
        reuse_logs: config.reuse_logs_on_open,
        create_if_missing,
        log: None,
        ..Options::default()
    };

    if !config.compressor_slots.is_empty() {
        let registry = CodecRegistry::new(
            &config.compressor_slots,
            config.reuse_inflate_state,
            health.clone(),
        )?;
        debug!(
            "compressor slots {:?}, writing with id {}",
            registry.slots().collect::<Vec<_>>(),
            registry.writer_id()
        );
        options.compressor = registry.writer_id();
        options.compressor_list = Rc::new(registry.into_compressor_list());
    }

    Ok(options)
}

impl Store for LevelDbStore {
    fn cursor(&mut self, options: &ReadOptions) -> Result<Box<dyn Cursor + '_>, StoreError> {
        // rusty-leveldb has no per-iterator cache switch; blocks always go through the cache
        debug!("creating cursor, fill_cache={}", options.fill_cache);
        let iter = self.db.new_iter()?;

        Ok(Box::new(LevelDbCursor {
            iter,
            current: None,
            health: self.health.clone(),
            failures_at_start: self.health.failures(),
            _store: PhantomData,
        }))
    }
}

struct LevelDbCursor<'a> {
    iter: DBIterator,
    current: Option<(Vec<u8>, Vec<u8>)>,
    health: CodecHealth,
    failures_at_start: u64,
    _store: PhantomData<&'a mut DB>,
}

impl Cursor for LevelDbCursor<'_> {
    fn seek_to_first(&mut self) {
        self.iter.reset();
        self.next();
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_slice()).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|(_, v)| v.as_slice()).unwrap_or_default()
    }

    fn next(&mut self) {
        self.current =
            LdbIterator::next(&mut self.iter).map(|(k, v)| (Vec::from(k), Vec::from(v)));
    }

    fn status(&self) -> Result<(), StoreError> {
        let failures = self.health.failures() - self.failures_at_start;
        if failures > 0 {
            return Err(StoreError::Corruption(format!(
                "{} block(s) failed to decompress",
                failures
            )));
        }
        Ok(())
    }
}
