//! In-memory [`Store`] implementation.
//!
//! Keeps key-value pairs sorted in a BTreeMap so its cursors walk keys in the
//! same ascending byte order as an on-disk database. Used to drive the scan in
//! tests and benchmarks without touching the filesystem, and can inject the
//! failures a real engine would report.

use std::collections::btree_map;
use std::collections::BTreeMap;

use crate::store::{Cursor, ReadOptions, Store};
use crate::StoreError;

/// A failure to simulate on the next cursors handed out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// `cursor()` fails outright.
    RefuseCursor,
    /// Cursors go invalid after yielding this many entries and report corruption.
    CorruptAfter(usize),
}

#[derive(Debug, Default)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    fault: Option<Fault>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a pair.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    pub fn inject(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn clear_fault(&mut self) {
        self.fault = None;
    }
}

impl Store for MemStore {
    fn cursor(&mut self, _options: &ReadOptions) -> Result<Box<dyn Cursor + '_>, StoreError> {
        let corrupt_after = match self.fault {
            Some(Fault::RefuseCursor) => {
                return Err(StoreError::Corruption("cursor refused".to_string()));
            }
            Some(Fault::CorruptAfter(n)) => Some(n),
            None => None,
        };

        Ok(Box::new(MemCursor {
            data: &self.data,
            iter: self.data.iter(),
            current: None,
            yielded: 0,
            corrupt_after,
            corrupted: false,
        }))
    }
}

struct MemCursor<'a> {
    data: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    iter: btree_map::Iter<'a, Vec<u8>, Vec<u8>>,
    current: Option<(&'a [u8], &'a [u8])>,
    yielded: usize,
    corrupt_after: Option<usize>,
    corrupted: bool,
}

impl Cursor for MemCursor<'_> {
    fn seek_to_first(&mut self) {
        self.iter = self.data.iter();
        self.yielded = 0;
        self.corrupted = false;
        self.next();
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.map(|(k, _)| k).unwrap_or_default()
    }

    fn value(&self) -> &[u8] {
        self.current.map(|(_, v)| v).unwrap_or_default()
    }

    fn next(&mut self) {
        if self.corrupt_after == Some(self.yielded) {
            self.corrupted = true;
            self.current = None;
            return;
        }
        self.current = self.iter.next().map(|(k, v)| (k.as_slice(), v.as_slice()));
        if self.current.is_some() {
            self.yielded += 1;
        }
    }

    fn status(&self) -> Result<(), StoreError> {
        if self.corrupted {
            return Err(StoreError::Corruption(format!(
                "bad block after {} entries",
                self.yielded
            )));
        }
        Ok(())
    }
}
