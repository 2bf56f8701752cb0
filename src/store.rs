//! The seam between the scan driver and a storage engine.

use crate::StoreError;

/// Per-cursor read settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// Insert blocks read through this cursor into the block cache
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions { fill_cache: true }
    }
}

/// An opened key-value database.
pub trait Store {
    /// Creates a forward cursor positioned before the first key. The cursor
    /// borrows the store and so cannot outlive it.
    fn cursor(&mut self, options: &ReadOptions) -> Result<Box<dyn Cursor + '_>, StoreError>;
}

/// Forward iteration over a store in ascending key order.
pub trait Cursor {
    /// Positions the cursor at the first key, if any.
    fn seek_to_first(&mut self);

    /// True while the cursor sits on an entry.
    fn valid(&self) -> bool;

    /// Key of the current entry. Only meaningful while `valid()`.
    fn key(&self) -> &[u8];

    /// Value of the current entry. Only meaningful while `valid()`.
    fn value(&self) -> &[u8];

    /// Moves to the next entry; the cursor becomes invalid past the last one.
    fn next(&mut self);

    /// Why the cursor became invalid: `Ok` for the end of the data, an error
    /// when iteration was cut short by something the store detected.
    fn status(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
