//! Running CRC32C and the per-entry tally kept by the scan loop.

/// A CRC32C accumulator that is extended one byte sequence at a time.
///
/// Extending from a fresh accumulator with `a` and then `b` yields the same value
/// as a one-shot CRC32C over `a` followed by `b`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checksum(u32);

impl Checksum {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.0 = crc32c::crc32c_append(self.0, bytes);
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Entry count, checksum and byte total for one scan.
///
/// All three only change through [`Tally::record`], so an entry is either fully
/// accounted for or not at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    entries: u32,
    checksum: Checksum,
    bytes: u64,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one key/value pair into the tally, key first.
    pub fn record(&mut self, key: &[u8], value: &[u8]) {
        self.checksum.extend(key);
        self.checksum.extend(value);
        // 32-bit counter; wraps rather than saturating
        self.entries = self.entries.wrapping_add(1);
        self.bytes += (key.len() + value.len()) as u64;
    }

    pub fn entries(&self) -> u32 {
        self.entries
    }

    pub fn checksum(&self) -> u32 {
        self.checksum.value()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
