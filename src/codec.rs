//! Block codecs and the slot-indexed registry that hands them to the engine.
//!
//! Every compressed block on disk carries a one-byte compression id. A registry
//! holds codecs in priority slots: slot 0 is the codec used to compress new
//! blocks, while reads look the block's id up among all registered slots. This
//! is what keeps old zlib-with-header blocks readable once raw deflate becomes
//! the writer. Id 0 always means "stored uncompressed".

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{Read, Write};
use std::rc::Rc;

use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, ZlibEncoder};
use flate2::{Compression, Decompress, FlushDecompress, Status};
use log::{trace, warn};
use rusty_leveldb::compressor::NoneCompressor;
use rusty_leveldb::{Compressor, CompressorId, CompressorList, StatusCode};

use crate::CodecError;

/// Id reserved for blocks stored without compression.
pub const UNCOMPRESSED_ID: u8 = 0;

const MIN_INFLATE_CAPACITY: usize = 4096;

/// The compression formats found in Bedrock world databases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecKind {
    /// Deflate wrapped in a zlib header and adler32 trailer. Older worlds.
    Zlib,
    /// Bare deflate stream. Current writer format.
    ZlibRaw,
}

impl CodecKind {
    /// The id stored next to each block compressed with this codec.
    pub const fn id(self) -> u8 {
        match self {
            CodecKind::Zlib => 2,
            CodecKind::ZlibRaw => 4,
        }
    }

    fn zlib_header(self) -> bool {
        matches!(self, CodecKind::Zlib)
    }
}

/// Decode statistics shared between a store and the codecs it registered.
///
/// The engine swallows codec errors into an invalid iterator, so this is how
/// the scan finds out a block failed to decompress.
#[derive(Clone, Debug, Default)]
pub struct CodecHealth {
    inner: Rc<HealthCounters>,
}

#[derive(Debug, Default)]
struct HealthCounters {
    decoded: Cell<u64>,
    failures: Cell<u64>,
}

impl CodecHealth {
    pub fn blocks_decoded(&self) -> u64 {
        self.inner.decoded.get()
    }

    pub fn failures(&self) -> u64 {
        self.inner.failures.get()
    }

    fn record_decoded(&self) {
        self.inner.decoded.set(self.inner.decoded.get() + 1);
    }

    fn record_failure(&self) {
        self.inner.failures.set(self.inner.failures.get() + 1);
    }
}

/// One registered codec, optionally holding an inflate state that is reset and
/// reused for every block instead of being allocated per block.
pub struct Codec {
    kind: CodecKind,
    inflater: Option<RefCell<Decompress>>,
    health: CodecHealth,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("kind", &self.kind)
            .field("reuses_inflate_state", &self.inflater.is_some())
            .finish()
    }
}

impl Codec {
    pub fn new(kind: CodecKind, reuse_inflate_state: bool, health: CodecHealth) -> Self {
        let inflater =
            reuse_inflate_state.then(|| RefCell::new(Decompress::new(kind.zlib_header())));
        Self {
            kind,
            inflater,
            health,
        }
    }

    pub fn kind(&self) -> CodecKind {
        self.kind
    }

    pub fn encode(&self, block: &[u8]) -> Result<Vec<u8>, CodecError> {
        let level = Compression::default();
        let encoded = match self.kind {
            CodecKind::Zlib => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(block.len()), level);
                encoder.write_all(block)?;
                encoder.finish()?
            }
            CodecKind::ZlibRaw => {
                let mut encoder = DeflateEncoder::new(Vec::with_capacity(block.len()), level);
                encoder.write_all(block)?;
                encoder.finish()?
            }
        };
        Ok(encoded)
    }

    /// Decodes one block, recording the outcome in the shared [`CodecHealth`].
    pub fn decode(&self, block: &[u8]) -> Result<Vec<u8>, CodecError> {
        let decoded = match &self.inflater {
            Some(state) => self.inflate_reusing(&mut state.borrow_mut(), block),
            None => self.inflate_fresh(block),
        };

        match &decoded {
            Ok(out) => {
                self.health.record_decoded();
                trace!("{:?}: {} -> {} bytes", self.kind, block.len(), out.len());
            }
            Err(e) => {
                self.health.record_failure();
                warn!("{:?} block of {} bytes failed to decode: {}", self.kind, block.len(), e);
            }
        }
        decoded
    }

    fn inflate_fresh(&self, block: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::with_capacity(block.len().saturating_mul(4));
        match self.kind {
            CodecKind::Zlib => ZlibDecoder::new(block).read_to_end(&mut out)?,
            CodecKind::ZlibRaw => DeflateDecoder::new(block).read_to_end(&mut out)?,
        };
        Ok(out)
    }

    fn inflate_reusing(&self, state: &mut Decompress, block: &[u8]) -> Result<Vec<u8>, CodecError> {
        state.reset(self.kind.zlib_header());
        let mut out =
            Vec::with_capacity(block.len().saturating_mul(4).max(MIN_INFLATE_CAPACITY));

        loop {
            if out.len() == out.capacity() {
                out.reserve(out.capacity());
            }
            let consumed = state.total_in();
            let produced = state.total_out();
            let input = &block[consumed as usize..];

            match state.decompress_vec(input, &mut out, FlushDecompress::None)? {
                Status::StreamEnd => return Ok(out),
                // room to write and nothing moved: the input ran out mid-stream
                _ if state.total_in() == consumed && state.total_out() == produced => {
                    return Err(CodecError::Truncated(self.kind));
                }
                _ => {}
            }
        }
    }
}

/// Codecs in priority slots.
#[derive(Debug)]
pub struct CodecRegistry {
    slots: Vec<Rc<Codec>>,
    health: CodecHealth,
}

impl CodecRegistry {
    /// Builds a registry with `kinds[0]` as the writer. Rejects a kind listed twice,
    /// since two slots claiming one on-disk id would make reads ambiguous.
    pub fn new(
        kinds: &[CodecKind],
        reuse_inflate_state: bool,
        health: CodecHealth,
    ) -> Result<Self, CodecError> {
        let mut slots: Vec<Rc<Codec>> = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            if slots.iter().any(|codec| codec.kind() == kind) {
                return Err(CodecError::DuplicateId(kind.id()));
            }
            slots.push(Rc::new(Codec::new(kind, reuse_inflate_state, health.clone())));
        }
        Ok(Self { slots, health })
    }

    pub fn slots(&self) -> impl Iterator<Item = CodecKind> + '_ {
        self.slots.iter().map(|codec| codec.kind())
    }

    /// Id new blocks are written with: slot 0, or uncompressed for an empty registry.
    pub fn writer_id(&self) -> u8 {
        self.slots
            .first()
            .map_or(UNCOMPRESSED_ID, |codec| codec.kind().id())
    }

    /// Compresses with the slot 0 codec and returns the id to store alongside.
    pub fn encode(&self, block: &[u8]) -> Result<(u8, Vec<u8>), CodecError> {
        match self.slots.first() {
            Some(codec) => Ok((codec.kind().id(), codec.encode(block)?)),
            None => Ok((UNCOMPRESSED_ID, block.to_vec())),
        }
    }

    /// Decompresses a block tagged with `id`, whichever slot registered it.
    pub fn decode(&self, id: u8, block: &[u8]) -> Result<Vec<u8>, CodecError> {
        if id == UNCOMPRESSED_ID {
            return Ok(block.to_vec());
        }
        self.slots
            .iter()
            .find(|codec| codec.kind().id() == id)
            .ok_or(CodecError::UnknownId(id))?
            .decode(block)
    }

    /// Converts into the engine's id-indexed list, with id 0 bound to no compression.
    ///
    /// Every id no slot claims is bound to a codec that rejects the block and
    /// counts the failure: the engine skips blocks it cannot decode, so an empty
    /// entry in the list would drop them without a trace.
    pub fn into_compressor_list(self) -> CompressorList {
        let mut list = CompressorList::new();
        list.set(NoneCompressor);
        for codec in self.slots {
            match codec.kind() {
                CodecKind::Zlib => {
                    list.set(ZlibSlot(codec));
                }
                CodecKind::ZlibRaw => {
                    list.set(ZlibRawSlot(codec));
                }
            }
        }
        for id in 1..=u8::MAX {
            if !list.is_set(id) {
                list.set_with_id(
                    id,
                    UnknownSlot {
                        id,
                        health: self.health.clone(),
                    },
                );
            }
        }
        list
    }
}

/// Engine entry for a compression id with no registered codec.
#[derive(Debug)]
struct UnknownSlot {
    id: u8,
    health: CodecHealth,
}

impl Compressor for UnknownSlot {
    fn encode(&self, _block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        Err(engine_status(CodecError::UnknownId(self.id)))
    }

    fn decode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
        self.health.record_failure();
        warn!("block of {} bytes has unregistered compression id {}", block.len(), self.id);
        Err(engine_status(CodecError::UnknownId(self.id)))
    }
}

fn engine_status(err: CodecError) -> rusty_leveldb::Status {
    rusty_leveldb::Status::new(StatusCode::Corruption, &err.to_string())
}

macro_rules! engine_slot {
    ($name:ident, $kind:expr) => {
        #[derive(Debug)]
        struct $name(Rc<Codec>);

        impl CompressorId for $name {
            const ID: u8 = $kind.id();
        }

        impl Compressor for $name {
            fn encode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
                self.0.encode(&block).map_err(engine_status)
            }

            fn decode(&self, block: Vec<u8>) -> rusty_leveldb::Result<Vec<u8>> {
                self.0.decode(&block).map_err(engine_status)
            }
        }
    };
}

engine_slot!(ZlibSlot, CodecKind::Zlib);
engine_slot!(ZlibRawSlot, CodecKind::ZlibRaw);
