//! # Memory Error Types
//!
//! All errors that can occur in the allocator, segment table and ROM loader.

use thiserror::Error;

/// Errors raised by the RAM image, allocators and segment table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A region does not have room for the request.
    #[error("{kind}alloc failed for {size} bytes in region {region} ({start:#010x}-{end:#010x})", kind = freeable_prefix(.freeable))]
    OutOfMemory {
        /// Region that was asked.
        region: usize,
        /// Requested size in bytes.
        size: u32,
        /// Whether the request came from the freeable end.
        freeable: bool,
        /// Region forward cursor at the time of the request.
        start: u32,
        /// Region end cursor at the time of the request.
        end: u32,
    },

    /// Region id was never initialized.
    #[error("invalid region {0}")]
    InvalidRegion(usize),

    /// More regions were supplied than the context can snapshot.
    #[error("too many regions: {0}")]
    TooManyRegions(usize),

    /// A region lies outside the RAM image or is inverted.
    #[error("region {start:#010x}-{end:#010x} is outside RAM")]
    BadRegion {
        /// Requested start.
        start: u32,
        /// Requested end.
        end: u32,
    },

    /// The header in front of a freeable block has the wrong magic.
    #[error("incorrect magic for free at {addr:#010x} (found {magic:#06x})")]
    CorruptHeader {
        /// Address passed to free.
        addr: u32,
        /// Magic value found.
        magic: u16,
    },

    /// The block was already released, directly or by freeing an older block.
    #[error("freeable block {addr:#010x} was already released")]
    StaleFreeable {
        /// Address passed to free.
        addr: u32,
    },

    /// `pop_state` without a matching `push_state`.
    #[error("pop_state called with no saved state")]
    StateUnderflow,

    /// An access falls outside the RAM image.
    #[error("access of {len} bytes at {addr:#010x} is outside RAM")]
    OutOfBounds {
        /// Start address.
        addr: u32,
        /// Access length.
        len: u32,
    },

    /// An address does not belong to the dynamic pool it was freed to.
    #[error("{addr:#010x} is not a block of this pool")]
    NotInPool {
        /// Address passed to free.
        addr: u32,
    },

    /// An alignment that is not a power of two.
    #[error("alignment {0:#x} is not a power of two")]
    BadAlignment(u32),

    /// The memory configuration is unusable.
    #[error("invalid memory config `{field}`: {reason}")]
    BadConfig {
        /// Offending key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// Segment id outside the segment table.
    #[error("invalid segment {0}")]
    InvalidSegment(u32),

    /// Address lies below the base of the segment it was converted to.
    #[error("{addr:#010x} lies below the base of segment {segment}")]
    OutsideSegment {
        /// Segment id.
        segment: u8,
        /// Virtual address.
        addr: u32,
    },
}

fn freeable_prefix(freeable: &bool) -> &'static str {
    if *freeable {
        "freeable "
    } else {
        ""
    }
}

/// Result type for memory operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Errors raised while streaming data from ROM.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RomError {
    /// The requested ROM range is inverted or past the end of the image.
    #[error("ROM range {start:#x}-{end:#x} is invalid (ROM size {rom_len:#x})")]
    BadRange {
        /// Range start.
        start: u32,
        /// Range end.
        end: u32,
        /// Size of the ROM image.
        rom_len: u32,
    },

    /// The destination of a fixed-address load cannot hold the data.
    #[error("{size:#x} bytes do not fit at {dest:#010x} (room {room:#x})")]
    DoesNotFit {
        /// Destination address.
        dest: u32,
        /// Bytes to copy.
        size: u32,
        /// Bytes between the destination and the end of RAM.
        room: u32,
    },

    /// Compressed block header is malformed.
    #[error("bad compressed segment header: {0}")]
    BadHeader(&'static str),

    /// The compressed payload did not decode to the advertised size.
    #[error("decompression failed: {0}")]
    Decompress(String),

    /// A DMA table index is past the end of the table.
    #[error("DMA table index {index} out of range (count {count})")]
    TableIndex {
        /// Requested index.
        index: u32,
        /// Entries in the table.
        count: u32,
    },

    /// A DMA table entry is larger than its target buffer.
    #[error("DMA table entry of {size:#x} bytes exceeds buffer of {capacity:#x}")]
    BufferTooSmall {
        /// Entry size.
        size: u32,
        /// Buffer size.
        capacity: u32,
    },

    /// Underlying allocator or RAM failure.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Result type for ROM operations.
pub type RomResult<T> = Result<T, RomError>;
