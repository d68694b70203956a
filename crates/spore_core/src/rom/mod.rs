//! # ROM Loading
//!
//! Cartridge access: raw and compressed segment loads, fixed-address loads,
//! patchable DMA tables, and the page mappings made for segments with bss.

mod compress;
mod dma_table;
mod loader;
mod source;
mod tlb;

pub use compress::{compress_segment, decompressed_len};
pub use dma_table::{DmaHandlerList, DmaTable, OffsetSizePair};
pub use loader::RomLoader;
pub use source::{RomImage, RomRange, RomSource};
pub use tlb::{TlbEntry, TlbMap};
