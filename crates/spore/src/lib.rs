//! # SPORE
//!
//! Level orchestration on top of the memory system and the collision engine:
//! - [`level`]: level manifests, load and unload against the region allocator
//! - [`frame`]: the collision world shared between physics threads
//!
//! ## Example
//!
//! ```rust,ignore
//! use spore::{LevelLoader, SharedCollision};
//!
//! let mut loader = LevelLoader::new(rom, &config.memory);
//! let level = loader.load(&mut ctx, &mut world, &manifest)?;
//! let shared = SharedCollision::new(world);
//!
//! loop {
//!     let mut phase = shared.begin_dynamic();
//!     for platform in &platforms {
//!         phase.place_object(platform.model, &platform.transform, platform.id)?;
//!     }
//!     drop(phase);
//!
//!     // actor threads: shared.read().find_floor_with(..)
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod frame;
pub mod level;

pub use frame::{DynamicPhase, ReadPhase, SharedCollision};
pub use level::{
    DataRef, LevelError, LevelLoader, LevelManifest, LevelResult, LoadedLevel, SegmentKind, SegmentLoad,
};

// Re-export the engine crates for binaries and downstream users
pub use spore_collision as collision;
pub use spore_core as core;
pub use spore_shared as shared;
