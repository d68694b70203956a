//! # SPORE Shared
//!
//! Common types used by the memory, collision and level crates.
//!
//! ## CRITICAL RULE
//!
//! This crate holds no engine state. If a type needs the RAM image or the
//! surface grid, it belongs in `spore_core` or `spore_collision`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod math;

pub use config::{CollisionConfig, ConfigError, EngineConfig, MemoryConfig};
pub use constants::{KSEG0_BASE, NUM_SEGMENTS, PHYSICAL_MASK, SEGMENT_OFFSET_MASK};
pub use math::{Vec3, Vec3i};
