//! # Engine Configuration
//!
//! Tuned numeric constants for the memory and collision systems.
//!
//! The defaults reproduce the shipped game. Collision margins in particular
//! change how the game feels, so they are loaded from a TOML file rather than
//! re-derived.
//!
//! ```toml
//! [memory]
//! ram_size = 0x800000
//!
//! [collision]
//! floor_buffer = 78
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The TOML could not be parsed.
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value `{field}`: {reason}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Memory layout of the console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Total RAM in bytes (4 MiB stock, 8 MiB with the expansion pak).
    pub ram_size: u32,
    /// Physical address where the main pool begins. Everything below belongs
    /// to code, framebuffers and static buffers.
    pub pool_start: u32,
    /// Size of the effects pool carved from the main pool.
    pub effects_pool_size: u32,
    /// DMA transfer quantum.
    pub dma_chunk_size: u32,
    /// Page size for segment mappings.
    pub tlb_page_size: u32,
    /// Alignment used when a caller asks for alignment `0`.
    pub default_alignment: u32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            ram_size: 0x0080_0000,
            pool_start: 0x0020_0000,
            effects_pool_size: 0x4000,
            dma_chunk_size: 0x1000,
            tlb_page_size: 0x1000,
            default_alignment: 16,
        }
    }
}

/// Collision margins and partition geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// How far above the query point a floor may be and still be stood on.
    pub floor_buffer: i32,
    /// `normal.y` at or above which a surface is a floor.
    pub floor_threshold: f32,
    /// `normal.y` at or below which a surface is a ceiling.
    pub ceil_threshold: f32,
    /// Walls with `|normal.y|` above this are ignored by wall queries.
    pub wall_normal_limit: f32,
    /// Half extent of the playable area on X and Z.
    pub level_boundary: i32,
    /// Edge length of one partition cell.
    pub cell_size: i32,
    /// Surfaces within this distance of a cell edge are also linked into
    /// the neighbouring cell.
    pub cell_overlap: i32,
    /// Height reported when no floor exists.
    pub floor_lower_limit: f32,
    /// Height reported when no ceiling exists.
    pub ceil_height_limit: f32,
    /// Length of the upward ceiling ray.
    pub ceil_ray_length: f32,
    /// Inward margin applied to steep ceilings.
    pub ceil_margin: f32,
    /// Ceilings with `normal.y` above this are steep and get the margin.
    pub steep_ceil_normal: f32,
    /// Walls recorded per wall query.
    pub max_referenced_walls: usize,
    /// Environment region type values at or above this are poison gas.
    pub gas_type_cutoff: i16,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            floor_buffer: 78,
            floor_threshold: 0.01,
            ceil_threshold: -0.01,
            wall_normal_limit: 0.8,
            level_boundary: 0x2000,
            cell_size: 0x400,
            cell_overlap: 50,
            floor_lower_limit: -11000.0,
            ceil_height_limit: 20000.0,
            ceil_ray_length: 2000.0,
            ceil_margin: 1.5,
            steep_ceil_normal: -0.5,
            max_referenced_walls: 4,
            gas_type_cutoff: 50,
        }
    }
}

impl CollisionConfig {
    /// Number of cells along one axis.
    #[inline]
    #[must_use]
    pub const fn cells_per_axis(&self) -> usize {
        (2 * self.level_boundary / self.cell_size) as usize
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.cell_size <= 0 || self.cell_size & (self.cell_size - 1) != 0 {
            return Err(ConfigError::Invalid {
                field: "collision.cell_size",
                reason: format!("{} is not a positive power of two", self.cell_size),
            });
        }
        if self.level_boundary <= 0 || (2 * self.level_boundary) % self.cell_size != 0 {
            return Err(ConfigError::Invalid {
                field: "collision.level_boundary",
                reason: format!(
                    "{} must be positive and span a whole number of {}-unit cells",
                    self.level_boundary, self.cell_size
                ),
            });
        }
        if self.cell_overlap < 0 || self.cell_overlap >= self.cell_size {
            return Err(ConfigError::Invalid {
                field: "collision.cell_overlap",
                reason: format!("{} must be in 0..{}", self.cell_overlap, self.cell_size),
            });
        }
        if self.floor_threshold <= self.ceil_threshold {
            return Err(ConfigError::Invalid {
                field: "collision.floor_threshold",
                reason: "floor threshold must be above the ceiling threshold".to_owned(),
            });
        }
        Ok(())
    }
}

impl MemoryConfig {
    /// Checks that every size is usable.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a chunk size, page size or default alignment
    /// that is not a nonzero power of two, or a pool start past the end of
    /// RAM.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("memory.dma_chunk_size", self.dma_chunk_size),
            ("memory.tlb_page_size", self.tlb_page_size),
            ("memory.default_alignment", self.default_alignment),
        ] {
            if value == 0 || !value.is_power_of_two() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value:#x} is not a power of two"),
                });
            }
        }
        if self.pool_start >= self.ram_size {
            return Err(ConfigError::Invalid {
                field: "memory.pool_start",
                reason: format!("{:#x} is past the end of RAM ({:#x})", self.pool_start, self.ram_size),
            });
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Memory layout.
    pub memory: MemoryConfig,
    /// Collision tuning.
    pub collision: CollisionConfig,
}

impl EngineConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the document does not parse or a value is out of
    /// range.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.memory.validate()?;
        self.collision.validate()
    }
}
