//! # SPORE Collision
//!
//! Triangle collision for a platformer, organised around a uniform XZ grid:
//! - Surfaces with precomputed normals, plane offsets and padded Y ranges
//! - A grid of per-cell floor, ceiling, wall and water lists, split into a
//!   static partition (level geometry) and a dynamic one (moving objects)
//! - Floor, ceiling, wall and water queries over the grid
//! - A decoder for the collision command stream levels and objects ship in
//!
//! ## Architecture Rules
//!
//! 1. **Queries never fail** - a miss is `None`, never an error
//! 2. **Queries never allocate** - lists are walked in place
//! 3. **Static is loaded once** - only the dynamic partition churns per frame
//!
//! ## Example
//!
//! ```rust,ignore
//! use spore_collision::{parse_level_collision, words_from_be_bytes, CollisionWorld};
//! use spore_shared::CollisionConfig;
//!
//! let mut world = CollisionWorld::new(CollisionConfig::default());
//! world.load_level(parse_level_collision(&words_from_be_bytes(&data), None)?);
//!
//! if let Some(floor) = world.find_floor(x, y, z) {
//!     y = y.max(floor.height);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ceil;
pub mod environment;
pub mod error;
pub mod flags;
pub mod floor;
pub mod load;
pub mod partition;
pub mod surface;
pub mod wall;
pub mod water;
pub mod world;

pub use ceil::RayHit;
pub use environment::EnvironmentRegion;
pub use error::{CollisionDataError, CollisionResult};
pub use flags::QueryFlags;
pub use floor::SurfaceHit;
pub use load::{parse_level_collision, words_from_be_bytes, LevelCollision, ObjectSpawn, ObjectTransform};
pub use partition::{CellIndex, Partition, SurfaceGrid, SurfaceId, SurfaceList};
pub use surface::{ObjectId, Surface, SurfaceFlags, SurfaceType};
pub use wall::{sphere_push, WallCollisionData, WallMover, WALL_CAPACITY};
pub use world::{CollisionWorld, QueryStats, QueryStatsSnapshot, WaterHit};
