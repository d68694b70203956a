//! # Collision Data
//!
//! Level and object geometry is stored as a stream of big-endian `i16`
//! words:
//!
//! ```text
//! 0x40 count (x y z)*                     vertex list, always first
//! type count (v1 v2 v3 [force])*          surface group
//! 0x41                                    continue (ends object data)
//! 0x43 count (preset x y z yaw)*          object spawns
//! 0x44 count (id lox loz hix hiz height)* environment regions
//! 0x42                                    end
//! ```
//!
//! Surface types are the words below `0x40` or from `0x65` up. Types with a
//! force parameter carry a fourth word per triangle.

use spore_shared::{Vec3, Vec3i};

use crate::environment::EnvironmentRegion;
use crate::error::{CollisionDataError, CollisionResult};
use crate::surface::{ObjectId, Surface, SurfaceType};
use crate::world::CollisionWorld;

/// Command words.
pub mod command {
    /// Vertex list.
    pub const VERTICES: i16 = 0x40;
    /// End of a surface block; terminates object collision.
    pub const CONTINUE: i16 = 0x41;
    /// End of level collision.
    pub const END: i16 = 0x42;
    /// Object spawn list.
    pub const OBJECTS: i16 = 0x43;
    /// Environment region list.
    pub const ENVIRONMENT: i16 = 0x44;
    /// First surface type above the command range.
    pub const SURFACE_TYPE_HIGH: i16 = 0x65;
}

/// An object placed by level collision data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectSpawn {
    /// Preset id.
    pub preset: i16,
    /// Spawn position.
    pub pos: Vec3i,
    /// Facing, as a binary angle.
    pub yaw: i16,
}

/// Everything decoded from a level's collision data.
#[derive(Clone, Debug, Default)]
pub struct LevelCollision {
    /// Valid surfaces in stream order.
    pub surfaces: Vec<Surface>,
    /// Environment regions.
    pub environment: Vec<EnvironmentRegion>,
    /// Object spawns.
    pub objects: Vec<ObjectSpawn>,
    /// Vertices in the vertex list.
    pub vertex_count: usize,
    /// Zero-area triangles that were dropped.
    pub degenerate: usize,
    /// Whether a room table was supplied.
    pub has_rooms: bool,
}

/// Placement of an object's collision model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObjectTransform {
    /// World position of the model origin.
    pub translation: Vec3,
    /// Rotation about Y, as a binary angle (`0x10000` is one turn).
    pub yaw: i16,
    /// Uniform scale.
    pub scale: f32,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, yaw: 0, scale: 1.0 }
    }
}

impl ObjectTransform {
    /// Transforms a model-space vertex, truncating to whole units.
    #[must_use]
    pub fn apply(&self, v: Vec3i) -> Vec3i {
        let angle = f32::from(self.yaw) * std::f32::consts::TAU / 65536.0;
        let (sin, cos) = angle.sin_cos();
        let (x, y, z) = (v.x as f32 * self.scale, v.y as f32 * self.scale, v.z as f32 * self.scale);
        Vec3i::truncate(Vec3::new(
            x * cos + z * sin + self.translation.x,
            y + self.translation.y,
            -x * sin + z * cos + self.translation.z,
        ))
    }
}

/// Splits big-endian bytes into words. A trailing odd byte is ignored.
#[must_use]
pub fn words_from_be_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
        .collect()
}

// =============================================================================
// CURSOR
// =============================================================================

struct Cursor<'a> {
    words: &'a [i16],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(words: &'a [i16]) -> Self {
        Self { words, pos: 0 }
    }

    fn peek(&self) -> Option<i16> {
        self.words.get(self.pos).copied()
    }

    fn word(&mut self) -> CollisionResult<i16> {
        let word = self
            .peek()
            .ok_or(CollisionDataError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(word)
    }

    fn count(&mut self) -> CollisionResult<usize> {
        let offset = self.pos;
        let count = self.word()?;
        usize::try_from(count).map_err(|_| CollisionDataError::BadCount { count, offset })
    }

    fn take(&mut self, len: usize) -> CollisionResult<&'a [i16]> {
        let end = self.pos + len;
        let slice = self
            .words
            .get(self.pos..end)
            .ok_or(CollisionDataError::UnexpectedEnd { offset: self.words.len() })?;
        self.pos = end;
        Ok(slice)
    }
}

fn is_surface_type(word: i16) -> bool {
    (0..command::VERTICES).contains(&word) || word >= command::SURFACE_TYPE_HIGH
}

fn read_vertices(cursor: &mut Cursor<'_>) -> CollisionResult<Vec<Vec3i>> {
    if cursor.peek() != Some(command::VERTICES) {
        return Err(CollisionDataError::MissingVertices);
    }
    cursor.pos += 1;
    let count = cursor.count()?;
    let raw = cursor.take(count * 3)?;
    Ok(raw
        .chunks_exact(3)
        .map(|v| Vec3i::new(v[0].into(), v[1].into(), v[2].into()))
        .collect())
}

/// Surfaces of one group. Degenerate triangles come back as `None` so room
/// indices stay aligned.
fn read_group(
    cursor: &mut Cursor<'_>,
    kind: SurfaceType,
    vertices: &[Vec3i],
) -> CollisionResult<Vec<Option<Surface>>> {
    let count = cursor.count()?;
    let stride = if kind.has_force() { 4 } else { 3 };
    let raw = cursor.take(count * stride)?;

    raw.chunks_exact(stride)
        .map(|tri| {
            let corner = |index: i16| {
                usize::try_from(index)
                    .ok()
                    .and_then(|i| vertices.get(i).copied())
                    .ok_or(CollisionDataError::BadVertexIndex { index, count: vertices.len() })
            };
            let corners = [corner(tri[0])?, corner(tri[1])?, corner(tri[2])?];
            let force = if stride == 4 { tri[3] } else { 0 };
            Ok(Surface::new(corners, kind).map(|s| s.with_force(force)))
        })
        .collect()
}

// =============================================================================
// PARSING
// =============================================================================

/// Decodes a level's collision data.
///
/// `rooms`, when given, holds one room index per triangle in stream order,
/// degenerate triangles included. Triangles past its end get no room.
///
/// # Errors
///
/// Returns an error for truncated data, a missing vertex list, bad vertex
/// indices and words that are not commands or surface types.
pub fn parse_level_collision(words: &[i16], rooms: Option<&[i8]>) -> CollisionResult<LevelCollision> {
    let mut cursor = Cursor::new(words);
    let vertices = read_vertices(&mut cursor)?;
    let mut out = LevelCollision {
        vertex_count: vertices.len(),
        has_rooms: rooms.is_some(),
        ..LevelCollision::default()
    };
    let mut triangle = 0usize;

    loop {
        let offset = cursor.pos;
        let Some(word) = cursor.peek() else {
            break;
        };
        cursor.pos += 1;

        match word {
            command::END => break,
            command::CONTINUE => {}
            command::OBJECTS => {
                let count = cursor.count()?;
                out.objects.extend(cursor.take(count * 5)?.chunks_exact(5).map(|o| ObjectSpawn {
                    preset: o[0],
                    pos: Vec3i::new(o[1].into(), o[2].into(), o[3].into()),
                    yaw: o[4],
                }));
            }
            command::ENVIRONMENT => {
                let count = cursor.count()?;
                out.environment.extend(cursor.take(count * 6)?.chunks_exact(6).map(|r| EnvironmentRegion {
                    id: r[0],
                    lo_x: r[1],
                    lo_z: r[2],
                    hi_x: r[3],
                    hi_z: r[4],
                    height: r[5],
                }));
            }
            word if is_surface_type(word) => {
                let kind = SurfaceType(word as u16);
                for surface in read_group(&mut cursor, kind, &vertices)? {
                    let room = rooms.and_then(|r| r.get(triangle)).copied().unwrap_or(-1);
                    triangle += 1;
                    match surface {
                        Some(surface) => out.surfaces.push(surface.with_room(room)),
                        None => out.degenerate += 1,
                    }
                }
            }
            other => return Err(CollisionDataError::UnknownCommand { command: other, offset }),
        }
    }

    Ok(out)
}

impl CollisionWorld {
    /// Replaces the world's contents with a decoded level. Returns the number
    /// of static surfaces inserted.
    pub fn load_level(&mut self, level: LevelCollision) -> usize {
        self.clear();
        let count = level.surfaces.len();
        for surface in level.surfaces {
            self.insert_static(surface);
        }
        self.set_environment(level.environment);
        self.set_has_rooms(level.has_rooms);
        tracing::debug!(
            surfaces = count,
            vertices = level.vertex_count,
            degenerate = level.degenerate,
            objects = level.objects.len(),
            regions = self.environment().len(),
            "level collision loaded"
        );
        count
    }

    /// Decodes an object's collision model, places it with `transform` and
    /// inserts it into the dynamic partition under `owner`. Returns the
    /// number of surfaces inserted.
    ///
    /// Object data is a vertex list followed by surface groups, ended by
    /// `0x41`, `0x42` or the end of the data.
    ///
    /// # Errors
    ///
    /// Same as [`parse_level_collision`]; object spawn and environment
    /// commands are not allowed here.
    pub fn load_object_collision(
        &mut self,
        words: &[i16],
        transform: &ObjectTransform,
        owner: ObjectId,
    ) -> CollisionResult<usize> {
        let mut cursor = Cursor::new(words);
        let vertices: Vec<Vec3i> = read_vertices(&mut cursor)?
            .into_iter()
            .map(|v| transform.apply(v))
            .collect();

        let mut surfaces = Vec::new();
        while let Some(word) = cursor.peek() {
            if word == command::CONTINUE || word == command::END {
                break;
            }
            if !is_surface_type(word) {
                return Err(CollisionDataError::UnknownCommand { command: word, offset: cursor.pos });
            }
            cursor.pos += 1;
            surfaces.extend(read_group(&mut cursor, SurfaceType(word as u16), &vertices)?.into_iter().flatten());
        }

        let count = surfaces.len();
        for surface in surfaces {
            self.insert_dynamic(surface.with_owner(owner));
        }
        tracing::trace!(owner = owner.0, surfaces = count, "object collision loaded");
        Ok(count)
    }
}
