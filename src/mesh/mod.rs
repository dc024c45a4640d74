//! Material-grouped triangle meshes built from raw [`ObjectData`].
//!
//! Faces are grouped by [`MaterialKey`]: textured groups first, then
//! coloured groups, each in ascending key order. Within a group faces keep
//! the order of the objects and faces they came from. Every triangle corner
//! becomes its own vertex, so the index buffer is simply `0..n`.
//!
//! A UV-only refresh ([`update_mesh_uv`]) replays exactly the same order,
//! which is what keeps the UV buffer aligned with the index buffer.

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use log::debug;
use serde::Serialize;

use crate::error::FormatError;
use crate::fixed::{diffuse_from_packed, fixed_point};
use crate::records::{FaceData, ObjectData, TextureList};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MaterialKey {
    /// Index into the texture list.
    Texture(u32),
    /// Packed `0x00RRGGBB`.
    Color(u32),
}

impl MaterialKey {
    pub fn of(face: &FaceData) -> Self {
        if face.is_color() {
            MaterialKey::Color(face.color_or_texture)
        } else {
            MaterialKey::Texture(face.color_or_texture)
        }
    }
}

/// A face addressed by position in the submesh set handed to [`build_mesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FaceRef {
    pub object: usize,
    pub face:   usize,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal:   [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb { min: Vec3::splat(f32::MAX), max: Vec3::splat(f32::MIN) };

    /// Box spanning two corners given in any order.
    pub fn from_corners(a: Vec3, b: Vec3) -> Self {
        Aabb { min: a.min(b), max: a.max(b) }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn extend(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CullMode {
    None,
}

#[derive(Debug, Clone, Serialize)]
pub enum Surface {
    /// Decoded texture page.
    Textured {
        index:  u32,
        width:  u32,
        height: u32,
        #[serde(skip)]
        rgba:   Vec<u8>,
    },
    Flat { diffuse: Vec3 },
}

#[derive(Debug, Clone, Serialize)]
pub struct Material {
    pub surface: Surface,
    pub cull:    CullMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeshGroup {
    pub key:      MaterialKey,
    pub faces:    Vec<FaceRef>,
    pub vertices: Vec<Vertex>,
    pub uvs:      Vec<Vec2>,
    pub indices:  Vec<u32>,
    pub bounds:   Aabb,
    pub material: Material,
}

impl MeshGroup {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Mesh {
    pub groups: Vec<MeshGroup>,
    pub bounds: Aabb,
    /// Whether `bounds` came from the caller instead of the geometry.
    pub fixed_bounds: bool,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.groups.iter().map(MeshGroup::triangle_count).sum()
    }
}

// ── Building ─────────────────────────────────────────────────────────────────

const TRIANGLE_CORNERS: &[usize] = &[0, 1, 2];
const QUAD_CORNERS:     &[usize] = &[0, 1, 2, 0, 2, 3];

/// Corner order of the triangles a face expands to: fan from corner 0.
fn fan(face: &FaceData) -> &'static [usize] {
    if face.vertices == 4 { QUAD_CORNERS } else { TRIANGLE_CORNERS }
}

fn group_faces(objects: &[&ObjectData]) -> BTreeMap<MaterialKey, Vec<FaceRef>> {
    let mut groups: BTreeMap<MaterialKey, Vec<FaceRef>> = BTreeMap::new();
    for (oi, obj) in objects.iter().enumerate() {
        for (fi, face) in obj.faces.iter().enumerate() {
            groups.entry(MaterialKey::of(face)).or_default().push(FaceRef { object: oi, face: fi });
        }
    }
    groups
}

fn lookup<'a>(objects: &[&'a ObjectData], r: FaceRef) -> Result<&'a FaceData, FormatError> {
    objects
        .get(r.object)
        .and_then(|o| o.faces.get(r.face))
        .ok_or(FormatError::StaleMesh { object: r.object, face: r.face })
}

fn realize(key: MaterialKey, textures: Option<&TextureList>) -> Result<Material, FormatError> {
    let surface = match key {
        MaterialKey::Texture(index) => {
            let list = textures.ok_or(FormatError::TextureOutOfRange { index, count: 0 })?;
            Surface::Textured {
                index,
                width:  list.width,
                height: list.height,
                rgba:   list.rgba(index)?,
            }
        }
        MaterialKey::Color(c) => Surface::Flat { diffuse: diffuse_from_packed(c) },
    };
    Ok(Material { surface, cull: CullMode::None })
}

/// Build one mesh from a submesh set.
///
/// `bounds` overrides the computed bounds when the caller already has them.
pub fn build_mesh(
    objects: &[&ObjectData],
    textures: Option<&TextureList>,
    bounds: Option<Aabb>,
) -> Result<Mesh, FormatError> {
    let mut groups = Vec::new();
    let mut total = Aabb::EMPTY;

    for (key, faces) in group_faces(objects) {
        let mut vertices = Vec::new();
        let mut uvs = Vec::new();
        let mut group_bounds = Aabb::EMPTY;

        for &r in &faces {
            let face = lookup(objects, r)?;
            if !face.is_visible() {
                continue;
            }
            let obj = objects[r.object];
            let corner_uvs = face.current_uvs();
            for &corner in fan(face) {
                let vi = face.indices[corner] as usize;
                let (pos, nrm) = match (obj.vertices.get(vi), obj.normals.get(vi)) {
                    (Some(&p), Some(&n)) => (fixed_point(p), fixed_point(n)),
                    _ => return Err(FormatError::StaleMesh { object: r.object, face: r.face }),
                };
                group_bounds.extend(pos);
                vertices.push(Vertex { position: pos.to_array(), normal: nrm.to_array() });
                uvs.push(corner_uvs[corner]);
            }
        }

        if !group_bounds.is_empty() {
            total = total.union(&group_bounds);
        }
        let indices = (0..vertices.len() as u32).collect();
        groups.push(MeshGroup {
            key,
            faces,
            vertices,
            uvs,
            indices,
            bounds: group_bounds,
            material: realize(key, textures)?,
        });
    }

    debug!(
        "built mesh: {} groups, {} triangles",
        groups.len(),
        groups.iter().map(MeshGroup::triangle_count).sum::<usize>()
    );

    Ok(Mesh {
        groups,
        bounds: bounds.unwrap_or(total),
        fixed_bounds: bounds.is_some(),
    })
}

/// Regenerate only the UV buffers of `mesh`, e.g. after texture animation
/// changed some faces' overrides. `objects` must be the set the mesh was
/// built from.
pub fn update_mesh_uv(mesh: &mut Mesh, objects: &[&ObjectData]) -> Result<(), FormatError> {
    for group in &mut mesh.groups {
        let mut uvs = Vec::with_capacity(group.uvs.len());
        for &r in &group.faces {
            let face = lookup(objects, r)?;
            if !face.is_visible() {
                continue;
            }
            let corner_uvs = face.current_uvs();
            uvs.extend(fan(face).iter().map(|&c| corner_uvs[c]));
        }
        if uvs.len() != group.indices.len() {
            let r = group.faces.first().copied().unwrap_or(FaceRef { object: 0, face: 0 });
            return Err(FormatError::StaleMesh { object: r.object, face: r.face });
        }
        group.uvs = uvs;
    }
    Ok(())
}
