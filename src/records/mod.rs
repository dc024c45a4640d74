//! Record types and readers shared by the vehicle and circuit schemas.
//!
//! The format is not self-describing: each reader below is the exact byte
//! order of one structure, and the schema modules chain them in the order
//! the game writes them.

pub mod circuit;
pub mod vehicle;

use glam::{Mat3, Vec2, Vec3};
use log::debug;
use serde::Serialize;

use crate::crypto::{self, KeyScheme};
use crate::cursor::BinaryCursor;
use crate::error::FormatError;
use crate::fixed::{fixed_point, rgb565_page_to_rgba8, uv_from_raw};
use crate::header::ContainerHeader;

pub const FLAG_NAMED_FACES:       u32 = 1;
pub const FLAG_FACE_UNK_PROPERTY: u32 = 1 << 1;
pub const FLAG_OBJ_HAS_PRISM:     u32 = 1 << 2;

/// Section name meaning "this section is absent".
pub const SENTINEL: &str = "NEANT";

/// Whether a decoded section name announces data.
pub fn is_present(name: &str) -> bool {
    !name.is_empty() && name != SENTINEL
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetKind {
    Vehicle,
    Circuit,
}

// ── Payload ──────────────────────────────────────────────────────────────────

/// A decrypted file with its header read, positioned at the first record.
pub struct Payload {
    pub cursor:     BinaryCursor,
    pub header:     ContainerHeader,
    pub key:        u32,
    pub scheme:     KeyScheme,
    pub block_size: usize,
}

impl Payload {
    pub fn open(raw: &[u8], strict: bool) -> Result<Self, FormatError> {
        let decrypted = crypto::decrypt(raw)?;
        let mut cursor = BinaryCursor::new(decrypted.data, strict);
        let header = ContainerHeader::read(&mut cursor, decrypted.block_size)?;
        Ok(Self {
            cursor,
            header,
            key:        decrypted.key,
            scheme:     decrypted.scheme,
            block_size: decrypted.block_size,
        })
    }

    pub fn layout(&self, kind: AssetKind) -> FaceLayout {
        FaceLayout { kind, scheme: self.scheme }
    }
}

/// What the face reader needs to know about the file it reads from.
#[derive(Debug, Clone, Copy)]
pub struct FaceLayout {
    pub kind:   AssetKind,
    pub scheme: KeyScheme,
}

// ── Textures ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ImageData {
    pub file_name: String,
    pub left:      u32,
    pub top:       u32,
    pub right:     u32,
    pub bottom:    u32,
    pub flags:     u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageList {
    pub images: Vec<ImageData>,
}

/// Texture pages plus the crop metadata of the images packed into them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TextureList {
    pub width:       u32,
    pub height:      u32,
    pub flags:       u32,
    pub image_lists: Vec<ImageList>,
    /// One RGB565 page of `width * height` pixels per entry.
    #[serde(skip)]
    pub pages:       Vec<Vec<u16>>,
}

impl TextureList {
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, index: u32) -> Result<&[u16], FormatError> {
        self.pages
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(FormatError::TextureOutOfRange { index, count: self.pages.len() })
    }

    /// Page `index` as tightly packed RGBA8.
    pub fn rgba(&self, index: u32) -> Result<Vec<u8>, FormatError> {
        Ok(rgb565_page_to_rgba8(self.page(index)?))
    }
}

fn read_image(cur: &mut BinaryCursor) -> Result<ImageData, FormatError> {
    let name = cur.read_array_bytes::<32>()?;
    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
    Ok(ImageData {
        file_name: name[..end].iter().map(|&b| b as char).collect(),
        left:      cur.read_u32()?,
        top:       cur.read_u32()?,
        right:     cur.read_u32()?,
        bottom:    cur.read_u32()?,
        flags:     cur.read_u32()?,
    })
}

pub fn read_texture_list(
    cur: &mut BinaryCursor,
    width: u32,
    height: u32,
) -> Result<TextureList, FormatError> {
    let count = cur.read_u32()? as usize;
    let flags = cur.read_u32()?;
    let image_lists = cur.read_array_n(count, |c| {
        Ok(ImageList { images: c.read_array(read_image)? })
    })?;
    let page_len = (width * height) as usize;
    let pages = cur.read_array_n(count, |c| c.read_u16_vec(page_len))?;
    debug!("texture list: {} pages of {}x{}", count, width, height);
    Ok(TextureList { width, height, flags, image_lists, pages })
}

// ── Faces and objects ────────────────────────────────────────────────────────

/// One polygon of an [`ObjectData`]. Indices point into the owning
/// object's vertex and normal arrays.
#[derive(Debug, Clone, Serialize)]
pub struct FaceData {
    pub name:             String,
    /// 3 or 4.
    pub vertices:         u32,
    pub indices:          [u32; 4],
    pub normal:           [i32; 3],
    pub material_type:    String,
    pub color_or_texture: u32,
    pub uvs:              [Vec2; 4],
    pub reserved1:        u32,
    /// Circuit faces with a zero normal only.
    pub reserved2:        u32,
    pub quad_reserved:    [i32; 3],
    pub unknown:          u32,
    pub properties:       u32,
    /// UV override set by texture animation; replaces `uvs` when present.
    #[serde(skip)]
    pub anim_uvs:         Option<[Vec2; 4]>,
}

impl FaceData {
    pub fn is_visible(&self) -> bool {
        self.properties & 1 != 0
    }

    /// Coloured faces carry a packed RGB value instead of a texture index.
    pub fn is_color(&self) -> bool {
        is_color_material(&self.material_type)
    }

    pub fn triangle_count(&self) -> usize {
        if self.vertices == 4 { 2 } else { 1 }
    }

    pub fn current_uvs(&self) -> &[Vec2; 4] {
        self.anim_uvs.as_ref().unwrap_or(&self.uvs)
    }
}

pub fn is_color_material(material_type: &str) -> bool {
    material_type == "GOURAUD" || material_type == "FLAT"
}

fn is_texture_material(material_type: &str) -> bool {
    material_type == "TEXTURE" || material_type == "TEXGOU"
}

pub fn read_face(
    cur: &mut BinaryCursor,
    layout: FaceLayout,
    flags: u32,
) -> Result<FaceData, FormatError> {
    let name = if flags & FLAG_NAMED_FACES != 0 { cur.read_string()? } else { String::new() };

    let mut indices = [0u32; 4];
    let vertices;
    if layout.scheme == KeyScheme::SpecialA {
        indices[3] = cur.read_u32()?;
        indices[0] = cur.read_u32()?;
        vertices = cur.read_u32()?;
        indices[2] = cur.read_u32()?;
        indices[1] = cur.read_u32()?;
    } else {
        vertices = cur.read_u32()?;
        for i in indices.iter_mut() {
            *i = cur.read_u32()?;
        }
    }
    if vertices != 3 && vertices != 4 {
        return Err(FormatError::InvalidFace { vertices });
    }

    let normal = cur.read_fixed3()?;
    let material_type = cur.read_string()?;
    let color_or_texture = cur.read_u32()?;

    let untextured_vehicle = layout.kind == AssetKind::Vehicle && !is_texture_material(&material_type);
    let mut uvs = [Vec2::ZERO; 4];
    for uv in uvs.iter_mut() {
        let (u, v) = (cur.read_u32()?, cur.read_u32()?);
        *uv = if untextured_vehicle { Vec2::ONE } else { uv_from_raw(u, v) };
    }

    let reserved1 = cur.read_u32()?;
    let quad_reserved = if vertices == 4 { cur.read_fixed3()? } else { [0; 3] };

    let mut reserved2 = 0;
    let mut unknown = 0;
    let mut properties = 0;
    if layout.kind == AssetKind::Circuit && normal == [0, 0, 0] {
        reserved2 = cur.read_u32()?;
    } else {
        if flags & FLAG_FACE_UNK_PROPERTY != 0 {
            unknown = cur.read_u32()?;
        }
        properties = cur.read_u32()?;
    }

    Ok(FaceData {
        name,
        vertices,
        indices,
        normal,
        material_type,
        color_or_texture,
        uvs,
        reserved1,
        reserved2,
        quad_reserved,
        unknown,
        properties,
        anim_uvs: None,
    })
}

/// Raw mesh record: fixed-point vertices and normals plus faces.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectData {
    pub vertices:       Vec<[i32; 3]>,
    pub normals:        Vec<[i32; 3]>,
    pub faces:          Vec<FaceData>,
    pub triangle_count: u32,
    pub quad_count:     u32,
    pub unknown:        u32,
    pub prism:          Option<[u8; 28]>,
    /// Face indices of the triangles, in file order.
    pub tri_faces:      Vec<usize>,
    /// Face indices of the quads, in file order.
    pub quad_faces:     Vec<usize>,
}

impl ObjectData {
    /// Address a face the way texture animations do: by polygon type
    /// (3 or 4) and position among faces of that type.
    pub fn face_by_type(&self, face_type: i32, index: usize) -> Option<usize> {
        match face_type {
            3 => self.tri_faces.get(index).copied(),
            4 => self.quad_faces.get(index).copied(),
            _ => None,
        }
    }

    pub fn visible_triangle_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_visible()).map(FaceData::triangle_count).sum()
    }
}

pub fn read_object(
    cur: &mut BinaryCursor,
    layout: FaceLayout,
    flags: u32,
) -> Result<ObjectData, FormatError> {
    let vertex_count = cur.read_u32()? as usize;
    let vertices = cur.read_array_n(vertex_count, |c| c.read_fixed3())?;

    let face_count = cur.read_u32()? as usize;
    let triangle_count = cur.read_u32()?;
    let quad_count = cur.read_u32()?;
    let faces = cur.read_array_n(face_count, |c| read_face(c, layout, flags))?;

    let mut tri_faces = Vec::new();
    let mut quad_faces = Vec::new();
    for (i, f) in faces.iter().enumerate() {
        if f.vertices == 3 {
            tri_faces.push(i);
        } else {
            quad_faces.push(i);
        }
    }

    let normals = cur.read_array_n(vertex_count, |c| c.read_fixed3())?;
    let unknown = cur.read_u32()?;
    let prism = if flags & FLAG_OBJ_HAS_PRISM != 0 {
        Some(cur.read_array_bytes::<28>()?)
    } else {
        None
    };

    Ok(ObjectData {
        vertices,
        normals,
        faces,
        triangle_count,
        quad_count,
        unknown,
        prism,
        tri_faces,
        quad_faces,
    })
}

// ── Small shared shapes ──────────────────────────────────────────────────────

pub fn read_int_vec2(cur: &mut BinaryCursor) -> Result<[i32; 2], FormatError> {
    Ok([cur.read_i32()?, cur.read_i32()?])
}

pub fn read_int_vec3(cur: &mut BinaryCursor) -> Result<[i32; 3], FormatError> {
    Ok([cur.read_i32()?, cur.read_i32()?, cur.read_i32()?])
}

/// A stored position, in render space.
pub fn read_position(cur: &mut BinaryCursor) -> Result<Vec3, FormatError> {
    Ok(fixed_point(cur.read_fixed3()?))
}

/// Three stored axis vectors, rearranged into a render-space rotation.
pub fn read_rotation(cur: &mut BinaryCursor) -> Result<Mat3, FormatError> {
    let r0 = cur.read_vec3()?;
    let r1 = cur.read_vec3()?;
    let r2 = cur.read_vec3()?;
    let rows = [
        Vec3::new(r1.y, -r1.z, -r1.x),
        Vec3::new(-r2.y, r2.z, r2.x),
        Vec3::new(-r0.y, r0.z, r0.x),
    ];
    // glam is column-major.
    Ok(Mat3::from_cols(rows[0], rows[1], rows[2]).transpose())
}
