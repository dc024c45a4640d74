//! The two circuit animation schemes.
//!
//! `Anim1` drives whole objects (keyed transforms) and texture pages.
//! `Anim2` swaps UV rectangles on individual sector faces, addressed by
//! sector, polygon type and index among polygons of that type.

use glam::{Mat3, Vec2, Vec3};
use serde::Serialize;

use crate::cursor::BinaryCursor;
use crate::error::FormatError;
use crate::fixed::uv_from_raw;
use crate::records::{
    is_present, read_int_vec2, read_int_vec3, read_object, read_position, read_rotation,
    read_texture_list, FaceLayout, ObjectData, TextureList, FLAG_NAMED_FACES,
};

use super::{read_macro, Macro};

/// Anim1 entry with two extra values.
pub const WRONG_WAY_NAME: &str = "wrongway.ani";
/// Anim2 scheme that is known but not decoded.
pub const ANIM_SECTOR_NAME: &str = "ANIME SECTEUR";

// ── Anim1 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Anim1ObjectKey {
    pub rotation: Mat3,
    pub position: Vec3,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1Object {
    pub start_frame: i32,
    pub named_faces: bool,
    pub name:        String,
    pub meshes:      Vec<ObjectData>,
    /// `[frame][mesh]`; `None` where a mesh keeps its previous key.
    pub frames:      Vec<Vec<Option<Anim1ObjectKey>>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1TextureKey {
    pub unknown1: u32,
    pub unknown2: [i32; 2],
    pub unknown3: [i32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1TextureFrame {
    pub unknown: [i32; 3],
    pub keys:    Vec<Anim1TextureKey>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1Texture {
    pub start_frame: i32,
    pub unknown:     u32,
    pub name:        String,
    pub textures:    TextureList,
    pub configs:     Vec<[u32; 5]>,
    pub frames:      Vec<Anim1TextureFrame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1 {
    pub name:      String,
    pub wrong_way: Option<[u32; 2]>,
    pub unknown:   u32,
    pub objects:   Vec<Anim1Object>,
    pub textures:  Vec<Anim1Texture>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1Sector {
    pub index:    i32,
    pub unknown:  [u32; 4],
    pub vectors:  Vec<[i32; 2]>,
    pub position: Vec3,
    pub rotation: Mat3,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim1SectorList {
    pub unknown: u32,
    pub sectors: Vec<Anim1Sector>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Anim1Section {
    pub name:           String,
    pub macros:         Vec<Macro>,
    pub animations:     Vec<Anim1>,
    pub unknown:        u32,
    pub global_sectors: Option<Anim1SectorList>,
    pub sectors:        Vec<Anim1SectorList>,
}

fn read_anim1_object(cur: &mut BinaryCursor, layout: FaceLayout) -> Result<Anim1Object, FormatError> {
    let start_frame = cur.read_i32()?;
    let frame_count = cur.read_i32()?.max(0) as usize;
    let named_faces = cur.read_bool()?;
    let mesh_count = cur.read_i32()?.max(0) as usize;
    let name = cur.read_string()?;

    let flags = if named_faces { FLAG_NAMED_FACES } else { 0 };
    let meshes = cur.read_array_n(mesh_count, |c| read_object(c, layout, flags))?;
    let frames = cur.read_array_n(frame_count, |c| {
        c.read_array_n(mesh_count, |c| {
            if c.read_bool()? {
                Ok(Some(Anim1ObjectKey { rotation: read_rotation(c)?, position: read_position(c)? }))
            } else {
                Ok(None)
            }
        })
    })?;

    Ok(Anim1Object { start_frame, named_faces, name, meshes, frames })
}

fn read_anim1_texture(cur: &mut BinaryCursor) -> Result<Anim1Texture, FormatError> {
    let start_frame = cur.read_i32()?;
    let frame_count = cur.read_i32()?.max(0) as usize;
    let config_count = cur.read_i32()?.max(0) as usize;
    let unknown = cur.read_u32()?;
    let name = cur.read_string()?;
    let textures = read_texture_list(cur, 256, 256)?;

    let configs = cur.read_array_n(config_count, |c| {
        Ok([c.read_u32()?, c.read_u32()?, c.read_u32()?, c.read_u32()?, c.read_u32()?])
    })?;
    let frames = cur.read_array_n(frame_count, |c| {
        Ok(Anim1TextureFrame {
            unknown: read_int_vec3(c)?,
            keys:    c.read_array(|c| {
                Ok(Anim1TextureKey {
                    unknown1: c.read_u32()?,
                    unknown2: read_int_vec2(c)?,
                    unknown3: read_int_vec2(c)?,
                })
            })?,
        })
    })?;

    Ok(Anim1Texture { start_frame, unknown, name, textures, configs, frames })
}

fn read_anim1(cur: &mut BinaryCursor, layout: FaceLayout) -> Result<Anim1, FormatError> {
    let name = cur.read_string()?;
    let wrong_way = if name == WRONG_WAY_NAME {
        Some([cur.read_u32()?, cur.read_u32()?])
    } else {
        None
    };
    let texture_count = cur.read_i32()?.max(0) as usize;
    let object_count = cur.read_i32()?.max(0) as usize;
    let unknown = cur.read_u32()?;

    let objects = cur.read_array_n(object_count, |c| read_anim1_object(c, layout))?;
    let textures = cur.read_array_n(texture_count, read_anim1_texture)?;
    Ok(Anim1 { name, wrong_way, unknown, objects, textures })
}

fn read_anim1_sector_list(cur: &mut BinaryCursor) -> Result<Anim1SectorList, FormatError> {
    let count = cur.read_i32()?.max(0) as usize;
    let unknown = cur.read_u32()?;
    let sectors = cur.read_array_n(count, |c| {
        Ok(Anim1Sector {
            index:    c.read_i32()?,
            unknown:  [c.read_u32()?, c.read_u32()?, c.read_u32()?, c.read_u32()?],
            vectors:  c.read_array(read_int_vec2)?,
            position: read_position(c)?,
            rotation: read_rotation(c)?,
        })
    })?;
    Ok(Anim1SectorList { unknown, sectors })
}

pub(super) fn read_anim1_section(
    cur: &mut BinaryCursor,
    layout: FaceLayout,
    sector_count: usize,
) -> Result<Anim1Section, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(Anim1Section { name, ..Default::default() });
    }
    let macros = cur.read_array(read_macro)?;
    let animations = cur.read_array(|c| read_anim1(c, layout))?;
    let unknown = cur.read_u32()?;
    let global_sectors = if sector_count > 0 { Some(read_anim1_sector_list(cur)?) } else { None };
    let sectors = cur.read_array_n(sector_count, read_anim1_sector_list)?;
    Ok(Anim1Section { name, macros, animations, unknown, global_sectors, sectors })
}

// ── Anim2 ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Anim2Key {
    pub texture_index: i32,
    pub uvs:           [Vec2; 4],
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Anim2Frame {
    pub time:      f32,
    pub key_index: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim2Animation {
    pub name:       String,
    pub keys:       Vec<Anim2Key>,
    pub total_time: f32,
    pub frames:     Vec<Anim2Frame>,
}

impl Anim2Animation {
    /// Key shown at `time`: the last frame starting at or before it. Time
    /// wraps at `total_time` when `looping`.
    pub fn key_at(&self, time: f32, looping: bool) -> Option<&Anim2Key> {
        let t = if looping && self.total_time > 0.0 { time.rem_euclid(self.total_time) } else { time };
        let frame = self
            .frames
            .iter()
            .take_while(|f| f.time <= t)
            .last()
            .or_else(|| self.frames.first())?;
        usize::try_from(frame.key_index).ok().and_then(|i| self.keys.get(i))
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Anim2Face {
    pub looping:    i32,
    /// 3 or 4.
    pub face_type:  i32,
    /// Index among the sector's faces of `face_type` vertices.
    pub face_index: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim2Sector {
    pub sector_index: i32,
    pub faces:        Vec<Anim2Face>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anim2SectorAnimation {
    pub anim_index: i32,
    pub sectors:    Vec<Anim2Sector>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Anim2Section {
    pub name:              String,
    pub animations:        Vec<Anim2Animation>,
    pub unknown:           u32,
    pub sector_animations: Vec<Anim2SectorAnimation>,
}

fn read_anim2_animation(cur: &mut BinaryCursor) -> Result<Anim2Animation, FormatError> {
    let name = cur.read_string()?;
    let keys = cur.read_array(|c| {
        let texture_index = c.read_i32()?;
        let mut uvs = [Vec2::ZERO; 4];
        for uv in uvs.iter_mut() {
            let (u, v) = (c.read_u32()?, c.read_u32()?);
            *uv = uv_from_raw(u, v);
        }
        Ok(Anim2Key { texture_index, uvs })
    })?;
    let total_time = cur.read_fixed()?;
    let frames = cur.read_array(|c| Ok(Anim2Frame { time: c.read_fixed()?, key_index: c.read_i32()? }))?;
    Ok(Anim2Animation { name, keys, total_time, frames })
}

fn read_anim2_sector_animation(cur: &mut BinaryCursor) -> Result<Anim2SectorAnimation, FormatError> {
    let anim_index = cur.read_i32()?;
    let sectors = cur.read_array(|c| {
        Ok(Anim2Sector {
            sector_index: c.read_i32()?,
            faces:        c.read_array(|c| {
                Ok(Anim2Face {
                    looping:    c.read_i32()?,
                    face_type:  c.read_i32()?,
                    face_index: c.read_i32()?,
                })
            })?,
        })
    })?;
    Ok(Anim2SectorAnimation { anim_index, sectors })
}

pub(super) fn read_anim2_section(cur: &mut BinaryCursor) -> Result<Anim2Section, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(Anim2Section { name, ..Default::default() });
    }
    if name == ANIM_SECTOR_NAME {
        return Err(FormatError::UnimplementedVariant(name));
    }
    let animations = cur.read_array(read_anim2_animation)?;
    let unknown = cur.read_u32()?;
    let sector_animations = cur.read_array(read_anim2_sector_animation)?;
    Ok(Anim2Section { name, animations, unknown, sector_animations })
}
