//! Vehicle (`.BV*`) schema.
//!
//! Order on disk: name, the opaque telemetry block with its trailing list,
//! the material and its texture list, 3 × 6 chassis objects, 4 wheels,
//! 2 × 2 shadows, 2 collision meshes, noise and the five characteristics.

use glam::Vec3;
use log::debug;
use serde::Serialize;

use crate::cursor::BinaryCursor;
use crate::error::FormatError;
use crate::fixed::fixed_to_f32;
use crate::mesh::{build_mesh, Mesh};
use crate::records::{
    read_object, read_texture_list, AssetKind, FaceLayout, ObjectData, Payload, TextureList,
    FLAG_NAMED_FACES, FLAG_OBJ_HAS_PRISM,
};

pub const TEXTURE_WIDTH:  u32 = 128;
pub const TEXTURE_HEIGHT: u32 = 128;

/// Size of the opaque block following the name.
pub const TELEMETRY_LEN: usize = 0x558;
const POSITION_RECORD_LEN: usize = 216;
const POSITION_FIELD: usize = 0x48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Good    = 0,
    Damaged = 1,
    Ruined  = 2,
}

/// Wheel slots in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wheel {
    FrontRight = 0,
    RearRight  = 1,
    FrontLeft  = 2,
    RearLeft   = 3,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [Wheel::FrontRight, Wheel::RearRight, Wheel::FrontLeft, Wheel::RearLeft];
}

#[derive(Debug, Clone, Serialize)]
pub struct Collision {
    pub material_name: String,
    pub named_faces:   bool,
    pub object:        ObjectData,
    pub unknown1:      u32,
    pub unknown2:      [u32; 3],
    pub unknown3:      u32,
    pub unknown4:      u32,
    /// Number of 64-byte records in `records`.
    pub record_count:  u32,
    #[serde(skip)]
    pub records:       Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Noise {
    pub runtime:  u32,
    pub values:   [u16; 15],
    pub reserved: u16,
}

/// Drivability stats; the game keeps their sum at or below 300.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Characteristics {
    pub acceleration: u32,
    pub brakes:       u32,
    pub grip:         u32,
    pub handling:     u32,
    pub speed:        u32,
}

impl Characteristics {
    /// Sum of the five stats, widened so corrupt values cannot overflow.
    pub fn total(&self) -> u64 {
        [self.acceleration, self.brakes, self.grip, self.handling, self.speed]
            .iter()
            .map(|&v| u64::from(v))
            .sum()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub name:            String,
    /// Render-space anchors: wheels in [`Wheel`] order, then the chassis.
    pub anchors:         [Vec3; 5],
    #[serde(skip)]
    pub telemetry:       Vec<u8>,
    pub telemetry_list:  Vec<u32>,
    pub material_name:   String,
    /// Absent when the material is plain `GOURAUD`.
    pub textures:        Option<TextureList>,
    pub named_faces:     bool,
    /// `[condition][part]`, 3 × 6.
    pub chassis:         Vec<Vec<ObjectData>>,
    pub wheels:          Vec<ObjectData>,
    /// `[good, ruined][front, rear]`.
    pub shadows:         Vec<Vec<ObjectData>>,
    pub collisions:      Vec<Collision>,
    pub noise:           Noise,
    pub characteristics: Characteristics,
}

impl Vehicle {
    pub fn parse(raw: &[u8], strict: bool) -> Result<Self, FormatError> {
        let mut payload = Payload::open(raw, strict)?;
        let layout = payload.layout(AssetKind::Vehicle);
        let vehicle = Self::read(&mut payload.cursor, layout)?;
        if payload.cursor.truncated_reads() > 0 {
            log::warn!("vehicle '{}' parsed with {} truncated reads", vehicle.name, payload.cursor.truncated_reads());
        }
        Ok(vehicle)
    }

    pub fn read(cur: &mut BinaryCursor, layout: FaceLayout) -> Result<Self, FormatError> {
        let name = cur.read_string()?;
        debug!("vehicle '{}'", name);

        let telemetry = cur.read_bytes(TELEMETRY_LEN)?;
        let telemetry_list = cur.read_array(|c| c.read_u32())?;
        let anchors = anchors_from_telemetry(&telemetry);

        let material_name = cur.read_string()?;
        let textures = if material_name != "GOURAUD" {
            Some(read_texture_list(cur, TEXTURE_WIDTH, TEXTURE_HEIGHT)?)
        } else {
            None
        };

        let named_faces = cur.read_bool()?;
        let flags = (if named_faces { FLAG_NAMED_FACES } else { 0 }) | FLAG_OBJ_HAS_PRISM;

        let chassis = cur.read_array_n(3, |c| c.read_array_n(6, |c| read_object(c, layout, flags)))?;
        let wheels = cur.read_array_n(4, |c| read_object(c, layout, flags))?;
        let shadows = cur.read_array_n(2, |c| {
            c.read_array_n(2, |c| read_object(c, layout, flags & !FLAG_OBJ_HAS_PRISM))
        })?;
        let collisions = cur.read_array_n(2, |c| read_collision(c, layout))?;

        let noise = Noise {
            runtime:  cur.read_u32()?,
            values:   {
                let mut v = [0u16; 15];
                for x in v.iter_mut() {
                    *x = cur.read_u16()?;
                }
                v
            },
            reserved: cur.read_u16()?,
        };
        let characteristics = Characteristics {
            acceleration: cur.read_u32()?,
            brakes:       cur.read_u32()?,
            grip:         cur.read_u32()?,
            handling:     cur.read_u32()?,
            speed:        cur.read_u32()?,
        };

        Ok(Self {
            name,
            anchors,
            telemetry,
            telemetry_list,
            material_name,
            textures,
            named_faces,
            chassis,
            wheels,
            shadows,
            collisions,
            noise,
            characteristics,
        })
    }

    pub fn chassis_parts(&self, condition: Condition) -> &[ObjectData] {
        &self.chassis[condition as usize]
    }

    pub fn wheel(&self, wheel: Wheel) -> &ObjectData {
        &self.wheels[wheel as usize]
    }

    pub fn chassis_offset(&self) -> Vec3 {
        self.anchors[4]
    }

    pub fn wheel_offset(&self, wheel: Wheel) -> Vec3 {
        self.anchors[wheel as usize]
    }

    /// All six parts of one condition as a single mesh.
    pub fn chassis_mesh(&self, condition: Condition) -> Result<Mesh, FormatError> {
        let parts: Vec<&ObjectData> = self.chassis_parts(condition).iter().collect();
        build_mesh(&parts, self.textures.as_ref(), None)
    }

    pub fn wheel_mesh(&self, wheel: Wheel) -> Result<Mesh, FormatError> {
        build_mesh(&[self.wheel(wheel)], self.textures.as_ref(), None)
    }

    pub fn shadow_mesh(&self, ruined: bool, rear: bool) -> Result<Mesh, FormatError> {
        let obj = &self.shadows[ruined as usize][rear as usize];
        build_mesh(&[obj], self.textures.as_ref(), None)
    }

    pub fn collision_mesh(&self, index: usize) -> Result<Mesh, FormatError> {
        let collision = self
            .collisions
            .get(index)
            .ok_or(FormatError::StaleMesh { object: index, face: 0 })?;
        build_mesh(&[&collision.object], self.textures.as_ref(), None)
    }
}

fn read_collision(cur: &mut BinaryCursor, layout: FaceLayout) -> Result<Collision, FormatError> {
    let material_name = cur.read_string()?;
    let named_faces = cur.read_bool()?;
    let flags = (if named_faces { FLAG_NAMED_FACES } else { 0 }) | FLAG_OBJ_HAS_PRISM;
    let object = read_object(cur, layout, flags)?;
    let unknown1 = cur.read_u32()?;
    let unknown2 = [cur.read_u32()?, cur.read_u32()?, cur.read_u32()?];
    let unknown3 = cur.read_u32()?;
    let unknown4 = cur.read_u32()?;
    let record_count = cur.read_u32()?;
    let records = cur.read_bytes(record_count as usize * 64)?;
    Ok(Collision {
        material_name,
        named_faces,
        object,
        unknown1,
        unknown2,
        unknown3,
        unknown4,
        record_count,
        records,
    })
}

/// Each of the five 216-byte position records holds a fixed-point triple
/// at 0x48, stored as `(z', x', y')` of the render-space anchor.
fn anchors_from_telemetry(block: &[u8]) -> [Vec3; 5] {
    let mut anchors = [Vec3::ZERO; 5];
    for (i, a) in anchors.iter_mut().enumerate() {
        let base = i * POSITION_RECORD_LEN + POSITION_FIELD;
        let p = |k: usize| {
            let at = base + k * 4;
            fixed_to_f32(i32::from_le_bytes([block[at], block[at + 1], block[at + 2], block[at + 3]]))
        };
        *a = Vec3::new(p(1), p(2), p(0));
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FIXED_ONE;

    #[test]
    fn anchors_read_from_position_records() {
        let mut block = vec![0u8; TELEMETRY_LEN];
        for i in 0..5 {
            let at = i * POSITION_RECORD_LEN + POSITION_FIELD;
            let vals = [(i as i32 + 1) * FIXED_ONE, 2 * FIXED_ONE, -FIXED_ONE / 2];
            for (k, v) in vals.iter().enumerate() {
                block[at + k * 4..at + k * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        let anchors = anchors_from_telemetry(&block);
        assert_eq!(anchors[0], Vec3::new(2.0, -0.5, 1.0));
        assert_eq!(anchors[4], Vec3::new(2.0, -0.5, 5.0));
    }

    #[test]
    fn characteristics_total() {
        let c = Characteristics { acceleration: 60, brakes: 50, grip: 70, handling: 55, speed: 65 };
        assert_eq!(c.total(), 300);

        let max = Characteristics { acceleration: u32::MAX, brakes: u32::MAX, grip: u32::MAX, handling: u32::MAX, speed: u32::MAX };
        assert_eq!(max.total(), 5 * u64::from(u32::MAX));
    }
}
