//! Circuit (`.BL*`) schema.
//!
//! The first part of the file is read front to back; the remaining race
//! sections are reached through fixed slots of the offset table
//! ([`OffsetSlot`]).

pub mod anim;
pub mod race;

use glam::{Mat3, Vec2, Vec3};
use log::{debug, warn};
use serde::Serialize;

use crate::cursor::BinaryCursor;
use crate::error::FormatError;
use crate::mesh::{build_mesh, Aabb, Mesh};
use crate::records::{
    is_present, read_int_vec2, read_object, read_position, read_rotation, read_texture_list,
    AssetKind, FaceLayout, ObjectData, Payload, TextureList, FLAG_FACE_UNK_PROPERTY,
    FLAG_NAMED_FACES,
};

use anim::{read_anim1_section, read_anim2_section, Anim1Section, Anim2Section};
use race::{
    read_competitors, read_designation, read_difficulty, CompetitorSection, Designation,
    Difficulty,
};

pub const TEXTURE_WIDTH:  u32 = 256;
pub const TEXTURE_HEIGHT: u32 = 256;

/// Value of the first dword of every shipped circuit.
pub const CIRCUIT_MARKER: u32 = 3;

/// Vertical margin the game adds to stored sector bounds.
const SECTOR_BOUNDS_BELOW: f32 = 2.0;
const SECTOR_BOUNDS_ABOVE: f32 = 10.0;

/// Offset table slots used by circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSlot {
    Main                    = 0,
    DifficultyForwardNormal = 1,
    DifficultyForwardHard   = 2,
    DesignationReverse      = 3,
    DifficultyReverseNormal = 4,
    DifficultyReverseHard   = 5,
    CompetitorsEasy         = 6,
    CompetitorsNormal       = 7,
    CompetitorsHard         = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Tier {
    Easy   = 0,
    Normal = 1,
    Hard   = 2,
}

// ── Events and macros ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name:        String,
    pub param_size:  i32,
    pub param_count: i32,
    pub params:      Vec<u8>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Macro {
    pub event_index: u32,
    pub param_index: u32,
    pub next_macro:  u32,
}

pub(crate) fn read_macro(cur: &mut BinaryCursor) -> Result<Macro, FormatError> {
    Ok(Macro {
        event_index: cur.read_u32()?,
        param_index: cur.read_u32()?,
        next_macro:  cur.read_u32()?,
    })
}

/// Macro tables that follow the events, in file order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MacroTables {
    pub base:     Vec<Macro>,
    pub plain:    Vec<u32>,
    pub init:     Vec<u32>,
    pub active:   Vec<u32>,
    pub inactive: Vec<u32>,
    pub replace:  Vec<[u32; 2]>,
    pub exchange: Vec<[u32; 2]>,
}

fn read_event(cur: &mut BinaryCursor) -> Result<Event, FormatError> {
    let name = cur.read_string()?;
    let param_size = cur.read_i32()?;
    let param_count = cur.read_i32()?;
    let len = (param_size.max(0) as usize).saturating_mul(param_count.max(0) as usize);
    let params = cur.read_bytes(len)?;
    Ok(Event { name, param_size, param_count, params })
}

fn read_macro_tables(cur: &mut BinaryCursor) -> Result<MacroTables, FormatError> {
    let pair = |c: &mut BinaryCursor| Ok([c.read_u32()?, c.read_u32()?]);
    Ok(MacroTables {
        base:     cur.read_array(read_macro)?,
        plain:    cur.read_array(|c| c.read_u32())?,
        init:     cur.read_array(|c| c.read_u32())?,
        active:   cur.read_array(|c| c.read_u32())?,
        inactive: cur.read_array(|c| c.read_u32())?,
        replace:  cur.read_array(pair)?,
        exchange: cur.read_array(pair)?,
    })
}

// ── Sectors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Sector {
    pub object:       ObjectData,
    #[serde(skip)]
    pub vertex_gamma: Vec<u8>,
    /// Render space, as stored.
    pub bounds_min:   Vec3,
    pub bounds_max:   Vec3,
}

impl Sector {
    /// Culling bounds: the stored box with the game's vertical margin.
    pub fn render_bounds(&self) -> Aabb {
        let mut b = Aabb::from_corners(self.bounds_min, self.bounds_max);
        b.min.y -= SECTOR_BOUNDS_BELOW;
        b.max.y += SECTOR_BOUNDS_ABOVE;
        b
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Visibility {
    /// `-1` when the list is absent.
    pub count:   i32,
    pub sectors: Vec<i32>,
}

fn read_sector(cur: &mut BinaryCursor, layout: FaceLayout, named: bool) -> Result<Sector, FormatError> {
    let flags = FLAG_FACE_UNK_PROPERTY | if named { FLAG_NAMED_FACES } else { 0 };
    let object = read_object(cur, layout, flags)?;
    let vertex_gamma = cur.read_bytes(object.vertices.len())?;
    let bounds_min = read_position(cur)?;
    let bounds_max = read_position(cur)?;
    Ok(Sector { object, vertex_gamma, bounds_min, bounds_max })
}

fn read_visibility(cur: &mut BinaryCursor) -> Result<Visibility, FormatError> {
    let count = cur.read_i32()?;
    let sectors = if count > -1 { cur.read_i32_vec(count as usize)? } else { Vec::new() };
    Ok(Visibility { count, sectors })
}

// ── Environment ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Decoration {
    pub name:        String,
    pub object_name: String,
    pub textures:    TextureList,
    pub named_faces: bool,
    pub object:      ObjectData,
    pub prism1:      [i32; 3],
    pub prism2:      u32,
    pub prism3:      [i32; 3],
    pub unknown1:    u32,
    pub unknown2:    [u32; 3],
    pub unknown3:    u32,
    pub unknown4:    u32,
    /// 64-byte contact records.
    #[serde(skip)]
    pub contacts:    Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecorationInstance {
    pub index:    i32,
    pub vectors:  Vec<[i32; 2]>,
    pub position: Vec3,
    pub rotation: Mat3,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Environment {
    pub name:                String,
    pub macros:              Vec<Macro>,
    pub decorations:         Vec<Decoration>,
    pub instances:           Vec<DecorationInstance>,
    /// One instance list per sector.
    pub sector_instances:    Vec<Vec<DecorationInstance>>,
}

fn read_decoration(cur: &mut BinaryCursor, layout: FaceLayout) -> Result<Decoration, FormatError> {
    let name = cur.read_string()?;
    let object_name = cur.read_string()?;
    let textures = read_texture_list(cur, 128, 128)?;
    let named_faces = cur.read_bool()?;
    let object = read_object(cur, layout, if named_faces { FLAG_NAMED_FACES } else { 0 })?;
    Ok(Decoration {
        name,
        object_name,
        textures,
        named_faces,
        object,
        prism1:   cur.read_fixed3()?,
        prism2:   cur.read_u32()?,
        prism3:   cur.read_fixed3()?,
        unknown1: cur.read_u32()?,
        unknown2: [cur.read_u32()?, cur.read_u32()?, cur.read_u32()?],
        unknown3: cur.read_u32()?,
        unknown4: cur.read_u32()?,
        contacts: cur.read_array(|c| c.read_bytes(64))?,
    })
}

fn read_decoration_instance(cur: &mut BinaryCursor) -> Result<DecorationInstance, FormatError> {
    Ok(DecorationInstance {
        index:    cur.read_i32()?,
        vectors:  cur.read_array(read_int_vec2)?,
        position: read_position(cur)?,
        rotation: read_rotation(cur)?,
    })
}

fn read_environment(
    cur: &mut BinaryCursor,
    layout: FaceLayout,
    sector_count: usize,
) -> Result<Environment, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(Environment { name, ..Default::default() });
    }
    Ok(Environment {
        macros:           cur.read_array(read_macro)?,
        decorations:      cur.read_array(|c| read_decoration(c, layout))?,
        instances:        cur.read_array(read_decoration_instance)?,
        sector_instances: cur.read_array_n(sector_count, |c| c.read_array(read_decoration_instance))?,
        name,
    })
}

// ── Lights ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Light {
    pub kind:      u32,
    pub position:  Vec3,
    pub rotation:  Mat3,
    pub value1:    u32,
    pub value2:    u32,
    pub diffusion: u32,
    pub value3:    u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LightSection {
    pub name:          String,
    pub sector_count:  u32,
    pub value1:        u32,
    pub value2:        [u32; 3],
    /// Seven scalars following `value2`.
    pub values:        [u32; 7],
    pub global_lights: Vec<Light>,
    pub sector_lights: Vec<Vec<Light>>,
}

fn read_light(cur: &mut BinaryCursor) -> Result<Light, FormatError> {
    Ok(Light {
        kind:      cur.read_u32()?,
        position:  read_position(cur)?,
        rotation:  read_rotation(cur)?,
        value1:    cur.read_u32()?,
        value2:    cur.read_u32()?,
        diffusion: cur.read_u32()?,
        value3:    cur.read_u32()?,
    })
}

fn read_lights(cur: &mut BinaryCursor) -> Result<LightSection, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(LightSection { name, ..Default::default() });
    }
    let sector_count = cur.read_u32()?;
    let value1 = cur.read_u32()?;
    let value2 = [cur.read_u32()?, cur.read_u32()?, cur.read_u32()?];
    let mut values = [0u32; 7];
    for v in values.iter_mut() {
        *v = cur.read_u32()?;
    }
    let global_lights = if sector_count > 0 { cur.read_array(read_light)? } else { Vec::new() };
    let sector_lights = cur.read_array_n(sector_count as usize, |c| c.read_array(read_light))?;
    Ok(LightSection { name, sector_count, value1, value2, values, global_lights, sector_lights })
}

// ── Sounds, background, sky, repair zones ────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct SoundSection {
    pub name:   String,
    pub sounds: Vec<[u32; 14]>,
}

fn read_sounds(cur: &mut BinaryCursor) -> Result<SoundSection, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(SoundSection { name, sounds: Vec::new() });
    }
    let sounds = cur.read_array(|c| {
        let mut s = [0u32; 14];
        for v in s.iter_mut() {
            *v = c.read_u32()?;
        }
        Ok(s)
    })?;
    Ok(SoundSection { name, sounds })
}

#[derive(Debug, Clone, Serialize)]
pub struct Background {
    pub fog_distance:  i32,
    pub fog_intensity: i32,
    pub back_depth:    i32,
    pub back_bottom:   i32,
    pub visible:       bool,
    pub color:         u32,
    pub name:          String,
    pub textures:      TextureList,
    pub y_start:       i32,
    pub y_end:         i32,
}

fn read_background(cur: &mut BinaryCursor) -> Result<Background, FormatError> {
    Ok(Background {
        fog_distance:  cur.read_i32()?,
        fog_intensity: cur.read_i32()?,
        back_depth:    cur.read_i32()?,
        back_bottom:   cur.read_i32()?,
        visible:       cur.read_bool()?,
        color:         cur.read_u32()?,
        name:          cur.read_string()?,
        textures:      read_texture_list(cur, 256, 256)?,
        y_start:       cur.read_i32()?,
        y_end:         cur.read_i32()?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct Sky {
    pub visible:     bool,
    pub y_effect:    i32,
    pub unknown1:    i32,
    pub unknown2:    i32,
    pub fade_amount: i32,
    pub speed:       i32,
    pub name:        String,
    pub textures:    TextureList,
    /// 128 × 128 RGB565.
    #[serde(skip)]
    pub lens_flare:  Vec<u16>,
    pub unknown3:    i32,
}

fn read_sky(cur: &mut BinaryCursor) -> Result<Sky, FormatError> {
    Ok(Sky {
        visible:     cur.read_bool()?,
        y_effect:    cur.read_i32()?,
        unknown1:    cur.read_i32()?,
        unknown2:    cur.read_i32()?,
        fade_amount: cur.read_i32()?,
        speed:       cur.read_i32()?,
        name:        cur.read_string()?,
        textures:    read_texture_list(cur, 128, 128)?,
        lens_flare:  cur.read_u16_vec(128 * 128)?,
        unknown3:    cur.read_i32()?,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairZone {
    pub positions: [Vec3; 4],
    pub center:    Vec3,
    pub height:    f32,
    pub delay:     f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairZoneSection {
    pub name:  String,
    pub zones: Vec<RepairZone>,
    pub time:  f32,
}

fn read_repair_zones(cur: &mut BinaryCursor) -> Result<RepairZoneSection, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(RepairZoneSection { name, ..Default::default() });
    }
    let zones = cur.read_array(|c| {
        Ok(RepairZone {
            positions: [read_position(c)?, read_position(c)?, read_position(c)?, read_position(c)?],
            center:    read_position(c)?,
            height:    c.read_fixed()?,
            delay:     c.read_fixed()?,
        })
    })?;
    let time = cur.read_fixed()?;
    Ok(RepairZoneSection { name, zones, time })
}

// ── Circuit ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Circuit {
    pub marker:              u32,
    pub reserved:            u32,
    pub event_buffer_size:   u32,
    pub events:              Vec<Event>,
    pub macros:              MacroTables,
    pub track_name:          String,
    pub level_of_detail:     [u32; 16],
    pub project_name:        String,
    pub textures:            TextureList,
    pub named_sector_faces:  bool,
    pub sectors:             Vec<Sector>,
    pub visibility:          Vec<Visibility>,
    pub environment:         Environment,
    pub lights:              LightSection,
    pub anim1:               Anim1Section,
    pub sounds:              SoundSection,
    pub background:          Background,
    pub sky:                 Sky,
    pub anim2:               Vec<Anim2Section>,
    pub repair_zones:        RepairZoneSection,
    pub designation_forward: Designation,
    pub designation_reverse: Designation,
    /// Easy, normal, hard.
    pub difficulty_forward:  Vec<Difficulty>,
    pub difficulty_reverse:  Vec<Difficulty>,
    pub competitors:         Vec<CompetitorSection>,
}

impl Circuit {
    pub fn parse(raw: &[u8], strict: bool) -> Result<Self, FormatError> {
        let mut payload = Payload::open(raw, strict)?;
        let layout = payload.layout(AssetKind::Circuit);
        let circuit = Self::read(&mut payload.cursor, layout, strict)?;
        if payload.cursor.truncated_reads() > 0 {
            warn!(
                "circuit '{}' parsed with {} truncated reads",
                circuit.track_name,
                payload.cursor.truncated_reads()
            );
        }
        Ok(circuit)
    }

    /// Decode a circuit from a cursor whose offset table is installed.
    pub fn read(cur: &mut BinaryCursor, layout: FaceLayout, strict: bool) -> Result<Self, FormatError> {
        cur.seek_offset(OffsetSlot::Main as usize)?;

        let marker = cur.read_u32()?;
        if marker != CIRCUIT_MARKER {
            if strict {
                return Err(FormatError::UnexpectedSentinel {
                    section: "circuit header",
                    found:   marker.to_string(),
                });
            }
            warn!("circuit marker is {} (expected {})", marker, CIRCUIT_MARKER);
        }
        let reserved = cur.read_u32()?;

        let event_count = cur.read_i32()?.max(0) as usize;
        let event_buffer_size = cur.read_u32()?;
        let events = cur.read_array_n(event_count, read_event)?;
        let macros = read_macro_tables(cur)?;

        let track_name = cur.read_string()?;
        let mut level_of_detail = [0u32; 16];
        for v in level_of_detail.iter_mut() {
            *v = cur.read_u32()?;
        }
        let project_name = cur.read_string()?;
        debug!("circuit '{}' ({}), {} events", track_name, project_name, events.len());

        let textures = read_texture_list(cur, TEXTURE_WIDTH, TEXTURE_HEIGHT)?;
        let named_sector_faces = cur.read_bool()?;
        let sectors = cur.read_array(|c| read_sector(c, layout, named_sector_faces))?;
        let visibility = cur.read_array(read_visibility)?;
        debug!("{} sectors", sectors.len());

        let environment = read_environment(cur, layout, sectors.len())?;
        let lights = read_lights(cur)?;
        let anim1 = read_anim1_section(cur, layout, sectors.len())?;
        let sounds = read_sounds(cur)?;
        let background = read_background(cur)?;
        let sky = read_sky(cur)?;

        let anim2_count = (cur.read_u32()? as usize + 1) / 2;
        let anim2 = cur.read_array_n(anim2_count, read_anim2_section)?;
        let repair_zones = read_repair_zones(cur)?;

        let designation_forward = read_designation(cur)?;
        let forward_easy = read_difficulty(cur)?;
        cur.seek_offset(OffsetSlot::DifficultyForwardNormal as usize)?;
        let forward_normal = read_difficulty(cur)?;
        cur.seek_offset(OffsetSlot::DifficultyForwardHard as usize)?;
        let forward_hard = read_difficulty(cur)?;

        cur.seek_offset(OffsetSlot::DesignationReverse as usize)?;
        let designation_reverse = read_designation(cur)?;
        let reverse_easy = read_difficulty(cur)?;
        cur.seek_offset(OffsetSlot::DifficultyReverseNormal as usize)?;
        let reverse_normal = read_difficulty(cur)?;
        cur.seek_offset(OffsetSlot::DifficultyReverseHard as usize)?;
        let reverse_hard = read_difficulty(cur)?;

        let mut competitors = Vec::with_capacity(3);
        for slot in [OffsetSlot::CompetitorsEasy, OffsetSlot::CompetitorsNormal, OffsetSlot::CompetitorsHard] {
            cur.seek_offset(slot as usize)?;
            competitors.push(read_competitors(cur)?);
        }

        Ok(Self {
            marker,
            reserved,
            event_buffer_size,
            events,
            macros,
            track_name,
            level_of_detail,
            project_name,
            textures,
            named_sector_faces,
            sectors,
            visibility,
            environment,
            lights,
            anim1,
            sounds,
            background,
            sky,
            anim2,
            repair_zones,
            designation_forward,
            designation_reverse,
            difficulty_forward: vec![forward_easy, forward_normal, forward_hard],
            difficulty_reverse: vec![reverse_easy, reverse_normal, reverse_hard],
            competitors,
        })
    }

    pub fn difficulty(&self, direction: Direction, tier: Tier) -> &Difficulty {
        match direction {
            Direction::Forward => &self.difficulty_forward[tier as usize],
            Direction::Reverse => &self.difficulty_reverse[tier as usize],
        }
    }

    pub fn designation(&self, direction: Direction) -> &Designation {
        match direction {
            Direction::Forward => &self.designation_forward,
            Direction::Reverse => &self.designation_reverse,
        }
    }

    pub fn competitors(&self, tier: Tier) -> &CompetitorSection {
        &self.competitors[tier as usize]
    }

    /// All six difficulties, forward tiers first.
    pub fn difficulties(&self) -> impl Iterator<Item = &Difficulty> {
        self.difficulty_forward.iter().chain(self.difficulty_reverse.iter())
    }

    pub fn sector_lights(&self, sector: usize) -> Option<&[Light]> {
        self.lights.sector_lights.get(sector).map(Vec::as_slice)
    }

    pub fn sector_mesh(&self, sector: usize) -> Result<Mesh, FormatError> {
        let s = self.sector(sector)?;
        build_mesh(&[&s.object], Some(&self.textures), Some(s.render_bounds()))
    }

    pub fn decoration_mesh(&self, decoration: usize) -> Result<Mesh, FormatError> {
        let d = self.environment.decorations.get(decoration).ok_or(FormatError::StaleMesh {
            object: decoration,
            face:   0,
        })?;
        build_mesh(&[&d.object], Some(&d.textures), None)
    }

    fn sector(&self, sector: usize) -> Result<&Sector, FormatError> {
        self.sectors.get(sector).ok_or(FormatError::StaleMesh { object: sector, face: 0 })
    }

    /// Override the UVs of one sector face, addressed the way Anim2 data
    /// addresses it. Returns `false` when the face does not exist.
    pub fn set_face_anim_uv(
        &mut self,
        sector: usize,
        face_type: i32,
        face_index: usize,
        uvs: [Vec2; 4],
    ) -> bool {
        let Some(s) = self.sectors.get_mut(sector) else { return false };
        match s.object.face_by_type(face_type, face_index) {
            Some(fi) => {
                s.object.faces[fi].anim_uvs = Some(uvs);
                true
            }
            None => false,
        }
    }

    /// Drop every UV override.
    pub fn clear_anim_uvs(&mut self) {
        for s in &mut self.sectors {
            for f in &mut s.object.faces {
                f.anim_uvs = None;
            }
        }
    }

    /// Apply every Anim2 track at `time` and return the sectors whose UVs
    /// changed, sorted and deduplicated. Refresh their meshes with
    /// [`crate::mesh::update_mesh_uv`].
    pub fn apply_anim2(&mut self, time: f32) -> Vec<usize> {
        let mut updates = Vec::new();
        for section in &self.anim2 {
            for sa in &section.sector_animations {
                let Some(anim) = usize::try_from(sa.anim_index).ok().and_then(|i| section.animations.get(i)) else {
                    warn!("anim2 '{}' refers to missing animation {}", section.name, sa.anim_index);
                    continue;
                };
                for sec in &sa.sectors {
                    for face in &sec.faces {
                        if let Some(key) = anim.key_at(time, face.looping != 0) {
                            updates.push((sec.sector_index, face.face_type, face.face_index, key.uvs));
                        }
                    }
                }
            }
        }

        let mut dirty = Vec::new();
        for (sector, face_type, face_index, uvs) in updates {
            let (Ok(s), Ok(fi)) = (usize::try_from(sector), usize::try_from(face_index)) else { continue };
            if self.set_face_anim_uv(s, face_type, fi, uvs) {
                dirty.push(s);
            }
        }
        dirty.sort_unstable();
        dirty.dedup();
        dirty
    }
}
