//! Race logic sections: designations, difficulty paths and levels, and
//! competitor rosters. Each direction has one designation and three
//! difficulty tiers.

use byteorder::{ByteOrder, LittleEndian};
use glam::Vec3;
use serde::Serialize;

use crate::cursor::BinaryCursor;
use crate::error::FormatError;
use crate::fixed::fixed_point;
use crate::records::{is_present, read_int_vec3, read_position};

use super::{read_macro, Macro};

// ── Designation ──────────────────────────────────────────────────────────────

/// Trigger plane of a designation macro, in render space.
#[derive(Debug, Clone, Serialize)]
pub struct DesignationMacro {
    pub plane:        [Vec3; 4],
    pub plane_normal: Vec3,
    pub macro_index1: i32,
    pub macro_index2: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DesignationMacroSection {
    pub name:               String,
    pub macros:             Vec<Macro>,
    pub designation_macros: Vec<DesignationMacro>,
    pub values:             Vec<[u32; 8]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesignationPhase {
    pub name:        String,
    pub macro_index: i32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Designation {
    pub values:        [u32; 9],
    pub value_a:       [u32; 5],
    pub macro_section: DesignationMacroSection,
    pub phase_macros:  Vec<Macro>,
    pub phases:        Vec<DesignationPhase>,
    /// 36-byte start records; the first 12 bytes are a position.
    pub starts:        Vec<Vec<u8>>,
}

impl Designation {
    /// Grid positions of the start records, in render space.
    pub fn start_positions(&self) -> Vec<Vec3> {
        self.starts
            .iter()
            .map(|s| {
                let v = |k: usize| LittleEndian::read_i32(&s[k * 4..]);
                fixed_point([v(0), v(1), v(2)])
            })
            .collect()
    }
}

pub(super) fn read_designation(cur: &mut BinaryCursor) -> Result<Designation, FormatError> {
    let mut values = [0u32; 9];
    for v in values.iter_mut() {
        *v = cur.read_u32()?;
    }
    let mut value_a = [0u32; 5];
    for v in value_a.iter_mut() {
        *v = cur.read_u32()?;
    }

    let name = cur.read_string()?;
    let macro_section = if is_present(&name) {
        DesignationMacroSection {
            macros:             cur.read_array(read_macro)?,
            designation_macros: cur.read_array(|c| {
                Ok(DesignationMacro {
                    plane:        [read_position(c)?, read_position(c)?, read_position(c)?, read_position(c)?],
                    plane_normal: read_position(c)?,
                    macro_index1: c.read_i32()?,
                    macro_index2: c.read_i32()?,
                })
            })?,
            values:             cur.read_array(|c| {
                let mut v = [0u32; 8];
                for x in v.iter_mut() {
                    *x = c.read_u32()?;
                }
                Ok(v)
            })?,
            name,
        }
    } else {
        DesignationMacroSection { name, ..Default::default() }
    };

    let phase_macros = cur.read_array(read_macro)?;
    let phases = cur.read_array(|c| {
        Ok(DesignationPhase { name: c.read_string()?, macro_index: c.read_i32()? })
    })?;
    let starts = cur.read_array(|c| c.read_bytes(36))?;

    Ok(Designation { values, value_a, macro_section, phase_macros, phases, starts })
}

// ── Difficulty ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DifficultyPoint {
    pub unknown1:       i32,
    pub unknown2:       i32,
    pub position_index: i32,
    pub unknown3:       i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DifficultyConstraint {
    pub designation_index: i32,
    pub unknown1:          i32,
    pub attack:            i32,
}

/// Waypoints and the point lists that thread through them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DifficultyPath {
    pub name:            String,
    pub positions:       Vec<Vec3>,
    pub point_lists:     Vec<Vec<DifficultyPoint>>,
    pub constraint_name: String,
    pub constraints:     Vec<DifficultyConstraint>,
}

impl DifficultyPath {
    /// Positions visited by point list `list`, skipping bad indices.
    pub fn list_positions(&self, list: usize) -> Vec<Vec3> {
        self.point_lists
            .get(list)
            .map(|points| {
                points
                    .iter()
                    .filter_map(|p| usize::try_from(p.position_index).ok())
                    .filter_map(|i| self.positions.get(i).copied())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelConfig1 {
    pub position:         Vec3,
    pub remaining_length: f32,
    pub value3:           i32,
    pub value4:           Vec<u32>,
    pub value5:           Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LevelConfig2 {
    pub value1: i32,
    pub value2: i32,
    pub value3: Vec<u32>,
    pub value4: i32,
    pub value5: Vec<f32>,
}

/// Track segmentation for one tier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DifficultyLevel {
    pub name:         String,
    pub track_length: f32,
    pub unknown2:     i32,
    pub config1s:     Vec<LevelConfig1>,
    pub config2s:     Vec<LevelConfig2>,
    pub config3s:     Vec<[i32; 3]>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Difficulty {
    pub name:  String,
    pub path:  DifficultyPath,
    pub level: DifficultyLevel,
}

fn read_counted_u32s(cur: &mut BinaryCursor) -> Result<Vec<u32>, FormatError> {
    let n = cur.read_i32()?.max(0) as usize;
    cur.read_u32_vec(n)
}

fn read_path(cur: &mut BinaryCursor) -> Result<DifficultyPath, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(DifficultyPath { name, ..Default::default() });
    }
    let positions = cur.read_array(read_position)?;
    let point_lists = cur.read_array(|c| {
        c.read_array(|c| {
            Ok(DifficultyPoint {
                unknown1:       c.read_i32()?,
                unknown2:       c.read_i32()?,
                position_index: c.read_i32()?,
                unknown3:       c.read_i32()?,
            })
        })
    })?;
    let constraint_name = cur.read_string()?;
    let constraints = if is_present(&constraint_name) {
        cur.read_array(|c| {
            Ok(DifficultyConstraint {
                designation_index: c.read_i32()?,
                unknown1:          c.read_i32()?,
                attack:            c.read_i32()?,
            })
        })?
    } else {
        Vec::new()
    };
    Ok(DifficultyPath { name, positions, point_lists, constraint_name, constraints })
}

fn read_level(cur: &mut BinaryCursor) -> Result<DifficultyLevel, FormatError> {
    let name = cur.read_string()?;
    if !is_present(&name) {
        return Ok(DifficultyLevel { name, ..Default::default() });
    }
    let track_length = cur.read_fixed()?;
    let c1 = cur.read_i32()?.max(0) as usize;
    let c2 = cur.read_i32()?.max(0) as usize;
    let c3 = cur.read_i32()?.max(0) as usize;
    let unknown2 = cur.read_i32()?;

    let config1s = cur.read_array_n(c1, |c| {
        Ok(LevelConfig1 {
            position:         read_position(c)?,
            remaining_length: c.read_fixed()?,
            value3:           c.read_i32()?,
            value4:           read_counted_u32s(c)?,
            value5:           read_counted_u32s(c)?,
        })
    })?;
    let config2s = cur.read_array_n(c2, |c| {
        Ok(LevelConfig2 {
            value1: c.read_i32()?,
            value2: c.read_i32()?,
            value3: read_counted_u32s(c)?,
            value4: c.read_i32()?,
            value5: c.read_array(|c| c.read_fixed())?,
        })
    })?;
    let config3s = cur.read_array_n(c3, read_int_vec3)?;

    Ok(DifficultyLevel { name, track_length, unknown2, config1s, config2s, config3s })
}

pub(super) fn read_difficulty(cur: &mut BinaryCursor) -> Result<Difficulty, FormatError> {
    let name = cur.read_string()?;
    let path = read_path(cur)?;
    let level = read_level(cur)?;
    Ok(Difficulty { name, path, level })
}

// ── Competitors ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub name:   String,
    pub value1: i32,
    pub value2: i32,
    pub number: String,
    pub value3: Vec<[i32; 3]>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompetitorSection {
    pub difficulty_name: String,
    pub name:            String,
    pub competitors:     Vec<Competitor>,
}

pub(super) fn read_competitors(cur: &mut BinaryCursor) -> Result<CompetitorSection, FormatError> {
    let difficulty_name = cur.read_string()?;
    let name = cur.read_string()?;
    let competitors = cur.read_array(|c| {
        let name = c.read_string()?;
        let value1 = c.read_i32()?;
        let value2 = c.read_i32()?;
        let number = c.read_string()?;
        let n = c.read_i32()?.max(0) as usize;
        let value3 = c.read_array_n(n, read_int_vec3)?;
        Ok(Competitor { name, value1, value2, number, value3 })
    })?;
    Ok(CompetitorSection { difficulty_name, name, competitors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FIXED_ONE;
    use crate::records::test_support::Writer;

    #[test]
    fn start_positions_from_records() {
        let mut record = Vec::new();
        for v in [FIXED_ONE, 2 * FIXED_ONE, -FIXED_ONE] {
            record.extend_from_slice(&v.to_le_bytes());
        }
        record.resize(36, 0xEE);
        let d = Designation { starts: vec![record, vec![0; 36]], ..Default::default() };
        assert_eq!(d.start_positions(), vec![Vec3::new(-2.0, -1.0, 1.0), Vec3::ZERO]);
    }

    #[test]
    fn difficulty_with_path_and_level() {
        let mut w = Writer::default();
        w.string("EASY").string("PATH");
        w.u32(2).fixed3([FIXED_ONE, 0, 0]).fixed3([0, FIXED_ONE, 0]);
        w.u32(1).u32(2).i32(0).i32(0).i32(1).i32(0).i32(0).i32(0).i32(7).i32(0);
        w.string("NEANT");
        w.string("LEVEL").i32(100 * FIXED_ONE).i32(1).i32(1).i32(1).i32(-1);
        w.fixed3([0, 0, FIXED_ONE]).i32(FIXED_ONE).i32(3).i32(1).u32(11).i32(0);
        w.i32(1).i32(2).i32(2).u32(5).u32(6).i32(4).u32(1).i32(FIXED_ONE / 4);
        w.i32(7).i32(8).i32(9);

        let mut c = w.cursor();
        let d = read_difficulty(&mut c).unwrap();
        assert_eq!(d.name, "EASY");
        assert_eq!(d.path.positions[0], Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(d.path.list_positions(0), vec![Vec3::new(-1.0, 0.0, 0.0)]);
        assert!(d.path.constraints.is_empty());
        assert_eq!(d.level.track_length, 100.0);
        assert_eq!(d.level.unknown2, -1);
        assert_eq!(d.level.config1s[0].position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(d.level.config1s[0].value4, vec![11]);
        assert_eq!(d.level.config2s[0].value3, vec![5, 6]);
        assert_eq!(d.level.config2s[0].value5, vec![0.25]);
        assert_eq!(d.level.config3s, vec![[7, 8, 9]]);
        assert_eq!(c.remaining(), 0);
    }

    #[test]
    fn competitors() {
        let mut w = Writer::default();
        w.string("HARD").string("RIVALS").u32(1);
        w.string("ZED").i32(1).i32(2).string("07").i32(1).i32(4).i32(5).i32(6);
        let s = read_competitors(&mut w.cursor()).unwrap();
        assert_eq!(s.competitors[0].number, "07");
        assert_eq!(s.competitors[0].value3, vec![[4, 5, 6]]);
    }
}
