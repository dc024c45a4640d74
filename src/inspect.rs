//! Caller-owned selection state for visualising race paths.
//!
//! A viewer keeps one [`InspectContext`] next to its loaded circuit, flips
//! selections as the user clicks, and asks for [`markers`] whenever
//! [`InspectContext::take_dirty`] reports a change. The decoder itself
//! never reads this state.
//!
//! [`markers`]: InspectContext::markers

use std::collections::HashMap;

use glam::Vec3;
use serde::Serialize;

use crate::records::circuit::race::Difficulty;
use crate::records::circuit::Circuit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MarkerKind {
    /// Start of a level segment.
    Section,
    /// Waypoint reached through an enabled point list.
    PathPoint,
    /// Any waypoint of the path.
    Position,
    /// Grid start slot of a designation.
    Start,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub kind:     MarkerKind,
    pub position: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct InspectContext {
    /// Path name of the difficulty being shown.
    enabled_difficulty: Option<String>,
    /// Per path name, one flag per point list.
    point_lists:        HashMap<String, Vec<bool>>,
    /// Per path name, whether every waypoint is shown.
    all_positions:      HashMap<String, bool>,
    dirty:              bool,
}

impl InspectContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled_difficulty(&self) -> Option<&str> {
        self.enabled_difficulty.as_deref()
    }

    pub fn select_difficulty(&mut self, difficulty: &Difficulty) {
        self.enabled_difficulty = Some(difficulty.path.name.clone());
        self.dirty = true;
    }

    pub fn clear_selection(&mut self) {
        self.enabled_difficulty = None;
        self.dirty = true;
    }

    fn lists_mut(&mut self, difficulty: &Difficulty) -> &mut Vec<bool> {
        let lists = self.point_lists.entry(difficulty.path.name.clone()).or_default();
        lists.resize(difficulty.path.point_lists.len(), false);
        lists
    }

    pub fn is_point_list_enabled(&self, difficulty: &Difficulty, list: usize) -> bool {
        self.point_lists
            .get(&difficulty.path.name)
            .and_then(|l| l.get(list).copied())
            .unwrap_or(false)
    }

    /// Flip one point list. Out-of-range lists are ignored.
    pub fn toggle_point_list(&mut self, difficulty: &Difficulty, list: usize) {
        if let Some(flag) = self.lists_mut(difficulty).get_mut(list) {
            *flag = !*flag;
            self.dirty = true;
        }
    }

    pub fn all_positions_enabled(&self, difficulty: &Difficulty) -> bool {
        self.all_positions.get(&difficulty.path.name).copied().unwrap_or(false)
    }

    /// Flip the all-waypoints view. Turning it on hides every point list,
    /// turning it off shows them all.
    pub fn toggle_all_positions(&mut self, difficulty: &Difficulty) {
        let all = self.all_positions.entry(difficulty.path.name.clone()).or_insert(false);
        *all = !*all;
        let lists_on = !*all;
        for flag in self.lists_mut(difficulty).iter_mut() {
            *flag = lists_on;
        }
        self.dirty = true;
    }

    /// Whether any selection changed since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Markers for every difficulty of `circuit` whose path is selected.
    pub fn markers(&self, circuit: &Circuit) -> Vec<Marker> {
        let mut out = Vec::new();
        let Some(selected) = self.enabled_difficulty.as_deref() else { return out };

        for d in circuit.difficulties().filter(|d| d.path.name == selected) {
            out.extend(d.level.config1s.iter().map(|c| Marker { kind: MarkerKind::Section, position: c.position }));
            for list in 0..d.path.point_lists.len() {
                if self.is_point_list_enabled(d, list) {
                    out.extend(
                        d.path
                            .list_positions(list)
                            .into_iter()
                            .map(|p| Marker { kind: MarkerKind::PathPoint, position: p }),
                    );
                }
            }
            if self.all_positions_enabled(d) {
                out.extend(d.path.positions.iter().map(|&p| Marker { kind: MarkerKind::Position, position: p }));
            }
        }
        out
    }
}

/// Start slots of both directions.
pub fn start_markers(circuit: &Circuit) -> Vec<Marker> {
    [&circuit.designation_forward, &circuit.designation_reverse]
        .into_iter()
        .flat_map(|d| d.start_positions())
        .map(|p| Marker { kind: MarkerKind::Start, position: p })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::circuit::race::{DifficultyPath, DifficultyPoint};

    fn difficulty(name: &str) -> Difficulty {
        let point = |i| DifficultyPoint { unknown1: 0, unknown2: 0, position_index: i, unknown3: 0 };
        Difficulty {
            name:  "EASY".into(),
            path:  DifficultyPath {
                name:        name.into(),
                positions:   vec![Vec3::X, Vec3::Y, Vec3::Z],
                point_lists: vec![vec![point(0)], vec![point(2), point(9)]],
                ..Default::default()
            },
            level: Default::default(),
        }
    }

    #[test]
    fn point_lists_start_disabled() {
        let d = difficulty("P1");
        let mut ctx = InspectContext::new();
        assert!(!ctx.is_point_list_enabled(&d, 0));
        ctx.toggle_point_list(&d, 1);
        assert!(ctx.is_point_list_enabled(&d, 1));
        assert!(ctx.take_dirty());
        assert!(!ctx.take_dirty());
        ctx.toggle_point_list(&d, 5);
        assert!(!ctx.take_dirty());
    }

    #[test]
    fn all_positions_inverts_lists() {
        let d = difficulty("P1");
        let mut ctx = InspectContext::new();
        ctx.toggle_point_list(&d, 0);
        ctx.toggle_all_positions(&d);
        assert!(ctx.all_positions_enabled(&d));
        assert!(!ctx.is_point_list_enabled(&d, 0));
        assert!(!ctx.is_point_list_enabled(&d, 1));
        ctx.toggle_all_positions(&d);
        assert!(ctx.is_point_list_enabled(&d, 0));
        assert!(ctx.is_point_list_enabled(&d, 1));
    }

    #[test]
    fn selection_is_per_path_name() {
        let a = difficulty("P1");
        let b = difficulty("P2");
        let mut ctx = InspectContext::new();
        ctx.toggle_point_list(&a, 0);
        assert!(!ctx.is_point_list_enabled(&b, 0));
        ctx.select_difficulty(&b);
        assert_eq!(ctx.enabled_difficulty(), Some("P2"));
    }
}
