use serde::{Deserialize, Serialize};

pub type Dimension = f64;

/// Volume every musician plays at when a solution doesn't say otherwise.
pub const LOUDEST_VOLUME: f64 = 10.0;

#[derive(Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct Instrument(pub usize);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Attendee {
  #[serde(flatten)]
  pub position: Position,
  pub tastes: Vec<f64>
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProblemSpec {
  pub room_height: Dimension,
  pub room_width: Dimension,
  pub stage_height: Dimension,
  pub stage_width: Dimension,
  pub stage_bottom_left: [Dimension; 2],
  pub musicians: Vec<Instrument>,
  pub attendees: Vec<Attendee>
}

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct Position {
  pub x: Dimension,
  pub y: Dimension,
}

impl Position {
  pub fn new(x: Dimension, y: Dimension) -> Self {
    Position { x, y }
  }

  pub fn dist_sq(&self, other: &Position) -> f64 {
    let dx = self.x - other.x;
    let dy = self.y - other.y;
    dx * dx + dy * dy
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Solution {
  pub placements: Vec<Position>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub volumes: Option<Vec<f64>>
}

impl Solution {
  pub fn from_placements(placements: Vec<Position>) -> Self {
    let volumes = vec![LOUDEST_VOLUME; placements.len()];
    Solution { placements, volumes: Some(volumes) }
  }

  /// Fills in volumes for solutions written before volumes existed.
  /// Returns `true` when anything changed.
  pub fn backfill_volumes(&mut self) -> bool {
    if self.volumes.is_some() {
      return false;
    }
    self.volumes = Some(vec![LOUDEST_VOLUME; self.placements.len()]);
    true
  }
}

/// Report shape printed by the standalone scorer binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvalReport {
  pub msg: String,
  pub value: i64,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn attendee_position_is_flattened() {
    let attendee: Attendee = serde_json::from_str(r#"{"x": 1.5, "y": 2.0, "tastes": [1.0, -3.0]}"#).unwrap();

    assert_eq!(attendee.position, Position::new(1.5, 2.0));
    assert_eq!(attendee.tastes, vec![1.0, -3.0]);
  }

  #[test]
  fn solution_without_volumes_is_backfilled() {
    let mut solution: Solution = serde_json::from_str(r#"{"placements": [{"x": 1.0, "y": 2.0}, {"x": 3.0, "y": 4.0}]}"#).unwrap();
    assert_eq!(solution.volumes, None);

    assert!(solution.backfill_volumes());
    assert_eq!(solution.volumes, Some(vec![LOUDEST_VOLUME, LOUDEST_VOLUME]));
    assert!(!solution.backfill_volumes());
  }

  #[test]
  fn solution_round_trips_coordinates() {
    let placements = vec![Position::new(110.123456789, 20.5), Position::new(1e-7, 1234.000000001)];
    let json = serde_json::to_string(&Solution::from_placements(placements.clone())).unwrap();
    let parsed: Solution = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.placements.len(), placements.len());
    for (a, b) in parsed.placements.iter().zip(&placements) {
      assert!((a.x - b.x).abs() < 1e-9);
      assert!((a.y - b.y).abs() < 1e-9);
    }
    assert_eq!(parsed.volumes, Some(vec![LOUDEST_VOLUME; 2]));
  }
}
