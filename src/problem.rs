use multimap::MultiMap;
use crate::error::InputError;
use crate::models::{Attendee, Dimension, Instrument, Position, ProblemSpec};
use crate::optimizer::MusicianId;

/// Musicians keep this distance from every stage edge.
pub const STAGE_MARGIN: Dimension = 10.0;

/// Minimum distance between two musicians.
pub const MUSICIAN_RADIUS: Dimension = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
  pub min: Position,
  pub max: Position,
}

impl Bounds {
  /// Inclusive on every edge.
  pub fn contains(&self, p: &Position) -> bool {
    p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
  }
}

/// A problem normalised into flat arrays. Immutable once built.
#[derive(Debug, Clone)]
pub struct Problem {
  pub room_width: Dimension,
  pub room_height: Dimension,
  pub stage_width: Dimension,
  pub stage_height: Dimension,
  pub stage_origin: Position,
  pub musicians: Vec<Instrument>,
  pub attendees: Vec<Position>,
  /// `tastes[instrument][attendee]`
  pub tastes: Vec<Vec<f64>>,
}

impl Problem {
  pub fn instrument_count(&self) -> usize {
    self.tastes.len()
  }

  pub fn taste(&self, instrument: Instrument, attendee: usize) -> f64 {
    self.tastes[instrument.0][attendee]
  }

  /// Region a musician's centre may occupy: the stage minus its margin.
  pub fn inner_bounds(&self) -> Bounds {
    Bounds {
      min: Position::new(self.stage_origin.x + STAGE_MARGIN, self.stage_origin.y + STAGE_MARGIN),
      max: Position::new(
        self.stage_origin.x + self.stage_width - STAGE_MARGIN,
        self.stage_origin.y + self.stage_height - STAGE_MARGIN,
      ),
    }
  }

  pub fn inner_size(&self) -> (Dimension, Dimension) {
    (self.stage_width - 2.0 * STAGE_MARGIN, self.stage_height - 2.0 * STAGE_MARGIN)
  }

  pub fn musicians_by_instrument(&self) -> MultiMap<Instrument, MusicianId> {
    self.musicians.iter()
      .copied()
      .enumerate()
      .map(|(idx, inst)| (inst, MusicianId(idx)))
      .collect()
  }
}

fn finite(value: f64, what: impl FnOnce() -> String) -> Result<f64, InputError> {
  if value.is_finite() {
    Ok(value)
  } else {
    Err(InputError::NonFinite { what: what() })
  }
}

impl TryFrom<&ProblemSpec> for Problem {
  type Error = InputError;

  fn try_from(spec: &ProblemSpec) -> Result<Self, Self::Error> {
    if spec.musicians.is_empty() {
      return Err(InputError::NoMusicians);
    }

    finite(spec.room_width, || "room_width".into())?;
    finite(spec.room_height, || "room_height".into())?;
    let stage_width = finite(spec.stage_width, || "stage_width".into())?;
    let stage_height = finite(spec.stage_height, || "stage_height".into())?;
    if stage_width <= 0.0 || stage_height <= 0.0 {
      return Err(InputError::NonPositiveStage { width: stage_width, height: stage_height });
    }
    let origin = Position::new(
      finite(spec.stage_bottom_left[0], || "stage_bottom_left[0]".into())?,
      finite(spec.stage_bottom_left[1], || "stage_bottom_left[1]".into())?,
    );

    let max_instrument = spec.musicians.iter().map(|inst| inst.0).max().unwrap_or_default();

    // Without attendees there is nothing to read a width from; every musician's instrument gets an empty row.
    let instruments = spec.attendees.first()
      .map(|a| a.tastes.len())
      .unwrap_or(max_instrument + 1);

    let mut tastes = vec![Vec::with_capacity(spec.attendees.len()); instruments];
    let mut attendees = Vec::with_capacity(spec.attendees.len());

    for (idx, attendee) in spec.attendees.iter().enumerate() {
      if attendee.tastes.len() != instruments {
        return Err(InputError::RaggedTastes { attendee: idx, expected: instruments, found: attendee.tastes.len() });
      }
      let x = finite(attendee.position.x, || format!("attendee {idx} x"))?;
      let y = finite(attendee.position.y, || format!("attendee {idx} y"))?;
      attendees.push(Position::new(x, y));

      for (inst, &taste) in attendee.tastes.iter().enumerate() {
        tastes[inst].push(finite(taste, || format!("attendee {idx} taste {inst}"))?);
      }
    }

    if let Some((musician, inst)) = spec.musicians.iter().enumerate().find(|(_, inst)| inst.0 >= instruments) {
      return Err(InputError::InstrumentOutOfRange { musician, instrument: inst.0, instruments });
    }
    if instruments != max_instrument + 1 {
      return Err(InputError::UnplayedInstruments { expected: max_instrument + 1, found: instruments });
    }

    Ok(Problem {
      room_width: spec.room_width,
      room_height: spec.room_height,
      stage_width,
      stage_height,
      stage_origin: origin,
      musicians: spec.musicians.clone(),
      attendees,
      tastes,
    })
  }
}

impl From<&Problem> for ProblemSpec {
  fn from(problem: &Problem) -> Self {
    let attendees = problem.attendees.iter()
      .enumerate()
      .map(|(idx, &position)| Attendee {
        position,
        tastes: problem.tastes.iter().map(|row| row[idx]).collect(),
      })
      .collect();

    ProblemSpec {
      room_width: problem.room_width,
      room_height: problem.room_height,
      stage_width: problem.stage_width,
      stage_height: problem.stage_height,
      stage_bottom_left: [problem.stage_origin.x, problem.stage_origin.y],
      musicians: problem.musicians.clone(),
      attendees,
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  pub(crate) const EXAMPLE_JSON: &str = include_str!("problems/example.json");

  pub(crate) fn spec(
    stage: (f64, f64, f64, f64),
    musicians: &[usize],
    attendees: &[(f64, f64, &[f64])],
  ) -> ProblemSpec {
    ProblemSpec {
      room_width: 10_000.0,
      room_height: 10_000.0,
      stage_bottom_left: [stage.0, stage.1],
      stage_width: stage.2,
      stage_height: stage.3,
      musicians: musicians.iter().copied().map(Instrument).collect(),
      attendees: attendees.iter()
        .map(|&(x, y, tastes)| Attendee { position: Position::new(x, y), tastes: tastes.to_vec() })
        .collect(),
    }
  }

  pub(crate) fn problem(
    stage: (f64, f64, f64, f64),
    musicians: &[usize],
    attendees: &[(f64, f64, &[f64])],
  ) -> Problem {
    Problem::try_from(&spec(stage, musicians, attendees)).unwrap()
  }

  #[test]
  fn normalises_example() {
    let spec: ProblemSpec = serde_json::from_str(EXAMPLE_JSON).unwrap();
    let problem = Problem::try_from(&spec).unwrap();

    assert_eq!(problem.musicians.len(), 3);
    assert_eq!(problem.attendees.len(), 3);
    assert_eq!(problem.instrument_count(), 2);
    assert_eq!(problem.tastes[0], vec![1000.0, 200.0, 800.0]);
    assert_eq!(problem.tastes[1], vec![-1000.0, 200.0, 1500.0]);
    assert_eq!(problem.inner_bounds(), Bounds {
      min: Position::new(510.0, 10.0),
      max: Position::new(1490.0, 190.0),
    });
  }

  #[test]
  fn converts_back_to_spec() {
    let spec: ProblemSpec = serde_json::from_str(EXAMPLE_JSON).unwrap();
    let problem = Problem::try_from(&spec).unwrap();

    assert_eq!(ProblemSpec::from(&problem), spec);
  }

  #[test]
  fn rejects_ragged_tastes() {
    let spec = spec((0.0, 0.0, 100.0, 100.0), &[0, 1], &[(0.0, 200.0, &[1.0, 2.0]), (10.0, 200.0, &[1.0])]);

    assert_eq!(
      Problem::try_from(&spec).unwrap_err(),
      InputError::RaggedTastes { attendee: 1, expected: 2, found: 1 }
    );
  }

  #[test]
  fn rejects_instrument_without_tastes() {
    let spec = spec((0.0, 0.0, 100.0, 100.0), &[0, 2], &[(0.0, 200.0, &[1.0, 2.0])]);

    assert_eq!(
      Problem::try_from(&spec).unwrap_err(),
      InputError::InstrumentOutOfRange { musician: 1, instrument: 2, instruments: 2 }
    );
  }

  #[test]
  fn rejects_tastes_for_unplayed_instruments() {
    let spec = spec((0.0, 0.0, 100.0, 100.0), &[0], &[(0.0, 200.0, &[1.0, 2.0, 3.0])]);

    assert_eq!(
      Problem::try_from(&spec).unwrap_err(),
      InputError::UnplayedInstruments { expected: 1, found: 3 }
    );
  }

  #[test]
  fn rejects_empty_band() {
    let spec = spec((0.0, 0.0, 100.0, 100.0), &[], &[(0.0, 200.0, &[1.0])]);

    assert_eq!(Problem::try_from(&spec).unwrap_err(), InputError::NoMusicians);
  }

  #[test]
  fn rejects_non_finite_taste() {
    let spec = spec((0.0, 0.0, 100.0, 100.0), &[0], &[(0.0, 200.0, &[f64::NAN])]);

    assert!(matches!(Problem::try_from(&spec), Err(InputError::NonFinite { .. })));
  }

  #[test]
  fn groups_musicians_by_instrument() {
    let problem = problem((0.0, 0.0, 100.0, 100.0), &[1, 0, 1], &[(0.0, 200.0, &[1.0, 2.0])]);
    let grouped = problem.musicians_by_instrument();

    assert_eq!(grouped.get_vec(&Instrument(0)), Some(&vec![MusicianId(1)]));
    assert_eq!(grouped.get_vec(&Instrument(1)), Some(&vec![MusicianId(0), MusicianId(2)]));
  }
}
