use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::error::SolveError;
use crate::models::Position;
use super::target::Objective;

/// Temperature as a function of the iteration number.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Schedule {
  Constant { iterations: usize, temperature: f64 },
  /// Interpolates from `initial` at the first iteration towards `last`.
  Linear { iterations: usize, initial: f64, last: f64 },
}

impl Schedule {
  pub fn iterations(&self) -> usize {
    match *self {
      Schedule::Constant { iterations, .. } | Schedule::Linear { iterations, .. } => iterations,
    }
  }

  pub fn temperature(&self, i: usize) -> f64 {
    match *self {
      Schedule::Constant { temperature, .. } => temperature,
      Schedule::Linear { iterations, initial, last } => {
        let frac = if iterations == 0 { 0.0 } else { i as f64 / iterations as f64 };
        last * frac + initial * (1.0 - frac)
      }
    }
  }
}

impl Default for Schedule {
  fn default() -> Self {
    Schedule::Linear { iterations: 1000, initial: 1.0, last: 1e-2 }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AnnealParams {
  /// Standard deviation of the per-axis gaussian nudge.
  pub step: f64,
  /// Objective deltas are divided by `temperature * scale`.
  pub scale: f64,
  pub budget: Option<Duration>,
}

impl Default for AnnealParams {
  fn default() -> Self {
    AnnealParams { step: 0.1, scale: 0.01, budget: None }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annealed {
  pub solution: Vec<Position>,
  pub value: f64,
  pub iterations: usize,
  pub accepted: usize,
  /// Accepted moves that lowered the objective.
  pub accepted_worse: usize,
}

/// The last change applied to the coordinates, kept so it can be undone.
struct Move {
  index: usize,
  previous: Position,
}

impl Move {
  fn apply(coords: &mut [Position], index: usize, to: Position) -> Move {
    let previous = std::mem::replace(&mut coords[index], to);
    Move { index, previous }
  }

  fn undo(self, coords: &mut [Position]) {
    coords[self.index] = self.previous;
  }
}

fn accepts(delta: f64, temperature: f64, scale: f64, rng: &mut impl Rng) -> bool {
  if delta >= 0.0 {
    return true;
  }
  if !(temperature > 0.0) {
    return false;
  }
  rng.gen::<f64>() < (delta / (temperature * scale)).exp()
}

/// Metropolis search over continuous coordinates, one point nudged per step.
pub fn anneal<O, R>(
  initial: Vec<Position>,
  objective: &O,
  schedule: &Schedule,
  params: &AnnealParams,
  rng: &mut R,
  progress: &ProgressBar,
) -> Result<Annealed, SolveError>
where
  O: Objective + ?Sized,
  R: Rng,
{
  if !(params.step >= 0.0 && params.step.is_finite()) {
    return Err(SolveError::InvalidStep(params.step));
  }
  let noise = Normal::new(0.0, params.step).map_err(|_| SolveError::InvalidStep(params.step))?;

  let mut solution = initial;
  let mut value = objective.value(&solution);
  let mut result = Annealed { solution: Vec::new(), value, iterations: 0, accepted: 0, accepted_worse: 0 };

  if solution.is_empty() {
    result.solution = solution;
    return Ok(result);
  }

  progress.set_length(schedule.iterations() as u64);
  if let Ok(style) = ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len} [{elapsed_precise}]") {
    progress.set_style(style);
  }
  progress.set_message("annealing");
  info!(iterations = schedule.iterations(), initial = value, "annealing");

  let started = Instant::now();
  for i in 0..schedule.iterations() {
    if params.budget.is_some_and(|budget| started.elapsed() >= budget) {
      debug!(iteration = i, "annealing budget exhausted");
      break;
    }
    result.iterations += 1;
    progress.inc(1);

    let t = schedule.temperature(i);
    let index = rng.gen_range(0..solution.len());
    let current = solution[index];
    let nudged = Position::new(current.x + noise.sample(rng), current.y + noise.sample(rng));

    let last = Move::apply(&mut solution, index, nudged);
    let proposed = objective.value(&solution);
    let delta = proposed - value;

    if accepts(delta, t, params.scale, rng) {
      if delta < 0.0 {
        result.accepted_worse += 1;
      }
      result.accepted += 1;
      value = proposed;
    } else {
      last.undo(&mut solution);
    }
  }
  progress.finish_and_clear();

  info!(
    value,
    accepted = result.accepted,
    accepted_worse = result.accepted_worse,
    iterations = result.iterations,
    "annealing done"
  );
  result.solution = solution;
  result.value = value;
  Ok(result)
}

#[cfg(test)]
mod tests {
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use super::*;

  // Peaks at (50, 50).
  fn hill(coords: &[Position]) -> f64 {
    -coords.iter().map(|p| p.dist_sq(&Position::new(50.0, 50.0))).sum::<f64>()
  }

  fn start() -> Vec<Position> {
    vec![Position::new(40.0, 40.0), Position::new(60.0, 55.0)]
  }

  #[test]
  fn linear_schedule_interpolates() {
    let schedule = Schedule::Linear { iterations: 10, initial: 1.0, last: 0.0 };

    assert_eq!(schedule.temperature(0), 1.0);
    assert!((schedule.temperature(5) - 0.5).abs() < 1e-12);
    assert_eq!(Schedule::Constant { iterations: 3, temperature: 0.2 }.temperature(2), 0.2);
  }

  #[test]
  fn zero_temperature_only_climbs() {
    let mut rng = StdRng::seed_from_u64(7);
    let schedule = Schedule::Constant { iterations: 2000, temperature: 0.0 };
    let params = AnnealParams { step: 1.0, ..AnnealParams::default() };

    let result = anneal(start(), &hill, &schedule, &params, &mut rng, &ProgressBar::hidden()).unwrap();
    assert_eq!(result.accepted_worse, 0);
    assert!(result.value > hill(&start()));
    assert_eq!(result.value, hill(&result.solution));
  }

  #[test]
  fn infinite_temperature_accepts_everything() {
    let mut rng = StdRng::seed_from_u64(11);
    let schedule = Schedule::Constant { iterations: 500, temperature: f64::INFINITY };

    let result = anneal(start(), &hill, &schedule, &AnnealParams::default(), &mut rng, &ProgressBar::hidden()).unwrap();
    assert_eq!(result.accepted, 500);
    assert!(result.accepted_worse > 0);
  }

  #[test]
  fn rejected_moves_are_undone() {
    let mut rng = StdRng::seed_from_u64(3);
    let schedule = Schedule::Constant { iterations: 200, temperature: 0.0 };
    let at_peak = vec![Position::new(50.0, 50.0)];

    let result = anneal(at_peak.clone(), &hill, &schedule, &AnnealParams::default(), &mut rng, &ProgressBar::hidden()).unwrap();
    assert_eq!(result.accepted, 0);
    assert_eq!(result.solution, at_peak);
  }

  #[test]
  fn budget_stops_early() {
    let mut rng = StdRng::seed_from_u64(5);
    let schedule = Schedule::Constant { iterations: 1_000_000, temperature: 1.0 };
    let params = AnnealParams { budget: Some(Duration::ZERO), ..AnnealParams::default() };

    let result = anneal(start(), &hill, &schedule, &params, &mut rng, &ProgressBar::hidden()).unwrap();
    assert_eq!(result.iterations, 0);
    assert_eq!(result.solution, start());
  }

  #[test]
  fn negative_or_non_finite_step_is_rejected() {
    let mut rng = StdRng::seed_from_u64(5);
    for step in [-1.0, f64::NAN, f64::INFINITY] {
      let params = AnnealParams { step, ..AnnealParams::default() };

      assert!(matches!(
        anneal(start(), &hill, &Schedule::default(), &params, &mut rng, &ProgressBar::hidden()),
        Err(SolveError::InvalidStep(_))
      ), "step {step}");
    }
  }
}
