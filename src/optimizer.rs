use std::time::Duration;
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::error::SolveError;
use crate::eval::{evaluate, Evaluation};
use crate::geometry::{hexagonal_sites, translate_sites, Orientation};
use crate::models::Position;
use crate::problem::Problem;

pub mod anneal;
pub mod assign;
pub mod target;

use anneal::{anneal, AnnealParams, Schedule};
use target::{build_taste_field, ExactObjective, MultiObjective, Objective, SpherePacking, TastesNoBlocking};

#[derive(Clone, Copy, Hash, Ord, PartialOrd, Eq, PartialEq, Debug)]
pub struct MusicianId(pub usize);

/// What annealing maximises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveKind {
  /// Exact score; slow but never drifts into invalid placements unnoticed.
  Exact,
  /// Interpolated taste grid plus sphere packing; fast, checked exactly afterwards.
  #[default]
  Surrogate,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SolverConfig {
  pub orientations: Vec<Orientation>,
  /// Annealing is skipped when this is zero.
  pub anneal_iterations: usize,
  pub t_initial: f64,
  pub t_final: f64,
  pub step: f64,
  pub scale: f64,
  pub grid_size: usize,
  pub objective: ObjectiveKind,
  /// Adds the repulsion term to the surrogate objective.
  pub sphere_packing: bool,
  pub seed: u64,
  pub budget: Option<Duration>,
}

impl Default for SolverConfig {
  fn default() -> Self {
    let params = AnnealParams::default();
    SolverConfig {
      orientations: Orientation::ALL.to_vec(),
      anneal_iterations: 0,
      t_initial: 1.0,
      t_final: 1e-2,
      step: params.step,
      scale: params.scale,
      grid_size: 10,
      objective: ObjectiveKind::default(),
      sphere_packing: false,
      seed: 0,
      budget: None,
    }
  }
}

impl SolverConfig {
  pub fn schedule(&self) -> Schedule {
    if self.t_initial == self.t_final {
      Schedule::Constant { iterations: self.anneal_iterations, temperature: self.t_initial }
    } else {
      Schedule::Linear { iterations: self.anneal_iterations, initial: self.t_initial, last: self.t_final }
    }
  }

  pub fn anneal_params(&self) -> AnnealParams {
    AnnealParams { step: self.step, scale: self.scale, budget: self.budget }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
  pub msg: String,
  pub value: i64,
  pub valid: bool,
  pub placement: Option<Vec<Position>>,
  pub orientation: Option<Orientation>,
}

impl Outcome {
  fn no_packing() -> Self {
    Outcome { msg: "no valid packing".into(), value: 0, valid: false, placement: None, orientation: None }
  }

  /// Valid placements outrank invalid ones regardless of value; anything
  /// with a placement outranks the sentinel.
  fn beats(&self, other: &Outcome) -> bool {
    match (self.placement.is_some(), other.placement.is_some()) {
      (false, _) => false,
      (true, false) => true,
      (true, true) => (self.valid, self.value) > (other.valid, other.value),
    }
  }
}

/// Greedy placement on one lattice orientation, optionally refined.
/// `None` when the lattice has fewer sites than musicians.
pub fn solve_orientation(
  problem: &Problem,
  orientation: Orientation,
  config: &SolverConfig,
  rng: &mut StdRng,
) -> Result<Option<Outcome>, SolveError> {
  let (width, height) = problem.inner_size();
  let sites = translate_sites(&hexagonal_sites(width, height, orientation), problem);
  info!(?orientation, sites = sites.len(), musicians = problem.musicians.len(), "generated lattice");
  if sites.len() < problem.musicians.len() {
    warn!(?orientation, "not enough sites for every musician");
    return Ok(None);
  }

  let field = build_taste_field(problem, &sites, &ProgressBar::new(0));
  let placement = assign::assign(problem, &sites, &field)?;

  let mut eval = evaluate(problem, &placement);
  info!(?orientation, value = eval.value(), msg = %eval.msg(), "greedy placement");

  let mut placement = placement;
  if config.anneal_iterations > 0 {
    let (refined, refined_eval) = refine(problem, placement, eval, config, rng)?;
    placement = refined;
    eval = refined_eval;
  }

  Ok(Some(Outcome {
    msg: eval.msg(),
    value: eval.value(),
    valid: eval.is_valid(),
    placement: Some(placement),
    orientation: Some(orientation),
  }))
}

/// Anneals a valid placement and keeps the result only if it scores better.
pub fn refine(
  problem: &Problem,
  placement: Vec<Position>,
  eval: Evaluation,
  config: &SolverConfig,
  rng: &mut StdRng,
) -> Result<(Vec<Position>, Evaluation), SolveError> {
  let objective: Box<dyn Objective + '_> = match config.objective {
    ObjectiveKind::Exact => Box::new(ExactObjective { problem }),
    ObjectiveKind::Surrogate => {
      let tastes = TastesNoBlocking::new(problem, config.grid_size);
      debug!(peaks = ?tastes.initial_positions(), "surrogate peaks per musician");
      let mut packing = SpherePacking::new(problem);
      packing.enabled = config.sphere_packing;
      Box::new(MultiObjective(vec![Box::new(tastes), Box::new(packing)]))
    }
  };

  let annealed = anneal(
    placement.clone(),
    objective.as_ref(),
    &config.schedule(),
    &config.anneal_params(),
    rng,
    &ProgressBar::new(0),
  )?;

  let refined_eval = evaluate(problem, &annealed.solution);
  debug!(surrogate = annealed.value, before = eval.value(), after = refined_eval.value(), "checked annealed placement");
  if refined_eval.is_valid() && refined_eval.value() > eval.value() {
    Ok((annealed.solution, refined_eval))
  } else {
    Ok((placement, eval))
  }
}

/// Tries every configured orientation concurrently and keeps the best outcome.
///
/// When no orientation can fit every musician the result is the
/// "no valid packing" outcome with value 0.
pub fn strategy(problem: &Problem, config: &SolverConfig) -> Result<Outcome, SolveError> {
  let results = crossbeam::scope(|scope| {
    let handles: Vec<_> = config.orientations.iter()
      .enumerate()
      .map(|(idx, &orientation)| {
        scope.spawn(move |_| {
          let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(idx as u64));
          solve_orientation(problem, orientation, config, &mut rng)
        })
      })
      .collect();

    handles.into_iter().map(|handle| handle.join()).collect::<Vec<_>>()
  }).map_err(|_| SolveError::WorkerPanicked)?;

  let mut best = Outcome::no_packing();
  for result in results {
    let outcome = result.map_err(|_| SolveError::WorkerPanicked)??;
    if let Some(outcome) = outcome {
      if outcome.beats(&best) {
        best = outcome;
      }
    }
  }

  info!(value = best.value, orientation = ?best.orientation, msg = %best.msg, "best outcome");
  Ok(best)
}
