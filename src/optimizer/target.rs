use indicatif::ProgressBar;
use tracing::debug;
use crate::eval::evaluate;
use crate::geometry::SpatialBins;
use crate::models::{Dimension, Instrument, Position};
use crate::problem::Problem;

/// Squared distances below this are clamped when building surrogate fields.
pub const MIN_FIELD_DIST_SQ: f64 = 1e-6;

/// Returned for queries outside an interpolated field.
pub const OUT_OF_DOMAIN: f64 = f64::NEG_INFINITY;

/// Something annealing can maximise over a full set of coordinates.
pub trait Objective {
  fn value(&self, coords: &[Position]) -> f64;
}

impl<F: Fn(&[Position]) -> f64> Objective for F {
  fn value(&self, coords: &[Position]) -> f64 {
    self(coords)
  }
}

fn smooth_utility(problem: &Problem, instrument: Instrument, at: &Position) -> f64 {
  problem.attendees.iter()
    .zip(&problem.tastes[instrument.0])
    .map(|(attendee, &taste)| taste / at.dist_sq(attendee).max(MIN_FIELD_DIST_SQ))
    .sum()
}

/// `field[instrument][site]`: sum of `taste / d²` over the audience, with no
/// ceiling and no blocking. Only good for ranking sites.
pub fn build_taste_field(problem: &Problem, sites: &[Position], progress: &ProgressBar) -> Vec<Vec<f64>> {
  progress.set_length(problem.instrument_count() as u64);
  progress.set_message("taste fields");

  let field = (0..problem.instrument_count())
    .map(|inst| {
      let row = sites.iter().map(|site| smooth_utility(problem, Instrument(inst), site)).collect();
      progress.inc(1);
      row
    })
    .collect();

  progress.finish_and_clear();
  field
}

/// Bilinear interpolation over values sampled on a regular grid.
#[derive(Debug, Clone)]
pub struct GridInterpolator {
  min: Position,
  max: Position,
  nx: usize,
  ny: usize,
  /// `values[i * ny + j]` is the sample at the i-th x and j-th y.
  values: Vec<f64>,
  /// Grid point with the highest sample; the first one on ties.
  best: Position,
}

impl GridInterpolator {
  pub fn sample(min: Position, max: Position, nx: usize, ny: usize, f: impl Fn(&Position) -> f64) -> Self {
    let nx = nx.max(1);
    let ny = ny.max(1);
    let mut values = Vec::with_capacity(nx * ny);
    let mut best = (min, f64::NEG_INFINITY);
    for i in 0..nx {
      for j in 0..ny {
        let p = Position::new(lerp(min.x, max.x, i, nx), lerp(min.y, max.y, j, ny));
        let v = f(&p);
        if v > best.1 {
          best = (p, v);
        }
        values.push(v);
      }
    }
    GridInterpolator { min, max, nx, ny, values, best: best.0 }
  }

  pub fn best(&self) -> Position {
    self.best
  }

  fn grid_coord(value: f64, lo: Dimension, hi: Dimension, n: usize) -> Option<f64> {
    if !(value >= lo && value <= hi) {
      return None;
    }
    if n == 1 || hi <= lo {
      return Some(0.0);
    }
    Some((n - 1) as f64 * (value - lo) / (hi - lo))
  }

  pub fn at(&self, p: &Position) -> f64 {
    let (Some(gx), Some(gy)) = (
      Self::grid_coord(p.x, self.min.x, self.max.x, self.nx),
      Self::grid_coord(p.y, self.min.y, self.max.y, self.ny),
    ) else {
      return OUT_OF_DOMAIN;
    };

    let i0 = (gx.floor() as usize).min(self.nx - 1);
    let j0 = (gy.floor() as usize).min(self.ny - 1);
    let i1 = (i0 + 1).min(self.nx - 1);
    let j1 = (j0 + 1).min(self.ny - 1);
    let fx = gx - i0 as f64;
    let fy = gy - j0 as f64;

    let v = |i: usize, j: usize| self.values[i * self.ny + j];
    let bottom = v(i0, j0) * (1.0 - fy) + v(i0, j1) * fy;
    let top = v(i1, j0) * (1.0 - fy) + v(i1, j1) * fy;
    bottom * (1.0 - fx) + top * fx
  }
}

fn lerp(lo: f64, hi: f64, i: usize, n: usize) -> f64 {
  if n == 1 {
    lo
  } else {
    lo + (hi - lo) * i as f64 / (n - 1) as f64
  }
}

/// Audience tastes without blocking, interpolated over a coarse grid on the
/// legal stage area. Leaving that area is worth [`OUT_OF_DOMAIN`].
#[derive(Debug, Clone)]
pub struct TastesNoBlocking {
  musicians: Vec<Instrument>,
  grids: Vec<GridInterpolator>,
}

impl TastesNoBlocking {
  pub fn new(problem: &Problem, grid_size: usize) -> Self {
    let bounds = problem.inner_bounds();
    let grids = (0..problem.instrument_count())
      .map(|inst| GridInterpolator::sample(bounds.min, bounds.max, grid_size, grid_size, |p| {
        smooth_utility(problem, Instrument(inst), p)
      }))
      .collect();
    debug!(instruments = problem.instrument_count(), grid_size, "sampled taste grids");

    TastesNoBlocking { musicians: problem.musicians.clone(), grids }
  }

  /// The best sampled grid point of each musician's instrument. Musicians
  /// sharing an instrument get the same point.
  pub fn initial_positions(&self) -> Vec<Position> {
    self.musicians.iter().map(|inst| self.grids[inst.0].best()).collect()
  }
}

impl Objective for TastesNoBlocking {
  fn value(&self, coords: &[Position]) -> f64 {
    coords.iter()
      .zip(&self.musicians)
      .map(|(p, inst)| self.grids[inst.0].at(p))
      .sum()
  }
}

/// Ground-truth score; invalid placements are worth 0.
pub struct ExactObjective<'a> {
  pub problem: &'a Problem,
}

impl Objective for ExactObjective<'_> {
  fn value(&self, coords: &[Position]) -> f64 {
    evaluate(self.problem, coords).value() as f64
  }
}

/// Soft repulsion between musicians closer than [`SpherePacking::CUTOFF`].
///
/// Off by default: the term has not been tuned against real scores, so
/// `value` contributes nothing until `enabled` is set.
#[derive(Debug, Clone)]
pub struct SpherePacking {
  origin: Position,
  width: Dimension,
  height: Dimension,
  pub enabled: bool,
}

impl SpherePacking {
  pub const CUTOFF: Dimension = 15.0;
  const COINCIDENT_COST: f64 = -1_000_000.0;

  pub fn new(problem: &Problem) -> Self {
    SpherePacking {
      origin: problem.stage_origin,
      width: problem.stage_width,
      height: problem.stage_height,
      enabled: false,
    }
  }

  fn pair_cost(a: &Position, b: &Position) -> f64 {
    let d2 = a.dist_sq(b);
    if d2 >= Self::CUTOFF * Self::CUTOFF {
      0.0
    } else if d2 == 0.0 {
      Self::COINCIDENT_COST
    } else {
      -100.0 / d2
    }
  }

  pub fn raw_cost(&self, coords: &[Position]) -> f64 {
    let bins = SpatialBins::new(coords, self.origin, self.width, self.height, Self::CUTOFF);
    let mut cost = 0.0;
    bins.for_each_neighbour_pair(|a, b| cost += Self::pair_cost(&coords[a], &coords[b]));
    cost
  }
}

impl Objective for SpherePacking {
  fn value(&self, coords: &[Position]) -> f64 {
    if self.enabled {
      self.raw_cost(coords)
    } else {
      0.0
    }
  }
}

/// Sum of several objectives.
pub struct MultiObjective<'a>(pub Vec<Box<dyn Objective + Send + Sync + 'a>>);

impl Objective for MultiObjective<'_> {
  fn value(&self, coords: &[Position]) -> f64 {
    self.0.iter().map(|o| o.value(coords)).sum()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::tests::problem;

  const STAGE: (f64, f64, f64, f64) = (0.0, 0.0, 100.0, 100.0);

  #[test]
  fn field_matches_smooth_formula() {
    let problem = problem(STAGE, &[0, 1], &[(50.0, 150.0, &[2.0, -1.0]), (150.0, 50.0, &[1.0, 1.0])]);
    let sites = vec![Position::new(50.0, 50.0), Position::new(90.0, 90.0)];
    let field = build_taste_field(&problem, &sites, &ProgressBar::hidden());

    assert_eq!(field.len(), 2);
    assert!((field[0][0] - (2.0 / 10_000.0 + 1.0 / 10_000.0)).abs() < 1e-12);
    assert!((field[1][0] - (-1.0 / 10_000.0 + 1.0 / 10_000.0)).abs() < 1e-12);
    assert!(field[0][1] > field[0][0]);
  }

  #[test]
  fn coincident_site_is_clamped() {
    let problem = problem(STAGE, &[0], &[(50.0, 50.0, &[1.0])]);
    let field = build_taste_field(&problem, &[Position::new(50.0, 50.0)], &ProgressBar::hidden());

    assert!(field[0][0].is_finite());
  }

  #[test]
  fn interpolation_is_exact_on_linear_functions() {
    let grid = GridInterpolator::sample(Position::new(10.0, 10.0), Position::new(90.0, 50.0), 5, 3, |p| 2.0 * p.x - p.y);

    for p in [Position::new(10.0, 10.0), Position::new(33.3, 41.0), Position::new(90.0, 50.0)] {
      assert!((grid.at(&p) - (2.0 * p.x - p.y)).abs() < 1e-9, "{p:?}");
    }
  }

  #[test]
  fn out_of_domain_is_sentinel() {
    let grid = GridInterpolator::sample(Position::new(10.0, 10.0), Position::new(90.0, 90.0), 4, 4, |_| 1.0);

    assert_eq!(grid.at(&Position::new(9.999, 50.0)), OUT_OF_DOMAIN);
    assert_eq!(grid.at(&Position::new(50.0, 90.001)), OUT_OF_DOMAIN);
    assert_eq!(grid.at(&Position::new(f64::NAN, 50.0)), OUT_OF_DOMAIN);
  }

  #[test]
  fn tastes_target_prefers_the_audience_side() {
    let problem = problem(STAGE, &[0], &[(50.0, 200.0, &[100.0])]);
    let target = TastesNoBlocking::new(&problem, 10);

    let near = target.value(&[Position::new(50.0, 90.0)]);
    let far = target.value(&[Position::new(50.0, 10.0)]);
    assert!(near > far);
    assert_eq!(target.value(&[Position::new(50.0, 95.0)]), OUT_OF_DOMAIN);
  }

  #[test]
  fn grid_remembers_its_best_sample() {
    let grid = GridInterpolator::sample(Position::new(0.0, 0.0), Position::new(30.0, 30.0), 4, 4, |p| -(p.x - 20.0).abs() - p.y);

    assert_eq!(grid.best(), Position::new(20.0, 0.0));
  }

  #[test]
  fn initial_positions_follow_each_instrument() {
    let problem = problem(STAGE, &[0, 1, 0], &[(50.0, 200.0, &[100.0, -100.0])]);
    let target = TastesNoBlocking::new(&problem, 5);
    let starts = target.initial_positions();

    assert_eq!(starts.len(), 3);
    assert_eq!(starts[0], Position::new(50.0, 90.0));
    assert_eq!(starts[2], starts[0]);
    assert!(starts[1].y == 10.0 && (starts[1].x == 10.0 || starts[1].x == 90.0), "{:?}", starts[1]);
  }

  #[test]
  fn sphere_packing_penalises_close_pairs() {
    let problem = problem(STAGE, &[0, 0, 0], &[(50.0, 200.0, &[1.0])]);
    let mut packing = SpherePacking::new(&problem);
    let close = [Position::new(20.0, 20.0), Position::new(30.0, 20.0), Position::new(80.0, 80.0)];
    let spread = [Position::new(20.0, 20.0), Position::new(50.0, 20.0), Position::new(80.0, 80.0)];

    assert!((packing.raw_cost(&close) - (-1.0)).abs() < 1e-12);
    assert_eq!(packing.raw_cost(&spread), 0.0);
    assert_eq!(packing.value(&close), 0.0);

    packing.enabled = true;
    assert!(packing.value(&close) < packing.value(&spread));
  }

  #[test]
  fn multi_objective_sums() {
    let objective = MultiObjective(vec![
      Box::new(|c: &[Position]| c.len() as f64),
      Box::new(|c: &[Position]| c[0].x),
    ]);

    assert_eq!(objective.value(&[Position::new(3.0, 0.0), Position::new(0.0, 0.0)]), 5.0);
  }
}
