use serde::{Deserialize, Serialize};
use crate::models::{Dimension, Position};
use crate::problem::{Problem, MUSICIAN_RADIUS, STAGE_MARGIN};

/// Nearest-neighbour spacing of the lattice: one musician diameter.
pub const LATTICE_SPACING: Dimension = MUSICIAN_RADIUS;

// Rows (or columns) are pushed apart by a hair so rounding never brings
// neighbours under the legal separation.
const LATTICE_SLACK: f64 = 1.000_000_01;

/// Which way the triangles of the lattice point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
  /// Horizontal rows; every other row is shifted by half a spacing.
  Rows,
  /// Vertical columns; every other column is shifted by half a spacing.
  Columns,
}

impl Orientation {
  pub const ALL: [Orientation; 2] = [Orientation::Rows, Orientation::Columns];
}

/// Centres of a hexagonal circle packing covering `[0, width] x [0, height]`.
///
/// Ordering is column-major over lattice indices and fully determined by the
/// inputs. A degenerate rectangle yields no sites.
pub fn hexagonal_sites(width: Dimension, height: Dimension, orientation: Orientation) -> Vec<Position> {
  if !(width > 0.0 && height > 0.0) {
    return Vec::new();
  }

  let row_pitch = LATTICE_SPACING * 3f64.sqrt() / 2.0;
  let (nx, ny) = match orientation {
    Orientation::Rows => ((width / LATTICE_SPACING) as usize + 1, (height / row_pitch) as usize + 1),
    Orientation::Columns => ((width / row_pitch) as usize + 1, (height / LATTICE_SPACING) as usize + 1),
  };

  let mut sites = Vec::with_capacity(nx * ny);
  for i in 0..nx {
    for j in 0..ny {
      let (x, y) = match orientation {
        Orientation::Rows => {
          let shift = if j % 2 == 1 { LATTICE_SPACING / 2.0 } else { 0.0 };
          (i as f64 * LATTICE_SPACING * LATTICE_SLACK + shift, j as f64 * row_pitch * LATTICE_SLACK)
        }
        Orientation::Columns => {
          let shift = if i % 2 == 1 { LATTICE_SPACING / 2.0 } else { 0.0 };
          (i as f64 * row_pitch * LATTICE_SLACK, j as f64 * LATTICE_SPACING * LATTICE_SLACK + shift)
        }
      };
      if x <= width && y <= height {
        sites.push(Position::new(x, y));
      }
    }
  }
  sites
}

/// Moves lattice sites generated over the inner stage into room coordinates.
///
/// Sites that rounding pushes past the inner stage bounds are dropped, so
/// every returned site is a legal musician position.
pub fn translate_sites(sites: &[Position], problem: &Problem) -> Vec<Position> {
  let bounds = problem.inner_bounds();
  let dx = problem.stage_origin.x + STAGE_MARGIN;
  let dy = problem.stage_origin.y + STAGE_MARGIN;
  sites.iter()
    .map(|p| Position::new(p.x + dx, p.y + dy))
    .filter(|p| bounds.contains(p))
    .collect()
}

/// Uniform buckets of point indices over a rectangle.
///
/// Points outside the rectangle are clamped into the border buckets, so every
/// point lands somewhere.
#[derive(Debug, Clone)]
pub struct SpatialBins {
  origin: Position,
  bin_size: Dimension,
  nx: usize,
  ny: usize,
  bins: Vec<Vec<usize>>,
}

impl SpatialBins {
  pub fn new(points: &[Position], origin: Position, width: Dimension, height: Dimension, bin_size: Dimension) -> Self {
    const EPS: f64 = 1e-4;
    let nx = (((width + EPS) / bin_size) as usize).max(1);
    let ny = (((height + EPS) / bin_size) as usize).max(1);

    let mut grid = SpatialBins { origin, bin_size, nx, ny, bins: vec![Vec::new(); nx * ny] };
    for (idx, p) in points.iter().enumerate() {
      let bin = grid.bin_of(p);
      grid.bins[bin].push(idx);
    }
    grid
  }

  fn axis_bin(&self, value: f64, origin: f64, n: usize) -> usize {
    let raw = ((value - origin) / self.bin_size).floor();
    if raw.is_nan() || raw < 0.0 {
      0
    } else {
      (raw as usize).min(n - 1)
    }
  }

  fn bin_of(&self, p: &Position) -> usize {
    let i = self.axis_bin(p.x, self.origin.x, self.nx);
    let j = self.axis_bin(p.y, self.origin.y, self.ny);
    i * self.ny + j
  }

  pub fn bin(&self, i: usize, j: usize) -> &[usize] {
    &self.bins[i * self.ny + j]
  }

  /// Visits every unordered pair of indices sharing a bin or sitting in
  /// neighbouring bins, exactly once.
  pub fn for_each_neighbour_pair(&self, mut visit: impl FnMut(usize, usize)) {
    const FORWARD: [(isize, isize); 4] = [(1, 0), (0, 1), (1, 1), (1, -1)];

    for i in 0..self.nx {
      for j in 0..self.ny {
        let here = self.bin(i, j);
        for (a, &p) in here.iter().enumerate() {
          for &q in &here[a + 1..] {
            visit(p, q);
          }
        }

        for (di, dj) in FORWARD {
          let ni = i as isize + di;
          let nj = j as isize + dj;
          if ni < 0 || nj < 0 || ni >= self.nx as isize || nj >= self.ny as isize {
            continue;
          }
          let there = self.bin(ni as usize, nj as usize);
          for &p in here {
            for &q in there {
              visit(p, q);
            }
          }
        }
      }
    }
  }
}
