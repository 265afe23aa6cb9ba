use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;
use crate::error::SolveError;
use crate::models::{Instrument, Position};
use crate::problem::Problem;
use super::MusicianId;

#[derive(Debug, Clone, Copy)]
struct Candidate {
  value: f64,
  instrument: Instrument,
  site: usize,
}

// Higher value first; ties go to the lower instrument, then the lower site.
impl Ord for Candidate {
  fn cmp(&self, other: &Self) -> Ordering {
    self.value.total_cmp(&other.value)
      .then_with(|| other.instrument.cmp(&self.instrument))
      .then_with(|| other.site.cmp(&self.site))
  }
}

impl PartialOrd for Candidate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Candidate {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Candidate {}

/// Greedily binds musicians to sites, best (instrument, site) pair first.
///
/// Returns the site index chosen for each musician. Within an instrument the
/// highest-numbered unplaced musician is bound first.
pub fn assign_sites(problem: &Problem, sites: &[Position], field: &[Vec<f64>]) -> Result<Vec<usize>, SolveError> {
  let musicians = problem.musicians.len();
  if sites.len() < musicians {
    return Err(SolveError::InsufficientSites { sites: sites.len(), musicians });
  }

  let mut remaining = problem.musicians_by_instrument();

  let mut queue: BinaryHeap<Candidate> = remaining.keys()
    .flat_map(|&instrument| {
      field[instrument.0].iter()
        .enumerate()
        .map(move |(site, &value)| Candidate { value, instrument, site })
    })
    .collect();
  debug!(candidates = queue.len(), "built assignment queue");

  let mut used = vec![false; sites.len()];
  let mut site_of: Vec<Option<usize>> = vec![None; musicians];
  let mut placed = 0;

  while placed < musicians {
    let Some(Candidate { instrument, site, .. }) = queue.pop() else {
      break;
    };
    if used[site] {
      continue;
    }
    if let Some(MusicianId(musician)) = remaining.get_vec_mut(&instrument).and_then(Vec::pop) {
      site_of[musician] = Some(site);
      used[site] = true;
      placed += 1;
    }
  }

  site_of.into_iter()
    .collect::<Option<Vec<usize>>>()
    .ok_or(SolveError::InsufficientSites { sites: sites.len(), musicians })
}

/// Greedy placement: one distinct site per musician.
pub fn assign(problem: &Problem, sites: &[Position], field: &[Vec<f64>]) -> Result<Vec<Position>, SolveError> {
  Ok(assign_sites(problem, sites, field)?.into_iter().map(|site| sites[site]).collect())
}
