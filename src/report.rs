use std::f64::consts::PI;
use std::fmt;
use std::path::Path;
use anyhow::Context;
use tracing::{info, warn};
use crate::api::numbered_json;
use crate::eval::Scorer;
use crate::models::{ProblemSpec, Solution};
use crate::problem::{Problem, MUSICIAN_RADIUS};

pub fn read_problem(path: &Path) -> anyhow::Result<Problem> {
  let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
  let spec: ProblemSpec = serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))?;
  Problem::try_from(&spec).with_context(|| format!("validating {}", path.display()))
}

pub fn read_solution(path: &Path) -> anyhow::Result<Solution> {
  let json = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_solution(path: &Path, solution: &Solution) -> anyhow::Result<()> {
  std::fs::write(path, serde_json::to_vec(solution)?).with_context(|| format!("writing {}", path.display()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProblemInfo {
  pub musicians: usize,
  pub attendees: usize,
  pub instruments: usize,
  pub stage_area: f64,
  /// Musician disc area over the best area a hexagonal packing can cover.
  pub packing_fraction: f64,
}

impl From<&Problem> for ProblemInfo {
  fn from(problem: &Problem) -> Self {
    let n = problem.musicians.len();
    let stage_area = problem.stage_width * problem.stage_height;
    let musician_area = n as f64 * PI * MUSICIAN_RADIUS * MUSICIAN_RADIUS;
    let packable_area = stage_area * PI / (2.0 * 3f64.sqrt());
    ProblemInfo {
      musicians: n,
      attendees: problem.attendees.len(),
      instruments: problem.instrument_count(),
      stage_area,
      packing_fraction: musician_area / packable_area,
    }
  }
}

impl fmt::Display for ProblemInfo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Musicians: {}", self.musicians)?;
    writeln!(f, "Attendees: {}", self.attendees)?;
    writeln!(f, "Instruments: {}", self.instruments)?;
    writeln!(f, "Stage area: {}", self.stage_area)?;
    write!(f, "Packing fraction: {:.4}", self.packing_fraction)
  }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
  pub scores: Vec<(u32, i64)>,
}

impl Summary {
  pub fn total(&self) -> i64 {
    self.scores.iter().map(|(_, value)| value).sum()
  }

  /// Values from best to worst, each paired with the running total.
  pub fn cumulative(&self) -> Vec<(i64, i64)> {
    let mut values: Vec<i64> = self.scores.iter().map(|&(_, v)| v).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));
    values.into_iter()
      .scan(0i64, |total, v| {
        *total += v;
        Some((v, *total))
      })
      .collect()
  }
}

impl fmt::Display for Summary {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (id, value) in &self.scores {
      writeln!(f, "{id} => {value}")?;
    }
    writeln!(f, "total => {}", self.total())?;
    for (rank, (value, total)) in self.cumulative().into_iter().enumerate() {
      writeln!(f, "#{:<3} {value:>14} {total:>16}", rank + 1)?;
    }
    Ok(())
  }
}

/// Scores every `solutions/<id>.json` that has a matching problem.
pub fn summarize(problems: &Path, solutions: &Path, max_id: u32, scorer: &impl Scorer) -> anyhow::Result<Summary> {
  let mut summary = Summary::default();
  for id in 1..=max_id {
    let solution_path = numbered_json(solutions, id);
    if !solution_path.exists() {
      continue;
    }
    let problem = read_problem(&numbered_json(problems, id))?;
    let solution = read_solution(&solution_path)?;
    let eval = scorer.score(&problem, &solution.placements)
      .with_context(|| format!("scoring problem {id}"))?;
    info!(id, value = eval.value(), msg = %eval.msg(), "scored");
    summary.scores.push((id, eval.value()));
  }
  Ok(summary)
}

/// Copies every solution in `from` to `to`, adding loudest volumes where
/// they're missing. Files that can't be read are skipped.
pub fn backfill_volumes(from: &Path, to: &Path) -> anyhow::Result<usize> {
  std::fs::create_dir_all(to).with_context(|| format!("creating {}", to.display()))?;

  let mut rewritten = 0;
  for entry in std::fs::read_dir(from).with_context(|| format!("listing {}", from.display()))? {
    let path = entry?.path();
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
      continue;
    }
    let mut solution = match read_solution(&path) {
      Ok(solution) => solution,
      Err(e) => {
        warn!(path = %path.display(), "skipping: {e:#}");
        continue;
      }
    };
    solution.backfill_volumes();
    if let Some(name) = path.file_name() {
      write_solution(&to.join(name), &solution)?;
      rewritten += 1;
    }
  }
  Ok(rewritten)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::eval::Evaluator;
  use crate::models::{Position, LOUDEST_VOLUME};
  use crate::problem::tests::EXAMPLE_JSON;

  fn scratch_dir(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("stage-placement-report-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn info_for_example() {
    let spec = serde_json::from_str(EXAMPLE_JSON).unwrap();
    let info = ProblemInfo::from(&Problem::try_from(&spec).unwrap());

    assert_eq!(info.musicians, 3);
    assert_eq!(info.attendees, 3);
    assert_eq!(info.stage_area, 200_000.0);
    let expected = 3.0 * 100.0 * 2.0 * 3f64.sqrt() / 200_000.0;
    assert!((info.packing_fraction - expected).abs() < 1e-12);
    assert!(info.to_string().contains("Musicians: 3"));
  }

  #[test]
  fn cumulative_is_sorted_best_first() {
    let summary = Summary { scores: vec![(1, 5), (2, 20), (3, -1)] };

    assert_eq!(summary.total(), 24);
    assert_eq!(summary.cumulative(), vec![(20, 20), (5, 25), (-1, 24)]);
  }

  #[test]
  fn summarizes_existing_solutions() {
    let problems = scratch_dir("problems");
    let solutions = scratch_dir("solutions");
    std::fs::write(problems.join("1.json"), EXAMPLE_JSON).unwrap();
    std::fs::write(problems.join("2.json"), EXAMPLE_JSON).unwrap();
    let placements = vec![Position::new(590.0, 10.0), Position::new(1100.0, 100.0), Position::new(1100.0, 150.0)];
    write_solution(&solutions.join("2.json"), &Solution::from_placements(placements.clone())).unwrap();

    let summary = summarize(&problems, &solutions, 3, &Evaluator).unwrap();
    let problem = read_problem(&problems.join("2.json")).unwrap();
    assert_eq!(summary.scores, vec![(2, crate::eval::evaluate(&problem, &placements).value())]);
  }

  #[test]
  fn backfills_missing_volumes() {
    let from = scratch_dir("novol");
    let to = scratch_dir("vol");
    std::fs::write(from.join("1.json"), r#"{"placements": [{"x": 1.0, "y": 2.0}]}"#).unwrap();
    std::fs::write(from.join("2.json"), "not json").unwrap();

    assert_eq!(backfill_volumes(&from, &to).unwrap(), 1);
    let solution = read_solution(&to.join("1.json")).unwrap();
    assert_eq!(solution.volumes, Some(vec![LOUDEST_VOLUME]));
    assert!(!to.join("2.json").exists());
  }
}
