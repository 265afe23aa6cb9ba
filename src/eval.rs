use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use num::ToPrimitive;
use thiserror::Error;
use tracing::debug;
use crate::error::ScorerError;
use crate::models::{EvalReport, Position, ProblemSpec, Solution};
use crate::problem::{Problem, MUSICIAN_RADIUS};

const SCORE_FACTOR: f64 = 1_000_000.0;

/// Why a placement scores nothing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
  #[error("player {musician} out of bounds ({},{})", .position.x, .position.y)]
  OutOfBounds { musician: usize, position: Position },
  #[error("players {first} {second} intersect (d2={dist_sq})")]
  Intersect { first: usize, second: usize, dist_sq: f64 },
  #[error("player {musician} has no finite score for attendee {attendee}")]
  Coincident { musician: usize, attendee: usize },
  #[error("placement has {found} positions for {expected} musicians")]
  WrongLength { expected: usize, found: usize },
  #[error("{0}")]
  Reported(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
  Valid { value: i64 },
  Invalid(Violation),
}

impl Evaluation {
  /// Invalid placements are worth 0.
  pub fn value(&self) -> i64 {
    match self {
      Evaluation::Valid { value } => *value,
      Evaluation::Invalid(_) => 0,
    }
  }

  pub fn is_valid(&self) -> bool {
    matches!(self, Evaluation::Valid { .. })
  }

  pub fn msg(&self) -> String {
    match self {
      Evaluation::Valid { .. } => "ok".into(),
      Evaluation::Invalid(violation) => violation.to_string(),
    }
  }
}

impl From<&Evaluation> for EvalReport {
  fn from(eval: &Evaluation) -> Self {
    EvalReport { msg: eval.msg(), value: eval.value() }
  }
}

impl From<EvalReport> for Evaluation {
  fn from(report: EvalReport) -> Self {
    if report.msg.is_empty() || report.msg == "ok" {
      Evaluation::Valid { value: report.value }
    } else {
      Evaluation::Invalid(Violation::Reported(report.msg))
    }
  }
}

/// Decides whether another musician stands between a musician and an attendee.
pub trait Occlusion {
  fn is_blocked(&self, musician: usize, placement: &[Position], attendee: &Position) -> bool;
}

/// Sound travels unobstructed. Blocking is not modelled yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOcclusion;

impl Occlusion for NoOcclusion {
  fn is_blocked(&self, _musician: usize, _placement: &[Position], _attendee: &Position) -> bool {
    false
  }
}

/// Exact scoring of a complete placement.
pub fn evaluate(problem: &Problem, placement: &[Position]) -> Evaluation {
  evaluate_with(problem, placement, &NoOcclusion)
}

pub fn evaluate_with(problem: &Problem, placement: &[Position], occlusion: &impl Occlusion) -> Evaluation {
  if placement.len() != problem.musicians.len() {
    return Evaluation::Invalid(Violation::WrongLength { expected: problem.musicians.len(), found: placement.len() });
  }

  let bounds = problem.inner_bounds();
  if let Some((musician, &position)) = placement.iter().enumerate().find(|(_, p)| !bounds.contains(p)) {
    return Evaluation::Invalid(Violation::OutOfBounds { musician, position });
  }

  let min_sq = MUSICIAN_RADIUS * MUSICIAN_RADIUS;
  for (k, p) in placement.iter().enumerate() {
    for (k2, q) in placement.iter().enumerate().skip(k + 1) {
      let dist_sq = p.dist_sq(q);
      if dist_sq < min_sq {
        return Evaluation::Invalid(Violation::Intersect { first: k, second: k2, dist_sq });
      }
    }
  }

  let mut value: i64 = 0;
  for (k, (p, &inst)) in placement.iter().zip(&problem.musicians).enumerate() {
    for (i, attendee) in problem.attendees.iter().enumerate() {
      if occlusion.is_blocked(k, placement, attendee) {
        continue;
      }
      let d2 = p.dist_sq(attendee);
      let term = if d2 > 0.0 {
        (SCORE_FACTOR * problem.taste(inst, i) / d2).ceil().to_i64()
      } else {
        None
      };
      match term.and_then(|t| value.checked_add(t)) {
        Some(total) => value = total,
        None => return Evaluation::Invalid(Violation::Coincident { musician: k, attendee: i }),
      }
    }
  }

  Evaluation::Valid { value }
}

/// Anything that can give a ground-truth score for a placement.
pub trait Scorer {
  fn score(&self, problem: &Problem, placement: &[Position]) -> Result<Evaluation, ScorerError>;
}

impl<S: Scorer + ?Sized> Scorer for Box<S> {
  fn score(&self, problem: &Problem, placement: &[Position]) -> Result<Evaluation, ScorerError> {
    (**self).score(problem, placement)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Scorer for Evaluator {
  fn score(&self, problem: &Problem, placement: &[Position]) -> Result<Evaluation, ScorerError> {
    Ok(evaluate(problem, placement))
  }
}

/// Runs a standalone scorer as `program problem.json solution.json` and reads
/// a `{msg, value}` report from its stdout.
#[derive(Debug, Clone)]
pub struct ExternalScorer {
  pub program: PathBuf,
}

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

struct ScratchFile(PathBuf);

impl ScratchFile {
  fn write(tag: &str, contents: &[u8]) -> std::io::Result<Self> {
    let n = SCRATCH_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("stage-placement-{}-{n}-{tag}.json", std::process::id()));
    std::fs::write(&path, contents)?;
    Ok(ScratchFile(path))
  }

  fn path(&self) -> &Path {
    &self.0
  }
}

impl Drop for ScratchFile {
  fn drop(&mut self) {
    let _ = std::fs::remove_file(&self.0);
  }
}

impl Scorer for ExternalScorer {
  fn score(&self, problem: &Problem, placement: &[Position]) -> Result<Evaluation, ScorerError> {
    let prob = ScratchFile::write("prob", &serde_json::to_vec(&ProblemSpec::from(problem))?)?;
    let sol = ScratchFile::write("sol", &serde_json::to_vec(&Solution::from_placements(placement.to_vec()))?)?;

    debug!(program = %self.program.display(), "running external scorer");
    let output = Command::new(&self.program)
      .arg(prob.path())
      .arg(sol.path())
      .output()?;

    if !output.status.success() {
      return Err(ScorerError::Failed {
        status: output.status,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
      });
    }

    let report: EvalReport = serde_json::from_slice(&output.stdout)?;
    Ok(report.into())
  }
}
