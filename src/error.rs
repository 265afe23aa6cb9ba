use thiserror::Error;

/// Rejections raised while normalising a problem, before any solving starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
  #[error("problem has no musicians")]
  NoMusicians,
  #[error("stage must have positive width and height, got {width}x{height}")]
  NonPositiveStage { width: f64, height: f64 },
  #[error("{what} is not a finite number")]
  NonFinite { what: String },
  #[error("attendee {attendee} has {found} tastes, expected {expected}")]
  RaggedTastes { attendee: usize, expected: usize, found: usize },
  #[error("musician {musician} plays instrument {instrument} but only {instruments} instruments have tastes")]
  InstrumentOutOfRange { musician: usize, instrument: usize, instruments: usize },
  #[error("tastes cover {found} instruments but the band plays {expected}")]
  UnplayedInstruments { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum SolveError {
  #[error("only {sites} candidate sites for {musicians} musicians")]
  InsufficientSites { sites: usize, musicians: usize },
  #[error("annealing step must be a non-negative number, got {0}")]
  InvalidStep(f64),
  #[error("a solver worker panicked")]
  WorkerPanicked,
}

#[derive(Debug, Error)]
pub enum ScorerError {
  #[error("failed to run scorer: {0}")]
  Io(#[from] std::io::Error),
  #[error("scorer produced invalid json: {0}")]
  Json(#[from] serde_json::Error),
  #[error("scorer exited with {status}: {stderr}")]
  Failed { status: std::process::ExitStatus, stderr: String },
}

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("no api token: set ICFP_API_TOKEN or write api_key.txt")]
  MissingToken,
  #[error(transparent)]
  Http(#[from] reqwest::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("got {status} at {context}\n{body}")]
  Status { status: reqwest::StatusCode, context: String, body: String },
  #[error("unexpected response at {context}: {body}")]
  Unexpected { context: String, body: String },
}
