use std::path::{Path, PathBuf};
use std::time::Duration;
use indicatif::ProgressBar;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::error::ApiError;

pub const DEFAULT_HOST: &str = "https://api.icfpcontest.com";

const SCORE_POLLS: usize = 10;
const SCORE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where and as whom to talk to the contest server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
  pub host: String,
  pub token: String,
}

impl ApiConfig {
  /// Reads `ICFP_API_HOST` and `ICFP_API_TOKEN` (a `.env` file is honoured),
  /// falling back to the token stored in `api_key.txt`.
  pub fn from_env() -> Result<Self, ApiError> {
    let _ = dotenvy::dotenv();
    let host = std::env::var("ICFP_API_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let token = match std::env::var("ICFP_API_TOKEN") {
      Ok(token) => token,
      Err(_) => std::fs::read_to_string("api_key.txt").map_err(|_| ApiError::MissingToken)?,
    };
    let token = token.trim();
    if token.is_empty() {
      return Err(ApiError::MissingToken);
    }
    Ok(ApiConfig { host: host.trim_end_matches('/').to_string(), token: token.to_string() })
  }
}

#[derive(Debug, Deserialize)]
enum Reply<T> {
  Success(T),
  Failure(String),
}

#[derive(Debug, Deserialize)]
struct ProblemCount {
  number_of_problems: u32,
}

#[derive(Debug, Deserialize)]
struct SubmissionReply {
  submission: SubmissionState,
}

#[derive(Debug, Deserialize)]
struct SubmissionState {
  score: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct NewSubmission<'a> {
  problem_id: u32,
  contents: &'a str,
}

#[derive(Debug, Serialize)]
struct NewUsername<'a> {
  username: &'a str,
}

pub struct ApiClient {
  config: ApiConfig,
  client: Client,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(ApiClient { config, client })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.host, path)
  }

  fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T, ApiError> {
    debug!(context, "api request");
    let response = expect_ok(request.bearer_auth(&self.config.token).send()?, context)?;
    let body = response.text()?;
    serde_json::from_str(&body).map_err(|_| ApiError::Unexpected { context: context.to_string(), body })
  }

  pub fn problem_count(&self) -> Result<u32, ApiError> {
    let count: ProblemCount = self.send(self.client.get(self.url("/problems")), "/problems")?;
    Ok(count.number_of_problems)
  }

  pub fn problem(&self, id: u32) -> Result<String, ApiError> {
    let context = format!("/problem?problem_id={id}");
    let reply: Reply<String> = self.send(self.client.get(self.url(&context)), &context)?;
    success(reply, &context)
  }

  /// Downloads every problem into `dir/<id>.json`. Existing files are kept
  /// unless `force` is set. Returns the number of files written.
  pub fn sync_problems(&self, dir: &Path, force: bool) -> Result<usize, ApiError> {
    let count = self.problem_count()?;
    info!(count, "problems available");
    std::fs::create_dir_all(dir)?;

    let progress = ProgressBar::new(count as u64);
    let mut written = 0;
    for id in 1..=count {
      progress.inc(1);
      let path = numbered_json(dir, id);
      if path.exists() && !force {
        debug!(path = %path.display(), "skipping");
        continue;
      }
      let json = self.problem(id)?;
      std::fs::write(&path, json)?;
      info!(path = %path.display(), "wrote problem");
      written += 1;
    }
    progress.finish_and_clear();
    Ok(written)
  }

  /// `None` while the submission is still being scored.
  pub fn score(&self, submission_id: &str) -> Result<Option<serde_json::Value>, ApiError> {
    let context = format!("/submission?submission_id={submission_id}");
    let reply: Reply<SubmissionReply> = match self.send(self.client.get(self.url(&context)), &context) {
      Ok(reply) => reply,
      Err(ApiError::Unexpected { .. }) => return Ok(None),
      Err(e) => return Err(e),
    };
    Ok(match reply {
      Reply::Success(SubmissionReply { submission }) if !is_pending(&submission.score) => Some(submission.score),
      _ => None,
    })
  }

  /// Submits a solution and polls for its score for a few seconds.
  pub fn submit(&self, problem_id: u32, contents: &str) -> Result<Option<serde_json::Value>, ApiError> {
    let submission_id: String = self.send(
      self.client.post(self.url("/submission")).json(&NewSubmission { problem_id, contents }),
      "/submission",
    )?;
    info!(problem_id, %submission_id, "submitted");

    for _ in 0..SCORE_POLLS {
      std::thread::sleep(SCORE_POLL_INTERVAL);
      if let Some(score) = self.score(&submission_id)? {
        return Ok(Some(score));
      }
      debug!(%submission_id, "still scoring");
    }
    Ok(None)
  }

  pub fn update_username(&self, username: &str) -> Result<(), ApiError> {
    let context = "/username/update_username";
    let reply: Reply<serde_json::Value> = self.send(
      self.client.post(self.url(context)).json(&NewUsername { username }),
      context,
    )?;
    success(reply, context).map(|_| ())
  }
}

pub fn numbered_json(dir: &Path, id: u32) -> PathBuf {
  dir.join(format!("{id}.json"))
}

fn expect_ok(response: Response, context: &str) -> Result<Response, ApiError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  Err(ApiError::Status { status, context: context.to_string(), body: response.text().unwrap_or_default() })
}

fn success<T>(reply: Reply<T>, context: &str) -> Result<T, ApiError> {
  match reply {
    Reply::Success(value) => Ok(value),
    Reply::Failure(body) => Err(ApiError::Unexpected { context: context.to_string(), body }),
  }
}

fn is_pending(score: &serde_json::Value) -> bool {
  score.is_null() || score.as_str() == Some("Processing")
}
