use std::path::{Path, PathBuf};
use std::time::Duration;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use crate::api::{ApiClient, ApiConfig};
use crate::eval::{Evaluator, ExternalScorer, Scorer};
use crate::geometry::Orientation;
use crate::models::Solution;
use crate::optimizer::{ObjectiveKind, SolverConfig};
use crate::report::{read_problem, read_solution, write_solution, ProblemInfo};

mod api;
mod error;
mod eval;
mod geometry;
mod models;
mod optimizer;
mod problem;
mod report;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Places the musicians of a problem and writes the solution
  Solve {
    problem: PathBuf,
    /// Defaults to solution-<problem file name> in the working directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Lattice orientations to try; all of them by default
    #[arg(long, value_enum)]
    orientation: Vec<Orientation>,
    /// Annealing iterations after the greedy placement
    #[arg(long, default_value_t = 0)]
    anneal: usize,
    #[arg(long, value_enum, default_value_t = ObjectiveKind::Surrogate)]
    objective: ObjectiveKind,
    /// Penalise musicians crowding each other while annealing the surrogate
    #[arg(long)]
    sphere_packing: bool,
    #[arg(long, default_value_t = 1.0)]
    t_initial: f64,
    #[arg(long, default_value_t = 1e-2)]
    t_final: f64,
    /// Standard deviation of each annealing nudge
    #[arg(long, default_value_t = 0.1)]
    step: f64,
    /// Samples per axis of the interpolated taste grid
    #[arg(long, default_value_t = 10)]
    grid: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Stop annealing after this many seconds
    #[arg(long)]
    budget_secs: Option<u64>,
  },
  /// Scores a solution
  Score {
    problem: PathBuf,
    solution: PathBuf,
    /// Standalone scorer invoked as `<program> problem.json solution.json`
    #[arg(long)]
    external: Option<PathBuf>,
  },
  /// Prints size and density of a problem
  Info {
    problem: PathBuf,
  },
  /// Scores every solution that has a problem
  Summary {
    #[arg(default_value = "problems")]
    problems: PathBuf,
    #[arg(default_value = "solutions")]
    solutions: PathBuf,
    #[arg(long, default_value_t = 90)]
    max_id: u32,
    #[arg(long)]
    external: Option<PathBuf>,
  },
  /// Downloads problems from the contest server
  Sync {
    #[arg(long, default_value = "problems")]
    dir: PathBuf,
    #[arg(long)]
    force: bool,
  },
  /// Submits solutions/<id>.json and waits briefly for its score
  Submit {
    id: u32,
    #[arg(long, default_value = "solutions")]
    dir: PathBuf,
  },
  /// Changes the team name on the contest server
  UpdateUsername {
    #[arg(long)]
    username: String,
  },
  /// Adds loudest volumes to solutions that have none
  BackfillVolumes {
    from: PathBuf,
    to: PathBuf,
  },
}

fn enable_tracing() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .try_init();
}

fn scorer(external: &Option<PathBuf>) -> Box<dyn Scorer> {
  match external {
    Some(program) => Box::new(ExternalScorer { program: program.clone() }),
    None => Box::new(Evaluator),
  }
}

fn default_output(problem: &Path) -> PathBuf {
  let name = problem.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "problem.json".into());
  PathBuf::from(format!("solution-{name}"))
}

fn main() -> Result<(), anyhow::Error> {
  enable_tracing();
  let cli: Cli = Cli::parse();

  match &cli.command {
    Commands::Solve { problem, output, orientation, anneal, objective, sphere_packing, t_initial, t_final, step, grid, seed, budget_secs } => {
      let prob = read_problem(problem)?;
      info!(path = %problem.display(), musicians = prob.musicians.len(), attendees = prob.attendees.len(), "loaded problem");

      let config = SolverConfig {
        orientations: if orientation.is_empty() { Orientation::ALL.to_vec() } else { orientation.clone() },
        anneal_iterations: *anneal,
        t_initial: *t_initial,
        t_final: *t_final,
        step: *step,
        grid_size: *grid,
        objective: *objective,
        sphere_packing: *sphere_packing,
        seed: *seed,
        budget: budget_secs.map(Duration::from_secs),
        ..SolverConfig::default()
      };
      let outcome = optimizer::strategy(&prob, &config)?;

      match outcome.placement {
        Some(placement) => {
          let path = output.clone().unwrap_or_else(|| default_output(problem));
          write_solution(&path, &Solution::from_placements(placement))?;
          println!("{} => {} ({})", path.display(), outcome.value, outcome.msg);
        }
        None => println!("{}", outcome.msg),
      }
    }
    Commands::Score { problem, solution, external } => {
      let prob = read_problem(problem)?;
      let solution = read_solution(solution)?;
      let eval = scorer(external).score(&prob, &solution.placements)?;
      println!("{}", serde_json::to_string_pretty(&models::EvalReport::from(&eval))?);
    }
    Commands::Info { problem } => {
      let prob = read_problem(problem)?;
      println!("== {} ==", problem.display());
      println!("{}", ProblemInfo::from(&prob));
    }
    Commands::Summary { problems, solutions, max_id, external } => {
      let summary = report::summarize(problems, solutions, *max_id, &scorer(external))?;
      print!("{summary}");
    }
    Commands::Sync { dir, force } => {
      let client = ApiClient::new(ApiConfig::from_env()?)?;
      let written = client.sync_problems(dir, *force)?;
      println!("Wrote {written} problems to {}", dir.display());
    }
    Commands::Submit { id, dir } => {
      let path = api::numbered_json(dir, *id);
      let contents = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("solution does not exist {}: {e}", path.display()))?;
      let client = ApiClient::new(ApiConfig::from_env()?)?;
      match client.submit(*id, &contents)? {
        Some(score) => println!("{score}"),
        None => println!("Could not get score yet. Giving up."),
      }
    }
    Commands::UpdateUsername { username } => {
      let client = ApiClient::new(ApiConfig::from_env()?)?;
      client.update_username(username)?;
      println!("Done.");
    }
    Commands::BackfillVolumes { from, to } => {
      let rewritten = report::backfill_volumes(from, to)?;
      println!("Rewrote {rewritten} solutions into {}", to.display());
    }
  }

  Ok(())
}
