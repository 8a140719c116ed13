mod cmd;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ottopie_lib::task::Interval;

/// Interval used by `add` when none is given.
const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Run plugins on a recurring schedule
#[derive(Parser)]
#[command(name = "ottopie")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Task snapshot file (default: <config dir>/ottopie/tasks.json)
  #[arg(long, global = true, env = "OTTOPIE_TASKS_FILE")]
  tasks_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Add a task
  Add {
    /// Plugin script (.lua) or package (.ottopie)
    #[arg(long)]
    plugin: PathBuf,
    /// Source folder passed to the plugin
    #[arg(long)]
    src: PathBuf,
    /// Target folder passed to the plugin
    #[arg(long)]
    tgt: PathBuf,
    #[command(flatten)]
    interval: IntervalArgs,
  },

  /// Change a task's configuration; the task reloads its plugin and stays stopped
  Edit {
    /// Task number as shown by `list`
    index: usize,
    #[arg(long)]
    plugin: Option<PathBuf>,
    #[arg(long)]
    src: Option<PathBuf>,
    #[arg(long)]
    tgt: Option<PathBuf>,
    #[command(flatten)]
    interval: IntervalArgs,
  },

  /// Remove a task
  Remove {
    /// Task number as shown by `list`
    index: usize,
  },

  /// List configured tasks
  List {
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Run a task's plugin once and print its status
  Once {
    /// Task number as shown by `list`
    index: usize,
  },

  /// Start every task and print events until interrupted
  Run,

  /// Build a plugin package from a script
  Pack {
    /// Plugin script implementing `run`
    script: PathBuf,
    /// Package name (default: script file stem)
    #[arg(long)]
    name: Option<String>,
    /// Package version (default: 1.0.0)
    #[arg(long)]
    version: Option<String>,
    #[arg(long, default_value = "")]
    description: String,
    /// Path of the script inside the package (default: script file name)
    #[arg(long)]
    entry_point: Option<String>,
    /// Directory of Lua modules bundled under vendor/
    #[arg(long)]
    vendor: Option<PathBuf>,
    /// Output file (default: <name>.ottopie)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },

  /// Show the manifest of a plugin package
  Inspect {
    archive: PathBuf,
    /// Output as JSON
    #[arg(long)]
    json: bool,
  },

  /// Write the bundled folder_sync plugin and editor support files
  Init {
    /// Directory to write into
    #[arg(default_value = ".")]
    path: PathBuf,
    /// Overwrite existing files
    #[arg(short, long)]
    force: bool,
  },
}

/// Recurrence, either as one duration or as separate fields.
#[derive(Args, Debug, Default, Clone)]
pub struct IntervalArgs {
  /// Period as a duration, e.g. "1h 30m"
  #[arg(long, value_parser = humantime::parse_duration, conflicts_with_all = ["days", "hours", "minutes", "seconds"])]
  every: Option<Duration>,
  #[arg(long)]
  days: Option<u32>,
  #[arg(long)]
  hours: Option<u32>,
  #[arg(long)]
  minutes: Option<u32>,
  #[arg(long)]
  seconds: Option<u32>,
}

impl IntervalArgs {
  fn is_empty(&self) -> bool {
    self.every.is_none() && self.days.is_none() && self.hours.is_none() && self.minutes.is_none() && self.seconds.is_none()
  }

  /// Interval described by the flags, with unset fields taken from `base`.
  pub fn resolve(&self, base: Interval) -> Result<Interval> {
    if let Some(every) = self.every {
      if every.subsec_nanos() != 0 {
        bail!("interval must be a whole number of seconds");
      }
      return Ok(Interval::from_secs(every.as_secs()));
    }
    Ok(Interval::new(
      self.days.unwrap_or(base.days),
      self.hours.unwrap_or(base.hours),
      self.minutes.unwrap_or(base.minutes),
      self.seconds.unwrap_or(base.seconds),
    ))
  }

  /// Interval for a new task. Without any flag the default applies; with
  /// some fields given, the others are zero.
  fn for_new_task(&self) -> Result<Interval> {
    if self.is_empty() {
      return Ok(Interval::from_secs(DEFAULT_INTERVAL_SECS));
    }
    self.resolve(Interval::default())
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let tasks_file = cli.tasks_file;

  match cli.command {
    Commands::Add {
      plugin,
      src,
      tgt,
      interval,
    } => cmd::cmd_add(tasks_file, plugin, src, tgt, interval.for_new_task()?),
    Commands::Edit {
      index,
      plugin,
      src,
      tgt,
      interval,
    } => cmd::cmd_edit(
      tasks_file,
      index,
      cmd::EditArgs {
        plugin,
        src,
        tgt,
        interval,
      },
    ),
    Commands::Remove { index } => cmd::cmd_remove(tasks_file, index),
    Commands::List { json } => cmd::cmd_list(tasks_file, json),
    Commands::Once { index } => cmd::cmd_once(tasks_file, index),
    Commands::Run => cmd::cmd_run(tasks_file),
    Commands::Pack {
      script,
      name,
      version,
      description,
      entry_point,
      vendor,
      output,
    } => cmd::cmd_pack(cmd::PackArgs {
      script,
      name,
      version,
      description,
      entry_point,
      vendor,
      output,
    }),
    Commands::Inspect { archive, json } => cmd::cmd_inspect(&archive, json),
    Commands::Init { path, force } => cmd::cmd_init(&path, force),
  }
}
