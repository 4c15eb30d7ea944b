//! fg - run installed application versions in the background.
//!
//! Thin front-end over `fg-core`: parses arguments, renders results and maps
//! failures to exit codes. Every invocation is independent; state lives in
//! the registry under the fg home.

mod render;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fg_core::config::LogConfig;
use fg_core::{FgApi, FgError, FgPaths, IdentityPolicy, LogStream, StopOutcome, Supervisor};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fg")]
#[command(about = "Start, stop and inspect installed application versions")]
#[command(version)]
struct Args {
    /// fg home directory (defaults to $FG_HOME, then ~/.fg)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Only trust a registered PID if its start time matches the record
    #[arg(long, global = true)]
    verify_start_time: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an installed version in the background
    Start {
        /// Version to start (defaults to the newest installed)
        version: Option<String>,
    },
    /// Stop a running instance
    Stop {
        /// Process ID of the instance
        pid: Option<u32>,

        /// Stop every instance of this version
        #[arg(long, conflicts_with_all = ["pid", "all"])]
        version: Option<String>,

        /// Stop every managed instance
        #[arg(long, conflicts_with = "pid")]
        all: bool,
    },
    /// Show running instances
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the output of an instance
    Logs {
        /// Process ID of the instance
        pid: u32,

        /// Number of lines to show (whole log when omitted)
        #[arg(short = 'n', long)]
        tail: Option<usize>,

        /// Keep printing new lines until interrupted
        #[arg(short, long)]
        follow: bool,

        /// Read the stderr log instead of stdout
        #[arg(long)]
        stderr: bool,
    },
    /// List installed versions
    List,
    /// Show the manifest of an installed version
    Config {
        /// Installed version
        version: String,
    },
}

/// What `fg logs` prints.
#[derive(Debug, PartialEq, Eq)]
enum LogView {
    All,
    Tail(usize),
    /// Last lines, then everything appended until interrupted.
    Follow(usize),
}

impl LogView {
    fn new(tail: Option<usize>, follow: bool) -> Self {
        match (tail, follow) {
            (n, true) => LogView::Follow(n.unwrap_or(LogConfig::DEFAULT_TAIL_LINES)),
            (Some(n), false) => LogView::Tail(n),
            (None, false) => LogView::All,
        }
    }
}

fn init_tracing(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn open_api(args: &Args) -> Result<FgApi> {
    let paths = match &args.home {
        Some(home) => FgPaths::new(home),
        None => FgPaths::from_env()?,
    };
    debug!("fg home: {}", paths.root().display());

    let policy = if args.verify_start_time {
        IdentityPolicy::verify_start_time()
    } else {
        IdentityPolicy::PidOnly
    };

    let supervisor = Supervisor::builder(paths).identity_policy(policy).build()?;
    Ok(FgApi::new(supervisor))
}

/// Outcome of a command that is not an error but still exits non-zero.
struct Unsuccessful(u8);

async fn run(args: Args) -> Result<Option<Unsuccessful>> {
    let api = open_api(&args)?;

    match args.command {
        Command::Start { version } => {
            let (label, pid) = match version {
                Some(label) => {
                    let pid = api.start(label.clone()).await?;
                    (label, pid)
                }
                None => api.start_latest().await?,
            };
            println!("Started {} with PID {}", label, pid);
        }

        Command::Stop { pid, version, all } => {
            let outcomes = match (pid, version) {
                (Some(pid), _) => vec![(pid, api.stop(pid).await?)],
                (None, Some(label)) => api.stop_version(label).await?,
                (None, None) if all => api.stop_all().await?,
                (None, None) => anyhow::bail!("Specify a PID, --version or --all"),
            };

            if outcomes.is_empty() {
                println!("No managed instances to stop.");
            }
            let mut worst = None;
            for (pid, outcome) in &outcomes {
                println!("{}", render::stop_message(*pid, outcome));
                match outcome {
                    StopOutcome::NotManaged => worst = worst.or(Some(Unsuccessful(3))),
                    StopOutcome::Failed(_) => worst = Some(Unsuccessful(1)),
                    StopOutcome::Stopped | StopOutcome::AlreadyDead => {}
                }
            }
            return Ok(worst);
        }

        Command::Status { json } => {
            let entries = api.status().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                println!("{}", render::status_table(&entries));
            }
        }

        Command::Logs {
            pid,
            tail,
            follow,
            stderr,
        } => {
            let stream = if stderr {
                LogStream::Stderr
            } else {
                LogStream::Stdout
            };

            let n = match LogView::new(tail, follow) {
                LogView::All => {
                    let text = api.read_all_stream(pid, stream).await?;
                    print!("{}", text);
                    if !text.is_empty() && !text.ends_with('\n') {
                        println!();
                    }
                    return Ok(None);
                }
                LogView::Tail(n) => {
                    for line in api.tail_stream(pid, stream, n).await? {
                        println!("{}", line);
                    }
                    return Ok(None);
                }
                LogView::Follow(n) => n,
            };

            let mut lines = api.follow_stream(pid, stream, n).await?;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted, stopping follow");
                        break;
                    }
                    line = lines.recv() => match line {
                        Some(Ok(line)) => println!("{}", line),
                        Some(Err(e)) => return Err(e.into()),
                        None => break,
                    },
                }
            }
        }

        Command::List => {
            let versions = api.installed_versions().await?;
            let instances = api.instances().await?;
            println!("{}", render::version_list(&versions, &instances));
        }

        Command::Config { version } => {
            let config = api.version_config(version).await?;
            println!("{}", render::version_config(&config)?);
        }
    }

    Ok(None)
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<FgError>()
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug, args.log_json);

    match run(args).await {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(Unsuccessful(code))) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}
