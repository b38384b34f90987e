mod suites;

use anyhow::Result;
use battery_runner::{
    run_case, CaseContext, Outcome, Registry, SandboxManager, Session, SessionConfig,
    ShellCollaborators,
};
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "battery", version, about = "Continuous randomized property-test battery")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the battery until the wall-clock budget is spent.
    Run {
        /// Run time in hours.
        #[arg(long, default_value_t = 1.0)]
        hours: f64,
        /// Run the compile command before the loop starts.
        #[arg(long)]
        compile: bool,
        /// Background batch member: suppress the end-of-session notification.
        #[arg(long)]
        background: bool,
        #[arg(long, default_value = ".battery")]
        dir: PathBuf,
        /// Fix the sampler stream for a reproducible session.
        #[arg(long)]
        seed: Option<u64>,
        /// Shell command for the compile collaborator.
        #[arg(long)]
        compile_cmd: Option<String>,
        /// Shell command for the notification collaborator.
        #[arg(long)]
        notify_cmd: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Re-run one case with a seed recorded in the progress log.
    Replay {
        #[arg(long)]
        suite: String,
        #[arg(long)]
        case: String,
        #[arg(long)]
        seed: u64,
        #[arg(long, default_value = ".battery")]
        dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Remove the battery state directory (logs, reports, sandboxes).
    Clean {
        #[arg(long, default_value = ".battery")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let cli = Cli::parse();
    let json_mode = command_json_mode(&cli.command);
    match run_command(cli.command) {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json!({
                    "ok": false,
                    "error": { "code": "command_failed", "message": err.to_string() }
                }));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn run_command(command: Commands) -> Result<Option<Value>> {
    match command {
        Commands::Run {
            hours,
            compile,
            background,
            dir,
            seed,
            compile_cmd,
            notify_cmd,
            json,
        } => {
            let config = SessionConfig {
                hours,
                compile,
                background,
                base_dir: dir.clone(),
                sampler_seed: seed,
            };
            let hooks = ShellCollaborators {
                compile_cmd,
                notify_cmd,
            };
            let session = Session::initialize(config, suites::builtin(), &hooks)?;
            let report = session.run(&hooks)?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "run",
                    "report": serde_json::to_value(&report)?,
                    "report_txt": dir.join("report.txt").display().to_string(),
                    "report_json": dir.join("report.json").display().to_string(),
                    "log": dir.join("battery.log").display().to_string(),
                })));
            }
            println!("iterations: {}", report.iterations);
            println!("successes: {}", report.total_successes);
            println!("failures: {}", report.total_failures);
            println!("report: {}", dir.join("report.txt").display());
            println!("log: {}", dir.join("battery.log").display());
        }
        Commands::Replay {
            suite,
            case,
            seed,
            dir,
            json,
        } => {
            let registry = Registry::build(suites::builtin())?;
            let resolved = registry.resolve(&suite, &case).ok_or_else(|| {
                anyhow::anyhow!(format!("unknown test case: {}::{}", suite, case))
            })?;
            let sandboxes = SandboxManager::new(&dir);
            let sandbox = sandboxes.enter()?;
            let mut ctx = CaseContext {
                seed,
                rng: ChaCha20Rng::seed_from_u64(seed),
                sandbox: sandbox.path().to_path_buf(),
            };
            let outcome = run_case(resolved, &mut ctx);
            sandboxes.exit(sandbox)?;
            let failed = !outcome.is_success();
            if json {
                let payload = json!({
                    "ok": true,
                    "command": "replay",
                    "suite": suite,
                    "case": case,
                    "seed": seed,
                    "outcome": match &outcome {
                        Outcome::Success => json!({"status": "success"}),
                        Outcome::Failure(diag) => json!({"status": "failure", "diagnostic": diag}),
                    },
                });
                emit_json(&payload);
            } else {
                println!("suite: {}", suite);
                println!("case: {}", case);
                println!("seed: {}", seed);
                match &outcome {
                    Outcome::Success => println!("outcome: success"),
                    Outcome::Failure(diag) => {
                        println!("outcome: failure");
                        println!("{}", diag);
                    }
                }
            }
            if failed {
                std::process::exit(1);
            }
        }
        Commands::Clean { dir } => {
            if dir.exists() {
                std::fs::remove_dir_all(&dir)?;
                println!("removed: {}", dir.display());
            } else {
                println!("nothing to remove: {}", dir.display());
            }
        }
    }
    Ok(None)
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\"}}}}"
        ),
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Run { json, .. } | Commands::Replay { json, .. } => *json,
        Commands::Clean { .. } => false,
    }
}
