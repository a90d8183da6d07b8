use clap::{Parser, Subcommand};
use save_vault::backup::config::AppConfig;
use save_vault::backup::result_error::result::Result;
use save_vault::backup::service::{BackupOutcome, BackupService};
use save_vault::backup::worker::BackupWorker;
use std::path::PathBuf;
use std::process::exit;
use tracing::error;

/// Back up, list and restore game saves
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up the current saves of a target
    Backup { target: String },
    /// List the backups of a target, newest first
    List {
        target: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Restore a backup, saving the current state first
    Restore { target: String, backup: PathBuf },
    /// Delete backups beyond the configured maximum
    Prune { target: String },
}

fn report(outcome: BackupOutcome) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(outcome.success())
}

fn run(args: Args) -> Result<bool> {
    let config = AppConfig::from_path(&args.config)?;
    let worker = BackupWorker::new(config.worker_threads())?;
    let policy = config.retention().clone();

    match args.command {
        Command::Backup { target } => {
            let target = config.find_target(&target)?.clone();
            report(worker.submit_create(target, policy).wait()?)
        }
        Command::Restore { target, backup } => {
            let target = config.find_target(&target)?.clone();
            report(worker.submit_restore(target, backup, policy).wait()?)
        }
        Command::List { target, json } => {
            let target = config.find_target(&target)?.clone();
            let entries = worker.submit_list(target, policy).wait()??;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!(
                        "{}  {:>10}  {:<9}  {}",
                        entry.formatted_date(),
                        entry.formatted_size(),
                        entry.kind(),
                        entry.path().display()
                    );
                }
            }
            Ok(true)
        }
        Command::Prune { target } => {
            let target = config.find_target(&target)?;
            let deleted = BackupService::new().prune_backups(target, &policy)?;
            for path in &deleted {
                println!("Deleted {}", path.display());
            }
            Ok(true)
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    match run(args) {
        Ok(true) => {}
        Ok(false) => exit(1),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
