//! `tpt` - the command-line front end for the TPT package manager.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tpt_core::{Config, PackageManager};
use tpt_schema::{Error, Source};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tpt")]
#[command(author, version, about = "Universal package manager for Linux")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Search every configured backend for a package.
    Search {
        term: String,
        /// Emit a machine-readable JSON array instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Show the full descriptor for one package.
    Details { name: String },
    /// Install a package, optionally pinning which source to use.
    Install {
        name: String,
        #[arg(long, value_enum)]
        source: Option<SourceArg>,
    },
    /// Remove an installed package.
    Uninstall { name: String },
    /// Check for and apply updates.
    Upgrade {
        /// Stage updates for the AADPO applier instead of installing now.
        #[arg(long)]
        no_apply: bool,
    },
    /// Manage the `tpt-aadpo.service` systemd unit.
    SystemIntegrate {
        #[command(subcommand)]
        action: SystemIntegrateAction,
    },
    /// Show what is currently staged for the next shutdown.
    AadpoStatus,
    /// List every package TPT has installed.
    List,
}

#[derive(Debug, Subcommand)]
enum SystemIntegrateAction {
    Install,
    Uninstall,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SourceArg {
    Tpt,
    Apt,
    Flatpak,
    Snap,
}

impl From<SourceArg> for Source {
    fn from(s: SourceArg) -> Self {
        match s {
            SourceArg::Tpt => Self::Tpt,
            SourceArg::Apt => Self::Apt,
            SourceArg::Flatpak => Self::Flatpak,
            SourceArg::Snap => Self::Snap,
        }
    }
}

struct LineReporter;

impl tpt_core::Reporter for LineReporter {
    fn info(&self, message: &str) {
        println!("{message}");
    }
    fn warning(&self, message: &str) {
        eprintln!("warning: {message}");
    }
    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }
    fn success(&self, message: &str) {
        println!("{message}");
    }
    fn downloading(&self, name: &str, downloaded: u64, total: Option<u64>) {
        match total {
            Some(total) => eprint!("\rdownloading {name}: {downloaded}/{total} bytes"),
            None => eprint!("\rdownloading {name}: {downloaded} bytes"),
        }
        let _ = std::io::stderr().flush();
    }
    fn installing(&self, name: &str) {
        println!("installing {name}...");
    }
    fn removing(&self, name: &str) {
        println!("removing {name}...");
    }
    fn done(&self, name: &str) {
        println!("done: {name}");
    }
    fn failed(&self, name: &str, error: &str) {
        eprintln!("failed: {name}: {error}");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::UserCancelled) => ExitCode::from(130),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Arc::new(Config::load()?);
    config.ensure_dirs()?;
    let reporter: Arc<dyn tpt_core::Reporter> = Arc::new(LineReporter);
    let manager = PackageManager::new(config.clone(), reporter)?;

    match cli.command {
        Commands::Search { term, json } => {
            let results = manager.search(&term).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("no packages matched '{term}'");
            } else {
                for pkg in &results {
                    println!("{} ({}) -- {}", pkg.name, pkg.source, pkg.description);
                }
            }
        }
        Commands::Details { name } => {
            let results = manager.search(&name).await;
            match results.into_iter().find(|d| d.name == name) {
                Some(descriptor) => println!("{}", serde_json::to_string_pretty(&descriptor)?),
                None => return Err(Error::PackageNotFound(name)),
            }
        }
        Commands::Install { name, source } => {
            manager
                .install(&name, source.map(Source::from), |name, repo| {
                    confirm_git_clone(name, repo)
                })
                .await?;
        }
        Commands::Uninstall { name } => {
            manager.uninstall(&name).await?;
        }
        Commands::Upgrade { no_apply } => {
            let outcomes = manager.upgrade(no_apply).await?;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(()) => println!("upgraded {}", outcome.name),
                    Err(e) => eprintln!("failed to upgrade {}: {e}", outcome.name),
                }
            }
        }
        Commands::SystemIntegrate { action } => match action {
            SystemIntegrateAction::Install => {
                let exe = std::env::current_exe()?;
                let apply_updates_bin = exe
                    .parent()
                    .map(|p| p.join("tpt-apply-updates"))
                    .unwrap_or_else(|| "tpt-apply-updates".into());
                manager.system_integrate_install(&apply_updates_bin).await?;
                println!("installed tpt-aadpo.service");
            }
            SystemIntegrateAction::Uninstall => {
                manager.system_integrate_uninstall().await?;
                println!("removed tpt-aadpo.service");
            }
        },
        Commands::AadpoStatus => {
            let status = manager.get_aadpo_status().await;
            if status.is_empty() {
                println!("no updates staged");
            } else {
                println!("{}", serde_json::to_string_pretty(&status)?);
            }
        }
        Commands::List => {
            let db = manager.list_installed().await;
            if db.is_empty() {
                println!("no packages installed via tpt");
            } else {
                for (name, record) in &db {
                    println!("{name} {} ({})", record.version, record.source);
                }
            }
        }
    }

    Ok(())
}

/// Gate for the Resolver's git-clone fallback: prompt before cloning an
/// arbitrary repository rather than doing it silently.
fn confirm_git_clone(name: &str, repo: &str) -> bool {
    print!("'{name}' was not found directly; clone '{repo}' to look for it? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut answer = String::new();
    if std::io::stdin().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
