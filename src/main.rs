use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use devlab::config::LabConfig;
use devlab::devcontainer::FeatureSpec;

mod cmd;

#[derive(Parser)]
#[command(name = "devlab")]
#[command(
    version,
    about = "Disposable devcontainer labs backed by git worktrees",
    long_about = "devlab creates disposable devcontainer environments. Each lab is a git \
worktree of a shared bare clone of your project, running in its own container, \
so experiments never touch your working copy."
)]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create and start a lab
    Start {
        /// Project directory (default: current directory)
        #[arg(long, default_value = ".")]
        project: PathBuf,

        /// Profile to apply (default: snapshot of the current configuration)
        #[arg(long)]
        profile: Option<String>,

        /// Git branch (default: lab/<profile>)
        #[arg(long)]
        branch: Option<String>,

        /// Display name for the lab (default: <project>-<profile>)
        #[arg(long)]
        name: Option<String>,

        /// Devcontainer feature, repeatable (e.g. go:1.23)
        #[arg(long = "feature", value_name = "NAME[:VERSION]")]
        features: Vec<FeatureSpec>,

        /// Profile applied before the main profile
        #[arg(long)]
        base_profile: Option<String>,
    },
    /// Show all labs and their status
    #[command(visible_alias = "ls")]
    List,
    /// Stop a running lab (volumes persist)
    Stop {
        /// Lab to stop (name, id, project, or profile; default: current directory)
        #[arg(long)]
        lab: Option<String>,
    },
    /// Destroy a lab and all its data
    Rm {
        /// Lab to remove (name, id, project, or profile; default: current directory)
        #[arg(long)]
        lab: Option<String>,

        /// Skip confirmation prompts
        #[arg(short, long)]
        force: bool,
    },
    /// Run a command inside a running lab (default: interactive bash)
    Exec {
        /// Lab to exec into (name, id, project, or profile; default: current directory)
        #[arg(long)]
        lab: Option<String>,

        /// Command to run, after `--`
        #[arg(last = true)]
        command: Vec<String>,
    },
    /// Attach VS Code to a running lab
    Open {
        /// Lab to open (name, id, project, or profile; default: current directory)
        #[arg(long)]
        lab: Option<String>,
    },
    /// Check system health and prerequisites
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    devlab::logging::init(cli.verbose);
    let config = LabConfig::load()?;

    match cli.command {
        Commands::Start {
            project,
            profile,
            branch,
            name,
            features,
            base_profile,
        } => {
            let opts = devlab::manager::StartOptions {
                project,
                profile,
                branch,
                name,
                features,
                base_profile,
            };
            cmd::cmd_start(config, opts)?;
        }
        Commands::List => cmd::cmd_list(config)?,
        Commands::Stop { lab } => cmd::cmd_stop(config, lab.as_deref())?,
        Commands::Rm { lab, force } => cmd::cmd_rm(config, lab.as_deref(), force)?,
        Commands::Exec { lab, command } => cmd::cmd_exec(config, lab.as_deref(), &command)?,
        Commands::Open { lab } => cmd::cmd_open(config, lab.as_deref())?,
        Commands::Doctor => cmd::cmd_doctor(config)?,
    }

    Ok(())
}
