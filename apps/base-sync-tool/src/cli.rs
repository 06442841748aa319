use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Server address (host:port), overrides the config file
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Auth token, overrides the config file
    #[arg(short, long, global = true)]
    pub token: Option<String>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync a project's base and print a summary after every change
    Watch {
        /// Project whose base to sync
        project_id: String,

        /// Print the snapshot summary only
        #[arg(long)]
        once: bool,
    },

    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project backed by a spreadsheet base
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Personal access token of the spreadsheet service
        #[arg(long)]
        pat: String,

        /// Base id in the spreadsheet service
        #[arg(long)]
        airtable_base: String,
    },

    /// Rename or re-describe a project
    Update {
        #[arg(long)]
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a project
    Delete {
        #[arg(long)]
        id: String,
    },
}
