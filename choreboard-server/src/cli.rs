use chrono::NaiveDate;
use choreboard_shared::domain::Frequency;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const HELP_EPILOG: &str = r#"Server options can also be provided via environment variables:
  CONFIG_PATH (default: ./config.yaml)
  DB_PATH     (default: data/chores.db)
  PHOTO_DIR   (default: config.photo_dir or ./chore_photos)
  PORT        (default: 5151 or config.listen_port)

The admin subcommands work directly on the database at DB_PATH.
"#;

#[derive(Debug, Parser)]
#[command(
    name = "choreboard-server",
    version,
    about = "Household chore board server",
    long_about = None,
    after_long_help = HELP_EPILOG,
)]
pub struct Cli {
    /// Optional subcommand. Without one, runs the server.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add a family member
    AddPerson {
        /// Display name
        name: String,
    },
    /// Add a chore to the master list
    AddChore {
        #[arg(long)]
        room: String,
        #[arg(long)]
        task: String,
        /// One of: Daily, Weekly, Monthly, Semi-annually, Annual, Summer-weekly
        #[arg(long, default_value = "Daily")]
        frequency: Frequency,
        /// Estimated time in minutes
        #[arg(long, default_value_t = 10)]
        minutes: i32,
    },
    /// Export assignments between two dates (inclusive) as CSV
    Export {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
