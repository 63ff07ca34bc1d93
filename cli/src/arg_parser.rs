use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Talk to a media job server
#[derive(Debug, Parser)]
pub struct ArgParser {
    /// Base URL of the server
    #[arg(short = 's', long = "server", env = "MEDIA_SERVER", default_value = "http://127.0.0.1:8080")]
    pub server: String,
    /// The sub-command to use
    #[command(subcommand)]
    pub sub_command: SubCommand,
}

#[derive(Debug, Subcommand)]
pub enum SubCommand {
    /// submit a new job
    Submit {
        /// media file to upload
        file: PathBuf,

        /// job kind: convert, separate, analyze or subtitle
        #[arg(long)]
        kind: String,

        /// owner recorded in the audit trail
        #[arg(long, default_value = "cli")]
        owner: String,

        /// analysis prompt (analyze jobs only)
        #[arg(long)]
        prompt: Option<String>,
    },
    /// poll a job's status
    Status {
        /// Uuid v4 string
        job_id: Uuid,
    },
    /// download a finished job's result
    Fetch {
        /// Uuid v4 string
        job_id: Uuid,

        /// where to write the result; defaults to the server's filename
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// cancel a queued or running job
    Cancel {
        /// Uuid v4 string
        job_id: Uuid,
    },
}
