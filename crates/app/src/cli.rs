use std::net::SocketAddr;

use api::AdminAction;
use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "course-server", version, about = "Course progress service")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv all debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Drive a running server through the full learner flow
    Conformance(ConformanceArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "COURSE_LISTEN", default_value = "127.0.0.1:8080")]
    pub listen: SocketAddr,

    /// SQLite URL, or `memory` for a process-local store
    #[arg(long, env = "COURSE_DB_URL", default_value = "sqlite://course.sqlite3?mode=rwc")]
    pub db: String,

    /// Page size when a request names none
    #[arg(long, env = "COURSE_DEFAULT_PAGE_SIZE", default_value_t = 20)]
    pub default_page_size: u32,

    /// Largest page a request may ask for
    #[arg(long, env = "COURSE_MAX_PAGE_SIZE", default_value_t = 100)]
    pub max_page_size: u32,

    /// Header carrying the learner id
    #[arg(long, env = "COURSE_LEARNER_HEADER", default_value = "x-learner-id")]
    pub learner_header: String,

    /// Header carrying the admin secret
    #[arg(long, env = "COURSE_ADMIN_HEADER")]
    pub admin_header: Option<String>,

    /// Expected value of the admin header
    #[arg(long, env = "COURSE_ADMIN_SECRET", hide_env_values = true)]
    pub admin_secret: Option<String>,

    /// Actions that require the admin header
    #[arg(
        long,
        env = "COURSE_ADMIN_ONLY",
        value_delimiter = ',',
        default_value = "create-course,create-lesson,create-deck,enroll"
    )]
    pub admin_only: Vec<AdminAction>,
}

impl ServeArgs {
    pub fn in_memory(&self) -> bool {
        self.db.eq_ignore_ascii_case("memory")
    }
}

#[derive(Debug, Args)]
pub struct ConformanceArgs {
    /// Root URL of the server under test
    #[arg(long, env = "COURSE_BASE_URL", default_value = "http://127.0.0.1:8080")]
    pub base_url: String,

    /// Learner to act as; a fresh one when omitted
    #[arg(long)]
    pub learner: Option<String>,

    /// Number of lessons to create
    #[arg(long, default_value_t = 5)]
    pub lessons: u32,

    /// Page size of the traversal
    #[arg(long, default_value_t = 2)]
    pub page_size: i64,

    #[arg(long, default_value = "x-learner-id")]
    pub learner_header: String,

    #[arg(long, env = "COURSE_ADMIN_HEADER")]
    pub admin_header: Option<String>,

    #[arg(long, env = "COURSE_ADMIN_SECRET", hide_env_values = true)]
    pub admin_secret: Option<String>,
}
