use clap::Parser;
use std::env;
use std::path::PathBuf;

use crate::cli::command::Command;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Serve paginated users and sleep records over HTTP",
    long_about = "A small REST service listing users and the sleep records of the people they follow, with offset, page and cursor pagination over a SQLite store.",
    subcommand_required = false,
    arg_required_else_help = false
)]
pub struct Cli {
    #[arg(
        long,
        default_value_t = false,
        help = "Reset all persisted state (delete the SQLite database) before starting"
    )]
    pub reset: bool,

    #[arg(
        long,
        env = "SLEEPLOG_DATA_DIR",
        default_value = ".sleeplog/",
        value_name = "DIR",
        help = "Directory to store persistent data"
    )]
    pub data_dir: PathBuf,

    #[arg(
        long = "log-file",
        env = "SLEEPLOG_LOG_FILE",
        value_name = "PATH",
        help = "Write logs to PATH (in addition to stderr)"
    )]
    pub log_file: Option<PathBuf>,

    #[arg(
        long = "api-listen",
        env = "SLEEPLOG_API_LISTEN",
        value_name = "ADDR",
        default_value = "127.0.0.1:8083",
        help = "REST API listen address (host:port)"
    )]
    pub api_listen: std::net::SocketAddr,

    #[arg(
        long = "default-limit",
        env = "SLEEPLOG_DEFAULT_LIMIT",
        value_name = "N",
        default_value_t = 10u64,
        value_parser = clap::value_parser!(u64).range(1..=1000),
        help = "Page size for list requests without a limit"
    )]
    pub default_limit: u64,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

pub fn parse() -> Cli {
    let dotenv_path = env::var("DOTENV_PATH").unwrap_or(".env".into());
    dotenvy::from_filename(&dotenv_path).ok();

    Cli::parse()
}
