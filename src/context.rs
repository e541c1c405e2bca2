use std::time::{SystemTime, UNIX_EPOCH};

use crate::configuration::Configuration;

pub struct Context {
    pub config: Configuration,
}

impl Context {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        let cfg = Configuration {
            data_dir: cli.data_dir.clone(),
            api_listen: cli.api_listen,
            default_limit: cli.default_limit,
            log_file: cli.log_file.clone(),
            reset: cli.reset,
        };
        Self { config: cfg }
    }
}

/// Current wall clock time in unix seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn context_mirrors_cli_flags() {
        let cli = crate::cli::Cli::try_parse_from([
            "sleeplog",
            "--data-dir",
            "/tmp/sleeplog-ctx",
            "--default-limit",
            "25",
            "--reset",
        ])
        .unwrap();
        let ctx = Context::from_cli(&cli);
        assert_eq!(ctx.config.default_limit, 25);
        assert!(ctx.config.reset);
        assert_eq!(
            ctx.config.db_path(),
            std::path::Path::new("/tmp/sleeplog-ctx/sleeplog.sqlite")
        );
    }

    #[test]
    fn unix_now_is_after_2023() {
        assert!(unix_now() > 1_700_000_000);
    }
}
