use std::process::Command as ProcCommand;

use tempfile::TempDir;

pub fn base_cmd(data_dir: &TempDir) -> ProcCommand {
    let mut command = ProcCommand::new(env!("CARGO_BIN_EXE_sleeplog"));
    command
        .env("DOTENV_PATH", data_dir.path().join("missing.env"))
        .env_remove("SLEEPLOG_DATA_DIR")
        .env_remove("SLEEPLOG_LOG_FILE")
        .env_remove("SLEEPLOG_API_LISTEN")
        .env_remove("SLEEPLOG_DEFAULT_LIMIT")
        .arg("--data-dir")
        .arg(data_dir.path());
    command
}

pub fn db_path(data_dir: &TempDir) -> std::path::PathBuf {
    data_dir.path().join("sleeplog.sqlite")
}

pub fn count(conn: &rusqlite::Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
        .expect("count rows")
}
