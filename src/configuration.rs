use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Configuration {
    pub data_dir: PathBuf,
    pub api_listen: SocketAddr,
    /// Page size for list requests that carry no `limit`.
    pub default_limit: u64,
    pub log_file: Option<PathBuf>,
    pub reset: bool,
}

impl Configuration {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sleeplog.sqlite")
    }
}
