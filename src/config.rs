use std::path::PathBuf;

/// application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// address to bind the listener on
    pub host: String,
    /// listening port
    pub port: u16,
    /// number of acceptor tasks sharing the listener
    pub boss_threads: usize,
    /// number of tokio worker threads
    pub worker_threads: usize,
    /// upper bound of the blocking pool used for image work
    pub blocking_threads: usize,
    /// directory files are served from
    pub path_parent: PathBuf,
    /// upload subdirectory under `path_parent`
    pub path_dir: String,
    /// public url prefix prepended to `path_dir/<name>`
    pub url_parent: String,
    /// where upload sessions keep their scratch files
    pub temp_dir: PathBuf,
    /// maximum request body size in bytes
    pub max_upload_size: usize,
    /// seconds a connection may take to send its request headers
    pub header_read_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            boss_threads: 1,
            worker_threads: 8,
            blocking_threads: 4,
            path_parent: PathBuf::from("./files"),
            path_dir: "upload".to_string(),
            url_parent: "http://127.0.0.1:8080/?file=".to_string(),
            temp_dir: std::env::temp_dir(),
            max_upload_size: 100 * 1024 * 1024, // 100MB default
            header_read_timeout_secs: 30,
        }
    }
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT").unwrap_or(defaults.port),
            boss_threads: parsed("BOSS_THREADS")
                .unwrap_or(defaults.boss_threads)
                .max(1),
            worker_threads: parsed("WORKER_THREADS")
                .unwrap_or(defaults.worker_threads)
                .max(1),
            blocking_threads: parsed("BLOCKING_THREADS")
                .unwrap_or(defaults.blocking_threads)
                .max(1),
            path_parent: std::env::var("PATH_PARENT")
                .map(PathBuf::from)
                .unwrap_or(defaults.path_parent),
            path_dir: std::env::var("PATH_DIR")
                .map(|d| d.trim_matches('/').to_string())
                .unwrap_or(defaults.path_dir),
            url_parent: std::env::var("URL_PARENT").unwrap_or(defaults.url_parent),
            temp_dir: std::env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.temp_dir),
            max_upload_size: parsed("MAX_UPLOAD_SIZE").unwrap_or(defaults.max_upload_size),
            header_read_timeout_secs: parsed("HEADER_READ_TIMEOUT_SECS")
                .unwrap_or(defaults.header_read_timeout_secs),
        }
    }

    /// directory persisted uploads are moved into
    pub fn upload_dir(&self) -> PathBuf {
        self.path_parent.join(&self.path_dir)
    }

    /// public url of a persisted upload
    pub fn url_for(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.url_parent, self.path_dir, file_name)
    }
}

// unset or unparseable values fall back to the default
fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
