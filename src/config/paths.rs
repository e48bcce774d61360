//! Where the interviewer keeps its files.
//!
//! Settings live in the platform config dir (`~/.config/mock-interview` on
//! Linux).  Everything a session produces goes under the local data dir
//! (`~/.local/share/mock-interview` on Linux):
//!
//! ```text
//! mock-interview/
//!   recordings/   session-<id>.<ext>   written by FileSessionStore
//!   reports/      session-<id>.json    written by the CLI on exit
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "mock-interview";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    /// `settings.toml` inside `config_dir`.
    pub settings_file: PathBuf,
    /// Target of the `local` persistence backend.
    pub recordings_dir: PathBuf,
    /// End-of-session transcripts and warning logs.
    pub reports_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        // No standard location (rare, e.g. a bare container): use the cwd.
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        let config_dir = base(dirs::config_dir());
        let data_dir = base(dirs::data_local_dir());

        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            recordings_dir: data_dir.join("recordings"),
            reports_dir: data_dir.join("reports"),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
