use anyhow::{Context, Result};
use std::{env, fs, path::PathBuf};

/// Cached per-user state: the login cookie and the last submission id.
///
/// The directory is explicit so callers (and tests) decide where the state
/// lives; `from_env` resolves the conventional location.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cache_dir: PathBuf,
}

impl SessionStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    /// Resolve the cache directory from `ACMOJ_CACHE_DIR`, falling back to
    /// the platform cache directory.
    pub fn from_env() -> Result<Self> {
        let cache_dir = match env::var("ACMOJ_CACHE_DIR") {
            Ok(path) => PathBuf::from(path),
            Err(_) => dirs::cache_dir()
                .context("could not determine the user cache directory")?
                .join("acmoj"),
        };

        Ok(Self::new(cache_dir))
    }

    pub fn load_cookie(&self) -> Result<String> {
        let path = self.cookie_path();
        let cookie = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(cookie.trim().to_string())
    }

    pub fn store_cookie(&self, cookie: &str) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.cookie_path(), cookie)?;
        Ok(())
    }

    pub fn load_last_submission(&self) -> Result<u64> {
        let path = self.last_submission_path();
        let id = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        id.trim()
            .parse()
            .with_context(|| format!("corrupt submission id in {}", path.display()))
    }

    pub fn store_last_submission(&self, submission_id: u64) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        fs::write(self.last_submission_path(), submission_id.to_string())?;
        Ok(())
    }

    fn cookie_path(&self) -> PathBuf {
        self.cache_dir.join("login_cookie.txt")
    }

    fn last_submission_path(&self) -> PathBuf {
        self.cache_dir.join("last_submission_id.txt")
    }
}
