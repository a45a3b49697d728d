use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Overrides the platform data directory when set.
pub const DATA_DIR_ENV: &str = "SUGARTRACK_DATA_DIR";
/// API key for the insight service.
pub const INSIGHT_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub insight_api_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "sugartrack")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };

        let mut config = Self::at(data_dir)?;
        config.insight_api_key = std::env::var(INSIGHT_KEY_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Ok(config)
    }

    /// Config rooted at an explicit data directory, created if missing.
    pub fn at(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("sugartrack.db");
        tracing::debug!(path = %db_path.display(), "using database");

        Ok(Config {
            db_path,
            data_dir,
            insight_api_key: None,
        })
    }

    /// Load the REST API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_creates_dir_and_db_path() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("data");
        let config = Config::at(dir.clone()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.db_path, dir.join("sugartrack.db"));
        assert!(config.insight_api_key.is_none());
    }

    #[test]
    fn test_api_key_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::at(tmp.path().to_path_buf()).unwrap();

        let (key, new) = config.load_or_create_api_key().unwrap();
        assert!(new);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

        let (again, new) = config.load_or_create_api_key().unwrap();
        assert!(!new);
        assert_eq!(again, key);
    }
}
