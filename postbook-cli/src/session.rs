use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Remembers which user is signed in between invocations.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(custom_path: Option<PathBuf>) -> Result<Self> {
        let path = match custom_path {
            Some(path) => path,
            None => {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                home.join(".postbook_session")
            }
        };

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save_user_id(&self, user_id: i64) -> Result<()> {
        fs::write(&self.path, user_id.to_string())
            .with_context(|| format!("Failed to save session to {:?}", self.path))?;
        tracing::debug!("Session saved to {:?}", self.path);
        Ok(())
    }

    pub fn load_user_id(&self) -> Result<Option<i64>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => {
                let raw = raw.trim();
                if raw.is_empty() {
                    return Ok(None);
                }
                let user_id = raw
                    .parse()
                    .with_context(|| format!("Corrupt session file {:?}", self.path))?;
                Ok(Some(user_id))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read session file"),
        }
    }

    pub fn clear(&self) -> Result<bool> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove session file {:?}", self.path))?;
            return Ok(true);
        }
        Ok(false)
    }
}
