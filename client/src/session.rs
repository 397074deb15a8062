use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use courier_common::user::User;

use crate::error::Result;

/// Authenticated identity: the user record and its bearer token.
/// Always stored and cleared as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    pub token: String,
}

fn session_path(dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) => dir.join("session.json"),
        None => {
            let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
            cache.join("courier").join("session.json")
        }
    }
}

/// Restores a persisted session, if any. A file that fails to parse is
/// logged, deleted, and reported as no session.
pub fn load(dir: Option<&Path>) -> Option<Session> {
    let path = session_path(dir);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(session) => {
            tracing::debug!("restored session from {}", path.display());
            Some(session)
        }
        Err(e) => {
            tracing::warn!("discarding corrupt session file {}: {e}", path.display());
            let _ = std::fs::remove_file(&path);
            None
        }
    }
}

pub fn save(dir: Option<&Path>, session: &Session) -> Result<()> {
    let path = session_path(dir);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(session)
        .map_err(|e| crate::error::ClientError::Decode(e.to_string()))?;
    std::fs::write(&path, data)?;
    tracing::debug!("saved session to {}", path.display());
    Ok(())
}

pub fn clear(dir: Option<&Path>) -> Result<()> {
    let path = session_path(dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
