//! Working-directory session shared across CLI invocations.

use std::path::PathBuf;

const SESSION_FILE: &str = ".dfs_client_path";

/// The CLI's current DFS directory, persisted in `~/.dfs_client_path`.
pub struct Session {
    file: Option<PathBuf>,
    current: String,
}

impl Session {
    pub fn load() -> Self {
        Self::load_from(dirs::home_dir().map(|home| home.join(SESSION_FILE)))
    }

    pub fn load_from(file: Option<PathBuf>) -> Self {
        let current = file
            .as_ref()
            .and_then(|f| std::fs::read_to_string(f).ok())
            .map(|content| content.trim().to_string())
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| "/".to_string());
        Self { file, current }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    /// Resolves `path` against the current directory.
    pub fn resolve(&self, path: &str) -> String {
        resolve_path(&self.current, path)
    }

    pub fn change_to(&mut self, path: String) -> anyhow::Result<()> {
        if let Some(file) = &self.file {
            std::fs::write(file, &path)?;
        }
        self.current = path;
        Ok(())
    }
}

/// Joins `path` onto `base` unless it is absolute, collapsing `.` and `..`.
/// `..` at the root stays at the root.
pub fn resolve_path(base: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", base, path)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}
