//! Script loader for command scripts on the file system.
//!
//! Layout: `<scripts_dir>/<extension_point>/<command>.lua`. The file stem is
//! the command name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::types::{CommandScript, ScriptMetadata};
use crate::Result;

/// Loader for scanning command scripts.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    /// Base directory for scripts.
    scripts_dir: PathBuf,
}

impl ScriptLoader {
    /// Create a new ScriptLoader with the given scripts directory.
    pub fn new<P: AsRef<Path>>(scripts_dir: P) -> Self {
        Self {
            scripts_dir: scripts_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the scripts for an extension point.
    pub fn point_dir(&self, extension_point: &str) -> PathBuf {
        self.scripts_dir.join(extension_point)
    }

    /// Scan an extension point for command scripts.
    ///
    /// A missing directory yields no scripts. Unreadable files and files
    /// whose stem is not a valid command name are skipped.
    pub fn scan(&self, extension_point: &str) -> Result<Vec<CommandScript>> {
        let dir = self.point_dir(extension_point);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut scripts = Vec::new();
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if !path.is_file() || !path.extension().is_some_and(|ext| ext == "lua") {
                continue;
            }

            let Some(name) = Self::command_name(&path) else {
                warn!(path = %path.display(), "Skipping script with invalid command name");
                continue;
            };

            match fs::read_to_string(&path) {
                Ok(content) => {
                    let metadata = Self::parse_metadata(&content);
                    scripts.push(CommandScript::new(name, path, metadata));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to read script");
                }
            }
        }

        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }

    /// Locate the script for a command.
    ///
    /// Returns `None` if the name cannot be a file stem or no such file exists.
    pub fn find(&self, extension_point: &str, name: &str) -> Option<PathBuf> {
        if !is_valid_command_name(name) {
            return None;
        }
        let path = self.point_dir(extension_point).join(format!("{name}.lua"));
        path.is_file().then_some(path)
    }

    /// Parse metadata from Lua file comments.
    ///
    /// Looks for comments like:
    /// ```lua
    /// -- @description Count the words in the text
    /// -- @author alice
    /// -- @enabled false
    /// ```
    pub fn parse_metadata(content: &str) -> ScriptMetadata {
        let mut metadata = ScriptMetadata::default();

        for line in content.lines() {
            let line = line.trim();
            if !line.starts_with("--") {
                // Stop at first non-comment line
                if !line.is_empty() {
                    break;
                }
                continue;
            }

            let comment = line.trim_start_matches("--").trim();

            if let Some(value) = comment.strip_prefix("@description ") {
                metadata.description = Some(value.trim().to_string());
            } else if let Some(value) = comment.strip_prefix("@author ") {
                metadata.author = Some(value.trim().to_string());
            } else if let Some(value) = comment.strip_prefix("@enabled ") {
                metadata.enabled = value.trim().parse().ok();
            }
        }

        metadata
    }

    fn command_name(path: &Path) -> Option<String> {
        let stem = path.file_stem()?.to_str()?;
        is_valid_command_name(stem).then(|| stem.to_string())
    }

    /// Get the scripts directory path.
    pub fn scripts_dir(&self) -> &Path {
        &self.scripts_dir
    }
}

/// A command name usable as a script file stem.
fn is_valid_command_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name
            .chars()
            .any(|c| c.is_whitespace() || c == '/' || c == '\\')
}
