//! Script types and data structures.

use std::path::PathBuf;

/// Metadata parsed from the header comments of a command script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptMetadata {
    /// Description (@description).
    pub description: Option<String>,
    /// Author (@author).
    pub author: Option<String>,
    /// Enabled flag (@enabled).
    pub enabled: Option<bool>,
}

/// A command script found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    /// Command name (the file stem).
    pub name: String,
    /// Full path to the `.lua` file.
    pub path: PathBuf,
    /// Description from metadata.
    pub description: Option<String>,
    /// Author from metadata.
    pub author: Option<String>,
    /// Whether the command is offered.
    pub enabled: bool,
}

impl CommandScript {
    /// Build a command script from its path and parsed metadata.
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, metadata: ScriptMetadata) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            description: metadata.description,
            author: metadata.author,
            enabled: metadata.enabled.unwrap_or(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_script_defaults_to_enabled() {
        let script = CommandScript::new("echo", "/tmp/echo.lua", ScriptMetadata::default());
        assert!(script.enabled);
        assert!(script.description.is_none());
    }

    #[test]
    fn test_command_script_disabled() {
        let metadata = ScriptMetadata {
            description: Some("Echo".to_string()),
            author: None,
            enabled: Some(false),
        };
        let script = CommandScript::new("echo", "/tmp/echo.lua", metadata);
        assert!(!script.enabled);
        assert_eq!(script.description.as_deref(), Some("Echo"));
    }
}
