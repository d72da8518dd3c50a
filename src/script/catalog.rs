//! Extension catalog backed by Lua command scripts.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::engine::{ScriptEngine, ScriptLimits};
use super::loader::ScriptLoader;
use crate::chat::Message;
use crate::command::{ExtensionCatalog, ExtensionError};
use crate::YakError;

/// Serves commands from `<scripts_dir>/<extension_point>/*.lua`.
///
/// Every invocation reads the script afresh and runs it in a new sandboxed
/// interpreter on the blocking pool.
#[derive(Debug, Clone)]
pub struct LuaCatalog {
    loader: ScriptLoader,
    extension_point: String,
    limits: ScriptLimits,
}

impl LuaCatalog {
    /// Create a catalog over a scripts directory.
    pub fn new<P: AsRef<Path>>(scripts_dir: P, extension_point: &str, limits: ScriptLimits) -> Self {
        Self {
            loader: ScriptLoader::new(scripts_dir),
            extension_point: extension_point.to_string(),
            limits,
        }
    }
}

fn script_failure(e: YakError) -> ExtensionError {
    match e {
        YakError::Validation(msg) => ExtensionError::InvalidReply(msg),
        other => ExtensionError::Script(other.to_string()),
    }
}

fn run_script(
    loader: &ScriptLoader,
    extension_point: &str,
    name: &str,
    limits: ScriptLimits,
    message: &Message,
) -> Result<Option<Message>, ExtensionError> {
    let Some(path) = loader.find(extension_point, name) else {
        return Ok(None);
    };

    let source = fs::read_to_string(&path)
        .map_err(|e| ExtensionError::Script(format!("failed to read {}: {e}", path.display())))?;

    if ScriptLoader::parse_metadata(&source).enabled == Some(false) {
        debug!(command = %name, "Script disabled");
        return Ok(None);
    }

    let engine = ScriptEngine::with_limits(limits).map_err(script_failure)?;
    engine
        .run_command(name, &source, message)
        .map_err(script_failure)
}

#[async_trait]
impl ExtensionCatalog for LuaCatalog {
    fn extension_point(&self) -> &str {
        &self.extension_point
    }

    async fn list(&self) -> Result<Vec<String>, ExtensionError> {
        let loader = self.loader.clone();
        let point = self.extension_point.clone();

        let scripts = tokio::task::spawn_blocking(move || loader.scan(&point))
            .await
            .map_err(|e| ExtensionError::Script(format!("script scan task failed: {e}")))?
            .map_err(|e| ExtensionError::Script(e.to_string()))?;

        let names: BTreeSet<String> = scripts
            .into_iter()
            .filter(|script| script.enabled)
            .map(|script| script.name)
            .collect();
        Ok(names.into_iter().collect())
    }

    async fn invoke(
        &self,
        name: &str,
        message: Message,
    ) -> Result<Option<Message>, ExtensionError> {
        let loader = self.loader.clone();
        let point = self.extension_point.clone();
        let command = name.to_string();
        let limits = self.limits.clone();

        let result = tokio::task::spawn_blocking(move || {
            run_script(&loader, &point, &command, limits, &message)
        })
        .await
        .map_err(|e| ExtensionError::Script(format!("script task failed: {e}")))?;

        if let Err(e) = &result {
            warn!(command = %name, error = %e, "Lua command failed");
        }
        result
    }
}
