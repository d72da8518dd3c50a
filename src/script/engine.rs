//! Lua script engine with sandboxing.
//!
//! A command script defines a global `run(message)` function. It receives the
//! message as a table `{nick, body, type}` and returns a reply table, a plain
//! string (sent as text), or `nil` when it has nothing to say.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{Function, HookTriggers, Lua, LuaSerdeExt, Value, Variadic, VmState};

use crate::chat::Message;
use crate::config::ExtensionsConfig;
use crate::{Result, YakError};

/// Instructions between limit checks.
const HOOK_INTERVAL: u32 = 10_000;

/// Name of the entry point every command script defines.
pub const ENTRY_POINT: &str = "run";

/// Resource limits for a single script invocation.
#[derive(Debug, Clone)]
pub struct ScriptLimits {
    /// Maximum number of instructions (0 = unlimited).
    pub max_instructions: u64,
    /// Maximum memory in bytes (0 = unlimited).
    pub max_memory: usize,
    /// Wall-clock limit (zero = unlimited).
    pub timeout: Duration,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_instructions: 1_000_000,
            max_memory: 10 * 1024 * 1024, // 10MB
            timeout: Duration::from_secs(5),
        }
    }
}

impl ScriptLimits {
    /// Limits from the extension configuration.
    pub fn from_config(config: &ExtensionsConfig) -> Self {
        Self {
            max_instructions: config.max_instructions,
            max_memory: config.max_memory_mb.saturating_mul(1024 * 1024),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Render `print` arguments the way stock Lua does: `tostring` each, tab-separated.
fn print_line(lua: &Lua, args: Variadic<Value>) -> mlua::Result<String> {
    let tostring: Function = lua.globals().get("tostring")?;
    let parts = args
        .into_iter()
        .map(|value| tostring.call::<String>(value))
        .collect::<mlua::Result<Vec<_>>>()?;
    Ok(parts.join("\t"))
}

/// Sandboxed Lua interpreter for one command invocation.
pub struct ScriptEngine {
    lua: Lua,
    instruction_count: Arc<AtomicU64>,
    limits: ScriptLimits,
}

impl ScriptEngine {
    /// Create a new ScriptEngine with default resource limits.
    pub fn new() -> Result<Self> {
        Self::with_limits(ScriptLimits::default())
    }

    /// Create a new ScriptEngine with custom resource limits.
    pub fn with_limits(limits: ScriptLimits) -> Result<Self> {
        let lua = Lua::new();

        Self::apply_sandbox(&lua)?;

        if limits.max_memory > 0 {
            lua.set_memory_limit(limits.max_memory)
                .map_err(|e| YakError::Script(format!("failed to set memory limit: {e}")))?;
        }

        Ok(Self {
            lua,
            instruction_count: Arc::new(AtomicU64::new(0)),
            limits,
        })
    }

    /// Remove globals that reach outside the sandbox.
    fn apply_sandbox(lua: &Lua) -> Result<()> {
        const BLOCKED: &[&str] = &[
            "os",
            "io",
            "loadfile",
            "dofile",
            "load",
            "require",
            "package",
            "debug",
            "collectgarbage",
        ];

        let globals = lua.globals();
        for name in BLOCKED {
            globals
                .set(*name, Value::Nil)
                .map_err(|e| YakError::Script(format!("failed to disable {name}: {e}")))?;
        }

        // `print` goes to the log instead of the server's stdout.
        lua.create_function(|lua, args: Variadic<Value>| {
            let line = print_line(lua, args)?;
            tracing::debug!(target: "yak::script", "{}", line);
            Ok(())
        })
        .and_then(|print| globals.set("print", print))
        .map_err(|e| YakError::Script(format!("failed to install print: {e}")))?;

        Ok(())
    }

    /// Install the hook that enforces the instruction and time limits.
    fn install_hook(&self) {
        self.instruction_count.store(0, Ordering::SeqCst);

        if self.limits.max_instructions == 0 && self.limits.timeout.is_zero() {
            return;
        }

        let count = Arc::clone(&self.instruction_count);
        let max_instructions = self.limits.max_instructions;
        let deadline = (!self.limits.timeout.is_zero()).then(|| Instant::now() + self.limits.timeout);

        self.lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
            move |_lua, _debug| {
                let current =
                    count.fetch_add(HOOK_INTERVAL as u64, Ordering::SeqCst) + HOOK_INTERVAL as u64;
                if max_instructions > 0 && current > max_instructions {
                    return Err(mlua::Error::RuntimeError(
                        "script exceeded instruction limit".to_string(),
                    ));
                }
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(mlua::Error::RuntimeError(
                        "script exceeded time limit".to_string(),
                    ));
                }
                Ok(VmState::Continue)
            },
        );
    }

    /// Load a command script and call its `run` function with `message`.
    ///
    /// Returns `Ok(None)` when the script returns `nil`. Lua failures map to
    /// `YakError::Script`; a return value that is not a message maps to
    /// `YakError::Validation`.
    pub fn run_command(&self, chunk_name: &str, source: &str, message: &Message) -> Result<Option<Message>> {
        self.install_hook();
        let result = self.call_entry_point(chunk_name, source, message);
        self.lua.remove_hook();
        result
    }

    fn call_entry_point(&self, chunk_name: &str, source: &str, message: &Message) -> Result<Option<Message>> {
        self.lua
            .load(source)
            .set_name(chunk_name)
            .exec()
            .map_err(|e| YakError::Script(e.to_string()))?;

        let entry: Value = self
            .lua
            .globals()
            .get(ENTRY_POINT)
            .map_err(|e| YakError::Script(e.to_string()))?;
        let Value::Function(run) = entry else {
            return Err(YakError::Script(format!(
                "{chunk_name} does not define a {ENTRY_POINT} function"
            )));
        };

        let argument = self
            .lua
            .to_value(message)
            .map_err(|e| YakError::Script(format!("failed to convert message: {e}")))?;

        let reply: Value = run
            .call(argument)
            .map_err(|e| YakError::Script(e.to_string()))?;

        match reply {
            Value::Nil => Ok(None),
            Value::String(text) => {
                let body = text
                    .to_str()
                    .map_err(|e| YakError::Validation(format!("reply is not UTF-8: {e}")))?
                    .to_string();
                Ok(Some(Message::new(message.nick.clone(), body)))
            }
            Value::Table(table) => self
                .lua
                .from_value::<Message>(Value::Table(table))
                .map(Some)
                .map_err(|e| YakError::Validation(format!("reply is not a message: {e}"))),
            other => Err(YakError::Validation(format!(
                "reply must be a table, string or nil, got {}",
                other.type_name()
            ))),
        }
    }

    /// Execute Lua source code without calling an entry point.
    pub fn execute(&self, source: &str) -> Result<()> {
        self.install_hook();
        let result = self
            .lua
            .load(source)
            .exec()
            .map_err(|e| YakError::Script(e.to_string()));
        self.lua.remove_hook();
        result
    }

    /// Get a global value from the Lua environment.
    pub fn get_global<V: mlua::FromLua>(&self, name: &str) -> Result<V> {
        self.lua
            .globals()
            .get(name)
            .map_err(|e| YakError::Script(format!("failed to get global '{name}': {e}")))
    }

    /// Instructions counted during the last run (in hook-interval steps).
    pub fn instruction_count(&self) -> u64 {
        self.instruction_count.load(Ordering::SeqCst)
    }

    /// Get the resource limits.
    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }
}
