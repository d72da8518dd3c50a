//! Slash commands for Yak.
//!
//! Messages whose body starts with the trigger character are answered by a
//! command. Commands come from the built-in table or from an extension
//! catalog (Lua scripts, a remote executor, or an in-process table).

mod builtin;
mod dispatcher;
mod extension;
mod registry;
mod remote;

pub use builtin::{count_vowels, countvowels, defaults, BuiltinCommand, CommandFn};
pub use dispatcher::{
    failed_command_reply, is_error_reply, missing_command_reply, parse_input,
    unknown_command_reply, CommandDispatcher, CommandInput, DEFAULT_EXTENSION_TIMEOUT,
    DEFAULT_TRIGGER,
};
pub use extension::{ExtensionCatalog, ExtensionError, ExtensionFn, TableCatalog};
pub use registry::{CommandRegistry, Resolved};
pub use remote::RemoteCatalog;
