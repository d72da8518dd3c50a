//! Built-in commands.

use std::sync::Arc;

use crate::chat::Message;

/// Handler type for built-in commands.
///
/// Receives the triggering message with its body replaced by the argument
/// text and returns the reply.
pub type CommandFn = Arc<dyn Fn(Message) -> Message + Send + Sync>;

/// A built-in command.
#[derive(Clone)]
pub struct BuiltinCommand {
    name: String,
    description: String,
    run: CommandFn,
}

impl BuiltinCommand {
    /// Create a new built-in command.
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Message) -> Message + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            run: Arc::new(run),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Get the command name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run the command.
    pub fn run(&self, message: Message) -> Message {
        (self.run)(message)
    }
}

impl std::fmt::Debug for BuiltinCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinCommand")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Count ASCII lowercase vowels.
pub fn count_vowels(text: &str) -> usize {
    text.chars()
        .filter(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        .count()
}

/// `countvowels`: reply with the number of vowels in the arguments.
pub fn countvowels() -> BuiltinCommand {
    BuiltinCommand::new("countvowels", |message: Message| {
        let count = count_vowels(&message.body);
        Message::new(message.nick, format!("countvowels: {count}"))
    })
    .with_description("Count the vowels in the text")
}

/// The default built-in set.
pub fn defaults() -> Vec<BuiltinCommand> {
    vec![countvowels()]
}
