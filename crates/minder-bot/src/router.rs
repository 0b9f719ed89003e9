use crate::dispatch::Bot;
use crate::InboundEvent;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by event handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// An event handler. Handlers receive the bot itself so they can reach
/// the registry, the wait table and the transport.
pub type Handler = Arc<dyn Fn(Arc<Bot>, InboundEvent) -> HandlerFuture + Send + Sync>;

/// A registered slash command.
#[derive(Clone)]
pub struct CommandEntry {
    pub keyword: String,
    pub description: String,
    /// Hidden commands dispatch normally but are left out of the help
    /// text and the chat menu.
    pub hidden: bool,
    pub handler: Handler,
}

/// Collects command and button registrations, then freezes them into a
/// [`Router`]. Registration happens once at startup; after `build` the
/// tables never change.
#[derive(Default)]
pub struct RouterBuilder {
    commands: HashMap<String, CommandEntry>,
    buttons: HashMap<String, Handler>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a slash command under `keyword` (no leading `/`).
    /// Registering the same keyword again replaces the earlier entry.
    ///
    /// # Panics
    ///
    /// Panics when `keyword` is not lowercase. Inbound keywords arrive
    /// lowercased, so a mixed-case registration could never match;
    /// failing at startup beats a command that silently never fires.
    pub fn command<H, F>(self, keyword: &str, description: &str, handler: H) -> Self
    where
        H: Fn(Arc<Bot>, InboundEvent) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.register(keyword, description, false, handler)
    }

    /// Like [`RouterBuilder::command`], but the entry is excluded from
    /// the help text and the chat menu.
    ///
    /// # Panics
    ///
    /// Panics when `keyword` is not lowercase.
    pub fn hidden_command<H, F>(self, keyword: &str, description: &str, handler: H) -> Self
    where
        H: Fn(Arc<Bot>, InboundEvent) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        self.register(keyword, description, true, handler)
    }

    fn register<H, F>(mut self, keyword: &str, description: &str, hidden: bool, handler: H) -> Self
    where
        H: Fn(Arc<Bot>, InboundEvent) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        assert!(
            keyword == keyword.to_lowercase(),
            "command keyword must be lowercase: {keyword:?}"
        );
        let handler: Handler = Arc::new(move |bot, event| Box::pin(handler(bot, event)));
        self.commands.insert(
            keyword.to_string(),
            CommandEntry {
                keyword: keyword.to_string(),
                description: description.to_string(),
                hidden,
                handler,
            },
        );
        self
    }

    /// Registers a button callback under its opaque callback data.
    pub fn button<H, F>(mut self, data: &str, handler: H) -> Self
    where
        H: Fn(Arc<Bot>, InboundEvent) -> F + Send + Sync + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |bot, event| Box::pin(handler(bot, event)));
        self.buttons.insert(data.to_string(), handler);
        self
    }

    /// Freezes the tables.
    pub fn build(self) -> Router {
        Router {
            commands: self.commands,
            buttons: self.buttons,
        }
    }
}

/// Immutable dispatch tables. Built once through [`RouterBuilder`],
/// shared read-only for the process lifetime.
pub struct Router {
    commands: HashMap<String, CommandEntry>,
    buttons: HashMap<String, Handler>,
}

impl Router {
    pub fn command(&self, keyword: &str) -> Option<&CommandEntry> {
        self.commands.get(keyword)
    }

    pub fn button(&self, data: &str) -> Option<&Handler> {
        self.buttons.get(data)
    }

    /// Every registered command in keyword order.
    pub fn commands(&self) -> Vec<&CommandEntry> {
        let mut entries: Vec<&CommandEntry> = self.commands.values().collect();
        entries.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        entries
    }

    /// Commands shown in the help text and the chat menu, in keyword
    /// order.
    pub fn visible_commands(&self) -> Vec<&CommandEntry> {
        self.commands()
            .into_iter()
            .filter(|entry| !entry.hidden)
            .collect()
    }
}
