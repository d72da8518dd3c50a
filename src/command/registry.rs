//! Command registry.
//!
//! Resolves a command name to a built-in handler or to the extension
//! catalog. Built-ins always win over an extension with the same name.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::builtin::{self, BuiltinCommand};
use super::extension::{ExtensionCatalog, ExtensionError};
use super::remote::RemoteCatalog;
use crate::config::{ExtensionBackend, ExtensionsConfig};
use crate::script::{LuaCatalog, ScriptLimits};
use crate::Result;

/// Outcome of resolving a command name.
#[derive(Clone)]
pub enum Resolved {
    /// A built-in command.
    Builtin(BuiltinCommand),
    /// A command served by the extension catalog.
    Extension {
        catalog: Arc<dyn ExtensionCatalog>,
        name: String,
    },
}

impl Resolved {
    /// Name of the resolved command.
    pub fn name(&self) -> &str {
        match self {
            Resolved::Builtin(command) => command.name(),
            Resolved::Extension { name, .. } => name,
        }
    }

    /// Check if this resolved to a built-in.
    pub fn is_builtin(&self) -> bool {
        matches!(self, Resolved::Builtin(_))
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Builtin(command) => f.debug_tuple("Builtin").field(&command.name()).finish(),
            Resolved::Extension { catalog, name } => f
                .debug_struct("Extension")
                .field("extension_point", &catalog.extension_point())
                .field("name", name)
                .finish(),
        }
    }
}

struct CachedNames {
    fetched_at: Instant,
    names: Vec<String>,
}

/// Registry of built-in commands plus an optional extension catalog.
pub struct CommandRegistry {
    builtins: HashMap<String, BuiltinCommand>,
    catalog: Option<Arc<dyn ExtensionCatalog>>,
    refresh_interval: Duration,
    cache: Mutex<Option<CachedNames>>,
    /// Held by the caller currently fetching the catalog listing.
    refresh: Mutex<()>,
}

impl CommandRegistry {
    /// Create an empty registry with no extension catalog.
    pub fn new() -> Self {
        Self {
            builtins: HashMap::new(),
            catalog: None,
            refresh_interval: Duration::ZERO,
            cache: Mutex::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Create a registry holding the default built-ins.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for command in builtin::defaults() {
            registry.register(command);
        }
        registry
    }

    /// Build a registry from configuration.
    ///
    /// The extension backend is only constructed when extensions are enabled.
    pub fn from_config(config: &ExtensionsConfig) -> Result<Self> {
        let registry = Self::with_defaults();
        if !config.enabled {
            info!("Extension commands disabled");
            return Ok(registry);
        }

        let refresh = Duration::from_secs(config.refresh_interval_secs);
        let catalog: Arc<dyn ExtensionCatalog> = match config.backend {
            ExtensionBackend::Lua => Arc::new(LuaCatalog::new(
                &config.scripts_dir,
                &config.extension_point,
                ScriptLimits::from_config(config),
            )),
            ExtensionBackend::Remote => Arc::new(RemoteCatalog::new(
                &config.remote_url,
                &config.extension_point,
                Duration::from_secs(config.timeout_secs),
            )?),
        };

        info!(
            backend = ?config.backend,
            extension_point = %config.extension_point,
            "Extension catalog configured"
        );

        Ok(registry.with_catalog(catalog, refresh))
    }

    /// Attach an extension catalog.
    ///
    /// The catalog's name list is cached for `refresh_interval`; a zero
    /// interval queries the catalog on every lookup.
    pub fn with_catalog(mut self, catalog: Arc<dyn ExtensionCatalog>, refresh_interval: Duration) -> Self {
        self.catalog = Some(catalog);
        self.refresh_interval = refresh_interval;
        self
    }

    /// Register a built-in command, replacing any with the same name.
    pub fn register(&mut self, command: BuiltinCommand) {
        debug!(command = %command.name(), "Registered built-in command");
        self.builtins.insert(command.name().to_string(), command);
    }

    /// Check whether a built-in with this name exists.
    pub fn has_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// All known command names, sorted and de-duplicated.
    ///
    /// If the catalog cannot be listed, only the built-ins are returned.
    pub async fn list_names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.builtins.keys().cloned().collect();

        match self.catalog_names().await {
            Ok(extension_names) => names.extend(extension_names),
            Err(e) => warn!(error = %e, "Failed to list extension commands"),
        }

        names.into_iter().collect()
    }

    /// Resolve a command name.
    ///
    /// Returns `Ok(None)` when neither the built-ins nor the catalog know it.
    pub async fn resolve(&self, name: &str) -> std::result::Result<Option<Resolved>, ExtensionError> {
        if let Some(command) = self.builtins.get(name) {
            return Ok(Some(Resolved::Builtin(command.clone())));
        }

        let Some(catalog) = &self.catalog else {
            return Ok(None);
        };

        let names = self.catalog_names().await?;
        if names.iter().any(|n| n == name) {
            Ok(Some(Resolved::Extension {
                catalog: Arc::clone(catalog),
                name: name.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Drop the cached catalog listing.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    /// Catalog names, refreshed at most once at a time.
    ///
    /// The cache lock is never held across the catalog call. While one
    /// caller refreshes, others get the previous listing if there is one.
    async fn catalog_names(&self) -> std::result::Result<Vec<String>, ExtensionError> {
        let Some(catalog) = &self.catalog else {
            return Ok(Vec::new());
        };

        let stale = match self.cached_names().await {
            Ok(fresh) => return Ok(fresh),
            Err(stale) => stale,
        };

        let _refresh = match (self.refresh.try_lock(), stale) {
            (Ok(guard), _) => guard,
            (Err(_), Some(stale)) => {
                debug!("Catalog refresh in progress, serving previous listing");
                return Ok(stale);
            }
            (Err(_), None) => {
                let guard = self.refresh.lock().await;
                // Whoever held the lock may have filled the cache.
                if let Ok(fresh) = self.cached_names().await {
                    return Ok(fresh);
                }
                guard
            }
        };

        let names = catalog.list().await?;
        debug!(
            extension_point = %catalog.extension_point(),
            count = names.len(),
            "Fetched extension command list"
        );
        *self.cache.lock().await = Some(CachedNames {
            fetched_at: Instant::now(),
            names: names.clone(),
        });
        Ok(names)
    }

    /// `Ok` with the cached names while fresh, otherwise `Err` with any
    /// stale copy.
    async fn cached_names(&self) -> std::result::Result<Vec<String>, Option<Vec<String>>> {
        let cache = self.cache.lock().await;
        match cache.as_ref() {
            Some(cached) if cached.fetched_at.elapsed() < self.refresh_interval => {
                Ok(cached.names.clone())
            }
            Some(cached) => Err(Some(cached.names.clone())),
            None => Err(None),
        }
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Message;
    use crate::command::TableCatalog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table() -> TableCatalog {
        TableCatalog::new("slash-commands")
            .with_command("echo", |m: Message| Ok(Some(m)))
            .with_command("countvowels", |_| Ok(Some(Message::bot("from extension"))))
    }

    struct CountingCatalog {
        lists: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ExtensionCatalog for CountingCatalog {
        fn extension_point(&self) -> &str {
            "slash-commands"
        }

        async fn list(&self) -> std::result::Result<Vec<String>, ExtensionError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ExtensionError::Transport("down".to_string()))
            } else {
                Ok(vec!["zeta".to_string(), "alpha".to_string()])
            }
        }

        async fn invoke(
            &self,
            _name: &str,
            _message: Message,
        ) -> std::result::Result<Option<Message>, ExtensionError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_defaults_only() {
        let registry = CommandRegistry::with_defaults();
        assert_eq!(registry.list_names().await, vec!["countvowels"]);
        assert!(registry.resolve("countvowels").await.unwrap().unwrap().is_builtin());
        assert!(registry.resolve("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_names_merges_and_dedups() {
        let registry =
            CommandRegistry::with_defaults().with_catalog(Arc::new(table()), Duration::ZERO);
        assert_eq!(registry.list_names().await, vec!["countvowels", "echo"]);
    }

    #[tokio::test]
    async fn test_builtin_shadows_extension() {
        let registry =
            CommandRegistry::with_defaults().with_catalog(Arc::new(table()), Duration::ZERO);

        let resolved = registry.resolve("countvowels").await.unwrap().unwrap();
        assert!(resolved.is_builtin());

        let resolved = registry.resolve("echo").await.unwrap().unwrap();
        assert!(!resolved.is_builtin());
        assert_eq!(resolved.name(), "echo");
    }

    #[tokio::test]
    async fn test_catalog_failure_degrades_listing() {
        let catalog = Arc::new(CountingCatalog {
            lists: AtomicUsize::new(0),
            fail: true,
        });
        let registry = CommandRegistry::with_defaults().with_catalog(catalog, Duration::ZERO);

        assert_eq!(registry.list_names().await, vec!["countvowels"]);
        assert!(registry.resolve("alpha").await.is_err());
        assert!(registry.resolve("countvowels").await.is_ok());
    }

    #[tokio::test]
    async fn test_listing_is_cached_within_refresh_interval() {
        let catalog = Arc::new(CountingCatalog {
            lists: AtomicUsize::new(0),
            fail: false,
        });
        let registry = CommandRegistry::new()
            .with_catalog(catalog.clone(), Duration::from_secs(60));

        assert_eq!(registry.list_names().await, vec!["alpha", "zeta"]);
        assert!(registry.resolve("alpha").await.unwrap().is_some());
        assert!(registry.resolve("zeta").await.unwrap().is_some());
        assert_eq!(catalog.lists.load(Ordering::SeqCst), 1);

        registry.invalidate().await;
        registry.list_names().await;
        assert_eq!(catalog.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_refresh_interval_always_queries() {
        let catalog = Arc::new(CountingCatalog {
            lists: AtomicUsize::new(0),
            fail: false,
        });
        let registry = CommandRegistry::new().with_catalog(catalog.clone(), Duration::ZERO);

        registry.list_names().await;
        registry.list_names().await;
        assert_eq!(catalog.lists.load(Ordering::SeqCst), 2);
    }

    /// Catalog whose listing blocks after the first call until released.
    struct GatedCatalog {
        lists: AtomicUsize,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl ExtensionCatalog for GatedCatalog {
        fn extension_point(&self) -> &str {
            "slash-commands"
        }

        async fn list(&self) -> std::result::Result<Vec<String>, ExtensionError> {
            if self.lists.fetch_add(1, Ordering::SeqCst) > 0 {
                self.release.notified().await;
                return Ok(vec!["fresh".to_string()]);
            }
            Ok(vec!["stale".to_string()])
        }

        async fn invoke(
            &self,
            _name: &str,
            _message: Message,
        ) -> std::result::Result<Option<Message>, ExtensionError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_slow_refresh_serves_previous_listing() {
        let catalog = Arc::new(GatedCatalog {
            lists: AtomicUsize::new(0),
            release: tokio::sync::Notify::new(),
        });
        let registry = Arc::new(
            CommandRegistry::new().with_catalog(catalog.clone(), Duration::from_millis(1)),
        );

        assert_eq!(registry.list_names().await, vec!["stale"]);
        tokio::time::sleep(Duration::from_millis(5)).await;

        let refreshing = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move { registry.list_names().await })
        };
        while catalog.lists.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        let names = tokio::time::timeout(Duration::from_secs(1), registry.list_names())
            .await
            .expect("listing blocked behind the refresh");
        assert_eq!(names, vec!["stale"]);
        assert!(registry.resolve("stale").await.unwrap().is_some());
        assert_eq!(catalog.lists.load(Ordering::SeqCst), 2);

        catalog.release.notify_one();
        assert_eq!(refreshing.await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_register_replaces() {
        let mut registry = CommandRegistry::with_defaults();
        registry.register(BuiltinCommand::new("countvowels", |_| Message::bot("custom")));

        let Some(Resolved::Builtin(command)) = registry.resolve("countvowels").await.unwrap()
        else {
            panic!("expected built-in");
        };
        assert_eq!(command.run(Message::new("a", "b")).body, "custom");
    }

    #[test]
    fn test_from_config_disabled() {
        let config = ExtensionsConfig {
            enabled: false,
            ..Default::default()
        };
        let registry = CommandRegistry::from_config(&config).unwrap();
        assert!(registry.catalog.is_none());
        assert!(registry.has_builtin("countvowels"));
    }
}
