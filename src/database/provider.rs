//! Connection Provider
//!
//! Information Hiding:
//! - Credential validation happens before any driver is touched
//! - Handles are memoized per full parameter set with a fixed expiry
//! - Path resolution for the bundled file hidden from callers

use super::cache::TtlCache;
use super::mysql::MySqlDatabase;
use super::sqlite::SqliteDatabase;
use super::{DataSource, RemoteParams, SqlDatabase};
use crate::config::DatabaseConfig;
use crate::error::ChatError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Duration;

/// Opens database handles; the provider decides when
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_local(&self, path: &Path, table: &str) -> Result<Arc<dyn SqlDatabase>>;

    async fn open_remote(&self, params: &RemoteParams, table: &str)
        -> Result<Arc<dyn SqlDatabase>>;
}

/// Real drivers: rusqlite for the bundled file, sqlx for MySQL
pub struct DriverConnector {
    acquire_timeout: Duration,
}

impl DriverConnector {
    pub fn new(acquire_timeout: Duration) -> Self {
        Self { acquire_timeout }
    }
}

#[async_trait]
impl Connector for DriverConnector {
    async fn open_local(&self, path: &Path, table: &str) -> Result<Arc<dyn SqlDatabase>> {
        let path = path.to_path_buf();
        let table = table.to_string();
        let db = tokio::task::spawn_blocking(move || SqliteDatabase::open_read_only(&path, table))
            .await
            .context("SQLite open task failed")??;
        Ok(Arc::new(db))
    }

    async fn open_remote(
        &self,
        params: &RemoteParams,
        table: &str,
    ) -> Result<Arc<dyn SqlDatabase>> {
        let db = MySqlDatabase::connect(params, table, self.acquire_timeout).await?;
        Ok(Arc::new(db))
    }
}

/// One selection's handle; empty until the first successful open
type Slot = Arc<Mutex<Option<Arc<dyn SqlDatabase>>>>;

/// Hands out table-restricted handles, reusing them until they expire
///
/// The map lock is only held to find or create a slot. Connecting happens
/// under the slot's own lock, so a slow server stalls only requests for the
/// same selection.
pub struct ConnectionProvider {
    connector: Arc<dyn Connector>,
    local_path: PathBuf,
    table: String,
    cache: Mutex<TtlCache<DataSource, Slot>>,
}

impl ConnectionProvider {
    pub fn new(connector: Arc<dyn Connector>, config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            connector,
            local_path: resolve_local_path(&config.local_path)?,
            table: config.table.clone(),
            cache: Mutex::new(TtlCache::new(Duration::from_secs(config.cache_ttl_secs))),
        })
    }

    /// Provider backed by the real drivers
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let connector = DriverConnector::new(Duration::from_secs(config.acquire_timeout_secs));
        Self::new(Arc::new(connector), config)
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Validate the selection and return a live handle for it
    ///
    /// Incomplete remote parameters fail with `ChatError::Configuration`
    /// without reaching the connector.
    pub async fn obtain(&self, source: &DataSource) -> Result<Arc<dyn SqlDatabase>, ChatError> {
        if let DataSource::Remote(params) = source {
            let missing = params.missing_fields();
            if !missing.is_empty() {
                tracing::warn!(
                    "[ConnectionProvider] Rejecting MySQL selection, missing: {}",
                    missing.join(", ")
                );
                return Err(ChatError::Configuration(format!(
                    "Please provide all MySQL connection details (missing: {}).",
                    missing.join(", ")
                )));
            }
        }

        let slot = self.slot(source).await;
        let mut handle = slot.lock().await;
        if let Some(db) = handle.as_ref() {
            tracing::debug!("[ConnectionProvider] Reusing handle for {}", source);
            return Ok(db.clone());
        }

        tracing::info!("[ConnectionProvider] Opening handle for {}", source);
        let db = match source {
            DataSource::Local => self.connector.open_local(&self.local_path, &self.table).await,
            DataSource::Remote(params) => self.connector.open_remote(params, &self.table).await,
        }
        .map_err(ChatError::Connection)?;

        *handle = Some(db.clone());
        Ok(db)
    }

    /// Live slot for `source`, sweeping expired selections first
    async fn slot(&self, source: &DataSource) -> Slot {
        let mut cache = self.cache.lock().await;
        let purged = cache.purge_expired();
        if purged > 0 {
            tracing::debug!(
                "[ConnectionProvider] Released {} expired handle(s), {} still cached",
                purged,
                cache.len()
            );
        }

        match cache.get(source) {
            Some(slot) => slot,
            None => {
                let slot = Slot::default();
                cache.insert(source.clone(), slot.clone());
                slot
            }
        }
    }

    /// Forget a cached handle so the next `obtain` reconnects
    pub async fn invalidate(&self, source: &DataSource) {
        self.cache.lock().await.remove(source);
    }
}

/// Relative paths are taken from the directory holding the executable
fn resolve_local_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let exe = std::env::current_exe().context("Cannot locate the running executable")?;
    let dir = exe
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Executable {:?} has no parent directory", exe))?;
    Ok(dir.join(path))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::database::sqlite::tests::seed_inventory;
    use crate::database::{Dialect, QueryOutput};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    pub(crate) struct StubDatabase;

    #[async_trait]
    impl SqlDatabase for StubDatabase {
        fn dialect(&self) -> Dialect {
            Dialect::Mysql
        }

        fn usable_tables(&self) -> Vec<String> {
            vec!["Inventory".to_string()]
        }

        async fn table_info(&self, _tables: &[String]) -> Result<String> {
            Ok("CREATE TABLE Inventory (id INT)".to_string())
        }

        async fn run(&self, _sql: &str, _max_rows: usize) -> Result<QueryOutput> {
            Ok(QueryOutput::default())
        }
    }

    /// Counts opens; remote opens succeed with a stub, local opens use the real driver
    #[derive(Default)]
    pub(crate) struct CountingConnector {
        pub local_opens: AtomicUsize,
        pub remote_opens: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn open_local(&self, path: &Path, table: &str) -> Result<Arc<dyn SqlDatabase>> {
            self.local_opens.fetch_add(1, Ordering::SeqCst);
            DriverConnector::new(Duration::from_secs(1)).open_local(path, table).await
        }

        async fn open_remote(
            &self,
            _params: &RemoteParams,
            _table: &str,
        ) -> Result<Arc<dyn SqlDatabase>> {
            self.remote_opens.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubDatabase))
        }
    }

    pub(crate) fn config_for(path: PathBuf) -> DatabaseConfig {
        DatabaseConfig {
            local_path: path,
            table: "Inventory".to_string(),
            cache_ttl_secs: 7200,
            acquire_timeout_secs: 1,
        }
    }

    fn remote(password: &str) -> DataSource {
        DataSource::Remote(RemoteParams {
            host: "db.internal".to_string(),
            user: "reader".to_string(),
            password: password.to_string(),
            database: "shop".to_string(),
        })
    }

    #[tokio::test]
    async fn test_incomplete_remote_never_connects() {
        let connector = Arc::new(CountingConnector::default());
        let provider =
            ConnectionProvider::new(connector.clone(), &config_for("/nonexistent.db".into()))
                .unwrap();

        let blanks = [
            RemoteParams { host: String::new(), ..remote_params() },
            RemoteParams { user: String::new(), ..remote_params() },
            RemoteParams { password: String::new(), ..remote_params() },
            RemoteParams { database: "   ".to_string(), ..remote_params() },
        ];
        for params in blanks {
            let err = provider.obtain(&DataSource::Remote(params)).await.err().unwrap();
            assert!(err.is_configuration(), "unexpected error {}", err);
        }

        assert_eq!(connector.remote_opens.load(Ordering::SeqCst), 0);
        assert_eq!(connector.local_opens.load(Ordering::SeqCst), 0);
    }

    fn remote_params() -> RemoteParams {
        match remote("secret") {
            DataSource::Remote(params) => params,
            DataSource::Local => unreachable!(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_handles_are_reused_until_expiry() {
        let connector = Arc::new(CountingConnector::default());
        let provider =
            ConnectionProvider::new(connector.clone(), &config_for("/nonexistent.db".into()))
                .unwrap();

        let first = provider.obtain(&remote("secret")).await.unwrap();
        tokio::time::advance(Duration::from_secs(7199)).await;
        let second = provider.obtain(&remote("secret")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.remote_opens.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        let third = provider.obtain(&remote("secret")).await.unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(connector.remote_opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_keyed_by_full_parameters() {
        let connector = Arc::new(CountingConnector::default());
        let provider =
            ConnectionProvider::new(connector.clone(), &config_for("/nonexistent.db".into()))
                .unwrap();

        let a = provider.obtain(&remote("secret")).await.unwrap();
        let b = provider.obtain(&remote("rotated")).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(connector.remote_opens.load(Ordering::SeqCst), 2);

        provider.invalidate(&remote("secret")).await;
        provider.obtain(&remote("secret")).await.unwrap();
        assert_eq!(connector.remote_opens.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_handles_are_released_after_rotation() {
        let connector = Arc::new(CountingConnector::default());
        let provider =
            ConnectionProvider::new(connector.clone(), &config_for("/nonexistent.db".into()))
                .unwrap();

        let old = provider.obtain(&remote("old-password")).await.unwrap();
        let old_weak = Arc::downgrade(&old);
        drop(old);

        tokio::time::advance(Duration::from_secs(3 * 7200)).await;
        let _current = provider.obtain(&remote("rotated")).await.unwrap();

        assert!(old_weak.upgrade().is_none());
        assert_eq!(provider.cache.lock().await.len(), 1);
    }

    /// Local opens are instant; remote opens hang for 30s and then fail
    struct UnreachableRemote;

    #[async_trait]
    impl Connector for UnreachableRemote {
        async fn open_local(&self, _path: &Path, _table: &str) -> Result<Arc<dyn SqlDatabase>> {
            Ok(Arc::new(StubDatabase))
        }

        async fn open_remote(
            &self,
            params: &RemoteParams,
            _table: &str,
        ) -> Result<Arc<dyn SqlDatabase>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Err(anyhow::anyhow!("pool timed out connecting to {}", params))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_remote_does_not_stall_other_sources() {
        let provider = Arc::new(
            ConnectionProvider::new(
                Arc::new(UnreachableRemote),
                &config_for("/nonexistent.db".into()),
            )
            .unwrap(),
        );
        let local = provider.obtain(&DataSource::Local).await.unwrap();

        let connecting = tokio::spawn({
            let provider = provider.clone();
            async move { provider.obtain(&remote("secret")).await.err() }
        });
        tokio::task::yield_now().await;

        let started = tokio::time::Instant::now();
        let again = provider.obtain(&DataSource::Local).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(Arc::ptr_eq(&local, &again));

        let err = connecting.await.unwrap().unwrap();
        assert!(matches!(err, ChatError::Connection(_)));
    }

    #[tokio::test]
    async fn test_local_handle_is_read_only() {
        let dir = TempDir::new().unwrap();
        let path = seed_inventory(&dir);
        let connector = Arc::new(CountingConnector::default());
        let provider = ConnectionProvider::new(connector.clone(), &config_for(path)).unwrap();

        let db = provider.obtain(&DataSource::Local).await.unwrap();
        assert_eq!(db.dialect(), Dialect::Sqlite);
        assert!(db.run("DELETE FROM Inventory", 10).await.is_err());

        let again = provider.obtain(&DataSource::Local).await.unwrap();
        assert!(Arc::ptr_eq(&db, &again));
        assert_eq!(connector.local_opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_local_file_is_connection_error() {
        let dir = TempDir::new().unwrap();
        let provider =
            ConnectionProvider::from_config(&config_for(dir.path().join("inventory.db"))).unwrap();

        let err = provider.obtain(&DataSource::Local).await.err().unwrap();
        assert!(matches!(err, ChatError::Connection(_)));
    }

    #[test]
    fn test_relative_path_resolves_next_to_executable() {
        let resolved = resolve_local_path(Path::new("inventory.db")).unwrap();
        let exe_dir = std::env::current_exe().unwrap().parent().unwrap().to_path_buf();
        assert_eq!(resolved, exe_dir.join("inventory.db"));

        let absolute = resolve_local_path(Path::new("/data/inventory.db")).unwrap();
        assert_eq!(absolute, PathBuf::from("/data/inventory.db"));
    }
}
