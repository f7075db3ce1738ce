//! Monitored tables
//!
//! [`AuditedTable`] is the write-through facade every business mutation on a
//! monitored entity goes through. Each batch runs in one transaction:
//!
//! 1. snapshot the affected rows (update / delete)
//! 2. perform the write through the [`EntityStore`]
//! 3. run the post-write [`WriteHook`]s on the affected keys
//! 4. re-read the rows and hand old/new snapshots to [`ChangeCapture`]
//! 5. commit

use crate::capture::ChangeCapture;
use crate::error::{BusinessError, BusinessResult};
use anyhow::Context;
use async_trait::async_trait;
use recaudit_core::{Attribution, Customer, EntityDescriptor, MatrixRecord, OperationType, Tracked};
use recaudit_persistence::{CustomerRepo, MatrixRepo, PersistenceError};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Storage access for one monitored entity
#[async_trait]
pub trait EntityStore: Send + Sync {
    type Record: Tracked + Clone + Send + Sync;

    fn descriptor(&self) -> &EntityDescriptor;

    /// Insert and return the record with its store-assigned key
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        record: &Self::Record,
    ) -> BusinessResult<Self::Record>;

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> BusinessResult<Option<Self::Record>>;

    async fn update(&self, conn: &mut SqliteConnection, record: &Self::Record)
        -> BusinessResult<()>;

    async fn delete(&self, conn: &mut SqliteConnection, key: &str) -> BusinessResult<()>;
}

/// Post-write hook, run on the same connection before capture
#[async_trait]
pub trait WriteHook: Send + Sync {
    /// Hook name for logging
    fn name(&self) -> &str;

    /// Called with the keys affected by an INSERT or UPDATE batch
    async fn after_write(
        &self,
        conn: &mut SqliteConnection,
        operation: OperationType,
        keys: &[String],
    ) -> BusinessResult<()>;
}

pub struct AuditedTable<S: EntityStore> {
    pool: SqlitePool,
    store: S,
    capture: ChangeCapture,
    hooks: Vec<Arc<dyn WriteHook>>,
}

impl<S: EntityStore> AuditedTable<S> {
    pub fn new(pool: SqlitePool, store: S, capture: ChangeCapture) -> Self {
        Self {
            pool,
            store,
            capture,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn WriteHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn descriptor(&self) -> &EntityDescriptor {
        self.store.descriptor()
    }

    pub async fn get(&self, key: &str) -> BusinessResult<Option<S::Record>> {
        let mut conn = self.pool.acquire().await?;
        self.store.fetch(&mut conn, key).await
    }

    /// Insert a batch; returns the stored rows as seen after the hooks ran.
    pub async fn insert_batch(
        &self,
        attribution: &Attribution,
        records: Vec<S::Record>,
    ) -> BusinessResult<Vec<S::Record>> {
        let mut tx = self.pool.begin().await?;

        let mut keys = Vec::with_capacity(records.len());
        for record in &records {
            let stored = self.store.insert(&mut *tx, record).await?;
            keys.push(stored.record_key());
        }

        self.run_hooks(&mut *tx, OperationType::Insert, &keys).await?;
        let inserted = self.snapshot(&mut *tx, &keys).await?;

        self.capture
            .capture_insert(&mut *tx, attribution, self.descriptor(), &inserted)
            .await?;

        tx.commit().await?;
        Ok(inserted)
    }

    /// Update a batch of existing rows, matched by key.
    pub async fn update_batch(
        &self,
        attribution: &Attribution,
        records: Vec<S::Record>,
    ) -> BusinessResult<Vec<S::Record>> {
        let keys = self.distinct_keys(records.iter().map(Tracked::record_key))?;
        let mut tx = self.pool.begin().await?;

        let before = self.snapshot(&mut *tx, &keys).await?;

        for record in &records {
            self.store.update(&mut *tx, record).await?;
        }

        self.run_hooks(&mut *tx, OperationType::Update, &keys).await?;
        let after = self.snapshot(&mut *tx, &keys).await?;

        self.capture
            .capture_update(&mut *tx, attribution, self.descriptor(), &before, &after)
            .await?;

        tx.commit().await?;
        Ok(after)
    }

    /// Delete rows by key; returns the deleted rows.
    pub async fn delete_batch(
        &self,
        attribution: &Attribution,
        keys: &[String],
    ) -> BusinessResult<Vec<S::Record>> {
        let keys = self.distinct_keys(keys.iter().cloned())?;
        let mut tx = self.pool.begin().await?;

        let before = self.snapshot(&mut *tx, &keys).await?;
        for key in &keys {
            self.store.delete(&mut *tx, key).await?;
        }

        self.capture
            .capture_delete(&mut *tx, attribution, self.descriptor(), &before)
            .await?;

        tx.commit().await?;
        Ok(before)
    }

    /// A key may appear once per batch, so every captured row is one affected record.
    fn distinct_keys(&self, keys: impl Iterator<Item = String>) -> BusinessResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut distinct = Vec::new();
        for key in keys {
            if !seen.insert(key.clone()) {
                return Err(
                    BusinessError::invalid_key(&self.descriptor().qualified_name(), &key).into(),
                );
            }
            distinct.push(key);
        }
        Ok(distinct)
    }

    async fn run_hooks(
        &self,
        conn: &mut SqliteConnection,
        operation: OperationType,
        keys: &[String],
    ) -> BusinessResult<()> {
        for hook in &self.hooks {
            debug!(hook = hook.name(), %operation, count = keys.len(), "running write hook");
            hook.after_write(conn, operation, keys)
                .await
                .with_context(|| format!("Write hook {} failed", hook.name()))?;
        }
        Ok(())
    }

    async fn snapshot(
        &self,
        conn: &mut SqliteConnection,
        keys: &[String],
    ) -> BusinessResult<Vec<S::Record>> {
        let mut rows = Vec::with_capacity(keys.len());
        for key in keys {
            let row = self.store.fetch(conn, key).await?.ok_or_else(|| {
                PersistenceError::not_found(&self.descriptor().qualified_name(), key)
            })?;
            rows.push(row);
        }
        Ok(rows)
    }
}

// ============================================================================
// Matrix store
// ============================================================================

/// `Data.Matrix`: only upstream input fields are written here, derived
/// fields belong to the reconciler hook.
pub struct MatrixStore {
    descriptor: EntityDescriptor,
}

impl MatrixStore {
    pub fn new() -> Self {
        Self {
            descriptor: MatrixRecord::descriptor(),
        }
    }

    fn parse_key(&self, key: &str) -> BusinessResult<i64> {
        key.trim()
            .parse()
            .map_err(|_| BusinessError::invalid_key(&self.descriptor.qualified_name(), key).into())
    }
}

impl Default for MatrixStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for MatrixStore {
    type Record = MatrixRecord;

    fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        record: &MatrixRecord,
    ) -> BusinessResult<MatrixRecord> {
        let id = MatrixRepo::insert(conn, record).await?;
        Ok(MatrixRecord {
            id,
            ..record.clone()
        })
    }

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> BusinessResult<Option<MatrixRecord>> {
        let id = self.parse_key(key)?;
        Ok(MatrixRepo::find(conn, id).await?.map(MatrixRecord::from))
    }

    async fn update(&self, conn: &mut SqliteConnection, record: &MatrixRecord) -> BusinessResult<()> {
        MatrixRepo::update_inputs(conn, record).await?;
        Ok(())
    }

    async fn delete(&self, conn: &mut SqliteConnection, key: &str) -> BusinessResult<()> {
        let id = self.parse_key(key)?;
        MatrixRepo::delete(conn, id).await?;
        Ok(())
    }
}

// ============================================================================
// Customer store
// ============================================================================

/// `Data.Customers`
pub struct CustomerStore {
    descriptor: EntityDescriptor,
}

impl CustomerStore {
    pub fn new() -> Self {
        Self::with_descriptor(Customer::descriptor())
    }

    /// Use a descriptor supplied from configuration
    pub fn with_descriptor(descriptor: EntityDescriptor) -> Self {
        Self { descriptor }
    }
}

impl Default for CustomerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityStore for CustomerStore {
    type Record = Customer;

    fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    async fn insert(&self, conn: &mut SqliteConnection, record: &Customer) -> BusinessResult<Customer> {
        if CustomerRepo::find(conn, &record.code).await?.is_some() {
            return Err(BusinessError::CustomerExists(record.code.clone()).into());
        }
        CustomerRepo::insert(conn, record).await?;
        Ok(record.clone())
    }

    async fn fetch(
        &self,
        conn: &mut SqliteConnection,
        key: &str,
    ) -> BusinessResult<Option<Customer>> {
        Ok(CustomerRepo::find(conn, key).await?)
    }

    async fn update(&self, conn: &mut SqliteConnection, record: &Customer) -> BusinessResult<()> {
        CustomerRepo::update(conn, record).await.map_err(|e| map_missing(e, &record.code))
    }

    async fn delete(&self, conn: &mut SqliteConnection, key: &str) -> BusinessResult<()> {
        CustomerRepo::delete(conn, key).await.map_err(|e| map_missing(e, key))
    }
}

fn map_missing(err: PersistenceError, code: &str) -> anyhow::Error {
    if err.is_not_found() {
        BusinessError::CustomerNotFound(code.to_string()).into()
    } else {
        BusinessError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureMode;
    use crate::recorder::AuditRecorder;
    use recaudit_persistence::{init_memory_database, OperationLogRepo};

    struct CountingHook {
        calls: std::sync::Mutex<Vec<(OperationType, usize)>>,
    }

    #[async_trait]
    impl WriteHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        async fn after_write(
            &self,
            _conn: &mut SqliteConnection,
            operation: OperationType,
            keys: &[String],
        ) -> BusinessResult<()> {
            self.calls.lock().unwrap().push((operation, keys.len()));
            Ok(())
        }
    }

    fn capture() -> ChangeCapture {
        ChangeCapture::new(AuditRecorder::default(), CaptureMode::BestEffort)
    }

    #[tokio::test]
    async fn test_hooks_see_affected_keys_only() {
        let pool = init_memory_database().await.unwrap();
        let hook = Arc::new(CountingHook {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let table = AuditedTable::new(pool, CustomerStore::new(), capture()).with_hook(hook.clone());

        let attribution = Attribution::system();
        table
            .insert_batch(
                &attribution,
                vec![Customer::new("C1", "One"), Customer::new("C2", "Two")],
            )
            .await
            .unwrap();
        table
            .update_batch(&attribution, vec![Customer::new("C1", "Uno")])
            .await
            .unwrap();
        table.delete_batch(&attribution, &["C2".to_string()]).await.unwrap();

        let calls = hook.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(OperationType::Insert, 2), (OperationType::Update, 1)]);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_fails_without_entry() {
        let pool = init_memory_database().await.unwrap();
        let table = AuditedTable::new(pool.clone(), CustomerStore::new(), capture());

        let result = table
            .update_batch(&Attribution::system(), vec![Customer::new("NOPE", "Missing")])
            .await;
        assert!(result.is_err());

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_repeated_key_in_batch_is_rejected() {
        let pool = init_memory_database().await.unwrap();
        let table = AuditedTable::new(pool.clone(), CustomerStore::new(), capture());
        let attribution = Attribution::system();
        table
            .insert_batch(&attribution, vec![Customer::new("C1", "One")])
            .await
            .unwrap();

        let err = table
            .update_batch(
                &attribution,
                vec![Customer::new("C1", "A"), Customer::new("C1", "B")],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BusinessError>(),
            Some(BusinessError::InvalidKey { key, .. }) if key == "C1"
        ));

        let err = table
            .delete_batch(&attribution, &["C1".to_string(), "C1".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BusinessError>(),
            Some(BusinessError::InvalidKey { .. })
        ));

        // Neither batch touched the row or the ledger
        let stored = table.get("C1").await.unwrap().unwrap();
        assert_eq!(stored.company_name, "One");
        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(OperationLogRepo::count(&mut conn).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_matrix_store_rejects_non_numeric_key() {
        let pool = init_memory_database().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();

        let err = MatrixStore::new().fetch(&mut conn, "abc").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BusinessError>(),
            Some(BusinessError::InvalidKey { .. })
        ));
    }
}
