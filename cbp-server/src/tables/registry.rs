use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use cbp_protocol::TableSettings;
use hashbrown::HashMap;
use slog::Logger;
use tokio::sync::RwLock;

use crate::accounts::AccountRegistry;
use crate::tables::table::Table;

/// Process-wide table-id -> Table map. Table id 0 always exists at
/// startup with default settings; subsequent ids are monotonically
/// increasing from 1 (spec §3).
pub struct TableRegistry {
    tables: RwLock<HashMap<u16, Arc<Table>>>,
    next_id: AtomicU16,
    accounts: Arc<AccountRegistry>,
    log: Logger,
}

#[derive(Debug)]
pub enum RemoveError {
    NotFound,
}

impl TableRegistry {
    pub fn new(accounts: Arc<AccountRegistry>, log: Logger) -> TableRegistry {
        let mut tables = HashMap::new();
        tables.insert(
            0,
            Arc::new(Table::new(0, TableSettings::default(), Arc::clone(&accounts), log.clone())),
        );
        TableRegistry {
            tables: RwLock::new(tables),
            next_id: AtomicU16::new(1),
            accounts,
            log,
        }
    }

    pub async fn get(&self, id: u16) -> Option<Arc<Table>> {
        self.tables.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<(u16, String)> {
        self.tables
            .read()
            .await
            .iter()
            .map(|(id, table)| (*id, table.settings.render()))
            .collect()
    }

    /// Allocates an id, inserts the table, then releases the lock
    /// before the caller notifies the client (spec §4.5).
    pub async fn add(&self, settings: TableSettings) -> u16 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let table = Arc::new(Table::new(id, settings, Arc::clone(&self.accounts), self.log.clone()));
        self.tables.write().await.insert(id, table);
        id
    }

    pub async fn remove(&self, id: u16, reason: &str) -> Result<(), RemoveError> {
        let table = self.tables.write().await.remove(&id);
        match table {
            Some(table) => {
                table.shutdown(reason).await;
                Ok(())
            }
            None => Err(RemoveError::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sloggers::Build;

    fn test_logger() -> Logger {
        sloggers::null::NullLoggerBuilder.build().unwrap()
    }

    #[tokio::test]
    async fn table_zero_exists_at_startup() {
        let registry = TableRegistry::new(Arc::new(AccountRegistry::new()), test_logger());
        assert!(registry.get(0).await.is_some());
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let registry = TableRegistry::new(Arc::new(AccountRegistry::new()), test_logger());
        let a = registry.add(TableSettings::default()).await;
        let b = registry.add(TableSettings::default()).await;
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[tokio::test]
    async fn remove_unknown_table_errors() {
        let registry = TableRegistry::new(Arc::new(AccountRegistry::new()), test_logger());
        assert!(matches!(registry.remove(99, "test").await, Err(RemoveError::NotFound)));
    }
}
