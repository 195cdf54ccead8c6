//! In-memory store catalog.
//!
//! Holds every store and the status of each of its tables. The catalog is
//! both the [`ChannelCatalog`] (store IDs are channel IDs) and the
//! [`SnapshotSource`] the registry's producers read from.

use crate::config::CatalogConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use storecast_core::{ChannelCatalog, ChannelId, SnapshotSource, SourceError};
use storecast_protocol::payload::encode_snapshot;
use storecast_protocol::{InvalidStatus, TableSnapshot, TableStatus};
use thiserror::Error;
use tracing::{debug, info};

/// Store identifier, shared with the channel it broadcasts on.
pub type StoreId = ChannelId;

/// Table number within a store.
pub type TableNo = u32;

/// Catalog errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No store with this ID.
    #[error("Store not found: {0}")]
    StoreNotFound(StoreId),

    /// The store has no table with this number.
    #[error("Table {table} not found in store {store}")]
    TableNotFound {
        /// Store that was searched.
        store: StoreId,
        /// Missing table number.
        table: TableNo,
    },

    /// The requested status is not a known value.
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),

    /// The snapshot could not be serialized.
    #[error("Snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A store and its tables.
#[derive(Debug)]
pub struct Store {
    id: StoreId,
    name: String,
    tables: DashMap<TableNo, TableStatus>,
}

/// Listing entry for a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    /// Store ID.
    pub id: StoreId,
    /// Display name.
    pub name: String,
}

impl Store {
    /// Create a store with `table_count` available tables.
    #[must_use]
    pub fn new(id: StoreId, name: impl Into<String>, table_count: TableNo) -> Self {
        let tables = DashMap::new();
        for table_no in 1..=table_count {
            tables.insert(table_no, TableStatus::default());
        }
        Self {
            id,
            name: name.into(),
            tables,
        }
    }

    /// Current status of every table, ordered by table number.
    #[must_use]
    pub fn tables(&self) -> Vec<TableSnapshot> {
        let mut tables: Vec<_> = self
            .tables
            .iter()
            .map(|entry| TableSnapshot {
                table_no: *entry.key(),
                status: *entry.value(),
            })
            .collect();
        tables.sort_unstable_by_key(|t| t.table_no);
        tables
    }

    fn summary(&self) -> StoreSummary {
        StoreSummary {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// All stores known to the server.
#[derive(Debug, Default)]
pub struct StoreCatalog {
    stores: BTreeMap<StoreId, Store>,
}

impl StoreCatalog {
    /// Build the catalog: stores `1..=config.stores`, each named `Store {id}`.
    #[must_use]
    pub fn new(config: &CatalogConfig) -> Self {
        let stores = (1..=config.stores)
            .map(|id| (id, Store::new(id, format!("Store {id}"), config.tables_per_store)))
            .collect();
        info!(
            stores = config.stores,
            tables_per_store = config.tables_per_store,
            "Store catalog ready"
        );
        Self { stores }
    }

    /// Look up a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist.
    pub fn store(&self, id: StoreId) -> Result<&Store, CatalogError> {
        self.stores.get(&id).ok_or(CatalogError::StoreNotFound(id))
    }

    /// List every store, ascending by ID.
    #[must_use]
    pub fn stores(&self) -> Vec<StoreSummary> {
        self.stores.values().map(Store::summary).collect()
    }

    /// Current tables of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist.
    pub fn tables(&self, id: StoreId) -> Result<Vec<TableSnapshot>, CatalogError> {
        self.store(id).map(Store::tables)
    }

    /// Encoded snapshot of a store, as carried in event frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the store does not exist or encoding fails.
    pub fn snapshot_payload(&self, id: StoreId) -> Result<String, CatalogError> {
        let tables = self.tables(id)?;
        Ok(encode_snapshot(&tables)?)
    }

    /// Set the status of one table.
    ///
    /// The store is checked first, then the table, then the status value.
    /// Nothing changes unless all three are valid.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first check that failed.
    pub fn update_status(
        &self,
        store_id: StoreId,
        table_no: TableNo,
        status: &str,
    ) -> Result<TableStatus, CatalogError> {
        let store = self.store(store_id)?;
        let mut entry = store
            .tables
            .get_mut(&table_no)
            .ok_or(CatalogError::TableNotFound {
                store: store_id,
                table: table_no,
            })?;
        let status: TableStatus = status.parse()?;
        *entry = status;

        debug!(store = store_id, table = table_no, %status, "Table status updated");
        Ok(status)
    }
}

impl ChannelCatalog for StoreCatalog {
    fn contains(&self, channel: ChannelId) -> bool {
        self.stores.contains_key(&channel)
    }
}

#[async_trait]
impl SnapshotSource for StoreCatalog {
    async fn snapshot(&self, channel: ChannelId) -> Result<String, SourceError> {
        self.snapshot_payload(channel)
            .map_err(|e| SourceError::fetch_failed(channel, e.to_string()))
    }
}
