//! Process-wide registry of named tables.
//!
//! The first caller to open a name creates the table; every later caller
//! gets the same instance, whatever configuration it asks for.

use super::TableCache;
use crate::config::TableCacheConfig;
use hashbrown::HashMap;
use log::debug;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

static TABLES: Lazy<Mutex<HashMap<String, Arc<TableCache>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Returns the table registered under `name`, creating it with the default
/// configuration if needed.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// let a = tiercache::open("doc-registry");
/// let b = tiercache::open("doc-registry");
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
pub fn open(name: &str) -> Arc<TableCache> {
    open_with_config(name, TableCacheConfig::default())
}

/// Returns the table registered under `name`, creating it with `config` if
/// needed. An existing table keeps its original configuration.
pub fn open_with_config(name: &str, config: TableCacheConfig) -> Arc<TableCache> {
    let mut tables = TABLES.lock();
    if let Some(table) = tables.get(name) {
        return Arc::clone(table);
    }
    let table = Arc::new(TableCache::new(name, config));
    tables.insert(name.to_owned(), Arc::clone(&table));
    debug!("registered table {name}");
    table
}

/// Returns `true` if a table named `name` was opened.
pub fn contains(name: &str) -> bool {
    TABLES.lock().contains_key(name)
}
