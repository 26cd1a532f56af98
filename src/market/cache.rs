//! # Model cache
//!
//! Time-limited, explicitly passed cache of built market models keyed by the
//! query, the asset universe and the builder parameters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

/// Cache key; `assets` are kept sorted so equal universes hash equally.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
  pub query: String,
  pub assets: Vec<String>,
  pub params: String,
}

impl CacheKey {
  pub fn new<I, S>(query: impl Into<String>, assets: I, params: impl Into<String>) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let mut assets: Vec<String> = assets.into_iter().map(Into::into).collect();
    assets.sort();
    assets.dedup();
    Self {
      query: query.into(),
      assets,
      params: params.into(),
    }
  }
}

/// Read-mostly cache shared between concurrent pipelines.
#[derive(Debug)]
pub struct ModelCache<T> {
  ttl: Duration,
  entries: RwLock<HashMap<CacheKey, (Arc<T>, Instant)>>,
}

impl<T> ModelCache<T> {
  pub fn new(ttl: Duration) -> Self {
    Self {
      ttl,
      entries: RwLock::new(HashMap::new()),
    }
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  /// Fresh entry for `key`, if any.
  pub fn get(&self, key: &CacheKey) -> Option<Arc<T>> {
    let entries = self.entries.read();
    entries
      .get(key)
      .filter(|(_, built_at)| built_at.elapsed() < self.ttl)
      .map(|(value, _)| Arc::clone(value))
  }

  pub fn insert(&self, key: CacheKey, value: T) -> Arc<T> {
    let value = Arc::new(value);
    self
      .entries
      .write()
      .insert(key, (Arc::clone(&value), Instant::now()));
    value
  }

  /// Return the cached value or build, store and return a new one.
  ///
  /// Build errors are returned unchanged and nothing is stored.
  pub fn get_or_try_insert_with<E, F>(&self, key: CacheKey, build: F) -> Result<Arc<T>, E>
  where
    F: FnOnce() -> Result<T, E>,
  {
    if let Some(hit) = self.get(&key) {
      debug!(query = %key.query, "model cache hit");
      return Ok(hit);
    }
    debug!(query = %key.query, "model cache miss");
    let value = build()?;
    Ok(self.insert(key, value))
  }

  pub fn invalidate(&self, key: &CacheKey) -> bool {
    self.entries.write().remove(key).is_some()
  }

  /// Drop every entry built for `query`; returns the number removed.
  pub fn invalidate_query(&self, query: &str) -> usize {
    let mut entries = self.entries.write();
    let before = entries.len();
    entries.retain(|k, _| k.query != query);
    before - entries.len()
  }

  pub fn clear(&self) {
    self.entries.write().clear();
  }

  /// Remove expired entries; returns the number removed.
  pub fn purge_expired(&self) -> usize {
    let mut entries = self.entries.write();
    let before = entries.len();
    entries.retain(|_, (_, built_at)| built_at.elapsed() < self.ttl);
    before - entries.len()
  }

  pub fn len(&self) -> usize {
    self.entries.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.read().is_empty()
  }
}

#[cfg(test)]
mod tests {
  use std::cell::Cell;

  use super::*;

  #[test]
  fn key_ignores_asset_order() {
    let a = CacheKey::new("q", ["B", "A"], "p");
    let b = CacheKey::new("q", ["A", "B"], "p");
    assert_eq!(a, b);
  }

  #[test]
  fn builds_once_then_hits() {
    let cache = ModelCache::new(Duration::from_secs(60));
    let calls = Cell::new(0);
    let key = CacheKey::new("q", ["A"], "p");
    for _ in 0..3 {
      let v = cache
        .get_or_try_insert_with::<(), _>(key.clone(), || {
          calls.set(calls.get() + 1);
          Ok(42)
        })
        .unwrap();
      assert_eq!(*v, 42);
    }
    assert_eq!(calls.get(), 1);
  }

  #[test]
  fn errors_are_not_cached() {
    let cache: ModelCache<i32> = ModelCache::new(Duration::from_secs(60));
    let key = CacheKey::new("q", ["A"], "p");
    assert!(cache.get_or_try_insert_with(key.clone(), || Err("boom")).is_err());
    assert!(cache.is_empty());
  }

  #[test]
  fn zero_ttl_expires_immediately() {
    let cache = ModelCache::new(Duration::ZERO);
    let key = CacheKey::new("q", ["A"], "p");
    cache.insert(key.clone(), 1);
    assert!(cache.get(&key).is_none());
    assert_eq!(cache.purge_expired(), 1);
  }

  #[test]
  fn invalidate_by_query() {
    let cache = ModelCache::new(Duration::from_secs(60));
    cache.insert(CacheKey::new("q1", ["A"], "p"), 1);
    cache.insert(CacheKey::new("q1", ["B"], "p"), 2);
    cache.insert(CacheKey::new("q2", ["A"], "p"), 3);
    assert_eq!(cache.invalidate_query("q1"), 2);
    assert_eq!(cache.len(), 1);
    assert!(cache.invalidate(&CacheKey::new("q2", ["A"], "p")));
    cache.clear();
    assert!(cache.is_empty());
  }
}
