//! In-memory session cache for analysis results
//!
//! Each completed analysis is registered under a generated session id so
//! follow-up operations (report generation, artifact lookup) can find the
//! persisted files and the original response. Entries expire by age and the
//! cache is bounded by evicting the oldest entries past capacity.

use crate::error::{DetectionError, Result};
use crate::types::DetectionResponse;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// One cached analysis
#[derive(Debug, Clone)]
pub struct SessionEntry {
    /// Persisted copy of the uploaded image
    pub source_path: PathBuf,
    /// Persisted heatmap overlay
    pub overlay_path: PathBuf,
    /// Response returned to the caller at analysis time
    pub response: DetectionResponse,
    /// Registration time, used for expiry and eviction ordering
    pub created: DateTime<Utc>,
}

/// Cache occupancy counters
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub capacity: usize,
    pub ttl_minutes: i64,
}

/// Bounded, time-limited session store
///
/// Interior mutability behind a mutex; all operations are short and
/// non-blocking so the lock is safe to take from async handlers.
pub struct SessionCache {
    entries: Mutex<HashMap<String, SessionEntry>>,
    ttl: Duration,
    capacity: usize,
}

impl SessionCache {
    /// Create a cache with the given entry lifetime and capacity bound
    #[must_use]
    pub fn new(ttl_minutes: i64, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::minutes(ttl_minutes),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionEntry>> {
        // A poisoned lock only means a panic mid-insert; the map itself
        // stays structurally valid.
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register an analysis and return its session id
    ///
    /// Evicts oldest entries first when the cache is at capacity.
    pub fn insert(&self, source_path: PathBuf, overlay_path: PathBuf, response: DetectionResponse) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = SessionEntry {
            source_path,
            overlay_path,
            response,
            created: Utc::now(),
        };

        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.created)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(key) => {
                    warn!(session = %key, "cache at capacity, evicting oldest session");
                    entries.remove(&key);
                },
                None => break,
            }
        }
        entries.insert(id.clone(), entry);
        debug!(session = %id, active = entries.len(), "registered session");
        id
    }

    /// Look up a session by id
    ///
    /// Expired entries are treated as absent and removed on access.
    ///
    /// # Errors
    ///
    /// `DetectionError::SessionNotFound` for unknown or expired ids.
    pub fn get(&self, id: &str) -> Result<SessionEntry> {
        let mut entries = self.lock();
        match entries.get(id) {
            Some(entry) if Utc::now() - entry.created <= self.ttl => Ok(entry.clone()),
            Some(_) => {
                entries.remove(id);
                Err(DetectionError::session_not_found(id))
            },
            None => Err(DetectionError::session_not_found(id)),
        }
    }

    /// Remove a session, returning whether it existed
    pub fn remove(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Drop every entry older than the configured lifetime
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now() - self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.created > cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "expired sessions removed");
        }
        removed
    }

    /// Current occupancy
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            active_sessions: self.lock().len(),
            capacity: self.capacity,
            ttl_minutes: self.ttl.num_minutes(),
        }
    }
}

/// Spawn a periodic expiry sweep for a shared cache
///
/// Runs until the returned handle is aborted or every other cache handle
/// is dropped.
pub fn spawn_cleanup_task(
    cache: Arc<SessionCache>,
    interval: std::time::Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            cache.cleanup_expired();
        }
    })
}
