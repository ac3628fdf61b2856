//! Lookup port onto the display/playlist store.
//!
//! The real store lives behind CRUD handlers elsewhere; the real-time layer
//! only needs to validate display ids, find the displays a playlist is
//! assigned to, and record when a display last reported in.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from the display directory backend.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Storage backend error (database, network, etc.).
    #[error("Directory storage error: {0}")]
    Storage(String),
}

/// Read-mostly view of displays and playlist assignments.
#[async_trait]
pub trait DisplayDirectory: Send + Sync {
    /// Whether a display with this id exists.
    async fn display_exists(&self, display_id: &str) -> Result<bool, DirectoryError>;

    /// Ids of every display the playlist is assigned to.
    async fn displays_for_playlist(&self, playlist_id: &str)
    -> Result<Vec<String>, DirectoryError>;

    /// Record that the display reported in just now.
    async fn touch_last_seen(&self, display_id: &str) -> Result<(), DirectoryError>;
}

#[derive(Debug, Default)]
struct DirectoryState {
    displays: HashSet<String>,
    assignments: HashMap<String, BTreeSet<String>>,
    last_seen: HashMap<String, DateTime<Utc>>,
}

/// In-memory directory, seeded at startup.
///
/// Used by the standalone server and by tests in place of a database.
#[derive(Debug, Default)]
pub struct InMemoryDisplayDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryDisplayDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directory with the given display ids.
    pub fn with_displays<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        for id in ids {
            directory.add_display(id);
        }
        directory
    }

    pub fn add_display(&self, display_id: impl Into<String>) {
        self.write().displays.insert(display_id.into());
    }

    /// Assign a playlist to a display. Unknown displays are added.
    pub fn assign_playlist(&self, display_id: impl Into<String>, playlist_id: impl Into<String>) {
        let display_id = display_id.into();
        let mut state = self.write();
        state.displays.insert(display_id.clone());
        state
            .assignments
            .entry(playlist_id.into())
            .or_default()
            .insert(display_id);
    }

    /// When the display last reported status, if ever.
    pub fn last_seen(&self, display_id: &str) -> Option<DateTime<Utc>> {
        self.read().last_seen.get(display_id).copied()
    }

    fn read(&self) -> RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DisplayDirectory for InMemoryDisplayDirectory {
    async fn display_exists(&self, display_id: &str) -> Result<bool, DirectoryError> {
        Ok(self.read().displays.contains(display_id))
    }

    async fn displays_for_playlist(
        &self,
        playlist_id: &str,
    ) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .read()
            .assignments
            .get(playlist_id)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn touch_last_seen(&self, display_id: &str) -> Result<(), DirectoryError> {
        self.write()
            .last_seen
            .insert(display_id.to_string(), Utc::now());
        Ok(())
    }
}
