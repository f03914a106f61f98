// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The note-keyed sample store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::loader::{LoadError, LoadedSample, SampleLoader};
use super::SoundAsset;

/// The outcome of loading the sample for a note.
#[derive(Clone, Debug)]
pub enum LoadState {
    /// The sample is decoded and ready to play.
    Loaded(LoadedSample),
    /// Loading failed. The note stays silent for the rest of the session.
    Failed(String),
}

/// Holds decoded samples keyed by note number.
///
/// Entries are written once, by the load that produced them, and never mutated or
/// evicted afterwards. Lookups take a shared read lock and never wait on a load.
pub struct SampleStore {
    loader: Arc<dyn SampleLoader>,
    entries: RwLock<HashMap<u8, LoadState>>,
}

impl SampleStore {
    /// Creates an empty store that loads samples with the given loader.
    pub fn new(loader: Arc<dyn SampleLoader>) -> SampleStore {
        SampleStore {
            loader,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetches and decodes the sample at the locator and stores it under the note.
    /// Failures are recorded and logged, never returned. Returns true if a sample
    /// is available for the note once the load completes.
    pub async fn load(&self, note: u8, locator: Option<&Path>) -> bool {
        let result = match locator {
            Some(locator) => {
                let loader = self.loader.clone();
                let path = locator.to_path_buf();
                tokio::task::spawn_blocking(move || loader.load(&path))
                    .await
                    .unwrap_or_else(|e| Err(LoadError::Task(e.to_string())))
            }
            None => Err(LoadError::MissingLocator),
        };

        self.record(note, locator, result)
    }

    /// Starts a concurrent load for every asset that declares a file. Loads are
    /// independent: a slow or failing asset never holds up the others. The
    /// returned set yields (note, loaded) pairs and may be joined or dropped;
    /// dropping it does not cancel loads that have already been handed to the
    /// blocking pool.
    pub fn load_all(self: &Arc<Self>, assets: &[SoundAsset]) -> JoinSet<(u8, bool)> {
        let mut loads = JoinSet::new();

        for asset in assets {
            let note = asset.note();
            let Some(locator) = asset.locator().map(Path::to_path_buf) else {
                debug!(note, "No sound file declared for note");
                continue;
            };

            let store = self.clone();
            loads.spawn(async move { (note, store.load(note, Some(&locator)).await) });
        }

        loads
    }

    /// Returns the decoded sample for a note, if it has finished loading.
    pub fn get(&self, note: u8) -> Option<LoadedSample> {
        match self.entries.read().get(&note) {
            Some(LoadState::Loaded(sample)) => Some(sample.clone()),
            _ => None,
        }
    }

    /// Returns the load state for a note, or None if no load has completed for it.
    pub fn state(&self, note: u8) -> Option<LoadState> {
        self.entries.read().get(&note).cloned()
    }

    /// Returns the number of loaded samples.
    pub fn loaded_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|state| matches!(state, LoadState::Loaded(_)))
            .count()
    }

    /// Returns the total memory used by loaded samples.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .read()
            .values()
            .map(|state| match state {
                LoadState::Loaded(sample) => sample.memory_size(),
                LoadState::Failed(_) => 0,
            })
            .sum()
    }

    fn record(
        &self,
        note: u8,
        locator: Option<&Path>,
        result: Result<LoadedSample, LoadError>,
    ) -> bool {
        let mut entries = self.entries.write();

        if let Some(LoadState::Loaded(existing)) = entries.get(&note) {
            debug!(
                note,
                sample = existing.name(),
                "Sample already loaded for note, keeping it"
            );
            return true;
        }

        match result {
            Ok(sample) => {
                info!(note, sample = sample.name(), "Sample ready");
                entries.insert(note, LoadState::Loaded(sample));
                true
            }
            Err(e) => {
                warn!(note, path = ?locator, error = %e, "Error loading sample");
                entries.insert(note, LoadState::Failed(e.to_string()));
                false
            }
        }
    }
}

impl std::fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStore")
            .field("loaded_samples", &self.loaded_count())
            .field("memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}
