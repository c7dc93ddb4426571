use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use argile_core::DsStatus;

use super::{DossierSnapshot, DossierSource, DsError};

/// In-memory [`DossierSource`] serving preloaded snapshots.
///
/// Unknown numbers answer `DsError::NotFound`, like DS does for drafts.
#[derive(Debug, Default)]
pub struct StaticDossierSource {
    dossiers: Mutex<HashMap<i64, DossierSnapshot>>,
    failure: Mutex<Option<DsError>>,
    fetches: AtomicUsize,
}

impl StaticDossierSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dossier(self, snapshot: DossierSnapshot) -> Self {
        self.insert(snapshot);
        self
    }

    pub fn insert(&self, snapshot: DossierSnapshot) {
        self.dossiers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(snapshot.number, snapshot);
    }

    /// Change the state of a known dossier, or add a bare one.
    pub fn set_status(&self, number: i64, state: DsStatus) {
        let mut dossiers = self.dossiers.lock().unwrap_or_else(|e| e.into_inner());
        dossiers
            .entry(number)
            .and_modify(|d| d.state = state)
            .or_insert_with(|| DossierSnapshot::new(number, state));
    }

    pub fn remove(&self, number: i64) {
        self.dossiers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&number);
    }

    /// Make every fetch fail with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<DsError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    /// Number of `get_dossier` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DossierSource for StaticDossierSource {
    async fn get_dossier(&self, number: i64) -> Result<DossierSnapshot, DsError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(err);
        }
        self.dossiers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&number)
            .cloned()
            .ok_or(DsError::NotFound { number })
    }
}
