//! Persisted resource state.
//!
//! # Responsibilities
//! - Keep external identifiers and observed status across restarts
//! - Remember resources that left the desired set but still own a route
//!
//! # Design Decisions
//! - One pretty-printed JSON document keyed by resource name
//! - Written to a sibling temp file, then renamed over the old one
//! - A missing file is an empty state, not an error

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::types::ProxyRoute;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Every resource the controller has reconciled, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PersistedState {
    #[serde(default)]
    pub routes: BTreeMap<String, ProxyRoute>,
}

/// JSON file holding a [`PersistedState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<PersistedState, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, state: &PersistedState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
