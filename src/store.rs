//! Subroutine database: loaded once, read-only afterwards.

use crate::error::Result;
use itertools::Itertools;
use lazy_static::lazy_static;
use morpho_protocol::Subroutine;
use serde::Serialize;
use std::{collections::HashMap, env, fs, path::Path};
use tracing::{debug, error, warn};

pub const DATABASE_ENV: &str = "MORPHOLANG_DATABASE";
pub const RUNTIME_DATABASE_PATH: &str = "database/database_seed.json";
const BUILTIN_DATABASE_JSON: &str = include_str!("../assets/database_seed.json");

#[derive(Debug, Clone, Default)]
pub struct SubroutineStore {
    subroutines: Vec<Subroutine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreIssueKind {
    DuplicateId,
    DuplicateTarget,
    InvalidVmemRange,
    NoHardwareDrivers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreIssue {
    pub kind: StoreIssueKind,
    pub subroutine_id: String,
    pub message: String,
}

impl SubroutineStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_subroutines(subroutines: Vec<Subroutine>) -> Self {
        Self { subroutines }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let subroutines: Vec<Subroutine> = serde_json::from_str(text)?;
        Ok(Self { subroutines })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Seed database compiled into the binary.
    pub fn builtin() -> Self {
        Self::from_json_str(BUILTIN_DATABASE_JSON).unwrap_or_else(|e| {
            error!("built-in database is not valid: {e}");
            Self::empty()
        })
    }

    /// Loads a database file, degrading to an empty store on any failure.
    pub fn load_lenient(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Database not found at {}; the store will be empty",
                path.display()
            );
            return Self::empty();
        }
        match Self::from_json_file(path) {
            Ok(store) => {
                debug!(
                    "loaded {} subroutines from {}",
                    store.len(),
                    path.display()
                );
                store
            }
            Err(e) => {
                error!("Failed to decode database {}: {e}", path.display());
                Self::empty()
            }
        }
    }

    /// Resolves the database: explicit path, then `MORPHOLANG_DATABASE`,
    /// then the runtime path, then the built-in seed.
    ///
    /// An explicitly named file that is missing or malformed yields an empty
    /// store instead of silently falling back to the seed.
    pub fn load_from_path(path: Option<&str>) -> Self {
        Self::resolve(
            path,
            env::var(DATABASE_ENV).ok().as_deref(),
            Path::new(RUNTIME_DATABASE_PATH),
        )
    }

    fn resolve(path: Option<&str>, env_path: Option<&str>, runtime_path: &Path) -> Self {
        if let Some(path) = path {
            return Self::load_lenient(path);
        }
        if let Some(path) = env_path.map(str::trim).filter(|p| !p.is_empty()) {
            debug!("database from {DATABASE_ENV}: {path}");
            return Self::load_lenient(path);
        }
        if runtime_path.exists() {
            return Self::load_lenient(runtime_path);
        }
        Self::builtin()
    }

    pub fn load() -> Self {
        Self::load_from_path(None)
    }

    pub fn subroutines(&self) -> &[Subroutine] {
        &self.subroutines
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Subroutine> {
        self.subroutines.iter()
    }

    pub fn len(&self) -> usize {
        self.subroutines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subroutines.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Subroutine> {
        self.subroutines.iter().find(|s| s.id == id)
    }

    /// Integrity report over the whole store. Lookups never call this.
    pub fn validate(&self) -> Vec<StoreIssue> {
        let mut issues = Vec::new();

        let mut id_counts: HashMap<&str, usize> = HashMap::new();
        for sub in &self.subroutines {
            *id_counts.entry(sub.id.as_str()).or_default() += 1;
        }
        for (id, count) in id_counts.into_iter().filter(|(_, c)| *c > 1).sorted() {
            issues.push(StoreIssue {
                kind: StoreIssueKind::DuplicateId,
                subroutine_id: id.to_string(),
                message: format!("id '{id}' is used by {count} records"),
            });
        }

        let mut first_by_target: HashMap<(String, String), &str> = HashMap::new();
        for sub in &self.subroutines {
            let key = (sub.organ().to_lowercase(), sub.species().to_lowercase());
            match first_by_target.get(&key) {
                Some(first) => issues.push(StoreIssue {
                    kind: StoreIssueKind::DuplicateTarget,
                    subroutine_id: sub.id.clone(),
                    message: format!(
                        "target '{}' in '{}' is shadowed by earlier record '{first}'",
                        sub.organ(),
                        sub.species()
                    ),
                }),
                None => {
                    first_by_target.insert(key, sub.id.as_str());
                }
            }

            if !sub.bioelectric_state.target_vmem_range.is_finite() {
                issues.push(StoreIssue {
                    kind: StoreIssueKind::InvalidVmemRange,
                    subroutine_id: sub.id.clone(),
                    message: "target_vmem_range must hold two finite values".to_string(),
                });
            }
            if sub.hardware_drivers.is_empty() {
                issues.push(StoreIssue {
                    kind: StoreIssueKind::NoHardwareDrivers,
                    subroutine_id: sub.id.clone(),
                    message: "at least one hardware driver is required".to_string(),
                });
            }
        }
        issues
    }
}

impl<'a> IntoIterator for &'a SubroutineStore {
    type Item = &'a Subroutine;
    type IntoIter = std::slice::Iter<'a, Subroutine>;

    fn into_iter(self) -> Self::IntoIter {
        self.subroutines.iter()
    }
}

lazy_static! {
    static ref DEFAULT_STORE: SubroutineStore = SubroutineStore::load();
}

/// Process-wide store, resolved on first use and never mutated.
pub fn default_store() -> &'static SubroutineStore {
    &DEFAULT_STORE
}
