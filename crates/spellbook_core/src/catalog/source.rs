//! Catalog feed sources.

use crate::model::spell::{Edition, Spell};
use crate::model::Record;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Feed failure for one edition.
#[derive(Debug)]
pub enum CatalogError {
    Io {
        edition: Edition,
        source: std::io::Error,
    },
    Parse {
        edition: Edition,
        source: serde_json::Error,
    },
    InvalidRecord {
        edition: Edition,
        id: String,
        reason: String,
    },
}

impl CatalogError {
    pub fn edition(&self) -> Edition {
        match self {
            Self::Io { edition, .. }
            | Self::Parse { edition, .. }
            | Self::InvalidRecord { edition, .. } => *edition,
        }
    }
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { edition, source } => {
                write!(f, "cannot read {edition} catalog feed: {source}")
            }
            Self::Parse { edition, source } => {
                write!(f, "cannot parse {edition} catalog feed: {source}")
            }
            Self::InvalidRecord {
                edition,
                id,
                reason,
            } => write!(f, "{edition} catalog feed has invalid spell `{id}`: {reason}"),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidRecord { .. } => None,
        }
    }
}

/// Read-only provider of one catalog feed per edition.
///
/// Feed records may omit `custom`, `favorite` and `lastUsed`.
pub trait CatalogSource {
    fn fetch(&self, edition: Edition) -> Result<Vec<Spell>, CatalogError>;
}

/// Reads `spells-<edition>.json` files from one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCatalogSource {
    root: PathBuf,
}

impl DirectoryCatalogSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Well-known feed file name for an edition.
    pub fn file_name(edition: Edition) -> String {
        format!("spells-{}.json", edition.as_str())
    }

    pub fn feed_path(&self, edition: Edition) -> PathBuf {
        self.root.join(Self::file_name(edition))
    }
}

impl CatalogSource for DirectoryCatalogSource {
    fn fetch(&self, edition: Edition) -> Result<Vec<Spell>, CatalogError> {
        let text = std::fs::read_to_string(self.feed_path(edition))
            .map_err(|source| CatalogError::Io { edition, source })?;
        serde_json::from_str(&text).map_err(|source| CatalogError::Parse { edition, source })
    }
}

/// Fetches every edition feed, in [`Edition::ALL`] order, and concatenates
/// them into one validated candidate list.
///
/// Fails on the first unreadable feed or invalid record.
pub fn fetch_all(source: &dyn CatalogSource) -> Result<Vec<Spell>, CatalogError> {
    let started_at = Instant::now();
    let mut candidates = Vec::new();
    for edition in Edition::ALL {
        let feed = match source.fetch(edition) {
            Ok(feed) => feed,
            Err(err) => {
                error!(
                    "event=catalog_fetch module=catalog status=error edition={} duration_ms={} error={}",
                    edition,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err);
            }
        };
        for spell in &feed {
            spell
                .validate()
                .map_err(|err| CatalogError::InvalidRecord {
                    edition,
                    id: spell.id.clone(),
                    reason: err.to_string(),
                })?;
        }
        info!(
            "event=catalog_fetch module=catalog status=ok edition={} count={}",
            edition,
            feed.len()
        );
        candidates.extend(feed);
    }
    Ok(candidates)
}
