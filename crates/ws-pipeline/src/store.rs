// store.rs — JSON file persistence for pipeline records.
//
// Each record is stored as `<store_dir>/<kind>/<id>.json`. One file per
// record keeps records isolated and the store easy to inspect manually.
// Listing tolerates unreadable files (they are skipped with a warning) so a
// single corrupt record never hides the rest of the pipeline.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidate::Candidate;
use crate::checklist::ChecklistItem;
use crate::drip::DripSchedule;
use crate::error::PipelineError;
use crate::lifecycle::EntityKind;
use crate::proposal::Proposal;
use crate::pursuit::Pursuit;
use crate::signal::Signal;

/// A record that can live in a [`RecordStore`].
pub trait Record: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn record_id(&self) -> Uuid;
    fn org_id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    /// Status/stage name used by list filters.
    fn status_label(&self) -> String;
}

impl Record for Signal {
    const KIND: EntityKind = EntityKind::Signal;
    fn record_id(&self) -> Uuid {
        self.signal_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

impl Record for Candidate {
    const KIND: EntityKind = EntityKind::Candidate;
    fn record_id(&self) -> Uuid {
        self.candidate_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

impl Record for Pursuit {
    const KIND: EntityKind = EntityKind::Pursuit;
    fn record_id(&self) -> Uuid {
        self.pursuit_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        self.stage.to_string()
    }
}

impl Record for Proposal {
    const KIND: EntityKind = EntityKind::Proposal;
    fn record_id(&self) -> Uuid {
        self.proposal_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

impl Record for ChecklistItem {
    const KIND: EntityKind = EntityKind::ChecklistItem;
    fn record_id(&self) -> Uuid {
        self.item_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        let label = if self.completed { "complete" } else { "open" };
        label.to_string()
    }
}

impl Record for DripSchedule {
    const KIND: EntityKind = EntityKind::DripSchedule;
    fn record_id(&self) -> Uuid {
        self.schedule_id
    }
    fn org_id(&self) -> &str {
        &self.org_id
    }
    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    fn status_label(&self) -> String {
        self.status.to_string()
    }
}

/// Filter and paging for list operations. Pages are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    50
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            org_id: None,
            status: None,
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl ListQuery {
    pub fn for_org(org_id: impl Into<String>) -> Self {
        Self {
            org_id: Some(org_id.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    fn matches<T: Record>(&self, record: &T) -> bool {
        self.org_id.as_deref().is_none_or(|org| record.org_id() == org)
            && self
                .status
                .as_deref()
                .is_none_or(|status| record.status_label() == status)
    }
}

/// One page of a listing plus the total number of matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    /// Slice an already-filtered, already-ordered result set.
    pub fn paginate(all: Vec<T>, page: usize, limit: usize) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let total = all.len();
        let items = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Self {
            items,
            total,
            page,
            limit,
        }
    }
}

/// Persistent store for one record type.
pub struct RecordStore<T> {
    dir: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> RecordStore<T> {
    /// Create a store backed by `<root>/<kind>/`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = root.as_ref().join(T::KIND.as_str());
        fs::create_dir_all(&dir).map_err(|source| PipelineError::IoError {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            dir,
            _marker: PhantomData,
        })
    }

    /// Save a record (creates or overwrites). Written to a sibling temp
    /// file first, so a failed save leaves the previous version intact.
    pub fn save(&self, record: &T) -> Result<(), PipelineError> {
        let path = self.record_file(record.record_id());
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json).map_err(|source| PipelineError::IoError {
            path: tmp.display().to_string(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| PipelineError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Result<Option<T>, PipelineError> {
        let path = self.record_file(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| PipelineError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Like `get`, but a missing record is `NotFound`.
    pub fn require(&self, id: Uuid) -> Result<T, PipelineError> {
        self.get(id)?.ok_or(PipelineError::NotFound {
            entity: T::KIND,
            id,
        })
    }

    /// All records, newest first.
    pub fn list(&self) -> Result<Vec<T>, PipelineError> {
        let mut records = Vec::new();

        let entries = fs::read_dir(&self.dir).map_err(|source| PipelineError::IoError {
            path: self.dir.display().to_string(),
            source,
        })?;

        for entry in entries {
            let entry = entry.map_err(|source| PipelineError::IoError {
                path: self.dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let json = fs::read_to_string(&path).map_err(|source| PipelineError::IoError {
                path: path.display().to_string(),
                source,
            })?;
            match serde_json::from_str::<T>(&json) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping unreadable {} record {}: {}", T::KIND, path.display(), e),
            }
        }

        records.sort_by_key(|r| std::cmp::Reverse(r.created_at()));
        Ok(records)
    }

    /// Filter and page.
    pub fn query(&self, query: &ListQuery) -> Result<Page<T>, PipelineError> {
        let matching: Vec<T> = self
            .list()?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        Ok(Page::paginate(matching, query.page, query.limit))
    }

    pub fn delete(&self, id: Uuid) -> Result<bool, PipelineError> {
        let path = self.record_file(id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| PipelineError::IoError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(true)
    }

    fn record_file(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// All record stores under one root directory.
pub struct PipelineStore {
    pub signals: RecordStore<Signal>,
    pub candidates: RecordStore<Candidate>,
    pub pursuits: RecordStore<Pursuit>,
    pub proposals: RecordStore<Proposal>,
    pub checklist: RecordStore<ChecklistItem>,
    pub drips: RecordStore<DripSchedule>,
    root: PathBuf,
}

impl PipelineStore {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let root = root.as_ref().to_path_buf();
        Ok(Self {
            signals: RecordStore::new(&root)?,
            candidates: RecordStore::new(&root)?,
            pursuits: RecordStore::new(&root)?,
            proposals: RecordStore::new(&root)?,
            checklist: RecordStore::new(&root)?,
            drips: RecordStore::new(&root)?,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Checklist items for one pursuit, oldest first (checklist order).
    pub fn checklist_for(&self, pursuit_id: Uuid) -> Result<Vec<ChecklistItem>, PipelineError> {
        let mut items: Vec<ChecklistItem> = self
            .checklist
            .list()?
            .into_iter()
            .filter(|i| i.pursuit_id == pursuit_id)
            .collect();
        items.sort_by_key(|i| i.created_at);
        Ok(items)
    }

    /// Proposals for one pursuit, by version.
    pub fn proposals_for(&self, pursuit_id: Uuid) -> Result<Vec<Proposal>, PipelineError> {
        let mut proposals: Vec<Proposal> = self
            .proposals
            .list()?
            .into_iter()
            .filter(|p| p.pursuit_id == pursuit_id)
            .collect();
        proposals.sort_by_key(|p| p.version);
        Ok(proposals)
    }

    /// Drip rows for one candidate, by schedule time.
    pub fn drips_for(&self, candidate_id: Uuid) -> Result<Vec<DripSchedule>, PipelineError> {
        let mut rows: Vec<DripSchedule> = self
            .drips
            .list()?
            .into_iter()
            .filter(|d| d.candidate_id == candidate_id)
            .collect();
        rows.sort_by_key(|d| d.scheduled_at);
        Ok(rows)
    }

    /// Candidates that reference `signal_id` as their origin.
    pub fn candidates_from_signal(&self, signal_id: Uuid) -> Result<Vec<Candidate>, PipelineError> {
        Ok(self
            .candidates
            .list()?
            .into_iter()
            .filter(|c| c.signal_id == Some(signal_id))
            .collect())
    }
}
