//! Scenario engine: read-merge-write of every module under its record lock.

use crate::error::{Error, Result};
use crate::locks::KeyLocks;
use crate::storage::{RecordKey, RecordStore};
use concord_merge::{
    archive_ids, deduct_points, merge_archives, merge_points, merge_tech_tree, normalize,
    render_orbits, render_points, science_ledger, Module, OrbitRecord, PointsMerge, ScanFold,
    EMPTY_CONTROLLER,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Record name of the orbit board. Orbits are stored one record per user.
pub const ORBITS: &str = "Orbits";

/// What an upload did to the converged state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Stored,
    Unchanged,
}

impl UploadOutcome {
    /// Response body for the client.
    pub fn body(self) -> &'static str {
        match self {
            UploadOutcome::Stored => "OK",
            UploadOutcome::Unchanged => "UNCHANGED",
        }
    }
}

pub struct ScenarioEngine {
    store: Arc<dyn RecordStore>,
    locks: KeyLocks,
}

impl ScenarioEngine {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            locks: KeyLocks::new(),
        }
    }

    fn module(name: &str) -> Result<Module> {
        Module::from_name(name).ok_or_else(|| Error::UnknownModule(name.to_string()))
    }

    /// Merge an upload into a module's converged record.
    ///
    /// `user` is required for per-user modules and ignored otherwise.
    pub async fn upload(
        &self,
        save: &str,
        module: &str,
        user: Option<&str>,
        body: &str,
    ) -> Result<UploadOutcome> {
        match Self::module(module)? {
            Module::TechTree => self.upload_tech(save, body).await,
            Module::SciencePoints => self.upload_points(save, body).await,
            Module::ScienceArchives => self.upload_archives(save, body).await,
            Module::ScanController => {
                let user = user.filter(|u| !u.is_empty()).ok_or(Error::MissingUser)?;
                self.upload_scan(save, user, body).await
            }
        }
    }

    async fn upload_tech(&self, save: &str, body: &str) -> Result<UploadOutcome> {
        let _tech = self.locks.lock(save, Module::TechTree.name()).await;
        let key = RecordKey::module(save, Module::TechTree.name());

        let existing = self.store.read(&key)?;
        let merge = merge_tech_tree(existing.as_deref(), body);
        if !merge.changed() {
            debug!(save, "TechTree upload added nothing");
            return Ok(UploadOutcome::Unchanged);
        }
        self.store.write(&key, &merge.text)?;
        info!(
            save,
            unlocked = merge.unlocked.len(),
            cost = merge.unlocked_cost,
            seeded = merge.seeded,
            "TechTree merged"
        );

        if merge.unlocked_cost > 0.0 {
            let _points = self.locks.lock(save, Module::SciencePoints.name()).await;
            let key = RecordKey::module(save, Module::SciencePoints.name());
            match deduct_points(self.store.read(&key)?.as_deref(), merge.unlocked_cost) {
                Some(text) => {
                    self.store.write(&key, &text)?;
                    debug!(save, cost = merge.unlocked_cost, "Deducted unlock cost");
                }
                None => warn!(
                    save,
                    cost = merge.unlocked_cost,
                    "No usable SciencePoints record, skipping unlock deduction"
                ),
            }
        }
        Ok(UploadOutcome::Stored)
    }

    async fn upload_points(&self, save: &str, body: &str) -> Result<UploadOutcome> {
        let _guard = self.locks.lock(save, Module::SciencePoints.name()).await;
        let key = RecordKey::module(save, Module::SciencePoints.name());

        match merge_points(self.store.read(&key)?.as_deref(), body)? {
            PointsMerge::Stored(text) => {
                self.store.write(&key, &text)?;
                debug!(save, record = text.trim(), "SciencePoints raised");
                Ok(UploadOutcome::Stored)
            }
            PointsMerge::Unchanged => Ok(UploadOutcome::Unchanged),
        }
    }

    async fn upload_archives(&self, save: &str, body: &str) -> Result<UploadOutcome> {
        let _guard = self.locks.lock(save, Module::ScienceArchives.name()).await;
        let key = RecordKey::module(save, Module::ScienceArchives.name());

        let existing = self.store.read(&key)?;
        let merged = merge_archives(existing.as_deref(), body);
        if existing.as_deref() == Some(merged.as_str()) {
            return Ok(UploadOutcome::Unchanged);
        }
        self.store.write(&key, &merged)?;
        debug!(save, subjects = archive_ids(&merged).len(), "ScienceArchives merged");
        Ok(UploadOutcome::Stored)
    }

    async fn upload_scan(&self, save: &str, user: &str, body: &str) -> Result<UploadOutcome> {
        let module = Module::ScanController.name();
        let _guard = self.locks.lock(save, module).await;
        let key = RecordKey::user(save, module, user);

        let snapshot = normalize(body);
        let previous = self.store.read(&key)?.map(|prev| normalize(&prev));
        if previous.as_deref() == Some(snapshot.as_str()) {
            debug!(save, user, "SCANcontroller snapshot unchanged");
            return Ok(UploadOutcome::Unchanged);
        }

        self.store.write(&key, &snapshot)?;
        self.refresh_scan(save)?;
        Ok(UploadOutcome::Stored)
    }

    /// Rebuild the converged SCANcontroller record. Caller holds its lock.
    fn refresh_scan(&self, save: &str) -> Result<String> {
        let module = Module::ScanController.name();
        let key = RecordKey::module(save, module);
        let previous = self.store.read(&key)?;
        let users = self.store.users(save, module)?;

        if previous.is_none() && users.is_empty() {
            return Ok(EMPTY_CONTROLLER.to_string());
        }

        let mut fold = ScanFold::new();
        if let Some(previous) = &previous {
            fold.seed_coverage(previous);
        }
        for user in &users {
            if let Some(snapshot) = self.store.read(&RecordKey::user(save, module, user))? {
                fold.fold(&snapshot);
            }
        }

        let converged = fold.render();
        if previous.as_deref() != Some(converged.as_str()) {
            self.store.write(&key, &converged)?;
            debug!(
                save,
                users = users.len(),
                vessels = fold.vessel_count(),
                cells = fold.scanned_cells(),
                "SCANcontroller converged"
            );
        }
        Ok(converged)
    }

    /// Converged record of a module.
    pub async fn read(&self, save: &str, module: &str) -> Result<String> {
        let module = Self::module(module)?;
        if module == Module::ScanController {
            return self.converged_scan(save).await;
        }
        self.store
            .read(&RecordKey::module(save, module.name()))?
            .ok_or_else(|| Error::NotFound("Scenario not found".to_string()))
    }

    /// Fold every user's SCANcontroller snapshot into the converged view.
    pub async fn converged_scan(&self, save: &str) -> Result<String> {
        let _guard = self.locks.lock(save, Module::ScanController.name()).await;
        self.refresh_scan(save)
    }

    /// One user's normalized SCANcontroller snapshot.
    pub fn user_snapshot(&self, save: &str, user: &str) -> Result<String> {
        self.store
            .read(&RecordKey::user(save, Module::ScanController.name(), user))?
            .ok_or_else(|| Error::NotFound("Snapshot not found".to_string()))
    }

    /// Points implied by archived science minus unlocked tech costs.
    pub fn science_ledger(&self, save: &str) -> Result<String> {
        let archives = self
            .store
            .read(&RecordKey::module(save, Module::ScienceArchives.name()))?;
        let tech = self
            .store
            .read(&RecordKey::module(save, Module::TechTree.name()))?;
        Ok(render_points(science_ledger(archives.as_deref(), tech.as_deref())))
    }

    pub fn archive_ids(&self, save: &str) -> Result<Vec<String>> {
        let archives = self
            .store
            .read(&RecordKey::module(save, Module::ScienceArchives.name()))?;
        Ok(archives.as_deref().map(archive_ids).unwrap_or_default())
    }

    pub fn list_records(&self, save: &str) -> Result<Vec<String>> {
        self.store.records(save)
    }

    /// Store an orbit line unless the user already has a newer one.
    ///
    /// Returns whether the record was replaced.
    pub async fn post_orbit(&self, save: &str, body: &str) -> Result<bool> {
        let record = OrbitRecord::parse(body)?;
        let _guard = self.locks.lock(save, ORBITS).await;
        let key = RecordKey::user(save, ORBITS, &record.user);

        let previous = self
            .store
            .read(&key)?
            .and_then(|text| OrbitRecord::parse(&text).ok());
        if let Some(previous) = previous {
            if !record.supersedes(&previous) {
                debug!(save, user = %record.user, "Ignoring stale orbit");
                return Ok(false);
            }
        }

        self.store.write(&key, &format!("{}\n", record.line))?;
        Ok(true)
    }

    /// The merged orbit board of a save.
    pub fn orbits(&self, save: &str) -> Result<String> {
        let mut records = Vec::new();
        for user in self.store.users(save, ORBITS)? {
            if let Some(text) = self.store.read(&RecordKey::user(save, ORBITS, &user))? {
                if let Ok(record) = OrbitRecord::parse(&text) {
                    records.push(record);
                }
            }
        }
        Ok(render_orbits(records))
    }
}
