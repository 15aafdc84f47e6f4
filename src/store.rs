//! File-backed parameter group
//!
//! Stands in for the remote service: the live group is a TOML file that
//! `apply` mutates one batch at a time, enforcing the same per-call limits
//! the service does.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use paramkit::{
    ApplyTiming, Batch, BatchContext, BatchLimits, CurrentState, NameMatching, Parameter,
    ParameterGroupApi, Provenance,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// State File
// ============================================================================

/// On-disk form of a live parameter group
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GroupFile {
    pub name: String,
    pub family: String,

    /// Last time a batch was applied to this group
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,

    /// Parameters whose deferred change waits for an instance restart
    #[serde(default)]
    pub pending_restart: Vec<String>,

    #[serde(default)]
    pub parameters: Vec<Parameter>,

    /// Engine defaults; when present, only these names are accepted
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl GroupFile {
    pub fn new(name: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            last_modified: None,
            pending_restart: Vec::new(),
            parameters: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }
}

// ============================================================================
// File Group
// ============================================================================

/// A live parameter group backed by a TOML file
pub struct FileGroup {
    path: PathBuf,
    data: GroupFile,
    matching: NameMatching,
    limits: BatchLimits,
}

impl FileGroup {
    /// Load the group stored at `path`
    pub fn load(path: &Path, matching: NameMatching, limits: BatchLimits) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let data: GroupFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!(
            "Loaded group {} ({} parameters) from {}",
            data.name,
            data.parameters.len(),
            path.display()
        );

        Ok(Self {
            path: path.to_path_buf(),
            data,
            matching,
            limits,
        })
    }

    /// Load the group at `path`, or start an empty one if the file is missing
    pub fn load_or_create(
        path: &Path,
        name: &str,
        family: &str,
        matching: NameMatching,
        limits: BatchLimits,
    ) -> Result<Self> {
        if path.exists() {
            let group = Self::load(path, matching, limits)?;
            if group.data.name != name {
                anyhow::bail!(
                    "State file {} holds group '{}', expected '{}'",
                    path.display(),
                    group.data.name,
                    name
                );
            }
            return Ok(group);
        }

        log::debug!("State file {} does not exist, starting empty", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            data: GroupFile::new(name, family),
            matching,
            limits,
        })
    }

    /// Write the group back to its file
    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }

        let content =
            toml::to_string_pretty(&self.data).context("Failed to serialize group to TOML")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))?;

        log::debug!("Saved group {} to {}", self.data.name, self.path.display());
        Ok(())
    }

    pub fn data(&self) -> &GroupFile {
        &self.data
    }

    /// Snapshot of the live parameters for diffing
    pub fn current_state(&self) -> Result<CurrentState> {
        CurrentState::from_parameters(self.matching, self.data.parameters.iter().cloned())
            .with_context(|| format!("Invalid live state for group {}", self.data.name))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.data
            .parameters
            .iter()
            .position(|p| self.matching.matches(&p.name, name))
    }

    /// Engine default for `name`, as (stored name, value)
    fn default_for(&self, name: &str) -> Option<(&str, &str)> {
        self.data
            .defaults
            .iter()
            .find(|(k, _)| self.matching.matches(k, name))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Reject names the engine does not know when a defaults table exists
    fn check_known(&self, name: &str) -> paramkit::Result<()> {
        if self.data.defaults.is_empty()
            || self.default_for(name).is_some()
            || self.position(name).is_some()
        {
            Ok(())
        } else {
            Err(paramkit::Error::rejected(format!(
                "InvalidParameterValue: unknown parameter {name}"
            )))
        }
    }

    fn check_limit(&self, size: usize, limit: usize, operation: &str) -> paramkit::Result<()> {
        if size > limit {
            return Err(paramkit::Error::rejected(format!(
                "{operation} accepts at most {limit} parameters, got {size}"
            )));
        }
        Ok(())
    }

    fn clear_pending(&mut self, name: &str) {
        let matching = self.matching;
        self.data
            .pending_restart
            .retain(|p| !matching.matches(p, name));
    }

    fn reset_one(&mut self, name: &str) {
        match self
            .default_for(name)
            .map(|(key, value)| Parameter::engine_default(key, value))
        {
            Some(parameter) => {
                match self.position(name) {
                    Some(idx) => self.data.parameters[idx] = parameter,
                    None => self.data.parameters.push(parameter),
                }
            }
            None => {
                if let Some(idx) = self.position(name) {
                    self.data.parameters.remove(idx);
                }
            }
        }
        self.clear_pending(name);
    }

    fn touch(&mut self) {
        self.data.last_modified = Some(Utc::now());
    }
}

impl ParameterGroupApi for FileGroup {
    fn group_name(&self) -> &str {
        &self.data.name
    }

    fn modify_batch(
        &mut self,
        ctx: &BatchContext<'_>,
        batch: &Batch<Parameter>,
    ) -> paramkit::Result<()> {
        if ctx.should_abort() {
            return Err(ctx.abort_error());
        }
        self.check_limit(batch.len(), self.limits.modify, "ModifyDBParameterGroup")?;

        // Validate the whole batch first; the call is all-or-nothing
        for parameter in batch {
            self.check_known(&parameter.name)?;
            if let Some(idx) = self.position(&parameter.name)
                && self.data.parameters[idx].provenance == Provenance::System
            {
                return Err(paramkit::Error::rejected(format!(
                    "InvalidParameterValue: {} is managed by the service",
                    parameter.name
                )));
            }
        }

        for parameter in batch {
            let updated = Parameter::user(
                parameter.name.as_str(),
                parameter.value.as_str(),
                parameter.apply_timing,
            );
            match self.position(&parameter.name) {
                Some(idx) => self.data.parameters[idx] = updated,
                None => self.data.parameters.push(updated),
            }
            self.clear_pending(&parameter.name);
            if parameter.apply_timing == ApplyTiming::Deferred {
                self.data.pending_restart.push(parameter.name.clone());
            }
        }

        self.touch();
        Ok(())
    }

    fn reset_batch(
        &mut self,
        ctx: &BatchContext<'_>,
        names: &Batch<String>,
    ) -> paramkit::Result<()> {
        if ctx.should_abort() {
            return Err(ctx.abort_error());
        }
        self.check_limit(names.len(), self.limits.reset, "ResetDBParameterGroup")?;
        for name in names {
            self.check_known(name)?;
        }

        for name in names {
            self.reset_one(name);
        }

        self.touch();
        Ok(())
    }

    fn reset_all(&mut self, ctx: &BatchContext<'_>) -> paramkit::Result<()> {
        if ctx.should_abort() {
            return Err(ctx.abort_error());
        }

        let names: Vec<String> = self
            .data
            .parameters
            .iter()
            .filter(|p| p.provenance.is_user_defined())
            .map(|p| p.name.clone())
            .collect();
        for name in &names {
            self.reset_one(name);
        }

        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paramkit::{
        ApplyOptions, CancelToken, DesiredState, OperationKind, apply_simple, diff, plan_batches,
    };
    use tempfile::TempDir;

    const LIVE: &str = r#"
name = "app-pg"
family = "postgres14"

[[parameters]]
name = "max_connections"
value = "100"
apply_timing = "deferred"
provenance = "user-defined"

[[parameters]]
name = "work_mem"
value = "4096"
provenance = "user-defined"

[[parameters]]
name = "rds.extensions"
value = "pg_stat_statements"
provenance = "system"

[defaults]
max_connections = "87"
work_mem = "4096"
shared_buffers = "32768"
"rds.extensions" = "pg_stat_statements"
"#;

    fn load(dir: &TempDir, limits: BatchLimits) -> FileGroup {
        let path = dir.path().join("live.toml");
        fs::write(&path, LIVE).unwrap();
        FileGroup::load(&path, NameMatching::CaseInsensitive, limits).unwrap()
    }

    fn ctx(cancel: &CancelToken, kind: OperationKind) -> BatchContext<'_> {
        BatchContext {
            group_name: "app-pg",
            kind,
            index: 0,
            total: 1,
            attempt: 1,
            deadline: None,
            cancel,
        }
    }

    fn single<T>(items: Vec<T>) -> Batch<T> {
        let size = items.len();
        plan_batches(items, size).unwrap().remove(0)
    }

    #[test]
    fn test_modify_updates_and_tracks_pending_restart() {
        let dir = TempDir::new().unwrap();
        let mut group = load(&dir, BatchLimits::default());
        let cancel = CancelToken::new();

        let batch = single(vec![
            Parameter::user("work_mem", "8192", ApplyTiming::Immediate),
            Parameter::user("shared_buffers", "65536", ApplyTiming::Deferred),
        ]);
        group
            .modify_batch(&ctx(&cancel, OperationKind::Modify), &batch)
            .unwrap();

        let state = group.current_state().unwrap();
        assert_eq!(state.get("work_mem").unwrap().value, "8192");
        assert_eq!(
            state.get("shared_buffers").unwrap().provenance,
            Provenance::UserDefined
        );
        assert!(group.data().pending_restart.contains(&"shared_buffers".to_string()));
        assert!(group.data().last_modified.is_some());
    }

    #[test]
    fn test_over_limit_batch_rejected() {
        let dir = TempDir::new().unwrap();
        let mut group = load(
            &dir,
            BatchLimits {
                modify: 1,
                reset: 1,
            },
        );
        let cancel = CancelToken::new();

        let batch = single(vec![
            Parameter::user("work_mem", "1", ApplyTiming::Immediate),
            Parameter::user("max_connections", "2", ApplyTiming::Deferred),
        ]);
        let err = group
            .modify_batch(&ctx(&cancel, OperationKind::Modify), &batch)
            .unwrap_err();
        assert!(matches!(err, paramkit::Error::Rejected { .. }));
        assert_eq!(group.current_state().unwrap().get("work_mem").unwrap().value, "4096");
    }

    #[test]
    fn test_unknown_and_system_parameters_rejected() {
        let dir = TempDir::new().unwrap();
        let mut group = load(&dir, BatchLimits::default());
        let cancel = CancelToken::new();

        let unknown = single(vec![
            Parameter::user("work_mem", "1", ApplyTiming::Immediate),
            Parameter::user("no_such_param", "1", ApplyTiming::Immediate),
        ]);
        assert!(
            group
                .modify_batch(&ctx(&cancel, OperationKind::Modify), &unknown)
                .is_err()
        );
        // Nothing from the rejected batch was applied
        assert_eq!(group.current_state().unwrap().get("work_mem").unwrap().value, "4096");

        let system = single(vec![Parameter::user(
            "rds.extensions",
            "postgis",
            ApplyTiming::Immediate,
        )]);
        assert!(
            group
                .modify_batch(&ctx(&cancel, OperationKind::Modify), &system)
                .is_err()
        );
    }

    #[test]
    fn test_reset_restores_default_or_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("live.toml");
        let mut data = GroupFile::new("app-pg", "postgres14");
        data.parameters
            .push(Parameter::user("max_connections", "100", ApplyTiming::Deferred));
        data.parameters
            .push(Parameter::user("custom.flag", "on", ApplyTiming::Immediate));
        data.defaults.insert("max_connections".into(), "87".into());
        fs::write(&path, toml::to_string_pretty(&data).unwrap()).unwrap();

        let mut group =
            FileGroup::load(&path, NameMatching::CaseInsensitive, BatchLimits::default()).unwrap();
        let cancel = CancelToken::new();

        let names = single(vec!["MAX_CONNECTIONS".to_string(), "custom.flag".to_string()]);
        group
            .reset_batch(&ctx(&cancel, OperationKind::Reset), &names)
            .unwrap();

        let state = group.current_state().unwrap();
        let max = state.get("max_connections").unwrap();
        assert_eq!(max.name, "max_connections");
        assert_eq!(max.value, "87");
        assert_eq!(max.provenance, Provenance::EngineDefault);
        assert!(state.get("custom.flag").is_none());
    }

    #[test]
    fn test_reset_all_keeps_system_parameters() {
        let dir = TempDir::new().unwrap();
        let mut group = load(&dir, BatchLimits::default());
        let cancel = CancelToken::new();

        group
            .reset_all(&ctx(&cancel, OperationKind::ResetAll))
            .unwrap();

        let state = group.current_state().unwrap();
        assert_eq!(state.user_defined().count(), 0);
        assert_eq!(
            state.get("rds.extensions").unwrap().provenance,
            Provenance::System
        );
        assert!(group.data().pending_restart.is_empty());
    }

    #[test]
    fn test_cancelled_call_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut group = load(&dir, BatchLimits::default());
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = group
            .reset_all(&ctx(&cancel, OperationKind::ResetAll))
            .unwrap_err();
        assert_eq!(err, paramkit::Error::Cancelled);
    }

    #[test]
    fn test_apply_then_rediff_converges() {
        let dir = TempDir::new().unwrap();
        let mut group = load(
            &dir,
            BatchLimits {
                modify: 1,
                reset: 1,
            },
        );

        let desired = DesiredState::from_entries(
            NameMatching::CaseInsensitive,
            [
                ("Work_Mem", "8192", ApplyTiming::Immediate),
                ("shared_buffers", "65536", ApplyTiming::Deferred),
            ],
        )
        .unwrap();

        let changes = diff(&desired, &group.current_state().unwrap()).unwrap();
        assert_eq!(changes.to_modify.len(), 2);
        assert_eq!(changes.to_reset, vec!["max_connections".to_string()]);

        let opts = ApplyOptions {
            limits: BatchLimits {
                modify: 1,
                reset: 1,
            },
            ..ApplyOptions::default()
        };
        let report = apply_simple(&mut group, &changes, &opts).unwrap();
        assert!(report.is_success());
        group.save().unwrap();

        let path = dir.path().join("live.toml");
        let reloaded =
            FileGroup::load(&path, NameMatching::CaseInsensitive, BatchLimits::default()).unwrap();
        let again = diff(&desired, &reloaded.current_state().unwrap()).unwrap();
        assert!(!again.has_changes());
    }

    #[test]
    fn test_load_or_create() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("live.toml");

        let group = FileGroup::load_or_create(
            &path,
            "app-pg",
            "postgres14",
            NameMatching::CaseInsensitive,
            BatchLimits::default(),
        )
        .unwrap();
        assert!(group.data().parameters.is_empty());
        group.save().unwrap();
        assert!(path.exists());

        let other = FileGroup::load_or_create(
            &path,
            "other",
            "postgres14",
            NameMatching::CaseInsensitive,
            BatchLimits::default(),
        );
        assert!(other.is_err());
    }
}
