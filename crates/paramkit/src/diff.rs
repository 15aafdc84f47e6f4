//! Diff computation between desired and live parameters

use crate::error::{Error, Result};
use crate::model::{ApplyTiming, CurrentState, DesiredState, Parameter, Provenance};
use serde::{Deserialize, Serialize};

/// The difference between a desired and a current parameter set
///
/// Every name in `desired` plus every user-defined name in `current`
/// appears in exactly one of the three lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// New or changed values, carrying the desired value and timing
    pub to_modify: Vec<Parameter>,
    /// User-defined parameters no longer desired; revert to engine default
    pub to_reset: Vec<String>,
    /// Desired parameters whose live value already matches
    pub unchanged: Vec<String>,
    /// Whether `to_reset` covers every user-defined parameter of the group
    /// while nothing is modified, so a single reset-all call is equivalent
    pub resets_all_user_parameters: bool,
}

impl ChangeSet {
    /// Check if applying this change set would do anything
    pub fn has_changes(&self) -> bool {
        !self.to_modify.is_empty() || !self.to_reset.is_empty()
    }

    /// Names that are out of sync with the desired state
    pub fn pending_names(&self) -> Vec<&str> {
        self.to_modify
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.to_reset.iter().map(String::as_str))
            .collect()
    }

    /// Count changes by kind
    pub fn summary(&self) -> ChangeSummary {
        let deferred = self
            .to_modify
            .iter()
            .filter(|p| p.apply_timing == ApplyTiming::Deferred)
            .count();
        ChangeSummary {
            immediate: self.to_modify.len() - deferred,
            deferred,
            resets: self.to_reset.len(),
            unchanged: self.unchanged.len(),
        }
    }
}

/// Change set statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub immediate: usize,
    pub deferred: usize,
    pub resets: usize,
    pub unchanged: usize,
}

impl ChangeSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.immediate + self.deferred + self.resets
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Compute the change set that takes `current` to `desired`
///
/// Pure function. Parameters that are engine defaults or system managed and
/// not desired are left alone. Output lists follow name order.
pub fn diff(desired: &DesiredState, current: &CurrentState) -> Result<ChangeSet> {
    if desired.matching() != current.matching() {
        return Err(Error::invalid(
            "desired and current state use different name matching policies",
        ));
    }

    let mut changes = ChangeSet::default();
    let mut unchanged_user_defined = false;

    for (name, entry) in desired.iter() {
        match current.get(name) {
            Some(live) if live.value == entry.value => {
                unchanged_user_defined |= live.provenance.is_user_defined();
                changes.unchanged.push(name.to_string());
            }
            _ => changes.to_modify.push(Parameter {
                name: name.to_string(),
                value: entry.value.clone(),
                apply_timing: entry.apply_timing,
                provenance: Provenance::UserDefined,
            }),
        }
    }

    for (name, _) in current.user_defined() {
        if !desired.contains(name) {
            changes.to_reset.push(name.to_string());
        }
    }

    changes.resets_all_user_parameters =
        changes.to_modify.is_empty() && !changes.to_reset.is_empty() && !unchanged_user_defined;

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NameMatching;
    use std::collections::BTreeSet;

    const M: NameMatching = NameMatching::CaseInsensitive;

    fn desired(entries: &[(&str, &str, ApplyTiming)]) -> DesiredState {
        DesiredState::from_entries(M, entries.iter().copied()).unwrap()
    }

    fn current(params: Vec<Parameter>) -> CurrentState {
        CurrentState::from_parameters(M, params).unwrap()
    }

    fn system(name: &str, value: &str) -> Parameter {
        Parameter {
            name: name.into(),
            value: value.into(),
            apply_timing: ApplyTiming::Immediate,
            provenance: Provenance::System,
        }
    }

    fn names(list: impl IntoIterator<Item = impl AsRef<str>>) -> BTreeSet<String> {
        list.into_iter().map(|n| n.as_ref().to_string()).collect()
    }

    #[test]
    fn test_new_changed_and_unchanged() {
        let d = desired(&[
            ("character_set_server", "utf8", ApplyTiming::Immediate),
            ("character_set_client", "utf8", ApplyTiming::Immediate),
            ("max_connections", "200", ApplyTiming::Deferred),
        ]);
        let c = current(vec![
            Parameter::user("character_set_server", "ascii", ApplyTiming::Immediate),
            Parameter::user("character_set_client", "utf8", ApplyTiming::Immediate),
        ]);

        let changes = diff(&d, &c).unwrap();

        assert_eq!(
            names(changes.to_modify.iter().map(|p| &p.name)),
            names(["character_set_server", "max_connections"])
        );
        assert_eq!(names(&changes.unchanged), names(["character_set_client"]));
        assert!(changes.to_reset.is_empty());

        let max = changes
            .to_modify
            .iter()
            .find(|p| p.name == "max_connections")
            .unwrap();
        assert_eq!(max.value, "200");
        assert_eq!(max.apply_timing, ApplyTiming::Deferred);
        assert_eq!(max.provenance, Provenance::UserDefined);
    }

    #[test]
    fn test_user_defined_not_desired_is_reset() {
        let d = desired(&[("character_set_client", "utf8", ApplyTiming::Immediate)]);
        let c = current(vec![
            Parameter::user("character_set_client", "utf8", ApplyTiming::Immediate),
            Parameter::user("character_set_results", "utf8", ApplyTiming::Immediate),
        ]);

        let changes = diff(&d, &c).unwrap();
        assert_eq!(changes.to_reset, vec!["character_set_results".to_string()]);
        assert!(!changes.resets_all_user_parameters);
    }

    #[test]
    fn test_defaults_and_system_ignored() {
        let d = desired(&[]);
        let c = current(vec![
            Parameter::engine_default("max_connections", "100"),
            system("rds.extensions", "pg_stat_statements"),
        ]);

        let changes = diff(&d, &c).unwrap();
        assert!(!changes.has_changes());
        assert!(changes.unchanged.is_empty());
    }

    #[test]
    fn test_desired_matching_engine_default_is_unchanged() {
        let d = desired(&[("client_encoding", "UTF8", ApplyTiming::Deferred)]);
        let c = current(vec![Parameter::engine_default("client_encoding", "UTF8")]);

        let changes = diff(&d, &c).unwrap();
        assert_eq!(changes.unchanged, vec!["client_encoding".to_string()]);
        assert!(!changes.has_changes());
    }

    #[test]
    fn test_case_insensitive_names_match() {
        let d = desired(&[("Max_connections", "100", ApplyTiming::Deferred)]);
        let c = current(vec![Parameter::user(
            "max_connections",
            "100",
            ApplyTiming::Deferred,
        )]);

        let changes = diff(&d, &c).unwrap();
        assert_eq!(changes.unchanged, vec!["max_connections".to_string()]);
        assert!(changes.to_reset.is_empty());
    }

    #[test]
    fn test_case_sensitive_names_differ() {
        let m = NameMatching::CaseSensitive;
        let d = DesiredState::from_entries(m, [("TimeZone", "UTC", ApplyTiming::Immediate)])
            .unwrap();
        let c = CurrentState::from_parameters(
            m,
            [Parameter::user("timezone", "UTC", ApplyTiming::Immediate)],
        )
        .unwrap();

        let changes = diff(&d, &c).unwrap();
        assert_eq!(changes.to_modify.len(), 1);
        assert_eq!(changes.to_modify[0].name, "TimeZone");
        assert_eq!(changes.to_reset, vec!["timezone".to_string()]);
    }

    #[test]
    fn test_mismatched_matching_policies() {
        let d = DesiredState::new(NameMatching::CaseSensitive);
        let c = CurrentState::new(NameMatching::CaseInsensitive);
        assert!(matches!(
            diff(&d, &c),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_resets_all_user_parameters() {
        let d = desired(&[("max_connections", "100", ApplyTiming::Deferred)]);
        let c = current(vec![
            Parameter::engine_default("max_connections", "100"),
            Parameter::user("work_mem", "8192", ApplyTiming::Immediate),
            Parameter::user("timezone", "UTC", ApplyTiming::Immediate),
        ]);

        let changes = diff(&d, &c).unwrap();
        assert!(changes.resets_all_user_parameters);
        assert_eq!(names(&changes.to_reset), names(["timezone", "work_mem"]));

        // Nothing to reset means reset-all is never chosen
        let changes = diff(&d, &current(vec![])).unwrap();
        assert!(!changes.resets_all_user_parameters);
    }

    #[test]
    fn test_partition_is_complete_and_disjoint() {
        let d = desired(&[
            ("a", "1", ApplyTiming::Immediate),
            ("b", "2", ApplyTiming::Deferred),
            ("c", "3", ApplyTiming::Immediate),
            ("d", "4", ApplyTiming::Immediate),
        ]);
        let c = current(vec![
            Parameter::user("a", "1", ApplyTiming::Immediate),
            Parameter::user("b", "0", ApplyTiming::Deferred),
            Parameter::user("e", "5", ApplyTiming::Immediate),
            Parameter::engine_default("c", "3"),
            Parameter::engine_default("f", "6"),
            system("g", "7"),
        ]);

        let changes = diff(&d, &c).unwrap();
        let modify = names(changes.to_modify.iter().map(|p| &p.name));
        let reset = names(&changes.to_reset);
        let unchanged = names(&changes.unchanged);

        assert!(modify.is_disjoint(&reset));
        assert!(modify.is_disjoint(&unchanged));
        assert!(reset.is_disjoint(&unchanged));

        let all: BTreeSet<String> = modify
            .union(&reset)
            .cloned()
            .collect::<BTreeSet<_>>()
            .union(&unchanged)
            .cloned()
            .collect();
        let expected: BTreeSet<String> = names(d.names())
            .union(&names(["a", "b", "e"]))
            .cloned()
            .collect();
        assert_eq!(all, expected);
        assert_eq!(
            changes.to_modify.len() + changes.to_reset.len() + changes.unchanged.len(),
            expected.len()
        );
    }

    #[test]
    fn test_rediff_after_apply_is_empty() {
        let d = desired(&[
            ("a", "1", ApplyTiming::Immediate),
            ("b", "2", ApplyTiming::Deferred),
        ]);
        let c = current(vec![
            Parameter::user("b", "0", ApplyTiming::Deferred),
            Parameter::user("z", "9", ApplyTiming::Immediate),
            Parameter::engine_default("y", "8"),
        ]);

        let changes = diff(&d, &c).unwrap();

        // Apply conceptually: modified values become user-defined, resets drop out
        let mut applied: Vec<Parameter> = c
            .iter()
            .filter(|(n, _)| !changes.to_reset.iter().any(|r| r.as_str() == *n))
            .filter(|(n, _)| !changes.to_modify.iter().any(|p| p.name == *n))
            .map(|(_, p)| p.clone())
            .collect();
        applied.extend(changes.to_modify.iter().cloned());

        let again = diff(&d, &current(applied)).unwrap();
        assert!(again.to_modify.is_empty());
        assert!(again.to_reset.is_empty());
    }

    #[test]
    fn test_summary() {
        let d = desired(&[
            ("a", "1", ApplyTiming::Immediate),
            ("b", "2", ApplyTiming::Deferred),
            ("c", "3", ApplyTiming::Deferred),
        ]);
        let c = current(vec![Parameter::user("x", "1", ApplyTiming::Immediate)]);

        let summary = diff(&d, &c).unwrap().summary();
        assert_eq!(summary.immediate, 1);
        assert_eq!(summary.deferred, 2);
        assert_eq!(summary.resets, 1);
        assert_eq!(summary.total(), 4);
        assert!(summary.has_changes());
    }
}
