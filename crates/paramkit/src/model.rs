//! Parameter model - parameters, groups, desired and current state

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// When a parameter change takes effect on the live engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyTiming {
    /// Takes effect as soon as the remote call succeeds
    #[default]
    Immediate,
    /// Takes effect only after the next restart
    Deferred,
}

impl fmt::Display for ApplyTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Deferred => write!(f, "deferred"),
        }
    }
}

/// Where a live parameter's current value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Explicitly set by the user
    UserDefined,
    /// The engine's built-in default
    EngineDefault,
    /// Managed by the service itself
    System,
}

impl Provenance {
    /// Only user-defined parameters are under the caller's control
    pub fn is_user_defined(&self) -> bool {
        matches!(self, Self::UserDefined)
    }
}

/// How parameter names are compared within a group
///
/// Engine-family dependent, so it is configuration rather than a constant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameMatching {
    /// `Max_Connections` and `max_connections` are different parameters
    CaseSensitive,
    /// Names are folded to lowercase before comparison
    #[default]
    CaseInsensitive,
}

impl NameMatching {
    /// The key a name is stored and compared under
    pub fn normalize(&self, name: &str) -> String {
        match self {
            Self::CaseSensitive => name.to_string(),
            Self::CaseInsensitive => name.to_lowercase(),
        }
    }

    /// Check whether two names refer to the same parameter
    pub fn matches(&self, a: &str, b: &str) -> bool {
        match self {
            Self::CaseSensitive => a == b,
            Self::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }
}

/// A single engine parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub apply_timing: ApplyTiming,
    pub provenance: Provenance,
}

impl Parameter {
    /// Create a user-defined parameter
    pub fn user(name: impl Into<String>, value: impl Into<String>, timing: ApplyTiming) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            apply_timing: timing,
            provenance: Provenance::UserDefined,
        }
    }

    /// Create a parameter holding the engine default
    pub fn engine_default(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            apply_timing: ApplyTiming::Immediate,
            provenance: Provenance::EngineDefault,
        }
    }
}

/// A named collection of engine parameters for one engine family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub name: String,
    pub family: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ParameterGroup {
    /// Create an empty group
    pub fn new(name: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            parameters: Vec::new(),
        }
    }

    /// Find a parameter by name
    pub fn get(&self, name: &str, matching: NameMatching) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| matching.matches(&p.name, name))
    }

    /// Insert a parameter, replacing any existing one with the same name
    ///
    /// Replacement keeps the existing position so the group stays ordered.
    pub fn upsert(&mut self, parameter: Parameter, matching: NameMatching) {
        match self
            .parameters
            .iter_mut()
            .find(|p| matching.matches(&p.name, &parameter.name))
        {
            Some(existing) => *existing = parameter,
            None => self.parameters.push(parameter),
        }
    }

    /// Remove a parameter by name, returning it if present
    pub fn remove(&mut self, name: &str, matching: NameMatching) -> Option<Parameter> {
        let idx = self
            .parameters
            .iter()
            .position(|p| matching.matches(&p.name, name))?;
        Some(self.parameters.remove(idx))
    }

    /// Snapshot the group as a [`CurrentState`] for diffing
    pub fn current_state(&self, matching: NameMatching) -> Result<CurrentState> {
        CurrentState::from_parameters(matching, self.parameters.iter().cloned())
    }
}

/// One desired parameter as written by the caller, before its timing is resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredParameter {
    pub name: String,
    pub value: String,
    /// Only honoured where the parameter definition allows a choice
    #[serde(default)]
    pub apply_timing: Option<ApplyTiming>,
}

/// Desired value and resolved apply timing for one parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredEntry {
    pub value: String,
    pub apply_timing: ApplyTiming,
}

/// Caller-supplied mapping of parameter name to desired value and timing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    matching: NameMatching,
    entries: BTreeMap<String, DesiredEntry>,
}

impl DesiredState {
    /// Create an empty desired state
    pub fn new(matching: NameMatching) -> Self {
        Self {
            matching,
            entries: BTreeMap::new(),
        }
    }

    /// Build a desired state from `(name, value, timing)` triples
    pub fn from_entries<I, N, V>(matching: NameMatching, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V, ApplyTiming)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut state = Self::new(matching);
        for (name, value, timing) in entries {
            state.insert(name, value, timing)?;
        }
        Ok(state)
    }

    /// Add a parameter
    ///
    /// Returns `InvalidConfiguration` for an empty name or a name that is
    /// already present under this state's matching policy.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        timing: ApplyTiming,
    ) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::invalid("desired parameter with an empty name"));
        }

        let key = self.matching.normalize(&name);
        if self.entries.contains_key(&key) {
            return Err(Error::invalid(format!(
                "duplicate desired parameter: {name}"
            )));
        }

        self.entries.insert(
            key,
            DesiredEntry {
                value: value.into(),
                apply_timing: timing,
            },
        );
        Ok(())
    }

    /// Look up a desired parameter by name
    pub fn get(&self, name: &str) -> Option<&DesiredEntry> {
        self.entries.get(&self.matching.normalize(name))
    }

    /// Check if a parameter is desired
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Name matching policy of this state
    pub fn matching(&self) -> NameMatching {
        self.matching
    }

    /// Iterate over `(normalized name, entry)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DesiredEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Normalized names of all desired parameters
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Live parameters of a group, keyed by normalized name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    matching: NameMatching,
    parameters: BTreeMap<String, Parameter>,
}

impl CurrentState {
    /// Create an empty current state
    pub fn new(matching: NameMatching) -> Self {
        Self {
            matching,
            parameters: BTreeMap::new(),
        }
    }

    /// Build a current state from live parameters
    pub fn from_parameters<I>(matching: NameMatching, parameters: I) -> Result<Self>
    where
        I: IntoIterator<Item = Parameter>,
    {
        let mut state = Self::new(matching);
        for parameter in parameters {
            state.insert(parameter)?;
        }
        Ok(state)
    }

    /// Add a live parameter; two parameters with the same name are an error
    pub fn insert(&mut self, parameter: Parameter) -> Result<()> {
        let key = self.matching.normalize(&parameter.name);
        if self.parameters.contains_key(&key) {
            return Err(Error::invalid(format!(
                "live state lists parameter {} twice",
                parameter.name
            )));
        }
        self.parameters.insert(key, parameter);
        Ok(())
    }

    /// Look up a live parameter by name
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(&self.matching.normalize(name))
    }

    /// Name matching policy of this state
    pub fn matching(&self) -> NameMatching {
        self.matching
    }

    /// Iterate over `(normalized name, parameter)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parameters the caller controls
    pub fn user_defined(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.iter().filter(|(_, p)| p.provenance.is_user_defined())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}
