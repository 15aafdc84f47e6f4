//! Parameter definitions for an engine family
//!
//! The apply timing of a parameter belongs to its definition: static
//! parameters only ever change on restart, dynamic parameters let the caller
//! choose. The catalog resolves the timing each desired parameter is sent with.

use crate::error::{Error, Result};
use crate::model::{ApplyTiming, DesiredParameter, DesiredState, NameMatching};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether an engine parameter can change on a running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyType {
    /// Requires a restart; always deferred
    Static,
    /// Can be applied immediately or deferred, caller's choice
    Dynamic,
}

/// Definition of one parameter for an engine family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDefinition {
    pub name: String,
    pub apply_type: ApplyType,
}

/// Known parameter definitions, keyed by normalized name
#[derive(Debug, Clone, Default)]
pub struct ParameterCatalog {
    matching: NameMatching,
    definitions: BTreeMap<String, ParameterDefinition>,
}

impl ParameterCatalog {
    /// Create an empty catalog; every parameter is treated as dynamic
    pub fn new(matching: NameMatching) -> Self {
        Self {
            matching,
            definitions: BTreeMap::new(),
        }
    }

    /// Build a catalog from definitions
    pub fn from_definitions<I>(matching: NameMatching, definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = ParameterDefinition>,
    {
        let mut catalog = Self::new(matching);
        for definition in definitions {
            catalog.add(definition)?;
        }
        Ok(catalog)
    }

    /// Add a definition; defining the same parameter twice is an error
    pub fn add(&mut self, definition: ParameterDefinition) -> Result<()> {
        let key = self.matching.normalize(&definition.name);
        if self.definitions.contains_key(&key) {
            return Err(Error::invalid(format!(
                "parameter {} is defined twice",
                definition.name
            )));
        }
        self.definitions.insert(key, definition);
        Ok(())
    }

    /// Look up a definition by name
    pub fn get(&self, name: &str) -> Option<&ParameterDefinition> {
        self.definitions.get(&self.matching.normalize(name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Resolve the apply timing for a parameter
    ///
    /// Unknown parameters behave like dynamic ones. Asking for an immediate
    /// change of a static parameter is a configuration error.
    pub fn resolve_timing(
        &self,
        name: &str,
        requested: Option<ApplyTiming>,
    ) -> Result<ApplyTiming> {
        let apply_type = self
            .get(name)
            .map_or(ApplyType::Dynamic, |d| d.apply_type);

        match (apply_type, requested) {
            (ApplyType::Static, Some(ApplyTiming::Immediate)) => Err(Error::invalid(format!(
                "parameter {name} is static and cannot be applied immediately"
            ))),
            (ApplyType::Static, _) => Ok(ApplyTiming::Deferred),
            (ApplyType::Dynamic, requested) => Ok(requested.unwrap_or_default()),
        }
    }

    /// Build a [`DesiredState`] with every timing resolved against this catalog
    pub fn desired_state<'a, I>(&self, parameters: I) -> Result<DesiredState>
    where
        I: IntoIterator<Item = &'a DesiredParameter>,
    {
        let mut desired = DesiredState::new(self.matching);
        for parameter in parameters {
            let timing = self.resolve_timing(&parameter.name, parameter.apply_timing)?;
            desired.insert(parameter.name.as_str(), parameter.value.as_str(), timing)?;
        }
        Ok(desired)
    }
}
