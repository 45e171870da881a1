//! Action catalog
//!
//! Actions are defined out-of-band (stack metadata) and looked up by name.
//! A definition declares the inputs an action expects, the service/component
//! it targets, and its host selection policy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stagecast_api::TargetHostType;

/// Catalog entry for a named action.
///
/// `inputs` is a comma-separated list of parameter names; a name wrapped in
/// brackets (`[config_type]`) marks that input optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<String>,
    /// Empty or absent means unconstrained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_component: Option<String>,
    pub target_type: TargetHostType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ActionDefinition {
    /// Create a definition with the given selection policy
    pub fn new(name: impl Into<String>, target_type: TargetHostType) -> Self {
        Self {
            name: name.into(),
            inputs: None,
            target_service: None,
            target_component: None,
            target_type,
            description: None,
        }
    }

    /// Declare the action's inputs, e.g. `"threshold,[verbose]"`
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl Into<String>) -> Self {
        self.inputs = Some(inputs.into());
        self
    }

    /// Constrain the action to a service
    #[must_use]
    pub fn with_target_service(mut self, service: impl Into<String>) -> Self {
        self.target_service = Some(service.into());
        self
    }

    /// Constrain the action to a component
    #[must_use]
    pub fn with_target_component(mut self, component: impl Into<String>) -> Self {
        self.target_component = Some(component.into());
        self
    }

    /// Describe the action
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declared target service, empty string when unconstrained
    #[must_use]
    pub fn target_service_name(&self) -> &str {
        self.target_service.as_deref().unwrap_or("")
    }

    /// Declared target component, empty string when unconstrained
    #[must_use]
    pub fn target_component_name(&self) -> &str {
        self.target_component.as_deref().unwrap_or("")
    }

    /// Input names the caller must supply (bracketed entries are optional
    /// and skipped here)
    #[must_use]
    pub fn mandatory_inputs(&self) -> Vec<&str> {
        let Some(inputs) = self.inputs.as_deref() else {
            return Vec::new();
        };
        inputs
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| !(name.starts_with('[') && name.ends_with(']')))
            .collect()
    }
}

/// Lookup of action definitions by name.
pub trait ActionCatalog: Send + Sync {
    /// Definition for the named action, if registered
    fn lookup(&self, action: &str) -> Option<ActionDefinition>;
}

/// In-memory [`ActionCatalog`].
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    actions: HashMap<String, ActionDefinition>,
}

impl StaticCatalog {
    /// Create an empty catalog
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous entry with the same name
    #[must_use]
    pub fn with_action(mut self, definition: ActionDefinition) -> Self {
        self.actions.insert(definition.name.clone(), definition);
        self
    }
}

impl ActionCatalog for StaticCatalog {
    fn lookup(&self, action: &str) -> Option<ActionDefinition> {
        self.actions.get(action).cloned()
    }
}
