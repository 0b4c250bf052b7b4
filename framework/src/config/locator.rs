//! Locator configuration

use serde::{Deserialize, Serialize};

use super::env::{env_list, env_optional, Environment};
use crate::container::provider::{Registration, RegistrationFlags};

/// Settings that shape the configuration pass and injection logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Detected environment; supplies the editor mode default
    #[serde(skip, default = "Environment::detect")]
    pub environment: Environment,
    /// Editor mode; editor-only registrations are created only when set
    pub editor: bool,
    /// Allow-list of registration groups; empty admits every group
    pub groups: Vec<String>,
    /// Run every injection inside a `tracing` debug span
    pub trace_injection: bool,
}

impl LocatorConfig {
    /// Build config from environment variables
    ///
    /// Reads `PLINTH_ENV`, `PLINTH_EDITOR`, `PLINTH_GROUPS` (comma separated)
    /// and `PLINTH_TRACE_INJECTION`. Editor mode follows the environment
    /// unless `PLINTH_EDITOR` says otherwise.
    pub fn from_env() -> Self {
        Self::for_environment(Environment::detect())
    }

    /// Like [`from_env`](LocatorConfig::from_env) with a known environment
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            editor: env_optional("PLINTH_EDITOR").unwrap_or(environment.is_editor()),
            groups: env_list("PLINTH_GROUPS"),
            trace_injection: env_optional("PLINTH_TRACE_INJECTION").unwrap_or(false),
            environment,
        }
    }

    /// Create a builder for customizing config
    pub fn builder() -> LocatorConfigBuilder {
        LocatorConfigBuilder::default()
    }

    /// Whether the configuration pass may create `registration`
    pub fn admits(&self, registration: &Registration) -> bool {
        if registration.flags().contains(RegistrationFlags::EDITOR_ONLY) && !self.editor {
            return false;
        }
        self.groups.is_empty()
            || self
                .groups
                .iter()
                .any(|group| group == registration.group_name())
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Player,
            editor: false,
            groups: Vec::new(),
            trace_injection: false,
        }
    }
}

/// Builder for LocatorConfig
#[derive(Default)]
pub struct LocatorConfigBuilder {
    environment: Option<Environment>,
    editor: Option<bool>,
    groups: Option<Vec<String>>,
    trace_injection: Option<bool>,
}

impl LocatorConfigBuilder {
    /// Set the environment
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Enable or disable editor mode
    pub fn editor(mut self, editor: bool) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Restrict the configuration pass to these groups
    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable injection spans
    pub fn trace_injection(mut self, trace: bool) -> Self {
        self.trace_injection = Some(trace);
        self
    }

    /// Build the LocatorConfig
    ///
    /// Unset fields fall back to environment variables.
    pub fn build(self) -> LocatorConfig {
        let default = match self.environment {
            Some(environment) => LocatorConfig::for_environment(environment),
            None => LocatorConfig::from_env(),
        };
        LocatorConfig {
            environment: default.environment,
            editor: self.editor.unwrap_or(default.editor),
            groups: self.groups.unwrap_or(default.groups),
            trace_injection: self.trace_injection.unwrap_or(default.trace_injection),
        }
    }
}
