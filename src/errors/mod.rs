//! Error handling with miette diagnostics
//!
//! Every failure surfaced by the engine names the action that was running
//! and, for store failures, the resource it was touching.

pub mod suggestions;

use miette::Diagnostic;
use thiserror::Error;

use crate::engine::Action;
use crate::model::ResourceKind;
use crate::store::StoreError;

/// Main error type for meshroute
#[derive(Error, Debug, Diagnostic)]
pub enum MeshRouteError {
    /// Action selector not in the catalog
    #[error("Unknown action: '{action}'")]
    #[diagnostic(code(meshroute::config::unknown_action), help("{suggestion}"))]
    UnknownAction { action: String, suggestion: String },

    /// A numeric setting did not parse
    #[error("{}Invalid value for setting '{key}': '{value}' ({reason})", action_prefix(.action))]
    #[diagnostic(
        code(meshroute::config::invalid_setting),
        help("Set {key} to a base-10 integer, e.g. --set {key}=10")
    )]
    InvalidSetting {
        /// Action whose strategy needed the setting
        action: Option<Action>,
        key: String,
        value: String,
        reason: String,
    },

    /// Settings file or override could not be applied
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(meshroute::config::invalid), help("{suggestion}"))]
    InvalidConfig { message: String, suggestion: String },

    /// Target resource is absent from the store
    #[error("{action}: {kind} {resource} not found")]
    #[diagnostic(
        code(meshroute::store::not_found),
        help("Check the namespace and serviceName settings")
    )]
    NotFound {
        action: Action,
        kind: ResourceKind,
        resource: String,
    },

    /// Write rejected because the resource changed underneath us
    #[error("{action}: write to {kind} {resource} rejected: {message}")]
    #[diagnostic(
        code(meshroute::store::conflict),
        help("Another writer modified the resource; re-run the action to apply it on top")
    )]
    Conflict {
        action: Action,
        kind: ResourceKind,
        resource: String,
        message: String,
    },

    /// Create collided with an existing resource
    #[error("{action}: {kind} {resource} already exists")]
    #[diagnostic(code(meshroute::store::already_exists))]
    AlreadyExists {
        action: Action,
        kind: ResourceKind,
        resource: String,
    },

    /// Generic store communication failure
    #[error("{action}: store error on {kind} {resource}: {message}")]
    #[diagnostic(code(meshroute::store::transport))]
    Transport {
        action: Action,
        kind: ResourceKind,
        resource: String,
        message: String,
    },
}

impl MeshRouteError {
    /// Create an unknown action error with suggestions
    pub fn unknown_action(action: impl Into<String>) -> Self {
        let action = action.into();
        let names: Vec<&str> = Action::all().iter().map(|a| a.as_str()).collect();
        let suggestion = suggestions::suggest_action(&action, &names);

        Self::UnknownAction { action, suggestion }
    }

    pub fn invalid_setting(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::InvalidSetting {
            action: None,
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Name the action a configuration error was raised for
    pub fn for_action(mut self, failed: Action) -> Self {
        if let Self::InvalidSetting { action, .. } = &mut self {
            *action = Some(failed);
        }
        self
    }

    /// Attach action and resource context to a store failure
    pub fn from_store(
        action: Action,
        kind: ResourceKind,
        resource: impl Into<String>,
        err: StoreError,
    ) -> Self {
        let resource = resource.into();
        match err {
            StoreError::NotFound { .. } => Self::NotFound {
                action,
                kind,
                resource,
            },
            StoreError::Conflict { .. } => Self::Conflict {
                action,
                kind,
                resource,
                message: err.to_string(),
            },
            StoreError::AlreadyExists { .. } => Self::AlreadyExists {
                action,
                kind,
                resource,
            },
            StoreError::Transport(message) => Self::Transport {
                action,
                kind,
                resource,
                message,
            },
        }
    }

    /// Configuration errors are raised before any store call
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownAction { .. } | Self::InvalidSetting { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Action the error belongs to, for store-side failures
    pub fn action(&self) -> Option<Action> {
        match self {
            Self::NotFound { action, .. }
            | Self::Conflict { action, .. }
            | Self::AlreadyExists { action, .. }
            | Self::Transport { action, .. } => Some(*action),
            Self::InvalidSetting { action, .. } => *action,
            _ => None,
        }
    }
}

fn action_prefix(action: &Option<Action>) -> String {
    action.map(|a| format!("{}: ", a)).unwrap_or_default()
}

/// Render an error for the terminal with a contextual hint
pub fn format_error(err: &anyhow::Error) -> String {
    if let Some(err) = err.downcast_ref::<MeshRouteError>() {
        let hint = match err {
            MeshRouteError::UnknownAction { suggestion, .. }
            | MeshRouteError::InvalidConfig { suggestion, .. } => Some(suggestion.clone()),
            MeshRouteError::InvalidSetting { key, .. } => {
                Some(format!("Hint: fix {} in the settings file, environment or --set", key))
            }
            MeshRouteError::NotFound { .. } => Some(
                "Hint: run with --show-settings to check namespace and serviceName".to_string(),
            ),
            MeshRouteError::Conflict { .. } => {
                Some("Hint: the resource changed while applying; re-run the action".to_string())
            }
            _ => None,
        };

        return match hint {
            Some(hint) if !hint.is_empty() => format!("{}\n\n{}", err, hint),
            _ => err.to_string(),
        };
    }

    format!("{:#}", err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_suggests_closest() {
        let err = MeshRouteError::unknown_action("trafic-split");
        if let MeshRouteError::UnknownAction { suggestion, .. } = &err {
            assert!(suggestion.contains("traffic-split"));
        } else {
            panic!("Expected UnknownAction");
        }
        assert!(err.is_configuration());
    }

    #[test]
    fn store_errors_keep_action_context() {
        let err = MeshRouteError::from_store(
            Action::Timeout,
            ResourceKind::VirtualService,
            "default/user-service",
            StoreError::Transport("connection reset".to_string()),
        );
        assert_eq!(err.action(), Some(Action::Timeout));
        assert!(!err.is_configuration());
        let message = err.to_string();
        assert!(message.contains("timeout"));
        assert!(message.contains("default/user-service"));
        assert!(message.contains("connection reset"));
    }

    #[test]
    fn not_found_maps_to_not_found() {
        let err = MeshRouteError::from_store(
            Action::HeaderOverride,
            ResourceKind::VirtualService,
            "default/missing",
            StoreError::NotFound {
                kind: ResourceKind::VirtualService,
                namespace: "default".to_string(),
                name: "missing".to_string(),
            },
        );
        assert!(matches!(err, MeshRouteError::NotFound { .. }));
    }

    #[test]
    fn format_error_adds_hints() {
        let err = anyhow::Error::new(MeshRouteError::invalid_setting(
            "weight1",
            "ninety",
            "invalid digit found in string",
        ));
        let formatted = format_error(&err);
        assert!(formatted.contains("weight1"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn invalid_setting_names_action_once_known() {
        let err = MeshRouteError::invalid_setting("weight1", "ninety", "invalid digit");
        assert_eq!(err.action(), None);
        assert!(err.to_string().starts_with("Invalid value for setting 'weight1'"));

        let err = err.for_action(Action::TrafficSplit);
        assert_eq!(err.action(), Some(Action::TrafficSplit));
        assert!(err.to_string().starts_with("traffic-split: Invalid value"));
        assert!(err.is_configuration());
    }

    #[test]
    fn format_error_passes_through_foreign_errors() {
        let err = anyhow::anyhow!("disk full");
        assert_eq!(format_error(&err), "disk full");
    }
}
