//! Request timeout on rules routing the target path

use std::time::Duration;

use crate::config::Settings;
use crate::errors::MeshRouteError;
use crate::model::Rule;

use super::{matching, Action, Change, RuleMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTimeout {
    pub prefix: String,
    pub timeout: Duration,
}

impl RouteTimeout {
    pub fn from_settings(settings: &Settings) -> Result<Self, MeshRouteError> {
        Ok(Self {
            prefix: settings.target_prefix.clone(),
            timeout: settings.request_timeout()?,
        })
    }
}

impl RuleMutation for RouteTimeout {
    const ACTION: Action = Action::Timeout;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        let indices = matching::update_prefixed(rules, &self.prefix, |rule| {
            rule.timeout = Some(self.timeout);
        });

        if indices.is_empty() {
            tracing::warn!("No rule matches prefix {}, timeout not set", self.prefix);
        } else {
            tracing::info!("Set timeout {:?} on rules {:?}", self.timeout, indices);
        }

        // Written back even when nothing matched
        Change::UpdatedInPlace { indices }
    }
}
