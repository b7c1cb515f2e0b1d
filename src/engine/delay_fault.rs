//! Fixed-delay fault injection for diagnostic traffic
//!
//! Every application prepends a new rule; existing fault rules are not
//! searched for, so applying twice yields two rules.

use std::time::Duration;

use crate::config::Settings;
use crate::errors::MeshRouteError;
use crate::model::{
    Destination, FaultDelay, FaultInjection, MatchPredicate, RouteDestination, Rule,
};

use super::{matching, Action, Change, RuleMutation};

/// Header selecting requests that receive the injected delay
pub const FAULT_HEADER: (&str, &str) = ("x-user-type", "test");

/// Share of matching requests that are delayed
pub const FAULT_PERCENT: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelayFault {
    pub host: String,
    pub subset: String,
    pub delay: Duration,
}

impl DelayFault {
    pub fn from_settings(settings: &Settings) -> Result<Self, MeshRouteError> {
        Ok(Self {
            host: settings.host.clone(),
            subset: settings.subset_name.clone(),
            delay: settings.fault_delay()?,
        })
    }

    pub fn build_rule(&self) -> Rule {
        let (header, value) = FAULT_HEADER;
        Rule {
            matches: vec![MatchPredicate::header(header, value)],
            fault: Some(FaultInjection {
                delay: Some(FaultDelay {
                    percent: FAULT_PERCENT,
                    fixed_delay: self.delay,
                }),
            }),
            route: vec![RouteDestination::new(Destination::new(
                &self.host,
                &self.subset,
            ))],
            ..Default::default()
        }
    }
}

impl RuleMutation for DelayFault {
    const ACTION: Action = Action::DelayFault;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        tracing::info!("Prepending {:?} delay fault for {}", self.delay, self.host);
        matching::prepend(rules, self.build_rule())
    }
}
