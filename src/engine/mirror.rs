//! Traffic mirroring for shadow testing
//!
//! Sends all traffic to the configured subset while mirroring a copy to
//! the primary destination subset. Like fault injection, no dedup is done.

use crate::config::Settings;
use crate::model::{Destination, RouteDestination, Rule};

use super::{matching, Action, Change, RuleMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficMirror {
    pub host: String,
    pub subset: String,
    pub mirror_subset: String,
}

impl TrafficMirror {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            host: settings.host.clone(),
            subset: settings.subset_name.clone(),
            mirror_subset: settings.destination.clone(),
        }
    }

    pub fn build_rule(&self) -> Rule {
        Rule {
            route: vec![RouteDestination::new(Destination::new(
                &self.host,
                &self.subset,
            ))],
            mirror: Some(Destination::new(&self.host, &self.mirror_subset)),
            ..Default::default()
        }
    }
}

impl RuleMutation for TrafficMirror {
    const ACTION: Action = Action::TrafficMirror;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        tracing::info!(
            "Prepending mirror of {}/{} to {}/{}",
            self.host,
            self.subset,
            self.host,
            self.mirror_subset
        );
        matching::prepend(rules, self.build_rule())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrors_to_destination_subset() {
        let rule = TrafficMirror::from_settings(&Settings::default()).build_rule();

        assert!(rule.route[0].destination.is("user-service", "v2"));
        assert!(rule.mirror.as_ref().unwrap().is("user-service", "v1"));
        assert!(rule.matches.is_empty());
    }

    #[test]
    fn repeated_application_duplicates() {
        let mirror = TrafficMirror::from_settings(&Settings::default());
        let mut rules = Vec::new();
        assert_eq!(mirror.apply(&mut rules), Change::Inserted { index: 0 });
        assert_eq!(mirror.apply(&mut rules), Change::Inserted { index: 0 });
        assert_eq!(rules.len(), 2);
    }
}
