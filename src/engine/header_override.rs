//! Header-based override routing
//!
//! Requests carrying the configured header value and URI prefix are
//! rewritten and sent to a named subset. The rule is inserted ahead of all
//! others so it is evaluated before generic routes, and only when no
//! equivalent rule already exists.

use crate::config::Settings;
use crate::model::{Destination, MatchPredicate, Rewrite, RouteDestination, Rule};

use super::{matching, Action, Change, RuleMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderOverride {
    pub header_name: String,
    pub header_value: String,
    pub prefix: String,
    pub rewrite: String,
    pub host: String,
    pub subset: String,
}

impl HeaderOverride {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            header_name: settings.header_name.clone(),
            header_value: settings.header_value.clone(),
            prefix: settings.target_prefix.clone(),
            rewrite: settings.target_rewrite.clone(),
            host: settings.host.clone(),
            subset: settings.subset_name.clone(),
        }
    }

    fn predicate_matches(&self, predicate: &MatchPredicate) -> bool {
        predicate.header_exact(&self.header_name) == Some(self.header_value.as_str())
            && predicate.uri_prefix() == Some(self.prefix.as_str())
    }

    /// Whether `rule` already realizes this override
    pub fn is_equivalent(&self, rule: &Rule) -> bool {
        rule.matches.iter().any(|p| self.predicate_matches(p))
            && rule.rewrite_uri() == Some(self.rewrite.as_str())
            && rule.routes_to(&self.host, &self.subset)
    }

    /// Index of the first equivalent rule
    pub fn find_equivalent(&self, rules: &[Rule]) -> Option<usize> {
        rules.iter().position(|rule| self.is_equivalent(rule))
    }

    pub fn build_rule(&self) -> Rule {
        Rule {
            matches: vec![MatchPredicate::header(&self.header_name, &self.header_value)
                .with_uri_prefix(&self.prefix)],
            rewrite: Some(Rewrite {
                uri: self.rewrite.clone(),
            }),
            route: vec![RouteDestination::new(Destination::new(
                &self.host,
                &self.subset,
            ))],
            ..Default::default()
        }
    }
}

impl RuleMutation for HeaderOverride {
    const ACTION: Action = Action::HeaderOverride;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        if let Some(index) = self.find_equivalent(rules) {
            tracing::info!(
                "Matching header-based route already exists at position {}",
                index
            );
            return Change::Unchanged;
        }

        tracing::info!("No matching route found, adding header-based route");
        matching::prepend(rules, self.build_rule())
    }
}
