//! Weighted A/B traffic split between subsets v1 and v2

use crate::config::Settings;
use crate::errors::MeshRouteError;
use crate::model::{Destination, RouteDestination, Rule};

use super::matching::{self, SPLIT_SUBSETS};
use super::{Action, Change, RuleMutation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficSplit {
    pub host: String,
    pub weight1: i32,
    pub weight2: i32,
}

impl TrafficSplit {
    /// Fails when either weight is not a 32-bit base-10 integer
    pub fn from_settings(settings: &Settings) -> Result<Self, MeshRouteError> {
        let (weight1, weight2) = settings.traffic_weights()?;
        Ok(Self {
            host: settings.host.clone(),
            weight1,
            weight2,
        })
    }

    pub fn build_rule(&self) -> Rule {
        let (v1, v2) = SPLIT_SUBSETS;
        Rule {
            route: vec![
                RouteDestination::weighted(Destination::new(&self.host, v1), self.weight1),
                RouteDestination::weighted(Destination::new(&self.host, v2), self.weight2),
            ],
            ..Default::default()
        }
    }
}

impl RuleMutation for TrafficSplit {
    const ACTION: Action = Action::TrafficSplit;

    fn apply(&self, rules: &mut Vec<Rule>) -> Change {
        if let Some(index) = rules
            .iter()
            .position(|rule| matching::is_split_of(rule, &self.host))
        {
            // Weights are assigned by position, whatever order the subsets are in
            let route = &mut rules[index].route;
            route[0].weight = Some(self.weight1);
            route[1].weight = Some(self.weight2);

            tracing::info!("Existing traffic split at position {}, updating weights", index);
            return Change::UpdatedInPlace {
                indices: vec![index],
            };
        }

        tracing::info!("No existing traffic split found, appending A/B rule");
        matching::append(rules, self.build_rule())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::matching::fixtures::{prefixed_rule, split_rule};

    fn split(weight1: i32, weight2: i32) -> TrafficSplit {
        TrafficSplit {
            host: "user-service".to_string(),
            weight1,
            weight2,
        }
    }

    #[test]
    fn appends_when_absent() {
        let mut rules = vec![prefixed_rule("/user/users")];
        let change = split(90, 10).apply(&mut rules);

        assert_eq!(change, Change::Appended { index: 1 });
        assert_eq!(rules[1], split_rule("user-service", ("v1", 90), ("v2", 10)));
    }

    #[test]
    fn updates_existing_split_in_place() {
        let mut rules = Vec::new();
        split(90, 10).apply(&mut rules);
        let change = split(50, 50).apply(&mut rules);

        assert_eq!(change, Change::UpdatedInPlace { indices: vec![0] });
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].route[0].weight, Some(50));
        assert_eq!(rules[0].route[1].weight, Some(50));
    }

    #[test]
    fn reversed_split_is_updated_positionally() {
        let mut rules = vec![split_rule("user-service", ("v2", 10), ("v1", 90))];
        split(70, 30).apply(&mut rules);

        assert_eq!(rules[0].route[0].destination.subset.as_deref(), Some("v2"));
        assert_eq!(rules[0].route[0].weight, Some(70));
        assert_eq!(rules[0].route[1].weight, Some(30));
    }

    #[test]
    fn only_first_split_is_updated() {
        let mut rules = vec![
            split_rule("user-service", ("v1", 1), ("v2", 99)),
            split_rule("user-service", ("v1", 2), ("v2", 98)),
        ];
        split(60, 40).apply(&mut rules);

        assert_eq!(rules[0].route[0].weight, Some(60));
        assert_eq!(rules[1].route[0].weight, Some(2));
    }

    #[test]
    fn split_for_other_host_is_ignored() {
        let mut rules = vec![split_rule("payments", ("v1", 90), ("v2", 10))];
        let change = split(50, 50).apply(&mut rules);

        assert_eq!(change, Change::Appended { index: 1 });
        assert_eq!(rules[0].route[0].weight, Some(90));
    }

    #[test]
    fn invalid_weight_fails_construction() {
        let mut settings = Settings::default();
        settings.weight2 = "ten".to_string();
        assert!(TrafficSplit::from_settings(&settings)
            .unwrap_err()
            .is_configuration());
    }
}
