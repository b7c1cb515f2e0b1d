//! Integration tests for the route mutation engine
//!
//! Exercises each action end-to-end against the memory store:
//! - Idempotence of header override
//! - Duplication of fault and mirror rules
//! - Traffic split convergence
//! - Priority ordering of prepended rules
//! - Prefix-scoped timeout and retry updates
//! - Circuit breaker create-once behavior
//! - Configuration errors raised before any store call
//! - Stale writes surfaced without retry

use std::time::Duration;

use async_trait::async_trait;
use meshroute::engine::matching::first_prefix_is;
use meshroute::model::{Destination, MatchPredicate, RouteDestination};
use meshroute::{
    Action, Change, MemoryStore, MeshRouteError, PolicyResource, ResourceStore, RouteEngine,
    RoutingResource, Rule, Settings, StoreError,
};

const NAMESPACE: &str = "default";
const SERVICE: &str = "user-service";

/// Helper to create a rule whose first predicate is a URI prefix match
fn prefixed_rule(prefix: &str) -> Rule {
    Rule {
        matches: vec![MatchPredicate::default().with_uri_prefix(prefix)],
        route: vec![RouteDestination::new(Destination::new(SERVICE, "v1"))],
        ..Default::default()
    }
}

async fn engine_with(rules: Vec<Rule>, settings: Settings) -> RouteEngine<MemoryStore> {
    let store =
        MemoryStore::with_routing(vec![RoutingResource::new(NAMESPACE, SERVICE).with_rules(rules)])
            .await;
    RouteEngine::new(store, settings)
}

async fn stored_rules(engine: &RouteEngine<MemoryStore>) -> Vec<Rule> {
    engine
        .store()
        .routing(NAMESPACE, SERVICE)
        .await
        .expect("routing resource present")
        .rules()
        .to_vec()
}

#[tokio::test]
async fn test_header_override_is_idempotent() {
    let engine = engine_with(vec![prefixed_rule("/user/users")], Settings::default()).await;

    let first = engine.apply(Action::HeaderOverride).await.unwrap();
    assert_eq!(first.change, Change::Inserted { index: 0 });
    assert!(first.written);
    assert_eq!(engine.store().calls().updates, 1);

    let second = engine.apply(Action::HeaderOverride).await.unwrap();
    assert_eq!(second.change, Change::Unchanged);
    assert!(!second.written);
    assert_eq!(engine.store().calls().updates, 1);

    let rules = stored_rules(&engine).await;
    let overrides = rules
        .iter()
        .filter(|r| r.matches.iter().any(|m| m.header_exact("x-user-type") == Some("beta")))
        .count();
    assert_eq!(overrides, 1);
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].rewrite_uri(), Some("/v2/users"));
}

#[tokio::test]
async fn test_delay_fault_and_mirror_duplicate() {
    let engine = engine_with(vec![], Settings::default()).await;

    engine.apply(Action::DelayFault).await.unwrap();
    engine.apply(Action::DelayFault).await.unwrap();
    let rules = stored_rules(&engine).await;
    assert_eq!(rules.len(), 2);
    assert!(rules.iter().all(|r| r.fault.is_some()));

    engine.apply(Action::TrafficMirror).await.unwrap();
    engine.apply(Action::TrafficMirror).await.unwrap();
    let rules = stored_rules(&engine).await;
    assert_eq!(rules.len(), 4);
    assert!(rules[0].mirror.is_some());
    assert!(rules[1].mirror.is_some());
    assert_eq!(engine.store().calls().updates, 4);
}

#[tokio::test]
async fn test_traffic_split_converges() {
    let engine = engine_with(vec![prefixed_rule("/user/users")], Settings::default()).await;

    let outcome = engine.apply(Action::TrafficSplit).await.unwrap();
    assert_eq!(outcome.change, Change::Appended { index: 1 });

    let rules = stored_rules(&engine).await;
    let split = &rules[1];
    assert!(split.route[0].destination.is(SERVICE, "v1"));
    assert_eq!(split.route[0].weight, Some(90));
    assert!(split.route[1].destination.is(SERVICE, "v2"));
    assert_eq!(split.route[1].weight, Some(10));

    // Re-apply with new weights against the same store
    let mut settings = Settings::default();
    settings.apply_overrides(&["weight1=50", "weight2=50"]).unwrap();
    let store = engine.store();
    let rebalanced = RouteEngine::new(
        MemoryStore::with_routing(vec![store.routing(NAMESPACE, SERVICE).await.unwrap()]).await,
        settings,
    );

    let outcome = rebalanced.apply(Action::TrafficSplit).await.unwrap();
    assert_eq!(outcome.change, Change::UpdatedInPlace { indices: vec![1] });
    assert_eq!(outcome.rule_count, Some(2));

    let rules = stored_rules(&rebalanced).await;
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[1].route[0].weight, Some(50));
    assert_eq!(rules[1].route[1].weight, Some(50));
}

#[tokio::test]
async fn test_last_applied_rule_is_evaluated_first() {
    let engine = engine_with(vec![], Settings::default()).await;

    engine.apply(Action::HeaderOverride).await.unwrap();
    engine.apply(Action::DelayFault).await.unwrap();
    engine.apply(Action::TrafficMirror).await.unwrap();

    let rules = stored_rules(&engine).await;
    assert_eq!(rules.len(), 3);
    assert!(rules[0].mirror.is_some(), "mirror rule first");
    assert!(rules[1].fault.is_some(), "fault rule second");
    assert!(rules[2].rewrite.is_some(), "header rule last");
}

#[tokio::test]
async fn test_timeout_updates_every_target_rule() {
    let mut settings = Settings::default();
    settings.set("timeoutSeconds", "5").unwrap();
    let engine = engine_with(
        vec![
            prefixed_rule("/user/users"),
            prefixed_rule("/catalog"),
            prefixed_rule("/user/users"),
        ],
        settings,
    )
    .await;

    let outcome = engine.apply(Action::Timeout).await.unwrap();
    assert_eq!(outcome.change, Change::UpdatedInPlace { indices: vec![0, 2] });

    let rules = stored_rules(&engine).await;
    assert_eq!(rules[0].timeout, Some(Duration::from_secs(5)));
    assert_eq!(rules[1].timeout, None);
    assert_eq!(rules[2].timeout, Some(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_timeout_writes_even_without_matches() {
    let engine = engine_with(vec![prefixed_rule("/catalog")], Settings::default()).await;

    let outcome = engine.apply(Action::Timeout).await.unwrap();
    assert!(outcome.written);
    assert_eq!(engine.store().calls().updates, 1);
    assert_eq!(stored_rules(&engine).await[0].timeout, None);
}

#[tokio::test]
async fn test_retry_policy_targets_prefix() {
    let engine = engine_with(
        vec![prefixed_rule("/catalog"), prefixed_rule("/user/users")],
        Settings::default(),
    )
    .await;

    engine.apply(Action::RetryPolicy).await.unwrap();

    let rules = stored_rules(&engine).await;
    assert!(rules[0].retries.is_none());
    let retries = rules[1].retries.as_ref().expect("retries set");
    assert!(first_prefix_is(&rules[1], "/user/users"));
    assert_eq!(retries.attempts, 3);
    assert_eq!(retries.per_try_timeout, Duration::from_secs(1));
    assert_eq!(retries.retry_on, "gateway-error,connect-failure,refused-stream,5xx");
}

#[tokio::test]
async fn test_circuit_breaker_creates_once() {
    let engine = engine_with(vec![], Settings::default()).await;

    let first = engine.apply(Action::CircuitBreaker).await.unwrap();
    assert_eq!(first.change, Change::Created);
    assert!(first.written);

    let second = engine.apply(Action::CircuitBreaker).await.unwrap();
    assert_eq!(second.change, Change::AlreadyExists);
    assert!(!second.written);

    let calls = engine.store().calls();
    assert_eq!(calls.creates, 2);
    assert_eq!(calls.updates, 0);
    assert_eq!(engine.store().policy_count().await, 1);

    let policy = engine.store().policy(NAMESPACE, "v1").await.unwrap();
    assert_eq!(policy.spec.host, SERVICE);
}

#[tokio::test]
async fn test_invalid_weight_aborts_before_fetch() {
    let mut settings = Settings::default();
    settings.set("weight1", "ninety").unwrap();
    let engine = engine_with(vec![], settings).await;

    let err = engine.apply(Action::TrafficSplit).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(matches!(err, MeshRouteError::InvalidSetting { ref key, .. } if key == "weight1"));
    assert_eq!(err.action(), Some(Action::TrafficSplit));
    assert!(err.to_string().starts_with("traffic-split:"));
    assert_eq!(engine.store().calls().gets, 0);
}

#[tokio::test]
async fn test_invalid_retry_settings_abort_before_fetch() {
    let mut settings = Settings::default();
    settings.set("retryPerTryTimeoutSeconds", "soon").unwrap();
    let engine = engine_with(vec![prefixed_rule("/user/users")], settings).await;

    assert!(engine.apply(Action::RetryPolicy).await.is_err());
    assert_eq!(engine.store().calls().gets, 0);
}

/// Store where another writer lands an update right after every fetch
struct RacingStore {
    inner: MemoryStore,
}

#[async_trait]
impl ResourceStore for RacingStore {
    async fn get_routing(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<RoutingResource, StoreError> {
        let fetched = self.inner.get_routing(namespace, name).await?;

        let mut concurrent = fetched.clone();
        concurrent.rules_mut().push(prefixed_rule("/concurrent"));
        self.inner.update_routing(concurrent).await?;

        Ok(fetched)
    }

    async fn update_routing(
        &self,
        resource: RoutingResource,
    ) -> Result<RoutingResource, StoreError> {
        self.inner.update_routing(resource).await
    }

    async fn create_policy(&self, policy: PolicyResource) -> Result<PolicyResource, StoreError> {
        self.inner.create_policy(policy).await
    }

    async fn get_policy(&self, namespace: &str, name: &str) -> Result<PolicyResource, StoreError> {
        self.inner.get_policy(namespace, name).await
    }

    fn backend_name(&self) -> &'static str {
        "racing"
    }
}

#[tokio::test]
async fn test_stale_write_is_surfaced_without_retry() {
    let inner =
        MemoryStore::with_routing(vec![RoutingResource::new(NAMESPACE, SERVICE)]).await;
    let engine = RouteEngine::new(RacingStore { inner }, Settings::default());

    let err = engine.apply(Action::TrafficMirror).await.unwrap_err();
    assert!(matches!(err, MeshRouteError::Conflict { .. }));
    assert_eq!(err.action(), Some(Action::TrafficMirror));

    // The concurrent write plus exactly one attempt from the engine
    let inner = &engine.store().inner;
    let calls = inner.calls();
    assert_eq!(calls.gets, 1);
    assert_eq!(calls.updates, 2);

    // Only the concurrent writer's rule is stored
    let stored = inner.routing(NAMESPACE, SERVICE).await.unwrap();
    assert_eq!(stored.rules(), &[prefixed_rule("/concurrent")]);
    assert_eq!(stored.metadata.resource_version.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_fetch_failure_skips_update() {
    let engine = engine_with(vec![], Settings::default()).await;
    engine
        .store()
        .fail_next(StoreError::transport("connection refused"))
        .await;

    let err = engine.apply(Action::TrafficMirror).await.unwrap_err();
    assert!(matches!(err, MeshRouteError::Transport { .. }));
    assert_eq!(err.action(), Some(Action::TrafficMirror));

    let calls = engine.store().calls();
    assert_eq!(calls.gets, 1);
    assert_eq!(calls.updates, 0);
    assert!(stored_rules(&engine).await.is_empty());
}

#[tokio::test]
async fn test_transport_error_leaves_resource_unchanged() {
    let engine = engine_with(vec![prefixed_rule("/user/users")], Settings::default()).await;
    let before = stored_rules(&engine).await;

    engine
        .store()
        .fail_next(StoreError::transport("connection reset by peer"))
        .await;
    let err = engine.apply(Action::DelayFault).await.unwrap_err();
    assert!(matches!(err, MeshRouteError::Transport { .. }));
    assert_eq!(stored_rules(&engine).await, before);

    // A rerun re-reads the resource and succeeds
    let outcome = engine.apply(Action::DelayFault).await.unwrap();
    assert_eq!(outcome.rule_count, Some(2));
}
