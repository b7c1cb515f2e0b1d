//! meshroute - Traffic-management mutations for service-mesh routing resources
//!
//! Applies a fixed catalog of behaviors (header override routing, A/B
//! traffic split, delay fault injection, traffic mirroring, request timeout,
//! retry policy and circuit breaking) to a routing resource's ordered rule
//! list or to a per-host policy resource.
//!
//! # Modules
//!
//! - `config` - Layered settings (defaults, TOML file, environment, overrides)
//! - `engine` - The route mutation strategies and their dispatcher
//! - `model` - Routing and policy resource types
//! - `store` - Resource store trait with memory and filesystem backends
//! - `errors` - Error types with diagnostics
//!
//! # Example
//!
//! ```rust,ignore
//! use meshroute::{Action, MemoryStore, RouteEngine, Settings};
//!
//! let engine = RouteEngine::new(MemoryStore::new(), Settings::default());
//! let outcome = engine.apply(Action::TrafficSplit).await?;
//! println!("{}", outcome.change.describe());
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod model;
pub mod store;

// Re-export commonly used types
pub use config::Settings;
pub use engine::{Action, ApplyOutcome, Change, RouteEngine};
pub use errors::MeshRouteError;
pub use model::{PolicyResource, RoutingResource, Rule};
pub use store::{FilesystemStore, MemoryStore, ResourceStore, StoreError};
