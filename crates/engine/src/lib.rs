//! The Herald delivery engine.
//!
//! Five components drive a campaign from draft to completion:
//!
//! - [`TargetResolver`] — evaluates the audience filter and creates
//!   pending targets with snapshotted recipient attributes.
//! - [`RenderDriver`] — bulk-renders per-recipient text (the preview pass).
//! - [`DeliveryScheduler`] — plans send instants across the delivery
//!   window, honours active hours, and replans on recipient activity.
//! - [`DeliveryExecutor`] — the concurrent claim/send/record loop.
//! - [`CampaignService`] — the lifecycle operations an admin surface calls.
//!
//! Data flows one direction: filters -> resolved targets -> rendered
//! targets -> scheduled targets -> delivered/failed/skipped targets ->
//! campaign aggregate state. Activity triggers feed back into the
//! scheduler asynchronously.

pub mod error;
pub mod executor;
pub mod renderer;
pub mod resolver;
pub mod scheduler;
pub mod service;

pub use error::EngineError;
pub use executor::{DeliveryExecutor, ExecutorConfig};
pub use renderer::{RenderDriver, RenderOutcome};
pub use resolver::TargetResolver;
pub use scheduler::{DeliveryScheduler, PlanOutcome};
pub use service::{CampaignService, DeliveryReport};
