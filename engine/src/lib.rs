//! Discovery engine for Proxima.
//!
//! Binds location resolution, proximity search and project assignment into
//! one state machine per mounted discovery view. The crate has no UI: hosts
//! drive a [`DiscoverySession`] and render its [`DiscoveryView`] snapshots.
//!
//! Layering, leaves first:
//! - [`services`]: collaborator traits and the HTTP backend.
//! - [`positioning`]: the device positioning boundary.
//! - [`resolver`]: live → stored profile → geocoded city fallback chain.
//! - [`controller`] + [`phase`]: the pure discovery state machine.
//! - [`assignment`]: optimistic invite with rollback.
//! - [`session`]: spawns the async work and feeds results back in.

pub mod assignment;
pub mod config;
pub mod context;
pub mod controller;
pub mod errors;
pub mod phase;
pub mod positioning;
pub mod resolver;
pub mod services;
pub mod session;

pub use assignment::{AssignmentCoordinator, AssignmentOutcome, AssignmentRequest, PendingAssignment};
pub use config::{ConfigError, ProximaConfig, config_path};
pub use context::SessionContext;
pub use controller::{
    DiscoveryController, DiscoveryPolicy, DiscoveryView, Effect, EmptyState, LocationStatus,
    SearchGeneration, SearchTicket, Surface, TeamGeneration, TeamStatus, TeamTicket,
};
pub use errors::{
    AssignmentError, DirectoryUnavailable, LocationUnavailable, format_assignment_error,
    format_directory_error,
};
pub use phase::DiscoveryPhase;
pub use positioning::{
    ChannelPositioning, NoPositioning, PositionError, PositionEvent, PositionFeed,
    PositionWatch, PositioningSource, PositioningUnsupported, WatchOptions, WatchRequest,
};
pub use resolver::{LocationResolver, Resolution, ResolverEvent, ResolverHandle};
pub use services::{
    DirectoryService, DiscoveryBackend, GeocodingService, HttpBackend, ProfileService,
    ProjectService,
};
pub use session::{DiscoverySession, SessionEvent, ViewNotice};

pub use proxima_providers;
pub use proxima_types;
