//! Discovery phase transition graph.
//!
//! This module is the single encoding point for named `DiscoveryPhase` edges
//! and legality checks. The controller asks here before every phase change
//! instead of embedding the graph at each call site.

/// Where a discovery view is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryPhase {
    /// No coordinate has been obtained for the active project yet.
    AwaitingLocation,
    /// A search is in flight and nothing is displayed yet.
    Searching,
    /// A search is in flight while the previous results stay on screen.
    Refreshing,
    Ready,
    /// The last search failed. Results are cleared until a retry succeeds.
    Error,
}

impl DiscoveryPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingLocation => "awaiting_location",
            Self::Searching => "searching",
            Self::Refreshing => "refreshing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Searching | Self::Refreshing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PhaseEdge {
    /// First search once a coordinate is known.
    BeginSearch,
    /// A newer query superseded the one in flight.
    Supersede,
    /// Re-query while keeping the displayed results.
    Refresh,
    /// Search again after a failure.
    Retry,
    Settle,
    Fail,
    /// Project switch or remount.
    Reset,
}

#[must_use]
pub(crate) fn transition_edge(from: DiscoveryPhase, to: DiscoveryPhase) -> Option<PhaseEdge> {
    use DiscoveryPhase::{AwaitingLocation, Error, Ready, Refreshing, Searching};
    use PhaseEdge::{BeginSearch, Fail, Refresh, Reset, Retry, Settle, Supersede};

    match (from, to) {
        (_, AwaitingLocation) => Some(Reset),
        (AwaitingLocation, Searching) => Some(BeginSearch),
        (Searching, Searching) => Some(Supersede),
        (Ready | Refreshing, Refreshing) => Some(Refresh),
        (Error, Searching) => Some(Retry),
        (Searching | Refreshing, Ready) => Some(Settle),
        (Searching | Refreshing, Error) => Some(Fail),
        _ => None,
    }
}

#[must_use]
pub(crate) fn is_legal_transition(
    from: DiscoveryPhase,
    edge: PhaseEdge,
    to: DiscoveryPhase,
) -> bool {
    use DiscoveryPhase::{AwaitingLocation, Error, Ready, Refreshing, Searching};
    use PhaseEdge::{BeginSearch, Fail, Refresh, Reset, Retry, Settle, Supersede};

    match edge {
        BeginSearch => from == AwaitingLocation && to == Searching,
        Supersede => from == Searching && to == Searching,
        Refresh => matches!(from, Ready | Refreshing) && to == Refreshing,
        Retry => from == Error && to == Searching,
        Settle => from.is_in_flight() && to == Ready,
        Fail => from.is_in_flight() && to == Error,
        Reset => to == AwaitingLocation,
    }
}
