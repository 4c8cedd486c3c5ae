//! Discovery view controller.
//!
//! A pure state machine binding location, search results and the exclusion
//! set to a map or list view. It performs no IO: every method that needs the
//! outside world returns [`Effect`]s for the session to carry out, and every
//! result comes back through an explicit `on_*` call.

use proxima_types::{
    AlreadyEngaged, Category, CategoryFilter, Coordinate, ExclusionSet, Fix, LocationSource,
    ProfessionalId, ProfessionalRecord, ProjectId, RadiusKm, SearchQuery,
};

use crate::errors::DirectoryUnavailable;
use crate::phase::{DiscoveryPhase, is_legal_transition, transition_edge};
use crate::resolver::ResolverEvent;

/// How results are rendered. Only affects the policy defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    Map,
    List,
}

impl Surface {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Map => "map",
            Self::List => "list",
        }
    }
}

/// Caller-supplied search policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoveryPolicy {
    pub surface: Surface,
    pub radius: RadiusKm,
    /// Hide professionals who share the acting user's own category.
    pub suppress_same_category: bool,
}

impl DiscoveryPolicy {
    #[must_use]
    pub const fn for_surface(surface: Surface) -> Self {
        match surface {
            Surface::Map => Self::map(),
            Surface::List => Self::list(),
        }
    }

    #[must_use]
    pub const fn map() -> Self {
        Self {
            surface: Surface::Map,
            radius: RadiusKm::MAP_DEFAULT,
            suppress_same_category: true,
        }
    }

    #[must_use]
    pub const fn list() -> Self {
        Self {
            surface: Surface::List,
            radius: RadiusKm::LIST_DEFAULT,
            suppress_same_category: true,
        }
    }

    #[must_use]
    pub const fn with_radius(mut self, radius: RadiusKm) -> Self {
        self.radius = radius;
        self
    }
}

/// Monotonic search counter. Only the response to the latest ticket is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SearchGeneration(u64);

impl SearchGeneration {
    #[must_use]
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchTicket {
    pub generation: SearchGeneration,
    pub query: SearchQuery,
}

/// Monotonic team-refresh counter. Only the snapshot of the latest issued
/// refresh is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TeamGeneration(u64);

impl TeamGeneration {
    #[must_use]
    const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamTicket {
    pub project: ProjectId,
    pub epoch: u64,
    pub generation: TeamGeneration,
}

/// Whether the exclusion set reflects an authoritative team snapshot yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamStatus {
    /// No active project, nothing to exclude.
    NoProject,
    Pending,
    Synced,
    /// The refresh failed before any snapshot landed. Only local exclusions apply.
    Failed,
}

/// Work the controller asks its host to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Release any running location resolution and start a fresh one.
    StartLocation { epoch: u64 },
    Search(SearchTicket),
    /// Move the view to this coordinate.
    Recenter(Coordinate),
    /// Fetch authoritative team membership.
    RefreshTeam(TeamTicket),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LocationStatus {
    Pending,
    /// Every source failed. The view should prompt for location access.
    Unavailable,
    Located(Fix),
}

/// Why a settled search displays nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyState {
    NoMatches,
    /// Matches exist but every one of them is already engaged.
    AllEngaged { hidden: usize },
}

/// Render-ready snapshot of the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryView {
    pub phase: DiscoveryPhase,
    pub location: LocationStatus,
    pub surface: Surface,
    pub radius: RadiusKm,
    pub filter: CategoryFilter,
    pub project: Option<ProjectId>,
    pub professionals: Vec<ProfessionalRecord>,
    pub empty_state: Option<EmptyState>,
    pub selected: Option<ProfessionalRecord>,
    pub error: Option<DirectoryUnavailable>,
    pub team: TeamStatus,
}

#[derive(Debug)]
pub struct DiscoveryController {
    policy: DiscoveryPolicy,
    viewer: Option<Category>,
    project: Option<ProjectId>,
    epoch: u64,
    exclusions: ExclusionSet,
    filter: CategoryFilter,
    location: LocationStatus,
    recentered_on: Option<LocationSource>,
    view_touched: bool,
    generation: SearchGeneration,
    team_generation: TeamGeneration,
    team_synced: bool,
    team_failed: bool,
    phase: DiscoveryPhase,
    results: Vec<ProfessionalRecord>,
    selected: Option<ProfessionalId>,
    last_error: Option<DirectoryUnavailable>,
}

impl DiscoveryController {
    #[must_use]
    pub fn new(policy: DiscoveryPolicy, viewer: Option<Category>) -> Self {
        Self {
            policy,
            viewer,
            project: None,
            epoch: 0,
            exclusions: ExclusionSet::default(),
            filter: CategoryFilter::any(),
            location: LocationStatus::Pending,
            recentered_on: None,
            view_touched: false,
            generation: SearchGeneration::default(),
            team_generation: TeamGeneration::default(),
            team_synced: false,
            team_failed: false,
            phase: DiscoveryPhase::AwaitingLocation,
            results: Vec::new(),
            selected: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> DiscoveryPhase {
        self.phase
    }

    #[must_use]
    pub fn policy(&self) -> DiscoveryPolicy {
        self.policy
    }

    #[must_use]
    pub fn project(&self) -> Option<&ProjectId> {
        self.project.as_ref()
    }

    /// Incremented on every mount / project switch. Async results carry the
    /// epoch they were started under.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn exclusions(&self) -> &ExclusionSet {
        &self.exclusions
    }

    #[must_use]
    pub fn location(&self) -> LocationStatus {
        self.location
    }

    #[must_use]
    pub fn generation(&self) -> SearchGeneration {
        self.generation
    }

    #[must_use]
    pub fn team_status(&self) -> TeamStatus {
        if self.project.is_none() {
            TeamStatus::NoProject
        } else if self.team_synced {
            TeamStatus::Synced
        } else if self.team_failed {
            TeamStatus::Failed
        } else {
            TeamStatus::Pending
        }
    }

    #[must_use]
    pub fn filter(&self) -> &CategoryFilter {
        &self.filter
    }

    #[must_use]
    pub fn selected(&self) -> Option<&ProfessionalId> {
        self.selected.as_ref()
    }

    fn origin(&self) -> Option<Coordinate> {
        match self.location {
            LocationStatus::Located(fix) => Some(fix.coordinate),
            LocationStatus::Pending | LocationStatus::Unavailable => None,
        }
    }

    fn transition(&mut self, to: DiscoveryPhase) {
        let from = self.phase;
        match transition_edge(from, to) {
            Some(edge) if is_legal_transition(from, edge, to) => {
                tracing::debug!(
                    from = from.as_str(),
                    to = to.as_str(),
                    ?edge,
                    "Discovery phase transition"
                );
                self.phase = to;
            }
            _ => {
                tracing::error!(
                    from = from.as_str(),
                    to = to.as_str(),
                    "Rejected illegal discovery phase transition"
                );
            }
        }
    }

    /// Mount for `project`, or switch to it. Everything scoped to the previous
    /// project is rebuilt from scratch; in-flight searches become stale.
    pub fn switch_project(&mut self, project: Option<ProjectId>) -> Vec<Effect> {
        self.epoch += 1;
        self.generation = self.generation.next();
        self.project.clone_from(&project);
        self.exclusions = ExclusionSet::for_project(project.clone());
        self.location = LocationStatus::Pending;
        self.recentered_on = None;
        self.view_touched = false;
        self.results.clear();
        self.selected = None;
        self.last_error = None;
        self.team_synced = false;
        self.team_failed = false;
        self.transition(DiscoveryPhase::AwaitingLocation);

        tracing::info!(
            project = project.as_ref().map(ProjectId::as_str),
            epoch = self.epoch,
            surface = self.policy.surface.as_str(),
            "Discovery mounted"
        );

        let mut effects = vec![Effect::StartLocation { epoch: self.epoch }];
        effects.extend(self.refresh_team());
        effects
    }

    /// Ask for a fresh team snapshot of the active project, if there is one.
    pub fn refresh_team(&mut self) -> Option<Effect> {
        let project = self.project.clone()?;
        self.team_generation = self.team_generation.next();
        Some(Effect::RefreshTeam(TeamTicket {
            project,
            epoch: self.epoch,
            generation: self.team_generation,
        }))
    }

    fn is_latest_team(&self, ticket: &TeamTicket) -> bool {
        self.project.as_ref() == Some(&ticket.project)
            && ticket.epoch == self.epoch
            && ticket.generation == self.team_generation
    }

    pub fn on_location(&mut self, event: ResolverEvent) -> Vec<Effect> {
        let fix = match event {
            ResolverEvent::Located(fix) => fix,
            ResolverEvent::Unavailable(_) => {
                if self.location == LocationStatus::Pending {
                    self.location = LocationStatus::Unavailable;
                }
                return Vec::new();
            }
        };

        self.location = LocationStatus::Located(fix);
        let mut effects = Vec::with_capacity(2);
        if self.should_recenter(fix.source) {
            tracing::debug!(source = fix.source.as_str(), "Recentering view");
            self.recentered_on = Some(fix.source);
            self.view_touched = false;
            effects.push(Effect::Recenter(fix.coordinate));
        }
        effects.push(Effect::Search(self.issue_search(fix.coordinate)));
        effects
    }

    fn should_recenter(&self, source: LocationSource) -> bool {
        match self.recentered_on {
            None => true,
            Some(previous) => !self.view_touched && source.outranks(previous),
        }
    }

    fn issue_search(&mut self, origin: Coordinate) -> SearchTicket {
        self.generation = self.generation.next();
        let next = match self.phase {
            DiscoveryPhase::Ready | DiscoveryPhase::Refreshing => DiscoveryPhase::Refreshing,
            DiscoveryPhase::AwaitingLocation
            | DiscoveryPhase::Searching
            | DiscoveryPhase::Error => DiscoveryPhase::Searching,
        };
        self.transition(next);
        SearchTicket {
            generation: self.generation,
            query: SearchQuery::new(origin, self.policy.radius, self.filter.clone()),
        }
    }

    /// Change category filters. Re-queries against the known origin, if any.
    pub fn set_filter(&mut self, filter: CategoryFilter) -> Vec<Effect> {
        if filter == self.filter {
            return Vec::new();
        }
        self.filter = filter;
        self.origin()
            .map(|origin| Effect::Search(self.issue_search(origin)))
            .into_iter()
            .collect()
    }

    /// User-initiated retry after a failed search.
    pub fn retry(&mut self) -> Vec<Effect> {
        if self.phase != DiscoveryPhase::Error {
            return Vec::new();
        }
        self.origin()
            .map(|origin| Effect::Search(self.issue_search(origin)))
            .into_iter()
            .collect()
    }

    /// Apply a directory response. Returns `false` if it was stale and dropped.
    pub fn on_search_completed(
        &mut self,
        generation: SearchGeneration,
        result: Result<Vec<ProfessionalRecord>, DirectoryUnavailable>,
    ) -> bool {
        if generation != self.generation || !self.phase.is_in_flight() {
            tracing::debug!(
                ?generation,
                current = ?self.generation,
                "Discarding stale directory response"
            );
            return false;
        }

        match result {
            Ok(records) => {
                tracing::info!(count = records.len(), "Directory search settled");
                self.results = records;
                self.last_error = None;
                self.transition(DiscoveryPhase::Ready);
                self.prune_selection();
            }
            Err(err) => {
                tracing::warn!(%err, "Directory search failed");
                self.results.clear();
                self.selected = None;
                self.last_error = Some(err);
                self.transition(DiscoveryPhase::Error);
            }
        }
        true
    }

    /// The user panned or zoomed. Suppresses precedence-upgrade recenters.
    pub fn note_view_interaction(&mut self) {
        self.view_touched = true;
    }

    /// Replace confirmed membership with an authoritative team snapshot.
    ///
    /// Snapshots from another project or mount, or superseded by a later
    /// refresh, are dropped.
    pub fn apply_team<I>(&mut self, ticket: &TeamTicket, members: I) -> bool
    where
        I: IntoIterator<Item = ProfessionalId>,
    {
        if !self.is_latest_team(ticket) {
            tracing::debug!(
                project = %ticket.project,
                generation = ?ticket.generation,
                latest = ?self.team_generation,
                "Discarding superseded team snapshot"
            );
            return false;
        }
        self.exclusions.reconcile(members);
        self.team_synced = true;
        self.team_failed = false;
        self.prune_selection();
        true
    }

    /// A team refresh failed. Local exclusions stay as they are.
    pub fn on_team_failed(&mut self, ticket: &TeamTicket) -> bool {
        if !self.is_latest_team(ticket) {
            return false;
        }
        if !self.team_synced {
            self.team_failed = true;
        }
        true
    }

    /// Open the profile panel for a displayed professional.
    pub fn open_profile(&mut self, id: &ProfessionalId) -> bool {
        if !self.visible().any(|r| &r.id == id) {
            return false;
        }
        self.selected = Some(id.clone());
        true
    }

    pub fn close_profile(&mut self) {
        self.selected = None;
    }

    pub(crate) fn begin_engagement(&mut self, id: &ProfessionalId) -> Result<(), AlreadyEngaged> {
        self.exclusions.begin(id.clone())
    }

    pub(crate) fn confirm_engagement(&mut self, id: &ProfessionalId) -> Vec<Effect> {
        self.exclusions.commit(id);
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        self.refresh_team().into_iter().collect()
    }

    pub(crate) fn abandon_engagement(&mut self, id: &ProfessionalId) -> bool {
        self.exclusions.rollback(id)
    }

    fn is_candidate(&self, record: &ProfessionalRecord) -> bool {
        if !record.category.is_hireable() {
            return false;
        }
        !(self.policy.suppress_same_category && self.viewer.as_ref() == Some(&record.category))
    }

    /// Results that pass display rules and are not engaged with the project.
    pub fn visible(&self) -> impl Iterator<Item = &ProfessionalRecord> {
        self.results
            .iter()
            .filter(|r| self.is_candidate(r) && !self.exclusions.contains(&r.id))
    }

    #[must_use]
    pub fn empty_state(&self) -> Option<EmptyState> {
        if self.phase != DiscoveryPhase::Ready || self.visible().next().is_some() {
            return None;
        }
        let hidden = self
            .results
            .iter()
            .filter(|r| self.is_candidate(r) && self.exclusions.contains(&r.id))
            .count();
        Some(if hidden > 0 {
            EmptyState::AllEngaged { hidden }
        } else {
            EmptyState::NoMatches
        })
    }

    /// An open panel stays open while its professional's invite is in flight,
    /// and closes once the professional leaves the displayed set otherwise.
    fn prune_selection(&mut self) {
        let Some(id) = &self.selected else {
            return;
        };
        let keep = self.exclusions.is_pending(id)
            || (!self.exclusions.contains(id)
                && self.results.iter().any(|r| &r.id == id && self.is_candidate(r)));
        if !keep {
            tracing::debug!(professional = %id, "Closing profile panel");
            self.selected = None;
        }
    }

    #[must_use]
    pub fn view(&self) -> DiscoveryView {
        let professionals = if matches!(
            self.phase,
            DiscoveryPhase::Ready | DiscoveryPhase::Refreshing
        ) {
            self.visible().cloned().collect()
        } else {
            Vec::new()
        };
        DiscoveryView {
            phase: self.phase,
            location: self.location,
            surface: self.policy.surface,
            radius: self.policy.radius,
            filter: self.filter.clone(),
            project: self.project.clone(),
            professionals,
            empty_state: self.empty_state(),
            selected: self
                .selected
                .as_ref()
                .and_then(|id| self.results.iter().find(|r| &r.id == id))
                .cloned(),
            error: self.last_error.clone(),
            team: self.team_status(),
        }
    }
}
