//! Tick-driven discovery session.
//!
//! Owns one [`DiscoveryController`] and carries out its effects: spawning the
//! location resolver, directory searches, team refreshes and assignment calls.
//! Every async result comes back over a single channel and is applied on the
//! caller's thread, either by polling [`DiscoverySession::process_events`] from
//! a UI tick or by awaiting [`DiscoverySession::next_event`].

use std::sync::Arc;

use proxima_providers::ServiceError;
use proxima_types::{
    Category, CategoryFilter, Coordinate, NonEmptyString, ProfessionalId, ProfessionalRecord,
    ProjectId,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::assignment::{AssignmentCoordinator, AssignmentOutcome, AssignmentRequest};
use crate::context::SessionContext;
use crate::controller::{
    DiscoveryController, DiscoveryPolicy, DiscoveryView, Effect, SearchGeneration, TeamTicket,
};
use crate::errors::{AssignmentError, DirectoryUnavailable, format_assignment_error};
use crate::positioning::{PositioningSource, WatchOptions};
use crate::resolver::{LocationResolver, ResolverEvent, ResolverHandle};
use crate::services::DiscoveryBackend;

const EVENT_BUFFER: usize = 64;

/// Async results routed back to the session.
#[derive(Debug)]
pub enum SessionEvent {
    Location {
        epoch: u64,
        event: ResolverEvent,
    },
    Search {
        generation: SearchGeneration,
        result: Result<Vec<ProfessionalRecord>, DirectoryUnavailable>,
    },
    Team {
        ticket: TeamTicket,
        result: Result<Vec<ProfessionalId>, ServiceError>,
    },
    Assignment(AssignmentOutcome),
}

/// One-shot instructions for the view, drained with
/// [`DiscoverySession::take_notices`].
#[derive(Debug, Clone, PartialEq)]
pub enum ViewNotice {
    Recenter(Coordinate),
    Assigned {
        project: ProjectId,
        professional: ProfessionalId,
    },
    AssignmentFailed {
        professional: ProfessionalId,
        error: AssignmentError,
        message: NonEmptyString,
    },
    /// Team membership changed; external team views should refresh.
    TeamChanged(ProjectId),
}

pub struct DiscoverySession<B: DiscoveryBackend> {
    backend: Arc<B>,
    positioning: Arc<dyn PositioningSource>,
    context: SessionContext,
    watch_options: WatchOptions,
    controller: DiscoveryController,
    coordinator: AssignmentCoordinator<B>,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    resolver: Option<ResolverHandle>,
    tasks: Vec<JoinHandle<()>>,
    notices: Vec<ViewNotice>,
}

impl<B: DiscoveryBackend> DiscoverySession<B> {
    /// Mount a discovery view. Must be called inside a Tokio runtime.
    pub fn mount(
        backend: Arc<B>,
        positioning: Arc<dyn PositioningSource>,
        context: SessionContext,
        policy: DiscoveryPolicy,
        project: Option<ProjectId>,
        watch_options: WatchOptions,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let controller = DiscoveryController::new(policy, context.category.clone());
        let coordinator = AssignmentCoordinator::new(Arc::clone(&backend));
        let mut session = Self {
            backend,
            positioning,
            context,
            watch_options,
            controller,
            coordinator,
            events_tx,
            events_rx,
            resolver: None,
            tasks: Vec::new(),
            notices: Vec::new(),
        };
        let effects = session.controller.switch_project(project);
        session.apply(effects);
        session
    }

    #[must_use]
    pub fn controller(&self) -> &DiscoveryController {
        &self.controller
    }

    #[must_use]
    pub fn view(&self) -> DiscoveryView {
        self.controller.view()
    }

    /// Drain pending view notices.
    pub fn take_notices(&mut self) -> Vec<ViewNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn set_filter(&mut self, filter: CategoryFilter) {
        let effects = self.controller.set_filter(filter);
        self.apply(effects);
    }

    pub fn retry(&mut self) {
        let effects = self.controller.retry();
        self.apply(effects);
    }

    pub fn note_view_interaction(&mut self) {
        self.controller.note_view_interaction();
    }

    pub fn open_profile(&mut self, professional: &ProfessionalId) -> bool {
        self.controller.open_profile(professional)
    }

    pub fn close_profile(&mut self) {
        self.controller.close_profile();
    }

    /// The active project changed. Releases the location watch and rebuilds
    /// every project-scoped piece of state.
    pub fn switch_project(&mut self, project: Option<ProjectId>) {
        let effects = self.controller.switch_project(project);
        self.apply(effects);
    }

    /// Invite `professional` to the active project as `role`.
    ///
    /// Precondition failures are returned immediately. Otherwise the
    /// professional is hidden at once and the outcome arrives later as a
    /// [`ViewNotice`].
    pub fn assign(
        &mut self,
        professional: ProfessionalId,
        role: Category,
    ) -> Result<(), AssignmentError> {
        let request = AssignmentRequest {
            project: self.controller.project().cloned(),
            professional,
            role,
        };
        let pending = AssignmentCoordinator::<B>::prepare(&mut self.controller, request)?;
        let submit = self.coordinator.submit(pending);
        let tx = self.events_tx.clone();
        self.spawn(async move {
            let outcome = submit.await;
            let _ = tx.send(SessionEvent::Assignment(outcome)).await;
        });
        Ok(())
    }

    /// Apply every event that has already arrived. Returns how many were applied.
    pub fn process_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next event and apply it.
    pub async fn next_event(&mut self) {
        if let Some(event) = self.events_rx.recv().await {
            self.handle(event);
        }
    }

    /// Tear down: release the location watch and abort in-flight calls.
    pub fn unmount(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(resolver) = self.resolver.take() {
            resolver.cancel();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(future));
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::StartLocation { epoch } => self.start_location(epoch),
                Effect::Search(ticket) => {
                    let backend = Arc::clone(&self.backend);
                    let tx = self.events_tx.clone();
                    self.spawn(async move {
                        let result = backend
                            .search_nearby(&ticket.query)
                            .await
                            .map_err(DirectoryUnavailable::from);
                        let _ = tx
                            .send(SessionEvent::Search {
                                generation: ticket.generation,
                                result,
                            })
                            .await;
                    });
                }
                Effect::Recenter(coordinate) => {
                    self.notices.push(ViewNotice::Recenter(coordinate));
                }
                Effect::RefreshTeam(ticket) => {
                    let backend = Arc::clone(&self.backend);
                    let tx = self.events_tx.clone();
                    self.spawn(async move {
                        let result = backend
                            .team(&ticket.project)
                            .await
                            .map(|team| team.into_iter().map(|member| member.id).collect());
                        let _ = tx.send(SessionEvent::Team { ticket, result }).await;
                    });
                }
            }
        }
    }

    fn start_location(&mut self, epoch: u64) {
        if let Some(previous) = self.resolver.take() {
            previous.cancel();
        }
        let resolver = LocationResolver::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.positioning),
            self.context.clone(),
            self.watch_options,
        );
        self.resolver = Some(
            resolver.spawn_into(self.events_tx.clone(), move |event| {
                SessionEvent::Location { epoch, event }
            }),
        );
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Location { epoch, event } => {
                if epoch != self.controller.epoch() {
                    tracing::debug!(epoch, "Dropping location event from previous mount");
                    return;
                }
                let effects = self.controller.on_location(event);
                self.apply(effects);
            }
            SessionEvent::Search { generation, result } => {
                self.controller.on_search_completed(generation, result);
            }
            SessionEvent::Team { ticket, result } => match result {
                Ok(members) => {
                    self.controller.apply_team(&ticket, members);
                }
                Err(e) => {
                    if self.controller.on_team_failed(&ticket) {
                        tracing::warn!(
                            project = %ticket.project,
                            %e,
                            "Team refresh failed; keeping local exclusions"
                        );
                    }
                }
            },
            SessionEvent::Assignment(outcome) => {
                let project = outcome.pending.project.clone();
                let professional = outcome.pending.professional.clone();
                match AssignmentCoordinator::<B>::settle(&mut self.controller, outcome) {
                    Ok(effects) => {
                        let current = self.controller.project() == Some(&project);
                        self.notices.push(ViewNotice::Assigned {
                            project: project.clone(),
                            professional,
                        });
                        self.notices.push(ViewNotice::TeamChanged(project));
                        if current {
                            self.apply(effects);
                        }
                    }
                    Err(error) => {
                        let message = format_assignment_error(&error);
                        self.notices.push(ViewNotice::AssignmentFailed {
                            professional,
                            error,
                            message,
                        });
                    }
                }
            }
        }
    }
}

impl<B: DiscoveryBackend> Drop for DiscoverySession<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
