//! Assignment coordinator.
//!
//! An assignment runs in three steps so the network call can happen off the
//! event loop:
//! 1. [`AssignmentCoordinator::prepare`] checks preconditions and hides the
//!    professional optimistically.
//! 2. [`AssignmentCoordinator::submit`] performs the single project-service
//!    call.
//! 3. [`AssignmentCoordinator::settle`] confirms or rolls back.

use std::future::Future;
use std::sync::Arc;

use proxima_providers::ServiceError;
use proxima_types::{Category, ProfessionalId, ProjectId};

use crate::controller::{DiscoveryController, Effect};
use crate::errors::AssignmentError;
use crate::services::ProjectService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRequest {
    /// The host's active project, if any.
    pub project: Option<ProjectId>,
    pub professional: ProfessionalId,
    pub role: Category,
}

/// An assignment whose optimistic insert has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAssignment {
    pub project: ProjectId,
    pub professional: ProfessionalId,
    pub role: Category,
    epoch: u64,
}

#[derive(Debug)]
pub struct AssignmentOutcome {
    pub pending: PendingAssignment,
    pub result: Result<(), ServiceError>,
}

pub struct AssignmentCoordinator<P> {
    projects: Arc<P>,
}

impl<P> Clone for AssignmentCoordinator<P> {
    fn clone(&self) -> Self {
        Self {
            projects: Arc::clone(&self.projects),
        }
    }
}

impl<P: ProjectService> AssignmentCoordinator<P> {
    #[must_use]
    pub fn new(projects: Arc<P>) -> Self {
        Self { projects }
    }

    /// Validate and apply the optimistic insert. No network traffic.
    pub fn prepare(
        controller: &mut DiscoveryController,
        request: AssignmentRequest,
    ) -> Result<PendingAssignment, AssignmentError> {
        let Some(project) = request.project else {
            return Err(AssignmentError::NoActiveProject);
        };
        if controller.project() != Some(&project) {
            return Err(AssignmentError::ProjectMismatch {
                requested: project,
                active: controller.project().cloned(),
            });
        }
        controller.begin_engagement(&request.professional)?;

        tracing::debug!(
            %project,
            professional = %request.professional,
            "Professional hidden pending assignment"
        );
        Ok(PendingAssignment {
            project,
            professional: request.professional,
            role: request.role,
            epoch: controller.epoch(),
        })
    }

    /// Perform the project-service call. Sent once; never retried here.
    pub fn submit(
        &self,
        pending: PendingAssignment,
    ) -> impl Future<Output = AssignmentOutcome> + Send + 'static {
        let projects = Arc::clone(&self.projects);
        async move {
            let result = projects
                .assign(&pending.project, &pending.professional, &pending.role)
                .await;
            AssignmentOutcome { pending, result }
        }
    }

    /// Confirm or roll back. On success returns the follow-up effects
    /// (authoritative team refresh).
    pub fn settle(
        controller: &mut DiscoveryController,
        outcome: AssignmentOutcome,
    ) -> Result<Vec<Effect>, AssignmentError> {
        let AssignmentOutcome { pending, result } = outcome;
        if pending.epoch != controller.epoch() {
            tracing::debug!(
                project = %pending.project,
                professional = %pending.professional,
                "Assignment settled after project switch"
            );
            return result.map(|()| Vec::new()).map_err(AssignmentError::from);
        }

        match result {
            Ok(()) => Ok(controller.confirm_engagement(&pending.professional)),
            Err(err) => {
                let restored = controller.abandon_engagement(&pending.professional);
                tracing::warn!(
                    project = %pending.project,
                    professional = %pending.professional,
                    restored,
                    %err,
                    "Assignment failed; optimistic insert rolled back"
                );
                Err(AssignmentError::from(err))
            }
        }
    }

    /// Run all three steps inline.
    pub async fn assign(
        &self,
        controller: &mut DiscoveryController,
        request: AssignmentRequest,
    ) -> Result<Vec<Effect>, AssignmentError> {
        let pending = Self::prepare(controller, request)?;
        let outcome = self.submit(pending).await;
        Self::settle(controller, outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use proxima_providers::ServiceError;
    use proxima_providers::projects::TeamMember;
    use proxima_types::{Category, ProfessionalId, ProjectId};

    use super::{AssignmentCoordinator, AssignmentRequest};
    use crate::controller::tests::record;
    use crate::controller::{DiscoveryController, DiscoveryPolicy, Effect};
    use crate::errors::AssignmentError;
    use crate::resolver::ResolverEvent;
    use crate::services::ProjectService;

    #[derive(Default)]
    struct FakeProjects {
        fail_with: Option<u16>,
        calls: Mutex<Vec<(String, String, String)>>,
    }

    impl ProjectService for FakeProjects {
        async fn assign(
            &self,
            project: &ProjectId,
            professional: &ProfessionalId,
            role: &Category,
        ) -> Result<(), ServiceError> {
            self.calls.lock().unwrap().push((
                project.to_string(),
                professional.to_string(),
                role.to_string(),
            ));
            match self.fail_with {
                Some(status) => Err(ServiceError::Status {
                    service: "projects",
                    status: proxima_providers::StatusCode::from_u16(status).unwrap(),
                    body: r#"{"message":"project is closed"}"#.to_string(),
                }),
                None => Ok(()),
            }
        }

        async fn team(&self, _project: &ProjectId) -> Result<Vec<TeamMember>, ServiceError> {
            Ok(Vec::new())
        }
    }

    fn ready_controller() -> DiscoveryController {
        let mut controller = DiscoveryController::new(DiscoveryPolicy::map(), None);
        controller.switch_project(Some(ProjectId::new("p1")));
        let effects = controller.on_location(ResolverEvent::Located(proxima_types::Fix::new(
            crate::controller::tests::coord(18.52, 73.85),
            proxima_types::LocationSource::LiveGps,
        )));
        let Some(Effect::Search(ticket)) = effects.into_iter().last() else {
            panic!("expected a search");
        };
        controller.on_search_completed(
            ticket.generation,
            Ok(vec![
                record("pro-1", Category::Architect),
                record("pro-2", Category::Engineer),
            ]),
        );
        controller
    }

    fn request(project: Option<&str>, professional: &str) -> AssignmentRequest {
        AssignmentRequest {
            project: project.map(ProjectId::new),
            professional: ProfessionalId::new(professional),
            role: Category::Architect,
        }
    }

    fn visible_ids(controller: &DiscoveryController) -> Vec<String> {
        controller.visible().map(|r| r.id.to_string()).collect()
    }

    #[tokio::test]
    async fn success_hides_professional_closes_panel_and_refreshes_team() {
        let projects = Arc::new(FakeProjects::default());
        let coordinator = AssignmentCoordinator::new(Arc::clone(&projects));
        let mut controller = ready_controller();
        assert!(controller.open_profile(&ProfessionalId::new("pro-1")));

        let effects = coordinator
            .assign(&mut controller, request(Some("p1"), "pro-1"))
            .await
            .unwrap();

        assert_eq!(visible_ids(&controller), ["pro-2"]);
        assert!(controller.selected().is_none());
        let [Effect::RefreshTeam(ticket)] = effects.as_slice() else {
            panic!("expected one team refresh, got {effects:?}");
        };
        assert_eq!(ticket.project, ProjectId::new("p1"));
        assert_eq!(ticket.epoch, controller.epoch());
        assert_eq!(
            projects.calls.lock().unwrap().as_slice(),
            [(
                "p1".to_string(),
                "pro-1".to_string(),
                "architect".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn failure_rolls_back_and_surfaces_message() {
        let projects = Arc::new(FakeProjects {
            fail_with: Some(409),
            ..FakeProjects::default()
        });
        let coordinator = AssignmentCoordinator::new(projects);
        let mut controller = ready_controller();
        controller.open_profile(&ProfessionalId::new("pro-1"));

        let pending = AssignmentCoordinator::<FakeProjects>::prepare(
            &mut controller,
            request(Some("p1"), "pro-1"),
        )
        .unwrap();
        assert_eq!(visible_ids(&controller), ["pro-2"]);
        assert_eq!(
            controller.selected(),
            Some(&ProfessionalId::new("pro-1")),
            "panel stays open while the call is in flight"
        );

        let outcome = coordinator.submit(pending).await;
        let err = AssignmentCoordinator::<FakeProjects>::settle(&mut controller, outcome)
            .unwrap_err();

        assert_eq!(
            err,
            AssignmentError::Rejected {
                status: 409,
                message: "project is closed".to_string()
            }
        );
        assert_eq!(visible_ids(&controller), ["pro-1", "pro-2"]);
        assert!(controller.exclusions().is_empty());
    }

    #[tokio::test]
    async fn missing_project_is_blocked_before_the_network() {
        let projects = Arc::new(FakeProjects::default());
        let coordinator = AssignmentCoordinator::new(Arc::clone(&projects));
        let mut controller = ready_controller();

        let err = coordinator
            .assign(&mut controller, request(None, "pro-1"))
            .await
            .unwrap_err();
        assert_eq!(err, AssignmentError::NoActiveProject);
        assert!(projects.calls.lock().unwrap().is_empty());
        assert_eq!(visible_ids(&controller), ["pro-1", "pro-2"]);
    }

    #[tokio::test]
    async fn second_assignment_of_same_professional_is_rejected() {
        let projects = Arc::new(FakeProjects::default());
        let coordinator = AssignmentCoordinator::new(Arc::clone(&projects));
        let mut controller = ready_controller();

        coordinator
            .assign(&mut controller, request(Some("p1"), "pro-1"))
            .await
            .unwrap();
        let err = coordinator
            .assign(&mut controller, request(Some("p1"), "pro-1"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AssignmentError::AlreadyEngaged(ProfessionalId::new("pro-1"))
        );
        assert_eq!(controller.exclusions().len(), 1);
        assert_eq!(projects.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outcome_from_previous_project_leaves_new_set_alone() {
        let projects = Arc::new(FakeProjects {
            fail_with: Some(500),
            ..FakeProjects::default()
        });
        let coordinator = AssignmentCoordinator::new(projects);
        let mut controller = ready_controller();

        let pending = AssignmentCoordinator::<FakeProjects>::prepare(
            &mut controller,
            request(Some("p1"), "pro-1"),
        )
        .unwrap();
        let _ = controller.switch_project(Some(ProjectId::new("p2")));
        let outcome = coordinator.submit(pending).await;

        assert!(AssignmentCoordinator::<FakeProjects>::settle(&mut controller, outcome).is_err());
        assert!(controller.exclusions().is_empty());
        assert_eq!(controller.project(), Some(&ProjectId::new("p2")));
    }
}
