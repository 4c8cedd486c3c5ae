//! Inviting professionals from a discovery session

use std::sync::Arc;

use proxima_engine::{
    AssignmentError, DiscoveryBackend, DiscoveryPhase, DiscoveryPolicy, DiscoverySession,
    HttpBackend, NoPositioning, SessionContext, ViewNotice, WatchOptions,
};
use proxima_types::{Category, ProfessionalId, ProjectId, UserId};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    backend_for, mount_directory, mount_profile, mount_team, professional, settle_until, within,
};

async fn mount_nearby(server: &MockServer) {
    mount_profile(server, "u1", json!({ "latitude": 18.52, "longitude": 73.85 })).await;
    mount_directory(
        server,
        "50",
        vec![
            professional("pro-1", "Asha Kulkarni", "Architect", 1.4),
            professional("pro-2", "Ravi Deshmukh", "Engineer", 6.0),
        ],
    )
    .await;
}

async fn ready_session(
    server: &MockServer,
    project: Option<&str>,
) -> DiscoverySession<HttpBackend> {
    let mut session = DiscoverySession::mount(
        backend_for(server),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        project.map(ProjectId::new),
        WatchOptions::default(),
    );
    settle_until(&mut session, |v| {
        v.phase == DiscoveryPhase::Ready && v.professionals.len() == 2
    })
    .await;
    session
}

/// Wait for the first assignment notice.
async fn assignment_notice<B: DiscoveryBackend>(
    session: &mut DiscoverySession<B>,
) -> ViewNotice {
    within(async {
        loop {
            let found = session.take_notices().into_iter().find(|n| {
                matches!(
                    n,
                    ViewNotice::Assigned { .. } | ViewNotice::AssignmentFailed { .. }
                )
            });
            if let Some(notice) = found {
                return notice;
            }
            session.next_event().await;
        }
    })
    .await
}

fn visible_ids<B: DiscoveryBackend>(session: &DiscoverySession<B>) -> Vec<String> {
    session
        .view()
        .professionals
        .iter()
        .map(|p| p.id.to_string())
        .collect()
}

#[tokio::test]
async fn successful_invite_hides_professional_and_refreshes_team() {
    let server = MockServer::start().await;
    mount_nearby(&server).await;
    Mock::given(method("GET"))
        .and(path("/projects/p1/team"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_team(&server, "p1", &["pro-1"]).await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/assign"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "userId": "pro-1", "role": "architect" })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ready_session(&server, Some("p1")).await;
    assert!(session.open_profile(&ProfessionalId::new("pro-1")));

    session
        .assign(ProfessionalId::new("pro-1"), Category::Architect)
        .unwrap();
    assert_eq!(visible_ids(&session), ["pro-2"], "hidden before the call returns");

    let notice = assignment_notice(&mut session).await;
    assert_eq!(
        notice,
        ViewNotice::Assigned {
            project: ProjectId::new("p1"),
            professional: ProfessionalId::new("pro-1"),
        }
    );
    assert!(session.view().selected.is_none());

    // The follow-up team snapshot confirms the membership.
    within(session.next_event()).await;
    assert_eq!(visible_ids(&session), ["pro-2"]);
    assert!(session.controller().exclusions().contains(&ProfessionalId::new("pro-1")));
    assert!(!session.controller().exclusions().is_pending(&ProfessionalId::new("pro-1")));

    session.unmount();
    server.verify().await;
}

#[tokio::test]
async fn rejected_invite_rolls_back() {
    let server = MockServer::start().await;
    mount_nearby(&server).await;
    mount_team(&server, "p1", &[]).await;
    Mock::given(method("POST"))
        .and(path("/projects/p1/assign"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({ "error": { "message": "invite already sent" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ready_session(&server, Some("p1")).await;
    session
        .assign(ProfessionalId::new("pro-1"), Category::Architect)
        .unwrap();
    assert_eq!(visible_ids(&session), ["pro-2"]);

    let ViewNotice::AssignmentFailed {
        professional,
        error,
        message,
    } = assignment_notice(&mut session).await
    else {
        panic!("expected a failure notice");
    };
    assert_eq!(professional.as_str(), "pro-1");
    assert_eq!(
        error,
        AssignmentError::Rejected {
            status: 409,
            message: "invite already sent".to_string(),
        }
    );
    assert!(message.as_str().starts_with("[Invite failed]"));
    assert_eq!(visible_ids(&session), ["pro-1", "pro-2"]);

    session.unmount();
    server.verify().await;
}

#[tokio::test]
async fn invite_without_project_never_reaches_the_network() {
    let server = MockServer::start().await;
    mount_nearby(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = ready_session(&server, None).await;
    let err = session
        .assign(ProfessionalId::new("pro-1"), Category::Architect)
        .unwrap_err();

    assert_eq!(err, AssignmentError::NoActiveProject);
    assert_eq!(visible_ids(&session), ["pro-1", "pro-2"]);

    session.unmount();
    server.verify().await;
}
