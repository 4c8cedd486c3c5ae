//! Location resolution through to rendered results

use std::sync::Arc;

use proxima_engine::{
    ChannelPositioning, DiscoveryPhase, DiscoveryPolicy, DiscoverySession, DiscoveryView,
    EmptyState, LocationStatus, NoPositioning, PositionError, PositionEvent, PositioningSource,
    SessionContext, ViewNotice, WatchOptions,
};
use proxima_types::{Category, Coordinate, LocationSource, ProjectId, UserId};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    backend_for, backend_with_retries, mount_directory, mount_geocode, mount_profile, mount_team,
    professional, settle_until, within,
};

fn watch_options() -> WatchOptions {
    WatchOptions {
        timeout: std::time::Duration::from_millis(200),
        ..WatchOptions::default()
    }
}

fn located_from(view: &DiscoveryView) -> Option<LocationSource> {
    match view.location {
        LocationStatus::Located(fix) => Some(fix.source),
        _ => None,
    }
}

#[tokio::test]
async fn denied_location_falls_back_to_profile_city() {
    let server = MockServer::start().await;
    mount_profile(&server, "u1", json!({ "city": "Pune", "category": "Contractor" })).await;
    mount_geocode(&server, "Pune", "18.52", "73.85").await;
    mount_directory(
        &server,
        "50",
        vec![
            professional("pro-1", "Asha Kulkarni", "Architect", 1.4),
            professional("pro-2", "Ravi Deshmukh", "Engineer", 6.0),
        ],
    )
    .await;
    mount_team(&server, "p1", &["pro-2"]).await;

    let (positioning, mut requests) = ChannelPositioning::new();
    let mut session = DiscoverySession::mount(
        backend_for(&server),
        Arc::new(positioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        Some(ProjectId::new("p1")),
        watch_options(),
    );

    let request = within(requests.recv()).await.unwrap();
    assert!(request.options.high_accuracy);
    assert!(
        request
            .feed
            .publish(PositionEvent::Failed(PositionError::PermissionDenied))
            .await
    );

    let view = settle_until(&mut session, |v| {
        v.phase == DiscoveryPhase::Ready && v.professionals.len() == 1
    })
    .await;

    assert_eq!(located_from(&view), Some(LocationSource::GeocodedCity));
    assert!((view.radius.get() - 50.0).abs() < f64::EPSILON);
    assert_eq!(view.professionals[0].id.as_str(), "pro-1");
    assert!(view.empty_state.is_none());
    assert!(request.feed.is_released(), "a denied watch is not kept open");
    assert!(
        session
            .take_notices()
            .iter()
            .any(|n| matches!(n, ViewNotice::Recenter(c) if (c.lat() - 18.52).abs() < 1e-9))
    );

    session.unmount();
}

#[tokio::test]
async fn stored_profile_coordinate_skips_the_geocoder() {
    let server = MockServer::start().await;
    mount_profile(
        &server,
        "u1",
        json!({ "user": { "latitude": 19.07, "longitude": 72.87, "city": "Mumbai" } }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/geocode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    mount_directory(&server, "100", vec![professional("pro-9", "Meera", "Supplier", 3.0)])
        .await;

    let mut session = DiscoverySession::mount(
        backend_for(&server),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::list(),
        None,
        watch_options(),
    );

    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Ready).await;
    let LocationStatus::Located(fix) = view.location else {
        panic!("expected a fix, got {:?}", view.location);
    };
    assert_eq!(fix.source, LocationSource::StoredProfile);
    assert_eq!(fix.coordinate, Coordinate::new(19.07, 72.87).unwrap());
    assert_eq!(view.professionals.len(), 1);

    session.unmount();
    server.verify().await;
}

#[tokio::test]
async fn no_source_leaves_location_unavailable() {
    let server = MockServer::start().await;
    mount_profile(&server, "u1", json!({})).await;
    Mock::given(method("GET"))
        .and(path("/professionals/nearby"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let mut session = DiscoverySession::mount(
        backend_for(&server),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        None,
        watch_options(),
    );

    let view = settle_until(&mut session, |v| v.location == LocationStatus::Unavailable).await;
    assert_eq!(view.phase, DiscoveryPhase::AwaitingLocation);
    assert!(view.professionals.is_empty());

    session.unmount();
    server.verify().await;
}

#[tokio::test]
async fn live_fix_keeps_watch_until_unmount() {
    let server = MockServer::start().await;
    mount_profile(&server, "u1", json!({ "city": "Pune" })).await;
    mount_directory(
        &server,
        "50",
        vec![
            professional("pro-1", "Asha Kulkarni", "Architect", 1.4),
            professional("pro-3", "Kiran Patil", "Contractor", 2.2),
        ],
    )
    .await;

    let (positioning, mut requests) = ChannelPositioning::new();
    let positioning: Arc<dyn PositioningSource> = Arc::new(positioning);
    let mut session = DiscoverySession::mount(
        backend_for(&server),
        positioning,
        SessionContext::signed_in(UserId::new("u1")).with_category(Some(Category::Contractor)),
        DiscoveryPolicy::map(),
        None,
        watch_options(),
    );

    let request = within(requests.recv()).await.unwrap();
    let here = Coordinate::new(18.53, 73.84).unwrap();
    assert!(request.feed.publish(PositionEvent::Fix(here)).await);

    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Ready).await;
    assert_eq!(located_from(&view), Some(LocationSource::LiveGps));
    let ids: Vec<&str> = view.professionals.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["pro-1"], "same-trade peers are hidden");
    assert!(!request.feed.is_released());

    session.unmount();
    within(request.feed.released()).await;
}

#[tokio::test]
async fn directory_failure_then_retry() {
    let server = MockServer::start().await;
    mount_profile(&server, "u1", json!({ "latitude": 18.52, "longitude": 73.85 })).await;
    Mock::given(method("GET"))
        .and(path("/professionals/nearby"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({ "message": "maintenance" })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_directory(&server, "50", Vec::new()).await;

    let mut session = DiscoverySession::mount(
        backend_for(&server),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        None,
        watch_options(),
    );

    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Error).await;
    let error = view.error.expect("error surfaced");
    assert_eq!(error.status, Some(503));
    assert!(view.professionals.is_empty());

    session.retry();
    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Ready).await;
    assert!(view.error.is_none());
    assert_eq!(view.empty_state, Some(EmptyState::NoMatches));

    session.unmount();
}

#[tokio::test]
async fn directory_failure_is_not_retried_behind_the_view() {
    let server = MockServer::start().await;
    // The profile read fails once and is retried; the search is not.
    Mock::given(method("GET"))
        .and(path("/users/u1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_profile(&server, "u1", json!({ "latitude": 18.52, "longitude": 73.85 })).await;
    Mock::given(method("GET"))
        .and(path("/professionals/nearby"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_directory(&server, "50", vec![professional("pro-1", "Asha Kulkarni", "Architect", 1.4)])
        .await;

    let mut session = DiscoverySession::mount(
        backend_with_retries(&server, 2),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        None,
        watch_options(),
    );

    let view = settle_until(&mut session, |v| {
        matches!(v.phase, DiscoveryPhase::Ready | DiscoveryPhase::Error)
    })
    .await;
    assert_eq!(view.phase, DiscoveryPhase::Error);
    assert_eq!(view.error.map(|e| e.status), Some(Some(503)));

    session.retry();
    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Ready).await;
    assert_eq!(view.professionals.len(), 1);

    session.unmount();
    server.verify().await;
}

#[tokio::test]
async fn malformed_directory_record_does_not_hide_the_rest() {
    let server = MockServer::start().await;
    mount_profile(&server, "u1", json!({ "latitude": 18.52, "longitude": 73.85 })).await;
    let mut broken = professional("pro-2", "Ravi Deshmukh", "Engineer", 6.0);
    broken["lat"] = json!(null);
    mount_directory(
        &server,
        "50",
        vec![professional("pro-1", "Asha Kulkarni", "Architect", 1.4), broken],
    )
    .await;

    let mut session = DiscoverySession::mount(
        backend_for(&server),
        Arc::new(NoPositioning),
        SessionContext::signed_in(UserId::new("u1")),
        DiscoveryPolicy::map(),
        None,
        watch_options(),
    );

    let view = settle_until(&mut session, |v| v.phase == DiscoveryPhase::Ready).await;
    let ids: Vec<&str> = view.professionals.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["pro-1"]);
    assert!(view.error.is_none());

    session.unmount();
}
