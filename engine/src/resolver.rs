//! Location resolution.
//!
//! Produces the acting user's coordinate from, in strict precedence order,
//! live device positioning, the stored profile coordinate, and the geocoded
//! profile city. Emissions never go down in precedence: once a live fix has
//! been reported, fallback results are dropped.
//!
//! The resolver runs as a spawned, abortable task. Aborting it drops the
//! position watch, which releases the device subscription.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use proxima_types::{Fix, LocationSource, UserId};
use tokio::sync::mpsc;

use crate::context::SessionContext;
use crate::errors::LocationUnavailable;
use crate::positioning::{PositionEvent, PositionWatch, PositioningSource, WatchOptions};
use crate::services::{GeocodingService, ProfileService};

const RESOLUTION_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolverEvent {
    Located(Fix),
    /// Every source failed. Reported at most once; a later live fix may still
    /// follow if the device watch stayed open.
    Unavailable(LocationUnavailable),
}

pub struct LocationResolver<B> {
    backend: Arc<B>,
    positioning: Arc<dyn PositioningSource>,
    context: SessionContext,
    options: WatchOptions,
}

/// Cancels the resolver task on drop.
#[derive(Debug)]
pub struct ResolverHandle {
    abort: AbortHandle,
}

impl ResolverHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

/// Resolver output for callers that want a dedicated stream.
#[derive(Debug)]
pub struct Resolution {
    events: mpsc::Receiver<ResolverEvent>,
    handle: ResolverHandle,
}

impl Resolution {
    /// Next emission, in production order. `None` once resolution has ended.
    pub async fn next(&mut self) -> Option<ResolverEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    Idle,
    Running,
    Finished,
}

enum Step {
    Position(Option<PositionEvent>),
    Fallback(Option<Fix>),
}

impl<B> LocationResolver<B>
where
    B: ProfileService + GeocodingService,
{
    #[must_use]
    pub fn new(
        backend: Arc<B>,
        positioning: Arc<dyn PositioningSource>,
        context: SessionContext,
        options: WatchOptions,
    ) -> Self {
        Self {
            backend,
            positioning,
            context,
            options,
        }
    }

    /// Start resolving on the current runtime.
    #[must_use]
    pub fn resolve(self) -> Resolution {
        let (tx, rx) = mpsc::channel(RESOLUTION_BUFFER);
        let handle = self.spawn_into(tx, |event| event);
        Resolution { events: rx, handle }
    }

    /// Start resolving, delivering each event through `wrap` into `tx`.
    pub(crate) fn spawn_into<E, W>(self, tx: mpsc::Sender<E>, wrap: W) -> ResolverHandle
    where
        E: Send + 'static,
        W: Fn(ResolverEvent) -> E + Send + Sync + 'static,
    {
        let (abort, registration) = AbortHandle::new_pair();
        let task = Abortable::new(self.run(tx, wrap), registration);
        tokio::spawn(async move {
            if task.await.is_err() {
                tracing::debug!("Location resolver cancelled");
            }
        });
        ResolverHandle { abort }
    }

    async fn run<E, W>(self, tx: mpsc::Sender<E>, wrap: W)
    where
        W: Fn(ResolverEvent) -> E,
    {
        let Self {
            backend,
            positioning,
            context,
            options,
        } = self;
        let emit = |event| {
            let tx = tx.clone();
            let message = wrap(event);
            async move { tx.send(message).await.is_ok() }
        };

        let mut watch = match positioning.watch(options) {
            Ok(watch) => Some(watch),
            Err(e) => {
                tracing::info!(%e, "Falling back to profile location");
                None
            }
        };
        let mut fallback_state = if watch.is_some() {
            Fallback::Idle
        } else {
            Fallback::Running
        };
        let fallback = resolve_from_profile(backend, context.user);
        tokio::pin!(fallback);
        let mut best: Option<LocationSource> = None;

        loop {
            let step = match (fallback_state, watch.is_some()) {
                (Fallback::Running, _) => tokio::select! {
                    biased;
                    event = next_position(&mut watch) => Step::Position(event),
                    fix = &mut fallback => Step::Fallback(fix),
                },
                (_, true) => Step::Position(next_position(&mut watch).await),
                (_, false) => break,
            };

            match step {
                Step::Position(Some(PositionEvent::Fix(coordinate))) => {
                    if fallback_state == Fallback::Running {
                        tracing::debug!("Live fix arrived; abandoning profile fallback");
                        fallback_state = Fallback::Finished;
                    }
                    best = Some(LocationSource::LiveGps);
                    let fix = Fix::new(coordinate, LocationSource::LiveGps);
                    if !emit(ResolverEvent::Located(fix)).await {
                        return;
                    }
                }
                Step::Position(Some(PositionEvent::Failed(err))) => {
                    if err.is_terminal() {
                        watch = None;
                    }
                    if best.is_some() {
                        tracing::debug!(%err, "Ignoring positioning error after a fix");
                        continue;
                    }
                    if fallback_state == Fallback::Idle {
                        tracing::info!(%err, "Live positioning failed; trying profile location");
                        fallback_state = Fallback::Running;
                    }
                }
                Step::Position(None) => {
                    tracing::debug!("Positioning feed closed");
                    watch = None;
                    if best.is_none() && fallback_state == Fallback::Idle {
                        fallback_state = Fallback::Running;
                    }
                }
                Step::Fallback(outcome) => {
                    fallback_state = Fallback::Finished;
                    let event = match outcome {
                        Some(fix) if best.is_none_or(|b| !b.outranks(fix.source)) => {
                            tracing::info!(source = fix.source.as_str(), "Location resolved");
                            best = Some(fix.source);
                            ResolverEvent::Located(fix)
                        }
                        Some(_) => continue,
                        None => {
                            tracing::info!("No location source succeeded");
                            ResolverEvent::Unavailable(LocationUnavailable)
                        }
                    };
                    if !emit(event).await {
                        return;
                    }
                }
            }
        }
    }
}

async fn next_position(watch: &mut Option<PositionWatch>) -> Option<PositionEvent> {
    match watch {
        Some(watch) => watch.next().await,
        None => std::future::pending().await,
    }
}

async fn resolve_from_profile<B>(backend: Arc<B>, user: Option<UserId>) -> Option<Fix>
where
    B: ProfileService + GeocodingService,
{
    let Some(user) = user else {
        tracing::info!("No signed-in user; skipping profile location");
        return None;
    };
    let profile = match backend.fetch_profile(&user).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!(%user, %e, "Profile lookup failed");
            return None;
        }
    };

    if let Some(coordinate) = profile.coordinate {
        return Some(Fix::new(coordinate, LocationSource::StoredProfile));
    }
    let Some(city) = profile.city else {
        tracing::info!(%user, "Profile has neither a coordinate nor a city");
        return None;
    };

    match backend.geocode(&city).await {
        Ok(Some(coordinate)) => Some(Fix::new(coordinate, LocationSource::GeocodedCity)),
        Ok(None) => {
            tracing::info!(city = %city, "City could not be geocoded");
            None
        }
        Err(e) => {
            tracing::warn!(city = %city, %e, "Geocoder request failed");
            None
        }
    }
}
