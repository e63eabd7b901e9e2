//! Worker event dispatch.
//!
//! The explicit event table standing in for listener registration: each
//! event kind routes to exactly one handler on [`OfflineWorker`]. Every
//! handler resolves on every code path (a response, an outcome, or an
//! error); nothing is ever left pending, so a dispatched fetch can never
//! hang its request.

use crate::request::{InterceptedRequest, ServedResponse};
use crate::worker::OfflineWorker;
use kiri_core::Error;

/// Events the host delivers to a worker version.
#[derive(Debug)]
pub enum WorkerEvent {
    /// Fired once per worker version at registration time.
    Install,
    /// Fired when this version takes over the scope.
    Activate,
    /// Fired for every request in the controlled scope.
    Fetch(InterceptedRequest),
}

/// What dispatching an event produced.
#[derive(Debug)]
pub enum EventOutcome {
    /// Manifest population finished; the version is waiting to activate.
    Installed { cached: u64 },
    /// Superseded generations swept; the version is active.
    Activated { purged: u64 },
    /// A response for the intercepted request.
    Served(ServedResponse),
}

impl OfflineWorker {
    /// Route an event to its handler.
    ///
    /// Install and activate suspend at cache and network operations; fetch
    /// handlers for different requests interleave at those same points (the
    /// cache is shared and not locked between a handler's suspensions).
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(|cached| EventOutcome::Installed { cached }),
            WorkerEvent::Activate => self.activate().await.map(|purged| EventOutcome::Activated { purged }),
            WorkerEvent::Fetch(request) => self.handle_fetch(request).await.map(EventOutcome::Served),
        }
    }
}
