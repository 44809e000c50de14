//! Installs the download endpoint into a host that may not exist yet.
//!
//! There is no "host ready" signal, so a background timer thread polls the
//! [`HostLocator`] on a fixed interval. Once the host is found, installation
//! is handed over to the host's runtime (never performed on the timer thread)
//! and the sticky [`RegistrationState`] flips to registered for the rest of
//! the process lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use axum::routing::MethodRouter;

use crate::host::{HostLocator, RouteTable};

/// Registered flag plus bookkeeping. Readable from any thread; only the
/// host-side install task sets the flag.
#[derive(Debug, Default)]
pub struct RegistrationState {
    registered: AtomicBool,
    last_attempt: Mutex<Option<Instant>>,
}

impl RegistrationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide state used by `mfetch serve`.
    pub fn global() -> Arc<RegistrationState> {
        static GLOBAL: OnceLock<Arc<RegistrationState>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(RegistrationState::new())))
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Sets the flag; returns `true` only for the call that flipped it.
    fn mark_registered(&self) -> bool {
        !self.registered.swap(true, Ordering::AcqRel)
    }

    fn note_attempt(&self) {
        *self.last_attempt.lock().unwrap() = Some(Instant::now());
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        *self.last_attempt.lock().unwrap()
    }
}

/// Result of one [`RegistrationScheduler::attempt_register`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Route is installed (terminal).
    Registered,
    /// Host found; installation was queued on its runtime.
    HandedOff,
    /// Host not available yet; try again later.
    NotReady,
}

pub struct RegistrationScheduler<L: HostLocator> {
    locator: L,
    state: Arc<RegistrationState>,
    route_path: String,
    endpoint: MethodRouter,
    retry_interval: Duration,
}

impl<L: HostLocator> RegistrationScheduler<L> {
    pub fn new(
        locator: L,
        state: Arc<RegistrationState>,
        route_path: impl Into<String>,
        endpoint: MethodRouter,
        retry_interval: Duration,
    ) -> Self {
        Self {
            locator,
            state,
            route_path: route_path.into(),
            endpoint,
            retry_interval,
        }
    }

    /// One idempotent registration step. Safe to call any number of times
    /// from any thread.
    pub fn attempt_register(&self) -> AttemptOutcome {
        if self.state.is_registered() {
            return AttemptOutcome::Registered;
        }
        self.state.note_attempt();

        let Some(host) = self.locator.locate() else {
            tracing::debug!(route = %self.route_path, "host not ready; will retry");
            return AttemptOutcome::NotReady;
        };

        let routes = Arc::clone(&host.routes);
        let state = Arc::clone(&self.state);
        let path = self.route_path.clone();
        let endpoint = self.endpoint.clone();
        host.handle.spawn(async move {
            install_route(&routes, &state, &path, endpoint);
        });
        AttemptOutcome::HandedOff
    }

    /// Polls on the timer thread until the route is installed, then exits.
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("mfetch-register".into())
            .spawn(move || {
                while self.attempt_register() != AttemptOutcome::Registered {
                    std::thread::sleep(self.retry_interval);
                }
            })
    }
}

/// Runs on the host runtime. Short-circuits if another attempt (or a reload)
/// already installed the path.
fn install_route(routes: &RouteTable, state: &RegistrationState, path: &str, endpoint: MethodRouter) {
    if state.is_registered() {
        return;
    }
    if routes.insert_if_absent(path, endpoint) {
        tracing::info!("direct model downloader route registered at {}", path);
    } else {
        tracing::debug!("route {} already present; skipping install", path);
    }
    state.mark_registered();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostContext, HostSlot};
    use axum::routing::post;

    fn endpoint() -> MethodRouter {
        post(|| async { "ok" })
    }

    #[test]
    fn not_ready_without_host() {
        let slot = Arc::new(HostSlot::new());
        let state = Arc::new(RegistrationState::new());
        let sched = RegistrationScheduler::new(
            Arc::clone(&slot),
            Arc::clone(&state),
            "/internal/download_model",
            endpoint(),
            Duration::from_millis(10),
        );
        assert!(state.last_attempt().is_none());
        assert_eq!(sched.attempt_register(), AttemptOutcome::NotReady);
        assert!(state.last_attempt().is_some());
        assert!(!state.is_registered());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn existing_route_short_circuits() {
        let routes = Arc::new(RouteTable::new());
        assert!(routes.insert_if_absent("/internal/download_model", endpoint()));
        let slot = Arc::new(HostSlot::new());
        slot.publish(HostContext {
            handle: tokio::runtime::Handle::current(),
            routes: Arc::clone(&routes),
        });
        let state = Arc::new(RegistrationState::new());
        let sched = RegistrationScheduler::new(
            slot,
            Arc::clone(&state),
            "/internal/download_model",
            endpoint(),
            Duration::from_millis(10),
        );

        assert_eq!(sched.attempt_register(), AttemptOutcome::HandedOff);
        for _ in 0..100 {
            if state.is_registered() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(state.is_registered());
        assert_eq!(sched.attempt_register(), AttemptOutcome::Registered);
        assert_eq!(routes.paths(), vec!["/internal/download_model".to_string()]);
    }

    #[test]
    fn mark_registered_flips_once() {
        let state = RegistrationState::new();
        assert!(state.mark_registered());
        assert!(!state.mark_registered());
        assert!(state.is_registered());
    }
}
