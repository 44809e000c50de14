//! The host process: an axum server whose routes can be installed at runtime.
//!
//! Axum routers are immutable once built, so the server's only route is a
//! fallback that dispatches each request through the current [`RouteTable`].
//! Capabilities that show up late (the download endpoint) are inserted into
//! the table from the host's own runtime and become reachable immediately.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock, RwLock};

use axum::extract::{Request, State};
use axum::response::Response;
use axum::routing::MethodRouter;
use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Runtime-mutable set of routes. Mutate only from the host's runtime.
#[derive(Default)]
pub struct RouteTable {
    inner: RwLock<Routes>,
}

#[derive(Default)]
struct Routes {
    paths: BTreeSet<String>,
    router: Router,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_route(&self, path: &str) -> bool {
        self.inner.read().unwrap().paths.contains(path)
    }

    pub fn paths(&self) -> Vec<String> {
        self.inner.read().unwrap().paths.iter().cloned().collect()
    }

    /// Installs `route` at `path` unless the path is already taken.
    /// Returns `false` (and leaves the table untouched) for a duplicate.
    pub fn insert_if_absent(&self, path: &str, route: MethodRouter) -> bool {
        let mut routes = self.inner.write().unwrap();
        if !routes.paths.insert(path.to_string()) {
            return false;
        }
        let router = std::mem::take(&mut routes.router);
        routes.router = router.route(path, route);
        true
    }

    fn snapshot(&self) -> Router {
        self.inner.read().unwrap().router.clone()
    }

    /// Axum app serving whatever the table holds at request time.
    pub fn app(self: &Arc<Self>) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(Arc::clone(self))
    }
}

async fn dispatch(State(table): State<Arc<RouteTable>>, request: Request) -> Response {
    let router = table.snapshot();
    match router.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// What a registrant needs from the host: its runtime (to hand work over to)
/// and its route table.
#[derive(Clone)]
pub struct HostContext {
    pub handle: tokio::runtime::Handle,
    pub routes: Arc<RouteTable>,
}

/// Finds the host, if it is up yet.
pub trait HostLocator: Send + Sync + 'static {
    fn locate(&self) -> Option<HostContext>;
}

/// Slot the host publishes itself into once initialized. Write-once.
#[derive(Default)]
pub struct HostSlot {
    context: OnceLock<HostContext>,
}

static GLOBAL_HOST: HostSlot = HostSlot::new();

impl HostSlot {
    pub const fn new() -> Self {
        Self {
            context: OnceLock::new(),
        }
    }

    /// The process-wide slot used by `mfetch serve`.
    pub fn global() -> &'static HostSlot {
        &GLOBAL_HOST
    }

    /// Publishes the host. A second publish is ignored and returns `false`.
    pub fn publish(&self, context: HostContext) -> bool {
        self.context.set(context).is_ok()
    }
}

impl HostLocator for HostSlot {
    fn locate(&self) -> Option<HostContext> {
        self.context.get().cloned()
    }
}

impl HostLocator for &'static HostSlot {
    fn locate(&self) -> Option<HostContext> {
        (**self).locate()
    }
}

impl<L: HostLocator> HostLocator for Arc<L> {
    fn locate(&self) -> Option<HostContext> {
        (**self).locate()
    }
}

/// Serves `routes` on `listener` until the server fails. Call from inside the
/// host runtime.
pub async fn serve(listener: TcpListener, routes: Arc<RouteTable>) -> std::io::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("host listening on http://{}", addr);
    axum::serve(listener, routes.app()).await
}
