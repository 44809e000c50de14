//! `mfetch serve` – host process with the download endpoint.

use anyhow::{Context, Result};
use mfetch_core::config::MfetchConfig;
use mfetch_core::endpoint::{self, DownloadService};
use mfetch_core::host::{self, HostContext, HostSlot, RouteTable};
use mfetch_core::registration::{RegistrationScheduler, RegistrationState};
use std::sync::Arc;
use tokio::net::TcpListener;

pub fn run_serve(cfg: &MfetchConfig, bind: Option<&str>) -> Result<()> {
    let service = DownloadService::from_config(cfg).context("invalid [roots] in config")?;
    for (key, roots) in service.roots().iter() {
        tracing::debug!(key, roots = ?roots, "download root");
    }

    // The scheduler starts before the host exists and polls until it shows up.
    let scheduler = RegistrationScheduler::new(
        HostSlot::global(),
        RegistrationState::global(),
        cfg.route_path.clone(),
        endpoint::route(Arc::new(service)),
        cfg.registration_retry(),
    );
    scheduler
        .spawn()
        .context("failed to start registration thread")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("mfetch-host")
        .build()
        .context("failed to build host runtime")?;

    let addr = bind.unwrap_or(&cfg.bind_addr).to_string();
    runtime.block_on(async move {
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        let routes = Arc::new(RouteTable::new());
        HostSlot::global().publish(HostContext {
            handle: tokio::runtime::Handle::current(),
            routes: Arc::clone(&routes),
        });
        eprintln!("listening on http://{}", listener.local_addr()?);
        host::serve(listener, routes).await?;
        Ok::<(), anyhow::Error>(())
    })
}
