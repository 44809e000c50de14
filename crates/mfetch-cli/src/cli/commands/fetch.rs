//! `mfetch fetch` – blocking download with a progress line on stderr.

use anyhow::Result;
use mfetch_core::config::MfetchConfig;
use mfetch_core::direct::{DirectDownloader, DirectRequest};
use std::io::Write;
use std::time::Instant;

const PROGRESS_INTERVAL_MS: u128 = 500;

pub struct FetchArgs {
    pub url: String,
    pub models_path: String,
    pub model_type: String,
    pub filename: Option<String>,
    pub overwrite: bool,
}

pub fn run_fetch(cfg: &MfetchConfig, args: FetchArgs) -> Result<()> {
    let downloader = DirectDownloader::from_config(cfg);
    let req = DirectRequest {
        url: args.url,
        models_path: args.models_path,
        model_type: args.model_type,
        filename: args.filename,
        overwrite: args.overwrite,
    };

    let started = Instant::now();
    let mut last_print: Option<Instant> = None;
    let mut printed = false;
    let result = downloader.download(&req, |done, total| {
        let now = Instant::now();
        let due = last_print
            .map(|t| now.duration_since(t).as_millis() >= PROGRESS_INTERVAL_MS)
            .unwrap_or(true);
        if !due && Some(done) != total {
            return;
        }
        eprint!("\r  {}  ", progress_line(done, total, started.elapsed().as_secs_f64()));
        let _ = std::io::stderr().flush();
        last_print = Some(now);
        printed = true;
    });
    if printed {
        eprintln!();
    }

    let path = result?;
    println!("{}", path.display());
    Ok(())
}

fn progress_line(done: u64, total: Option<u64>, elapsed_secs: f64) -> String {
    let done_mib = done as f64 / 1_048_576.0;
    let rate_mib = if elapsed_secs > 0.0 {
        done_mib / elapsed_secs
    } else {
        0.0
    };
    match total.filter(|t| *t > 0) {
        Some(total) => {
            let total_mib = total as f64 / 1_048_576.0;
            let pct = done as f64 / total as f64 * 100.0;
            format!(
                "{:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s",
                done_mib, total_mib, pct, rate_mib
            )
        }
        None => format!("{:.1} MiB  {:.2} MiB/s", done_mib, rate_mib),
    }
}
