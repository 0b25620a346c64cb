use anyhow::Result;
use log::{error, info};
use std::{
    path::PathBuf,
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use crate::runner::{RunReport, fetch_once};

pub struct WatchConfig {
    pub interval_secs: u64,
    pub config_path: Option<PathBuf>,
    pub max_records_override: Option<usize>,
}

/// Fetch, sleep, repeat until Ctrl-C. One failed cycle does not stop the loop.
pub fn run_watch(cfg: WatchConfig) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r2 = running.clone();
    ctrlc::set_handler(move || {
        r2.store(false, Ordering::SeqCst);
    })?;

    let mut cycle: u64 = 0;
    while running.load(Ordering::SeqCst) {
        cycle += 1;
        match fetch_once(cfg.config_path.as_deref(), cfg.max_records_override) {
            Ok(RunReport::Finished(result)) => info!(
                "cycle {cycle}: {} records, {} failures",
                result.records.len(),
                result.failures.len()
            ),
            Ok(RunReport::Fatal(e)) => error!("cycle {cycle}: {e}"),
            Ok(RunReport::Unwritten(_, e)) => error!("cycle {cycle}: {e}"),
            Err(e) => error!("cycle {cycle}: {e:#}"),
        }

        // Sleep in short steps so Ctrl-C is honoured promptly.
        for _ in 0..cfg.interval_secs {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_secs(1));
        }
    }

    info!("stopped after {cycle} cycles");
    Ok(())
}
