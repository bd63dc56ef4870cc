mod logging;

use anyhow::anyhow;
use clap::Parser;
use log::{debug, info};
use racehist::core::handle_history::{handle_history, LapSource};
use racehist::core::positions::Gap;
use racehist::interfaces::panel_interface::PositionUpdate;
use racehist::post::snapshot::{read_snapshot, write_snapshot};
use racehist::pre::hist_opts::HistOpts;
use racehist::pre::read_history_pars::{read_edits, read_history_pars};
use racehist::pre::read_raw_laps::read_raw_laps;
use std::thread;
use std::time::Instant;

/// log_update prints a short summary of a published position table.
fn log_update(update: &PositionUpdate, driver_names: &[String]) {
    let last_lap = match update.grid.last() {
        Some(last_lap) => last_lap,
        None => return,
    };

    let summary: Vec<String> = last_lap
        .iter()
        .map(|entry| {
            let name = driver_names
                .get(entry.driver.0)
                .map_or("???", |name| name.as_str());
            match Gap::decode(entry.gap) {
                Gap::Time(t) => format!("{} +{:.3}s", name, t),
                Gap::Laps(n) => format!("{} +{}L", name, n),
                Gap::Unavailable => format!("{} DNF", name),
            }
        })
        .collect();

    match update.lap_affected {
        Some(lap) => debug!("Update from lap {}: {}", lap, summary.join(", ")),
        None => debug!("Initial classification: {}", summary.join(", ")),
    }
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get options from the command line arguments
    let hist_opts: HistOpts = HistOpts::parse();
    logging::setup_logging(hist_opts.debug)?;

    // get race parameters
    info!("Reading race parameters from {}", hist_opts.parfile_path.display());
    let pars = read_history_pars(&hist_opts.parfile_path)?;
    let driver_names = pars.driver_names();

    info!(
        "Reconstructing {} {} with {} drivers",
        pars.race_pars.track_name,
        pars.race_pars.season,
        driver_names.len()
    );

    // get lap records either from a snapshot or from the raw laps
    let source = match (&hist_opts.snapshot_path, &hist_opts.laps_path) {
        (Some(snapshot_path), _) => {
            info!("Continuing from snapshot {}", snapshot_path.display());
            LapSource::Snapshot(read_snapshot(snapshot_path, &driver_names)?)
        }
        (None, Some(laps_path)) => {
            info!("Reading raw laps from {}", laps_path.display());
            LapSource::Raw(read_raw_laps(laps_path, &driver_names)?)
        }
        (None, None) => anyhow::bail!("Either a raw lap file or a snapshot file is required!"),
    };

    let edits = match &hist_opts.edits_path {
        Some(edits_path) => read_edits(edits_path)?,
        None => Vec::new(),
    };

    // EXECUTION -----------------------------------------------------------------------------------
    let t_start = Instant::now();
    let (tx, rx) = flume::unbounded::<PositionUpdate>();

    let handle = thread::spawn(move || handle_history(&pars, source, &edits, Some(&tx)));

    // the channel disconnects once the history is handed back and its sender dropped
    for update in rx.iter() {
        log_update(&update, &driver_names);
    }

    let (history, result) = handle
        .join()
        .map_err(|_| anyhow!("Reconstruction thread panicked!"))??;

    info!("Execution time: {}ms", t_start.elapsed().as_millis());

    // POST-PROCESSING -----------------------------------------------------------------------------
    match &hist_opts.tables_path {
        Some(tables_path) => {
            result.write_tables_to_file(tables_path)?;
            info!("Result tables written to {}", tables_path.display());
        }
        None => result.print_tables()?,
    }

    if let Some(json_path) = &hist_opts.json_path {
        result.write_json(json_path)?;
        info!("JSON export written to {}", json_path.display());
    }

    if let Some(output_path) = &hist_opts.output_path {
        write_snapshot(output_path, &history)?;
    }

    Ok(())
}
