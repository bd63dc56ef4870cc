use crate::core::driver::Driver;
use crate::core::edits::Edit;
use crate::core::lap::RawLap;
use crate::core::race_history::RaceHistory;
use crate::interfaces::panel_interface::PositionUpdate;
use crate::post::history_result::HistoryResult;
use crate::post::snapshot::Snapshot;
use crate::pre::read_history_pars::HistoryPars;
use flume::Sender;
use log::{info, warn};
use std::time::Instant;

/// LapSource selects where the lap records of a reconstruction come from.
#[derive(Debug, Clone)]
pub enum LapSource {
    Raw(Vec<Vec<RawLap>>),
    Snapshot(Snapshot),
}

/// handle_history builds the race history on the basis of the inserted parameters, applies the
/// edits in the given order, and returns the history together with the results for
/// post-processing. If a sender is inserted, the initial position table and the table after every
/// effective edit are published through it. The returned history has no publisher attached.
pub fn handle_history(
    pars: &HistoryPars,
    source: LapSource,
    edits: &[Edit],
    tx: Option<&Sender<PositionUpdate>>,
) -> anyhow::Result<(RaceHistory, HistoryResult)> {
    let drivers = pars
        .driver_pars_all
        .iter()
        .map(Driver::new)
        .collect::<anyhow::Result<Vec<Driver>>>()?;

    let t_start = Instant::now();
    let mut history = match source {
        LapSource::Raw(raw_laps) => {
            RaceHistory::new(&pars.race_pars, &pars.driver_pars_all, &raw_laps)
        }
        LapSource::Snapshot(snapshot) => RaceHistory::from_snapshot(
            &pars.race_pars,
            &pars.driver_pars_all,
            snapshot.laps,
            snapshot.tyre_usage,
        ),
    };
    info!(
        "Race history ready after {}ms",
        t_start.elapsed().as_millis()
    );

    if let Some(tx) = tx {
        history.attach_publisher(tx.clone());
        history.publish(None);
    }

    let mut no_applied = 0;
    for edit in edits {
        match history.edit(edit) {
            Some(_) => no_applied += 1,
            None => warn!("Edit {:?} did not change the race history", edit),
        }
    }
    if !edits.is_empty() {
        info!("{} of {} edits applied", no_applied, edits.len());
    }

    // the returned history must not keep the channel alive
    history.publisher = None;

    let result = HistoryResult::from_history(&history, &drivers);
    Ok((history, result))
}
