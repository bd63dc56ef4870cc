use crate::core::driver::DriverPars;
use crate::core::lap::RawLap;
use crate::core::race_history::{RaceHistory, RacePars};

pub(crate) fn race_pars(tot_no_laps: u32) -> RacePars {
    RacePars {
        season: 2019,
        track_name: String::from("Testring"),
        tot_no_laps,
        fuel_per_lap: 1.8,
        fuel_time_effect: 0.03,
        tyre_types: vec!["Option".into(), "Prime".into()],
    }
}

pub(crate) fn driver_pars(idx: usize, tyres: &[&str]) -> DriverPars {
    DriverPars {
        initials: format!("D{:02}", idx),
        name: format!("Driver {}", idx),
        color: String::from("#808080"),
        tyres: tyres.iter().map(|&t| t.into()).collect(),
    }
}

/// raw builds raw laps from lap times, `in_laps` holds the 0-based indices of in-laps.
pub(crate) fn raw(times: &[f64], in_laps: &[usize]) -> Vec<RawLap> {
    times
        .iter()
        .enumerate()
        .map(|(idx, &time)| RawLap {
            time,
            in_lap: in_laps.contains(&idx),
            retired: false,
        })
        .collect()
}

pub(crate) fn history(tot_no_laps: u32, drivers: Vec<(Vec<RawLap>, Vec<&str>)>) -> RaceHistory {
    let driver_pars_all: Vec<DriverPars> = drivers
        .iter()
        .enumerate()
        .map(|(idx, (_, tyres))| driver_pars(idx, tyres))
        .collect();
    let raw_laps: Vec<Vec<RawLap>> = drivers.into_iter().map(|(laps, _)| laps).collect();

    RaceHistory::new(&race_pars(tot_no_laps), &driver_pars_all, &raw_laps)
}
