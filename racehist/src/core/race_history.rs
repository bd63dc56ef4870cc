use crate::core::driver::DriverPars;
use crate::core::lap::{DriverIndex, LapAction, LapIndex, LapRecord, LapStatus, RawLap};
use crate::core::stint::{PitLoss, Stint, Trendline, TyreType};
use crate::interfaces::panel_interface::PositionUpdate;
use flume::Sender;
use helpers::general::{argsort, mean, SortOrder};
use log::{debug, info, warn};
use serde::Deserialize;

pub const DEFAULT_FUEL_PER_LAP: f64 = 1.8;
pub const DEFAULT_FUEL_TIME_EFFECT: f64 = 0.03;

/// Tolerance used when comparing race times.
pub(crate) const T_EPS: f64 = 1e-9;

fn default_fuel_per_lap() -> f64 {
    DEFAULT_FUEL_PER_LAP
}

fn default_fuel_time_effect() -> f64 {
    DEFAULT_FUEL_TIME_EFFECT
}

/// * `season` - Season
/// * `track_name` - Track name
/// * `tot_no_laps` - Total number of laps
/// * `fuel_per_lap` - (kg/lap) Fuel consumption per lap
/// * `fuel_time_effect` - (s/kg) Lap time sensitivity to fuel mass
/// * `tyre_types` - Tyre types available in this race
#[derive(Debug, Deserialize, Clone)]
pub struct RacePars {
    pub season: u32,
    pub track_name: String,
    pub tot_no_laps: u32,
    #[serde(default = "default_fuel_per_lap")]
    pub fuel_per_lap: f64,
    #[serde(default = "default_fuel_time_effect")]
    pub fuel_time_effect: f64,
    #[serde(default)]
    pub tyre_types: Vec<TyreType>,
}

/// RaceHistory owns the lap records and the tyre usage of every driver. Everything else (stints,
/// cumulative times, running order, position tables) is derived on request and never stored.
#[derive(Debug, Clone)]
pub struct RaceHistory {
    pub(crate) tot_no_laps: usize,
    pub(crate) fuel_per_lap: f64,
    pub(crate) fuel_time_effect: f64,
    pub(crate) driver_names: Vec<String>,
    pub(crate) laps: Vec<Vec<LapRecord>>,
    pub(crate) tyre_usage: Vec<Vec<TyreType>>,
    pub(crate) publisher: Option<Sender<PositionUpdate>>,
}

/// records_from_raw converts the raw laps of one driver into lap records. The lap after an in-lap
/// becomes an out-lap, laps after a retirement are dropped, and a driver that was lapped gets
/// untimed placeholder laps up to the race distance.
fn records_from_raw(driver: DriverIndex, raw_laps: &[RawLap], tot_no_laps: usize) -> Vec<LapRecord> {
    let mut records = Vec::with_capacity(tot_no_laps);
    let mut prev_in_lap = false;

    for (idx, raw_lap) in raw_laps.iter().take(tot_no_laps).enumerate() {
        let status = if raw_lap.in_lap {
            LapStatus::InLap
        } else if prev_in_lap {
            LapStatus::OutLap
        } else {
            LapStatus::Normal
        };
        let action = if raw_lap.retired {
            LapAction::Retire
        } else {
            LapAction::Clear
        };

        records.push(LapRecord::new(
            driver,
            LapIndex(idx),
            raw_lap.time,
            status,
            action,
            0,
        ));

        if raw_lap.retired {
            return records;
        }
        prev_in_lap = raw_lap.in_lap;
    }

    while records.len() < tot_no_laps {
        let status = if prev_in_lap {
            LapStatus::OutLap
        } else {
            LapStatus::Normal
        };
        records.push(LapRecord::new(
            driver,
            LapIndex(records.len()),
            0.0,
            status,
            LapAction::Clear,
            0,
        ));
        prev_in_lap = false;
    }

    records
}

/// order_at returns the running order at the end of `lap` on the basis of cumulative lap records.
/// Drivers without a record on that lap are appended, the most recent retirement first.
pub(crate) fn order_at(cum: &[Vec<LapRecord>], lap: LapIndex) -> Vec<DriverIndex> {
    let mut racing: Vec<(usize, &LapRecord)> = cum
        .iter()
        .enumerate()
        .filter_map(|(idx, recs)| recs.get(lap.0).map(|rec| (idx, rec)))
        .collect();
    racing.sort_by(|a, b| a.1.compare(b.1));

    let mut order: Vec<DriverIndex> = racing.iter().map(|(idx, _)| DriverIndex(*idx)).collect();

    let retired: Vec<usize> = (0..cum.len()).filter(|&idx| cum[idx].len() <= lap.0).collect();
    let last_laps: Vec<i64> = retired.iter().map(|&idx| cum[idx].len() as i64 - 1).collect();

    for i in argsort(&last_laps, SortOrder::Descending) {
        order.push(DriverIndex(retired[i]));
    }

    order
}

/// car_ahead returns the car directly ahead of `driver` in the running order of the lap before
/// `lap` that still has a record on `lap`. On the first lap the order of the first lap is used.
pub(crate) fn car_ahead(
    cum: &[Vec<LapRecord>],
    driver: DriverIndex,
    lap: LapIndex,
) -> Option<DriverIndex> {
    let order = order_at(cum, lap.prev().unwrap_or(lap));
    let pos = order.iter().position(|&idx| idx == driver)?;

    order[..pos]
        .iter()
        .rev()
        .copied()
        .find(|idx| cum[idx.0].len() > lap.0)
}

fn mean_preferring(preferred: &[f64], fallback: &[f64]) -> f64 {
    mean(preferred).or_else(|| mean(fallback)).unwrap_or(0.0)
}

impl RaceHistory {
    /// new builds the reconstruction from the raw laps of every driver (indexed like
    /// `driver_pars_all`), assigns lap deficits and runs the event detection.
    pub fn new(
        race_pars: &RacePars,
        driver_pars_all: &[DriverPars],
        raw_laps: &[Vec<RawLap>],
    ) -> RaceHistory {
        let tot_no_laps = race_pars.tot_no_laps as usize;

        let laps = (0..driver_pars_all.len())
            .map(|idx| {
                let raw = raw_laps.get(idx).map_or(&[][..], |r| r.as_slice());
                records_from_raw(DriverIndex(idx), raw, tot_no_laps)
            })
            .collect();

        let mut history = RaceHistory {
            tot_no_laps,
            fuel_per_lap: race_pars.fuel_per_lap,
            fuel_time_effect: race_pars.fuel_time_effect,
            driver_names: driver_pars_all.iter().map(|d| d.name.to_owned()).collect(),
            laps,
            tyre_usage: driver_pars_all.iter().map(|d| d.tyres.to_owned()).collect(),
            publisher: None,
        };

        history.normalize_tyre_usage();
        history.restore_lapped_laps();
        history.assign_lap_deficits();
        history.find_events();

        info!(
            "Reconstructed {} {} with {} drivers over {} laps",
            race_pars.track_name,
            race_pars.season,
            history.no_drivers(),
            tot_no_laps
        );

        history
    }

    /// from_snapshot replaces the lap records of every driver with the saved ones. Saved actions
    /// and deficits are taken over as they are.
    pub fn from_snapshot(
        race_pars: &RacePars,
        driver_pars_all: &[DriverPars],
        laps: Vec<Vec<LapRecord>>,
        tyre_usage: Option<Vec<Vec<TyreType>>>,
    ) -> RaceHistory {
        let no_drivers = driver_pars_all.len();

        let mut laps = laps;
        laps.resize_with(no_drivers, Vec::new);

        let mut tyre_usage = tyre_usage
            .unwrap_or_else(|| driver_pars_all.iter().map(|d| d.tyres.to_owned()).collect());
        tyre_usage.resize_with(no_drivers, Vec::new);

        let mut history = RaceHistory {
            tot_no_laps: race_pars.tot_no_laps as usize,
            fuel_per_lap: race_pars.fuel_per_lap,
            fuel_time_effect: race_pars.fuel_time_effect,
            driver_names: driver_pars_all.iter().map(|d| d.name.to_owned()).collect(),
            laps,
            tyre_usage,
            publisher: None,
        };
        history.normalize_tyre_usage();

        info!(
            "Loaded snapshot of {} drivers over {} laps",
            history.no_drivers(),
            history.tot_no_laps
        );

        history
    }

    // ---------------------------------------------------------------------------------------------
    // ACCESSORS -----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn no_drivers(&self) -> usize {
        self.laps.len()
    }

    pub fn tot_no_laps(&self) -> usize {
        self.tot_no_laps
    }

    pub fn driver_names(&self) -> &[String] {
        &self.driver_names
    }

    pub fn laps(&self, driver: DriverIndex) -> &[LapRecord] {
        self.laps.get(driver.0).map_or(&[][..], |laps| laps.as_slice())
    }

    pub fn all_laps(&self) -> &[Vec<LapRecord>] {
        &self.laps
    }

    pub fn tyre_usage(&self, driver: DriverIndex) -> &[TyreType] {
        self.tyre_usage
            .get(driver.0)
            .map_or(&[][..], |tyres| tyres.as_slice())
    }

    pub fn all_tyre_usage(&self) -> &[Vec<TyreType>] {
        &self.tyre_usage
    }

    /// attach_publisher sets the channel on which a fresh position table is sent after every
    /// completed edit.
    pub fn attach_publisher(&mut self, tx: Sender<PositionUpdate>) {
        self.publisher = Some(tx)
    }

    /// detached returns a copy of the state without the publisher.
    pub(crate) fn detached(&self) -> RaceHistory {
        RaceHistory {
            publisher: None,
            ..self.clone()
        }
    }

    /// live_laps returns the laps of a driver up to and including a recorded retirement.
    pub fn live_laps(&self, driver: DriverIndex) -> &[LapRecord] {
        let laps = self.laps(driver);
        match laps.iter().position(|rec| rec.action() == LapAction::Retire) {
            Some(idx) => &laps[..=idx],
            None => laps,
        }
    }

    pub fn retirement_lap(&self, driver: DriverIndex) -> Option<LapIndex> {
        self.laps(driver)
            .iter()
            .find(|rec| rec.action() == LapAction::Retire)
            .map(|rec| rec.lap())
    }

    // ---------------------------------------------------------------------------------------------
    // DERIVATIONS ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// cumulative_times returns the race time at the end of every live lap of every driver.
    pub fn cumulative_times(&self) -> Vec<Vec<f64>> {
        self.cumulative_records()
            .iter()
            .map(|recs| recs.iter().map(|rec| rec.time()).collect())
            .collect()
    }

    /// cumulative_records returns copies of the live lap records holding cumulative times.
    pub(crate) fn cumulative_records(&self) -> Vec<Vec<LapRecord>> {
        (0..self.no_drivers())
            .map(|idx| {
                let mut t_cum = 0.0;
                self.live_laps(DriverIndex(idx))
                    .iter()
                    .map(|rec| {
                        t_cum += rec.time();
                        rec.with_time(t_cum)
                    })
                    .collect()
            })
            .collect()
    }

    /// indexes_by_position returns the driver indices in running order at the end of `lap`.
    pub fn indexes_by_position(&self, lap: LapIndex) -> Vec<DriverIndex> {
        order_at(&self.cumulative_records(), lap)
    }

    /// stints splits the live laps of a driver into stints. A stint ends with an in-lap or before
    /// an out-lap.
    pub fn stints(&self, driver: DriverIndex) -> Vec<Stint> {
        let laps = self.live_laps(driver);
        let tyres = self.tyre_usage(driver);
        let mut stints: Vec<Stint> = Vec::new();
        let mut start = 0;

        for idx in 1..=laps.len() {
            let boundary = idx == laps.len()
                || laps[idx].status() == LapStatus::OutLap
                || laps[idx - 1].status() == LapStatus::InLap;

            if boundary {
                let tyre = tyres
                    .get(stints.len())
                    .or_else(|| tyres.last())
                    .cloned()
                    .unwrap_or_default();
                let lap_times = laps[start..idx].iter().map(|rec| rec.time()).collect();
                stints.push(Stint::new(tyre, LapIndex(start), lap_times));
                start = idx;
            }
        }

        stints
    }

    pub fn all_stints(&self) -> Vec<Vec<Stint>> {
        (0..self.no_drivers())
            .map(|idx| self.stints(DriverIndex(idx)))
            .collect()
    }

    /// pit_loss averages the out-lap and in-lap losses over all stints on `tyre`, falling back to
    /// all stints of the race if no stint on that tyre provides a value.
    pub fn pit_loss(&self, tyre: &TyreType) -> PitLoss {
        let mut out_same = Vec::new();
        let mut out_all = Vec::new();
        let mut in_same = Vec::new();
        let mut in_all = Vec::new();

        for stints in self.all_stints() {
            let no_stints = stints.len();

            for (i, stint) in stints.iter().enumerate() {
                let trendline = match stint.trendline() {
                    Some(trendline) => trendline,
                    None => continue,
                };
                let loss = stint.pit_loss(&trendline);

                if i > 0 {
                    out_all.push(loss.out_lap);
                    if stint.tyre == *tyre {
                        out_same.push(loss.out_lap);
                    }
                }
                if i + 1 < no_stints {
                    in_all.push(loss.in_lap);
                    if stint.tyre == *tyre {
                        in_same.push(loss.in_lap);
                    }
                }
            }
        }

        PitLoss {
            out_lap: mean_preferring(&out_same, &out_all),
            in_lap: mean_preferring(&in_same, &in_all),
        }
    }

    /// reference_trendline is the field average pace model of a tyre type.
    pub fn reference_trendline(&self, tyre: &TyreType) -> Option<Trendline> {
        let trendlines: Vec<Trendline> = self
            .all_stints()
            .iter()
            .flatten()
            .filter(|stint| stint.tyre == *tyre)
            .filter_map(|stint| stint.trendline())
            .collect();

        let gradients: Vec<f64> = trendlines.iter().map(|t| t.gradient).collect();
        let intercepts: Vec<f64> = trendlines.iter().map(|t| t.intercept).collect();

        Some(Trendline {
            gradient: mean(&gradients)?,
            intercept: mean(&intercepts)?,
        })
    }

    /// natural_lap_time predicts a lap from the pace model of the stint it belongs to.
    pub fn natural_lap_time(&self, driver: DriverIndex, lap: LapIndex) -> Option<f64> {
        self.stints(driver)
            .iter()
            .find(|stint| stint.contains(lap))
            .and_then(|stint| stint.interpolate(lap))
    }

    /// pit_stops_before returns the number of in-laps of a driver before `lap`.
    pub fn pit_stops_before(&self, driver: DriverIndex, lap: LapIndex) -> u32 {
        self.laps(driver)
            .iter()
            .take_while(|rec| rec.lap() < lap)
            .filter(|rec| rec.status() == LapStatus::InLap)
            .count() as u32
    }

    // ---------------------------------------------------------------------------------------------
    // STATE MAINTENANCE ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// normalize_tyre_usage makes the tyre list of every driver match its number of stints.
    pub(crate) fn normalize_tyre_usage(&mut self) {
        for idx in 0..self.no_drivers() {
            let no_stints = self.stints(DriverIndex(idx)).len();
            let tyres = &mut self.tyre_usage[idx];

            if tyres.len() == no_stints {
                continue;
            }

            warn!(
                "Driver {} has {} tyre entries for {} stints, adjusting",
                self.driver_names[idx],
                tyres.len(),
                no_stints
            );

            let tyre_last = tyres.last().cloned().unwrap_or_default();
            tyres.resize(no_stints, tyre_last);
        }
    }

    /// restore_lapped_laps gives every untimed lap its time from the pace model again and resets
    /// its deficit. It returns the earliest restored lap.
    pub(crate) fn restore_lapped_laps(&mut self) -> Option<LapIndex> {
        let mut first_restored: Option<LapIndex> = None;

        for idx in 0..self.no_drivers() {
            let stints = self.stints(DriverIndex(idx));

            for rec in self.laps[idx].iter_mut() {
                if rec.time() > 0.0 && rec.deficit() == 0 {
                    continue;
                }

                let t_lap = if rec.time() > 0.0 {
                    rec.time()
                } else {
                    stints
                        .iter()
                        .find(|stint| stint.contains(rec.lap()))
                        .and_then(|stint| stint.interpolate(rec.lap()))
                        .unwrap_or(0.0)
                };

                *rec = rec.with_time(t_lap).with_deficit(0);
                first_restored = Some(first_restored.map_or(rec.lap(), |lap| lap.min(rec.lap())));
            }
        }

        first_restored
    }

    /// assign_lap_deficits marks the laps a driver did not race because the leader had already
    /// finished: their time becomes zero and the deficit counts upward from one.
    pub(crate) fn assign_lap_deficits(&mut self) {
        let cum = self.cumulative_times();
        let n = self.tot_no_laps;

        let t_leader = cum
            .iter()
            .enumerate()
            .filter(|&(idx, t_cum)| {
                n > 0 && t_cum.len() == n && self.retirement_lap(DriverIndex(idx)).is_none()
            })
            .map(|(_, t_cum)| t_cum[n - 1])
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));

        let mut no_lapped = 0;

        for (idx, t_cum) in cum.iter().enumerate() {
            let laps = &mut self.laps[idx];

            for rec in laps.iter_mut() {
                *rec = rec.with_deficit(0);
            }

            let t_leader = match t_leader {
                Some(t) => t,
                None => continue,
            };

            let len = t_cum.len();
            let mut first = len;
            while first > 1 && t_cum[first - 2] > t_leader + T_EPS {
                first -= 1;
            }

            for (j, lap) in (first..len).enumerate() {
                laps[lap] = laps[lap].with_time(0.0).with_deficit(j as u32 + 1);
            }

            if first < len {
                no_lapped += 1;
            }
        }

        debug!("Lap deficits assigned, {} drivers lapped", no_lapped);
    }

    /// publish sends the current position table to an attached receiver.
    pub(crate) fn publish(&self, lap_affected: Option<LapIndex>) {
        if let Some(tx) = &self.publisher {
            let update = PositionUpdate {
                lap_affected,
                grid: self.position_grid(),
                stints: self.all_stints(),
            };

            if tx.send(update).is_err() {
                warn!("Position update receiver is disconnected, update dropped");
            }
        }
    }
}
