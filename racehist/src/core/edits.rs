use crate::core::events::MIN_GAP;
use crate::core::lap::{DriverIndex, LapAction, LapIndex, LapRecord, LapStatus};
use crate::core::race_history::{car_ahead, RaceHistory, T_EPS};
use crate::core::stint::{Stint, Trendline, TyreType};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StintOrderChange {
    SwapWithPrevious,
    SwapWithNext,
    InsertBefore,
    Remove,
}

/// Edit is a single analyst command on the race history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    ChangeAction {
        driver: DriverIndex,
        lap: LapIndex,
        action: LapAction,
    },
    #[serde(rename = "stint_length")]
    StintLengthChanged {
        driver: DriverIndex,
        stint: usize,
        new_length: usize,
    },
    #[serde(rename = "tyre_type")]
    TyreTypeChanged {
        driver: DriverIndex,
        stint: usize,
        tyre: TyreType,
    },
    #[serde(rename = "stint_order")]
    StintOrderChanged {
        driver: DriverIndex,
        stint: usize,
        change: StintOrderChange,
    },
}

/// EditOutcome is the result of applying an edit. `lap_affected` is the earliest lap the edit
/// touched, None if the edit did not change anything.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub history: RaceHistory,
    pub lap_affected: Option<LapIndex>,
}

/// relabel_stint moves a stint to another tyre and shifts its timed laps by the difference
/// between the reference pace of the new and the old tyre.
fn relabel_stint(
    stint: &mut Stint,
    tyre: &TyreType,
    reference_old: Option<Trendline>,
    reference_new: Option<Trendline>,
) {
    if let (Some(old), Some(new)) = (reference_old, reference_new) {
        for (idx, t) in stint.lap_times.iter_mut().enumerate() {
            if *t > 0.0 {
                *t += new.predict(idx) - old.predict(idx);
            }
        }
    }
    stint.tyre = tyre.clone();
}

impl RaceHistory {
    /// apply returns the race history that results from `edit` without touching `self`. The
    /// returned history has been updated from the affected lap on and has no publisher attached.
    pub fn apply(&self, edit: &Edit) -> EditOutcome {
        let mut history = self.detached();
        let first_restored = history.restore_lapped_laps();

        match history.apply_in_place(edit) {
            Some(lap_affected) => {
                let lap_start = first_restored.map_or(lap_affected, |lap| lap.min(lap_affected));
                history.update_simulation(lap_start);
                EditOutcome {
                    history,
                    lap_affected: Some(lap_affected),
                }
            }
            None => {
                debug!("Edit {:?} has no effect", edit);
                EditOutcome {
                    history: self.detached(),
                    lap_affected: None,
                }
            }
        }
    }

    /// edit applies `edit` in place and publishes the new position table if a publisher is
    /// attached.
    pub fn edit(&mut self, edit: &Edit) -> Option<LapIndex> {
        let outcome = self.apply(edit);
        let lap_affected = outcome.lap_affected?;

        let publisher = self.publisher.take();
        *self = outcome.history;
        self.publisher = publisher;

        info!("Applied {:?}, first affected lap {}", edit, lap_affected);
        self.publish(Some(lap_affected));
        Some(lap_affected)
    }

    pub fn change_action(
        &mut self,
        driver: DriverIndex,
        lap: LapIndex,
        action: LapAction,
    ) -> Option<LapIndex> {
        self.edit(&Edit::ChangeAction {
            driver,
            lap,
            action,
        })
    }

    pub fn stint_length_changed(
        &mut self,
        driver: DriverIndex,
        stint: usize,
        new_length: usize,
    ) -> Option<LapIndex> {
        self.edit(&Edit::StintLengthChanged {
            driver,
            stint,
            new_length,
        })
    }

    pub fn tyre_type_changed(
        &mut self,
        driver: DriverIndex,
        stint: usize,
        tyre: TyreType,
    ) -> Option<LapIndex> {
        self.edit(&Edit::TyreTypeChanged {
            driver,
            stint,
            tyre,
        })
    }

    pub fn stint_order_changed(
        &mut self,
        driver: DriverIndex,
        stint: usize,
        change: StintOrderChange,
    ) -> Option<LapIndex> {
        self.edit(&Edit::StintOrderChanged {
            driver,
            stint,
            change,
        })
    }

    fn apply_in_place(&mut self, edit: &Edit) -> Option<LapIndex> {
        match edit {
            Edit::ChangeAction {
                driver,
                lap,
                action,
            } => self.set_action(*driver, *lap, *action),
            Edit::StintLengthChanged {
                driver,
                stint,
                new_length,
            } => self.set_stint_length(*driver, *stint, *new_length),
            Edit::TyreTypeChanged {
                driver,
                stint,
                tyre,
            } => self.set_tyre_type(*driver, *stint, tyre),
            Edit::StintOrderChanged {
                driver,
                stint,
                change,
            } => match change {
                StintOrderChange::SwapWithPrevious => {
                    let prev = stint.checked_sub(1)?;
                    self.swap_with_next(*driver, prev)
                }
                StintOrderChange::SwapWithNext => self.swap_with_next(*driver, *stint),
                StintOrderChange::InsertBefore => self.insert_before(*driver, *stint),
                StintOrderChange::Remove => self.set_stint_length(*driver, *stint, 0),
            },
        }
    }

    // ---------------------------------------------------------------------------------------------
    // ACTIONS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn set_action(
        &mut self,
        driver: DriverIndex,
        lap: LapIndex,
        action: LapAction,
    ) -> Option<LapIndex> {
        if lap.0 >= self.live_laps(driver).len() {
            return None;
        }
        let rec = self.laps[driver.0][lap.0];

        match action {
            LapAction::Retire => {
                self.laps[driver.0].truncate(lap.0 + 1);
                self.laps[driver.0][lap.0] = rec.with_action(LapAction::Retire);
                return Some(lap);
            }
            _ if rec.action() == LapAction::Retire => self.extend_after_retirement(driver, lap),
            _ => {}
        }

        match action {
            LapAction::Stuck => self.hold_behind(driver, lap),
            LapAction::Overtake => self.push_ahead(driver, lap),
            LapAction::Clear => self.release(driver, lap, rec.action()),
            LapAction::Retire => {}
        }

        Some(lap)
    }

    /// extend_after_retirement gives a retired driver laps up to the race distance again. A
    /// retirement in the pits continues with a fresh stint on the same tyre.
    fn extend_after_retirement(&mut self, driver: DriverIndex, lap: LapIndex) {
        let no_laps = self.tot_no_laps.saturating_sub(lap.0 + 1);
        let mut stints = self.stints(driver);

        let last = match stints.pop() {
            Some(last) => last,
            None => return,
        };
        let pit_loss = self.pit_loss(&last.tyre);

        if self.laps[driver.0][lap.0].status() == LapStatus::InLap {
            let fresh = Stint::new(last.tyre.clone(), lap.next(), Vec::new()).extrapolate(
                no_laps,
                0.0,
                &pit_loss,
                true,
                true,
                Some(&last),
            );
            stints.push(last);
            if fresh.length() > 0 {
                stints.push(fresh);
            }
        } else {
            stints.push(last.extrapolate(no_laps, 0.0, &pit_loss, true, true, None));
        }

        self.replace_stints(driver, stints, false);
    }

    /// hold_behind pads the lap of a car that is faster than the car ahead so that it trails by
    /// `MIN_GAP`.
    fn hold_behind(&mut self, driver: DriverIndex, lap: LapIndex) {
        let cum = self.cumulative_records();
        let rec = self.laps[driver.0][lap.0];
        let mut t_lap = rec.time();

        if let Some(ahead) = car_ahead(&cum, driver, lap) {
            let t_lap_ahead = self.laps[ahead.0][lap.0].time();
            let gap = cum[driver.0][lap.0].time() - cum[ahead.0][lap.0].time();

            if t_lap < t_lap_ahead && gap < MIN_GAP - T_EPS {
                t_lap += MIN_GAP - gap;
            }
        }

        self.laps[driver.0][lap.0] = rec.with_time(t_lap).with_action(LapAction::Stuck);
    }

    /// push_ahead pads the lap of the car ahead so that the edited car leads by `MIN_GAP`.
    fn push_ahead(&mut self, driver: DriverIndex, lap: LapIndex) {
        let cum = self.cumulative_records();

        if let Some(ahead) = car_ahead(&cum, driver, lap) {
            let gap = cum[driver.0][lap.0].time() - cum[ahead.0][lap.0].time();

            if gap > -MIN_GAP + T_EPS {
                let rec_ahead = self.laps[ahead.0][lap.0];
                self.laps[ahead.0][lap.0] = rec_ahead.with_time(rec_ahead.time() + gap + MIN_GAP);
            }
        }

        let rec = self.laps[driver.0][lap.0];
        self.laps[driver.0][lap.0] = rec.with_action(LapAction::Overtake);
    }

    /// release lets a formerly stuck car regain its natural pace.
    fn release(&mut self, driver: DriverIndex, lap: LapIndex, action_prev: LapAction) {
        let rec = self.laps[driver.0][lap.0];
        let mut t_lap = rec.time();

        if action_prev == LapAction::Stuck {
            if let Some(t_natural) = self.natural_lap_time(driver, lap) {
                t_lap = t_lap.min(t_natural);
            }
        }

        self.laps[driver.0][lap.0] = rec.with_time(t_lap).with_action(LapAction::Clear);
    }

    // ---------------------------------------------------------------------------------------------
    // STINTS --------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// set_stint_length changes the length of a stint and applies the inverse change to the
    /// following stint (to the previous one for the last stint). A stint whose start lap moves
    /// gets a fuel correction.
    fn set_stint_length(
        &mut self,
        driver: DriverIndex,
        stint_idx: usize,
        new_length: usize,
    ) -> Option<LapIndex> {
        self.laps.get(driver.0)?;
        let mut stints = self.stints(driver);
        let no_stints = stints.len();

        if no_stints < 2 || stint_idx >= no_stints {
            return None;
        }

        let neighbour = if stint_idx + 1 < no_stints {
            stint_idx + 1
        } else {
            stint_idx - 1
        };

        let len_old = stints[stint_idx].length();
        let len_neighbour_old = stints[neighbour].length();
        let len_new = new_length.min(len_old + len_neighbour_old);
        let delta = len_new as i64 - len_old as i64;

        if delta == 0 {
            return None;
        }

        let len_neighbour_new = (len_neighbour_old as i64 - delta) as usize;
        let t_fuel_per_lap = self.fuel_per_lap * self.fuel_time_effect;

        // a stint starting k laps later runs k laps lighter
        let (t_offset, t_offset_neighbour) = if neighbour > stint_idx {
            (0.0, -(delta as f64) * t_fuel_per_lap)
        } else {
            (delta as f64 * t_fuel_per_lap, 0.0)
        };

        let first = stint_idx.min(neighbour);
        let len_first_min = if first == stint_idx {
            len_old.min(len_new)
        } else {
            len_neighbour_old.min(len_neighbour_new)
        };
        let lap_affected = LapIndex((stints[first].start_lap.0 + len_first_min).saturating_sub(1));

        let is_last = |idx: usize| idx + 1 == no_stints;
        let is_last_stint = is_last(stint_idx) || (len_neighbour_new == 0 && is_last(neighbour));
        let is_last_neighbour = is_last(neighbour) || (len_new == 0 && is_last(stint_idx));

        let pit_loss = self.pit_loss(&stints[stint_idx].tyre);
        let pit_loss_neighbour = self.pit_loss(&stints[neighbour].tyre);

        stints[stint_idx] = stints[stint_idx].resize(
            delta,
            t_offset,
            &pit_loss,
            is_last(stint_idx),
            is_last_stint,
        );
        stints[neighbour] = stints[neighbour].resize(
            -delta,
            t_offset_neighbour,
            &pit_loss_neighbour,
            is_last(neighbour),
            is_last_neighbour,
        );

        // the neighbour now starts the race from the grid
        if stint_idx == 0 && len_new == 0 {
            stints[neighbour] = stints[neighbour].without_out_lap(&pit_loss_neighbour);
        }

        let retired = self.retirement_lap(driver).is_some();
        self.replace_stints(driver, stints, retired);
        Some(lap_affected)
    }

    /// set_tyre_type relabels a stint and shifts its lap times by the difference between the
    /// field reference pace of the new and the old tyre.
    fn set_tyre_type(
        &mut self,
        driver: DriverIndex,
        stint_idx: usize,
        tyre: &TyreType,
    ) -> Option<LapIndex> {
        self.laps.get(driver.0)?;
        let mut stints = self.stints(driver);
        let stint = stints.get(stint_idx)?;

        if stint.tyre == *tyre {
            return None;
        }

        let lap_affected = stint.start_lap;
        let reference_old = self.reference_trendline(&stint.tyre);
        let reference_new = self.reference_trendline(tyre);
        relabel_stint(&mut stints[stint_idx], tyre, reference_old, reference_new);

        let retired = self.retirement_lap(driver).is_some();
        self.replace_stints(driver, stints, retired);
        Some(lap_affected)
    }

    /// swap_with_next exchanges the tyres of two consecutive stints and then their lengths. Both
    /// stints are shifted against the field reference pace as it was before the swap.
    fn swap_with_next(&mut self, driver: DriverIndex, stint_idx: usize) -> Option<LapIndex> {
        self.laps.get(driver.0)?;
        let mut stints = self.stints(driver);

        if stint_idx + 1 >= stints.len() {
            return None;
        }

        let tyre = stints[stint_idx].tyre.clone();
        let tyre_next = stints[stint_idx + 1].tyre.clone();
        let len_next = stints[stint_idx + 1].length();

        let lap_relabelled = if tyre != tyre_next {
            let reference = self.reference_trendline(&tyre);
            let reference_next = self.reference_trendline(&tyre_next);
            let lap = stints[stint_idx].start_lap;

            relabel_stint(&mut stints[stint_idx], &tyre_next, reference, reference_next);
            relabel_stint(&mut stints[stint_idx + 1], &tyre, reference_next, reference);

            let retired = self.retirement_lap(driver).is_some();
            self.replace_stints(driver, stints, retired);
            Some(lap)
        } else {
            None
        };

        let laps_affected = [
            lap_relabelled,
            self.set_stint_length(driver, stint_idx, len_next),
        ];

        laps_affected.iter().flatten().min().copied()
    }

    /// insert_before splits a stint into two halves on the same tyre with a pit stop in between.
    fn insert_before(&mut self, driver: DriverIndex, stint_idx: usize) -> Option<LapIndex> {
        self.laps.get(driver.0)?;
        let mut stints = self.stints(driver);
        let no_stints = stints.len();
        let stint = stints.get(stint_idx)?.clone();
        let len = stint.length();

        if len < 2 {
            return None;
        }

        let len_first = len / 2;
        let pit_loss = self.pit_loss(&stint.tyre);
        let t_fuel = -(len_first as f64) * self.fuel_per_lap * self.fuel_time_effect;

        let first = stint.truncate(len - len_first, 0.0, &pit_loss, false);
        let mut second = stint.truncate(len_first, t_fuel, &pit_loss, stint_idx + 1 == no_stints);
        second.start_lap = LapIndex(stint.start_lap.0 + len_first);

        // the first stint of the race starts from the grid, not from the pits
        if stint_idx == 0 {
            if let Some(t_first) = second.lap_times.first_mut() {
                *t_first += pit_loss.out_lap;
            }
        }

        stints[stint_idx] = second;
        stints.insert(stint_idx, first);

        let retired = self.retirement_lap(driver).is_some();
        self.replace_stints(driver, stints, retired);
        Some(LapIndex(stint.start_lap.0 + len_first - 1))
    }

    /// replace_stints drops empty stints, lays the remaining ones out back to back and rebuilds
    /// the laps and the tyre usage of the driver from them.
    fn replace_stints(&mut self, driver: DriverIndex, stints: Vec<Stint>, retired: bool) {
        let mut start = 0;
        let mut kept = Vec::with_capacity(stints.len());

        for mut stint in stints.into_iter().filter(|s| s.length() > 0) {
            stint.start_lap = LapIndex(start);
            start += stint.length();
            kept.push(stint);
        }

        self.tyre_usage[driver.0] = kept.iter().map(|s| s.tyre.clone()).collect();
        self.rebuild_from_stints(driver, &kept, retired);
    }

    /// rebuild_from_stints replaces the laps of a driver. The first lap of every stint but the
    /// first is an out-lap, the last lap of every stint but the last is an in-lap.
    fn rebuild_from_stints(&mut self, driver: DriverIndex, stints: &[Stint], retired: bool) {
        let laps_old = std::mem::take(&mut self.laps[driver.0]);
        let no_stints = stints.len();
        let mut laps = Vec::with_capacity(laps_old.len());

        for (idx_stint, stint) in stints.iter().enumerate() {
            let len = stint.length();

            for (idx, &t) in stint.lap_times.iter().enumerate() {
                let lap = LapIndex(laps.len());
                let status = if idx + 1 == len && idx_stint + 1 < no_stints {
                    LapStatus::InLap
                } else if idx == 0 && idx_stint > 0 {
                    LapStatus::OutLap
                } else {
                    LapStatus::Normal
                };
                let action = laps_old
                    .get(lap.0)
                    .map(|rec| rec.action())
                    .filter(|&action| action != LapAction::Retire)
                    .unwrap_or(LapAction::Clear);

                laps.push(LapRecord::new(driver, lap, t, status, action, 0));
            }
        }

        if retired {
            if let Some(rec) = laps.last_mut() {
                *rec = rec.with_action(LapAction::Retire);
            }
        }

        self.laps[driver.0] = laps;
    }
}
