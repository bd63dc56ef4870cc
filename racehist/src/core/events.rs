use crate::core::lap::{DriverIndex, LapAction, LapIndex, LapRecord, LapStatus};
use crate::core::race_history::{order_at, RaceHistory, T_EPS};
use log::debug;

/// (s) Cars closer than this to the car ahead on two consecutive laps are considered stuck.
pub const STUCK_THRESHOLD: f64 = 1.0;

/// (s) Gap enforced between two cars when an overtake is forced or prevented.
pub const MIN_GAP: f64 = 0.5;

impl RaceHistory {
    /// find_events tags overtakes and traffic encounters on the freshly loaded laps. Every racing
    /// car is compared with the car directly ahead of it in the running order of the previous
    /// lap, the same pairing the sweep of `update_simulation` uses, so a freshly loaded history
    /// is left unchanged by the sweep.
    ///
    /// A driver that ends a lap ahead of that car gets `Overtake` on the lap of the pass itself,
    /// not on the lap before it, provided the passed car was on a normal racing lap. Both laps
    /// are timed, so both cars have the same lap deficit. A driver that trails that car by less
    /// than `STUCK_THRESHOLD` on two consecutive laps gets `Stuck` on both laps. Only laps
    /// without an event are tagged, so `Stuck` never replaces an `Overtake` or a `Retire`.
    pub fn find_events(&mut self) {
        let cum = self.cumulative_records();
        let mut stuck_prev: Vec<DriverIndex> = Vec::new();
        let mut no_overtakes = 0;
        let mut no_stuck = 0;

        for lap in (0..self.tot_no_laps).map(LapIndex) {
            let mut stuck = Vec::new();

            for (ahead, driver, gap) in self.encounters(&cum, lap) {
                if gap < -T_EPS {
                    let passed_on_track = self.laps[ahead.0][lap.0].status() == LapStatus::Normal;
                    if passed_on_track && self.tag(driver, lap, LapAction::Overtake) {
                        no_overtakes += 1;
                    }
                } else if gap < STUCK_THRESHOLD {
                    stuck.push(driver);
                }
            }

            for &driver in stuck.iter().filter(|d| stuck_prev.contains(*d)) {
                if let Some(lap_prev) = lap.prev() {
                    self.tag(driver, lap_prev, LapAction::Stuck);
                }
                if self.tag(driver, lap, LapAction::Stuck) {
                    no_stuck += 1;
                }
            }

            stuck_prev = stuck;
        }

        debug!(
            "Event detection tagged {} overtakes and {} stuck laps",
            no_overtakes, no_stuck
        );
    }

    /// encounters pairs every car racing on `lap` with the car directly ahead of it in the running
    /// order of the previous lap (the first lap uses its own order). It returns
    /// `(ahead, driver, gap)` with the gap (s) at the end of `lap`. Pairs with a retirement or an
    /// untimed lap are left out.
    fn encounters(
        &self,
        cum: &[Vec<LapRecord>],
        lap: LapIndex,
    ) -> Vec<(DriverIndex, DriverIndex, f64)> {
        let racing: Vec<DriverIndex> = order_at(cum, lap.prev().unwrap_or(lap))
            .into_iter()
            .filter(|d| cum[d.0].len() > lap.0)
            .collect();

        racing
            .windows(2)
            .filter_map(|pair| {
                let (ahead, driver) = (pair[0], pair[1]);
                let rec_ahead = self.laps[ahead.0].get(lap.0)?;
                let rec = self.laps[driver.0].get(lap.0)?;

                if rec.action() == LapAction::Retire
                    || rec_ahead.action() == LapAction::Retire
                    || rec.time() <= 0.0
                    || rec_ahead.time() <= 0.0
                {
                    return None;
                }

                let gap = cum[driver.0][lap.0].time() - cum[ahead.0][lap.0].time();
                Some((ahead, driver, gap))
            })
            .collect()
    }

    /// tag sets the action of a lap that carries no event yet. Returns true if the action
    /// changed.
    fn tag(&mut self, driver: DriverIndex, lap: LapIndex, action: LapAction) -> bool {
        match self.laps.get_mut(driver.0).and_then(|laps| laps.get_mut(lap.0)) {
            Some(rec) if rec.action() == LapAction::Clear && action != LapAction::Clear => {
                *rec = rec.with_action(action);
                true
            }
            _ => false,
        }
    }

    /// update_simulation re-derives every lap from `lap_affected` on. Laps untimed because of a
    /// lap deficit are restored first, the actions of every following lap are re-evaluated in
    /// ascending order, the lap deficits are recomputed and the new position table is published.
    pub fn update_simulation(&mut self, lap_affected: LapIndex) {
        let lap_start = match self.restore_lapped_laps() {
            Some(lap_restored) => lap_restored.min(lap_affected),
            None => lap_affected,
        };

        for lap in lap_start.0.max(1)..self.tot_no_laps {
            self.reevaluate_lap(LapIndex(lap));
        }

        self.assign_lap_deficits();
        debug!("Race history updated from lap {}", lap_start);
        self.publish(Some(lap_affected));
    }

    /// reevaluate_lap compares every racing car with the car directly ahead of it in the running
    /// order of the previous lap.
    fn reevaluate_lap(&mut self, lap: LapIndex) {
        let lap_prev = match lap.prev() {
            Some(lap_prev) => lap_prev,
            None => return,
        };

        let cum = self.cumulative_records();
        let racing: Vec<DriverIndex> = order_at(&cum, lap_prev)
            .into_iter()
            .filter(|d| cum[d.0].len() > lap.0)
            .collect();

        for pair in racing.windows(2) {
            // earlier pairs may have changed lap times on this lap
            let cum_prev_ahead = cum[pair[0].0][lap_prev.0].time();
            let cum_prev = cum[pair[1].0][lap_prev.0].time();
            self.reevaluate_pair(pair[0], cum_prev_ahead, pair[1], cum_prev, lap);
        }
    }

    fn reevaluate_pair(
        &mut self,
        ahead: DriverIndex,
        cum_prev_ahead: f64,
        driver: DriverIndex,
        cum_prev: f64,
        lap: LapIndex,
    ) {
        let rec_ahead = self.laps[ahead.0][lap.0];
        let rec = self.laps[driver.0][lap.0];

        if rec.action() == LapAction::Retire
            || rec_ahead.action() == LapAction::Retire
            || rec.time() <= 0.0
            || rec_ahead.time() <= 0.0
        {
            return;
        }

        let t_cum_ahead = cum_prev_ahead + rec_ahead.time();
        let mut t_lap = rec.time();
        let mut action = rec.action();

        match action {
            LapAction::Overtake => {
                let gap = cum_prev + t_lap - t_cum_ahead;
                if gap > -T_EPS {
                    self.laps[ahead.0][lap.0] = rec_ahead.with_time(rec_ahead.time() + gap + MIN_GAP);
                }
                return;
            }
            LapAction::Stuck => {
                if cum_prev + t_lap - t_cum_ahead >= STUCK_THRESHOLD {
                    if let Some(t_natural) = self.natural_lap_time(driver, lap) {
                        t_lap = t_lap.min(t_natural);
                    }
                    action = LapAction::Clear;
                }
            }
            _ => {}
        }

        let gap = cum_prev + t_lap - t_cum_ahead;
        if gap < -T_EPS && rec_ahead.status() == LapStatus::Normal {
            t_lap += MIN_GAP - gap;
            action = LapAction::Stuck;
        }

        self.laps[driver.0][lap.0] = rec.with_time(t_lap).with_action(action);
    }
}
