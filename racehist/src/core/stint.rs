use crate::core::lap::LapIndex;
use helpers::general::{linear_regression, mean};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Laps slower than this factor times the stint reference average are not used for the
/// trendline fit.
pub const CLEAN_LAP_FACTOR: f64 = 1.035;

/// TyreType is the compound label used by the timing data, e.g. Option or Prime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TyreType(pub String);

impl fmt::Display for TyreType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TyreType {
    fn from(s: &str) -> Self {
        TyreType(s.to_owned())
    }
}

/// Trendline is the linear pace model of a stint: t(i) = intercept + gradient * i with i being
/// the lap index within the stint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trendline {
    pub gradient: f64,
    pub intercept: f64,
}

impl Trendline {
    pub fn predict(&self, idx_in_stint: usize) -> f64 {
        self.intercept + self.gradient * idx_in_stint as f64
    }
}

/// PitLoss contains the time lost on the out-lap and on the in-lap compared to the pace model.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PitLoss {
    pub out_lap: f64,
    pub in_lap: f64,
}

/// Pace is the source used to synthesize lap times.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pace {
    Trend(Trendline),
    Constant(f64),
}

impl Pace {
    fn predict(&self, idx_in_stint: usize) -> f64 {
        match self {
            Pace::Trend(trendline) => trendline.predict(idx_in_stint),
            Pace::Constant(t) => *t,
        }
    }
}

/// Stint is a derived view on a contiguous run of laps on one tyre. `lap_times` are the
/// individual lap times of the stint (not cumulative), the first entry belongs to `start_lap`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stint {
    pub tyre: TyreType,
    pub start_lap: LapIndex,
    pub lap_times: Vec<f64>,
}

impl Stint {
    pub fn new(tyre: TyreType, start_lap: LapIndex, lap_times: Vec<f64>) -> Stint {
        Stint {
            tyre,
            start_lap,
            lap_times,
        }
    }

    pub fn length(&self) -> usize {
        self.lap_times.len()
    }

    /// end_lap returns the first lap index after the stint.
    pub fn end_lap(&self) -> LapIndex {
        LapIndex(self.start_lap.0 + self.length())
    }

    pub fn contains(&self, lap: LapIndex) -> bool {
        self.start_lap <= lap && lap < self.end_lap()
    }

    /// reference_average returns the average lap time without the first and the last lap of the
    /// stint (usually out- and in-lap). Laps without a time are ignored.
    fn reference_average(&self) -> Option<f64> {
        let inner: Vec<f64> = if self.length() > 2 {
            self.lap_times[1..self.length() - 1]
                .iter()
                .copied()
                .filter(|&t| t > 0.0)
                .collect()
        } else {
            Vec::new()
        };

        if !inner.is_empty() {
            return mean(&inner);
        }

        let timed: Vec<f64> = self.lap_times.iter().copied().filter(|&t| t > 0.0).collect();
        mean(&timed)
    }

    /// trendline fits the pace model over the clean laps of the stint. None is returned if less
    /// than two clean laps are available.
    pub fn trendline(&self) -> Option<Trendline> {
        let t_ref = self.reference_average()?;

        let (xs, ys): (Vec<f64>, Vec<f64>) = self
            .lap_times
            .iter()
            .enumerate()
            .filter(|&(_, &t)| t > 0.0 && t < CLEAN_LAP_FACTOR * t_ref)
            .map(|(i, &t)| (i as f64, t))
            .unzip();

        linear_regression(&xs, &ys).map(|(gradient, intercept)| Trendline {
            gradient,
            intercept,
        })
    }

    /// fallback_lap_time returns the nearest sub-average lap time, i.e. the last lap of the
    /// stint that is not slower than the stint average.
    pub fn fallback_lap_time(&self) -> Option<f64> {
        let timed: Vec<f64> = self.lap_times.iter().copied().filter(|&t| t > 0.0).collect();
        let t_avg = mean(&timed)?;
        timed.iter().rev().copied().find(|&t| t <= t_avg)
    }

    /// pit_loss extracts the out-lap and in-lap time loss relative to the given trendline.
    pub fn pit_loss(&self, trendline: &Trendline) -> PitLoss {
        match (self.lap_times.first(), self.lap_times.last()) {
            (Some(&t_first), Some(&t_last)) => PitLoss {
                out_lap: t_first - trendline.intercept,
                in_lap: t_last - trendline.predict(self.length() - 1),
            },
            _ => PitLoss::default(),
        }
    }

    fn pace(&self, donor: Option<&Stint>) -> Option<Pace> {
        self.trendline()
            .or_else(|| donor.and_then(|d| d.trendline()))
            .map(Pace::Trend)
            .or_else(|| {
                self.fallback_lap_time()
                    .or_else(|| donor.and_then(|d| d.fallback_lap_time()))
                    .map(Pace::Constant)
            })
    }

    /// shifted returns the first `no_laps` lap times shifted by `t_offset`. Laps without a time
    /// stay without a time.
    fn shifted(&self, no_laps: usize, t_offset: f64) -> Vec<f64> {
        self.lap_times[..no_laps]
            .iter()
            .map(|&t| if t > 0.0 { t + t_offset } else { t })
            .collect()
    }

    /// interpolate predicts the lap time of a lap of this stint from the pace model. It is used
    /// when a car that was held up regains its natural pace.
    pub fn interpolate(&self, lap: LapIndex) -> Option<f64> {
        let idx = lap.0.checked_sub(self.start_lap.0)?;
        self.pace(None).map(|pace| pace.predict(idx))
    }

    /// extrapolate returns the stint lengthened by `no_laps` laps. Existing laps are shifted by
    /// `t_offset` (e.g. a fuel correction), new laps follow the pace model. If the stint was not
    /// the last one of the race, its former in-lap becomes a racing lap; a single-lap stint has
    /// no pace model for that, so its in-lap loss is taken off instead. If it is not the last one
    /// afterwards, the in-lap loss is added to the new final lap. An empty stint takes its pace
    /// from `donor` and gets the out-lap loss on its first lap.
    pub fn extrapolate(
        &self,
        no_laps: usize,
        t_offset: f64,
        pit_loss: &PitLoss,
        was_last: bool,
        is_last: bool,
        donor: Option<&Stint>,
    ) -> Stint {
        let len_old = self.length();
        let mut base = self.clone();

        if !was_last && len_old == 1 && base.lap_times[0] > pit_loss.in_lap {
            base.lap_times[0] -= pit_loss.in_lap;
        }

        let pace = base.pace(donor);
        let predict = |idx: usize| pace.map_or(0.0, |p| p.predict(idx));

        let mut lap_times = base.shifted(len_old, t_offset);

        if !was_last && len_old > 1 {
            lap_times[len_old - 1] = predict(len_old - 1) + t_offset;
        }

        for idx in len_old..len_old + no_laps {
            lap_times.push(predict(idx) + t_offset);
        }

        if len_old == 0 && !lap_times.is_empty() {
            lap_times[0] += pit_loss.out_lap;
        }

        if !is_last && no_laps > 0 {
            if let Some(t_last) = lap_times.last_mut() {
                *t_last += pit_loss.in_lap;
            }
        }

        Stint::new(self.tyre.clone(), self.start_lap, lap_times)
    }

    /// truncate returns the first (length - `no_laps`) laps of the stint shifted by `t_offset`.
    /// If the stint is not the last one of the race, the new final lap is rebuilt as an in-lap.
    pub fn truncate(
        &self,
        no_laps: usize,
        t_offset: f64,
        pit_loss: &PitLoss,
        is_last: bool,
    ) -> Stint {
        let keep = self.length().saturating_sub(no_laps);
        let mut lap_times = self.shifted(keep, t_offset);

        if !is_last && keep > 0 {
            let t_base = if keep == 1 {
                lap_times[0]
            } else {
                self.pace(None)
                    .map_or(lap_times[keep - 1], |p| p.predict(keep - 1) + t_offset)
            };
            lap_times[keep - 1] = t_base + pit_loss.in_lap;
        }

        Stint::new(self.tyre.clone(), self.start_lap, lap_times)
    }

    /// without_out_lap returns the stint with its first lap rebuilt as a racing lap, for a stint
    /// that now starts the race from the grid.
    pub fn without_out_lap(&self, pit_loss: &PitLoss) -> Stint {
        let mut lap_times = self.lap_times.clone();

        if let Some(t_first) = lap_times.first_mut().filter(|t| **t > 0.0) {
            match self.trendline() {
                Some(trendline) => *t_first = trendline.predict(0),
                None if *t_first > pit_loss.out_lap => *t_first -= pit_loss.out_lap,
                None => {}
            }
        }

        Stint::new(self.tyre.clone(), self.start_lap, lap_times)
    }

    /// resize dispatches to extrapolate (positive delta) or truncate (negative delta).
    pub fn resize(
        &self,
        delta: i64,
        t_offset: f64,
        pit_loss: &PitLoss,
        was_last: bool,
        is_last: bool,
    ) -> Stint {
        if delta > 0 {
            self.extrapolate(delta as usize, t_offset, pit_loss, was_last, is_last, None)
        } else if delta < 0 {
            self.truncate(delta.unsigned_abs() as usize, t_offset, pit_loss, is_last)
        } else {
            Stint::new(
                self.tyre.clone(),
                self.start_lap,
                self.shifted(self.length(), t_offset),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn linear_stint(no_laps: usize, t_out: Option<f64>, t_in: Option<f64>) -> Stint {
        let mut lap_times: Vec<f64> = (0..no_laps).map(|i| 80.0 + 0.05 * i as f64).collect();
        if let Some(t) = t_out {
            lap_times[0] = t;
        }
        if let Some(t) = t_in {
            lap_times[no_laps - 1] = t;
        }
        Stint::new(TyreType::from("Option"), LapIndex(10), lap_times)
    }

    #[test]
    fn trendline_ignores_pit_laps() {
        let stint = linear_stint(12, Some(101.0), Some(99.0));
        let trendline = stint.trendline().unwrap();
        assert_abs_diff_eq!(trendline.gradient, 0.05, epsilon = 1e-9);
        assert_abs_diff_eq!(trendline.intercept, 80.0, epsilon = 1e-9);
    }

    #[test]
    fn trendline_needs_two_clean_laps() {
        let stint = Stint::new(TyreType::from("Prime"), LapIndex(0), vec![95.0]);
        assert!(stint.trendline().is_none());

        let stint = Stint::new(TyreType::from("Prime"), LapIndex(0), vec![95.0, 0.0, 0.0]);
        assert!(stint.trendline().is_none());
    }

    #[test]
    fn pit_loss_is_measured_against_trendline() {
        let stint = linear_stint(12, Some(101.0), Some(99.0));
        let loss = stint.pit_loss(&stint.trendline().unwrap());
        assert_abs_diff_eq!(loss.out_lap, 21.0, epsilon = 1e-9);
        assert_abs_diff_eq!(loss.in_lap, 99.0 - 80.55, epsilon = 1e-9);
    }

    #[test]
    fn fallback_lap_time_is_last_sub_average_lap() {
        let stint = Stint::new(TyreType::from("Prime"), LapIndex(0), vec![90.0, 96.0, 91.0, 97.0]);
        assert_abs_diff_eq!(stint.fallback_lap_time().unwrap(), 91.0);
    }

    #[test]
    fn single_lap_stint_extrapolates_by_copying() {
        let stint = Stint::new(TyreType::from("Prime"), LapIndex(30), vec![95.0]);
        let extended = stint.extrapolate(3, 0.0, &PitLoss::default(), true, true, None);
        assert_eq!(extended.lap_times, vec![95.0; 4]);
        assert_eq!(extended.start_lap, LapIndex(30));
    }

    #[test]
    fn extrapolate_follows_trendline_and_moves_in_lap() {
        let stint = linear_stint(10, Some(101.0), Some(99.0));
        let pit_loss = PitLoss {
            out_lap: 20.0,
            in_lap: 18.0,
        };
        let extended = stint.extrapolate(2, 0.5, &pit_loss, false, false, None);

        assert_eq!(extended.length(), 12);
        assert_abs_diff_eq!(extended.lap_times[0], 101.5, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[9], 80.45 + 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[10], 80.5 + 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[11], 80.55 + 0.5 + 18.0, epsilon = 1e-9);
    }

    #[test]
    fn extrapolate_empty_stint_uses_donor_pace() {
        let donor = linear_stint(10, Some(101.0), None);
        let empty = Stint::new(TyreType::from("Option"), LapIndex(20), Vec::new());
        let pit_loss = PitLoss {
            out_lap: 20.0,
            in_lap: 18.0,
        };
        let extended = empty.extrapolate(3, 0.0, &pit_loss, true, true, Some(&donor));

        assert_eq!(extended.length(), 3);
        assert_abs_diff_eq!(extended.lap_times[0], 100.0, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[2], 80.1, epsilon = 1e-9);
    }

    #[test]
    fn truncate_rebuilds_in_lap() {
        let stint = linear_stint(10, Some(101.0), Some(99.0));
        let pit_loss = PitLoss {
            out_lap: 20.0,
            in_lap: 18.0,
        };
        let shortened = stint.truncate(4, -0.2, &pit_loss, false);

        assert_eq!(shortened.length(), 6);
        assert_abs_diff_eq!(shortened.lap_times[0], 100.8, epsilon = 1e-9);
        assert_abs_diff_eq!(shortened.lap_times[5], 80.25 - 0.2 + 18.0, epsilon = 1e-9);
    }

    #[test]
    fn truncate_last_stint_keeps_plain_laps() {
        let stint = linear_stint(10, Some(101.0), None);
        let shortened = stint.truncate(3, 0.0, &PitLoss::default(), true);
        assert_eq!(shortened.lap_times, stint.lap_times[..7].to_vec());
    }

    #[test]
    fn interpolate_uses_race_lap_index() {
        let stint = linear_stint(10, Some(101.0), Some(99.0));
        assert_abs_diff_eq!(stint.interpolate(LapIndex(14)).unwrap(), 80.2, epsilon = 1e-9);
        assert!(stint.interpolate(LapIndex(9)).is_none());
    }

    #[test]
    fn single_lap_stint_sheds_its_in_lap_when_extended() {
        let stint = Stint::new(TyreType::from("Prime"), LapIndex(30), vec![110.0]);
        let pit_loss = PitLoss {
            out_lap: 20.0,
            in_lap: 18.0,
        };
        let extended = stint.extrapolate(2, 0.0, &pit_loss, false, false, None);

        assert_eq!(extended.length(), 3);
        assert_abs_diff_eq!(extended.lap_times[0], 92.0, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[1], 92.0, epsilon = 1e-9);
        assert_abs_diff_eq!(extended.lap_times[2], 110.0, epsilon = 1e-9);
        assert_eq!(extended.lap_times.iter().filter(|&&t| t > 100.0).count(), 1);
    }

    #[test]
    fn out_lap_is_replaced_by_pace_model() {
        let stint = linear_stint(10, Some(101.0), None);
        let pit_loss = PitLoss {
            out_lap: 20.0,
            in_lap: 18.0,
        };
        let from_grid = stint.without_out_lap(&pit_loss);
        assert_abs_diff_eq!(from_grid.lap_times[0], 80.0, epsilon = 1e-9);
        assert_eq!(from_grid.lap_times[1..], stint.lap_times[1..]);

        let single = Stint::new(TyreType::from("Prime"), LapIndex(0), vec![115.0]);
        assert_eq!(single.without_out_lap(&pit_loss).lap_times, vec![95.0]);
    }
}
