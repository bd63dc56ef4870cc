use crate::core::lap::{DriverIndex, LapIndex, LapRecord, Position};
use crate::core::race_history::{order_at, RaceHistory, T_EPS};
use serde::Serialize;

/// Sentinel stored as gap or interval when one of the two cars has no record on the lap.
pub const RETIRED_GAP: f64 = -0.5;

/// PositionEntry is one row of the position table.
/// * `gap` - (s) Gap to the leader. Negative whole numbers are lap deficits relative to the
///   leader, `RETIRED_GAP` marks a missing record
/// * `interval` - (s) Gap to the car directly ahead, encoded like `gap`. The leader carries the
///   1-based lap number instead
/// * `pit_stops_before_lap` - Number of in-laps before this lap
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionEntry {
    pub lap: LapIndex,
    pub position: Position,
    pub driver: DriverIndex,
    pub cumulative_time: f64,
    pub gap: f64,
    pub interval: f64,
    pub pit_stops_before_lap: u32,
}

/// Gap is the decoded form of a gap or interval value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gap {
    Time(f64),
    Laps(u32),
    Unavailable,
}

impl Gap {
    pub fn decode(value: f64) -> Gap {
        if (value - RETIRED_GAP).abs() < T_EPS {
            Gap::Unavailable
        } else if value < 0.0 {
            Gap::Laps((-value).round() as u32)
        } else {
            Gap::Time(value)
        }
    }
}

/// encode_gap returns the time difference of two cumulative records on equal deficit, the
/// negated deficit difference otherwise, and `RETIRED_GAP` if a record is missing.
fn encode_gap(ahead: Option<&LapRecord>, behind: Option<&LapRecord>) -> f64 {
    match (ahead, behind) {
        (Some(a), Some(b)) if a.deficit() == b.deficit() => b.time() - a.time(),
        (Some(a), Some(b)) => -((b.deficit() as f64 - a.deficit() as f64).abs()),
        _ => RETIRED_GAP,
    }
}

impl RaceHistory {
    /// position_grid returns the position table of the whole race, indexed by lap and position.
    pub fn position_grid(&self) -> Vec<Vec<PositionEntry>> {
        let cum = self.cumulative_records();
        (0..self.tot_no_laps)
            .map(|lap| self.positions_at(&cum, LapIndex(lap)))
            .collect()
    }

    /// positions returns the position table of a single lap.
    pub fn positions(&self, lap: LapIndex) -> Vec<PositionEntry> {
        self.positions_at(&self.cumulative_records(), lap)
    }

    fn positions_at(&self, cum: &[Vec<LapRecord>], lap: LapIndex) -> Vec<PositionEntry> {
        let order = order_at(cum, lap);
        let leader = order.first().and_then(|d| cum[d.0].get(lap.0));

        order
            .iter()
            .enumerate()
            .map(|(pos, &driver)| {
                let rec = cum[driver.0].get(lap.0);
                let cumulative_time = rec
                    .or_else(|| cum[driver.0].last())
                    .map_or(0.0, |r| r.time());

                let (gap, interval) = if pos == 0 {
                    (0.0, (lap.0 + 1) as f64)
                } else {
                    let ahead = cum[order[pos - 1].0].get(lap.0);
                    (encode_gap(leader, rec), encode_gap(ahead, rec))
                };

                PositionEntry {
                    lap,
                    position: Position(pos),
                    driver,
                    cumulative_time,
                    gap,
                    interval,
                    pit_stops_before_lap: self.pit_stops_before(driver, lap),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures::{history, raw};
    use approx::assert_abs_diff_eq;

    #[test]
    fn leader_row_carries_lap_number() {
        let history = history(
            3,
            vec![
                (raw(&[30.0, 31.0, 30.5], &[]), vec!["Prime"]),
                (raw(&[30.2, 30.8, 30.6], &[]), vec!["Prime"]),
            ],
        );

        let grid = history.position_grid();
        assert_eq!(grid.len(), 3);

        let first = &grid[0];
        assert_eq!(first[0].driver, DriverIndex(0));
        assert_eq!(first[0].gap, 0.0);
        assert_eq!(first[0].interval, 1.0);
        assert_abs_diff_eq!(first[1].gap, 0.2, epsilon = 1e-9);
        assert_abs_diff_eq!(first[1].interval, 0.2, epsilon = 1e-9);
        assert_eq!(grid[2][0].interval, 3.0);
    }

    #[test]
    fn retired_driver_gets_sentinel_gap() {
        let mut retiring = raw(&[31.0, 31.0], &[]);
        retiring[1].retired = true;

        let history = history(
            5,
            vec![
                (raw(&[30.0; 5], &[]), vec!["Prime"]),
                (retiring, vec!["Prime"]),
            ],
        );

        let grid = history.position_grid();
        for lap in 2..5 {
            let last = grid[lap][1];
            assert_eq!(last.driver, DriverIndex(1));
            assert_eq!(last.gap, RETIRED_GAP);
            assert_eq!(last.interval, RETIRED_GAP);
            assert_abs_diff_eq!(last.cumulative_time, 62.0);
            assert_eq!(Gap::decode(last.gap), Gap::Unavailable);
        }
    }

    #[test]
    fn lapped_driver_gap_is_negated_deficit() {
        let history = history(
            6,
            vec![
                (raw(&[60.0; 6], &[]), vec!["Prime"]),
                (raw(&[100.0; 6], &[]), vec!["Prime"]),
            ],
        );

        let grid = history.position_grid();
        assert_eq!(grid[5][1].driver, DriverIndex(1));
        assert_abs_diff_eq!(grid[5][1].gap, -2.0);
        assert_eq!(Gap::decode(grid[5][1].gap), Gap::Laps(2));
        assert_abs_diff_eq!(grid[4][1].gap, -1.0);
        assert_abs_diff_eq!(grid[3][1].gap, 160.0);
        assert_eq!(Gap::decode(grid[3][1].gap), Gap::Time(160.0));
    }

    #[test]
    fn pit_stops_are_counted_before_the_lap() {
        let history = history(
            6,
            vec![(
                raw(&[90.0, 90.0, 110.0, 112.0, 90.0, 90.0], &[2]),
                vec!["Option", "Prime"],
            )],
        );

        let stops: Vec<u32> = history
            .position_grid()
            .iter()
            .map(|lap| lap[0].pit_stops_before_lap)
            .collect();
        assert_eq!(stops, vec![0, 0, 0, 1, 1, 1]);
    }
}
