use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// DriverIndex is the position of a driver in the driver list of the parameter file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DriverIndex(pub usize);

/// LapIndex is the 0-based index of a lap in the race.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LapIndex(pub usize);

/// Position is the 0-based running position (0 = leader).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(pub usize);

impl fmt::Display for DriverIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LapIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl LapIndex {
    pub fn prev(self) -> Option<LapIndex> {
        self.0.checked_sub(1).map(LapIndex)
    }

    pub fn next(self) -> LapIndex {
        LapIndex(self.0 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapStatus {
    OutLap,
    Normal,
    InLap,
}

impl LapStatus {
    /// code returns the integer used in the snapshot format.
    pub fn code(self) -> u8 {
        match self {
            LapStatus::OutLap => 0,
            LapStatus::Normal => 1,
            LapStatus::InLap => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<LapStatus> {
        match code {
            0 => Some(LapStatus::OutLap),
            1 => Some(LapStatus::Normal),
            2 => Some(LapStatus::InLap),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapAction {
    Clear,
    Overtake,
    Stuck,
    Retire,
}

impl fmt::Display for LapAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let token = match self {
            LapAction::Clear => "Clear",
            LapAction::Overtake => "Overtake",
            LapAction::Stuck => "Stuck",
            LapAction::Retire => "Retire",
        };
        write!(f, "{}", token)
    }
}

impl FromStr for LapAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Clear" => Ok(LapAction::Clear),
            "Overtake" => Ok(LapAction::Overtake),
            "Stuck" => Ok(LapAction::Stuck),
            "Retire" => Ok(LapAction::Retire),
            _ => Err(()),
        }
    }
}

/// RawLap is a single lap as delivered by the timing ingestion, before any event detection.
/// * `time` - (s) Lap time
/// * `in_lap` - True if the lap ends in the pit lane
/// * `retired` - True if the driver stopped on this lap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLap {
    pub time: f64,
    pub in_lap: bool,
    pub retired: bool,
}

/// LapRecord is the fact recorded for one driver on one lap. Depending on the derived view that
/// holds it, `time` is either the lap time or the cumulative race time up to the end of the lap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LapRecord {
    driver: DriverIndex,
    lap: LapIndex,
    time: f64,
    status: LapStatus,
    action: LapAction,
    deficit: u32,
}

impl LapRecord {
    pub fn new(
        driver: DriverIndex,
        lap: LapIndex,
        time: f64,
        status: LapStatus,
        action: LapAction,
        deficit: u32,
    ) -> LapRecord {
        LapRecord {
            driver,
            lap,
            time,
            status,
            action,
            deficit,
        }
    }

    pub fn driver(&self) -> DriverIndex {
        self.driver
    }

    pub fn lap(&self) -> LapIndex {
        self.lap
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn status(&self) -> LapStatus {
        self.status
    }

    pub fn action(&self) -> LapAction {
        self.action
    }

    pub fn deficit(&self) -> u32 {
        self.deficit
    }

    pub fn with_time(self, time: f64) -> LapRecord {
        LapRecord { time, ..self }
    }

    pub fn with_status(self, status: LapStatus) -> LapRecord {
        LapRecord { status, ..self }
    }

    pub fn with_action(self, action: LapAction) -> LapRecord {
        LapRecord { action, ..self }
    }

    pub fn with_deficit(self, deficit: u32) -> LapRecord {
        LapRecord { deficit, ..self }
    }

    /// compare orders two records of the same lap for the position table. A larger lap deficit
    /// always sorts behind. With equal deficits the smaller time sorts ahead, but a time of
    /// exactly zero means "no time" and never displaces a record that has one.
    pub fn compare(&self, other: &LapRecord) -> Ordering {
        if self.deficit != other.deficit {
            return self.deficit.cmp(&other.deficit);
        }

        match (self.time == 0.0, other.time == 0.0) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self
                .time
                .partial_cmp(&other.time)
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for LapRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {}:{}, {}({})(-{})",
            self.driver,
            self.lap,
            self.time,
            self.status.code(),
            self.action,
            self.deficit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LapRecordParseError {
    #[error("Lap record '{line}' is missing '{token}'")]
    MissingToken { line: String, token: &'static str },

    #[error("Lap record '{line}' has an invalid {field}")]
    InvalidField { line: String, field: &'static str },
}

impl FromStr for LapRecord {
    type Err = LapRecordParseError;

    /// Parses `{driver} - {lap}:{time}, {status}({action})(-{deficit})`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        let missing = |token: &'static str| LapRecordParseError::MissingToken {
            line: line.to_owned(),
            token,
        };
        let invalid = |field: &'static str| LapRecordParseError::InvalidField {
            line: line.to_owned(),
            field,
        };

        let (driver, rest) = line.split_once(" - ").ok_or_else(|| missing(" - "))?;
        let (lap, rest) = rest.split_once(':').ok_or_else(|| missing(":"))?;
        let (time, rest) = rest.split_once(", ").ok_or_else(|| missing(", "))?;
        let (status, rest) = rest.split_once('(').ok_or_else(|| missing("("))?;
        let (action, rest) = rest.split_once(")(-").ok_or_else(|| missing(")(-"))?;
        let deficit = rest.strip_suffix(')').ok_or_else(|| missing(")"))?;

        let driver = driver
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid("driver index"))?;
        let lap = lap.trim().parse::<usize>().map_err(|_| invalid("lap index"))?;
        let time = time.trim().parse::<f64>().map_err(|_| invalid("lap time"))?;
        let status = status
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(LapStatus::from_code)
            .ok_or_else(|| invalid("lap status"))?;
        let action = action
            .parse::<LapAction>()
            .map_err(|_| invalid("lap action"))?;
        let deficit = deficit
            .parse::<u32>()
            .map_err(|_| invalid("lap deficit"))?;

        Ok(LapRecord::new(
            DriverIndex(driver),
            LapIndex(lap),
            time,
            status,
            action,
            deficit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, deficit: u32) -> LapRecord {
        LapRecord::new(
            DriverIndex(0),
            LapIndex(3),
            time,
            LapStatus::Normal,
            LapAction::Clear,
            deficit,
        )
    }

    #[test]
    fn smaller_deficit_sorts_ahead_regardless_of_time() {
        assert_eq!(record(500.0, 0).compare(&record(10.0, 1)), Ordering::Less);
        assert_eq!(record(10.0, 2).compare(&record(500.0, 1)), Ordering::Greater);
    }

    #[test]
    fn smaller_time_sorts_ahead_on_equal_deficit() {
        assert_eq!(record(30.0, 0).compare(&record(30.2, 0)), Ordering::Less);
        assert_eq!(record(30.2, 0).compare(&record(30.0, 0)), Ordering::Greater);
    }

    #[test]
    fn zero_time_never_displaces_a_timed_record() {
        assert_eq!(record(0.0, 0).compare(&record(95.0, 0)), Ordering::Greater);
        assert_eq!(record(95.0, 0).compare(&record(0.0, 0)), Ordering::Less);
        assert_eq!(record(0.0, 0).compare(&record(0.0, 0)), Ordering::Equal);
    }

    #[test]
    fn renders_snapshot_line() {
        let rec = LapRecord::new(
            DriverIndex(2),
            LapIndex(14),
            92.125,
            LapStatus::InLap,
            LapAction::Stuck,
            0,
        );
        assert_eq!(rec.to_string(), "2 - 14:92.125, 2(Stuck)(-0)");
    }

    #[test]
    fn parses_snapshot_line() {
        let rec: LapRecord = "1 - 55:0, 1(Retire)(-2)".parse().unwrap();
        assert_eq!(rec.driver(), DriverIndex(1));
        assert_eq!(rec.lap(), LapIndex(55));
        assert_eq!(rec.time(), 0.0);
        assert_eq!(rec.status(), LapStatus::Normal);
        assert_eq!(rec.action(), LapAction::Retire);
        assert_eq!(rec.deficit(), 2);
    }

    #[test]
    fn rendered_line_parses_back_exactly() {
        let rec = LapRecord::new(
            DriverIndex(7),
            LapIndex(0),
            0.1 + 0.2,
            LapStatus::OutLap,
            LapAction::Overtake,
            0,
        );
        let parsed: LapRecord = rec.to_string().parse().unwrap();
        assert_eq!(parsed, rec);
    }

    #[test]
    fn rejects_unknown_action_and_status() {
        let err = "0 - 1:90.0, 1(Pass)(-0)".parse::<LapRecord>().unwrap_err();
        assert!(matches!(
            err,
            LapRecordParseError::InvalidField {
                field: "lap action",
                ..
            }
        ));

        let err = "0 - 1:90.0, 5(Clear)(-0)".parse::<LapRecord>().unwrap_err();
        assert!(matches!(
            err,
            LapRecordParseError::InvalidField {
                field: "lap status",
                ..
            }
        ));
    }

    #[test]
    fn rejects_truncated_line() {
        let err = "0 - 1:90.0".parse::<LapRecord>().unwrap_err();
        assert!(matches!(err, LapRecordParseError::MissingToken { .. }));
    }
}
