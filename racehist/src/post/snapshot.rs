use crate::core::lap::{DriverIndex, LapRecord, LapRecordParseError};
use crate::core::race_history::RaceHistory;
use crate::core::stint::TyreType;
use anyhow::Context;
use log::{debug, info};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Line {line_no}: lap record before the first driver name")]
    LapBeforeDriver { line_no: usize },

    #[error("Line {line_no}: lap record of driver {found} in the block of driver {expected}")]
    DriverMismatch {
        line_no: usize,
        expected: DriverIndex,
        found: DriverIndex,
    },

    #[error("Line {line_no}: {source}")]
    MalformedLap {
        line_no: usize,
        #[source]
        source: LapRecordParseError,
    },
}

/// Snapshot holds the lap records read back from a snapshot file and, if a side file exists,
/// the tyre usage of every driver.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub laps: Vec<Vec<LapRecord>>,
    pub tyre_usage: Option<Vec<Vec<TyreType>>>,
}

/// render_snapshot writes the driver name followed by one line per lap record for every driver.
pub fn render_snapshot(driver_names: &[String], laps: &[Vec<LapRecord>]) -> String {
    let mut content = String::new();

    for (name, recs) in driver_names.iter().zip(laps) {
        content.push_str(name);
        content.push('\n');

        for rec in recs {
            content.push_str(&rec.to_string());
            content.push('\n');
        }
    }

    content
}

/// parse_snapshot reads the lap records of every driver. A line matching a driver name starts
/// the block of that driver, every other non-empty line must be a lap record of it.
pub fn parse_snapshot(
    content: &str,
    driver_names: &[String],
) -> Result<Vec<Vec<LapRecord>>, SnapshotError> {
    let mut laps: Vec<Vec<LapRecord>> = vec![Vec::new(); driver_names.len()];
    let mut driver_cur: Option<DriverIndex> = None;

    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if let Some(driver) = driver_names.iter().position(|name| name == line) {
            driver_cur = Some(DriverIndex(driver));
            continue;
        }

        let expected = driver_cur.ok_or(SnapshotError::LapBeforeDriver { line_no })?;
        let rec = line
            .parse::<LapRecord>()
            .map_err(|source| SnapshotError::MalformedLap { line_no, source })?;

        if rec.driver() != expected {
            return Err(SnapshotError::DriverMismatch {
                line_no,
                expected,
                found: rec.driver(),
            });
        }

        laps[expected.0].push(rec);
    }

    Ok(laps)
}

/// tyre_usage_path returns the path of the tyre usage side file of a snapshot.
pub fn tyre_usage_path(filepath: &Path) -> PathBuf {
    let mut path = filepath.as_os_str().to_owned();
    path.push(".tyres.json");
    PathBuf::from(path)
}

/// write_snapshot writes the lap records of the race history and the tyre usage side file.
pub fn write_snapshot(filepath: &Path, history: &RaceHistory) -> anyhow::Result<()> {
    let content = render_snapshot(history.driver_names(), history.all_laps());
    std::fs::write(filepath, content).context(format!(
        "Failed to write snapshot file {}!",
        filepath.display()
    ))?;

    let tyre_path = tyre_usage_path(filepath);
    let fh = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tyre_path)
        .context(format!(
            "Failed to open tyre usage file {}!",
            tyre_path.display()
        ))?;
    serde_json::to_writer_pretty(&fh, history.all_tyre_usage()).context(format!(
        "Failed to write tyre usage file {}!",
        tyre_path.display()
    ))?;

    info!("Snapshot written to {}", filepath.display());
    Ok(())
}

/// read_snapshot reads a snapshot file and its tyre usage side file if present.
pub fn read_snapshot(filepath: &Path, driver_names: &[String]) -> anyhow::Result<Snapshot> {
    let content = std::fs::read_to_string(filepath).context(format!(
        "Failed to read snapshot file {}!",
        filepath.display()
    ))?;
    let laps = parse_snapshot(&content, driver_names).context(format!(
        "Failed to parse snapshot file {}!",
        filepath.display()
    ))?;

    let tyre_path = tyre_usage_path(filepath);
    let tyre_usage = if tyre_path.exists() {
        let fh = OpenOptions::new()
            .read(true)
            .open(&tyre_path)
            .context(format!(
                "Failed to open tyre usage file {}!",
                tyre_path.display()
            ))?;
        let tyre_usage = serde_json::from_reader(&fh).context(format!(
            "Failed to parse tyre usage file {}!",
            tyre_path.display()
        ))?;
        Some(tyre_usage)
    } else {
        debug!(
            "No tyre usage file {}, using tyres from the parameter file",
            tyre_path.display()
        );
        None
    };

    Ok(Snapshot { laps, tyre_usage })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lap::{LapAction, LapIndex, LapStatus};

    fn names() -> Vec<String> {
        vec![String::from("Kimi Raikkonen"), String::from("Mark Webber")]
    }

    fn laps() -> Vec<Vec<LapRecord>> {
        vec![
            vec![
                LapRecord::new(
                    DriverIndex(0),
                    LapIndex(0),
                    95.123,
                    LapStatus::Normal,
                    LapAction::Clear,
                    0,
                ),
                LapRecord::new(
                    DriverIndex(0),
                    LapIndex(1),
                    112.5,
                    LapStatus::InLap,
                    LapAction::Retire,
                    0,
                ),
            ],
            vec![LapRecord::new(
                DriverIndex(1),
                LapIndex(0),
                96.0,
                LapStatus::Normal,
                LapAction::Stuck,
                0,
            )],
        ]
    }

    #[test]
    fn renders_names_and_records() {
        assert_eq!(
            render_snapshot(&names(), &laps()),
            "Kimi Raikkonen\n0 - 0:95.123, 1(Clear)(-0)\n0 - 1:112.5, 2(Retire)(-0)\n\
             Mark Webber\n1 - 0:96, 1(Stuck)(-0)\n"
        );
    }

    #[test]
    fn parses_rendered_snapshot() {
        let content = render_snapshot(&names(), &laps());
        assert_eq!(parse_snapshot(&content, &names()).unwrap(), laps());
    }

    #[test]
    fn driver_without_laps_is_kept_empty() {
        let content = "Kimi Raikkonen\n\nMark Webber\n1 - 0:96, 1(Stuck)(-0)\n";
        let laps = parse_snapshot(content, &names()).unwrap();
        assert!(laps[0].is_empty());
        assert_eq!(laps[1].len(), 1);
    }

    #[test]
    fn rejects_lap_before_driver() {
        let err = parse_snapshot("0 - 0:95.1, 1(Clear)(-0)\n", &names()).unwrap_err();
        assert!(matches!(err, SnapshotError::LapBeforeDriver { line_no: 1 }));
    }

    #[test]
    fn rejects_record_of_other_driver() {
        let content = "Kimi Raikkonen\n1 - 0:96, 1(Clear)(-0)\n";
        let err = parse_snapshot(content, &names()).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::DriverMismatch {
                line_no: 2,
                expected: DriverIndex(0),
                found: DriverIndex(1),
            }
        ));
    }

    #[test]
    fn rejects_malformed_lap_with_line_number() {
        let content = "Kimi Raikkonen\n0 - 0:95.1, 1(Clear)(-0)\n0 - 1:fast, 1(Clear)(-0)\n";
        let err = parse_snapshot(content, &names()).unwrap_err();
        assert!(matches!(err, SnapshotError::MalformedLap { line_no: 3, .. }));
        assert!(err.to_string().starts_with("Line 3:"));
    }

    #[test]
    fn tyre_usage_file_sits_next_to_snapshot() {
        assert_eq!(
            tyre_usage_path(Path::new("output/china.txt")),
            PathBuf::from("output/china.txt.tyres.json")
        );
    }
}
