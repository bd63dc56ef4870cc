use crate::core::driver::Driver;
use crate::core::positions::{Gap, PositionEntry};
use crate::core::race_history::RaceHistory;
use crate::core::stint::Stint;
use crate::interfaces::panel_interface::RgbColor;
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;
use std::fs::OpenOptions;
use std::io::Write as IoWrite;
use std::path::Path;

/// DriverLegend is used to store the display information of a driver for post-processing.
#[derive(Debug, Serialize, Clone)]
pub struct DriverLegend {
    pub initials: String,
    pub name: String,
    pub color: RgbColor,
}

/// HistoryResult contains everything presentation layers need from a race history. Lap and race
/// times are indexed by driver and lap, the position grid by lap and position.
#[derive(Debug, Serialize, Clone)]
pub struct HistoryResult {
    pub tot_no_laps: u32,
    pub drivers: Vec<DriverLegend>,
    pub laptimes: Vec<Vec<f64>>,
    pub racetimes: Vec<Vec<f64>>,
    pub positions: Vec<Vec<PositionEntry>>,
    pub stints: Vec<Vec<Stint>>,
}

fn format_gap(value: f64) -> String {
    match Gap::decode(value) {
        Gap::Time(t) => format!("{:+8.3}s", t),
        Gap::Laps(1) => String::from("   +1 lap"),
        Gap::Laps(n) => format!("{:>4} laps", format!("+{}", n)),
        Gap::Unavailable => String::from("      DNF"),
    }
}

impl HistoryResult {
    pub fn from_history(history: &RaceHistory, drivers: &[Driver]) -> HistoryResult {
        HistoryResult {
            tot_no_laps: history.tot_no_laps() as u32,
            drivers: drivers
                .iter()
                .map(|driver| DriverLegend {
                    initials: driver.initials.to_owned(),
                    name: driver.name.to_owned(),
                    color: driver.color,
                })
                .collect(),
            laptimes: history
                .all_laps()
                .iter()
                .map(|laps| laps.iter().map(|rec| rec.time()).collect())
                .collect(),
            racetimes: history.cumulative_times(),
            positions: history.position_grid(),
            stints: history.all_stints(),
        }
    }

    fn driver_header(&self) -> Result<String, std::fmt::Error> {
        let mut header = String::from("lap, ");
        for (i, driver) in self.drivers.iter().enumerate() {
            if i < self.drivers.len() - 1 {
                write!(&mut header, "{:>9}, ", driver.initials)?;
            } else {
                write!(&mut header, "{:>9}", driver.initials)?;
            }
        }
        Ok(header)
    }

    /// format_times creates a table with one line per lap and one column per driver. Laps after
    /// a retirement stay empty.
    fn format_times(&self, times: &[Vec<f64>]) -> Result<String, std::fmt::Error> {
        let mut table = String::new();

        for lap in 0..self.tot_no_laps as usize {
            write!(&mut table, "{:3}, ", lap + 1)?;

            for (i, times_driver) in times.iter().enumerate() {
                let sep = if i < times.len() - 1 { ", " } else { "" };
                match times_driver.get(lap) {
                    Some(t) => write!(&mut table, "{:8.3}s{}", t, sep)?,
                    None => write!(&mut table, "{:>9}{}", "-", sep)?,
                }
            }
            writeln!(&mut table)?;
        }

        Ok(table)
    }

    /// format_position_table creates a table with one line per lap listing the drivers in
    /// running order together with their gap to the leader.
    fn format_position_table(&self) -> Result<String, std::fmt::Error> {
        let mut table = String::new();

        for entries in &self.positions {
            if let Some(first) = entries.first() {
                write!(&mut table, "{:3}, ", first.lap.0 + 1)?;
            }

            for (i, entry) in entries.iter().enumerate() {
                let initials = self
                    .drivers
                    .get(entry.driver.0)
                    .map_or("???", |d| d.initials.as_str());
                let gap = if i == 0 {
                    String::from("   leader")
                } else {
                    format_gap(entry.gap)
                };
                let sep = if i < entries.len() - 1 { ", " } else { "" };
                write!(&mut table, "{} {}{}", initials, gap, sep)?;
            }
            writeln!(&mut table)?;
        }

        Ok(table)
    }

    fn format_tables(&self) -> Result<String, std::fmt::Error> {
        let header = self.driver_header()?;
        let mut content = String::new();

        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "{}", header)?;
        writeln!(&mut content, "{}", self.format_times(&self.laptimes)?)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "{}", header)?;
        writeln!(&mut content, "{}", self.format_times(&self.racetimes)?)?;
        writeln!(&mut content, "RESULT: Running order")?;
        writeln!(&mut content, "{}", self.format_position_table()?)?;

        Ok(content)
    }

    /// print_tables prints lap times, race times and the running order to the console output.
    pub fn print_tables(&self) -> anyhow::Result<()> {
        print!("{}", self.format_tables()?);
        Ok(())
    }

    /// write_tables_to_file writes lap times, race times and the running order to a text file.
    pub fn write_tables_to_file(&self, filepath: &Path) -> anyhow::Result<()> {
        let content = self.format_tables()?;
        let mut fh = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(filepath)
            .context(format!("Failed to open result file {}!", filepath.display()))?;
        fh.write_all(content.as_bytes())?;
        fh.flush()?;
        Ok(())
    }

    /// write_json exports the result as JSON for presentation layers.
    pub fn write_json(&self, filepath: &Path) -> anyhow::Result<()> {
        let fh = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(filepath)
            .context(format!("Failed to open JSON file {}!", filepath.display()))?;
        serde_json::to_writer_pretty(&fh, self)
            .context(format!("Failed to write JSON file {}!", filepath.display()))?;
        Ok(())
    }
}
