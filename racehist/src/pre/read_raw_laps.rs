use crate::core::lap::RawLap;
use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

/// CsvLapEl is a single row of the raw lap file.
/// * `driver` - Driver name as given in the parameter file
/// * `lap` - 1-based lap number
/// * `lap_time` - (s) Lap time
/// * `in_lap` - True if the lap ends in the pit lane
/// * `retired` - True if the driver stopped on this lap
#[derive(Debug, Deserialize, Clone)]
pub struct CsvLapEl {
    pub driver: String,
    pub lap: u32,
    pub lap_time: f64,
    pub in_lap: bool,
    pub retired: bool,
}

/// parse_raw_laps reads raw laps from CSV data and returns them indexed like `driver_names`.
pub fn parse_raw_laps<R: Read>(reader: R, driver_names: &[String]) -> anyhow::Result<Vec<Vec<RawLap>>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut rows: Vec<Vec<CsvLapEl>> = vec![Vec::new(); driver_names.len()];

    for result in csv_reader.deserialize() {
        let el: CsvLapEl = result.context("Failed to parse raw lap row!")?;
        let idx = driver_names
            .iter()
            .position(|name| *name == el.driver)
            .ok_or_else(|| anyhow!("Raw laps contain unknown driver {}!", el.driver))?;
        rows[idx].push(el);
    }

    rows.into_iter()
        .zip(driver_names)
        .map(|(mut els, name)| -> anyhow::Result<Vec<RawLap>> {
            els.sort_by_key(|el| el.lap);

            for (idx, el) in els.iter().enumerate() {
                if el.lap as usize != idx + 1 {
                    bail!("Raw laps of driver {} are not consecutive at lap {}!", name, idx + 1);
                }
            }

            Ok(els
                .iter()
                .map(|el| RawLap {
                    time: el.lap_time,
                    in_lap: el.in_lap,
                    retired: el.retired,
                })
                .collect::<Vec<RawLap>>())
        })
        .collect()
}

/// read_raw_laps reads the raw lap CSV file.
pub fn read_raw_laps(filepath: &Path, driver_names: &[String]) -> anyhow::Result<Vec<Vec<RawLap>>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open raw lap file {}!", filepath.display()))?;
    parse_raw_laps(&fh, driver_names)
        .context(format!("Failed to read raw lap file {}!", filepath.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec![String::from("Nico Rosberg"), String::from("Jenson Button")]
    }

    #[test]
    fn rows_are_grouped_and_ordered_per_driver() {
        let data = "driver,lap,lap_time,in_lap,retired\n\
                    Jenson Button,2,101.2,true,false\n\
                    Nico Rosberg,1,99.5,false,false\n\
                    Jenson Button,1,100.1,false,false\n\
                    Nico Rosberg,2,98.7,false,true\n";

        let raw = parse_raw_laps(data.as_bytes(), &names()).unwrap();
        assert_eq!(raw[0].len(), 2);
        assert_eq!(raw[1][0].time, 100.1);
        assert!(raw[1][1].in_lap);
        assert!(raw[0][1].retired);
    }

    #[test]
    fn unknown_driver_is_an_error() {
        let data = "driver,lap,lap_time,in_lap,retired\nMichael Schumacher,1,99.0,false,false\n";
        let err = parse_raw_laps(data.as_bytes(), &names()).unwrap_err();
        assert!(err.to_string().contains("Michael Schumacher"));
    }

    #[test]
    fn missing_lap_is_an_error() {
        let data = "driver,lap,lap_time,in_lap,retired\n\
                    Nico Rosberg,1,99.0,false,false\n\
                    Nico Rosberg,3,99.0,false,false\n";
        assert!(parse_raw_laps(data.as_bytes(), &names()).is_err());
    }
}
