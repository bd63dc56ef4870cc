use crate::core::driver::{Driver, DriverPars};
use crate::core::edits::Edit;
use crate::core::race_history::RacePars;
use anyhow::Context;
use helpers::general::InputValueError;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

/// HistoryPars is used to store all other parameter structs. The order of `driver_pars_all`
/// defines the driver indices.
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryPars {
    pub race_pars: RacePars,
    pub driver_pars_all: Vec<DriverPars>,
}

impl HistoryPars {
    pub fn driver_names(&self) -> Vec<String> {
        self.driver_pars_all
            .iter()
            .map(|driver_pars| driver_pars.name.to_owned())
            .collect()
    }

    /// validate checks the parameters for values the reconstruction cannot work with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.race_pars.tot_no_laps == 0 {
            return Err(InputValueError).context("Race parameter tot_no_laps must be positive!");
        }

        if self.driver_pars_all.is_empty() {
            return Err(InputValueError).context("At least one driver must be given!");
        }

        let mut names = HashSet::new();
        for driver_pars in self.driver_pars_all.iter() {
            if !names.insert(driver_pars.name.as_str()) {
                return Err(InputValueError)
                    .context(format!("Driver name {} is not unique!", driver_pars.name));
            }

            if !self.race_pars.tyre_types.is_empty() {
                if let Some(tyre) = driver_pars
                    .tyres
                    .iter()
                    .find(|tyre| !self.race_pars.tyre_types.contains(*tyre))
                {
                    return Err(InputValueError).context(format!(
                        "Tyre type {} of driver {} is not part of the race tyre types!",
                        tyre, driver_pars.name
                    ));
                }
            }

            Driver::new(driver_pars)?;
        }

        Ok(())
    }
}

/// read_history_pars reads the JSON file, decodes the JSON string into the parameters struct and
/// validates it.
pub fn read_history_pars(filepath: &Path) -> anyhow::Result<HistoryPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open parameter file {}!",
            filepath.display()
        ))?;
    let pars: HistoryPars = serde_json::from_reader(&fh).context(format!(
        "Failed to parse parameter file {}!",
        filepath.display()
    ))?;
    pars.validate()
        .context(format!("Invalid parameter file {}!", filepath.display()))?;
    Ok(pars)
}

/// read_edits reads a JSON edit script.
pub fn read_edits(filepath: &Path) -> anyhow::Result<Vec<Edit>> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open edit script {}!", filepath.display()))?;
    let edits = serde_json::from_reader(&fh)
        .context(format!("Failed to parse edit script {}!", filepath.display()))?;
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARS: &str = r##"{
        "race_pars": {
            "season": 2012,
            "track_name": "Shanghai",
            "tot_no_laps": 56,
            "tyre_types": ["Option", "Prime"]
        },
        "driver_pars_all": [
            {"initials": "ROS", "name": "Nico Rosberg", "color": "#00d2be", "tyres": ["Option", "Prime", "Prime"]},
            {"initials": "BUT", "name": "Jenson Button", "color": "orange", "tyres": ["Option", "Prime"]}
        ]
    }"##;

    fn pars() -> HistoryPars {
        serde_json::from_str(PARS).unwrap()
    }

    #[test]
    fn fuel_parameters_fall_back_to_defaults() {
        let pars = pars();
        assert_eq!(pars.race_pars.fuel_per_lap, 1.8);
        assert_eq!(pars.race_pars.fuel_time_effect, 0.03);
        assert_eq!(pars.driver_names(), vec!["Nico Rosberg", "Jenson Button"]);
        assert!(pars.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_tyre() {
        let mut pars = pars();
        pars.driver_pars_all[1].tyres.push("Wet".into());
        let err = pars.validate().unwrap_err();
        assert!(err.to_string().contains("Wet"));
        assert!(err.downcast_ref::<InputValueError>().is_some());
    }

    #[test]
    fn rejects_duplicate_driver_and_zero_laps() {
        let mut pars = pars();
        pars.driver_pars_all[1].name = String::from("Nico Rosberg");
        assert!(pars.validate().is_err());

        let mut pars = self::pars();
        pars.race_pars.tot_no_laps = 0;
        assert!(pars.validate().is_err());
    }
}
