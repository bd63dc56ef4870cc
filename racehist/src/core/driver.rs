use crate::core::stint::TyreType;
use crate::interfaces::panel_interface::RgbColor;
use serde::Deserialize;

/// * `initials` - Driver initials, e.g. BOT
/// * `name` - Driver name as used in the timing data, e.g. Valtteri Bottas
/// * `color` - Display color in CSS notation, e.g. #00d2be
/// * `tyres` - Tyre type of every stint in race order
#[derive(Debug, Deserialize, Clone)]
pub struct DriverPars {
    pub initials: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub tyres: Vec<TyreType>,
}

fn default_color() -> String {
    String::from("#808080")
}

#[derive(Debug, Clone)]
pub struct Driver {
    pub initials: String,
    pub name: String,
    pub color: RgbColor,
}

impl Driver {
    pub fn new(driver_pars: &DriverPars) -> anyhow::Result<Driver> {
        Ok(Driver {
            initials: driver_pars.initials.to_owned(),
            name: driver_pars.name.to_owned(),
            color: RgbColor::from_css(&driver_pars.color)?,
        })
    }
}
