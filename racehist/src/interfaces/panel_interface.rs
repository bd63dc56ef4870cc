use crate::core::lap::LapIndex;
use crate::core::positions::PositionEntry;
use crate::core::stint::Stint;
use anyhow::Context;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub fn from_css(color: &str) -> anyhow::Result<RgbColor> {
        let tmp_color = color
            .parse::<css_color_parser::Color>()
            .context(format!("Could not parse color {}!", color))?;

        Ok(RgbColor {
            r: tmp_color.r,
            g: tmp_color.g,
            b: tmp_color.b,
        })
    }
}

/// PositionUpdate is sent to an attached receiver whenever the race history changed.
/// * `lap_affected` - Earliest lap touched by the edit, None for the initial table
/// * `grid` - Position table indexed by lap and position
/// * `stints` - Stints of every driver
#[derive(Debug, Clone, Default)]
pub struct PositionUpdate {
    pub lap_affected: Option<LapIndex>,
    pub grid: Vec<Vec<PositionEntry>>,
    pub stints: Vec<Vec<Stint>>,
}
