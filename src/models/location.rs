use std::str::FromStr;

use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// Compass direction a storefront faces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Direction {
    #[default]
    #[strum(to_string = "north", serialize = "n")]
    North,
    #[strum(to_string = "northeast", serialize = "ne")]
    Northeast,
    #[strum(to_string = "east", serialize = "e")]
    East,
    #[strum(to_string = "southeast", serialize = "se")]
    Southeast,
    #[strum(to_string = "south", serialize = "s")]
    South,
    #[strum(to_string = "southwest", serialize = "sw")]
    Southwest,
    #[strum(to_string = "west", serialize = "w")]
    West,
    #[strum(to_string = "northwest", serialize = "nw")]
    Northwest,
}

impl Direction {
    /// Bearing in degrees, clockwise from north.
    pub fn degrees(self) -> u16 {
        match self {
            Direction::North => 0,
            Direction::Northeast => 45,
            Direction::East => 90,
            Direction::Southeast => 135,
            Direction::South => 180,
            Direction::Southwest => 225,
            Direction::West => 270,
            Direction::Northwest => 315,
        }
    }
}

/// Names and abbreviations in any letter case.
impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Direction::from_str(raw.trim()).map_err(|_| {
            serde::de::Error::custom(format!("unknown storefront direction `{}`", raw))
        })
    }
}

/// Missing, `null` or unrecognised directions fall back to north, so one odd
/// value never rejects a whole batch.
fn direction_or_default<'de, D>(deserializer: D) -> Result<Direction, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| Direction::from_str(value.trim()).ok())
        .unwrap_or_default())
}

/// One point to analyze inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LocationTask {
    #[garde(range(min = -90.0, max = 90.0))]
    pub lat: f64,

    #[garde(range(min = -180.0, max = 180.0))]
    pub lng: f64,

    #[serde(
        default,
        rename = "storefront_direction",
        alias = "direction",
        deserialize_with = "direction_or_default"
    )]
    #[garde(skip)]
    pub direction: Direction,

    #[serde(default)]
    #[garde(length(min = 1, max = 32))]
    pub day: Option<String>,

    #[serde(default)]
    #[garde(length(min = 1, max = 32))]
    pub time: Option<String>,
}

impl LocationTask {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            direction: Direction::default(),
            day: None,
            time: None,
        }
    }
}
