//! The fixed set of service stations and a small typed map over them.
//!
//! The station set is part of the model, not a plugin point: customers
//! always pass through the cashiers and may visit the other stations
//! gated by per-station probabilities, in the fixed order below.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A named resource pool a customer may request service from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Station {
    Cashiers,
    Drinks,
    Fryer,
    Desserts,
    Chicken,
}

impl Station {
    /// All stations in customer visit order. Cashiers is mandatory and
    /// always first.
    pub const ALL: [Station; 5] = [
        Station::Cashiers,
        Station::Drinks,
        Station::Fryer,
        Station::Desserts,
        Station::Chicken,
    ];

    /// Probability-gated stations, attempted in this fixed order after
    /// the cashiers.
    pub const OPTIONAL: [Station; 4] = [
        Station::Drinks,
        Station::Fryer,
        Station::Desserts,
        Station::Chicken,
    ];

    /// Number of stations in the model.
    pub const COUNT: usize = Self::ALL.len();

    /// Configuration key for this station.
    pub fn as_str(self) -> &'static str {
        match self {
            Station::Cashiers => "cashiers",
            Station::Drinks => "drinks",
            Station::Fryer => "fryer",
            Station::Desserts => "desserts",
            Station::Chicken => "chicken",
        }
    }

    /// Position in [`Station::ALL`], usable as an array index.
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Station {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashiers" => Ok(Station::Cashiers),
            "drinks" => Ok(Station::Drinks),
            "fryer" => Ok(Station::Fryer),
            "desserts" => Ok(Station::Desserts),
            "chicken" => Ok(Station::Chicken),
            _ => Err(format!("unknown station: {s}")),
        }
    }
}

/// A value per station, stored densely and indexed by [`Station`].
///
/// Serializes as a `station name -> value` map so results read the
/// same as the configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StationMap<T> {
    values: [T; Station::COUNT],
}

impl<T> StationMap<T> {
    /// Builds a map by evaluating `f` for every station.
    pub fn from_fn(mut f: impl FnMut(Station) -> T) -> Self {
        Self {
            values: Station::ALL.map(&mut f),
        }
    }

    /// Iterates entries in station visit order.
    pub fn iter(&self) -> impl Iterator<Item = (Station, &T)> {
        Station::ALL.iter().map(|&s| (s, &self.values[s.index()]))
    }
}

impl<T: Clone> StationMap<T> {
    /// Builds a map holding `value` for every station.
    pub fn filled(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<Station> for StationMap<T> {
    type Output = T;

    fn index(&self, station: Station) -> &T {
        &self.values[station.index()]
    }
}

impl<T> IndexMut<Station> for StationMap<T> {
    fn index_mut(&mut self, station: Station) -> &mut T {
        &mut self.values[station.index()]
    }
}

impl<T: Serialize> Serialize for StationMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Station::COUNT))?;
        for (station, value) in self.iter() {
            map.serialize_entry(station.as_str(), value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cashiers_is_first_in_visit_order() {
        assert_eq!(Station::ALL[0], Station::Cashiers);
        assert!(!Station::OPTIONAL.contains(&Station::Cashiers));
        assert_eq!(Station::OPTIONAL.len(), Station::COUNT - 1);
    }

    #[test]
    fn station_round_trips_through_strings() {
        for station in Station::ALL {
            assert_eq!(station.as_str().parse::<Station>().unwrap(), station);
        }
        assert!("grill".parse::<Station>().is_err());
    }

    #[test]
    fn station_map_indexing() {
        let mut map = StationMap::filled(0u32);
        map[Station::Fryer] = 3;
        assert_eq!(map[Station::Fryer], 3);
        assert_eq!(map[Station::Cashiers], 0);
    }

    #[test]
    fn station_map_serializes_with_names() {
        let map = StationMap::from_fn(|s| s.index());
        let json = serde_json::to_value(map).unwrap();
        assert_eq!(json["cashiers"], 0);
        assert_eq!(json["chicken"], 4);
    }
}
