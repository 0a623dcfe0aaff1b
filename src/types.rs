use serde::{Deserialize, Serialize};
use std::fmt;

/// One rung of the administrative hierarchy, ordered from the top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Country,
    Province,
    District,
    Municipality,
    Ward,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Country,
        Level::Province,
        Level::District,
        Level::Municipality,
        Level::Ward,
    ];

    /// Name of the URL query parameter carrying this level.
    pub fn as_param(self) -> &'static str {
        match self {
            Level::Country => "country",
            Level::Province => "province",
            Level::District => "district",
            Level::Municipality => "municipality",
            Level::Ward => "ward",
        }
    }

    pub fn from_param(name: &str) -> Option<Level> {
        Level::ALL.into_iter().find(|level| level.as_param() == name)
    }

    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Country => None,
            Level::Province => Some(Level::Country),
            Level::District => Some(Level::Province),
            Level::Municipality => Some(Level::District),
            Level::Ward => Some(Level::Municipality),
        }
    }

    pub fn child(self) -> Option<Level> {
        match self {
            Level::Country => Some(Level::Province),
            Level::Province => Some(Level::District),
            Level::District => Some(Level::Municipality),
            Level::Municipality => Some(Level::Ward),
            Level::Ward => None,
        }
    }

    /// Every level strictly below this one.
    pub fn descendants(self) -> impl Iterator<Item = Level> {
        Level::ALL.into_iter().filter(move |level| *level > self)
    }

    /// Every level strictly above this one, top first.
    pub fn ancestors(self) -> impl Iterator<Item = Level> {
        Level::ALL.into_iter().filter(move |level| *level < self)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// The user's current pick at each level. Empty string means unselected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selection {
    pub country: String,
    pub province: String,
    pub district: String,
    pub municipality: String,
    pub ward: String,
}

impl Selection {
    pub fn get(&self, level: Level) -> &str {
        match level {
            Level::Country => &self.country,
            Level::Province => &self.province,
            Level::District => &self.district,
            Level::Municipality => &self.municipality,
            Level::Ward => &self.ward,
        }
    }

    fn slot(&mut self, level: Level) -> &mut String {
        match level {
            Level::Country => &mut self.country,
            Level::Province => &mut self.province,
            Level::District => &mut self.district,
            Level::Municipality => &mut self.municipality,
            Level::Ward => &mut self.ward,
        }
    }

    /// Sets `level` and clears everything below it.
    pub fn set(&mut self, level: Level, value: impl Into<String>) {
        *self.slot(level) = value.into();
        for below in level.descendants() {
            self.slot(below).clear();
        }
    }

    /// Sets `level` without touching descendants. Used when reading raw URL values.
    pub fn set_raw(&mut self, level: Level, value: impl Into<String>) {
        *self.slot(level) = value.into();
    }

    pub fn clear(&mut self, level: Level) {
        self.set(level, String::new());
    }

    pub fn is_empty(&self) -> bool {
        Level::ALL.iter().all(|level| self.get(*level).is_empty())
    }

    /// The deepest level whose whole parent chain is selected.
    pub fn deepest(&self) -> Option<(Level, &str)> {
        let mut deepest = None;
        for level in Level::ALL {
            let value = self.get(level);
            if value.is_empty() {
                break;
            }
            deepest = Some((level, value));
        }
        deepest
    }
}

/// Snapshot of the selection handed to the map on every filter change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MapFilter {
    pub country: String,
    pub province: String,
    pub district: String,
    pub municipality: String,
    pub ward: String,
}

impl MapFilter {
    pub fn selection(&self) -> Selection {
        Selection {
            country: self.country.clone(),
            province: self.province.clone(),
            district: self.district.clone(),
            municipality: self.municipality.clone(),
            ward: self.ward.clone(),
        }
    }
}

impl From<&Selection> for MapFilter {
    fn from(selection: &Selection) -> Self {
        MapFilter {
            country: selection.country.clone(),
            province: selection.province.clone(),
            district: selection.district.clone(),
            municipality: selection.municipality.clone(),
            ward: selection.ward.clone(),
        }
    }
}

/// A dropdown entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOption {
    pub value: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        LngLat { lng, lat }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        LngLat { lng, lat }
    }
}

/// South-west / north-east corners, serialized the way map libraries take them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: LngLat,
    pub max: LngLat,
}

impl Bounds {
    pub fn center(&self) -> LngLat {
        LngLat::new(
            (self.min.lng + self.max.lng) / 2.0,
            (self.min.lat + self.max.lat) / 2.0,
        )
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: LngLat::new(self.min.lng.min(other.min.lng), self.min.lat.min(other.min.lat)),
            max: LngLat::new(self.max.lng.max(other.max.lng), self.max.lat.max(other.max.lat)),
        }
    }
}

impl From<geo::Rect<f64>> for Bounds {
    fn from(rect: geo::Rect<f64>) -> Self {
        Bounds {
            min: LngLat::new(rect.min().x, rect.min().y),
            max: LngLat::new(rect.max().x, rect.max().y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_a_level_clears_everything_below() {
        let mut selection = Selection {
            country: "nepal".into(),
            province: "province3".into(),
            district: "kathmandu".into(),
            municipality: "kathmandu_municipality".into(),
            ward: "ward-1".into(),
        };

        selection.set(Level::Province, "province4");

        assert_eq!(selection.country, "nepal");
        assert_eq!(selection.province, "province4");
        assert!(selection.district.is_empty());
        assert!(selection.municipality.is_empty());
        assert!(selection.ward.is_empty());
    }

    #[test]
    fn deepest_stops_at_first_gap() {
        let selection = Selection {
            country: "nepal".into(),
            province: String::new(),
            district: "kathmandu".into(),
            ..Selection::default()
        };
        assert_eq!(selection.deepest(), Some((Level::Country, "nepal")));
        assert_eq!(Selection::default().deepest(), None);
    }

    #[test]
    fn level_params_round_trip() {
        for level in Level::ALL {
            assert_eq!(Level::from_param(level.as_param()), Some(level));
        }
        assert_eq!(Level::from_param("state"), None);
        assert_eq!(Level::Ward.descendants().count(), 0);
        assert_eq!(
            Level::District.ancestors().collect::<Vec<_>>(),
            vec![Level::Country, Level::Province]
        );
    }
}
