//! Built-in administrative hierarchies.
//!
//! Units are kept as flat tables with a parent id per row, then indexed once
//! into [`Catalog`] so every lookup is by identifier.

use crate::types::{FilterOption, Level, LngLat, Selection};
use serde::Serialize;
use std::collections::HashMap;

const MIN_SEARCH_LEN: usize = 2;
const MAX_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Country {
    pub code: &'static str,
    pub id: &'static str,
    pub name: &'static str,
    pub local_name: &'static str,
    pub population: u64,
    pub area_km2: f64,
    pub center: LngLat,
    pub zoom: f64,
    /// Boundary file for the whole country, relative to the boundary root.
    pub boundary_file: &'static str,
    #[serde(skip)]
    pub units: &'static [AdminUnit],
}

/// A province, district, municipality or ward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdminUnit {
    pub id: &'static str,
    pub name: &'static str,
    pub local_name: Option<&'static str>,
    pub population: u64,
    pub area_km2: f64,
    pub level: Level,
    /// Id of the unit one level up; the country id for provinces.
    pub parent: &'static str,
}

const fn unit(
    id: &'static str,
    name: &'static str,
    local_name: &'static str,
    population: u64,
    area_km2: f64,
    level: Level,
    parent: &'static str,
) -> AdminUnit {
    AdminUnit {
        id,
        name,
        local_name: Some(local_name),
        population,
        area_km2,
        level,
        parent,
    }
}

// ============================================================================
// STATIC DATA
// ============================================================================

pub const NEPAL: Country = Country {
    code: "NP",
    id: "nepal",
    name: "Nepal",
    local_name: "नेपाल",
    population: 29_136_302,
    area_km2: 147_181.0,
    center: LngLat::new(84.1240, 28.3949),
    zoom: 6.0,
    boundary_file: "nepal.geojson",
    units: NEPAL_UNITS,
};

/// India is registered so it can be picked, but carries no subdivisions yet.
pub const INDIA: Country = Country {
    code: "IN",
    id: "india",
    name: "India",
    local_name: "भारत",
    population: 1_380_004_385,
    area_km2: 3_287_263.0,
    center: LngLat::new(78.9629, 20.5937),
    zoom: 5.0,
    boundary_file: "india.geojson",
    units: &[],
};

pub const COUNTRIES: &[Country] = &[NEPAL, INDIA];

// Provinces, their districts, and the districts' municipalities, in display order.
const NEPAL_UNITS: &[AdminUnit] = &[
    unit("province1", "Koshi Province", "कोशी प्रदेश", 4_535_000, 25905.0, Level::Province, "nepal"),
    unit("sunsari", "Sunsari", "सुनसरी", 763_497, 1254.0, Level::District, "province1"),
    unit("dharan_municipality", "Dharan Municipality", "धरान नगरपालिका", 173_096, 192.3, Level::Municipality, "sunsari"),
    unit("itahari_municipality", "Itahari Municipality", "इटहरी नगरपालिका", 140_517, 93.8, Level::Municipality, "sunsari"),
    unit("morang", "Morang", "मोरङ", 965_370, 1855.0, Level::District, "province1"),
    unit("biratnagar_municipality", "Biratnagar Municipality", "विराटनगर नगरपालिका", 204_949, 77.0, Level::Municipality, "morang"),
    unit("biratchowk_municipality", "Biratchowk Municipality", "विराटचोक नगरपालिका", 204_949, 77.0, Level::Municipality, "morang"),
    unit("province2", "Madhesh Province", "मधेश प्रदेश", 6_140_000, 9661.0, Level::Province, "nepal"),
    unit("sarlahi", "Sarlahi", "सर्लाही", 769_729, 1259.0, Level::District, "province2"),
    unit("malangwa_municipality", "Malangwa Municipality", "मलङ्वा नगरपालिका", 62_789, 12.5, Level::Municipality, "sarlahi"),
    unit("lalbandi_municipality", "Lalbandi Municipality", "लालबन्दी नगरपालिका", 45_678, 8.9, Level::Municipality, "sarlahi"),
    unit("dhanusha", "Dhanusha", "धनुषा", 754_777, 1180.0, Level::District, "province2"),
    unit("janakpur_municipality", "Janakpur Municipality", "जनकपुर नगरपालिका", 173_924, 24.6, Level::Municipality, "dhanusha"),
    unit("sabaila_municipality", "Sabaila Municipality", "सबैला नगरपालिका", 45_678, 12.3, Level::Municipality, "dhanusha"),
    unit("province3", "Bagmati Province", "बागमती प्रदेश", 5_520_000, 20300.0, Level::Province, "nepal"),
    unit("kathmandu", "Kathmandu", "काठमाडौं", 2_041_078, 395.0, Level::District, "province3"),
    unit("kathmandu_municipality", "Kathmandu Municipality", "काठमाडौं महानगरपालिका", 845_767, 50.67, Level::Municipality, "kathmandu"),
    unit("lalitpur_municipality", "Lalitpur Municipality", "ललितपुर महानगरपालिका", 284_922, 36.12, Level::Municipality, "kathmandu"),
    unit("bhaktapur", "Bhaktapur", "भक्तपुर", 304_651, 119.0, Level::District, "province3"),
    unit("bhaktapur_municipality", "Bhaktapur Municipality", "भक्तपुर नगरपालिका", 304_651, 6.89, Level::Municipality, "bhaktapur"),
    unit("madhyapur_municipality", "Madhyapur Thimi Municipality", "मध्यपुर थिमी नगरपालिका", 119_955, 11.47, Level::Municipality, "bhaktapur"),
    unit("province4", "Gandaki Province", "गण्डकी प्रदेश", 2_400_000, 21504.0, Level::Province, "nepal"),
    unit("kaski", "Kaski", "कास्की", 492_098, 2017.0, Level::District, "province4"),
    unit("pokhara_municipality", "Pokhara Municipality", "पोखरा महानगरपालिका", 518_452, 464.24, Level::Municipality, "kaski"),
    unit("annapurna_municipality", "Annapurna Municipality", "अन्नपूर्ण नगरपालिका", 123_927, 76.2, Level::Municipality, "kaski"),
    unit("lamjung", "Lamjung", "लमजुङ", 167_724, 1692.0, Level::District, "province4"),
    unit("besishahar_municipality", "Besishahar Municipality", "बेसीशहर नगरपालिका", 45_678, 12.5, Level::Municipality, "lamjung"),
    unit("madhyanepal_municipality", "Madhya Nepal Municipality", "मध्य नेपाल नगरपालिका", 23_456, 8.9, Level::Municipality, "lamjung"),
    unit("province5", "Lumbini Province", "लुम्बिनी प्रदेश", 5_000_000, 22288.0, Level::Province, "nepal"),
    unit("rupandehi", "Rupandehi", "रुपन्देही", 880_196, 1360.0, Level::District, "province5"),
    unit("siddharthanagar_municipality", "Siddharthanagar Municipality", "सिद्धार्थनगर नगरपालिका", 63_426, 36.0, Level::Municipality, "rupandehi"),
    unit("butwal_municipality", "Butwal Municipality", "बुटवल नगरपालिका", 118_462, 101.61, Level::Municipality, "rupandehi"),
    unit("kapilvastu", "Kapilvastu", "कपिलवस्तु", 571_936, 1738.0, Level::District, "province5"),
    unit("kapilvastu_municipality", "Kapilvastu Municipality", "कपिलवस्तु नगरपालिका", 45_678, 12.5, Level::Municipality, "kapilvastu"),
    unit("buddhabhumi_municipality", "Buddhabhumi Municipality", "बुद्धभूमि नगरपालिका", 23_456, 8.9, Level::Municipality, "kapilvastu"),
    unit("province6", "Karnali Province", "कर्णाली प्रदेश", 1_700_000, 27984.0, Level::Province, "nepal"),
    unit("jajarkot", "Jajarkot", "जाजरकोट", 134_868, 2230.0, Level::District, "province6"),
    unit("khalanga_municipality", "Khalanga Municipality", "खलङ्गा नगरपालिका", 12_345, 5.2, Level::Municipality, "jajarkot"),
    unit("bheri_municipality", "Bheri Municipality", "भेरी नगरपालिका", 9_876, 3.8, Level::Municipality, "jajarkot"),
    unit("dolpa", "Dolpa", "डोल्पा", 36_689, 7889.0, Level::District, "province6"),
    unit("dunai_municipality", "Dunai Municipality", "दुनै नगरपालिका", 5_432, 2.1, Level::Municipality, "dolpa"),
    unit("thuli_municipality", "Thuli Bheri Municipality", "थुली भेरी नगरपालिका", 3_210, 1.5, Level::Municipality, "dolpa"),
    unit("province7", "Sudurpashchim Province", "सुदूरपश्चिम प्रदेश", 2_600_000, 19539.0, Level::Province, "nepal"),
    unit("kailali", "Kailali", "कैलाली", 775_709, 3235.0, Level::District, "province7"),
    unit("dhangadhi_municipality", "Dhangadhi Municipality", "धनगढी नगरपालिका", 147_741, 261.75, Level::Municipality, "kailali"),
    unit("tikapur_municipality", "Tikapur Municipality", "टिकापुर नगरपालिका", 45_678, 12.5, Level::Municipality, "kailali"),
    unit("kanchanpur", "Kanchanpur", "कञ्चनपुर", 451_248, 1610.0, Level::District, "province7"),
    unit("bhimdatta_municipality", "Bhimdatta Municipality", "भीमदत्त नगरपालिका", 104_599, 56.0, Level::Municipality, "kanchanpur"),
    unit("krishnapur_municipality", "Krishnapur Municipality", "कृष्णपुर नगरपालिका", 23_456, 8.9, Level::Municipality, "kanchanpur"),
];

// ============================================================================
// CATALOG
// ============================================================================

/// Search result: where a unit sits, and the selection that would show it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub level: Level,
    pub id: &'static str,
    pub name: &'static str,
    pub local_name: Option<&'static str>,
    pub country: &'static str,
    pub selection: Selection,
}

#[derive(Debug, Default)]
struct CountryIndex {
    units: HashMap<&'static str, &'static AdminUnit>,
    // parent id -> children in table order; provinces hang off the country id
    children: HashMap<&'static str, Vec<&'static AdminUnit>>,
}

/// Indexed view over the static tables.
#[derive(Debug)]
pub struct Catalog {
    countries: &'static [Country],
    index: HashMap<&'static str, CountryIndex>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_tables(COUNTRIES)
    }

    pub fn from_tables(countries: &'static [Country]) -> Self {
        let mut index = HashMap::new();

        for country in countries {
            let mut country_index = CountryIndex::default();
            for unit in country.units {
                country_index.units.insert(unit.id, unit);
                country_index.children.entry(unit.parent).or_default().push(unit);
            }
            index.insert(country.id, country_index);
        }

        Catalog { countries, index }
    }

    pub fn countries(&self) -> &'static [Country] {
        self.countries
    }

    pub fn country(&self, id: &str) -> Option<&'static Country> {
        self.countries.iter().find(|country| country.id == id)
    }

    /// Looks up a unit by id, checking it lives at `level`.
    pub fn unit(&self, country: &str, level: Level, id: &str) -> Option<&'static AdminUnit> {
        self.index
            .get(country)?
            .units
            .get(id)
            .copied()
            .filter(|unit| unit.level == level)
    }

    /// Looks up a unit by id at whatever level it lives.
    pub fn find_unit(&self, country: &str, id: &str) -> Option<&'static AdminUnit> {
        self.index.get(country)?.units.get(id).copied()
    }

    /// Direct children of the unit `parent_id` at `parent_level`.
    ///
    /// For `Level::Country` the parent id is the country id and the result is
    /// its provinces.
    pub fn children(
        &self,
        country: &str,
        parent_level: Level,
        parent_id: &str,
    ) -> &[&'static AdminUnit] {
        let Some(index) = self.index.get(country) else {
            return &[];
        };
        let parent_known = match parent_level {
            Level::Country => parent_id == country,
            level => self.unit(country, level, parent_id).is_some(),
        };
        if !parent_known {
            return &[];
        }
        index
            .children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn country_options(&self) -> Vec<FilterOption> {
        self.countries
            .iter()
            .map(|country| FilterOption {
                value: country.id.to_string(),
                name: country.name.to_string(),
            })
            .collect()
    }

    pub fn child_options(
        &self,
        country: &str,
        parent_level: Level,
        parent_id: &str,
    ) -> Vec<FilterOption> {
        self.children(country, parent_level, parent_id)
            .iter()
            .map(|unit| FilterOption {
                value: unit.id.to_string(),
                name: unit.name.to_string(),
            })
            .collect()
    }

    /// Selection that leads down to `id`, or `None` when the chain is broken.
    pub fn path(&self, country: &str, level: Level, id: &str) -> Option<Selection> {
        let country = self.country(country)?;
        let mut selection = Selection::default();
        selection.set_raw(Level::Country, country.id);

        let mut current_level = level;
        let mut current_id = id;
        while current_level != Level::Country {
            let unit = self.unit(country.id, current_level, current_id)?;
            selection.set_raw(current_level, unit.id);
            current_id = unit.parent;
            current_level = current_level.parent()?;
        }
        (current_id == country.id).then_some(selection)
    }

    /// Case-insensitive substring search over display and local names.
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.trim().to_lowercase();
        if needle.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        let matches = |name: &str, local: Option<&str>| {
            name.to_lowercase().contains(&needle)
                || local.is_some_and(|local| local.to_lowercase().contains(&needle))
        };

        let mut hits = Vec::new();
        for country in self.countries {
            if matches(country.name, Some(country.local_name)) {
                let mut selection = Selection::default();
                selection.set_raw(Level::Country, country.id);
                hits.push(SearchHit {
                    level: Level::Country,
                    id: country.id,
                    name: country.name,
                    local_name: Some(country.local_name),
                    country: country.id,
                    selection,
                });
            }
            for unit in country.units {
                if !matches(unit.name, unit.local_name) {
                    continue;
                }
                let Some(selection) = self.path(country.id, unit.level, unit.id) else {
                    continue;
                };
                hits.push(SearchHit {
                    level: unit.level,
                    id: unit.id,
                    name: unit.name,
                    local_name: unit.local_name,
                    country: country.id,
                    selection,
                });
            }
        }
        hits.truncate(MAX_SEARCH_RESULTS);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nepal_has_seven_provinces() {
        let catalog = Catalog::builtin();
        let provinces = catalog.children("nepal", Level::Country, "nepal");
        assert_eq!(provinces.len(), 7);
        assert_eq!(provinces[0].id, "province1");
        assert_eq!(provinces[6].name, "Sudurpashchim Province");
    }

    #[test]
    fn bagmati_districts_are_kathmandu_and_bhaktapur() {
        let catalog = Catalog::builtin();
        let ids: Vec<_> = catalog
            .children("nepal", Level::Province, "province3")
            .iter()
            .map(|unit| unit.id)
            .collect();
        assert_eq!(ids, vec!["kathmandu", "bhaktapur"]);
    }

    #[test]
    fn india_is_a_stub() {
        let catalog = Catalog::builtin();
        assert!(catalog.country("india").is_some());
        assert!(catalog.children("india", Level::Country, "india").is_empty());
    }

    #[test]
    fn every_unit_has_a_parent_one_level_up() {
        let catalog = Catalog::builtin();
        for country in COUNTRIES {
            for unit in country.units {
                let parent_level = unit.level.parent().expect("units sit below country");
                if parent_level == Level::Country {
                    assert_eq!(unit.parent, country.id, "{}", unit.id);
                } else {
                    assert!(
                        catalog.unit(country.id, parent_level, unit.parent).is_some(),
                        "{} has no parent {}",
                        unit.id,
                        unit.parent
                    );
                }
            }
        }
    }

    #[test]
    fn no_duplicate_ids_within_a_country() {
        for country in COUNTRIES {
            let mut seen = HashSet::new();
            for unit in country.units {
                assert!(seen.insert(unit.id), "duplicate id {}", unit.id);
            }
        }
    }

    #[test]
    fn unit_lookup_checks_level() {
        let catalog = Catalog::builtin();
        assert!(catalog.unit("nepal", Level::District, "kathmandu").is_some());
        assert!(catalog.unit("nepal", Level::Province, "kathmandu").is_none());
        assert!(catalog.unit("india", Level::District, "kathmandu").is_none());
    }

    #[test]
    fn path_walks_up_to_the_country() {
        let catalog = Catalog::builtin();
        let selection = catalog
            .path("nepal", Level::Municipality, "pokhara_municipality")
            .expect("known municipality");
        assert_eq!(selection.country, "nepal");
        assert_eq!(selection.province, "province4");
        assert_eq!(selection.district, "kaski");
        assert_eq!(selection.municipality, "pokhara_municipality");
        assert!(selection.ward.is_empty());
        assert!(catalog.path("nepal", Level::District, "nowhere").is_none());
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let catalog = Catalog::builtin();
        let hits = catalog.search("KATHMANDU");
        let ids: Vec<_> = hits.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec!["kathmandu", "kathmandu_municipality"]);
        assert_eq!(hits[1].selection.district, "kathmandu");
    }

    #[test]
    fn search_matches_local_names() {
        let catalog = Catalog::builtin();
        let hits = catalog.search("पोखरा");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "pokhara_municipality");
    }

    #[test]
    fn short_queries_return_nothing() {
        let catalog = Catalog::builtin();
        assert!(catalog.search("k").is_empty());
        assert!(catalog.search("  ").is_empty());
    }
}
