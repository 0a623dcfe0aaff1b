//! Cascading country → province → district → municipality → ward selector.

use crate::datasets::Catalog;
use crate::types::{FilterOption, Level, MapFilter, Selection};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;

/// Dropdown contents for every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptionLists {
    pub countries: Vec<FilterOption>,
    pub provinces: Vec<FilterOption>,
    pub districts: Vec<FilterOption>,
    pub municipalities: Vec<FilterOption>,
    pub wards: Vec<FilterOption>,
}

impl OptionLists {
    pub fn get(&self, level: Level) -> &[FilterOption] {
        match level {
            Level::Country => &self.countries,
            Level::Province => &self.provinces,
            Level::District => &self.districts,
            Level::Municipality => &self.municipalities,
            Level::Ward => &self.wards,
        }
    }

    fn slot(&mut self, level: Level) -> &mut Vec<FilterOption> {
        match level {
            Level::Country => &mut self.countries,
            Level::Province => &mut self.provinces,
            Level::District => &mut self.districts,
            Level::Municipality => &mut self.municipalities,
            Level::Ward => &mut self.wards,
        }
    }

    fn clear_below(&mut self, level: Level) {
        for below in level.descendants() {
            self.slot(below).clear();
        }
    }
}

pub struct FilterPanel {
    catalog: Arc<Catalog>,
    selection: Selection,
    options: OptionLists,
    tx: broadcast::Sender<MapFilter>,
}

impl FilterPanel {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let (tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        let options = OptionLists {
            countries: catalog.country_options(),
            ..OptionLists::default()
        };
        FilterPanel {
            catalog,
            selection: Selection::default(),
            options,
            tx,
        }
    }

    /// Builds a panel already replaying `selection`, without any listener attached.
    pub fn from_selection(catalog: Arc<Catalog>, selection: &Selection) -> Self {
        let mut panel = FilterPanel::new(catalog);
        panel.apply(selection);
        panel
    }

    /// Receives one snapshot per mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<MapFilter> {
        self.tx.subscribe()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn options(&self) -> &OptionLists {
        &self.options
    }

    pub fn options_for(&self, level: Level) -> &[FilterOption] {
        self.options.get(level)
    }

    pub fn snapshot(&self) -> MapFilter {
        MapFilter::from(&self.selection)
    }

    pub fn select_country(&mut self, id: &str) -> MapFilter {
        self.select(Level::Country, id)
    }

    pub fn select_province(&mut self, id: &str) -> MapFilter {
        self.select(Level::Province, id)
    }

    pub fn select_district(&mut self, id: &str) -> MapFilter {
        self.select(Level::District, id)
    }

    pub fn select_municipality(&mut self, id: &str) -> MapFilter {
        self.select(Level::Municipality, id)
    }

    pub fn select_ward(&mut self, id: &str) -> MapFilter {
        self.select(Level::Ward, id)
    }

    /// Sets one level, clearing every level below it along with their lists.
    /// An empty `id` clears the level.
    pub fn select(&mut self, level: Level, id: &str) -> MapFilter {
        self.set_level(level, id);
        self.emit()
    }

    /// Replays a whole selection from the top, stopping at the first level
    /// that is empty or does not belong under its parent. Emits once.
    pub fn apply(&mut self, selection: &Selection) -> MapFilter {
        self.clear_all();
        for level in Level::ALL {
            let value = selection.get(level);
            if value.is_empty() {
                break;
            }
            self.set_level(level, value);
            if self.selection.get(level).is_empty() {
                break;
            }
        }
        self.emit()
    }

    pub fn reset(&mut self) -> MapFilter {
        self.clear_all();
        self.emit()
    }

    fn clear_all(&mut self) {
        self.selection = Selection::default();
        self.options.clear_below(Level::Country);
    }

    fn set_level(&mut self, level: Level, id: &str) {
        self.selection.set(level, id);
        self.options.clear_below(level);

        if id.is_empty() {
            return;
        }

        if let Some(parent) = level.parent() {
            if self.selection.get(parent).is_empty() {
                warn!(%level, id, "ignoring selection without a selected {}", parent);
                self.selection.clear(level);
                return;
            }
        }

        let country = self.selection.country.clone();
        if level == Level::Country {
            if self.catalog.country(id).is_none() {
                warn!(country = id, "no dataset for country; province list left empty");
                return;
            }
        } else {
            let parent_id = level
                .parent()
                .map(|parent| self.selection.get(parent))
                .unwrap_or_default();
            let belongs = self
                .catalog
                .unit(&country, level, id)
                .is_some_and(|unit| unit.parent == parent_id);
            if !belongs {
                warn!(%level, id, parent = parent_id, "unknown {} under selected parent", level);
                self.selection.clear(level);
                return;
            }
        }

        if let Some(child) = level.child() {
            *self.options.slot(child) = self.catalog.child_options(&country, level, id);
        }
    }

    fn emit(&self) -> MapFilter {
        let snapshot = self.snapshot();
        debug!(?snapshot, "filter changed");
        // No listeners is fine; the snapshot is also returned to the caller.
        let _ = self.tx.send(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    fn panel() -> FilterPanel {
        FilterPanel::new(Arc::new(Catalog::builtin()))
    }

    fn values(options: &[FilterOption]) -> Vec<&str> {
        options.iter().map(|option| option.value.as_str()).collect()
    }

    fn drilled_to_municipality() -> FilterPanel {
        let mut panel = panel();
        panel.select_country("nepal");
        panel.select_province("province3");
        panel.select_district("kathmandu");
        panel.select_municipality("kathmandu_municipality");
        panel
    }

    #[test]
    fn starts_with_countries_only() {
        let panel = panel();
        assert_eq!(values(panel.options_for(Level::Country)), vec!["nepal", "india"]);
        assert!(panel.options_for(Level::Province).is_empty());
        assert!(panel.selection().is_empty());
    }

    #[test]
    fn selecting_bagmati_lists_its_districts_only() {
        let mut panel = panel();
        panel.select_country("nepal");
        assert_eq!(panel.options_for(Level::Province).len(), 7);

        panel.select_province("province3");
        assert_eq!(
            values(panel.options_for(Level::District)),
            vec!["kathmandu", "bhaktapur"]
        );
        assert!(panel.options_for(Level::Municipality).is_empty());
    }

    #[test]
    fn clearing_province_resets_everything_below() {
        let mut panel = panel();
        panel.select_country("nepal");
        panel.select_province("province3");
        panel.select_district("kathmandu");

        let snapshot = panel.select_province("");

        assert_eq!(snapshot.country, "nepal");
        assert!(snapshot.province.is_empty());
        assert!(snapshot.district.is_empty());
        assert!(snapshot.municipality.is_empty());
        assert!(snapshot.ward.is_empty());
        assert!(panel.options_for(Level::District).is_empty());
        assert!(panel.options_for(Level::Municipality).is_empty());
        assert_eq!(panel.options_for(Level::Province).len(), 7);
    }

    #[test]
    fn clearing_any_level_clears_levels_below_and_their_lists() {
        for level in Level::ALL {
            let mut panel = drilled_to_municipality();
            panel.select(level, "");
            for below in level.descendants() {
                assert!(panel.selection().get(below).is_empty(), "{below} after {level}");
                assert!(panel.options_for(below).is_empty(), "{below} list after {level}");
            }
            assert!(panel.selection().get(level).is_empty());
        }
    }

    #[test]
    fn changing_district_repopulates_municipalities() {
        let mut panel = drilled_to_municipality();
        panel.select_district("bhaktapur");
        assert!(panel.selection().municipality.is_empty());
        assert_eq!(
            values(panel.options_for(Level::Municipality)),
            vec!["bhaktapur_municipality", "madhyapur_municipality"]
        );
    }

    #[test]
    fn country_without_data_emits_empty_snapshot() {
        let mut panel = panel();
        let mut rx = panel.subscribe();
        panel.select_country("nepal");
        panel.select_province("province1");

        let snapshot = panel.select_country("india");

        assert_eq!(snapshot.country, "india");
        assert!(snapshot.province.is_empty());
        assert!(snapshot.district.is_empty());
        assert!(panel.options_for(Level::Province).is_empty());
        assert_eq!(rx.try_recv().expect("nepal").country, "nepal");
        assert_eq!(rx.try_recv().expect("province").province, "province1");
        assert_eq!(rx.try_recv().expect("india"), snapshot);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn unknown_unit_is_rejected_but_still_emits() {
        let mut panel = panel();
        panel.select_country("nepal");
        let mut rx = panel.subscribe();

        // kaski belongs to Gandaki, not Bagmati
        panel.select_province("province3");
        let snapshot = panel.select_district("kaski");

        assert!(snapshot.district.is_empty());
        assert_eq!(snapshot.province, "province3");
        assert_eq!(rx.try_recv().expect("province").province, "province3");
        assert_eq!(rx.try_recv().expect("district"), snapshot);
    }

    #[test]
    fn selecting_below_an_empty_parent_is_ignored() {
        let mut panel = panel();
        let snapshot = panel.select_district("kathmandu");
        assert!(snapshot.district.is_empty());
    }

    #[test]
    fn apply_stops_at_first_broken_link() {
        let mut panel = panel();
        let mut rx = panel.subscribe();
        let selection = Selection {
            country: "nepal".into(),
            province: "province4".into(),
            district: "kathmandu".into(),
            municipality: "kathmandu_municipality".into(),
            ward: String::new(),
        };

        let snapshot = panel.apply(&selection);

        assert_eq!(snapshot.province, "province4");
        assert!(snapshot.district.is_empty());
        assert!(snapshot.municipality.is_empty());
        assert_eq!(values(panel.options_for(Level::District)), vec!["kaski", "lamjung"]);
        assert_eq!(rx.try_recv().expect("one snapshot"), snapshot);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn reset_keeps_country_list() {
        let mut panel = drilled_to_municipality();
        let snapshot = panel.reset();
        assert_eq!(snapshot, MapFilter::default());
        assert_eq!(panel.options_for(Level::Country).len(), 2);
        assert!(panel.options_for(Level::Province).is_empty());
    }

    #[test]
    fn municipality_without_wards_has_empty_ward_list() {
        let panel = drilled_to_municipality();
        assert!(panel.options_for(Level::Ward).is_empty());
        assert_eq!(panel.selection().municipality, "kathmandu_municipality");
    }
}
