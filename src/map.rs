//! Map state driven by the filter.
//!
//! [`MapView`] mirrors what the browser's map library holds: sources, layers,
//! event handlers and the camera. [`MapService`] owns it and swaps the boundary
//! layers whenever the filter moves to another unit. Loading is split in two
//! steps, [`MapService::plan`] and [`MapService::complete`], so a fetch can run
//! between them; each plan hands out a ticket and only the newest ticket may
//! complete.

use crate::config::MapConfig;
use crate::data::{boundary_path, BoundaryFeature, BoundaryLayer, BoundaryStore};
use crate::datasets::Catalog;
use crate::types::{Bounds, Level, LngLat, MapFilter, Selection};
use crate::viewport::{fit_bounds, Camera};
use anyhow::Result;
use geo::{BoundingRect, Contains, Point};
use geojson::{FeatureCollection, JsonObject};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The unit whose boundary is on the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub country: String,
    pub level: Level,
    pub id: String,
}

impl Scope {
    fn layer_id(&self, suffix: &str) -> String {
        format!("{}-{}", self.level, suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
    Line,
    Symbol,
}

#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    pub paint: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
    pub id: String,
    pub data: FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MapEvent {
    Click,
    Hover,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub event: MapEvent,
    pub layer: String,
}

/// What a click on a boundary shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Popup {
    pub at: LngLat,
    pub id: String,
    pub name: String,
    pub local_name: Option<String>,
    pub population: Option<u64>,
    pub area_km2: Option<f64>,
}

// Wrapper for RTree indexing
struct FeatureIndex {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for FeatureIndex {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

#[derive(Serialize)]
pub struct MapView {
    pub style: String,
    pub camera: Camera,
    pub bounds: Option<Bounds>,
    pub scope: Option<Scope>,
    pub sources: Vec<Source>,
    pub layers: Vec<Layer>,
    pub handlers: Vec<Handler>,
    pub hovered: Option<String>,
    pub cursor: &'static str,
    #[serde(skip)]
    features: Vec<BoundaryFeature>,
    #[serde(skip)]
    tree: RTree<FeatureIndex>,
}

impl MapView {
    fn new(config: &MapConfig) -> Self {
        MapView {
            style: config.style_url.clone(),
            camera: Camera {
                center: config.default_center(),
                zoom: config.zoom,
            },
            bounds: None,
            scope: None,
            sources: Vec::new(),
            layers: Vec::new(),
            handlers: Vec::new(),
            hovered: None,
            cursor: "",
            features: Vec::new(),
            tree: RTree::new(),
        }
    }

    pub fn layer(&self, id: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn source(&self, id: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.id == id)
    }

    fn has_handler(&self, event: MapEvent) -> bool {
        self.handlers.iter().any(|handler| handler.event == event)
    }

    fn clear_boundaries(&mut self) {
        self.layers.clear();
        self.sources.clear();
        self.handlers.clear();
        self.features.clear();
        self.tree = RTree::new();
        self.scope = None;
        self.bounds = None;
        self.hovered = None;
        self.cursor = "";
    }

    fn install(&mut self, scope: Scope, layer: BoundaryLayer, camera: Camera) {
        self.clear_boundaries();

        let source_id = scope.layer_id("source");
        let fill_id = scope.layer_id("fill");
        self.sources.push(Source {
            id: source_id.clone(),
            data: layer.to_feature_collection(),
        });
        self.layers.push(Layer {
            id: fill_id.clone(),
            kind: LayerKind::Fill,
            source: source_id.clone(),
            paint: json!({
                "fill-color": [
                    "case",
                    ["boolean", ["feature-state", "hover"], false],
                    "#3b82f6",
                    "#60a5fa"
                ],
                "fill-opacity": 0.6
            }),
            layout: None,
        });
        self.layers.push(Layer {
            id: scope.layer_id("stroke"),
            kind: LayerKind::Line,
            source: source_id.clone(),
            paint: json!({ "line-color": "#1e40af", "line-width": 2 }),
            layout: None,
        });
        self.layers.push(Layer {
            id: scope.layer_id("labels"),
            kind: LayerKind::Symbol,
            source: source_id,
            paint: json!({
                "text-color": "#1e40af",
                "text-halo-color": "#ffffff",
                "text-halo-width": 2
            }),
            layout: Some(json!({
                "text-field": ["get", "name"],
                "text-font": ["Open Sans Regular", "Arial Unicode MS Regular"],
                "text-size": 12,
                "text-anchor": "center"
            })),
        });
        for event in [MapEvent::Click, MapEvent::Hover] {
            self.handlers.push(Handler {
                event,
                layer: fill_id.clone(),
            });
        }

        let items = layer
            .features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                Some(FeatureIndex {
                    index,
                    aabb: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();
        self.tree = RTree::bulk_load(items);
        self.features = layer.features;
        self.bounds = Some(layer.bounds);
        self.camera = camera;
        self.scope = Some(scope);
    }

    fn feature_at(&self, at: LngLat) -> Option<&BoundaryFeature> {
        let point = Point::new(at.lng, at.lat);
        let envelope = AABB::from_point([at.lng, at.lat]);
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|candidate| self.features.get(candidate.index))
            .find(|feature| feature.geometry.contains(&point))
    }
}

/// A boundary fetch the caller should perform, then hand back to
/// [`MapService::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: u64,
    pub scope: Scope,
    pub path: PathBuf,
}

pub struct MapService {
    config: MapConfig,
    catalog: Arc<Catalog>,
    view: Option<MapView>,
    applied: Option<MapFilter>,
    next_ticket: u64,
    latest: Option<(u64, Scope)>,
}

impl MapService {
    pub fn new(config: MapConfig, catalog: Arc<Catalog>) -> Self {
        MapService {
            config,
            catalog,
            view: None,
            applied: None,
            next_ticket: 0,
            latest: None,
        }
    }

    /// The map, built at the default viewport on first use.
    pub fn map(&mut self) -> &mut MapView {
        self.view.get_or_insert_with(|| {
            info!("creating map at default viewport");
            MapView::new(&self.config)
        })
    }

    pub fn view(&self) -> Option<&MapView> {
        self.view.as_ref()
    }

    /// Works out which boundary `filter` needs. `None` when the map already
    /// shows (or is loading) that boundary, or when nothing is selected.
    pub fn plan(&mut self, filter: &MapFilter) -> Option<LoadRequest> {
        self.map();
        if self.applied.as_ref() == Some(filter) {
            return None;
        }
        self.applied = Some(filter.clone());

        let selection = filter.selection();
        let Some((deepest, _)) = selection.deepest() else {
            self.reset_view();
            return None;
        };
        // Wards have no boundary files of their own.
        let level = deepest.min(Level::Municipality);
        let scope = Scope {
            country: selection.country.clone(),
            level,
            id: selection.get(level).to_string(),
        };

        if self.latest.as_ref().map(|(_, latest)| latest) == Some(&scope) {
            return None;
        }

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        self.latest = Some((ticket, scope.clone()));
        let path = boundary_path(&self.catalog, level, &selection);
        debug!(ticket, ?scope, ?path, "boundary load planned");
        Some(LoadRequest {
            ticket,
            scope,
            path,
        })
    }

    /// Applies a finished fetch. Returns whether the map changed.
    ///
    /// Failures and superseded requests leave the current layers untouched.
    pub fn complete(&mut self, request: LoadRequest, result: Result<BoundaryLayer>) -> bool {
        let is_latest = self
            .latest
            .as_ref()
            .is_some_and(|(ticket, _)| *ticket == request.ticket);
        if !is_latest {
            debug!(ticket = request.ticket, "discarding superseded boundary load");
            return false;
        }

        let mut layer = match result {
            Ok(layer) => layer,
            Err(e) => {
                warn!(path = ?request.path, "boundary load failed, keeping previous layers: {:#}", e);
                return false;
            }
        };

        for feature in &mut layer.features {
            enrich_properties(&self.catalog, &request.scope.country, feature);
        }

        let camera = self.camera_for(&request.scope, layer.bounds);
        info!(scope = ?request.scope, features = layer.features.len(), "boundary loaded");
        self.map().install(request.scope, layer, camera);
        true
    }

    /// Plans, fetches and completes in one go.
    pub async fn apply(&mut self, filter: &MapFilter, store: &BoundaryStore) -> bool {
        let Some(request) = self.plan(filter) else {
            return false;
        };
        let result = store.fetch(&request.path).await;
        self.complete(request, result)
    }

    /// Loads every level of `filter` from the country down. A level whose
    /// boundary cannot be loaded leaves the nearest loaded ancestor on the map.
    pub async fn follow(&mut self, filter: &MapFilter, store: &BoundaryStore) -> bool {
        let selection = filter.selection();
        if selection.is_empty() {
            return self.apply(filter, store).await;
        }

        let mut chain = Selection::default();
        let mut changed = false;
        for level in Level::ALL {
            let id = selection.get(level);
            if id.is_empty() {
                break;
            }
            chain.set_raw(level, id);
            changed |= self.apply(&MapFilter::from(&chain), store).await;
        }
        changed
    }

    /// Back to the default viewport with no boundaries.
    pub fn reset(&mut self) {
        self.applied = None;
        self.reset_view();
    }

    fn reset_view(&mut self) {
        self.latest = None;
        let camera = Camera {
            center: self.config.default_center(),
            zoom: self.config.zoom,
        };
        let view = self.map();
        view.clear_boundaries();
        view.camera = camera;
    }

    fn camera_for(&self, scope: &Scope, bounds: Bounds) -> Camera {
        if scope.level == Level::Country {
            if let Some(known) = self.catalog.country(&scope.country) {
                return Camera {
                    center: known.center,
                    zoom: known.zoom,
                };
            }
        }
        fit_bounds(
            bounds,
            self.config.viewport,
            self.config.fit_padding,
            self.config.max_zoom,
        )
    }

    /// Popup for a click, if a boundary with a click handler is under `at`.
    pub fn click(&self, at: LngLat) -> Option<Popup> {
        let view = self.view.as_ref()?;
        if !view.has_handler(MapEvent::Click) {
            return None;
        }
        let feature = view.feature_at(at)?;
        Some(popup_for(at, feature))
    }

    /// Tracks the hovered feature; returns its id.
    pub fn hover(&mut self, at: LngLat) -> Option<String> {
        let view = self.view.as_mut()?;
        if !view.has_handler(MapEvent::Hover) {
            return None;
        }
        let hovered = view.feature_at(at).map(|feature| feature.id.clone());
        view.cursor = if hovered.is_some() { "pointer" } else { "" };
        view.hovered = hovered.clone();
        hovered
    }
}

fn popup_for(at: LngLat, feature: &BoundaryFeature) -> Popup {
    let props = &feature.properties;
    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    Popup {
        at,
        id: feature.id.clone(),
        name: text("name").unwrap_or_else(|| "Unknown".to_string()),
        local_name: text("nameLocal"),
        population: props.get("population").and_then(Value::as_u64),
        area_km2: props.get("area").and_then(Value::as_f64),
    }
}

/// Fills name, local name, population and area from the catalog when the
/// boundary file leaves them out.
fn enrich_properties(catalog: &Catalog, country: &str, feature: &mut BoundaryFeature) {
    let facts = if let Some(unit) = catalog.find_unit(country, &feature.id) {
        (unit.name, unit.local_name, unit.population, unit.area_km2)
    } else if let Some(known) = catalog.country(&feature.id) {
        (known.name, Some(known.local_name), known.population, known.area_km2)
    } else {
        return;
    };
    let (name, local_name, population, area) = facts;

    let props: &mut JsonObject = &mut feature.properties;
    props.entry("name").or_insert_with(|| json!(name));
    if let Some(local_name) = local_name {
        props.entry("nameLocal").or_insert_with(|| json!(local_name));
    }
    props.entry("population").or_insert_with(|| json!(population));
    props.entry("area").or_insert_with(|| json!(area));
}
