//! Boundary files: where they live and how they are parsed.

use crate::datasets::Catalog;
use crate::types::{Bounds, Level, Selection};
use anyhow::{anyhow, bail, Context, Result};
use geo::{BoundingRect, MultiPolygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject};
use std::path::{Path, PathBuf};

/// One polygonal feature of a boundary file.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub id: String,
    pub properties: JsonObject,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
pub struct BoundaryLayer {
    pub features: Vec<BoundaryFeature>,
    pub bounds: Bounds,
}

impl BoundaryLayer {
    /// Back to GeoJSON for the map source, with ids promoted so feature state works.
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|feature| Feature {
                bbox: None,
                geometry: Some(Geometry::new(geojson::Value::from(&feature.geometry))),
                id: Some(geojson::feature::Id::String(feature.id.clone())),
                properties: Some(feature.properties.clone()),
                foreign_members: None,
            })
            .collect();
        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Boundary files on disk, rooted at the configured directory.
#[derive(Debug, Clone)]
pub struct BoundaryStore {
    root: PathBuf,
}

impl BoundaryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BoundaryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn fetch(&self, relative: &Path) -> Result<BoundaryLayer> {
        let path = self.root.join(relative);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read boundary file: {:?}", path))?;
        parse_boundary(&content).with_context(|| format!("Failed to parse boundary file: {:?}", path))
    }
}

/// Lowercases, turns whitespace runs into `-` and drops anything else that is
/// not `[a-z0-9_-]`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            pending_dash = true;
            continue;
        }
        let c = c.to_ascii_lowercase();
        if !(c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            continue;
        }
        if pending_dash && !out.is_empty() {
            out.push('-');
        }
        pending_dash = false;
        out.push(c);
    }
    out
}

/// Relative path of the boundary file for `level` of `selection`.
///
/// Countries use the catalog's file name; units live under
/// `<country>/<level>/<unit name>.geojson`.
pub fn boundary_path(catalog: &Catalog, level: Level, selection: &Selection) -> PathBuf {
    let country = selection.country.as_str();
    if level == Level::Country {
        return match catalog.country(country) {
            Some(known) => PathBuf::from(known.boundary_file),
            None => PathBuf::from(format!("{}.geojson", slug(country))),
        };
    }

    let id = selection.get(level);
    let name = catalog
        .unit(country, level, id)
        .map(|unit| unit.name)
        .unwrap_or(id);
    PathBuf::from(slug(country))
        .join(level.as_param())
        .join(format!("{}.geojson", slug(name)))
}

pub fn parse_boundary(content: &str) -> Result<BoundaryLayer> {
    let geojson: GeoJson = content.parse().context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => bail!("Boundary GeoJSON must be a FeatureCollection"),
    };

    let mut features = Vec::new();
    let mut bounds: Option<Bounds> = None;

    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = feature_id(&feature).unwrap_or_else(|| format!("feature-{}", index));

        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // Skip points/lines
                }
            }
            None => continue,
        };

        let Some(rect) = geometry.bounding_rect() else {
            continue;
        };
        let rect = Bounds::from(rect);
        bounds = Some(match bounds {
            Some(acc) => acc.union(rect),
            None => rect,
        });

        // The browser promotes `properties.id` to the feature id.
        let mut properties = feature.properties.unwrap_or_default();
        properties
            .entry("id")
            .or_insert_with(|| serde_json::Value::String(id.clone()));

        features.push(BoundaryFeature {
            id,
            properties,
            geometry,
        });
    }

    let bounds = bounds.ok_or_else(|| anyhow!("Boundary file has no polygon features"))?;
    Ok(BoundaryLayer { features, bounds })
}

fn feature_id(feature: &Feature) -> Option<String> {
    let from_props = feature.properties.as_ref().and_then(|props| props.get("id"));
    match from_props {
        Some(serde_json::Value::String(s)) => return Some(s.clone()),
        Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
        _ => {}
    }
    match &feature.id {
        Some(geojson::feature::Id::String(s)) => Some(s.clone()),
        Some(geojson::feature::Id::Number(n)) => Some(n.to_string()),
        None => None,
    }
}
