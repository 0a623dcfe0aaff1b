//! Web Mercator camera math.

use crate::types::{Bounds, LngLat};
use serde::Serialize;
use std::f64::consts::PI;

// World size in pixels at zoom 0, as used by vector-tile map libraries.
const TILE_SIZE: f64 = 512.0;
const MAX_LATITUDE: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Camera {
    pub center: LngLat,
    pub zoom: f64,
}

/// Projects to world coordinates in `[0, 1]`, y growing southwards.
pub fn project(point: LngLat) -> (f64, f64) {
    let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = (point.lng + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> LngLat {
    let lng = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}

/// Largest zoom (capped at `max_zoom`) at which `bounds` fits a `width` x
/// `height` viewport with `padding` pixels on every side.
pub fn fit_bounds(bounds: Bounds, size: [u32; 2], padding: f64, max_zoom: f64) -> Camera {
    let (x0, y0) = project(bounds.min);
    let (x1, y1) = project(bounds.max);
    let center = unproject((x0 + x1) / 2.0, (y0 + y1) / 2.0);

    let span_x = (x1 - x0).abs() * TILE_SIZE;
    let span_y = (y1 - y0).abs() * TILE_SIZE;
    let avail_x = (f64::from(size[0]) - 2.0 * padding).max(1.0);
    let avail_y = (f64::from(size[1]) - 2.0 * padding).max(1.0);

    let zoom_for = |span: f64, avail: f64| {
        if span > 0.0 {
            (avail / span).log2()
        } else {
            f64::INFINITY
        }
    };
    let zoom = zoom_for(span_x, avail_x)
        .min(zoom_for(span_y, avail_y))
        .min(max_zoom)
        .max(0.0);

    Camera { center, zoom }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nepal_box() -> Bounds {
        Bounds {
            min: LngLat::new(80.0, 26.0),
            max: LngLat::new(88.5, 30.5),
        }
    }

    #[test]
    fn project_and_unproject_agree() {
        let point = LngLat::new(85.324, 27.7172);
        let (x, y) = project(point);
        let back = unproject(x, y);
        assert!((back.lng - point.lng).abs() < 1e-9);
        assert!((back.lat - point.lat).abs() < 1e-9);
    }

    #[test]
    fn origin_projects_to_world_center() {
        let (x, y) = project(LngLat::new(0.0, 0.0));
        assert!((x - 0.5).abs() < 1e-12);
        assert!((y - 0.5).abs() < 1e-12);
    }

    #[test]
    fn nepal_fits_around_zoom_six() {
        let camera = fit_bounds(nepal_box(), [1280, 800], 40.0, 14.0);
        assert!(camera.zoom > 6.0 && camera.zoom < 7.0, "zoom {}", camera.zoom);
        assert!((camera.center.lng - 84.25).abs() < 1e-9);
        assert!(camera.center.lat > 28.0 && camera.center.lat < 28.5);
    }

    #[test]
    fn smaller_viewport_zooms_out() {
        let wide = fit_bounds(nepal_box(), [1280, 800], 40.0, 14.0);
        let narrow = fit_bounds(nepal_box(), [640, 400], 40.0, 14.0);
        assert!(narrow.zoom < wide.zoom);
    }

    #[test]
    fn degenerate_bounds_use_max_zoom() {
        let point = LngLat::new(85.3, 27.7);
        let camera = fit_bounds(Bounds { min: point, max: point }, [800, 600], 20.0, 12.0);
        assert_eq!(camera.zoom, 12.0);
        assert!((camera.center.lng - 85.3).abs() < 1e-9);
    }
}
