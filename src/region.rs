//! Region of interest
//!
//! A [`Region`] is a lon/lat `MultiPolygon`. It is validated when built, so
//! a degenerate or empty region never reaches the grouping or reduction stages.

use crate::errors::{ClimNormError, Result};
use crate::snapshot::GridExtent;
use geo::{coord, Area, BooleanOps, BoundingRect, Contains, Geometry, Intersects, MultiPolygon, Point, Polygon, Rect};
use geojson::GeoJson;
use serde_json::Value as JsonValue;
use std::path::Path;

/// Area of interest made of one or more polygons
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    shape: MultiPolygon<f64>,
    bbox: Rect<f64>,
}

impl Region {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Result<Self> {
        for polygon in &polygons {
            validate(polygon)?;
        }
        let shape = MultiPolygon::new(polygons);
        let bbox = shape.bounding_rect().ok_or_else(|| ClimNormError::InvalidRange {
            message: "region has no polygons".to_string(),
        })?;
        Ok(Self { shape, bbox })
    }

    /// Axis-aligned rectangle, handy for whole-grid regions
    pub fn rectangle(west: f64, south: f64, east: f64, north: f64) -> Result<Self> {
        Self::new(vec![rect(west, south, east, north).to_polygon()])
    }

    /// Region covering exactly the footprint of a grid
    pub fn from_extent(extent: &GridExtent) -> Result<Self> {
        let (west, south, east, north) = extent.bounds();
        Self::rectangle(west, south, east, north)
    }

    /// Polygons of a `Polygon`, `MultiPolygon`, `Feature`, `FeatureCollection`
    /// or `GeometryCollection`
    pub fn from_geojson(geojson: &GeoJson) -> Result<Self> {
        let collection = geojson::quick_collection(geojson)?;
        let mut polygons = Vec::new();
        for geometry in collection {
            collect_polygons(geometry, &mut polygons)?;
        }
        Self::new(polygons)
    }

    pub fn from_geojson_value(value: &JsonValue) -> Result<Self> {
        Self::from_geojson(&GeoJson::from_json_value(value.clone())?)
    }

    pub fn from_geojson_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson(&text.parse::<GeoJson>()?)
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.shape.0
    }

    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.shape.contains(&Point::new(lon, lat))
    }

    /// Bounding box as `(west, south, east, north)`
    #[must_use]
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        let (min, max) = (self.bbox.min(), self.bbox.max());
        (min.x, min.y, max.x, max.y)
    }

    /// Planar area in square degrees
    #[must_use]
    pub fn area(&self) -> f64 {
        self.shape.unsigned_area()
    }

    /// Whether the grid footprint overlaps the region
    #[must_use]
    pub fn intersects(&self, extent: &GridExtent) -> bool {
        let (west, south, east, north) = extent.bounds();
        self.shape.intersects(&rect(west, south, east, north))
    }

    /// Area in square degrees shared by the region and a lon/lat box
    #[must_use]
    pub fn overlap_area(&self, west: f64, south: f64, east: f64, north: f64) -> f64 {
        let cell = rect(west, south, east, north);
        if !self.bbox.intersects(&cell) {
            return 0.0;
        }
        let cell = MultiPolygon::new(vec![cell.to_polygon()]);
        self.shape.intersection(&cell).unsigned_area()
    }
}

fn rect(west: f64, south: f64, east: f64, north: f64) -> Rect<f64> {
    Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north })
}

fn validate(polygon: &Polygon<f64>) -> Result<()> {
    let mut coords = polygon
        .exterior()
        .coords()
        .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()));
    if coords.any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(ClimNormError::InvalidRange {
            message: "polygon has non-finite coordinates".to_string(),
        });
    }
    // Closed rings repeat their first vertex
    let vertices = polygon.exterior().0.len().saturating_sub(1);
    if vertices < 3 {
        return Err(ClimNormError::InvalidRange {
            message: format!("exterior ring needs at least 3 distinct vertices, got {vertices}"),
        });
    }
    if polygon.unsigned_area() <= f64::EPSILON {
        return Err(ClimNormError::InvalidRange {
            message: "polygon has zero area".to_string(),
        });
    }
    Ok(())
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match geometry {
        Geometry::Polygon(polygon) => out.push(polygon),
        Geometry::MultiPolygon(multi) => out.extend(multi),
        Geometry::GeometryCollection(collection) => {
            for inner in collection {
                collect_polygons(inner, out)?;
            }
        }
        other => {
            return Err(ClimNormError::Generic(format!(
                "Unsupported GeoJSON geometry {other:?}; regions must be polygonal"
            )))
        }
    }
    Ok(())
}
