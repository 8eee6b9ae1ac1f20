use crate::color::{Color, PolygonStyle};
use crate::interaction::PolygonIndex;
use crate::types::BoundaryFeature;
use crate::view::{Frame, RenderedPolygon};
use anyhow::{bail, Context, Result};
use geo::bounding_rect::BoundingRect;
use geo::{coord, Coord, Rect};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject};
use image::RgbaImage;
use rayon::prelude::*;
use serde_json::json;
use std::f64::consts::PI;
use std::fs;
use std::path::Path;

/// Fraction of the viewport left empty around the fitted boundaries.
const PADDING: f64 = 0.05;

/// Polygons of `frame` as GeoJSON Features in paint order, each carrying its
/// statistic and the simplestyle properties of its current style.
pub fn feature_collection(frame: &Frame) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: frame
            .polygons
            .iter()
            .map(|polygon| styled_feature(frame.feature(polygon), polygon))
            .collect(),
        foreign_members: None,
    }
}

pub fn frame_document(frame: &Frame) -> FeatureCollection {
    let mut meta = JsonObject::new();
    meta.insert("phase".into(), json!(frame.phase));
    meta.insert("loading".into(), json!(frame.loading));
    meta.insert("generation".into(), json!(frame.generation));
    meta.insert("filters".into(), json!(frame.filters));
    meta.insert("center".into(), json!(frame.center));
    meta.insert("zoom".into(), json!(frame.zoom));
    meta.insert("boundary_error".into(), json!(frame.boundary_error));
    meta.insert("tooltip".into(), json!(frame.tooltip));
    meta.insert(
        "tooltip_text".into(),
        json!(frame.tooltip.as_ref().map(|t| t.to_string())),
    );

    let mut members = JsonObject::new();
    members.insert("map".into(), serde_json::Value::Object(meta));

    let mut collection = feature_collection(frame);
    collection.foreign_members = Some(members);
    collection
}

fn styled_feature(feature: &BoundaryFeature, polygon: &RenderedPolygon) -> Feature {
    let PolygonStyle {
        stroke,
        stroke_weight,
        fill,
        fill_opacity,
    } = polygon.style;

    let mut properties = JsonObject::new();
    properties.insert("pin_code".into(), json!(feature.postal_code));
    properties.insert("area_name".into(), json!(feature.area_name));
    properties.insert("count".into(), json!(polygon.stat.map(|s| s.listing_count)));
    properties.insert(
        "avg_price".into(),
        json!(polygon.stat.map(|s| s.average_price_per_area)),
    );
    properties.insert("fill".into(), json!(fill.to_string()));
    properties.insert("fill-opacity".into(), json!(round2(fill_opacity)));
    properties.insert("stroke".into(), json!(stroke.to_string()));
    properties.insert("stroke-width".into(), json!(round2(stroke_weight)));

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&feature.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn round2(v: f32) -> f64 {
    (f64::from(v) * 100.0).round() / 100.0
}

pub fn write_geojson(frame: &Frame, path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(&feature_collection(frame))
        .context("Failed to serialize frame as GeoJSON")?;
    fs::write(path, body).with_context(|| format!("Failed to write GeoJSON to {:?}", path))?;
    Ok(())
}

/// Lon/lat to Web-Mercator world coordinates, both axes in [0, 1].
fn project(lon: f64, lat: f64) -> (f64, f64) {
    let x = (lon + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + (1.0 / lat_rad.cos())).ln() / PI) / 2.0;
    (x, y)
}

fn unproject(x: f64, y: f64) -> Coord<f64> {
    coord! {
        x: x * 360.0 - 180.0,
        y: (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees(),
    }
}

/// Maps image pixels onto the Mercator plane, fitted around a set of boundaries.
#[derive(Debug, Clone, Copy)]
struct Viewport {
    origin: (f64, f64),
    scale: f64,
}

impl Viewport {
    fn fit(features: &[BoundaryFeature], width: u32, height: u32) -> Option<Self> {
        let bounds = features
            .iter()
            .filter_map(|f| f.geometry.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    coord! { x: a.min().x.min(b.min().x), y: a.min().y.min(b.min().y) },
                    coord! { x: a.max().x.max(b.max().x), y: a.max().y.max(b.max().y) },
                )
            })?;

        // North is up: the max latitude has the smallest y.
        let (min_x, min_y) = project(bounds.min().x, bounds.max().y);
        let (max_x, max_y) = project(bounds.max().x, bounds.min().y);
        let span_x = (max_x - min_x).max(f64::EPSILON);
        let span_y = (max_y - min_y).max(f64::EPSILON);

        let usable = 1.0 - 2.0 * PADDING;
        let scale = (width as f64 * usable / span_x).min(height as f64 * usable / span_y);
        let center = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
        Some(Self {
            origin: (
                center.0 - width as f64 / 2.0 / scale,
                center.1 - height as f64 / 2.0 / scale,
            ),
            scale,
        })
    }

    fn lon_lat(&self, col: u32, row: u32) -> Coord<f64> {
        unproject(
            self.origin.0 + (col as f64 + 0.5) / self.scale,
            self.origin.1 + (row as f64 + 0.5) / self.scale,
        )
    }

    #[cfg(test)]
    fn pixel(&self, lon: f64, lat: f64) -> (u32, u32) {
        let (x, y) = project(lon, lat);
        (
            ((x - self.origin.0) * self.scale) as u32,
            ((y - self.origin.1) * self.scale) as u32,
        )
    }
}

/// Paints the frame's fills over a white background, fitted to its boundaries.
pub fn rasterize(frame: &Frame, width: u32, height: u32) -> Result<RgbaImage> {
    if width == 0 || height == 0 {
        bail!("Image size must be non-zero, got {}x{}", width, height);
    }
    let row_len = width as usize * 4;
    let mut pixels = vec![255u8; row_len * height as usize];

    if let Some(viewport) = Viewport::fit(&frame.features, width, height) {
        let index = PolygonIndex::build(&frame.features);
        let mut paint_position = vec![None; frame.features.len()];
        for (position, polygon) in frame.polygons.iter().enumerate() {
            paint_position[polygon.index] = Some(position);
        }

        pixels.par_chunks_mut(row_len).enumerate().for_each(|(row, line)| {
            for (col, pixel) in line.chunks_exact_mut(4).enumerate() {
                let at = viewport.lon_lat(col as u32, row as u32);
                let top = index
                    .containing(&frame.features, at)
                    .filter_map(|i| paint_position[i])
                    .max();
                if let Some(position) = top {
                    let style = frame.polygons[position].style;
                    blend_over_white(pixel, style.fill, style.fill_opacity);
                }
            }
        });
    }

    RgbaImage::from_raw(width, height, pixels).context("Pixel buffer does not match image size")
}

fn blend_over_white(pixel: &mut [u8], color: Color, opacity: f32) {
    let alpha = f64::from(opacity.clamp(0.0, 1.0));
    for (channel, value) in pixel.iter_mut().zip(color.0) {
        *channel = (value as f64 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
    }
}

pub fn write_png(frame: &Frame, width: u32, height: u32, path: &Path) -> Result<()> {
    let image = rasterize(frame, width, height)?;
    image
        .save(path)
        .with_context(|| format!("Failed to save PNG to {:?}", path))?;
    Ok(())
}
