use crate::color::{highlight, style_for, PolygonStyle};
use crate::types::{BoundaryFeature, StatsSnapshot};
use geo::algorithm::contains::Contains;
use geo::bounding_rect::BoundingRect;
use geo::{Coord, Point};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use std::fmt;

struct PolygonBox {
    index: usize,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for PolygonBox {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

/// Bounding-box R-tree over one boundary set, for pointer hit testing.
pub struct PolygonIndex {
    tree: RTree<PolygonBox>,
}

impl PolygonIndex {
    pub fn build(features: &[BoundaryFeature]) -> Self {
        let boxes = features
            .iter()
            .enumerate()
            .filter_map(|(index, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                Some(PolygonBox {
                    index,
                    aabb: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
                })
            })
            .collect();
        Self {
            tree: RTree::bulk_load(boxes),
        }
    }

    pub fn containing<'a>(
        &'a self,
        features: &'a [BoundaryFeature],
        at: Coord<f64>,
    ) -> impl Iterator<Item = usize> + 'a {
        let point = Point::from(at);
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([at.x, at.y]))
            .map(|candidate| candidate.index)
            .filter(move |&i| features.get(i).is_some_and(|f| f.geometry.contains(&point)))
    }
}

/// Content of the sticky tooltip shown over the hovered polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub area_name: String,
    pub postal_code: String,
    pub listing_count: u64,
    pub average_price_per_area: Option<f64>,
    /// Follows the cursor: [lon, lat].
    pub anchor: [f64; 2],
}

impl Tooltip {
    pub fn build(feature: &BoundaryFeature, stats: &StatsSnapshot, anchor: Coord<f64>) -> Self {
        let stat = stats.get(&feature.postal_code);
        let listing_count = stat.map(|s| s.listing_count).unwrap_or(0);
        Self {
            area_name: feature.area_name.clone(),
            postal_code: feature.postal_code.clone(),
            listing_count,
            average_price_per_area: stat
                .filter(|_| listing_count > 0)
                .map(|s| s.average_price_per_area),
            anchor: [anchor.x, anchor.y],
        }
    }
}

impl fmt::Display for Tooltip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.area_name)?;
        writeln!(f, "Pincode: {}", self.postal_code)?;
        write!(f, "Properties: {}", self.listing_count)?;
        if let Some(price) = self.average_price_per_area {
            write!(f, "\nAvg Price: ₹{}/sq.ft", price)?;
        }
        Ok(())
    }
}

/// Listing-search route scoped to one postal code.
pub fn listing_route(base: &str, postal_code: &str) -> String {
    format!("{}?pincode={}", base, postal_code)
}

/// Hover/stacking state of the rendered polygons.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    draw_order: Vec<usize>,
    hovered: Option<usize>,
    cursor: Option<Coord<f64>>,
}

impl InteractionController {
    pub fn new(polygon_count: usize) -> Self {
        Self {
            draw_order: (0..polygon_count).collect(),
            hovered: None,
            cursor: None,
        }
    }

    pub fn draw_order(&self) -> &[usize] {
        &self.draw_order
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Topmost polygon under `at`.
    pub fn hit_test(&self, index: &PolygonIndex, features: &[BoundaryFeature], at: Coord<f64>) -> Option<usize> {
        index
            .containing(features, at)
            .max_by_key(|i| self.draw_order.iter().position(|d| d == i))
    }

    pub fn pointer_moved(&mut self, index: &PolygonIndex, features: &[BoundaryFeature], at: Coord<f64>) -> bool {
        self.cursor = Some(at);
        let hit = self.hit_test(index, features, at);
        if hit == self.hovered {
            return false;
        }
        self.hovered = hit;
        if let Some(entered) = hit {
            self.bring_to_front(entered);
        }
        true
    }

    pub fn pointer_left(&mut self) -> bool {
        self.cursor = None;
        self.hovered.take().is_some()
    }

    pub fn style(&self, i: usize, feature: &BoundaryFeature, stats: &StatsSnapshot) -> PolygonStyle {
        let base = style_for(stats.get(&feature.postal_code));
        if self.hovered == Some(i) {
            highlight(base)
        } else {
            base
        }
    }

    pub fn tooltip(&self, features: &[BoundaryFeature], stats: &StatsSnapshot) -> Option<Tooltip> {
        let feature = features.get(self.hovered?)?;
        Some(Tooltip::build(feature, stats, self.cursor?))
    }

    /// Postal code to navigate to for a click at `at`, if it lands on a polygon that has one.
    pub fn click_target(&self, index: &PolygonIndex, features: &[BoundaryFeature], at: Coord<f64>) -> Option<String> {
        let hit = self.hit_test(index, features, at)?;
        let postal_code = &features[hit].postal_code;
        (!postal_code.is_empty()).then(|| postal_code.clone())
    }

    fn bring_to_front(&mut self, i: usize) {
        if let Some(pos) = self.draw_order.iter().position(|&d| d == i) {
            let raised = self.draw_order.remove(pos);
            self.draw_order.push(raised);
        }
    }
}
