use crate::types::AggregateStat;
use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const fn from_hex(rgb: u32) -> Self {
        Color([(rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8])
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0[0], self.0[1], self.0[2])
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBand {
    pub lower_bound: f64,
    pub color: Color,
    pub label: &'static str,
}

pub const NO_DATA_COLOR: Color = Color::from_hex(0xe5e7eb);

/// Ascending price-per-area tiers, green through dark red.
pub const PRICE_BANDS: [PriceBand; 11] = [
    PriceBand { lower_bound: 0.0, color: Color::from_hex(0x22c55e), label: "₹0-1K" },
    PriceBand { lower_bound: 1_000.0, color: Color::from_hex(0x4ade80), label: "₹1K-2K" },
    PriceBand { lower_bound: 2_000.0, color: Color::from_hex(0xa3e635), label: "₹2K-3K" },
    PriceBand { lower_bound: 3_000.0, color: Color::from_hex(0xfacc15), label: "₹3K-4K" },
    PriceBand { lower_bound: 4_000.0, color: Color::from_hex(0xfbbf24), label: "₹4K-5K" },
    PriceBand { lower_bound: 5_000.0, color: Color::from_hex(0xfb923c), label: "₹5K-6K" },
    PriceBand { lower_bound: 6_000.0, color: Color::from_hex(0xf97316), label: "₹6K-8K" },
    PriceBand { lower_bound: 8_000.0, color: Color::from_hex(0xdc2626), label: "₹8K-10K" },
    PriceBand { lower_bound: 10_000.0, color: Color::from_hex(0xb91c1c), label: "₹10K-12K" },
    PriceBand { lower_bound: 12_000.0, color: Color::from_hex(0x991b1b), label: "₹12K-15K" },
    PriceBand { lower_bound: 15_000.0, color: Color::from_hex(0x7f1d1d), label: "₹15K+" },
];

pub const BORDER_COLOR: Color = Color::from_hex(0x374151);
pub const BORDER_WEIGHT: f32 = 2.0;
pub const DATA_FILL_OPACITY: f32 = 0.7;
pub const NO_DATA_FILL_OPACITY: f32 = 0.3;

pub const HIGHLIGHT_BORDER_COLOR: Color = Color::from_hex(0x000000);
pub const HIGHLIGHT_BORDER_WEIGHT: f32 = 3.0;
pub const HIGHLIGHT_FILL_OPACITY: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolygonStyle {
    pub stroke: Color,
    pub stroke_weight: f32,
    pub fill: Color,
    pub fill_opacity: f32,
}

/// Index into [`PRICE_BANDS`], or `None` for "no data" (zero, negative, NaN).
pub fn band_index(average_price_per_area: f64) -> Option<usize> {
    if !(average_price_per_area > 0.0) {
        return None;
    }
    PRICE_BANDS
        .iter()
        .rposition(|band| band.lower_bound <= average_price_per_area)
}

pub fn color_for(average_price_per_area: f64) -> Color {
    band_index(average_price_per_area)
        .map(|i| PRICE_BANDS[i].color)
        .unwrap_or(NO_DATA_COLOR)
}

/// Resting style of a polygon. Opacity only depends on whether a statistic exists.
pub fn style_for(stat: Option<&AggregateStat>) -> PolygonStyle {
    let price = stat.map(|s| s.average_price_per_area).unwrap_or(0.0);
    PolygonStyle {
        stroke: BORDER_COLOR,
        stroke_weight: BORDER_WEIGHT,
        fill: color_for(price),
        fill_opacity: if stat.is_some() {
            DATA_FILL_OPACITY
        } else {
            NO_DATA_FILL_OPACITY
        },
    }
}

pub fn highlight(base: PolygonStyle) -> PolygonStyle {
    PolygonStyle {
        stroke: HIGHLIGHT_BORDER_COLOR,
        stroke_weight: HIGHLIGHT_BORDER_WEIGHT,
        fill: base.fill,
        fill_opacity: HIGHLIGHT_FILL_OPACITY,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendEntry {
    pub label: &'static str,
    pub color: Color,
}

pub fn legend() -> Vec<LegendEntry> {
    PRICE_BANDS
        .iter()
        .map(|band| LegendEntry {
            label: band.label,
            color: band.color,
        })
        .collect()
}
