use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    /// [lat, lng]
    pub center: [f64; 2],
    pub zoom: u8,
    /// File name of the boundary asset, e.g. `ahmedabad.geojson`.
    pub geo_file: String,
}

#[derive(Debug, Clone)]
pub struct CityCatalog {
    cities: Vec<City>,
    fallback: usize,
}

impl CityCatalog {
    /// Returns `None` if `fallback` is not one of `cities`.
    pub fn new(cities: Vec<City>, fallback: &str) -> Option<Self> {
        let fallback = cities.iter().position(|c| c.name == fallback)?;
        Some(Self { cities, fallback })
    }

    pub fn get(&self, name: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.name == name)
    }

    pub fn fallback(&self) -> &City {
        &self.cities[self.fallback]
    }
}

#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub postal_code: String,
    pub area_name: String,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStat {
    pub listing_count: u64,
    pub average_price_per_area: f64,
}

/// Per-postal-code statistics for one filter selection. Absent keys mean "no data".
pub type StatsSnapshot = HashMap<String, AggregateStat>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Purpose {
    #[default]
    All,
    Sale,
    Rent,
}

impl Purpose {
    pub const ALL: [Purpose; 3] = [Purpose::All, Purpose::Sale, Purpose::Rent];

    /// Value sent to the stats endpoint; `All` is never sent.
    pub fn query_value(self) -> Option<&'static str> {
        match self {
            Purpose::All => None,
            Purpose::Sale => Some("Sale"),
            Purpose::Rent => Some("Rent"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[default]
    All,
    Apartment,
    Villa,
    House,
    Penthouse,
    Studio,
    Plot,
    Commercial,
}

impl PropertyType {
    pub const ALL: [PropertyType; 8] = [
        PropertyType::All,
        PropertyType::Apartment,
        PropertyType::Villa,
        PropertyType::House,
        PropertyType::Penthouse,
        PropertyType::Studio,
        PropertyType::Plot,
        PropertyType::Commercial,
    ];

    pub fn query_value(self) -> Option<&'static str> {
        match self {
            PropertyType::All => None,
            PropertyType::Apartment => Some("Apartment"),
            PropertyType::Villa => Some("Villa"),
            PropertyType::House => Some("House"),
            PropertyType::Penthouse => Some("Penthouse"),
            PropertyType::Studio => Some("Studio"),
            PropertyType::Plot => Some("Plot"),
            PropertyType::Commercial => Some("Commercial"),
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value().unwrap_or("All"))
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_value().unwrap_or("All"))
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Purpose::ALL
            .into_iter()
            .find(|p| p.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown purpose '{s}' (expected All, Sale or Rent)"))
    }
}

impl FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown property type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Filters {
    pub city: City,
    pub purpose: Purpose,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
}

impl Filters {
    pub fn new(city: City) -> Self {
        Self {
            city,
            purpose: Purpose::All,
            property_type: PropertyType::All,
        }
    }

    /// Query pairs for the stats endpoint. Defaults are omitted.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("city", self.city.name.clone())];
        if let Some(purpose) = self.purpose.query_value() {
            pairs.push(("purpose", purpose.to_string()));
        }
        if let Some(kind) = self.property_type.query_value() {
            pairs.push(("type", kind.to_string()));
        }
        pairs
    }
}

/// Monotonic token tagging every request issued for a filter selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RenderGeneration(u64);

impl RenderGeneration {
    pub fn next(self) -> Self {
        RenderGeneration(self.0 + 1)
    }
}

impl fmt::Display for RenderGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}
