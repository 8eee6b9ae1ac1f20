use crate::boundary::BoundarySource;
use crate::error::{BoundaryLoadError, StatsFetchError};
use crate::session::MapHost;
use crate::stats::StatsSource;
use crate::types::{AggregateStat, City, CityCatalog, StatsSnapshot};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn city(name: &str) -> City {
    City {
        name: name.to_string(),
        center: [0.5, 0.5],
        zoom: 12,
        geo_file: format!("{}.geojson", name.to_lowercase()),
    }
}

pub fn catalog() -> CityCatalog {
    let cities = vec![city("Ahmedabad"), city("Pune"), city("Mumbai")];
    match CityCatalog::new(cities, "Ahmedabad") {
        Some(catalog) => catalog,
        None => unreachable!("fallback is in the list"),
    }
}

/// A one-degree square Feature with its lower-left corner at (`x`, `y`).
pub fn square_feature(pin: &str, area: &str, x: f64, y: f64) -> String {
    format!(
        r#"{{"type":"Feature","properties":{{"pin_code":"{pin}","area_name":"{area}"}},"geometry":{{"type":"Polygon","coordinates":[[[{x},{y}],[{x1},{y}],[{x1},{y1}],[{x},{y1}],[{x},{y}]]]}}}}"#,
        x1 = x + 1.0,
        y1 = y + 1.0,
    )
}

pub fn feature_collection(features: &[String]) -> String {
    format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","))
}

pub fn stats(entries: &[(&str, u64, f64)]) -> StatsSnapshot {
    entries
        .iter()
        .map(|(pin, count, price)| {
            (
                pin.to_string(),
                AggregateStat {
                    listing_count: *count,
                    average_price_per_area: *price,
                },
            )
        })
        .collect()
}

/// Serves assets from memory; unknown files answer 404.
#[derive(Default)]
pub struct MemoryBoundarySource {
    assets: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    fetches: Mutex<Vec<String>>,
}

impl MemoryBoundarySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_asset(mut self, file: &str, body: impl Into<String>) -> Self {
        self.assets.insert(file.to_string(), body.into());
        self
    }

    pub fn with_delay(mut self, file: &str, delay: Duration) -> Self {
        self.delays.insert(file.to_string(), delay);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetches).clone()
    }
}

impl BoundarySource for MemoryBoundarySource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, BoundaryLoadError> {
        lock(&self.fetches).push(file.to_string());
        if let Some(delay) = self.delays.get(file) {
            tokio::time::sleep(*delay).await;
        }
        self.assets
            .get(file)
            .map(|body| body.clone().into_bytes())
            .ok_or_else(|| BoundaryLoadError::Unavailable {
                file: file.to_string(),
                status: 404,
            })
    }
}

/// Answers stats queries from a script keyed by the encoded query
/// (`city=Pune&purpose=Rent`); unscripted queries get an empty snapshot.
#[derive(Default)]
pub struct ScriptedStatsSource {
    script: HashMap<String, (Result<StatsSnapshot, StatsFetchError>, Duration)>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedStatsSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, query: &str, answer: Result<StatsSnapshot, StatsFetchError>) -> Self {
        self.script.insert(query.to_string(), (answer, Duration::ZERO));
        self
    }

    pub fn respond_after(
        mut self,
        query: &str,
        delay: Duration,
        answer: Result<StatsSnapshot, StatsFetchError>,
    ) -> Self {
        self.script.insert(query.to_string(), (answer, delay));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

pub fn encode_query(query: &[(&'static str, String)]) -> String {
    query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

impl StatsSource for ScriptedStatsSource {
    async fn count_by_pincode(&self, query: &[(&'static str, String)]) -> Result<StatsSnapshot, StatsFetchError> {
        let key = encode_query(query);
        lock(&self.queries).push(key.clone());
        match self.script.get(&key) {
            Some((answer, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                answer.clone()
            }
            None => Ok(StatsSnapshot::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    InvalidateSize,
    Close,
    Navigate(String),
}

/// Host that records every callback it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingHost {
    calls: Arc<Mutex<Vec<HostCall>>>,
}

impl RecordingHost {
    pub fn calls(&self) -> Vec<HostCall> {
        lock(&self.calls).clone()
    }
}

impl MapHost for RecordingHost {
    fn invalidate_size(&mut self) {
        lock(&self.calls).push(HostCall::InvalidateSize);
    }

    fn close(&mut self) {
        lock(&self.calls).push(HostCall::Close);
    }

    fn navigate(&mut self, postal_code: &str) {
        lock(&self.calls).push(HostCall::Navigate(postal_code.to_string()));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
