use crate::error::BoundaryLoadError;
use crate::types::{BoundaryFeature, City, CityCatalog};
use geo::MultiPolygon;
use geojson::GeoJson;
use rayon::prelude::*;
use std::collections::HashMap;
use std::convert::TryInto;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub type BoundarySet = Arc<[BoundaryFeature]>;

/// Where boundary assets come from.
pub trait BoundarySource: Send + Sync {
    fn fetch(&self, file: &str) -> impl Future<Output = Result<Vec<u8>, BoundaryLoadError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpBoundarySource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBoundarySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl BoundarySource for HttpBoundarySource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, BoundaryLoadError> {
        let url = format!("{}/{}", self.base_url, file);
        debug!("Fetching boundary asset {}", url);
        let transport = |e: reqwest::Error| BoundaryLoadError::Transport {
            file: file.to_string(),
            message: e.to_string(),
        };
        let response = self.client.get(&url).send().await.map_err(transport)?;
        if !response.status().is_success() {
            return Err(BoundaryLoadError::Unavailable {
                file: file.to_string(),
                status: response.status().as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}

/// Reads assets from a local directory, the way they sit in a front end's `public/geo`.
#[derive(Debug, Clone)]
pub struct DirectoryBoundarySource {
    dir: PathBuf,
}

impl DirectoryBoundarySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BoundarySource for DirectoryBoundarySource {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, BoundaryLoadError> {
        let path = self.dir.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BoundaryLoadError::Unavailable {
                file: file.to_string(),
                status: 404,
            }),
            Err(e) => Err(BoundaryLoadError::Transport {
                file: file.to_string(),
                message: format!("{:?}: {}", path, e),
            }),
        }
    }
}

/// Source picked from `map.geo_base`: URLs go over HTTP, anything else is a directory.
#[derive(Debug, Clone)]
pub enum BoundaryAssets {
    Http(HttpBoundarySource),
    Directory(DirectoryBoundarySource),
}

impl BoundaryAssets {
    pub fn from_base(geo_base: &str) -> Self {
        if geo_base.starts_with("http://") || geo_base.starts_with("https://") {
            BoundaryAssets::Http(HttpBoundarySource::new(geo_base))
        } else {
            BoundaryAssets::Directory(DirectoryBoundarySource::new(geo_base))
        }
    }
}

impl BoundarySource for BoundaryAssets {
    async fn fetch(&self, file: &str) -> Result<Vec<u8>, BoundaryLoadError> {
        match self {
            BoundaryAssets::Http(source) => source.fetch(file).await,
            BoundaryAssets::Directory(source) => source.fetch(file).await,
        }
    }
}

/// Loads per-city boundary sets, caching successes for the lifetime of the repository.
pub struct BoundaryRepository<S> {
    source: S,
    fallback: City,
    cache: Mutex<HashMap<String, BoundarySet>>,
}

impl<S: BoundarySource> BoundaryRepository<S> {
    pub fn new(source: S, catalog: &CityCatalog) -> Self {
        Self {
            source,
            fallback: catalog.fallback().clone(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn load(&self, city: &City) -> Result<BoundarySet, BoundaryLoadError> {
        match self.load_city(city).await {
            Ok(set) => Ok(set),
            Err(primary) if city.name != self.fallback.name => {
                warn!(
                    "Boundaries for {} unavailable ({}), falling back to {}",
                    city.name, primary, self.fallback.name
                );
                self.load_city(&self.fallback)
                    .await
                    .map_err(|fallback| BoundaryLoadError::FallbackFailed {
                        primary: Box::new(primary),
                        fallback_city: self.fallback.name.clone(),
                        fallback: Box::new(fallback),
                    })
            }
            Err(e) => Err(e),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cached(&self, city: &City) -> Option<BoundarySet> {
        self.lock_cache().get(&city.name).cloned()
    }

    async fn load_city(&self, city: &City) -> Result<BoundarySet, BoundaryLoadError> {
        if let Some(set) = self.cached(city) {
            debug!("Boundaries for {} served from cache", city.name);
            return Ok(set);
        }

        let bytes = self.source.fetch(&city.geo_file).await?;
        let set: BoundarySet = parse_feature_collection(&city.geo_file, &bytes)?.into();
        info!("Loaded {} boundary polygons for {}", set.len(), city.name);

        self.lock_cache().insert(city.name.clone(), set.clone());
        Ok(set)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, BoundarySet>> {
        // The map holds only fully built values, so a poisoned lock is still consistent.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Parses a GeoJSON FeatureCollection whose features carry `pin_code` and `area_name`.
pub fn parse_feature_collection(file: &str, bytes: &[u8]) -> Result<Vec<BoundaryFeature>, BoundaryLoadError> {
    let malformed = |message: String| BoundaryLoadError::Malformed {
        file: file.to_string(),
        message,
    };

    let text = std::str::from_utf8(bytes).map_err(|e| malformed(e.to_string()))?;
    let geojson = text.parse::<GeoJson>().map_err(|e| malformed(e.to_string()))?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(malformed("GeoJSON must be a FeatureCollection".to_string())),
    };

    let features = collection
        .features
        .into_par_iter()
        .filter_map(feature_to_boundary)
        .collect();

    Ok(features)
}

fn feature_to_boundary(feature: geojson::Feature) -> Option<BoundaryFeature> {
    let postal_code = match feature.property("pin_code") {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let area_name = match feature.property("area_name") {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "Unknown Area".to_string(),
    };

    let geometry: geo::Geometry<f64> = match feature.geometry {
        Some(geometry) => match geometry.value.try_into() {
            Ok(g) => g,
            Err(e) => {
                warn!("Skipping feature {}: {:?}", postal_code, e);
                return None;
            }
        },
        None => return None,
    };

    let geometry = match geometry {
        geo::Geometry::MultiPolygon(mp) => mp,
        geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
        _ => return None, // points/lines carry no area
    };

    Some(BoundaryFeature {
        postal_code,
        area_name,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{catalog, city, feature_collection, square_feature, MemoryBoundarySource};

    fn ahmedabad_asset() -> String {
        feature_collection(&[square_feature("380001", "Lal Darwaja", 0.0, 0.0)])
    }

    #[test]
    fn parses_pin_codes_and_area_names() {
        let body = feature_collection(&[
            square_feature("395004", "Adajan", 0.0, 0.0),
            r#"{"type":"Feature","properties":{"pin_code":380001},
                "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}"#
                .to_string(),
        ]);
        let features = parse_feature_collection("t.geojson", body.as_bytes()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].postal_code, "395004");
        assert_eq!(features[0].area_name, "Adajan");
        assert_eq!(features[1].postal_code, "380001");
        assert_eq!(features[1].area_name, "Unknown Area");
    }

    #[test]
    fn skips_non_polygon_features() {
        let body = feature_collection(&[
            square_feature("1", "A", 0.0, 0.0),
            r#"{"type":"Feature","properties":{"pin_code":"2"},"geometry":{"type":"Point","coordinates":[1,1]}}"#
                .to_string(),
            r#"{"type":"Feature","properties":{"pin_code":"3"},"geometry":null}"#.to_string(),
        ]);
        let features = parse_feature_collection("t.geojson", body.as_bytes()).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn rejects_non_collections_and_garbage() {
        let point = r#"{"type":"Point","coordinates":[1,1]}"#;
        assert!(matches!(
            parse_feature_collection("p.geojson", point.as_bytes()),
            Err(BoundaryLoadError::Malformed { .. })
        ));
        assert!(matches!(
            parse_feature_collection("p.geojson", b"<html>404</html>"),
            Err(BoundaryLoadError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn second_load_is_served_from_cache() {
        let source = MemoryBoundarySource::new().with_asset("ahmedabad.geojson", ahmedabad_asset());
        let repo = BoundaryRepository::new(source, &catalog());

        let first = repo.load(&city("Ahmedabad")).await.unwrap();
        let second = repo.load(&city("Ahmedabad")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(repo.source.fetched(), vec!["ahmedabad.geojson"]);
    }

    #[tokio::test]
    async fn missing_city_falls_back_once() {
        let source = MemoryBoundarySource::new().with_asset("ahmedabad.geojson", ahmedabad_asset());
        let repo = BoundaryRepository::new(source, &catalog());

        let set = repo.load(&city("Pune")).await.unwrap();

        assert_eq!(set[0].postal_code, "380001");
        assert_eq!(repo.source.fetched(), vec!["pune.geojson", "ahmedabad.geojson"]);
        assert!(repo.cached(&city("Pune")).is_none());
        assert!(repo.cached(&city("Ahmedabad")).is_some());
    }

    #[tokio::test]
    async fn malformed_asset_also_falls_back() {
        let source = MemoryBoundarySource::new()
            .with_asset("pune.geojson", "<html>not found</html>")
            .with_asset("ahmedabad.geojson", ahmedabad_asset());
        let repo = BoundaryRepository::new(source, &catalog());

        let set = repo.load(&city("Pune")).await.unwrap();
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn failed_fallback_propagates_both_errors() {
        let repo = BoundaryRepository::new(MemoryBoundarySource::new(), &catalog());

        let err = repo.load(&city("Pune")).await.unwrap_err();

        match err {
            BoundaryLoadError::FallbackFailed { fallback_city, .. } => assert_eq!(fallback_city, "Ahmedabad"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(repo.source.fetched(), vec!["pune.geojson", "ahmedabad.geojson"]);
    }

    #[tokio::test]
    async fn fallback_city_failure_is_not_retried() {
        let repo = BoundaryRepository::new(MemoryBoundarySource::new(), &catalog());

        let err = repo.load(&city("Ahmedabad")).await.unwrap_err();

        assert!(matches!(err, BoundaryLoadError::Unavailable { status: 404, .. }));
        assert_eq!(repo.source.fetched(), vec!["ahmedabad.geojson"]);
    }

    #[tokio::test]
    async fn directory_source_maps_missing_files_to_404() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("ahmedabad.geojson"), ahmedabad_asset()).unwrap();
        let source = DirectoryBoundarySource::new(dir.path());

        assert!(source.fetch("ahmedabad.geojson").await.is_ok());
        assert!(matches!(
            source.fetch("pune.geojson").await,
            Err(BoundaryLoadError::Unavailable { status: 404, .. })
        ));
    }

    #[test]
    fn geo_base_selects_transport() {
        assert!(matches!(BoundaryAssets::from_base("https://example.com/geo"), BoundaryAssets::Http(_)));
        assert!(matches!(BoundaryAssets::from_base("public/geo"), BoundaryAssets::Directory(_)));
    }
}
