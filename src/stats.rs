use crate::error::StatsFetchError;
use crate::types::{AggregateStat, Filters, StatsSnapshot};
use serde::Deserialize;
use std::collections::HashMap;
use std::future::Future;
use tracing::{debug, warn};

/// Wire format of one `countByPincode` entry.
#[derive(Debug, Deserialize)]
struct PincodeCount {
    #[serde(default)]
    count: u64,
    #[serde(rename = "avgPrice", default)]
    avg_price: Option<f64>,
}

/// Where aggregate statistics come from.
pub trait StatsSource: Send + Sync {
    fn count_by_pincode(
        &self,
        query: &[(&'static str, String)],
    ) -> impl Future<Output = Result<StatsSnapshot, StatsFetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpStatsSource {
    client: reqwest::Client,
    api_base: String,
}

impl HttpStatsSource {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl StatsSource for HttpStatsSource {
    async fn count_by_pincode(&self, query: &[(&'static str, String)]) -> Result<StatsSnapshot, StatsFetchError> {
        let url = format!("{}/properties/countByPincode", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| StatsFetchError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StatsFetchError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| StatsFetchError::Transport(e.to_string()))?;
        decode_counts(&body)
    }
}

/// Decodes `{ "<pin>": { "count": n, "avgPrice": p }, ... }`.
pub fn decode_counts(body: &str) -> Result<StatsSnapshot, StatsFetchError> {
    let raw: HashMap<String, PincodeCount> =
        serde_json::from_str(body).map_err(|e| StatsFetchError::Decode(e.to_string()))?;

    Ok(raw
        .into_iter()
        .map(|(pin, entry)| {
            let price = entry.avg_price.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(0.0);
            (
                pin.trim().to_string(),
                AggregateStat {
                    listing_count: entry.count,
                    average_price_per_area: price,
                },
            )
        })
        .collect())
}

/// Fetches per-postal-code statistics, failing open to an empty snapshot.
pub struct StatsAggregateClient<S> {
    source: S,
}

impl<S: StatsSource> StatsAggregateClient<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn fetch(&self, filters: &Filters) -> StatsSnapshot {
        let query = filters.query_pairs();
        match self.source.count_by_pincode(&query).await {
            Ok(stats) => {
                debug!("Fetched stats for {} postal codes ({:?})", stats.len(), query);
                stats
            }
            Err(e) => {
                warn!("Rendering {} without statistics: {}", filters.city.name, e);
                StatsSnapshot::new()
            }
        }
    }
}
