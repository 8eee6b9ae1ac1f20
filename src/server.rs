use crate::color::{legend, LegendEntry};
use crate::config::AppConfig;
use crate::filter::FilterSelection;
use crate::interaction::listing_route;
use crate::render::frame_document;
use crate::session::{spawn_live, MapHost, SessionHandle};
use crate::types::{Filters, PropertyType, Purpose};
use crate::view::MapEvent;
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geo::coord;
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationTarget {
    pub postal_code: String,
    pub route: String,
}

/// Host side of the served session: records navigation for `/api/navigation`.
pub struct ServerHost {
    listing_route: String,
    navigation: watch::Sender<Option<NavigationTarget>>,
}

impl ServerHost {
    pub fn new(listing_route: impl Into<String>) -> (Self, watch::Receiver<Option<NavigationTarget>>) {
        let (tx, rx) = watch::channel(None);
        let host = Self {
            listing_route: listing_route.into(),
            navigation: tx,
        };
        (host, rx)
    }
}

impl MapHost for ServerHost {
    fn invalidate_size(&mut self) {
        debug!("Viewport size invalidated");
    }

    fn close(&mut self) {
        info!("Map closed");
    }

    fn navigate(&mut self, postal_code: &str) {
        let target = NavigationTarget {
            postal_code: postal_code.to_string(),
            route: listing_route(&self.listing_route, postal_code),
        };
        info!("Navigating to {}", target.route);
        self.navigation.send_replace(Some(target));
    }
}

pub struct AppState {
    pub session: SessionHandle,
    pub navigation: watch::Receiver<Option<NavigationTarget>>,
}

#[derive(Deserialize)]
pub struct PointerParams {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
pub struct FilterRequest {
    city: Option<String>,
    purpose: Option<String>,
    #[serde(rename = "type")]
    property_type: Option<String>,
}

type ApiResult = Result<StatusCode, (StatusCode, String)>;

pub fn router(state: Arc<AppState>, config: &AppConfig) -> Router {
    let mut app = Router::new()
        .route("/api/open", post(open_handler))
        .route("/api/close", post(close_handler))
        .route("/api/filters", post(filters_handler))
        .route("/api/pointer", post(pointer_handler))
        .route("/api/pointer/leave", post(pointer_leave_handler))
        .route("/api/click", post(click_handler))
        .route("/api/frame", get(frame_handler))
        .route("/api/legend", get(legend_handler))
        .route("/api/navigation", get(navigation_handler));

    if let Some(geo_dir) = &config.server.geo_dir {
        app = app.nest_service("/geo", ServeDir::new(geo_dir));
    }

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let (host, navigation) = ServerHost::new(config.map.listing_route.clone());
    let filters = Filters::new(config.default_city()?);
    let (session, _task) = spawn_live(&config, filters, host)?;

    let state = Arc::new(AppState { session, navigation });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    println!("Starting server on http://{}", addr);

    let app = router(state, &config);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn dispatch(state: &AppState, event: MapEvent) -> ApiResult {
    state
        .session
        .send(event)
        .map(|()| StatusCode::ACCEPTED)
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
}

async fn open_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    dispatch(&state, MapEvent::Open)
}

async fn close_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    dispatch(&state, MapEvent::Close)
}

async fn filters_handler(State(state): State<Arc<AppState>>, Json(request): Json<FilterRequest>) -> ApiResult {
    let bad_request = |e: String| (StatusCode::BAD_REQUEST, e);
    let purpose = request
        .purpose
        .as_deref()
        .map(str::parse::<Purpose>)
        .transpose()
        .map_err(bad_request)?;
    let property_type = request
        .property_type
        .as_deref()
        .map(str::parse::<PropertyType>)
        .transpose()
        .map_err(bad_request)?;

    dispatch(
        &state,
        MapEvent::SelectFilters(FilterSelection {
            city: request.city,
            purpose,
            property_type,
        }),
    )
}

async fn pointer_handler(State(state): State<Arc<AppState>>, Query(params): Query<PointerParams>) -> ApiResult {
    dispatch(&state, MapEvent::PointerMoved(coord! { x: params.lon, y: params.lat }))
}

async fn pointer_leave_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    dispatch(&state, MapEvent::PointerLeft)
}

async fn click_handler(State(state): State<Arc<AppState>>, Query(params): Query<PointerParams>) -> ApiResult {
    dispatch(&state, MapEvent::Clicked(coord! { x: params.lon, y: params.lat }))
}

async fn frame_handler(State(state): State<Arc<AppState>>) -> Json<FeatureCollection> {
    Json(frame_document(&state.session.frame()))
}

async fn legend_handler() -> Json<Vec<LegendEntry>> {
    Json(legend())
}

async fn navigation_handler(State(state): State<Arc<AppState>>) -> Json<Option<NavigationTarget>> {
    Json(state.navigation.borrow().clone())
}
