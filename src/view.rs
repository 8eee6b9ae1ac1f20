use crate::boundary::BoundarySet;
use crate::color::PolygonStyle;
use crate::error::BoundaryLoadError;
use crate::filter::{FilterSelection, FilterState, Invalidation};
use crate::interaction::{InteractionController, PolygonIndex, Tooltip};
use crate::types::{
    AggregateStat, BoundaryFeature, City, CityCatalog, Filters, PropertyType, Purpose, RenderGeneration,
    StatsSnapshot,
};
use geo::Coord;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Closed,
    Opening,
    Ready,
}

#[derive(Debug, Clone)]
pub enum MapEvent {
    Open,
    Close,
    ResizeElapsed { ticket: u64 },
    SelectCity(String),
    SelectPurpose(Purpose),
    SelectPropertyType(PropertyType),
    SelectFilters(FilterSelection),
    BoundariesLoaded {
        generation: RenderGeneration,
        result: Result<BoundarySet, BoundaryLoadError>,
    },
    StatsLoaded {
        generation: RenderGeneration,
        stats: Arc<StatsSnapshot>,
    },
    /// Cursor position in lon/lat.
    PointerMoved(Coord<f64>),
    PointerLeft,
    Clicked(Coord<f64>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ScheduleResize { ticket: u64, delay: Duration },
    CancelResize { ticket: u64 },
    InvalidateSize,
    LoadBoundaries { generation: RenderGeneration, city: City },
    FetchStats { generation: RenderGeneration, filters: Filters },
    Close,
    Navigate { postal_code: String },
}

/// What is currently drawn.
struct Layer {
    city: String,
    generation: RenderGeneration,
    features: BoundarySet,
    index: Arc<PolygonIndex>,
    stats: Arc<StatsSnapshot>,
    error: Option<BoundaryLoadError>,
}

struct Pending {
    generation: RenderGeneration,
    boundaries: Option<Result<BoundarySet, BoundaryLoadError>>,
    stats: Option<Arc<StatsSnapshot>>,
}

pub struct MapView {
    catalog: CityCatalog,
    filters: FilterState,
    phase: Phase,
    resize_delay: Duration,
    resize_ticket: u64,
    pending: Option<Pending>,
    layer: Option<Layer>,
    interaction: InteractionController,
}

impl MapView {
    pub fn new(catalog: CityCatalog, filters: Filters, resize_delay: Duration) -> Self {
        Self {
            catalog,
            filters: FilterState::new(filters),
            phase: Phase::Closed,
            resize_delay,
            resize_ticket: 0,
            pending: None,
            layer: None,
            interaction: InteractionController::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn filters(&self) -> &Filters {
        self.filters.filters()
    }

    pub fn generation(&self) -> RenderGeneration {
        self.filters.generation()
    }

    pub fn handle(&mut self, event: MapEvent) -> Vec<Command> {
        match event {
            MapEvent::Open => self.open(),
            MapEvent::Close => self.close(),
            MapEvent::ResizeElapsed { ticket } => self.resize_elapsed(ticket),
            MapEvent::SelectCity(name) => {
                if !self.accepts_filters() {
                    return Vec::new();
                }
                if self.catalog.get(&name).is_none() {
                    warn!("Ignoring unknown city '{}'", name);
                    return Vec::new();
                }
                let invalidation = self.filters.set_city(&self.catalog, &name);
                self.refilter(invalidation)
            }
            MapEvent::SelectPurpose(purpose) => {
                if !self.accepts_filters() {
                    return Vec::new();
                }
                let invalidation = self.filters.set_purpose(purpose);
                self.refilter(invalidation)
            }
            MapEvent::SelectPropertyType(property_type) => {
                if !self.accepts_filters() {
                    return Vec::new();
                }
                let invalidation = self.filters.set_property_type(property_type);
                self.refilter(invalidation)
            }
            MapEvent::SelectFilters(selection) => {
                if !self.accepts_filters() {
                    return Vec::new();
                }
                if let Some(name) = selection.city.as_deref().filter(|c| self.catalog.get(c).is_none()) {
                    warn!("Ignoring filters for unknown city '{}'", name);
                    return Vec::new();
                }
                let invalidation = self.filters.apply(&self.catalog, &selection);
                self.refilter(invalidation)
            }
            MapEvent::BoundariesLoaded { generation, result } => {
                match self.pending.as_mut() {
                    Some(p) if self.phase == Phase::Ready && p.generation == generation && p.boundaries.is_none() => {
                        p.boundaries = Some(result);
                        self.try_commit();
                    }
                    _ => debug!("Discarding stale boundary response for {}", generation),
                }
                Vec::new()
            }
            MapEvent::StatsLoaded { generation, stats } => {
                match self.pending.as_mut() {
                    Some(p) if self.phase == Phase::Ready && p.generation == generation && p.stats.is_none() => {
                        p.stats = Some(stats);
                        self.try_commit();
                    }
                    _ => debug!("Discarding stale stats response for {}", generation),
                }
                Vec::new()
            }
            MapEvent::PointerMoved(at) => {
                if let (Phase::Ready, Some(layer)) = (self.phase, self.layer.as_ref()) {
                    self.interaction.pointer_moved(&layer.index, &layer.features, at);
                }
                Vec::new()
            }
            MapEvent::PointerLeft => {
                self.interaction.pointer_left();
                Vec::new()
            }
            MapEvent::Clicked(at) => self.click(at),
        }
    }

    fn open(&mut self) -> Vec<Command> {
        if self.phase != Phase::Closed {
            return Vec::new();
        }
        self.phase = Phase::Opening;
        self.resize_ticket += 1;
        vec![Command::ScheduleResize {
            ticket: self.resize_ticket,
            delay: self.resize_delay,
        }]
    }

    fn resize_elapsed(&mut self, ticket: u64) -> Vec<Command> {
        if self.phase != Phase::Opening || ticket != self.resize_ticket {
            debug!("Ignoring resize timer {} in {:?}", ticket, self.phase);
            return Vec::new();
        }
        self.phase = Phase::Ready;
        let mut commands = vec![Command::InvalidateSize];
        let invalidation = self.filters.reload();
        commands.extend(self.request(invalidation));
        commands
    }

    fn close(&mut self) -> Vec<Command> {
        let commands = match self.phase {
            Phase::Closed => return Vec::new(),
            Phase::Opening => vec![Command::CancelResize {
                ticket: self.resize_ticket,
            }],
            Phase::Ready => Vec::new(),
        };
        self.teardown();
        commands
    }

    fn click(&mut self, at: Coord<f64>) -> Vec<Command> {
        let Some(layer) = self.layer.as_ref().filter(|_| self.phase == Phase::Ready) else {
            return Vec::new();
        };
        let Some(postal_code) = self.interaction.click_target(&layer.index, &layer.features, at) else {
            return Vec::new();
        };
        info!("Polygon {} clicked, leaving map", postal_code);
        self.teardown();
        vec![Command::Close, Command::Navigate { postal_code }]
    }

    fn teardown(&mut self) {
        self.phase = Phase::Closed;
        self.pending = None;
        self.layer = None;
        self.interaction = InteractionController::default();
    }

    fn accepts_filters(&self) -> bool {
        if self.phase != Phase::Ready {
            debug!("Filter change ignored while {:?}", self.phase);
            return false;
        }
        true
    }

    fn refilter(&mut self, invalidation: Option<Invalidation>) -> Vec<Command> {
        let Some(invalidation) = invalidation else {
            return Vec::new();
        };
        if invalidation.boundaries {
            // Geometry never carries over between cities.
            self.layer = None;
            self.interaction = InteractionController::default();
        }
        self.request(invalidation)
    }

    fn request(&mut self, invalidation: Invalidation) -> Vec<Command> {
        let generation = invalidation.generation;
        let filters = self.filters.filters().clone();
        let reusable = self
            .layer
            .as_ref()
            .filter(|layer| !invalidation.boundaries && layer.city == filters.city.name && layer.error.is_none())
            .map(|layer| layer.features.clone());

        let mut commands = Vec::with_capacity(2);
        if reusable.is_none() {
            commands.push(Command::LoadBoundaries {
                generation,
                city: filters.city.clone(),
            });
        }
        commands.push(Command::FetchStats { generation, filters });

        self.pending = Some(Pending {
            generation,
            boundaries: reusable.map(Ok),
            stats: None,
        });
        commands
    }

    fn try_commit(&mut self) {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| p.boundaries.is_some() && p.stats.is_some());
        if !ready {
            return;
        }
        let Some(Pending {
            generation,
            boundaries: Some(boundaries),
            stats: Some(stats),
        }) = self.pending.take()
        else {
            return;
        };

        let (features, error) = match boundaries {
            Ok(set) => (set, None),
            Err(e) => {
                warn!("Rendering {} without boundaries: {}", self.filters().city.name, e);
                (BoundarySet::from(Vec::new()), Some(e))
            }
        };

        let index = match self.layer.as_ref() {
            Some(layer) if Arc::ptr_eq(&layer.features, &features) => layer.index.clone(),
            _ => {
                self.interaction = InteractionController::new(features.len());
                Arc::new(PolygonIndex::build(&features))
            }
        };

        debug!(
            "Committed {} with {} polygons and {} statistics",
            generation,
            features.len(),
            stats.len()
        );
        self.layer = Some(Layer {
            city: self.filters().city.name.clone(),
            generation,
            features,
            index,
            stats,
            error,
        });
    }

    pub fn frame(&self) -> Frame {
        let filters = self.filters().clone();
        let mut frame = Frame {
            phase: self.phase,
            loading: self.phase == Phase::Ready && self.pending.is_some(),
            generation: None,
            center: filters.city.center,
            zoom: filters.city.zoom,
            filters,
            boundary_error: None,
            features: BoundarySet::from(Vec::new()),
            polygons: Vec::new(),
            tooltip: None,
        };

        let Some(layer) = self.layer.as_ref().filter(|_| self.phase == Phase::Ready) else {
            return frame;
        };

        frame.generation = Some(layer.generation);
        frame.boundary_error = layer.error.as_ref().map(|e| e.to_string());
        frame.polygons = self
            .interaction
            .draw_order()
            .iter()
            .filter_map(|&i| {
                let feature = layer.features.get(i)?;
                Some(RenderedPolygon {
                    index: i,
                    style: self.interaction.style(i, feature, &layer.stats),
                    stat: layer.stats.get(&feature.postal_code).copied(),
                })
            })
            .collect();
        frame.tooltip = self.interaction.tooltip(&layer.features, &layer.stats);
        frame.features = layer.features.clone();
        frame
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPolygon {
    pub index: usize,
    pub style: PolygonStyle,
    pub stat: Option<AggregateStat>,
}

/// Everything needed to draw the overlay once. Polygons are in paint order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub phase: Phase,
    pub loading: bool,
    pub generation: Option<RenderGeneration>,
    /// Current selection, which may be newer than what is drawn while loading.
    pub filters: Filters,
    /// [lat, lng]
    pub center: [f64; 2],
    pub zoom: u8,
    pub boundary_error: Option<String>,
    pub features: BoundarySet,
    pub polygons: Vec<RenderedPolygon>,
    pub tooltip: Option<Tooltip>,
}

impl Frame {
    pub fn feature(&self, polygon: &RenderedPolygon) -> &BoundaryFeature {
        &self.features[polygon.index]
    }

    pub fn polygon_for(&self, postal_code: &str) -> Option<&RenderedPolygon> {
        self.polygons
            .iter()
            .find(|p| self.feature(p).postal_code == postal_code)
    }

    pub fn is_settled(&self) -> bool {
        self.phase == Phase::Ready && !self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{catalog, city};
    use crate::color::{DATA_FILL_OPACITY, NO_DATA_COLOR, NO_DATA_FILL_OPACITY};
    use geo::{coord, polygon, MultiPolygon};

    fn square(pin: &str, x: f64) -> BoundaryFeature {
        BoundaryFeature {
            postal_code: pin.to_string(),
            area_name: format!("Area {pin}"),
            geometry: MultiPolygon::new(vec![polygon![
                (x: x, y: 0.0),
                (x: x + 1.0, y: 0.0),
                (x: x + 1.0, y: 1.0),
                (x: x, y: 1.0),
                (x: x, y: 0.0),
            ]]),
        }
    }

    fn boundaries() -> BoundarySet {
        vec![square("395004", 0.0), square("400001", 2.0), square("380001", 4.0)].into()
    }

    fn snapshot(entries: &[(&str, u64, f64)]) -> Arc<StatsSnapshot> {
        Arc::new(
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
                .collect(),
        )
    }

    fn view() -> MapView {
        MapView::new(catalog(), Filters::new(city("Ahmedabad")), Duration::from_millis(500))
    }

    /// Opens the view and returns the generation of the initial requests.
    fn open(view: &mut MapView) -> RenderGeneration {
        let cmds = view.handle(MapEvent::Open);
        let Command::ScheduleResize { ticket, .. } = cmds[0] else {
            panic!("expected resize, got {cmds:?}");
        };
        view.handle(MapEvent::ResizeElapsed { ticket });
        view.generation()
    }

    fn settle(view: &mut MapView, generation: RenderGeneration, stats: Arc<StatsSnapshot>) {
        view.handle(MapEvent::BoundariesLoaded {
            generation,
            result: Ok(boundaries()),
        });
        view.handle(MapEvent::StatsLoaded { generation, stats });
    }

    #[test]
    fn opening_waits_for_resize_before_loading() {
        let mut view = view();
        let cmds = view.handle(MapEvent::Open);
        assert_eq!(
            cmds,
            vec![Command::ScheduleResize {
                ticket: 1,
                delay: Duration::from_millis(500)
            }]
        );
        assert_eq!(view.phase(), Phase::Opening);
        assert!(view.handle(MapEvent::SelectPurpose(Purpose::Rent)).is_empty());

        let cmds = view.handle(MapEvent::ResizeElapsed { ticket: 1 });
        assert_eq!(view.phase(), Phase::Ready);
        assert_eq!(cmds[0], Command::InvalidateSize);
        assert!(matches!(cmds[1], Command::LoadBoundaries { .. }));
        assert!(matches!(cmds[2], Command::FetchStats { .. }));
        assert!(view.frame().loading);
    }

    #[test]
    fn closing_while_opening_cancels_the_timer() {
        let mut view = view();
        view.handle(MapEvent::Open);
        assert_eq!(view.handle(MapEvent::Close), vec![Command::CancelResize { ticket: 1 }]);
        // A late tick from the first opening must not ready the second.
        view.handle(MapEvent::Open);
        assert!(view.handle(MapEvent::ResizeElapsed { ticket: 1 }).is_empty());
        assert_eq!(view.phase(), Phase::Opening);
        assert!(!view.handle(MapEvent::ResizeElapsed { ticket: 2 }).is_empty());
    }

    #[test]
    fn styles_only_polygons_with_statistics() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[("395004", 3, 7200.0)]));

        let frame = view.frame();
        assert!(frame.is_settled());
        assert_eq!(frame.polygons.len(), 3);
        let hot = frame.polygon_for("395004").unwrap();
        assert_eq!(hot.style.fill.to_string(), "#f97316");
        assert_eq!(hot.style.fill_opacity, DATA_FILL_OPACITY);
        for pin in ["400001", "380001"] {
            let cold = frame.polygon_for(pin).unwrap();
            assert_eq!(cold.style.fill, NO_DATA_COLOR);
            assert_eq!(cold.style.fill_opacity, NO_DATA_FILL_OPACITY);
        }
    }

    #[test]
    fn waits_for_both_sources() {
        let mut view = view();
        let generation = open(&mut view);
        view.handle(MapEvent::StatsLoaded {
            generation,
            stats: snapshot(&[]),
        });
        assert!(view.frame().loading);
        assert!(view.frame().polygons.is_empty());
        view.handle(MapEvent::BoundariesLoaded {
            generation,
            result: Ok(boundaries()),
        });
        assert!(view.frame().is_settled());
    }

    #[test]
    fn purpose_change_reuses_boundaries() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        let cmds = view.handle(MapEvent::SelectPurpose(Purpose::Rent));
        assert_eq!(cmds.len(), 1);
        let Command::FetchStats { generation: next, filters } = &cmds[0] else {
            panic!("expected stats fetch, got {cmds:?}");
        };
        assert!(*next > generation);
        assert_eq!(filters.purpose, Purpose::Rent);

        // Last good frame stays up while loading.
        let frame = view.frame();
        assert!(frame.loading);
        assert_eq!(frame.polygons.len(), 3);

        view.handle(MapEvent::StatsLoaded {
            generation: *next,
            stats: snapshot(&[("400001", 1, 16000.0)]),
        });
        let frame = view.frame();
        assert!(frame.is_settled());
        assert_eq!(frame.polygon_for("400001").unwrap().style.fill.to_string(), "#7f1d1d");
    }

    #[test]
    fn city_change_reloads_everything_and_drops_old_polygons() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        let cmds = view.handle(MapEvent::SelectCity("Pune".into()));
        assert!(matches!(&cmds[0], Command::LoadBoundaries { city, .. } if city.name == "Pune"));
        assert!(matches!(&cmds[1], Command::FetchStats { filters, .. } if filters.city.name == "Pune"));
        let frame = view.frame();
        assert!(frame.polygons.is_empty());
        assert_eq!(frame.center, city("Pune").center);
    }

    #[test]
    fn superseded_boundary_responses_are_discarded() {
        let mut view = view();
        let first = open(&mut view);
        view.handle(MapEvent::SelectCity("Pune".into()));
        let pune = view.generation();
        let cmds = view.handle(MapEvent::SelectCity("Mumbai".into()));
        let mumbai = view.generation();
        assert!(matches!(
            &cmds[0],
            Command::LoadBoundaries { generation, city } if *generation == mumbai && city.name == "Mumbai"
        ));

        view.handle(MapEvent::BoundariesLoaded {
            generation: first,
            result: Ok(boundaries()),
        });
        assert!(view.frame().loading);
        assert!(view.frame().polygons.is_empty());

        view.handle(MapEvent::BoundariesLoaded {
            generation: mumbai,
            result: Ok(vec![square("400001", 2.0)].into()),
        });
        view.handle(MapEvent::StatsLoaded {
            generation: mumbai,
            stats: snapshot(&[("400001", 1, 900.0)]),
        });
        view.handle(MapEvent::BoundariesLoaded {
            generation: pune,
            result: Ok(boundaries()),
        });
        view.handle(MapEvent::StatsLoaded {
            generation: pune,
            stats: snapshot(&[]),
        });

        let frame = view.frame();
        assert!(frame.is_settled());
        assert_eq!(frame.generation, Some(mumbai));
        assert_eq!(frame.filters.city.name, "Mumbai");
        assert_eq!(frame.polygons.len(), 1);
        assert_eq!(frame.feature(&frame.polygons[0]).postal_code, "400001");
    }

    #[test]
    fn combined_selection_issues_one_request_pair() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        let cmds = view.handle(MapEvent::SelectFilters(FilterSelection {
            city: Some("Pune".into()),
            purpose: Some(Purpose::Rent),
            property_type: Some(PropertyType::Villa),
        }));
        assert_eq!(cmds.len(), 2);
        assert!(matches!(&cmds[0], Command::LoadBoundaries { city, .. } if city.name == "Pune"));
        let Command::FetchStats { generation: next, filters } = &cmds[1] else {
            panic!("expected stats fetch, got {cmds:?}");
        };
        assert_eq!(*next, generation.next());
        assert_eq!(
            filters.query_pairs(),
            vec![
                ("city", "Pune".to_string()),
                ("purpose", "Rent".to_string()),
                ("type", "Villa".to_string())
            ]
        );

        let unknown = FilterSelection {
            city: Some("Atlantis".into()),
            ..Default::default()
        };
        assert!(view.handle(MapEvent::SelectFilters(unknown)).is_empty());
    }

    #[test]
    fn stale_responses_never_replace_newer_ones() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        let all = view.handle(MapEvent::SelectPurpose(Purpose::Sale));
        let Command::FetchStats { generation: sale_gen, .. } = all[0].clone() else {
            panic!()
        };
        let rent = view.handle(MapEvent::SelectPurpose(Purpose::Rent));
        let Command::FetchStats { generation: rent_gen, .. } = rent[0].clone() else {
            panic!()
        };

        view.handle(MapEvent::StatsLoaded {
            generation: rent_gen,
            stats: snapshot(&[("380001", 2, 2500.0)]),
        });
        view.handle(MapEvent::StatsLoaded {
            generation: sale_gen,
            stats: snapshot(&[("380001", 9, 14000.0)]),
        });

        let frame = view.frame();
        assert_eq!(frame.filters.purpose, Purpose::Rent);
        assert_eq!(frame.generation, Some(rent_gen));
        assert_eq!(frame.polygon_for("380001").unwrap().stat.unwrap().listing_count, 2);
    }

    #[test]
    fn boundary_failure_renders_empty_with_error() {
        let mut view = view();
        let generation = open(&mut view);
        view.handle(MapEvent::BoundariesLoaded {
            generation,
            result: Err(BoundaryLoadError::Unavailable {
                file: "ahmedabad.geojson".into(),
                status: 404,
            }),
        });
        view.handle(MapEvent::StatsLoaded {
            generation,
            stats: snapshot(&[("395004", 1, 100.0)]),
        });

        let frame = view.frame();
        assert!(frame.is_settled());
        assert!(frame.polygons.is_empty());
        assert!(frame.boundary_error.unwrap().contains("404"));

        // The failed set is not reused: a narrowing change retries the load.
        let cmds = view.handle(MapEvent::SelectPropertyType(PropertyType::Villa));
        assert!(matches!(cmds[0], Command::LoadBoundaries { .. }));
    }

    #[test]
    fn click_closes_then_navigates() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        let cmds = view.handle(MapEvent::Clicked(coord! { x: 2.5, y: 0.5 }));
        assert_eq!(
            cmds,
            vec![
                Command::Close,
                Command::Navigate {
                    postal_code: "400001".into()
                }
            ]
        );
        assert_eq!(view.phase(), Phase::Closed);
        assert!(view.handle(MapEvent::Clicked(coord! { x: 2.5, y: 0.5 })).is_empty());
    }

    #[test]
    fn clicks_outside_polygons_do_nothing() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));
        assert!(view.handle(MapEvent::Clicked(coord! { x: 1.5, y: 0.5 })).is_empty());
        assert_eq!(view.phase(), Phase::Ready);
    }

    #[test]
    fn results_after_close_are_released() {
        let mut view = view();
        let generation = open(&mut view);
        view.handle(MapEvent::Close);
        settle(&mut view, generation, snapshot(&[]));
        let frame = view.frame();
        assert_eq!(frame.phase, Phase::Closed);
        assert!(frame.polygons.is_empty());

        // Reopening mints a new generation; the old one stays dead.
        let reopened = open(&mut view);
        assert!(reopened > generation);
        settle(&mut view, generation, snapshot(&[]));
        assert!(view.frame().loading);
    }

    #[test]
    fn hover_survives_stats_refresh_and_reads_new_data() {
        let mut view = view();
        let generation = open(&mut view);
        settle(&mut view, generation, snapshot(&[]));

        view.handle(MapEvent::PointerMoved(coord! { x: 0.5, y: 0.5 }));
        let tip = view.frame().tooltip.unwrap();
        assert_eq!(tip.postal_code, "395004");
        assert_eq!(tip.listing_count, 0);

        let cmds = view.handle(MapEvent::SelectPurpose(Purpose::Sale));
        let Command::FetchStats { generation: next, .. } = cmds[0].clone() else {
            panic!()
        };
        view.handle(MapEvent::StatsLoaded {
            generation: next,
            stats: snapshot(&[("395004", 5, 3300.0)]),
        });

        let frame = view.frame();
        assert_eq!(frame.tooltip.unwrap().listing_count, 5);
        assert_eq!(frame.polygons.last().unwrap().index, 0);

        view.handle(MapEvent::PointerLeft);
        let resting = view.frame();
        let polygon = resting.polygon_for("395004").unwrap();
        assert_eq!(polygon.style.fill.to_string(), "#facc15");
        assert_eq!(polygon.style.fill_opacity, DATA_FILL_OPACITY);
        assert!(resting.tooltip.is_none());
    }
}
