use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use density_map::config::AppConfig;
use density_map::session::{spawn_live, MapHost};
use density_map::types::{Filters, PropertyType, Purpose};
use density_map::view::MapEvent;
use density_map::{render, server};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the choropleth for one filter selection to files
    Snapshot {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Defaults to `map.default_city`
        #[arg(long)]
        city: Option<String>,
        #[arg(long, default_value_t = Purpose::All)]
        purpose: Purpose,
        #[arg(long = "type", default_value_t = PropertyType::All)]
        property_type: PropertyType,
        /// Write the styled polygons as a GeoJSON FeatureCollection
        #[arg(long, value_name = "FILE")]
        geojson: Option<PathBuf>,
        /// Write the choropleth as a PNG image
        #[arg(long, value_name = "FILE")]
        png: Option<PathBuf>,
        #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
        width: u32,
        #[arg(long, default_value_t = 768, value_parser = clap::value_parser!(u32).range(1..))]
        height: u32,
        /// Seconds to wait for both data sources
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Serve a live map session over HTTP
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

/// Host signals have nowhere to go from the command line.
struct SnapshotHost;

impl MapHost for SnapshotHost {
    fn close(&mut self) {}

    fn navigate(&mut self, _postal_code: &str) {}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Snapshot {
            config,
            city,
            purpose,
            property_type,
            geojson,
            png,
            width,
            height,
            timeout,
        } => {
            if geojson.is_none() && png.is_none() {
                bail!("Nothing to write: pass --geojson and/or --png");
            }
            println!("Rendering snapshot with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;

            let city = match city {
                Some(name) => app_config.city(&name)?,
                None => app_config.default_city()?,
            };
            let filters = Filters {
                city,
                purpose,
                property_type,
            };
            println!(
                "City: {}, purpose: {}, type: {}",
                filters.city.name, filters.purpose, filters.property_type
            );

            let (mut session, _task) = spawn_live(&app_config, filters, SnapshotHost)?;
            session.send(MapEvent::Open)?;
            let frame = tokio::time::timeout(Duration::from_secs(timeout), session.settled())
                .await
                .with_context(|| format!("Map did not settle within {}s", timeout))??;

            if let Some(error) = &frame.boundary_error {
                println!("Warning: no boundaries rendered ({})", error);
            }
            let with_data = frame.polygons.iter().filter(|p| p.stat.is_some()).count();
            println!("{} polygons, {} with statistics", frame.polygons.len(), with_data);

            if let Some(path) = &geojson {
                render::write_geojson(&frame, path)?;
                println!("Wrote {:?}", path);
            }
            if let Some(path) = &png {
                render::write_png(&frame, width, height, path)?;
                println!("Wrote {:?}", path);
            }
            println!("Snapshot complete!");
        }
        Commands::Serve { config } => {
            println!("Serving map with config: {:?}", config);
            let app_config = AppConfig::load_from_file(&config)?;
            server::start_server(app_config).await?;
        }
    }

    Ok(())
}
