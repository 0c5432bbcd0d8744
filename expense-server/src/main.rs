#[macro_use]
extern crate tracing;

use std::error::Error;
use std::path::{Path, PathBuf};

use actix_cors::Cors;
use actix_files::{Files, NamedFile};
use actix_web::dev::{fn_service, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry;

use expense_lib::config::Config;
use expense_lib::form::UploadLimit;

const SERVICE_NAME: &str = "expense-server";

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let subscriber = registry::Registry::default()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::Layer::default());
    let tracing_guard = tracing::subscriber::set_default(subscriber);
    info!("tracing initialized");

    let config = match get_config_file() {
        Some(config_path) => {
            info!(config = %config_path.display(), "Loading config file");
            Config::from_file(config_path)?
        }
        None => Config::from_env()?,
    };

    let telemetry_layer = match &config.telemetry {
        Some(telemetry) => Some(expense_lib::tracing::create_opentelemetry_layer(
            SERVICE_NAME,
            telemetry,
        )?),
        None => None,
    };
    let subscriber = registry::Registry::default()
        .with(LevelFilter::INFO)
        .with(tracing_subscriber::fmt::Layer::default())
        .with(telemetry_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    drop(tracing_guard);

    let repos = match expense_repo::sqlx_repo::create_repos(
        config.database_path(),
        config.max_pool_size,
        &config.storage_dir,
    )
    .await
    {
        Ok(repos) => repos,
        Err(err) => {
            error!("Unable to initialize storage: {:#}", err);
            std::process::exit(1);
        }
    };

    let upload_limit = UploadLimit(config.max_upload_bytes);
    let static_dir = config.static_dir.clone();
    let server = HttpServer::new(move || {
        let app = App::new()
            .wrap(Cors::permissive())
            .wrap(expense_lib::tracing::create_middleware())
            .configure(expense_lib::app_config_func(repos.clone(), upload_limit));
        match &static_dir {
            Some(static_dir) => app.service(frontend_service(static_dir)),
            None => app,
        }
    });

    info!(address = %config.bind_address, "Starting server");
    server.bind(&config.bind_address)?.run().await?;

    Ok(())
}

/// Serves the frontend build. Unknown paths get `index.html` so client-side
/// routes survive a reload.
fn frontend_service(static_dir: &Path) -> Files {
    let index = static_dir.join("index.html");
    Files::new("/", static_dir)
        .index_file("index.html")
        .default_handler(fn_service(move |req: ServiceRequest| {
            let index = index.clone();
            async move {
                let (req, _) = req.into_parts();
                let file = NamedFile::open_async(index).await?;
                let response = file.into_response(&req);
                Ok(ServiceResponse::new(req, response))
            }
        }))
}

fn get_config_file() -> Option<PathBuf> {
    let config_current_dir = PathBuf::from("config.toml");
    if config_current_dir.exists() {
        return Some(config_current_dir);
    }
    if let Ok(config_env) = std::env::var("CONFIGURATION_DIRECTORY") {
        let config_path = PathBuf::from(config_env).join("config.toml");
        if config_path.exists() {
            return Some(config_path);
        }
    }

    None
}
