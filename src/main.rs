use actix_server::ServerHandle;
use actix_web::{App, HttpServer, web::Data};
use anyhow::{Context, Result};
use log::{debug, error, info};
use netgear_rebooter::{
    api::Api,
    config::{AppConfig, UiConfig},
    controller::{Controller, ControllerState},
    logger,
    router_client::NetgearClient,
};
use tokio::signal::unix::{SignalKind, signal};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        eprintln!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    initialize(&config)?;

    let client = NetgearClient::new(&config.router).context("failed to create router client")?;
    let state = ControllerState::new(&config.controller, config.router.lan_network);
    let (controller, controller_handle) =
        Controller::new(state, client, config.controller.check_interval);
    let controller_task = tokio::spawn(controller.run());

    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    let api = Api::new(controller_handle, config.ui.clone());
    let (server_handle, server_task) = run_server(api, &config.ui)?;

    info!("Running at {}", config.ui.server_url);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT - Shutting down");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM - Shutting down");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    }

    server_handle.stop(false).await;
    controller_task.abort();

    debug!("good bye");

    Ok(())
}

fn initialize(config: &AppConfig) -> Result<()> {
    log_panics::init();

    logger::init(&config.log)?;

    info!("Service starting");
    info!("module version: {}", env!("CARGO_PKG_VERSION"));

    Ok(())
}

fn run_server(
    api: Api,
    ui: &UiConfig,
) -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let base_url = ui.base_url.clone();

    let server = HttpServer::new(move || {
        let base_url = base_url.clone();
        App::new()
            .app_data(Data::new(api.clone()))
            .configure(move |cfg| Api::configure(cfg, &base_url))
    })
    .bind(("0.0.0.0", ui.port))
    .context("failed to bind server")?
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}
