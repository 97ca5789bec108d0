use crate::{config::UiConfig, controller::ControllerHandle, status_page};
use actix_web::{
    HttpResponse, Responder,
    http::header::{ContentType, LOCATION},
    web,
};
use anyhow::Result;
use log::{debug, error};

#[derive(Clone)]
pub struct Api {
    pub controller: ControllerHandle,
    pub ui: UiConfig,
}

impl Api {
    pub fn new(controller: ControllerHandle, ui: UiConfig) -> Self {
        Api { controller, ui }
    }

    /// Register all routes below the configured base url
    pub fn configure(cfg: &mut web::ServiceConfig, base_url: &str) {
        cfg.service(
            web::scope(base_url)
                .route("/", web::get().to(Self::index))
                .route("/status.json", web::get().to(Self::status_json))
                .service(
                    web::resource("/stop")
                        .route(web::get().to(Self::stop))
                        .route(web::post().to(Self::stop)),
                )
                .service(
                    web::resource("/pause")
                        .route(web::get().to(Self::pause))
                        .route(web::post().to(Self::pause)),
                )
                .service(
                    web::resource("/restart")
                        .route(web::get().to(Self::restart))
                        .route(web::post().to(Self::restart)),
                )
                .route("/version", web::get().to(Self::version))
                .route("/healthcheck", web::get().to(Self::healthcheck)),
        );
    }

    pub async fn index(api: web::Data<Self>) -> impl Responder {
        debug!("index() called");

        match api.controller.snapshot().await {
            Ok(snapshot) => HttpResponse::Ok()
                .content_type(ContentType::html())
                .body(status_page::render(&snapshot, &api.ui)),
            Err(e) => Self::controller_unavailable(e, "index"),
        }
    }

    pub async fn status_json(api: web::Data<Self>) -> impl Responder {
        debug!("status_json() called");

        match api.controller.snapshot().await {
            Ok(snapshot) => HttpResponse::Ok().json(&snapshot),
            Err(e) => Self::controller_unavailable(e, "status_json"),
        }
    }

    pub async fn stop(api: web::Data<Self>) -> impl Responder {
        debug!("stop() called");
        api.redirect_home(api.controller.stop().await, "stop")
    }

    pub async fn pause(api: web::Data<Self>) -> impl Responder {
        debug!("pause() called");
        api.redirect_home(api.controller.pause().await, "pause")
    }

    pub async fn restart(api: web::Data<Self>) -> impl Responder {
        debug!("restart() called");

        match api.controller.restart().await {
            Ok(Ok(())) => api.redirect_home(Ok(()), "restart"),
            Ok(Err(rejected)) => HttpResponse::Conflict()
                .content_type(ContentType::html())
                .body(status_page::render_rejection(&rejected, &api.ui)),
            Err(e) => Self::controller_unavailable(e, "restart"),
        }
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    pub async fn healthcheck(api: web::Data<Self>) -> impl Responder {
        debug!("healthcheck() called");

        match api.controller.snapshot().await {
            Ok(snapshot) => HttpResponse::Ok().body(snapshot.status.to_string()),
            Err(e) => {
                error!("healthcheck failed: {e:#}");
                HttpResponse::ServiceUnavailable().body(e.to_string())
            }
        }
    }

    fn redirect_home(&self, result: Result<()>, operation: &str) -> HttpResponse {
        match result {
            Ok(()) => HttpResponse::Found()
                .append_header((LOCATION, format!("{}/", self.ui.server_url)))
                .finish(),
            Err(e) => Self::controller_unavailable(e, operation),
        }
    }

    fn controller_unavailable(e: anyhow::Error, operation: &str) -> HttpResponse {
        error!("{operation} failed: {e:#}");
        HttpResponse::InternalServerError().body(e.to_string())
    }
}
