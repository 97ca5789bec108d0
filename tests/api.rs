use actix_web::{
    App,
    http::{StatusCode, header::LOCATION},
    test, web,
};
use anyhow::Result;
use netgear_rebooter::{
    api::Api,
    config::{ControllerConfig, Theme, UiConfig},
    controller::{Controller, ControllerHandle, ControllerState, StatusSnapshot},
    router_client::RouterClient,
};
use std::time::Duration;

const BASE_URL: &str = "/rebooter";
const SERVER_URL: &str = "http://nas.local:3000/rebooter";

struct FakeRouter {
    wan_ip: &'static str,
}

impl RouterClient for FakeRouter {
    async fn status_page(&self) -> Result<String> {
        Ok(format!("<td>10.0.0.1</td><td>{}</td>", self.wan_ip))
    }

    async fn prime(&self) -> Result<()> {
        Ok(())
    }

    async fn reboot(&self) -> Result<()> {
        Ok(())
    }
}

fn ui_config() -> UiConfig {
    UiConfig {
        port: 3000,
        base_url: BASE_URL.to_string(),
        server_url: SERVER_URL.to_string(),
        favicon: None,
        theme: Theme::Light,
    }
}

fn controller(wan_ip: &'static str) -> (Controller<FakeRouter>, ControllerHandle) {
    let config = ControllerConfig {
        check_interval: Duration::from_secs(60),
        allowed_login_attempts: 2,
        allowed_restart_attempts: 2,
    };
    let state = ControllerState::new(&config, "192.168.0.0/16".parse().unwrap());

    Controller::new(state, FakeRouter { wan_ip }, config.check_interval)
}

fn start_controller(wan_ip: &'static str) -> ControllerHandle {
    let (controller, handle) = controller(wan_ip);
    tokio::spawn(controller.run());
    handle
}

async fn first_cycle(handle: &ControllerHandle) -> StatusSnapshot {
    for _ in 0..100 {
        let snapshot = handle.snapshot().await.expect("controller not running");
        if snapshot.outcome_counts.total > 0 {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("controller did not complete a poll cycle");
}

macro_rules! init_app {
    ($handle:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(Api::new($handle.clone(), ui_config())))
                .configure(|cfg| Api::configure(cfg, BASE_URL)),
        )
        .await
    };
}

#[tokio::test]
async fn index_renders_status_page() {
    let handle = start_controller("203.0.113.5");
    first_cycle(&handle).await;
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Netgear Rebooter Status: <b>RUNNING</b>"));
    assert!(body.contains("Last IP found: <b>203.0.113.5</b>"));
    assert!(body.contains("External IP found (no operation)"));
}

#[tokio::test]
async fn status_json_reports_outcome() {
    let handle = start_controller("203.0.113.5");
    first_cycle(&handle).await;
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/status.json").to_request();
    let json: serde_json::Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(json["status"], "RUNNING");
    assert_eq!(json["last_ip"], "203.0.113.5");
    assert_eq!(json["last_outcome"], "FOUND_EXTERNAL");
    assert_eq!(json["outcome_counts"]["total"], 1);
}

#[tokio::test]
async fn internal_ip_is_reported_as_rebooting() {
    let handle = start_controller("192.168.1.1");
    let snapshot = first_cycle(&handle).await;

    assert_eq!(snapshot.counters.reboot_attempts, 1);

    let app = init_app!(handle);
    let req = test::TestRequest::get().uri("/rebooter/healthcheck").to_request();
    let body = test::call_and_read_body(&app, req).await;

    assert_eq!(body, "REBOOTING");
}

#[tokio::test]
async fn stop_redirects_home_and_stops() {
    let handle = start_controller("203.0.113.5");
    let app = init_app!(handle);

    let req = test::TestRequest::post().uri("/rebooter/stop").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(LOCATION).unwrap(),
        "http://nas.local:3000/rebooter/"
    );

    let req = test::TestRequest::get().uri("/rebooter/healthcheck").to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "STOPPED");
}

#[tokio::test]
async fn restart_while_running_is_rejected() {
    let handle = start_controller("203.0.113.5");
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/restart").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(body.contains("Did not restart, status [RUNNING] does not allow restarting"));
}

#[tokio::test]
async fn pause_then_restart_resumes() {
    let handle = start_controller("203.0.113.5");
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/pause").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FOUND);

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.pause_until.is_some());

    let req = test::TestRequest::get().uri("/rebooter/restart").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FOUND);

    let req = test::TestRequest::get().uri("/rebooter/healthcheck").to_request();
    assert_eq!(test::call_and_read_body(&app, req).await, "RUNNING");
}

#[tokio::test]
async fn routes_live_below_base_url() {
    let handle = start_controller("203.0.113.5");
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/version").to_request();
    assert_eq!(
        test::call_and_read_body(&app, req).await,
        env!("CARGO_PKG_VERSION")
    );

    let req = test::TestRequest::get().uri("/version").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn missing_controller_is_reported() {
    let (controller, handle) = controller("203.0.113.5");
    drop(controller);
    let app = init_app!(handle);

    let req = test::TestRequest::get().uri("/rebooter/").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::INTERNAL_SERVER_ERROR
    );

    let req = test::TestRequest::get().uri("/rebooter/healthcheck").to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}
