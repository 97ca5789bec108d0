pub mod api;
pub mod clock;
pub mod config;
pub mod controller;
pub mod http_client;
pub mod logger;
pub mod router_client;
pub mod status_page;
