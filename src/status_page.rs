//! HTML rendering of the status/control page.

use crate::{
    clock,
    config::{Theme, UiConfig},
    controller::{RestartRejected, RunStatus, StatusSnapshot},
};
const BUTTON_CSS: &str = "button { border: 1px solid transparent; border-radius: .65rem; \
    cursor: pointer; font-family: arial, sans-serif; font-size: .9rem; font-weight: 250; \
    line-height: 1rem; padding: .5rem .8rem; transition-duration: .2s; \
    transition-property: background-color, border-color, color; user-select: none; } \
    button:focus { box-shadow: none; outline: 2px solid transparent; outline-offset: 2px; } \
    @media (min-width: 768px) { button { padding: .5rem 1rem; } }";

fn theme_css(theme: Theme) -> String {
    let (body, button, hover) = match theme {
        Theme::Light => (
            "font-family: arial, sans-serif;",
            "background-color: #dddddd; color: #222222;",
            "#cccccc",
        ),
        Theme::Dark => (
            "font-family: arial, sans-serif; color: #cccccc; background-color: #111111;",
            "background-color: #333333; color: #ffffff;",
            "#374151",
        ),
    };

    format!(
        "body {{ {body} }} {BUTTON_CSS} button {{ {button} }} button:hover {{ background-color: {hover}; }}"
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn head(ui: &UiConfig) -> String {
    let favicon = ui
        .favicon
        .as_deref()
        .map(|href| format!(r#"<link rel="icon" type="image/png" href="{}"/>"#, escape(href)))
        .unwrap_or_default();

    format!(
        "<!DOCTYPE html><html><head>{favicon}<style>{}</style></head><body>",
        theme_css(ui.theme)
    )
}

fn button(ui: &UiConfig, path: &str, label: &str) -> String {
    format!(
        r#"<button type="submit" onclick="location.href='{}{path}'">{label}</button><br/><br/>"#,
        escape(&ui.server_url)
    )
}

fn or_dash(value: Option<&String>) -> &str {
    value.map(String::as_str).unwrap_or("-")
}

pub fn render(snapshot: &StatusSnapshot, ui: &UiConfig) -> String {
    let mut page = head(ui);

    let status_info = match (&snapshot.status, &snapshot.pause_until) {
        (RunStatus::Paused, Some(until)) => format!("(Until {until})"),
        _ => format!("(Since {})", snapshot.status_since),
    };

    let last_ip = snapshot
        .last_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "-".to_string());
    let last_outcome = snapshot
        .last_outcome
        .map(|outcome| outcome.description())
        .unwrap_or("-");
    let counts = &snapshot.outcome_counts;
    let counters = &snapshot.counters;

    page.push_str(&format!(
        "Netgear Rebooter Status: <b>{}</b> {status_info}<br/><br/>\
         Last IP found: <b>{last_ip}</b> [ {} ]<br/>\
         Last run state: <b>{last_outcome}</b> [ {} ]<br/>\
         Last router login: <b>{}</b><br/>\
         Last router reboot: <b>{}</b><br/><br/>\
         Total run count: <b>{}</b> (external: {}, internal: {}, unauthenticated: {}, skipped: {})<br/>\
         Total login count: <b>{}</b> ({} attempts)<br/>\
         Total reboot count: <b>{}</b> ({} attempts)<br/><br/>\
         Current restart attempts: {} (Limit: {})<br/>\
         Current login attempts: {} (Limit: {})<br/><br/>",
        snapshot.status,
        or_dash(snapshot.last_ip_timestamp.as_ref()),
        or_dash(snapshot.last_run_attempt.as_ref()),
        or_dash(snapshot.last_login.as_ref()),
        or_dash(snapshot.last_reboot.as_ref()),
        counts.total,
        counts.external,
        counts.internal,
        counts.unauthenticated,
        counts.skipped,
        counters.total_login_count,
        counters.total_login_attempts,
        counters.total_reboot_count,
        counters.total_reboot_attempts,
        counters.reboot_attempts,
        snapshot.allowed_restart_attempts,
        counters.login_attempts,
        snapshot.allowed_login_attempts,
    ));

    page.push_str(&button(ui, "/restart", "Restart / Unpause"));
    page.push_str(&button(ui, "/", "Refresh Page"));
    page.push_str(&button(ui, "/pause", "10 Minute Pause"));
    page.push_str(&button(ui, "/stop", "Stop Checks"));

    page.push_str(&format!(
        "Server started at {}<br/>Page updated at {}</body></html>",
        snapshot.started_at,
        clock::format(&clock::now())
    ));

    page
}

pub fn render_rejection(rejected: &RestartRejected, ui: &UiConfig) -> String {
    format!(
        "{}{rejected}<br/><br/>{}</body></html>",
        head(ui),
        button(ui, "/", "Home")
    )
}
