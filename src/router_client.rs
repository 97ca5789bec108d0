use crate::{
    config::RouterConfig,
    http_client::{handle_http_response, router_http_client},
};
use anyhow::{Context, Result};
use log::debug;
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use regex::Regex;
use reqwest::{Client, header::CONTENT_TYPE};
use std::sync::OnceLock;
use trait_variant::make;

/// Access to the router's web administration interface
#[make(Send)]
#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait RouterClient {
    /// Fetch the admin status page; any non-200 answer is an error
    async fn status_page(&self) -> Result<String>;
    /// Make the router set up its auth state before the next attempt
    async fn prime(&self) -> Result<()>;
    /// Ask the router to reboot itself
    async fn reboot(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct NetgearClient {
    client: Client,
    host: String,
    user: String,
    password: String,
}

impl NetgearClient {
    const STATUS_PAGE_ENDPOINT: &str = "/ADVANCED_home2.htm";
    const REBOOT_ENDPOINT: &str = "/newgui_adv_home.cgi";
    const REBOOT_BUTTON_TYPE: &str = "2";

    pub fn new(config: &RouterConfig) -> Result<Self> {
        Ok(NetgearClient {
            client: router_http_client(config.timeout)?,
            host: config.host.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        let host = self
            .host
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let normalized_path = path.trim_start_matches('/');
        format!("http://{host}/{normalized_path}")
    }

    fn session_id_regex() -> &'static Regex {
        static SESSION_ID: OnceLock<Regex> = OnceLock::new();
        SESSION_ID.get_or_init(|| Regex::new(r"id=([a-f0-9]+)").expect("invalid session id regex"))
    }

    /// Extract the session id the reboot CGI expects from the status page
    fn session_id(page: &str) -> Option<&str> {
        Self::session_id_regex()
            .captures(page)
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str())
    }
}

impl RouterClient for NetgearClient {
    async fn status_page(&self) -> Result<String> {
        let url = self.build_url(Self::STATUS_PAGE_ENDPOINT);
        debug!("GET {url}");

        let res = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .context(format!("failed to send GET request to {url}"))?;

        handle_http_response(res, &format!("GET {url}")).await
    }

    async fn prime(&self) -> Result<()> {
        let url = self.build_url(Self::STATUS_PAGE_ENDPOINT);
        debug!("priming GET {url}");

        // the router only hands out its auth token after an unauthenticated
        // request, the status of either answer is irrelevant
        self.client
            .get(&url)
            .send()
            .await
            .context(format!("failed to send priming GET request to {url}"))?;

        self.client
            .get(&url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await
            .context(format!("failed to send authenticated priming GET request to {url}"))?;

        Ok(())
    }

    async fn reboot(&self) -> Result<()> {
        let page = self
            .status_page()
            .await
            .context("failed to load status page for reboot")?;

        let session_id =
            Self::session_id(&page).context("failed to find session id in status page")?;

        let url = format!(
            "{}?id={session_id}",
            self.build_url(Self::REBOOT_ENDPOINT)
        );
        let body = format!("id={session_id}&buttonType={}", Self::REBOOT_BUTTON_TYPE);
        debug!("POST {url} with body: {body}");

        let res = self
            .client
            .post(&url)
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .context(format!("failed to send POST request to {url}"))?;

        handle_http_response(res, &format!("POST {url}")).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn create_test_client(host: &str) -> NetgearClient {
        NetgearClient::new(&RouterConfig {
            host: host.to_string(),
            user: "admin".to_string(),
            password: "secret".to_string(),
            lan_network: "192.168.0.0/16".parse().unwrap(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    mod build_url {
        use super::*;

        #[test]
        fn normalizes_path_with_leading_slash() {
            let client = create_test_client("192.168.1.1");
            let url = client.build_url("/ADVANCED_home2.htm");
            assert_eq!(url, "http://192.168.1.1/ADVANCED_home2.htm");
        }

        #[test]
        fn normalizes_path_without_leading_slash() {
            let client = create_test_client("192.168.1.1");
            let url = client.build_url("newgui_adv_home.cgi");
            assert_eq!(url, "http://192.168.1.1/newgui_adv_home.cgi");
        }

        #[test]
        fn tolerates_scheme_and_trailing_slash_in_host() {
            let client = create_test_client("http://routerlogin.net/");
            let url = client.build_url("/ADVANCED_home2.htm");
            assert_eq!(url, "http://routerlogin.net/ADVANCED_home2.htm");
        }
    }

    mod session_id {
        use super::*;

        #[test]
        fn extracts_first_hex_id() {
            let page = r#"<form action="newgui_adv_home.cgi?id=3fa9c01b" method="post">"#;
            assert_eq!(NetgearClient::session_id(page), Some("3fa9c01b"));
        }

        #[test]
        fn missing_id_yields_none() {
            assert_eq!(NetgearClient::session_id("<html></html>"), None);
        }
    }

    mod constants {
        use super::*;

        #[test]
        fn endpoints_are_correctly_defined() {
            assert_eq!(
                NetgearClient::STATUS_PAGE_ENDPOINT,
                "/ADVANCED_home2.htm"
            );
            assert_eq!(NetgearClient::REBOOT_ENDPOINT, "/newgui_adv_home.cgi");
            assert_eq!(NetgearClient::REBOOT_BUTTON_TYPE, "2");
        }
    }
}
