use anyhow::{Context, Result, bail, ensure};
use std::{env, net::Ipv4Addr, path::PathBuf, str::FromStr, time::Duration};

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Status/control server configuration
    pub ui: UiConfig,

    /// Router access configuration
    pub router: RouterConfig,

    /// Control loop tuning
    pub controller: ControllerConfig,

    /// Log file configuration
    pub log: LogConfig,
}

#[derive(Clone, Debug)]
pub struct UiConfig {
    pub port: u16,
    pub base_url: String,
    /// Public URL used for links and redirects, base url included
    pub server_url: String,
    pub favicon: Option<String>,
    pub theme: Theme,
}

#[derive(Clone, Debug)]
pub struct RouterConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub lan_network: LanNetwork,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ControllerConfig {
    pub check_interval: Duration,
    pub allowed_login_attempts: u32,
    pub allowed_restart_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub file: PathBuf,
    /// Upper case level names that are never written
    pub ignored_levels: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// IPv4 network in CIDR notation, e.g. `192.168.0.0/16`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LanNetwork {
    addr: Ipv4Addr,
    prefix_len: u8,
}

impl AppConfig {
    /// Load and validate all configuration from environment variables
    pub fn load() -> Result<Self> {
        let ui = UiConfig::load()?;
        let router = RouterConfig::load()?;
        let controller = ControllerConfig::load()?;
        let log = LogConfig::load()?;

        Ok(Self {
            ui,
            router,
            controller,
            log,
        })
    }
}

impl UiConfig {
    fn load() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("failed to parse PORT: invalid format")?;

        let base_url = normalize_base_url(&env::var("BASE_URL").unwrap_or_default());

        let server_url = env::var("SERVER_URL").unwrap_or_else(|_| {
            let local_ip =
                env::var("SERVER_LOCAL_IP").unwrap_or_else(|_| "localhost".to_string());
            format!("http://{local_ip}:{port}")
        });
        let server_url = format!("{}{base_url}", server_url.trim_end_matches('/'));

        let favicon = env::var("UI_FAVICON_FILE").ok().filter(|f| !f.is_empty());

        let theme = env::var("THEME")
            .unwrap_or_else(|_| "light".to_string())
            .parse::<Theme>()
            .context("failed to parse THEME")?;

        Ok(Self {
            port,
            base_url,
            server_url,
            favicon,
            theme,
        })
    }
}

impl RouterConfig {
    fn load() -> Result<Self> {
        let host = env::var("NETGEAR_IP").context("failed to get NETGEAR_IP")?;
        let user = env::var("NETGEAR_USER").context("failed to get NETGEAR_USER")?;
        let password = env::var("NETGEAR_PASS").context("failed to get NETGEAR_PASS")?;

        let lan_network = env::var("ROUTER_LAN_NETWORK")
            .unwrap_or_else(|_| "192.168.0.0/16".to_string())
            .parse::<LanNetwork>()
            .context("failed to parse ROUTER_LAN_NETWORK")?;

        let timeout = env::var("ROUTER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .context("failed to parse ROUTER_TIMEOUT_SECS: invalid format")?;

        Ok(Self {
            host,
            user,
            password,
            lan_network,
            timeout: Duration::from_secs(timeout),
        })
    }
}

impl ControllerConfig {
    fn load() -> Result<Self> {
        let check_interval = env::var("RUN_INTERVAL")
            .unwrap_or_else(|_| "60000".to_string())
            .parse::<u64>()
            .context("failed to parse RUN_INTERVAL: invalid format")?;

        ensure!(check_interval > 0, "RUN_INTERVAL must be greater than 0");

        let allowed_login_attempts = env::var("ALLOWED_LOGIN_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .context("failed to parse ALLOWED_LOGIN_ATTEMPTS: invalid format")?;

        let allowed_restart_attempts = env::var("ALLOWED_RESTART_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<u32>()
            .context("failed to parse ALLOWED_RESTART_ATTEMPTS: invalid format")?;

        Ok(Self {
            check_interval: Duration::from_millis(check_interval),
            allowed_login_attempts,
            allowed_restart_attempts,
        })
    }
}

impl LogConfig {
    fn load() -> Result<Self> {
        let dir = env::var("LOG_DIR").unwrap_or_default();
        let ignored_levels =
            parse_ignored_levels(&env::var("IGNORED_LOG_LEVELS").unwrap_or_default());

        Ok(Self {
            file: PathBuf::from(format!("{dir}{}.log", env!("CARGO_PKG_NAME"))),
            ignored_levels,
        })
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => bail!("unknown theme: {other}"),
        }
    }
}

impl LanNetwork {
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = match self.prefix_len {
            0 => 0,
            len => u32::MAX << (32 - u32::from(len)),
        };
        u32::from(ip) & mask == u32::from(self.addr) & mask
    }
}

impl FromStr for LanNetwork {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix_len) = s
            .trim()
            .split_once('/')
            .context(format!("missing prefix length in {s}"))?;

        let addr = addr
            .parse::<Ipv4Addr>()
            .context(format!("invalid network address in {s}"))?;
        let prefix_len = prefix_len
            .parse::<u8>()
            .context(format!("invalid prefix length in {s}"))?;

        ensure!(prefix_len <= 32, "prefix length must not exceed 32: {s}");

        Ok(Self { addr, prefix_len })
    }
}

fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn parse_ignored_levels(levels: &str) -> Vec<String> {
    levels
        .split(',')
        .map(|level| level.trim().to_ascii_uppercase())
        .filter(|level| !level.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod lan_network {
        use super::*;

        #[test]
        fn parses_cidr_notation() {
            let network = "192.168.0.0/16".parse::<LanNetwork>().unwrap();
            assert!(network.contains(Ipv4Addr::new(192, 168, 1, 1)));
            assert!(network.contains(Ipv4Addr::new(192, 168, 255, 254)));
            assert!(!network.contains(Ipv4Addr::new(192, 169, 0, 1)));
            assert!(!network.contains(Ipv4Addr::new(203, 0, 113, 5)));
        }

        #[test]
        fn zero_prefix_matches_everything() {
            let network = "0.0.0.0/0".parse::<LanNetwork>().unwrap();
            assert!(network.contains(Ipv4Addr::new(8, 8, 8, 8)));
        }

        #[test]
        fn full_prefix_matches_single_address() {
            let network = "10.0.0.1/32".parse::<LanNetwork>().unwrap();
            assert!(network.contains(Ipv4Addr::new(10, 0, 0, 1)));
            assert!(!network.contains(Ipv4Addr::new(10, 0, 0, 2)));
        }

        #[test]
        fn rejects_invalid_input() {
            assert!("192.168.0.0".parse::<LanNetwork>().is_err());
            assert!("192.168.0.0/33".parse::<LanNetwork>().is_err());
            assert!("not-an-ip/8".parse::<LanNetwork>().is_err());
        }
    }

    mod ui {
        use super::*;

        #[test]
        fn base_url_is_normalized() {
            assert_eq!(normalize_base_url(""), "");
            assert_eq!(normalize_base_url("/"), "");
            assert_eq!(normalize_base_url("rebooter"), "/rebooter");
            assert_eq!(normalize_base_url("/rebooter/"), "/rebooter");
        }

        #[test]
        fn theme_is_case_insensitive() {
            assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
            assert_eq!("light".parse::<Theme>().unwrap(), Theme::Light);
            assert!("blue".parse::<Theme>().is_err());
        }
    }

    mod log {
        use super::*;

        #[test]
        fn ignored_levels_are_upper_cased_and_trimmed() {
            assert_eq!(
                parse_ignored_levels("debug, Info,,"),
                vec!["DEBUG".to_string(), "INFO".to_string()]
            );
            assert!(parse_ignored_levels("").is_empty());
        }
    }
}
