use clap::Parser;
use std::net::SocketAddr;

/// Live football relay: polls API-Football and fans goals out over SSE
#[derive(Parser, Debug, Clone)]
#[command(name = "matchlive", version, about)]
pub struct Config {
    /// HTTP listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:3000")]
    pub listen_addr: String,

    /// API-Football base URL
    #[arg(
        long,
        env = "API_FOOTBALL_URL",
        default_value = "https://v3.football.api-sports.io"
    )]
    pub api_football_url: String,

    /// API-Football key (sent as x-apisports-key). Checked on first use, not at startup.
    #[arg(long, env = "API_FOOTBALL_KEY")]
    pub api_football_key: Option<String>,

    /// Per-request upstream timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub request_timeout_secs: u64,

    /// Run the background poller that pushes goals to stream subscribers
    #[arg(long, env = "ENABLE_POLLER", default_value = "true", action = clap::ArgAction::Set)]
    pub enable_poller: bool,

    /// Event kinds pushed individually to subscribers (comma separated)
    #[arg(long, env = "NOTABLE_KINDS", default_value = "goal", value_delimiter = ',')]
    pub notable_kinds: Vec<String>,

    /// Shared key required on /api/* (x-ml-key header or ?key=)
    #[arg(long, env = "APP_KEY")]
    pub app_key: Option<String>,

    /// Enforce APP_KEY when it is set
    #[arg(long, env = "REQUIRE_KEY", default_value = "true", action = clap::ArgAction::Set)]
    pub require_key: bool,

    /// Seconds between keep-alive comments on each stream
    #[arg(long, env = "KEEP_ALIVE_SECS", default_value = "25")]
    pub keep_alive_secs: u64,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("listen_addr '{}' is not a valid socket address", self.listen_addr);
        }
        if self.notable_kinds.iter().all(|k| k.trim().is_empty()) {
            anyhow::bail!("notable_kinds must name at least one event kind");
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be positive");
        }
        if self.keep_alive_secs == 0 {
            anyhow::bail!("keep_alive_secs must be positive");
        }
        Ok(())
    }

    /// The app key when it should actually be enforced.
    pub fn enforced_app_key(&self) -> Option<String> {
        if !self.require_key {
            return None;
        }
        self.app_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["matchlive"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let c = parse(&[]);
        assert!(c.validate().is_ok());
        assert_eq!(c.listen_addr, "0.0.0.0:3000");
        assert_eq!(c.notable_kinds, vec!["goal".to_string()]);
        assert!(c.enable_poller);
    }

    #[test]
    fn test_notable_kinds_list() {
        let c = parse(&["--notable-kinds", "goal,card"]);
        assert_eq!(c.notable_kinds, vec!["goal".to_string(), "card".to_string()]);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse(&["--listen-addr", "nowhere"]).validate().is_err());
        assert!(parse(&["--request-timeout-secs", "0"]).validate().is_err());
        assert!(parse(&["--notable-kinds", " "]).validate().is_err());
    }

    #[test]
    fn test_app_key_enforcement() {
        assert_eq!(parse(&["--app-key", "k1"]).enforced_app_key().as_deref(), Some("k1"));
        assert_eq!(
            parse(&["--app-key", "k1", "--require-key", "false"]).enforced_app_key(),
            None
        );
        assert_eq!(parse(&["--app-key", "  "]).enforced_app_key(), None);
    }
}
