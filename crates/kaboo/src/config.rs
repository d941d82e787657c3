//! Server configuration with environment overrides.

use std::time::Duration;

use kaboo_hub::HubConfig;

use crate::KabooError;

/// Addresses to listen on plus hub tuning.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// REST API listen address.
    pub rest_addr: String,
    /// Realtime (WebSocket) listen address.
    pub ws_addr: String,
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rest_addr: "0.0.0.0:3001".to_string(),
            ws_addr: "0.0.0.0:3002".to_string(),
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `KABOO_*` environment variables.
    ///
    /// | variable                 | field                   |
    /// |--------------------------|-------------------------|
    /// | `KABOO_REST_ADDR`        | `rest_addr`             |
    /// | `KABOO_WS_ADDR`          | `ws_addr`               |
    /// | `KABOO_PONG_WAIT_SECS`   | `hub.pong_wait` (ping period follows at 9/10) |
    /// | `KABOO_MAX_MESSAGE_SIZE` | `hub.max_message_size`  |
    ///
    /// Empty variables are ignored; unparseable numbers are an error.
    pub fn from_env() -> Result<Self, KabooError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, KabooError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(addr) = get("KABOO_REST_ADDR") {
            config.rest_addr = addr;
        }
        if let Some(addr) = get("KABOO_WS_ADDR") {
            config.ws_addr = addr;
        }
        if let Some(val) = get("KABOO_PONG_WAIT_SECS") {
            let secs: u64 = parse("KABOO_PONG_WAIT_SECS", &val)?;
            config.hub.pong_wait = Duration::from_secs(secs);
            config.hub.ping_period = config.hub.pong_wait * 9 / 10;
        }
        if let Some(val) = get("KABOO_MAX_MESSAGE_SIZE") {
            config.hub.max_message_size = parse("KABOO_MAX_MESSAGE_SIZE", &val)?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, KabooError> {
    value
        .trim()
        .parse()
        .map_err(|_| KabooError::Config(format!("{key}={value:?} is not a valid number")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_uses_separate_rest_and_ws_ports() {
        let config = ServerConfig::default();
        assert_eq!(config.rest_addr, "0.0.0.0:3001");
        assert_eq!(config.ws_addr, "0.0.0.0:3002");
    }

    #[test]
    fn test_from_lookup_applies_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("KABOO_REST_ADDR", "127.0.0.1:8001"),
            ("KABOO_PONG_WAIT_SECS", "20"),
            ("KABOO_MAX_MESSAGE_SIZE", "1024"),
        ]))
        .unwrap();

        assert_eq!(config.rest_addr, "127.0.0.1:8001");
        assert_eq!(config.ws_addr, "0.0.0.0:3002");
        assert_eq!(config.hub.pong_wait, Duration::from_secs(20));
        assert_eq!(config.hub.ping_period, Duration::from_secs(18));
        assert_eq!(config.hub.max_message_size, 1024);
    }

    #[test]
    fn test_from_lookup_empty_value_is_ignored() {
        let config =
            ServerConfig::from_lookup(lookup(&[("KABOO_WS_ADDR", "")])).unwrap();
        assert_eq!(config.ws_addr, "0.0.0.0:3002");
    }

    #[test]
    fn test_from_lookup_bad_number_returns_config_error() {
        let result =
            ServerConfig::from_lookup(lookup(&[("KABOO_PONG_WAIT_SECS", "soon")]));
        assert!(matches!(result, Err(KabooError::Config(_))));
    }
}
