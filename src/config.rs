//! A minimal `key=value` config file reader, hand-rolled rather than
//! pulled in from a dedicated crate since the format has only a handful
//! of fields.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Clone, Debug)]
pub struct Config {
    pub addon_dir: Option<String>,
    pub tcp_port: u16,
    pub udp_recv_port: u16,
    pub udp_send_port: u16,
    pub udp_send_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            addon_dir: None,
            tcp_port: 10000,
            udp_recv_port: 61000,
            udp_send_port: 62000,
            udp_send_addr: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> io::Result<Self> {
        let mut cfg = Config::default();
        if !path.exists() {
            log::info!("no config file at {}, using defaults", path.display());
            return Ok(cfg);
        }

        let raw = fs::read_to_string(path)?;
        let values = parse_key_values(&raw);

        if let Some(v) = values.get("addon_dir") {
            cfg.addon_dir = Some(v.clone());
        }
        if let Some(v) = values.get("tcp_port") {
            cfg.tcp_port = parse_or_warn(v, "tcp_port", cfg.tcp_port);
        }
        if let Some(v) = values.get("udp_recv_port") {
            cfg.udp_recv_port = parse_or_warn(v, "udp_recv_port", cfg.udp_recv_port);
        }
        if let Some(v) = values.get("udp_send_port") {
            cfg.udp_send_port = parse_or_warn(v, "udp_send_port", cfg.udp_send_port);
        }
        if let Some(v) = values.get("udp_send_addr") {
            cfg.udp_send_addr = v.clone();
        }

        Ok(cfg)
    }
}

fn parse_or_warn<T: std::str::FromStr>(raw: &str, key: &str, default: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        log::warn!("invalid value {raw:?} for config key {key:?}, using default");
        default
    })
}

fn parse_key_values(raw: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        } else {
            log::warn!("ignoring malformed config line: {line:?}");
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_ports() {
        let cfg = Config::default();
        assert_eq!(cfg.tcp_port, 10000);
        assert_eq!(cfg.udp_recv_port, 61000);
        assert_eq!(cfg.udp_send_port, 62000);
        assert_eq!(cfg.udp_send_addr, "127.0.0.1");
    }

    #[test]
    fn parses_overridden_values() {
        let values = parse_key_values("tcp_port = 9999\n# a comment\naddon_dir=C:/addons\n");
        assert_eq!(values.get("tcp_port").unwrap(), "9999");
        assert_eq!(values.get("addon_dir").unwrap(), "C:/addons");
    }

    #[test]
    fn blank_lines_and_comments_are_skipped() {
        let values = parse_key_values("\n  \n# comment only\n");
        assert!(values.is_empty());
    }
}
