//! Node configuration loaded from environment variables.
//!
//! All settings have defaults so a node can start with zero configuration
//! for local development.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use directories::ProjectDirs;

use skychat_shared::constants::{DEFAULT_ALIAS, DEFAULT_CHAT_PORT, DIAL_MAX_ATTEMPTS};
use skychat_shared::PeerId;

/// Which repository backend the node persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store {other:?}")),
        }
    }
}

/// Node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the chat listener binds to.
    /// Env: `SKYCHAT_LISTEN_ADDR`
    /// Default: `0.0.0.0`
    pub listen_addr: IpAddr,

    /// Chat port used for listening and dialing.
    /// Env: `SKYCHAT_PORT`
    /// Default: `4001`
    pub port: u16,

    /// Directory holding the identity file and the database.
    /// Env: `SKYCHAT_DATA_DIR`
    /// Default: the platform data directory, else `./skychat-data`
    pub data_dir: PathBuf,

    /// Env: `SKYCHAT_STORE` (`sqlite` | `memory`)
    /// Default: `sqlite`
    pub store: StoreKind,

    /// Static address book, `hexpk@host:port` entries separated by commas.
    /// Env: `SKYCHAT_PEERS`
    pub peers: Vec<(PeerId, SocketAddr)>,

    /// Alias given to the local user the first time the node starts.
    /// Env: `SKYCHAT_ALIAS`
    pub alias: String,

    /// Env: `SKYCHAT_DIAL_ATTEMPTS`
    /// Default: `5`
    pub dial_attempts: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("com", "skychat", "skychat")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./skychat-data"));
        Self {
            listen_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_CHAT_PORT,
            data_dir,
            store: StoreKind::Sqlite,
            peers: Vec::new(),
            alias: DEFAULT_ALIAS.to_string(),
            dial_attempts: DIAL_MAX_ATTEMPTS,
        }
    }
}

impl NodeConfig {
    /// Load configuration from the process environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Invalid values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("SKYCHAT_LISTEN_ADDR") {
            match addr.parse() {
                Ok(parsed) => config.listen_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid SKYCHAT_LISTEN_ADDR, using default"),
            }
        }

        if let Some(port) = lookup("SKYCHAT_PORT") {
            match port.parse() {
                Ok(parsed) => config.port = parsed,
                Err(_) => tracing::warn!(value = %port, "Invalid SKYCHAT_PORT, using default"),
            }
        }

        if let Some(dir) = lookup("SKYCHAT_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }

        if let Some(store) = lookup("SKYCHAT_STORE") {
            match store.parse() {
                Ok(kind) => config.store = kind,
                Err(e) => tracing::warn!(error = %e, "Invalid SKYCHAT_STORE, using sqlite"),
            }
        }

        if let Some(book) = lookup("SKYCHAT_PEERS") {
            config.peers = book
                .split(',')
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .filter_map(|entry| match parse_peer(entry) {
                    Ok(peer) => Some(peer),
                    Err(e) => {
                        tracing::warn!(entry, error = %e, "Skipping address book entry");
                        None
                    }
                })
                .collect();
        }

        if let Some(alias) = lookup("SKYCHAT_ALIAS") {
            if !alias.is_empty() {
                config.alias = alias;
            }
        }

        if let Some(val) = lookup("SKYCHAT_DIAL_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.dial_attempts = n,
                _ => tracing::warn!(value = %val, "Invalid SKYCHAT_DIAL_ATTEMPTS, using default"),
            }
        }

        // RUST_LOG is read by tracing-subscriber's EnvFilter directly.

        config
    }

    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join("identity.json")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("skychat.db")
    }
}

/// Parse one `hexpk@host:port` address book entry.
fn parse_peer(entry: &str) -> Result<(PeerId, SocketAddr), String> {
    let (pk, addr) = entry
        .split_once('@')
        .ok_or_else(|| "expected hexpk@host:port".to_string())?;
    let pk = PeerId::from_hex(pk).map_err(|e| format!("bad key: {e}"))?;
    let addr = addr
        .parse::<SocketAddr>()
        .map_err(|e| format!("bad address: {e}"))?;
    Ok((pk, addr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NodeConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, DEFAULT_CHAT_PORT);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.dial_attempts, DIAL_MAX_ATTEMPTS);
        assert!(config.peers.is_empty());
    }

    #[test]
    fn test_reads_overrides() {
        let pk = PeerId([7u8; 32]);
        let book = format!("{}@127.0.0.1:5000, ", pk.to_hex());
        let config = NodeConfig::from_lookup(lookup(&[
            ("SKYCHAT_PORT", "5001"),
            ("SKYCHAT_STORE", "Memory"),
            ("SKYCHAT_DATA_DIR", "/tmp/sky"),
            ("SKYCHAT_PEERS", &book),
            ("SKYCHAT_ALIAS", "ada"),
            ("SKYCHAT_DIAL_ATTEMPTS", "2"),
        ]));
        assert_eq!(config.port, 5001);
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.identity_path(), PathBuf::from("/tmp/sky/identity.json"));
        assert_eq!(config.peers, vec![(pk, "127.0.0.1:5000".parse().unwrap())]);
        assert_eq!(config.alias, "ada");
        assert_eq!(config.dial_attempts, 2);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = NodeConfig::from_lookup(lookup(&[
            ("SKYCHAT_PORT", "not-a-port"),
            ("SKYCHAT_STORE", "postgres"),
            ("SKYCHAT_PEERS", "zz@nowhere,abcd"),
            ("SKYCHAT_DIAL_ATTEMPTS", "0"),
        ]));
        assert_eq!(config.port, DEFAULT_CHAT_PORT);
        assert_eq!(config.store, StoreKind::Sqlite);
        assert!(config.peers.is_empty());
        assert_eq!(config.dial_attempts, DIAL_MAX_ATTEMPTS);
    }

    #[test]
    fn test_parse_peer_entry() {
        assert!(parse_peer("abcd").is_err());
        assert!(parse_peer(&format!("{}@host", "ab".repeat(32))).is_err());
        assert!(parse_peer(&format!("{}@10.0.0.1:4001", "ab".repeat(32))).is_ok());
    }
}
