//! Session policy knobs. The original firmware selected strategies with
//! compile-time switches; here the choice is a plain config value resolved
//! once at session start.

/// Which connect path the session leads with. Every variant falls back to
/// full discovery; escalation never runs the other way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectStrategy {
    /// Directed connect from the cached record, discovery on miss.
    FastWithFallback,
    /// Driver-level session resume first, discovery on miss.
    ReconnectWithFallback,
    /// Discovery only; the cache still gets rebuilt on success.
    DiscoveryOnly,
}

/// Build-time network identity: what we join and where boot messages go.
/// The record caches these so the next boot needs no discovery.
#[derive(Clone, Copy, Debug)]
pub struct NetworkProfile<'a> {
    pub ssid: &'a str,
    pub passphrase: &'a str,
    pub broker_host: &'a str,
    pub broker_port: u16,
    pub broker_user: &'a str,
    pub broker_pass: &'a str,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub strategy: ConnectStrategy,
    pub fast_timeout_ms: u32,
    pub slow_timeout_ms: u32,
    pub reconnect_timeout_ms: u32,
    pub preconnect_timeout_ms: u32,
    pub poll_interval_ms: u32,
    pub preconnect_retry_ms: u32,
    /// Chance (percent, 0..=100) that a session arms `force_slow` for the
    /// next boot. Bounds cache staleness without an expiry timestamp.
    pub revalidate_percent: u8,
    pub client_id: &'static str,
    pub boot_topics: &'static [(&'static str, &'static str)],
}

pub const BOOT_TOPICS: &[(&str, &str)] = &[
    ("wled/testing", "T"),
    ("wled/testing2", "VALUE2"),
    ("wled/testing3", "VALUE3"),
    ("wled/testing4", "VALUE4"),
    ("wled/testing5", "VALUE5"),
];

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: ConnectStrategy::FastWithFallback,
            fast_timeout_ms: 5_000,
            slow_timeout_ms: 10_000,
            reconnect_timeout_ms: 5_000,
            preconnect_timeout_ms: 5_000,
            poll_interval_ms: 10,
            preconnect_retry_ms: 50,
            revalidate_percent: 10,
            client_id: "relink-node",
            boot_topics: BOOT_TOPICS,
        }
    }
}
