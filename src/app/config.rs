//! Build-time network identity. Credentials come from the environment at
//! compile time so no secrets file lands in the tree.

use relink::session::{ConnectStrategy, NetworkProfile};

pub(crate) const NETWORK_PROFILE: NetworkProfile<'static> = NetworkProfile {
    ssid: match option_env!("RELINK_SSID") {
        Some(value) => value,
        None => "changeme",
    },
    passphrase: match option_env!("RELINK_PASSPHRASE") {
        Some(value) => value,
        None => "changeme",
    },
    // A literal address: the blocking stack carries no DNS resolver.
    broker_host: match option_env!("RELINK_MQTT_HOST") {
        Some(value) => value,
        None => "192.168.1.2",
    },
    broker_port: 1883,
    broker_user: match option_env!("RELINK_MQTT_USER") {
        Some(value) => value,
        None => "",
    },
    broker_pass: match option_env!("RELINK_MQTT_PASS") {
        Some(value) => value,
        None => "",
    },
};

pub(crate) fn strategy_label(strategy: ConnectStrategy) -> &'static str {
    match strategy {
        ConnectStrategy::FastWithFallback => "fastconnect,staticip",
        ConnectStrategy::ReconnectWithFallback => "usereconnect",
        ConnectStrategy::DiscoveryOnly => "no-settings",
    }
}
