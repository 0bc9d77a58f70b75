//! Capability traits the session consumes. The firmware binary provides
//! esp-hal/esp-radio implementations; tests script these directly.

use heapless::{String, Vec};

/// Most APs fit in one screen of diagnostics; the scan dump is a
/// post-mortem aid, not an inventory.
pub const SCAN_MAX: usize = 8;
pub const SSID_MAX: usize = 32;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StaticAddrs {
    pub ip: u32,
    pub gateway: u32,
    pub mask: u32,
    pub dns1: u32,
    pub dns2: u32,
}

/// Link parameters observed on a live association, used to rebuild the
/// persisted record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LinkSnapshot {
    pub addrs: StaticAddrs,
    pub bssid: [u8; 6],
    pub channel: u8,
}

/// A connect request is directed (skips discovery) when both hints are
/// present; otherwise the driver scans and negotiates on its own.
#[derive(Clone, Copy, Debug)]
pub struct ConnectRequest<'a> {
    pub ssid: &'a str,
    pub passphrase: &'a str,
    pub channel: Option<u8>,
    pub bssid: Option<[u8; 6]>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanEntry {
    pub ssid: String<SSID_MAX>,
    pub rssi: i8,
    pub channel: u8,
    pub bssid: [u8; 6],
}

pub type ScanBuf = Vec<ScanEntry, SCAN_MAX>;

/// Station radio capability set. `start_connect`/`start_reconnect` only
/// begin the attempt; completion is observed by polling `is_connected`
/// against a caller-owned deadline.
pub trait Radio {
    fn set_static_addrs(&mut self, addrs: &StaticAddrs);
    fn start_connect(&mut self, request: &ConnectRequest<'_>);
    fn start_reconnect(&mut self);
    fn is_connected(&mut self) -> bool;
    fn channel(&mut self) -> u8;
    fn bssid(&mut self) -> [u8; 6];
    fn link_snapshot(&mut self) -> LinkSnapshot;
    fn scan(&mut self, out: &mut ScanBuf);
    fn resolve_host(&mut self, host: &str) -> Option<u32>;
    fn disconnect(&mut self);
}

/// Wall-clock source for deadline accounting. Tests advance time from
/// `delay_ms` so timeout bounds can be asserted without sleeping.
pub trait Monotonic {
    fn now_ms(&mut self) -> u64;
    fn delay_ms(&mut self, ms: u32);
}

/// Randomness for the periodic forced-revalidation roll.
pub trait EntropySource {
    fn random_u32(&mut self) -> u32;
}

/// Broker transport: a pre-connected socket, one login, fire-and-forget
/// publishes.
pub trait BrokerClient {
    fn socket_connect(&mut self, ip: u32, port: u16) -> bool;
    fn login(&mut self, client_id: &str, user: &str, pass: &str) -> bool;
    fn publish(&mut self, topic: &str, value: &str) -> bool;
}
