//! Scripted collaborators for host tests: a radio with a programmable
//! status sequence, a clock that advances only through `delay_ms`, memory
//! storage, fixed entropy, and a diag sink that collects tags.

use std::string::String;
use std::vec::Vec;

use super::diag::DiagSink;
use super::hal::{
    BrokerClient, ConnectRequest, EntropySource, LinkSnapshot, Monotonic, Radio, ScanBuf,
    ScanEntry, StaticAddrs,
};
use super::record::ip_from_octets;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct OwnedRequest {
    pub ssid: String,
    pub passphrase: String,
    pub channel: Option<u8>,
    pub bssid: Option<[u8; 6]>,
}

pub(crate) struct ScriptedRadio {
    /// Number of `is_connected` polls that report false before the attempt
    /// succeeds; `None` never connects.
    pub connect_after: Option<u32>,
    polls: u32,
    connected: bool,
    pub live_channel: u8,
    pub live_bssid: [u8; 6],
    pub link: LinkSnapshot,
    pub static_addrs: Option<StaticAddrs>,
    pub last_request: Option<OwnedRequest>,
    pub requests: Vec<OwnedRequest>,
    pub reconnect_requested: bool,
    pub scan_entries: Vec<ScanEntry>,
    pub resolve_result: Option<u32>,
    /// When set, the scripted counter applies to the n-th attempt only;
    /// earlier attempts never connect.
    pub fail_attempts_before: u32,
    attempts: u32,
}

impl ScriptedRadio {
    pub fn connect_after(polls: u32) -> Self {
        Self::with_script(Some(polls))
    }

    pub fn never_connects() -> Self {
        Self::with_script(None)
    }

    /// First attempt always times out, second one connects. Exercises the
    /// fast-miss fallback.
    pub fn second_attempt_connects() -> Self {
        let mut radio = Self::with_script(Some(0));
        radio.fail_attempts_before = 1;
        radio
    }

    fn with_script(connect_after: Option<u32>) -> Self {
        Self {
            connect_after,
            polls: 0,
            connected: false,
            live_channel: 6,
            live_bssid: [0xAA, 0xBB, 0xCC, 1, 2, 3],
            link: LinkSnapshot {
                addrs: StaticAddrs {
                    ip: ip_from_octets([192, 168, 1, 40]),
                    gateway: ip_from_octets([192, 168, 1, 1]),
                    mask: ip_from_octets([255, 255, 255, 0]),
                    dns1: ip_from_octets([192, 168, 1, 1]),
                    dns2: ip_from_octets([8, 8, 8, 8]),
                },
                bssid: [0xAA, 0xBB, 0xCC, 1, 2, 3],
                channel: 6,
            },
            static_addrs: None,
            last_request: None,
            requests: Vec::new(),
            reconnect_requested: false,
            scan_entries: Vec::new(),
            resolve_result: None,
            fail_attempts_before: 0,
            attempts: 0,
        }
    }

    fn begin_attempt(&mut self) {
        self.polls = 0;
        self.connected = false;
        self.attempts += 1;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Radio for ScriptedRadio {
    fn set_static_addrs(&mut self, addrs: &StaticAddrs) {
        self.static_addrs = Some(*addrs);
    }

    fn start_connect(&mut self, request: &ConnectRequest<'_>) {
        let owned = OwnedRequest {
            ssid: request.ssid.into(),
            passphrase: request.passphrase.into(),
            channel: request.channel,
            bssid: request.bssid,
        };
        self.last_request = Some(owned.clone());
        self.requests.push(owned);
        self.begin_attempt();
    }

    fn start_reconnect(&mut self) {
        self.reconnect_requested = true;
        self.begin_attempt();
    }

    fn is_connected(&mut self) -> bool {
        if self.connected {
            return true;
        }
        if self.attempts <= self.fail_attempts_before {
            return false;
        }
        let Some(after) = self.connect_after else {
            return false;
        };
        if self.polls >= after {
            self.connected = true;
            // Snapshot reflects what the AP actually negotiated.
            self.link.bssid = self.live_bssid;
            self.link.channel = self.live_channel;
            return true;
        }
        self.polls += 1;
        false
    }

    fn channel(&mut self) -> u8 {
        self.live_channel
    }

    fn bssid(&mut self) -> [u8; 6] {
        self.live_bssid
    }

    fn link_snapshot(&mut self) -> LinkSnapshot {
        self.link
    }

    fn scan(&mut self, out: &mut ScanBuf) {
        for entry in &self.scan_entries {
            if out.push(entry.clone()).is_err() {
                break;
            }
        }
    }

    fn resolve_host(&mut self, _host: &str) -> Option<u32> {
        self.resolve_result
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

pub(crate) struct FakeClock {
    now_ms: u64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { now_ms: 1_000 }
    }

    pub fn peek_ms(&self) -> u64 {
        self.now_ms
    }
}

impl Monotonic for FakeClock {
    fn now_ms(&mut self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now_ms += u64::from(ms);
    }
}

pub(crate) struct FixedEntropy {
    value: u32,
}

impl FixedEntropy {
    /// `value % 100` is the revalidation roll.
    pub fn rolling(value: u32) -> Self {
        Self { value }
    }
}

impl EntropySource for FixedEntropy {
    fn random_u32(&mut self) -> u32 {
        self.value
    }
}

pub(crate) struct CollectedDiag {
    pub tags: Vec<(String, String)>,
}

impl CollectedDiag {
    pub fn new() -> Self {
        Self { tags: Vec::new() }
    }

    pub fn has(&self, key: &str, value: &str) -> bool {
        self.tags.iter().any(|(k, v)| k == key && v == value)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.tags.iter().any(|(k, _)| k == key)
    }

    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl DiagSink for CollectedDiag {
    fn tag(&mut self, key: &str, value: core::fmt::Arguments<'_>) {
        self.tags.push((key.into(), std::format!("{value}")));
    }
}

pub(crate) struct MemStorage {
    pub data: [u8; 4096],
    fail_reads: bool,
    fail_writes: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            data: [0; 4096],
            fail_reads: false,
            fail_writes: false,
        }
    }

    pub fn failing_reads() -> Self {
        let mut storage = Self::new();
        storage.fail_reads = true;
        storage
    }

    pub fn failing_writes() -> Self {
        let mut storage = Self::new();
        storage.fail_writes = true;
        storage
    }
}

impl embedded_storage::ReadStorage for MemStorage {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.fail_reads {
            return Err(());
        }
        let start = offset as usize;
        bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl embedded_storage::Storage for MemStorage {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(());
        }
        let start = offset as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

pub(crate) struct ScriptedBroker {
    /// Socket attempts that fail before one succeeds; `None` never opens.
    pub open_after: Option<u32>,
    socket_attempts: u32,
    pub socket_open: bool,
    pub login_ok: bool,
    pub publish_ok: bool,
    pub logged_in: Option<(String, String, String)>,
    pub published: Vec<(String, String)>,
    pub connect_target: Option<(u32, u16)>,
}

impl ScriptedBroker {
    pub fn healthy() -> Self {
        Self {
            open_after: Some(0),
            socket_attempts: 0,
            socket_open: false,
            login_ok: true,
            publish_ok: true,
            logged_in: None,
            published: Vec::new(),
            connect_target: None,
        }
    }

    pub fn unreachable() -> Self {
        let mut broker = Self::healthy();
        broker.open_after = None;
        broker
    }

    pub fn rejecting_login() -> Self {
        let mut broker = Self::healthy();
        broker.login_ok = false;
        broker
    }
}

impl BrokerClient for ScriptedBroker {
    fn socket_connect(&mut self, ip: u32, port: u16) -> bool {
        self.connect_target = Some((ip, port));
        let Some(after) = self.open_after else {
            return false;
        };
        if self.socket_attempts >= after {
            self.socket_open = true;
            return true;
        }
        self.socket_attempts += 1;
        false
    }

    fn login(&mut self, client_id: &str, user: &str, pass: &str) -> bool {
        self.logged_in = Some((client_id.into(), user.into(), pass.into()));
        self.login_ok
    }

    fn publish(&mut self, topic: &str, value: &str) -> bool {
        if self.publish_ok {
            self.published.push((topic.into(), value.into()));
        }
        self.publish_ok
    }
}
