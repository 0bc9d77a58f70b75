//! Replays connection sessions against scripted hardware on the host and
//! prints the same `<key=value>` serial stream the firmware emits. Useful
//! for eyeballing path selection and record churn without a board.

use std::{env, fmt, process};

use relink::session::{
    hal::{
        BrokerClient, ConnectRequest, EntropySource, LinkSnapshot, Monotonic, Radio, ScanBuf,
        StaticAddrs,
    },
    publish::run_publish,
    record::{ip_from_octets, ConnectionRecord},
    ConnectStrategy, ConnectionOrchestrator, DiagSink, NetworkProfile, RecordStore, SessionConfig,
};

const PROFILE: NetworkProfile<'static> = NetworkProfile {
    ssid: "attic",
    passphrase: "hunter22",
    broker_host: "192.168.1.2",
    broker_port: 1883,
    broker_user: "led",
    broker_pass: "ledpass",
};

fn main() {
    let args: Vec<String> = env::args().collect();
    let scenario = args.get(1).map(String::as_str).unwrap_or("all");
    match scenario {
        "cold" => run_scenario("cold", Setup::cold()),
        "warm" => run_scenario("warm", Setup::warm()),
        "drift" => run_scenario("drift", Setup::drift()),
        "forced" => run_scenario("forced", Setup::forced()),
        "stale" => run_scenario("stale", Setup::stale()),
        "roll" => run_scenario("roll", Setup::roll()),
        "all" => {
            for (name, setup) in [
                ("cold", Setup::cold()),
                ("warm", Setup::warm()),
                ("drift", Setup::drift()),
                ("forced", Setup::forced()),
                ("stale", Setup::stale()),
                ("roll", Setup::roll()),
            ] {
                run_scenario(name, setup);
            }
        }
        "-h" | "--help" => println!("{}", usage()),
        other => {
            eprintln!("unknown scenario: {other}\n{}", usage());
            process::exit(1);
        }
    }
}

fn usage() -> String {
    "usage: session_host_harness [cold|warm|drift|forced|stale|roll|all]".into()
}

/// One scenario: a flash image, a radio script, and an entropy roll.
struct Setup {
    flash: MemFlash,
    radio: HostRadio,
    roll: u32,
}

impl Setup {
    /// Blank flash, first boot. Discovery, then a rebuild.
    fn cold() -> Self {
        Self {
            flash: MemFlash::blank(),
            radio: HostRadio::new(6),
            roll: 50,
        }
    }

    /// Valid record matching the live AP. The fast path should land.
    fn warm() -> Self {
        Self {
            flash: MemFlash::seeded(seed_record(6, 0)),
            radio: HostRadio::new(6),
            roll: 50,
        }
    }

    /// AP moved from channel 6 to 11 since the record was written.
    fn drift() -> Self {
        Self {
            flash: MemFlash::seeded(seed_record(6, 0)),
            radio: HostRadio::new(11),
            roll: 50,
        }
    }

    /// Previous session armed the revalidation flag.
    fn forced() -> Self {
        Self {
            flash: MemFlash::seeded(seed_record(6, 1)),
            radio: HostRadio::new(6),
            roll: 50,
        }
    }

    /// Cached BSSID no longer answers; fast times out, discovery lands.
    fn stale() -> Self {
        let mut radio = HostRadio::new(6);
        radio.accepts_directed = false;
        Self {
            flash: MemFlash::seeded(seed_record(6, 0)),
            radio,
            roll: 50,
        }
    }

    /// Entropy lands under the threshold; next boot will go slow.
    fn roll() -> Self {
        Self {
            flash: MemFlash::seeded(seed_record(6, 0)),
            radio: HostRadio::new(6),
            roll: 3,
        }
    }
}

fn run_scenario(name: &str, setup: Setup) {
    println!("--- scenario: {name} ---");
    let config = SessionConfig {
        strategy: ConnectStrategy::FastWithFallback,
        ..SessionConfig::default()
    };

    let mut store = RecordStore::new(setup.flash, 0);
    let mut radio = setup.radio;
    let mut clock = HostClock::default();
    let mut entropy = FixedEntropy { value: setup.roll };
    let mut diag = StdoutDiag;

    let orchestrator = ConnectionOrchestrator::new(config);
    let outcome = orchestrator.run_session(
        &mut store,
        &mut radio,
        &mut clock,
        &mut entropy,
        &mut diag,
        &PROFILE,
    );

    let mut published = false;
    if outcome.connected {
        let mut broker = HostBroker::default();
        published = run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &outcome.record,
            orchestrator.config(),
        );
    }
    println!("<published={published}>");
    println!(
        "<outcome connected={} path={:?} slow_reason={:?} saved={} force_slow={}>",
        outcome.connected,
        outcome.path,
        outcome.slow_reason,
        outcome.record_saved,
        outcome.record.force_slow,
    );
}

fn seed_record(channel: u8, force_slow: u8) -> ConnectionRecord {
    let mut record = ConnectionRecord::zeroed();
    record.set_ssid(PROFILE.ssid);
    record.set_passphrase(PROFILE.passphrase);
    record.set_broker_host(PROFILE.broker_host);
    record.set_broker_user(PROFILE.broker_user);
    record.set_broker_pass(PROFILE.broker_pass);
    record.ip = ip_from_octets([192, 168, 1, 40]);
    record.gateway = ip_from_octets([192, 168, 1, 1]);
    record.mask = ip_from_octets([255, 255, 255, 0]);
    record.dns1 = ip_from_octets([192, 168, 1, 1]);
    record.bssid = [0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03];
    record.channel = channel;
    record.broker_ip = ip_from_octets([192, 168, 1, 2]);
    record.broker_port = PROFILE.broker_port;
    record.force_slow = force_slow;
    record
}

struct StdoutDiag;

impl DiagSink for StdoutDiag {
    fn tag(&mut self, key: &str, value: fmt::Arguments<'_>) {
        println!("<{key}={value}>");
    }
}

/// RAM-backed flash region, one record slot at offset zero.
struct MemFlash {
    data: Vec<u8>,
}

impl MemFlash {
    fn blank() -> Self {
        Self {
            data: vec![0xFF; 4096],
        }
    }

    fn seeded(mut record: ConnectionRecord) -> Self {
        let mut flash = Self::blank();
        record.magic = relink::session::RECORD_MAGIC;
        let mut image = [0u8; relink::session::RECORD_LEN];
        record.encode(&mut image);
        flash.data[..image.len()].copy_from_slice(&image);
        flash
    }
}

impl embedded_storage::ReadStorage for MemFlash {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(())?;
        bytes.copy_from_slice(self.data.get(start..end).ok_or(())?);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }
}

impl embedded_storage::Storage for MemFlash {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start.checked_add(bytes.len()).ok_or(())?;
        self.data.get_mut(start..end).ok_or(())?.copy_from_slice(bytes);
        Ok(())
    }
}

#[derive(Default)]
struct HostClock {
    now: u64,
}

impl Monotonic for HostClock {
    fn now_ms(&mut self) -> u64 {
        self.now
    }

    fn delay_ms(&mut self, ms: u32) {
        self.now += u64::from(ms);
    }
}

struct FixedEntropy {
    value: u32,
}

impl EntropySource for FixedEntropy {
    fn random_u32(&mut self) -> u32 {
        self.value
    }
}

/// Always-reachable AP on a fixed channel. Directed and undirected
/// connects both land after a few polls.
struct HostRadio {
    live_channel: u8,
    live_bssid: [u8; 6],
    accepts_directed: bool,
    polls_left: u32,
    connected: bool,
    static_addrs: Option<StaticAddrs>,
}

impl HostRadio {
    fn new(live_channel: u8) -> Self {
        Self {
            live_channel,
            live_bssid: [0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03],
            accepts_directed: true,
            polls_left: 0,
            connected: false,
            static_addrs: None,
        }
    }

    fn begin_attempt(&mut self) {
        self.connected = false;
        self.polls_left = 3;
    }
}

impl Radio for HostRadio {
    fn set_static_addrs(&mut self, addrs: &StaticAddrs) {
        self.static_addrs = Some(*addrs);
    }

    fn start_connect(&mut self, request: &ConnectRequest<'_>) {
        self.begin_attempt();
        if request.bssid.is_some() && !self.accepts_directed {
            self.polls_left = u32::MAX;
        }
    }

    fn start_reconnect(&mut self) {
        self.begin_attempt();
    }

    fn is_connected(&mut self) -> bool {
        if self.connected {
            return true;
        }
        if self.polls_left == u32::MAX {
            return false;
        }
        if self.polls_left == 0 {
            self.connected = true;
        } else {
            self.polls_left -= 1;
        }
        self.connected
    }

    fn channel(&mut self) -> u8 {
        self.live_channel
    }

    fn bssid(&mut self) -> [u8; 6] {
        self.live_bssid
    }

    fn link_snapshot(&mut self) -> LinkSnapshot {
        LinkSnapshot {
            addrs: self.static_addrs.unwrap_or(StaticAddrs {
                ip: ip_from_octets([192, 168, 1, 40]),
                gateway: ip_from_octets([192, 168, 1, 1]),
                mask: ip_from_octets([255, 255, 255, 0]),
                dns1: ip_from_octets([192, 168, 1, 1]),
                dns2: 0,
            }),
            bssid: self.live_bssid,
            channel: self.live_channel,
        }
    }

    fn scan(&mut self, _out: &mut ScanBuf) {}

    fn resolve_host(&mut self, host: &str) -> Option<u32> {
        let mut octets = [0u8; 4];
        let mut parts = host.split('.');
        for slot in octets.iter_mut() {
            *slot = parts.next()?.parse().ok()?;
        }
        parts.next().is_none().then(|| ip_from_octets(octets))
    }

    fn disconnect(&mut self) {
        self.connected = false;
    }
}

#[derive(Default)]
struct HostBroker {
    logged_in: bool,
}

impl BrokerClient for HostBroker {
    fn socket_connect(&mut self, _ip: u32, _port: u16) -> bool {
        true
    }

    fn login(&mut self, _client_id: &str, _user: &str, _pass: &str) -> bool {
        self.logged_in = true;
        true
    }

    fn publish(&mut self, _topic: &str, _value: &str) -> bool {
        self.logged_in
    }
}
