//! The connection orchestrator: one state machine pass per boot.
//!
//! `start -> {fast|reconnect|slow} attempt -> {connected|failed} ->
//! record update -> done`. The HSM only decides; the runner executes the
//! actions it emits (connect attempts, record persist) against the
//! injected collaborators and feeds results back as events.

use embedded_storage::{ReadStorage, Storage};
use statig::{blocking::IntoStateMachineExt as _, prelude::*};

use super::{
    config::{ConnectStrategy, NetworkProfile, SessionConfig},
    diag::DiagSink,
    hal::{EntropySource, Monotonic, Radio, ScanBuf},
    record::{ConnectionRecord, RECORD_MAGIC},
    store::RecordStore,
    strategy::{fast_connect, reconnect_only, slow_connect},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectPath {
    Fast,
    Reconnect,
    Slow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlowReason {
    /// Record invalid or missing the AP specifics the fast path needs.
    BadCache,
    /// Persisted force-slow flag was set.
    Forced,
    /// Fast or reconnect attempt missed; discovery is the safety net.
    Fallback,
    /// Strategy is discovery-only by configuration.
    Policy,
}

impl SlowReason {
    fn label(self) -> &'static str {
        match self {
            SlowReason::BadCache => "bad_cache",
            SlowReason::Forced => "forced",
            SlowReason::Fallback => "fallback",
            SlowReason::Policy => "policy",
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum SessionEvent {
    CacheLoaded {
        eligible: bool,
        forced: bool,
    },
    AttemptFinished {
        ok: bool,
    },
    RecordPersisted {
        ok: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionAction {
    AttemptFast,
    AttemptReconnect,
    AttemptSlow(SlowReason),
    RebuildAndSave,
    Finish,
}

/// Single-slot deep action queue; one dispatch emits at most one action.
#[derive(Clone, Copy, Debug, Default)]
struct ActionBuffer {
    slot: Option<SessionAction>,
}

impl ActionBuffer {
    fn push(&mut self, action: SessionAction) {
        self.slot = Some(action);
    }

    fn pop(&mut self) -> Option<SessionAction> {
        self.slot.take()
    }
}

#[derive(Default)]
struct DispatchContext {
    actions: ActionBuffer,
}

struct SessionHsm {
    strategy: ConnectStrategy,
    path: Option<ConnectPath>,
    slow_reason: Option<SlowReason>,
    record_saved: bool,
}

impl SessionHsm {
    fn new(strategy: ConnectStrategy) -> Self {
        Self {
            strategy,
            path: None,
            slow_reason: None,
            record_saved: false,
        }
    }

    fn go_slow(&mut self, context: &mut DispatchContext, reason: SlowReason) -> Outcome<State> {
        self.slow_reason = Some(reason);
        context.actions.push(SessionAction::AttemptSlow(reason));
        Transition(State::slow_attempt())
    }

    fn settle(&mut self, context: &mut DispatchContext, path: ConnectPath) -> Outcome<State> {
        self.path = Some(path);
        context.actions.push(SessionAction::RebuildAndSave);
        Transition(State::connected())
    }
}

#[state_machine(initial = "State::start()")]
impl SessionHsm {
    #[state]
    fn start(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::CacheLoaded { eligible, forced } => match self.strategy {
                ConnectStrategy::DiscoveryOnly => self.go_slow(context, SlowReason::Policy),
                ConnectStrategy::ReconnectWithFallback => {
                    context.actions.push(SessionAction::AttemptReconnect);
                    Transition(State::reconnect_attempt())
                }
                ConnectStrategy::FastWithFallback => {
                    if *eligible {
                        context.actions.push(SessionAction::AttemptFast);
                        Transition(State::fast_attempt())
                    } else if *forced {
                        self.go_slow(context, SlowReason::Forced)
                    } else {
                        self.go_slow(context, SlowReason::BadCache)
                    }
                }
            },
            _ => Handled,
        }
    }

    #[state]
    fn fast_attempt(
        &mut self,
        context: &mut DispatchContext,
        event: &SessionEvent,
    ) -> Outcome<State> {
        match event {
            SessionEvent::AttemptFinished { ok: true } => self.settle(context, ConnectPath::Fast),
            // A single cache miss must not strand the device: exactly one
            // discovery fallback, never a second fast try.
            SessionEvent::AttemptFinished { ok: false } => {
                self.go_slow(context, SlowReason::Fallback)
            }
            _ => Handled,
        }
    }

    #[state]
    fn reconnect_attempt(
        &mut self,
        context: &mut DispatchContext,
        event: &SessionEvent,
    ) -> Outcome<State> {
        match event {
            SessionEvent::AttemptFinished { ok: true } => {
                self.settle(context, ConnectPath::Reconnect)
            }
            SessionEvent::AttemptFinished { ok: false } => {
                self.go_slow(context, SlowReason::Fallback)
            }
            _ => Handled,
        }
    }

    #[state]
    fn slow_attempt(
        &mut self,
        context: &mut DispatchContext,
        event: &SessionEvent,
    ) -> Outcome<State> {
        match event {
            SessionEvent::AttemptFinished { ok: true } => self.settle(context, ConnectPath::Slow),
            // Terminal for this session; the outer reboot cycle is the only
            // further retry.
            SessionEvent::AttemptFinished { ok: false } => {
                context.actions.push(SessionAction::Finish);
                Transition(State::failed())
            }
            _ => Handled,
        }
    }

    #[state]
    fn connected(&mut self, context: &mut DispatchContext, event: &SessionEvent) -> Outcome<State> {
        match event {
            SessionEvent::RecordPersisted { ok } => {
                self.record_saved = *ok;
                context.actions.push(SessionAction::Finish);
                Transition(State::done())
            }
            _ => Handled,
        }
    }

    #[state]
    fn failed(&mut self, event: &SessionEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }

    #[state]
    fn done(&mut self, event: &SessionEvent) -> Outcome<State> {
        let _ = event;
        Handled
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SessionOutcome {
    pub connected: bool,
    pub path: Option<ConnectPath>,
    pub slow_reason: Option<SlowReason>,
    pub record_saved: bool,
    /// Record in effect at session end; fresh when a rebuild ran.
    pub record: ConnectionRecord,
}

pub struct ConnectionOrchestrator {
    config: SessionConfig,
}

impl ConnectionOrchestrator {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Runs one connection session: load record, pick a path, attempt,
    /// fall back, rebuild and persist on success. Returns once the machine
    /// reaches a terminal state; the caller owns whatever comes next
    /// (publish, restart).
    pub fn run_session<S, R, C, E, D>(
        &self,
        store: &mut RecordStore<S>,
        radio: &mut R,
        clock: &mut C,
        entropy: &mut E,
        diag: &mut D,
        profile: &NetworkProfile<'_>,
    ) -> SessionOutcome
    where
        S: ReadStorage + Storage,
        R: Radio,
        C: Monotonic,
        E: EntropySource,
        D: DiagSink,
    {
        let mut machine = SessionHsm::new(self.config.strategy).state_machine();
        let mut context = DispatchContext::default();

        let t_flash = clock.now_ms();
        let (record, valid) = store.load();
        diag.tag("get_flash_ms", format_args!("{}", clock.now_ms() - t_flash));
        diag.tag(
            "settings",
            format_args!("{}", if valid { "ok" } else { "bad" }),
        );

        let forced = valid && record.force_slow != 0;
        let eligible = record.is_fast_eligible();
        let mut live = record;

        machine.handle_with_context(&SessionEvent::CacheLoaded { eligible, forced }, &mut context);

        while let Some(action) = context.actions.pop() {
            match action {
                SessionAction::AttemptFast => {
                    let t = clock.now_ms();
                    let ok = fast_connect(radio, clock, diag, &live, &self.config);
                    diag.tag("fast_connect_ms", format_args!("{}", clock.now_ms() - t));
                    if ok {
                        diag.tag("wifi_conn", format_args!("fast"));
                    }
                    machine.handle_with_context(&SessionEvent::AttemptFinished { ok }, &mut context);
                }
                SessionAction::AttemptReconnect => {
                    let t = clock.now_ms();
                    let cached = if valid { Some(&live) } else { None };
                    let ok = reconnect_only(radio, clock, cached, &self.config);
                    diag.tag("reconnect_ms", format_args!("{}", clock.now_ms() - t));
                    if ok {
                        diag.tag("wifi_conn", format_args!("reconnect"));
                    }
                    machine.handle_with_context(&SessionEvent::AttemptFinished { ok }, &mut context);
                }
                SessionAction::AttemptSlow(reason) => {
                    diag.tag("slow_reason", format_args!("{}", reason.label()));
                    if reason == SlowReason::Fallback {
                        // Drop the half-open directed attempt before rescanning.
                        radio.disconnect();
                    }
                    let t = clock.now_ms();
                    let ok =
                        slow_connect(radio, clock, profile.ssid, profile.passphrase, &self.config);
                    diag.tag("slow_connect_ms", format_args!("{}", clock.now_ms() - t));
                    if ok {
                        let label = if reason == SlowReason::Fallback {
                            "fallback_slow"
                        } else {
                            "slow"
                        };
                        diag.tag("wifi_conn", format_args!("{label}"));
                    } else {
                        dump_scan(radio, diag);
                    }
                    machine.handle_with_context(&SessionEvent::AttemptFinished { ok }, &mut context);
                }
                SessionAction::RebuildAndSave => {
                    let t = clock.now_ms();
                    let rebuilt = rebuild_record(
                        &live,
                        radio,
                        profile,
                        entropy,
                        diag,
                        self.config.revalidate_percent,
                    );
                    let ok = store.save(&rebuilt);
                    diag.tag("save_to_flash_ms", format_args!("{}", clock.now_ms() - t));
                    if !ok {
                        // Best-effort: only the next boot's fast path is lost.
                        diag.tag("flash_save", format_args!("failed"));
                    }
                    live = rebuilt;
                    machine
                        .handle_with_context(&SessionEvent::RecordPersisted { ok }, &mut context);
                }
                SessionAction::Finish => break,
            }
        }

        let hsm = machine.inner();
        let connected = hsm.path.is_some();
        diag.tag("wifi_ok", format_args!("{connected}"));
        SessionOutcome {
            connected,
            path: hsm.path,
            slow_reason: hsm.slow_reason,
            record_saved: hsm.record_saved,
            record: live,
        }
    }
}

/// Rebuild the record from the live association plus the build-time
/// profile, then roll the periodic forced-revalidation dice for the next
/// session.
fn rebuild_record<R, E, D>(
    previous: &ConnectionRecord,
    radio: &mut R,
    profile: &NetworkProfile<'_>,
    entropy: &mut E,
    diag: &mut D,
    revalidate_percent: u8,
) -> ConnectionRecord
where
    R: Radio,
    E: EntropySource,
    D: DiagSink,
{
    let link = radio.link_snapshot();
    let mut record = ConnectionRecord::zeroed();
    record.magic = RECORD_MAGIC;
    record.ip = link.addrs.ip;
    record.gateway = link.addrs.gateway;
    record.mask = link.addrs.mask;
    record.dns1 = link.addrs.dns1;
    record.dns2 = link.addrs.dns2;
    record.set_ssid(profile.ssid);
    record.set_passphrase(profile.passphrase);
    record.bssid = link.bssid;
    record.channel = link.channel;
    record.set_broker_host(profile.broker_host);
    record.broker_ip = match radio.resolve_host(profile.broker_host) {
        Some(ip) => ip,
        None => {
            diag.tag("resolve_host", format_args!("failed"));
            previous.broker_ip
        }
    };
    record.broker_port = profile.broker_port;
    record.set_broker_user(profile.broker_user);
    record.set_broker_pass(profile.broker_pass);

    if u32::from(entropy.random_u32() % 100) < u32::from(revalidate_percent) {
        record.force_slow = 1;
        diag.tag("revalidate", format_args!("armed"));
    }
    record
}

/// Post-mortem aid after a terminal slow failure: what the radio can see.
fn dump_scan<R: Radio, D: DiagSink>(radio: &mut R, diag: &mut D) {
    let mut nearby = ScanBuf::new();
    radio.scan(&mut nearby);
    diag.tag("scan_n", format_args!("{}", nearby.len()));
    for entry in nearby.iter() {
        diag.tag(
            "scan",
            format_args!(
                "{},ch={},rssi={}",
                entry.ssid.as_str(),
                entry.channel,
                entry.rssi
            ),
        );
    }
}
