//! The three connect strategies. Each one issues a single attempt, polls
//! the driver inside a hard wall-clock budget, and reports a bare
//! success/failure. Retry and fallback live in the orchestrator.

use super::{
    config::SessionConfig,
    diag::DiagSink,
    hal::{ConnectRequest, Monotonic, Radio, StaticAddrs},
    record::ConnectionRecord,
};

/// Directed connect from the cached record: static addressing plus
/// channel/BSSID hints so the driver skips the discovery scan entirely.
///
/// Channel drift (the AP answered on a different channel than cached) is
/// surfaced as a tag only; the connection stands and the next rebuild
/// captures the fresh channel. Caller guarantees the record is eligible.
pub fn fast_connect<R, C, D>(
    radio: &mut R,
    clock: &mut C,
    diag: &mut D,
    record: &ConnectionRecord,
    config: &SessionConfig,
) -> bool
where
    R: Radio,
    C: Monotonic,
    D: DiagSink,
{
    radio.set_static_addrs(&StaticAddrs {
        ip: record.ip,
        gateway: record.gateway,
        mask: record.mask,
        dns1: record.dns1,
        dns2: record.dns2,
    });
    radio.start_connect(&ConnectRequest {
        ssid: record.ssid_str(),
        passphrase: record.passphrase_str(),
        channel: Some(record.channel),
        bssid: Some(record.bssid),
    });

    let connected = wait_connected(radio, clock, config.fast_timeout_ms, config.poll_interval_ms);
    if connected {
        let negotiated = radio.channel();
        if negotiated != record.channel {
            diag.tag(
                "channel_drift",
                format_args!("{}->{}", record.channel, negotiated),
            );
        }
    }
    connected
}

/// Full discovery connect: name and passphrase only, the driver scans,
/// negotiates, and runs DHCP internally. This is the baseline that must
/// work whenever the network is reachable at all.
pub fn slow_connect<R, C>(
    radio: &mut R,
    clock: &mut C,
    ssid: &str,
    passphrase: &str,
    config: &SessionConfig,
) -> bool
where
    R: Radio,
    C: Monotonic,
{
    radio.start_connect(&ConnectRequest {
        ssid,
        passphrase,
        channel: None,
        bssid: None,
    });
    wait_connected(radio, clock, config.slow_timeout_ms, config.poll_interval_ms)
}

/// Resume a session the driver still recognizes, without re-supplying
/// credentials. Optional pre-stage before discovery. A valid record also
/// supplies static addressing, so the resume skips DHCP like the fast path.
pub fn reconnect_only<R, C>(
    radio: &mut R,
    clock: &mut C,
    record: Option<&ConnectionRecord>,
    config: &SessionConfig,
) -> bool
where
    R: Radio,
    C: Monotonic,
{
    if let Some(record) = record {
        radio.set_static_addrs(&StaticAddrs {
            ip: record.ip,
            gateway: record.gateway,
            mask: record.mask,
            dns1: record.dns1,
            dns2: record.dns2,
        });
    }
    radio.start_reconnect();
    wait_connected(
        radio,
        clock,
        config.reconnect_timeout_ms,
        config.poll_interval_ms,
    )
}

/// Bounded busy-wait: the deadline is computed once at entry, and a hung
/// driver can never stall the session past it.
fn wait_connected<R, C>(radio: &mut R, clock: &mut C, timeout_ms: u32, poll_ms: u32) -> bool
where
    R: Radio,
    C: Monotonic,
{
    let deadline = clock.now_ms() + u64::from(timeout_ms);
    loop {
        if radio.is_connected() {
            return true;
        }
        if clock.now_ms() >= deadline {
            return false;
        }
        clock.delay_ms(poll_ms);
    }
}
