//! One-shot boot publish: pre-connect the broker socket inside its own
//! budget, log in, fire the configured topic/value pairs. No retries, and
//! the connection record is never touched from here.

use super::{
    config::SessionConfig,
    diag::DiagSink,
    hal::{BrokerClient, Monotonic},
    record::ConnectionRecord,
};

pub fn run_publish<B, C, D>(
    client: &mut B,
    clock: &mut C,
    diag: &mut D,
    record: &ConnectionRecord,
    config: &SessionConfig,
) -> bool
where
    B: BrokerClient,
    C: Monotonic,
    D: DiagSink,
{
    let deadline = clock.now_ms() + u64::from(config.preconnect_timeout_ms);
    let mut connected = client.socket_connect(record.broker_ip, record.broker_port);
    while !connected {
        if clock.now_ms() >= deadline {
            break;
        }
        clock.delay_ms(config.preconnect_retry_ms);
        connected = client.socket_connect(record.broker_ip, record.broker_port);
    }
    diag.tag("preconnect", format_args!("{connected}"));
    if !connected {
        return false;
    }

    if !client.login(
        config.client_id,
        record.broker_user_str(),
        record.broker_pass_str(),
    ) {
        diag.tag("mqtt_login", format_args!("false"));
        return false;
    }

    for (topic, value) in config.boot_topics {
        diag.tag("publish", format_args!("{topic}={value}"));
        if !client.publish(topic, value) {
            diag.tag("mqtt_ok", format_args!("false"));
            return false;
        }
    }
    diag.tag("mqtt_ok", format_args!("true"));
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::record::ip_from_octets;
    use crate::session::testkit::{CollectedDiag, FakeClock, ScriptedBroker};

    fn broker_record() -> ConnectionRecord {
        let mut record = ConnectionRecord::zeroed();
        record.broker_ip = ip_from_octets([192, 168, 1, 2]);
        record.broker_port = 1883;
        record.set_broker_user("led");
        record.set_broker_pass("ledpass");
        record
    }

    #[test]
    fn publishes_every_boot_topic_after_login() {
        let mut broker = ScriptedBroker::healthy();
        let mut clock = FakeClock::new();
        let mut diag = CollectedDiag::new();
        let config = SessionConfig::default();

        assert!(run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &broker_record(),
            &config
        ));
        assert_eq!(
            broker.connect_target,
            Some((ip_from_octets([192, 168, 1, 2]), 1883))
        );
        let (client_id, user, pass) = broker.logged_in.clone().expect("login attempted");
        assert_eq!(client_id, config.client_id);
        assert_eq!(user, "led");
        assert_eq!(pass, "ledpass");
        assert_eq!(broker.published.len(), config.boot_topics.len());
        assert_eq!(broker.published[0], ("wled/testing".into(), "T".into()));
        assert!(diag.has("mqtt_ok", "true"));
    }

    #[test]
    fn preconnect_retries_within_budget_then_gives_up() {
        let mut broker = ScriptedBroker::unreachable();
        let mut clock = FakeClock::new();
        let mut diag = CollectedDiag::new();
        let config = SessionConfig::default();

        let start = clock.peek_ms();
        assert!(!run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &broker_record(),
            &config
        ));
        let elapsed = clock.peek_ms() - start;
        assert!(elapsed >= u64::from(config.preconnect_timeout_ms));
        assert!(elapsed <= u64::from(config.preconnect_timeout_ms + config.preconnect_retry_ms));
        assert!(diag.has("preconnect", "false"));
        assert!(broker.logged_in.is_none());
    }

    #[test]
    fn slow_socket_still_makes_it_inside_the_budget() {
        let mut broker = ScriptedBroker::healthy();
        broker.open_after = Some(3);
        let mut clock = FakeClock::new();
        let mut diag = CollectedDiag::new();

        assert!(run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &broker_record(),
            &SessionConfig::default()
        ));
        assert!(diag.has("preconnect", "true"));
    }

    #[test]
    fn login_rejection_publishes_nothing() {
        let mut broker = ScriptedBroker::rejecting_login();
        let mut clock = FakeClock::new();
        let mut diag = CollectedDiag::new();

        assert!(!run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &broker_record(),
            &SessionConfig::default()
        ));
        assert!(broker.published.is_empty());
        assert!(diag.has("mqtt_login", "false"));
    }

    #[test]
    fn publish_failure_reports_not_published() {
        let mut broker = ScriptedBroker::healthy();
        broker.publish_ok = false;
        let mut clock = FakeClock::new();
        let mut diag = CollectedDiag::new();

        assert!(!run_publish(
            &mut broker,
            &mut clock,
            &mut diag,
            &broker_record(),
            &SessionConfig::default()
        ));
        assert!(diag.has("mqtt_ok", "false"));
    }
}
