//! Firmware entry: bring up the radio and flash, run exactly one
//! connection/publish session, then restart the chip. There is no steady
//! state; the next boot starts fresh from the persisted record.

mod clock;
mod config;
mod diag;
mod net;
mod wifi;

use embedded_storage::ReadStorage;
use esp_hal::timer::timg::TimerGroup;
use esp_println::println;
use esp_storage::FlashStorage;

use relink::session::{
    publish::run_publish, ConnectionOrchestrator, RecordStore, SessionConfig,
};

use self::{
    clock::{HalClock, HalEntropy},
    diag::SerialDiag,
};

const MQTT_RX_BUF: usize = 1536;
const MQTT_TX_BUF: usize = 1536;
const RESTART_DELAY_MS: u32 = 500;

pub(crate) fn run() -> ! {
    let peripherals = esp_hal::init(esp_hal::Config::default());
    esp_alloc::heap_allocator!(size: 72 * 1024);
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let session_config = SessionConfig::default();
    println!("<setup_start>");
    println!("<strategy={}>", config::strategy_label(session_config.strategy));

    let mut clock = HalClock::new();
    let mut entropy = HalEntropy::new();
    let mut diag = SerialDiag;

    let flash = FlashStorage::new(peripherals.FLASH).multicore_auto_park();
    let record_offset = (flash.capacity() as u32).saturating_sub(FlashStorage::SECTOR_SIZE);
    let mut store = RecordStore::new(flash, record_offset);

    let mut radio = match wifi::setup(peripherals.WIFI) {
        Ok(radio) => radio,
        Err(err) => {
            println!("<radio_init=failed:{err}>");
            restart();
        }
    };

    let t_start = esp_hal::time::Instant::now();
    let orchestrator = ConnectionOrchestrator::new(session_config);
    let outcome = orchestrator.run_session(
        &mut store,
        &mut radio,
        &mut clock,
        &mut entropy,
        &mut diag,
        &config::NETWORK_PROFILE,
    );

    let mut published = false;
    if outcome.connected {
        let mut rx_buffer = [0u8; MQTT_RX_BUF];
        let mut tx_buffer = [0u8; MQTT_TX_BUF];
        let mut broker = net::TcpBroker::new(radio.stack(), &mut rx_buffer, &mut tx_buffer);
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
        "<setup_total_ms={}>",
        t_start.elapsed().as_millis()
    );
    println!("<setup_finish>");

    restart()
}

fn restart() -> ! {
    // One session per boot; recovery is always a full restart.
    esp_hal::delay::Delay::new().delay_millis(RESTART_DELAY_MS);
    esp_hal::system::software_reset()
}
