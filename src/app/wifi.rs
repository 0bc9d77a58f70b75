//! Blocking station radio over esp-radio plus a polled smoltcp stack.
//! Static addressing is applied directly to the interface; DHCP runs on a
//! dhcpv4 socket that the status poll pumps until a lease lands.

use blocking_network_stack::{
    ipv4::{ClientConfiguration, ClientSettings, Configuration, Ipv4Addr, Mask, Subnet},
    Stack,
};
use esp_hal::rng::Rng;
use esp_radio::wifi::{
    ClientConfig, Config as WifiRuntimeConfig, ModeConfig, ScanConfig, WifiController, WifiDevice,
};
use smoltcp::{
    iface::{Config as IfaceConfig, Interface, SocketSet, SocketStorage},
    wire::{EthernetAddress, HardwareAddress},
};
use static_cell::StaticCell;

use relink::session::hal::{
    ConnectRequest, LinkSnapshot, Radio, ScanBuf, ScanEntry, StaticAddrs, SCAN_MAX,
};
use relink::session::record::{ip_from_octets, ip_octets};

pub(crate) struct StationRadio {
    controller: WifiController<'static>,
    stack: Stack<'static, WifiDevice<'static>>,
    static_ip: bool,
    /// BSSID/channel of the live association, filled lazily from a
    /// directed scan after connect.
    assoc: Option<([u8; 6], u8)>,
    target_ssid: heapless::String<32>,
}

pub(crate) fn setup(
    wifi: esp_hal::peripherals::WIFI<'static>,
) -> Result<StationRadio, &'static str> {
    static RADIO_CTRL: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
    static SOCKET_STORAGE: StaticCell<[SocketStorage<'static>; 3]> = StaticCell::new();

    let radio_ctrl = RADIO_CTRL.init(esp_radio::init().map_err(|_| "esp_radio::init failed")?);
    let (controller, ifaces) =
        esp_radio::wifi::new(radio_ctrl, wifi, WifiRuntimeConfig::default())
            .map_err(|_| "wifi init failed")?;
    let mut device = ifaces.sta;

    let iface = create_interface(&mut device);
    let storage = SOCKET_STORAGE.init(Default::default());
    let mut socket_set = SocketSet::new(&mut storage[..]);
    socket_set.add(smoltcp::socket::dhcpv4::Socket::new());

    let rng = Rng::new();
    let stack = Stack::new(iface, device, socket_set, current_millis, rng.random());

    Ok(StationRadio {
        controller,
        stack,
        static_ip: false,
        assoc: None,
        target_ssid: heapless::String::new(),
    })
}

impl StationRadio {
    pub(crate) fn stack(&self) -> &Stack<'static, WifiDevice<'static>> {
        &self.stack
    }

    fn ensure_started(&mut self) -> bool {
        if matches!(self.controller.is_started(), Ok(true)) {
            return true;
        }
        self.controller.start().is_ok()
    }

    fn refresh_assoc(&mut self) {
        if self.assoc.is_some() || self.target_ssid.is_empty() {
            return;
        }
        let config = ScanConfig::default().with_max(SCAN_MAX);
        let Ok(found) = self.controller.scan_with_config(config) else {
            return;
        };
        let best = found
            .iter()
            .filter(|ap| ap.ssid.as_str() == self.target_ssid.as_str())
            .max_by_key(|ap| ap.signal_strength);
        if let Some(ap) = best {
            self.assoc = Some((ap.bssid, ap.channel));
        }
    }
}

impl Radio for StationRadio {
    fn set_static_addrs(&mut self, addrs: &StaticAddrs) {
        let settings = ClientSettings {
            ip: Ipv4Addr::from(ip_octets(addrs.ip)),
            subnet: Subnet {
                gateway: Ipv4Addr::from(ip_octets(addrs.gateway)),
                mask: Mask(addrs.mask.count_ones() as u8),
            },
            dns: non_zero_addr(addrs.dns1),
            secondary_dns: non_zero_addr(addrs.dns2),
        };
        let applied = self
            .stack
            .set_iface_configuration(&Configuration::Client(ClientConfiguration::Fixed(settings)));
        self.static_ip = applied.is_ok();
    }

    fn start_connect(&mut self, request: &ConnectRequest<'_>) {
        self.assoc = None;
        self.target_ssid.clear();
        let _ = self.target_ssid.push_str(request.ssid);

        let mut client = ClientConfig::default()
            .with_ssid(request.ssid.into())
            .with_password(request.passphrase.into());
        if let Some(channel) = request.channel {
            client = client.with_channel(channel);
        }
        if let Some(bssid) = request.bssid {
            client = client.with_bssid(bssid);
        }
        if self
            .controller
            .set_config(&ModeConfig::Client(client))
            .is_err()
        {
            return;
        }
        if !self.ensure_started() {
            return;
        }
        let _ = self.controller.connect();
    }

    fn start_reconnect(&mut self) {
        // Resume with whatever station config the driver still holds.
        self.assoc = None;
        if self.ensure_started() {
            let _ = self.controller.connect();
        }
    }

    fn is_connected(&mut self) -> bool {
        if !matches!(self.controller.is_connected(), Ok(true)) {
            return false;
        }
        if self.static_ip {
            return true;
        }
        self.stack.work();
        self.stack.is_iface_up()
    }

    fn channel(&mut self) -> u8 {
        self.refresh_assoc();
        self.assoc.map(|(_, channel)| channel).unwrap_or(0)
    }

    fn bssid(&mut self) -> [u8; 6] {
        self.refresh_assoc();
        self.assoc.map(|(bssid, _)| bssid).unwrap_or([0; 6])
    }

    fn link_snapshot(&mut self) -> LinkSnapshot {
        self.refresh_assoc();
        let (bssid, channel) = self.assoc.unwrap_or(([0; 6], 0));
        let addrs = match self.stack.get_ip_info() {
            Ok(info) => StaticAddrs {
                ip: ip_from_octets(info.ip.octets()),
                gateway: ip_from_octets(info.subnet.gateway.octets()),
                mask: mask_from_prefix(info.subnet.mask.0),
                dns1: info
                    .dns
                    .map(|addr| ip_from_octets(addr.octets()))
                    .unwrap_or(0),
                dns2: info
                    .secondary_dns
                    .map(|addr| ip_from_octets(addr.octets()))
                    .unwrap_or(0),
            },
            Err(_) => StaticAddrs::default(),
        };
        LinkSnapshot {
            addrs,
            bssid,
            channel,
        }
    }

    fn scan(&mut self, out: &mut ScanBuf) {
        let config = ScanConfig::default().with_max(SCAN_MAX);
        let Ok(found) = self.controller.scan_with_config(config) else {
            return;
        };
        for ap in found.iter() {
            let mut ssid = heapless::String::new();
            for ch in ap.ssid.chars().take(32) {
                let _ = ssid.push(ch);
            }
            let entry = ScanEntry {
                ssid,
                rssi: ap.signal_strength,
                channel: ap.channel,
                bssid: ap.bssid,
            };
            if out.push(entry).is_err() {
                break;
            }
        }
    }

    fn resolve_host(&mut self, host: &str) -> Option<u32> {
        // No DNS on the blocking stack; broker hosts are literal addresses.
        parse_ipv4(host)
    }

    fn disconnect(&mut self) {
        let _ = self.controller.disconnect();
    }
}

fn create_interface(device: &mut WifiDevice<'_>) -> Interface {
    Interface::new(
        IfaceConfig::new(HardwareAddress::Ethernet(EthernetAddress::from_bytes(
            &device.mac_address(),
        ))),
        device,
        smoltcp_now(),
    )
}

fn smoltcp_now() -> smoltcp::time::Instant {
    smoltcp::time::Instant::from_micros(
        esp_hal::time::Instant::now().duration_since_epoch().as_micros() as i64,
    )
}

fn current_millis() -> u64 {
    esp_hal::time::Instant::now().duration_since_epoch().as_millis()
}

fn non_zero_addr(ip: u32) -> Option<Ipv4Addr> {
    (ip != 0).then(|| Ipv4Addr::from(ip_octets(ip)))
}

fn mask_from_prefix(prefix: u8) -> u32 {
    let bits = if prefix == 0 {
        0u32
    } else {
        u32::MAX << (32 - u32::from(prefix.min(32)))
    };
    ip_from_octets(bits.to_be_bytes())
}

fn parse_ipv4(text: &str) -> Option<u32> {
    let mut octets = [0u8; 4];
    let mut parts = text.split('.');
    for slot in octets.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(ip_from_octets(octets))
}
