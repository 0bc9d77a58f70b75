//! The persisted connection record: one fixed-size image holding the last
//! known-good AP parameters, static IP configuration, and broker account.
//!
//! The image is packed little-endian with no padding, so the marker alone
//! decides schema compatibility. Older firmwares wrote `0xF3ED` (address-only
//! layout) and `0x1AC3` (padded C-struct layout); both must fail the marker
//! check and be treated as an absent record.

/// Marker for the current broker-extended packed layout.
pub const RECORD_MAGIC: u16 = 0x1AC4;

/// Historic address-only layout. Never accepted.
pub const RECORD_MAGIC_ADDR_ONLY: u16 = 0xF3ED;
/// Historic padded-struct layout. Never accepted.
pub const RECORD_MAGIC_PADDED: u16 = 0x1AC3;

/// Capacity of each NUL-padded text field, terminator included.
pub const TEXT_CAP: usize = 50;

/// Serialized image size in bytes.
pub const RECORD_LEN: usize = 286;

const OFF_MAGIC: usize = 0;
const OFF_IP: usize = 2;
const OFF_GATEWAY: usize = 6;
const OFF_MASK: usize = 10;
const OFF_DNS1: usize = 14;
const OFF_DNS2: usize = 18;
const OFF_SSID: usize = 22;
const OFF_PASSPHRASE: usize = 72;
const OFF_BSSID: usize = 122;
const OFF_CHANNEL: usize = 128;
const OFF_BROKER_HOST: usize = 129;
const OFF_BROKER_IP: usize = 179;
const OFF_BROKER_PORT: usize = 183;
const OFF_BROKER_USER: usize = 185;
const OFF_BROKER_PASS: usize = 235;
const OFF_FORCE_SLOW: usize = 285;

/// IPv4 addresses travel as `u32` with the first octet in the low byte,
/// matching the on-wire order of the serialized image.
pub fn ip_from_octets(octets: [u8; 4]) -> u32 {
    u32::from_le_bytes(octets)
}

pub fn ip_octets(ip: u32) -> [u8; 4] {
    ip.to_le_bytes()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub magic: u16,
    pub ip: u32,
    pub gateway: u32,
    pub mask: u32,
    pub dns1: u32,
    pub dns2: u32,
    pub ssid: [u8; TEXT_CAP],
    pub passphrase: [u8; TEXT_CAP],
    pub bssid: [u8; 6],
    pub channel: u8,
    pub broker_host: [u8; TEXT_CAP],
    pub broker_ip: u32,
    pub broker_port: u16,
    pub broker_user: [u8; TEXT_CAP],
    pub broker_pass: [u8; TEXT_CAP],
    pub force_slow: u8,
}

impl Default for ConnectionRecord {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl ConnectionRecord {
    pub const fn zeroed() -> Self {
        Self {
            magic: 0,
            ip: 0,
            gateway: 0,
            mask: 0,
            dns1: 0,
            dns2: 0,
            ssid: [0; TEXT_CAP],
            passphrase: [0; TEXT_CAP],
            bssid: [0; 6],
            channel: 0,
            broker_host: [0; TEXT_CAP],
            broker_ip: 0,
            broker_port: 0,
            broker_user: [0; TEXT_CAP],
            broker_pass: [0; TEXT_CAP],
            force_slow: 0,
        }
    }

    pub fn decode(buf: &[u8; RECORD_LEN]) -> Self {
        let mut record = Self::zeroed();
        record.magic = u16::from_le_bytes([buf[OFF_MAGIC], buf[OFF_MAGIC + 1]]);
        record.ip = read_u32(buf, OFF_IP);
        record.gateway = read_u32(buf, OFF_GATEWAY);
        record.mask = read_u32(buf, OFF_MASK);
        record.dns1 = read_u32(buf, OFF_DNS1);
        record.dns2 = read_u32(buf, OFF_DNS2);
        record.ssid.copy_from_slice(&buf[OFF_SSID..OFF_SSID + TEXT_CAP]);
        record
            .passphrase
            .copy_from_slice(&buf[OFF_PASSPHRASE..OFF_PASSPHRASE + TEXT_CAP]);
        record.bssid.copy_from_slice(&buf[OFF_BSSID..OFF_BSSID + 6]);
        record.channel = buf[OFF_CHANNEL];
        record
            .broker_host
            .copy_from_slice(&buf[OFF_BROKER_HOST..OFF_BROKER_HOST + TEXT_CAP]);
        record.broker_ip = read_u32(buf, OFF_BROKER_IP);
        record.broker_port = u16::from_le_bytes([buf[OFF_BROKER_PORT], buf[OFF_BROKER_PORT + 1]]);
        record
            .broker_user
            .copy_from_slice(&buf[OFF_BROKER_USER..OFF_BROKER_USER + TEXT_CAP]);
        record
            .broker_pass
            .copy_from_slice(&buf[OFF_BROKER_PASS..OFF_BROKER_PASS + TEXT_CAP]);
        record.force_slow = buf[OFF_FORCE_SLOW];
        record
    }

    pub fn encode(&self, buf: &mut [u8; RECORD_LEN]) {
        buf.fill(0);
        buf[OFF_MAGIC..OFF_MAGIC + 2].copy_from_slice(&self.magic.to_le_bytes());
        write_u32(buf, OFF_IP, self.ip);
        write_u32(buf, OFF_GATEWAY, self.gateway);
        write_u32(buf, OFF_MASK, self.mask);
        write_u32(buf, OFF_DNS1, self.dns1);
        write_u32(buf, OFF_DNS2, self.dns2);
        buf[OFF_SSID..OFF_SSID + TEXT_CAP].copy_from_slice(&self.ssid);
        buf[OFF_PASSPHRASE..OFF_PASSPHRASE + TEXT_CAP].copy_from_slice(&self.passphrase);
        buf[OFF_BSSID..OFF_BSSID + 6].copy_from_slice(&self.bssid);
        buf[OFF_CHANNEL] = self.channel;
        buf[OFF_BROKER_HOST..OFF_BROKER_HOST + TEXT_CAP].copy_from_slice(&self.broker_host);
        write_u32(buf, OFF_BROKER_IP, self.broker_ip);
        buf[OFF_BROKER_PORT..OFF_BROKER_PORT + 2].copy_from_slice(&self.broker_port.to_le_bytes());
        buf[OFF_BROKER_USER..OFF_BROKER_USER + TEXT_CAP].copy_from_slice(&self.broker_user);
        buf[OFF_BROKER_PASS..OFF_BROKER_PASS + TEXT_CAP].copy_from_slice(&self.broker_pass);
        buf[OFF_FORCE_SLOW] = self.force_slow;
    }

    /// Marker equality is the only schema check; anything else is an
    /// absent record and every field must be rebuilt.
    pub fn is_valid(&self) -> bool {
        self.magic == RECORD_MAGIC
    }

    /// The fast path needs a specific AP: a real channel, a real BSSID,
    /// and no pending forced revalidation.
    pub fn is_fast_eligible(&self) -> bool {
        self.is_valid()
            && self.channel != 0
            && self.bssid != [0u8; 6]
            && self.force_slow == 0
    }

    pub fn ssid_str(&self) -> &str {
        text_str(&self.ssid)
    }

    pub fn passphrase_str(&self) -> &str {
        text_str(&self.passphrase)
    }

    pub fn broker_host_str(&self) -> &str {
        text_str(&self.broker_host)
    }

    pub fn broker_user_str(&self) -> &str {
        text_str(&self.broker_user)
    }

    pub fn broker_pass_str(&self) -> &str {
        text_str(&self.broker_pass)
    }

    pub fn set_ssid(&mut self, value: &str) {
        copy_text(&mut self.ssid, value);
    }

    pub fn set_passphrase(&mut self, value: &str) {
        copy_text(&mut self.passphrase, value);
    }

    pub fn set_broker_host(&mut self, value: &str) {
        copy_text(&mut self.broker_host, value);
    }

    pub fn set_broker_user(&mut self, value: &str) {
        copy_text(&mut self.broker_user, value);
    }

    pub fn set_broker_pass(&mut self, value: &str) {
        copy_text(&mut self.broker_pass, value);
    }
}

fn read_u32(buf: &[u8; RECORD_LEN], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn write_u32(buf: &mut [u8; RECORD_LEN], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Truncates at the last byte so a full field still carries a terminator.
fn copy_text(dst: &mut [u8; TEXT_CAP], src: &str) {
    dst.fill(0);
    let take = src.len().min(TEXT_CAP - 1);
    dst[..take].copy_from_slice(&src.as_bytes()[..take]);
}

fn text_str(field: &[u8; TEXT_CAP]) -> &str {
    let end = field.iter().position(|&b| b == 0).unwrap_or(TEXT_CAP);
    core::str::from_utf8(&field[..end]).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eligible_record() -> ConnectionRecord {
        let mut record = ConnectionRecord::zeroed();
        record.magic = RECORD_MAGIC;
        record.ip = ip_from_octets([192, 168, 1, 40]);
        record.gateway = ip_from_octets([192, 168, 1, 1]);
        record.mask = ip_from_octets([255, 255, 255, 0]);
        record.dns1 = ip_from_octets([192, 168, 1, 1]);
        record.dns2 = ip_from_octets([8, 8, 8, 8]);
        record.set_ssid("attic");
        record.set_passphrase("hunter22");
        record.bssid = [0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33];
        record.channel = 6;
        record.set_broker_host("192.168.1.2");
        record.broker_ip = ip_from_octets([192, 168, 1, 2]);
        record.broker_port = 1883;
        record.set_broker_user("led");
        record.set_broker_pass("ledpass");
        record
    }

    #[test]
    fn encode_places_fields_at_fixed_offsets() {
        let record = eligible_record();
        let mut buf = [0u8; RECORD_LEN];
        record.encode(&mut buf);

        assert_eq!(u16::from_le_bytes([buf[0], buf[1]]), RECORD_MAGIC);
        assert_eq!(&buf[2..6], &[192, 168, 1, 40]);
        assert_eq!(&buf[22..27], b"attic");
        assert_eq!(buf[27], 0);
        assert_eq!(&buf[122..128], &[0xAA, 0xBB, 0xCC, 0x11, 0x22, 0x33]);
        assert_eq!(buf[128], 6);
        assert_eq!(u16::from_le_bytes([buf[183], buf[184]]), 1883);
        assert_eq!(buf[285], 0);
    }

    #[test]
    fn decode_round_trips_encode() {
        let record = eligible_record();
        let mut buf = [0u8; RECORD_LEN];
        record.encode(&mut buf);
        assert_eq!(ConnectionRecord::decode(&buf), record);
    }

    #[test]
    fn eligibility_requires_marker_channel_bssid_and_clear_flag() {
        let record = eligible_record();
        assert!(record.is_fast_eligible());

        let mut bad_marker = record;
        bad_marker.magic = 0x1AC5;
        assert!(!bad_marker.is_valid());
        assert!(!bad_marker.is_fast_eligible());

        let mut zero_channel = record;
        zero_channel.channel = 0;
        assert!(zero_channel.is_valid());
        assert!(!zero_channel.is_fast_eligible());

        let mut zero_bssid = record;
        zero_bssid.bssid = [0; 6];
        assert!(!zero_bssid.is_fast_eligible());

        let mut forced = record;
        forced.force_slow = 1;
        assert!(forced.is_valid());
        assert!(!forced.is_fast_eligible());
    }

    #[test]
    fn legacy_markers_never_validate() {
        let mut record = eligible_record();
        record.magic = RECORD_MAGIC_ADDR_ONLY;
        assert!(!record.is_valid());
        record.magic = RECORD_MAGIC_PADDED;
        assert!(!record.is_valid());
    }

    #[test]
    fn overlong_text_truncates_with_terminator() {
        let mut record = ConnectionRecord::zeroed();
        let long: std::string::String = core::iter::repeat('x').take(80).collect();
        record.set_ssid(&long);
        assert_eq!(record.ssid_str().len(), TEXT_CAP - 1);
        assert_eq!(record.ssid[TEXT_CAP - 1], 0);
    }

    #[test]
    fn ip_octet_order_is_first_octet_low_byte() {
        let ip = ip_from_octets([10, 0, 0, 7]);
        assert_eq!(ip & 0xFF, 10);
        assert_eq!(ip_octets(ip), [10, 0, 0, 7]);
    }
}
