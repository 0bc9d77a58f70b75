//! Minimal MQTT 3.1.1 client over a blocking TCP socket. Only the three
//! packets a boot publish needs: CONNECT, CONNACK, PUBLISH at QoS 0.

use blocking_network_stack::{Socket, Stack};
use embedded_io::{Read, Write};
use esp_radio::wifi::WifiDevice;
use smoltcp::wire::{IpAddress, Ipv4Address};

use relink::session::hal::BrokerClient;
use relink::session::record::ip_octets;

const PACKET_CAP: usize = 384;
const KEEPALIVE_SECS: u16 = 60;
const CONNACK_POLLS: u32 = 2000;

pub(crate) struct TcpBroker<'s> {
    socket: Socket<'s, 'static, WifiDevice<'static>>,
    open: bool,
}

impl<'s> TcpBroker<'s> {
    pub(crate) fn new(
        stack: &'s Stack<'static, WifiDevice<'static>>,
        rx_buffer: &'s mut [u8],
        tx_buffer: &'s mut [u8],
    ) -> Self {
        Self {
            socket: stack.get_socket(rx_buffer, tx_buffer),
            open: false,
        }
    }

    fn send(&mut self, packet: &[u8]) -> bool {
        self.socket.write_all(packet).is_ok() && self.socket.flush().is_ok()
    }

    /// Reads the 4-byte CONNACK, pumping the stack between attempts.
    fn read_connack(&mut self) -> bool {
        let mut reply = [0u8; 4];
        let mut have = 0;
        for _ in 0..CONNACK_POLLS {
            self.socket.work();
            match self.socket.read(&mut reply[have..]) {
                Ok(0) => return false,
                Ok(n) => {
                    have += n;
                    if have == reply.len() {
                        break;
                    }
                }
                Err(_) => continue,
            }
        }
        // Fixed header 0x20, length 2, session-present byte, return code 0.
        have == reply.len() && reply[0] == 0x20 && reply[1] == 0x02 && reply[3] == 0x00
    }
}

impl BrokerClient for TcpBroker<'_> {
    fn socket_connect(&mut self, ip: u32, port: u16) -> bool {
        if self.open {
            return true;
        }
        let [a, b, c, d] = ip_octets(ip);
        self.socket.work();
        self.open = self
            .socket
            .open(IpAddress::Ipv4(Ipv4Address::new(a, b, c, d)), port)
            .is_ok();
        self.open
    }

    fn login(&mut self, client_id: &str, user: &str, pass: &str) -> bool {
        if !self.open {
            return false;
        }
        let mut packet: heapless::Vec<u8, PACKET_CAP> = heapless::Vec::new();
        let mut flags = 0x02u8; // clean session
        if !user.is_empty() {
            flags |= 0x80;
        }
        if !pass.is_empty() {
            flags |= 0x40;
        }
        let mut body: heapless::Vec<u8, PACKET_CAP> = heapless::Vec::new();
        let ok = push_bytes(&mut body, &[0x00, 0x04])
            && push_bytes(&mut body, b"MQTT")
            && push_bytes(&mut body, &[0x04, flags])
            && push_bytes(&mut body, &KEEPALIVE_SECS.to_be_bytes())
            && push_str(&mut body, client_id)
            && (user.is_empty() || push_str(&mut body, user))
            && (pass.is_empty() || push_str(&mut body, pass));
        if !ok
            || !push_bytes(&mut packet, &[0x10])
            || !push_remaining_len(&mut packet, body.len())
            || !push_bytes(&mut packet, &body)
        {
            return false;
        }
        if !self.send(&packet) {
            return false;
        }
        self.read_connack()
    }

    fn publish(&mut self, topic: &str, value: &str) -> bool {
        if !self.open {
            return false;
        }
        let mut packet: heapless::Vec<u8, PACKET_CAP> = heapless::Vec::new();
        let mut body: heapless::Vec<u8, PACKET_CAP> = heapless::Vec::new();
        let ok = push_str(&mut body, topic) && push_bytes(&mut body, value.as_bytes());
        if !ok
            || !push_bytes(&mut packet, &[0x30])
            || !push_remaining_len(&mut packet, body.len())
            || !push_bytes(&mut packet, &body)
        {
            return false;
        }
        // QoS 0 carries no packet id and gets no ack.
        self.send(&packet)
    }
}

fn push_bytes<const N: usize>(buf: &mut heapless::Vec<u8, N>, bytes: &[u8]) -> bool {
    buf.extend_from_slice(bytes).is_ok()
}

fn push_str<const N: usize>(buf: &mut heapless::Vec<u8, N>, text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return false;
    }
    push_bytes(buf, &(bytes.len() as u16).to_be_bytes()) && push_bytes(buf, bytes)
}

fn push_remaining_len<const N: usize>(buf: &mut heapless::Vec<u8, N>, mut len: usize) -> bool {
    loop {
        let mut byte = (len % 128) as u8;
        len /= 128;
        if len > 0 {
            byte |= 0x80;
        }
        if !push_bytes(buf, &[byte]) {
            return false;
        }
        if len == 0 {
            return true;
        }
    }
}
