//! Broadlink wire format.
//!
//! Every datagram starts with an 8-byte magic. Discovery packets are 0x30
//! bytes; control packets carry a 0x38-byte header followed by the AES-128-CBC
//! encrypted payload. Multi-byte fields are little-endian.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike};

use crate::error::BroadlinkError;

pub const MAGIC: [u8; 8] = [0x5a, 0xa5, 0xaa, 0x55, 0x5a, 0xa5, 0xaa, 0x55];

/// Key used until `auth` hands out the session key.
pub const DEFAULT_KEY: [u8; 16] = [
    0x09, 0x76, 0x28, 0x34, 0x3f, 0xe9, 0x9e, 0x23, 0x76, 0x5c, 0x15, 0x13, 0xac, 0xcf, 0x8b, 0x02,
];
pub const IV: [u8; 16] = [
    0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x28, 0xdd, 0xb3, 0xba, 0x69, 0x5a, 0x2e, 0x6f, 0x58,
];

pub const DISCOVERY_LEN: usize = 0x30;
pub const HEADER_LEN: usize = 0x38;
/// Discovery replies carry the MAC up to this offset.
pub const DISCOVERY_REPLY_LEN: usize = 0x40;

pub const CMD_HELLO: u16 = 0x06;
pub const CMD_AUTH: u16 = 0x65;
pub const CMD_CONTROL: u16 = 0x6a;

const CHECKSUM_SEED: u16 = 0xbeaf;

type Encryptor = cbc::Encryptor<aes::Aes128>;
type Decryptor = cbc::Decryptor<aes::Aes128>;

/// 16-bit additive checksum seeded at `0xbeaf`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(CHECKSUM_SEED, |sum, byte| sum.wrapping_add(u16::from(*byte)))
}

/// Write the whole-packet checksum at 0x20. The slot must be zero beforehand.
pub fn seal(packet: &mut [u8]) {
    let sum = checksum(packet);
    packet[0x20..0x22].copy_from_slice(&sum.to_le_bytes());
}

/// Zero-pad to a whole block and encrypt.
#[must_use]
pub fn encrypt(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    let mut padded = plaintext.to_vec();
    padded.resize(plaintext.len().div_ceil(16) * 16, 0);
    Encryptor::new(&(*key).into(), &IV.into()).encrypt_padded_vec_mut::<NoPadding>(&padded)
}

/// # Errors
///
/// Returns [`BroadlinkError::Misaligned`] if `ciphertext` is not a whole
/// number of blocks.
pub fn decrypt(key: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, BroadlinkError> {
    Decryptor::new(&(*key).into(), &IV.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| BroadlinkError::Misaligned(ciphertext.len()))
}

/// What a discovery reply tells about a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub addr: SocketAddr,
    /// Wire order, as echoed back in control headers.
    pub mac: [u8; 6],
    pub devtype: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.mac;
        write!(
            f,
            "{} ({g:02x}:{e:02x}:{d:02x}:{c:02x}:{b:02x}:{a:02x}, type {:#06x})",
            self.addr, self.devtype
        )
    }
}

/// Build the hello datagram announcing `local` at time `now`.
#[must_use]
pub fn discovery_packet<Tz: TimeZone>(local: SocketAddr, now: &DateTime<Tz>) -> Vec<u8> {
    let mut packet = vec![0u8; DISCOVERY_LEN];
    packet[..8].copy_from_slice(&MAGIC);

    let offset_hours = now.offset().fix().local_minus_utc() / 3600;
    packet[0x08..0x0c].copy_from_slice(&offset_hours.to_le_bytes());
    let year = u16::try_from(now.year()).unwrap_or_default();
    packet[0x0c..0x0e].copy_from_slice(&year.to_le_bytes());
    packet[0x0e] = low_byte(now.minute());
    packet[0x0f] = low_byte(now.hour());
    packet[0x10] = low_byte(u32::from(year % 100));
    packet[0x11] = low_byte(now.weekday().number_from_monday());
    packet[0x12] = low_byte(now.day());
    packet[0x13] = low_byte(now.month());

    if let IpAddr::V4(ip) = local.ip() {
        let mut octets = ip.octets();
        octets.reverse();
        packet[0x18..0x1c].copy_from_slice(&octets);
    }
    packet[0x1c..0x1e].copy_from_slice(&local.port().to_le_bytes());
    packet[0x26] = low_byte(u32::from(CMD_HELLO));

    seal(&mut packet);
    packet
}

/// # Errors
///
/// Returns [`BroadlinkError::ShortReply`] if the reply cannot hold a MAC.
pub fn parse_discovery(reply: &[u8], from: SocketAddr) -> Result<DeviceInfo, BroadlinkError> {
    if reply.len() < DISCOVERY_REPLY_LEN {
        return Err(BroadlinkError::ShortReply {
            len: reply.len(),
            min: DISCOVERY_REPLY_LEN,
        });
    }
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&reply[0x3a..0x40]);
    Ok(DeviceInfo {
        addr: from,
        mac,
        devtype: u16::from_le_bytes([reply[0x34], reply[0x35]]),
    })
}

/// One outgoing control packet.
#[derive(Debug)]
pub struct Frame<'a> {
    pub devtype: u16,
    pub command: u16,
    pub count: u16,
    pub mac: [u8; 6],
    pub id: [u8; 4],
    pub payload: &'a [u8],
}

impl Frame<'_> {
    /// Serialize with the payload encrypted under `key`.
    #[must_use]
    pub fn encode(&self, key: &[u8; 16]) -> Vec<u8> {
        let mut packet = vec![0u8; HEADER_LEN];
        packet[..8].copy_from_slice(&MAGIC);
        packet[0x24..0x26].copy_from_slice(&self.devtype.to_le_bytes());
        packet[0x26..0x28].copy_from_slice(&self.command.to_le_bytes());
        packet[0x28..0x2a].copy_from_slice(&self.count.to_le_bytes());
        packet[0x2a..0x30].copy_from_slice(&self.mac);
        packet[0x30..0x34].copy_from_slice(&self.id);
        packet[0x34..0x36].copy_from_slice(&checksum(self.payload).to_le_bytes());
        packet.extend_from_slice(&encrypt(key, self.payload));
        seal(&mut packet);
        packet
    }
}

/// Check a control reply and return its decrypted payload.
///
/// # Errors
///
/// Returns [`BroadlinkError::ShortReply`] for a truncated header,
/// [`BroadlinkError::Device`] when the error code at 0x22 is nonzero, and
/// [`BroadlinkError::Misaligned`] for a payload that does not decrypt.
pub fn open_reply(command: u16, reply: &[u8], key: &[u8; 16]) -> Result<Vec<u8>, BroadlinkError> {
    if reply.len() < HEADER_LEN {
        return Err(BroadlinkError::ShortReply {
            len: reply.len(),
            min: HEADER_LEN,
        });
    }
    let code = i16::from_le_bytes([reply[0x22], reply[0x23]]);
    if code != 0 {
        return Err(BroadlinkError::Device { command, code });
    }
    decrypt(key, &reply[HEADER_LEN..])
}

fn low_byte(value: u32) -> u8 {
    u8::try_from(value & 0xff).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};

    use super::*;

    fn frame(payload: &[u8]) -> Frame<'_> {
        Frame {
            devtype: 0x2737,
            command: CMD_CONTROL,
            count: 0x0102,
            mac: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            id: [0xde, 0xad, 0xbe, 0xef],
            payload,
        }
    }

    #[test]
    fn should_seed_checksum_at_beaf() {
        assert_eq!(checksum(&[]), 0xbeaf);
        assert_eq!(checksum(&[1, 2, 3]), 0xbeb5);
    }

    #[test]
    fn should_wrap_checksum_at_sixteen_bits() {
        let bytes = vec![0xff; 0x200];
        let expected = (0xbeaf_u32 + 0xff * 0x200) & 0xffff;
        assert_eq!(u32::from(checksum(&bytes)), expected);
    }

    #[test]
    fn should_lay_out_control_header() {
        let packet = frame(&[0x02, 0, 0, 0, 0xaa]).encode(&DEFAULT_KEY);

        assert_eq!(&packet[..8], &MAGIC);
        assert_eq!(&packet[0x24..0x26], &[0x37, 0x27]);
        assert_eq!(&packet[0x26..0x28], &[0x6a, 0x00]);
        assert_eq!(&packet[0x28..0x2a], &[0x02, 0x01]);
        assert_eq!(&packet[0x2a..0x30], &[0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);
        assert_eq!(&packet[0x30..0x34], &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(
            u16::from_le_bytes([packet[0x34], packet[0x35]]),
            checksum(&[0x02, 0, 0, 0, 0xaa])
        );
        assert_eq!(packet.len(), HEADER_LEN + 16);
    }

    #[test]
    fn should_checksum_whole_packet_with_slot_zeroed() {
        let mut packet = frame(&[0x04]).encode(&DEFAULT_KEY);
        let stored = u16::from_le_bytes([packet[0x20], packet[0x21]]);
        packet[0x20] = 0;
        packet[0x21] = 0;
        assert_eq!(checksum(&packet), stored);
    }

    #[test]
    fn should_encrypt_payload_with_zero_padding() {
        let packet = frame(&[0x03]).encode(&DEFAULT_KEY);
        let plain = decrypt(&DEFAULT_KEY, &packet[HEADER_LEN..]).unwrap();
        let mut expected = vec![0u8; 16];
        expected[0] = 0x03;
        assert_eq!(plain, expected);
    }

    #[test]
    fn should_reject_reply_with_error_code() {
        let mut reply = vec![0u8; HEADER_LEN];
        reply[0x22..0x24].copy_from_slice(&(-7_i16).to_le_bytes());
        assert!(matches!(
            open_reply(CMD_CONTROL, &reply, &DEFAULT_KEY),
            Err(BroadlinkError::Device { command: 0x6a, code: -7 })
        ));
    }

    #[test]
    fn should_reject_short_reply() {
        assert!(matches!(
            open_reply(CMD_CONTROL, &[0u8; 0x20], &DEFAULT_KEY),
            Err(BroadlinkError::ShortReply { len: 0x20, min: 0x38 })
        ));
    }

    #[test]
    fn should_build_discovery_packet() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = Utc
            .with_ymd_and_hms(2024, 3, 5, 8, 30, 0)
            .unwrap()
            .with_timezone(&tz);
        let local: SocketAddr = "192.168.1.2:40000".parse().unwrap();
        let packet = discovery_packet(local, &now);

        assert_eq!(packet.len(), DISCOVERY_LEN);
        assert_eq!(&packet[0x08..0x0c], &2_i32.to_le_bytes());
        assert_eq!(&packet[0x0c..0x0e], &2024_u16.to_le_bytes());
        assert_eq!(packet[0x0e], 30);
        assert_eq!(packet[0x0f], 10);
        assert_eq!(packet[0x10], 24);
        assert_eq!(packet[0x11], 2);
        assert_eq!(packet[0x12], 5);
        assert_eq!(packet[0x13], 3);
        assert_eq!(&packet[0x18..0x1c], &[2, 1, 168, 192]);
        assert_eq!(&packet[0x1c..0x1e], &40000_u16.to_le_bytes());
        assert_eq!(packet[0x26], 0x06);
    }

    #[test]
    fn should_parse_discovery_reply() {
        let mut reply = vec![0u8; 0x80];
        reply[0x34..0x36].copy_from_slice(&0x5f36_u16.to_le_bytes());
        reply[0x3a..0x40].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        let from: SocketAddr = "192.168.1.30:80".parse().unwrap();

        let info = parse_discovery(&reply, from).unwrap();
        assert_eq!(info.devtype, 0x5f36);
        assert_eq!(info.mac, [1, 2, 3, 4, 5, 6]);
        assert_eq!(info.addr, from);
        assert_eq!(
            info.to_string(),
            "192.168.1.30:80 (06:05:04:03:02:01, type 0x5f36)"
        );
    }
}
