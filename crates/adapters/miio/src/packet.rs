//! Miio wire format.
//!
//! ```text
//! 0      2      4          8          12         16                32
//! | 2131 | len  | unknown  | device id| stamp    | checksum (MD5)  | data
//! ```
//!
//! Fields are big-endian. `data` is the AES-encrypted JSON; the checksum is
//! MD5 over the packet with the token in the checksum slot.

use crate::cipher::MiioCipher;
use crate::error::MiioError;

pub const HEADER_LEN: usize = 32;
pub const MAGIC: [u8; 2] = [0x21, 0x31];

/// Device identity carried in every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub device_id: u32,
    pub stamp: u32,
}

/// The 32-byte hello: magic, length, then `0xff` everywhere else.
#[must_use]
pub fn hello_packet() -> [u8; HEADER_LEN] {
    let mut packet = [0xff; HEADER_LEN];
    packet[..2].copy_from_slice(&MAGIC);
    packet[2..4].copy_from_slice(&[0x00, 0x20]);
    packet
}

/// # Errors
///
/// Returns [`MiioError::Malformed`] for a short packet or a wrong magic.
pub fn parse_header(packet: &[u8]) -> Result<Header, MiioError> {
    if packet.len() < HEADER_LEN || packet[..2] != MAGIC {
        return Err(MiioError::Malformed(packet.len()));
    }
    Ok(Header {
        device_id: u32::from_be_bytes([packet[8], packet[9], packet[10], packet[11]]),
        stamp: u32::from_be_bytes([packet[12], packet[13], packet[14], packet[15]]),
    })
}

/// Build an encrypted packet carrying `json`.
#[must_use]
pub fn encode(token: &[u8; 16], cipher: &MiioCipher, header: Header, json: &[u8]) -> Vec<u8> {
    let data = cipher.encrypt(json);
    let len = u16::try_from(HEADER_LEN + data.len()).unwrap_or(u16::MAX);

    let mut packet = Vec::with_capacity(HEADER_LEN + data.len());
    packet.extend_from_slice(&MAGIC);
    packet.extend_from_slice(&len.to_be_bytes());
    packet.extend_from_slice(&[0; 4]);
    packet.extend_from_slice(&header.device_id.to_be_bytes());
    packet.extend_from_slice(&header.stamp.to_be_bytes());
    packet.extend_from_slice(token);
    packet.extend_from_slice(&data);

    let digest = checksum(token, &packet);
    packet[16..HEADER_LEN].copy_from_slice(&digest);
    packet
}

/// MD5 over the packet with `token` standing in for the checksum slot.
#[must_use]
pub fn checksum(token: &[u8; 16], packet: &[u8]) -> [u8; 16] {
    let mut ctx = md5::Context::new();
    ctx.consume(&packet[..16]);
    ctx.consume(token);
    ctx.consume(&packet[HEADER_LEN..]);
    ctx.compute().0
}

/// Whether the packet's checksum was computed with `token`.
#[must_use]
pub fn verify_checksum(token: &[u8; 16], packet: &[u8]) -> bool {
    packet.len() >= HEADER_LEN && checksum(token, packet)[..] == packet[16..HEADER_LEN]
}

/// Check and decrypt a reply.
///
/// # Errors
///
/// Returns [`MiioError::Malformed`], [`MiioError::Checksum`] or
/// [`MiioError::Cipher`].
pub fn decode(
    token: &[u8; 16],
    cipher: &MiioCipher,
    packet: &[u8],
) -> Result<(Header, Vec<u8>), MiioError> {
    let header = parse_header(packet)?;
    if !verify_checksum(token, packet) {
        return Err(MiioError::Checksum);
    }
    let mut plain = cipher.decrypt(&packet[HEADER_LEN..])?;
    while plain.last() == Some(&0) {
        plain.pop();
    }
    Ok((header, plain))
}
