//! Ethernet (Layer 2)

#![allow(dead_code)]

use super::{arp, ipv4, MacAddr, NetDevice};

/// EtherTypes
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_ARP: u16 = 0x0806;
pub const ETHERTYPE_IPX: u16 = 0x8137;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;

/// Frame sizes. The hardware inserts the source address on transmit, so an
/// outbound payload runs from 0 to `ETH_MAX_DATA` bytes and is padded up to
/// `ETH_MIN_DATA`.
pub const ETH_HEADER_LEN: usize = 14;
pub const ETH_MIN_DATA: usize = 46;
pub const ETH_MAX_DATA: usize = 1500;

/// Frame Ethernet parseado (formato recebido: dst, src, ethertype).
#[derive(Debug)]
pub struct EthernetFrame {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
    pub payload_offset: usize,
}

impl EthernetFrame {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ETH_HEADER_LEN {
            return None;
        }

        Some(Self {
            dst: MacAddr::from_bytes(&data[0..6]),
            src: MacAddr::from_bytes(&data[6..12]),
            ethertype: u16::from_be_bytes([data[12], data[13]]),
            payload_offset: ETH_HEADER_LEN,
        })
    }
}

/// Processa um frame Ethernet recebido.
pub fn handle_frame(dev: &dyn NetDevice, frame: &EthernetFrame, raw: &[u8]) {
    let payload = &raw[frame.payload_offset..];

    match frame.ethertype {
        ETHERTYPE_ARP => {
            arp::handle_packet(dev, payload);
        }
        ETHERTYPE_IPV4 => {
            ipv4::handle_packet(payload);
        }
        ETHERTYPE_IPX | ETHERTYPE_IPV6 => {
            // Recognized but not handled.
        }
        _ => {
            // Ignora outros tipos
        }
    }
}
