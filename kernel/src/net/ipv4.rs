//! IPv4 (Internet Protocol version 4)
//!
//! Monta e envia datagramas simples (sem fragmentação, sem roteamento) e
//! decodifica o campo de protocolo dos pacotes recebidos para diagnóstico.

#![allow(dead_code)]

use alloc::vec::Vec;

use super::ethernet::ETHERTYPE_IPV4;
use super::{arp, icmp, Ipv4Addr, NetDevice};
use crate::util::{kprintln, KError, KResult};

/// Protocolo de transporte
pub const PROTO_ICMP: u8 = 1;
pub const PROTO_IGMP: u8 = 2;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

pub const IPV4_HEADER_LEN: usize = 20;
const IPV4_TTL: u8 = 64;

/// Pacote IPv4 parseado
#[derive(Debug)]
pub struct Ipv4Packet {
    pub version: u8,
    pub ihl: u8,
    pub total_length: u16,
    pub identification: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub header_len: usize,
}

impl Ipv4Packet {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < IPV4_HEADER_LEN {
            return None;
        }

        let version = data[0] >> 4;
        let ihl = data[0] & 0x0F;
        if version != 4 || ihl < 5 {
            return None;
        }

        let header_len = (ihl as usize) * 4;
        if data.len() < header_len {
            return None;
        }

        Some(Self {
            version,
            ihl,
            total_length: u16::from_be_bytes([data[2], data[3]]),
            identification: u16::from_be_bytes([data[4], data[5]]),
            ttl: data[8],
            protocol: data[9],
            checksum: u16::from_be_bytes([data[10], data[11]]),
            src: Ipv4Addr::from_bytes(&data[12..16]),
            dst: Ipv4Addr::from_bytes(&data[16..20]),
            header_len,
        })
    }
}

/// Calcula o checksum do header IPv4: soma em complemento de um das
/// halfwords, dobrada até não sobrar carry, complementada.
pub fn compute_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for i in (0..header.len()).step_by(2) {
        let word = if i + 1 < header.len() {
            u16::from_be_bytes([header[i], header[i + 1]])
        } else {
            u16::from_be_bytes([header[i], 0])
        };
        sum += word as u32;
    }

    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !(sum as u16)
}

/// Envia um datagrama IPv4 para `dst`.
///
/// A resolução ARP acontece primeiro; se falhar, nada é transmitido.
pub fn send(dev: &dyn NetDevice, dst: Ipv4Addr, protocol: u8, payload: &[u8]) -> KResult<()> {
    let Some(dst_mac) = arp::resolve(dev, dst) else {
        kprintln!("net: couldn't resolve {}", dst);
        return Err(KError::NotFound);
    };

    let total_len = IPV4_HEADER_LEN + payload.len();
    let mut packet = Vec::with_capacity(total_len);

    // Version (4) + IHL (5)
    packet.push(0x45);
    // DSCP + ECN
    packet.push(0);
    // Total length
    packet.extend_from_slice(&(total_len as u16).to_be_bytes());
    // Identification
    packet.extend_from_slice(&0u16.to_be_bytes());
    // Flags + fragment offset
    packet.extend_from_slice(&0u16.to_be_bytes());
    // TTL
    packet.push(IPV4_TTL);
    // Protocol
    packet.push(protocol);
    // Checksum (placeholder)
    packet.push(0);
    packet.push(0);
    // Source IP
    packet.extend_from_slice(&dev.ip().0);
    // Dest IP
    packet.extend_from_slice(&dst.0);

    // Checksum covers the header only.
    let checksum = compute_checksum(&packet);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());

    packet.extend_from_slice(payload);

    dev.send_frame(dst_mac, ETHERTYPE_IPV4, &packet)
}

/// Processa um pacote IPv4 recebido: apenas identifica o protocolo de
/// transporte e registra um diagnóstico.
pub fn handle_packet(data: &[u8]) {
    let Some(ip) = Ipv4Packet::parse(data) else {
        return;
    };

    let payload = &data[ip.header_len..];

    match ip.protocol {
        PROTO_ICMP => {
            if let Some(msg) = icmp::IcmpMessage::parse(payload) {
                kprintln!("net: received ICMP - type={}, code={}", msg.msg_type, msg.code);
            }
        }
        PROTO_IGMP => {
            kprintln!("net: received IGMP");
        }
        PROTO_TCP => {
            kprintln!("net: received TCP");
        }
        PROTO_UDP => {
            kprintln!("net: received UDP");
        }
        _ => {
            // Protocolo não suportado
        }
    }
}
