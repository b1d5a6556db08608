//! ARP (Address Resolution Protocol)
//!
//! Cache de endereços por adaptador mais a resolução bloqueante usada por
//! `ipv4::send`. O cache é uma tabela de endereçamento aberto com sondagem
//! linear; entradas nunca expiram, apenas são sobrescritas.

#![allow(dead_code)]

use alloc::boxed::Box;
use alloc::vec::Vec;

use super::ethernet::ETHERTYPE_ARP;
use super::{Ipv4Addr, MacAddr, NetDevice};
use crate::util::{kprintln, KResult};

const ARP_HTYPE_ETHERNET: u16 = 1;
const ARP_PTYPE_IPV4: u16 = 0x0800;
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;

pub const ARP_PACKET_LEN: usize = 28;
pub const ARP_CACHE_SIZE: usize = 256;

/// Resolution limits: one request per round, fixed sleep in between.
pub const ARP_MAX_ATTEMPTS: usize = 5;
pub const ARP_RETRY_TICKS: u64 = 2000;

#[derive(Clone, Copy)]
struct ArpEntry {
    ip: u32,
    filled: bool,
    mac: MacAddr,
}

impl ArpEntry {
    const EMPTY: ArpEntry = ArpEntry { ip: 0, filled: false, mac: MacAddr::ZERO };
}

/// IPv4 -> MAC table, open addressing with linear probing from `ip % size`.
pub struct ArpCache {
    entries: Box<[ArpEntry; ARP_CACHE_SIZE]>,
}

impl ArpCache {
    pub fn new() -> Self {
        Self { entries: Box::new([ArpEntry::EMPTY; ARP_CACHE_SIZE]) }
    }

    /// Insert or update a mapping. Returns `false` when the probe cycle
    /// finds neither the IP nor a free slot (no eviction is performed).
    pub fn store(&mut self, ip: Ipv4Addr, mac: MacAddr) -> bool {
        let key = ip.to_u32();
        let hash = key as usize % ARP_CACHE_SIZE;
        for probe in 0..ARP_CACHE_SIZE {
            let entry = &mut self.entries[(hash + probe) % ARP_CACHE_SIZE];
            if entry.ip == key || !entry.filled {
                entry.ip = key;
                entry.filled = true;
                entry.mac = mac;
                return true;
            }
        }
        false
    }

    /// Probe for a mapping without any side effect.
    pub fn lookup(&self, ip: Ipv4Addr) -> Option<MacAddr> {
        let key = ip.to_u32();
        let hash = key as usize % ARP_CACHE_SIZE;
        for probe in 0..ARP_CACHE_SIZE {
            let entry = &self.entries[(hash + probe) % ARP_CACHE_SIZE];
            if entry.filled && entry.ip == key {
                return Some(entry.mac);
            }
        }
        None
    }
}

impl Default for ArpCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Pacote ARP parseado
#[derive(Debug)]
pub struct ArpPacket {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub oper: u16,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

impl ArpPacket {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < ARP_PACKET_LEN {
            return None;
        }

        Some(Self {
            htype: u16::from_be_bytes([data[0], data[1]]),
            ptype: u16::from_be_bytes([data[2], data[3]]),
            hlen: data[4],
            plen: data[5],
            oper: u16::from_be_bytes([data[6], data[7]]),
            sha: MacAddr::from_bytes(&data[8..14]),
            spa: Ipv4Addr::from_bytes(&data[14..18]),
            tha: MacAddr::from_bytes(&data[18..24]),
            tpa: Ipv4Addr::from_bytes(&data[24..28]),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ARP_PACKET_LEN);
        buf.extend_from_slice(&self.htype.to_be_bytes());
        buf.extend_from_slice(&self.ptype.to_be_bytes());
        buf.push(self.hlen);
        buf.push(self.plen);
        buf.extend_from_slice(&self.oper.to_be_bytes());
        buf.extend_from_slice(&self.sha.0);
        buf.extend_from_slice(&self.spa.0);
        buf.extend_from_slice(&self.tha.0);
        buf.extend_from_slice(&self.tpa.0);
        buf
    }
}

/// Resolve um IP para MAC (blocking).
///
/// Sonda o cache, envia um request e dorme um intervalo fixo, repetindo até
/// `ARP_MAX_ATTEMPTS` vezes. Aprendizado passivo (via `handle_packet`)
/// preenche o cache entre as tentativas.
pub fn resolve(dev: &dyn NetDevice, ip: Ipv4Addr) -> Option<MacAddr> {
    for _ in 0..ARP_MAX_ATTEMPTS {
        if let Some(mac) = dev.arp_cache().lock().lookup(ip) {
            return Some(mac);
        }
        let _ = send_request(dev, ip);
        dev.services().sleep_ticks(ARP_RETRY_TICKS);
    }
    None
}

/// Envia um ARP request para `target`.
pub fn send_request(dev: &dyn NetDevice, target: Ipv4Addr) -> KResult<()> {
    kprintln!("net: sending ARP request for {}", target);
    send(dev, dev.ip(), target, MacAddr::ZERO, ARP_OP_REQUEST)
}

/// Envia um ARP reply para `target_ip` / `target_mac`.
pub fn send_reply(dev: &dyn NetDevice, target_ip: Ipv4Addr, target_mac: MacAddr) -> KResult<()> {
    send(dev, dev.ip(), target_ip, target_mac, ARP_OP_REPLY)
}

/// Broadcast de um request de teste para `ip` (útil no shell do kernel).
pub fn probe(dev: &dyn NetDevice, ip: Ipv4Addr) -> KResult<()> {
    send(dev, ip, ip, MacAddr::BROADCAST, ARP_OP_REQUEST)
}

fn send(
    dev: &dyn NetDevice,
    sender_ip: Ipv4Addr,
    target_ip: Ipv4Addr,
    target_mac: MacAddr,
    oper: u16,
) -> KResult<()> {
    let packet = ArpPacket {
        htype: ARP_HTYPE_ETHERNET,
        ptype: ARP_PTYPE_IPV4,
        hlen: 6,
        plen: 4,
        oper,
        sha: dev.mac(),
        spa: sender_ip,
        tha: target_mac,
        tpa: target_ip,
    };
    dev.send_frame(target_mac, ETHERTYPE_ARP, &packet.to_bytes())
}

/// Processa um pacote ARP recebido.
///
/// Requests são respondidos e o sender é aprendido; replies apenas
/// alimentam o cache. O aprendizado acontece mesmo sem resolução pendente.
pub fn handle_packet(dev: &dyn NetDevice, data: &[u8]) {
    let Some(arp) = ArpPacket::parse(data) else {
        return;
    };

    if arp.htype != ARP_HTYPE_ETHERNET || arp.ptype != ARP_PTYPE_IPV4 {
        return;
    }

    match arp.oper {
        ARP_OP_REQUEST => {
            kprintln!("net: ARP request received");
            let _ = send_reply(dev, arp.spa, arp.sha);
            dev.arp_cache().lock().store(arp.spa, arp.sha);
        }
        ARP_OP_REPLY => {
            kprintln!("net: ARP reply received");
            dev.arp_cache().lock().store(arp.spa, arp.sha);
        }
        _ => {}
    }
}
