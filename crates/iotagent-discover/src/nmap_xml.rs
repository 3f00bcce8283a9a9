//! Nmap XML output deserialization.
//!
//! Nmap's `-oX -` flag writes structured XML to stdout. The structs below
//! cover the parts the agent reads and convert into an [`EngineReport`].

use std::collections::BTreeMap;

use iotagent_core::{HostStatus, Protocol};
use serde::Deserialize;

use crate::engine::{EngineHost, EngineOsClass, EngineOsMatch, EnginePort, EngineReport};
use crate::error::{DiscoverError, Result};

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct NmapRun {
    /// `<host>` elements may be interleaved with `<hosthint>`,
    /// `<taskprogress>` and friends; collecting them relies on quick-xml's
    /// `overlapped-lists` feature.
    #[serde(rename = "host", default)]
    pub hosts: Vec<NmapHost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapHost {
    pub status: Option<HostState>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub ports: Option<Ports>,
    pub os: Option<OsMatches>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<NmapPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapPort {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: u16,
    pub state: PortState,
    pub service: Option<NmapService>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NmapService {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "@product")]
    pub product: Option<String>,
    #[serde(rename = "@version")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatches {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@accuracy")]
    pub accuracy: Option<String>,
    #[serde(rename = "osclass", default)]
    pub classes: Vec<OsClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsClass {
    #[serde(rename = "@type")]
    pub device_type: Option<String>,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
    #[serde(rename = "@osfamily")]
    pub family: Option<String>,
}

impl NmapHost {
    fn address_of(&self, kind: &str) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == kind)
            .map(|a| a.addr.as_str())
    }

    /// Convert to the engine-neutral host record. Hosts without an IPv4
    /// address are skipped.
    fn to_engine_host(&self) -> Option<EngineHost> {
        let ip = self.address_of("ipv4")?;
        let state = self
            .status
            .as_ref()
            .map_or(HostStatus::Unknown, |s| HostStatus::parse(&s.state));

        let mut host = EngineHost::new(ip, state);
        host.mac = self.address_of("mac").map(String::from);

        if let Some(ports) = &self.ports {
            let mut by_proto: BTreeMap<Protocol, BTreeMap<u16, EnginePort>> = BTreeMap::new();
            for p in &ports.ports {
                let svc = p.service.as_ref();
                by_proto.entry(Protocol::parse(&p.protocol)).or_default().insert(
                    p.port_id,
                    EnginePort {
                        state: p.state.state.clone(),
                        service: svc.map(|s| s.name.clone()),
                        product: svc.and_then(|s| s.product.clone()),
                        version: svc.and_then(|s| s.version.clone()),
                    },
                );
            }
            host.ports = by_proto;
        }

        if let Some(os) = &self.os {
            host.os_matches = os
                .matches
                .iter()
                .map(|m| EngineOsMatch {
                    name: m.name.clone(),
                    accuracy: m.accuracy.as_deref().and_then(|a| a.parse().ok()),
                    classes: m
                        .classes
                        .iter()
                        .map(|c| EngineOsClass {
                            device_type: c.device_type.clone(),
                            vendor: c.vendor.clone(),
                            family: c.family.clone(),
                        })
                        .collect(),
                })
                .collect();
        }

        Some(host)
    }
}

impl NmapRun {
    /// Convert the run into an engine report, keeping nmap's host order.
    pub fn into_report(self) -> EngineReport {
        EngineReport {
            hosts: self.hosts.iter().filter_map(NmapHost::to_engine_host).collect(),
        }
    }
}

/// Parse nmap XML bytes into a structured `NmapRun`.
pub fn parse_nmap_xml(xml: &[u8]) -> Result<NmapRun> {
    quick_xml::de::from_reader(xml).map_err(|e| DiscoverError::XmlParse(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWEEP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sn 192.168.1.0/24" startstr="Mon Oct 19 10:00:00 2026">
  <host>
    <status state="up" reason="arp-response"/>
    <address addr="192.168.1.1" addrtype="ipv4"/>
    <address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="TestVendor"/>
    <hostnames>
      <hostname name="router.lan" type="PTR"/>
    </hostnames>
  </host>
  <host>
    <status state="up" reason="localhost-response"/>
    <address addr="192.168.1.42" addrtype="ipv4"/>
  </host>
  <host>
    <status state="down" reason="no-response"/>
    <address addr="192.168.1.99" addrtype="ipv4"/>
  </host>
  <runstats>
    <finished time="1760868000" elapsed="2.50"/>
    <hosts up="2" down="1" total="3"/>
  </runstats>
</nmaprun>"#;

    const PROFILE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sS -O -sV 192.168.1.20">
  <host>
    <status state="up" reason="arp-response"/>
    <address addr="192.168.1.20" addrtype="ipv4"/>
    <address addr="B8:27:EB:00:11:22" addrtype="mac" vendor="Raspberry Pi Foundation"/>
    <ports>
      <extraports state="closed" count="995"/>
      <port protocol="udp" portid="1900">
        <state state="open|filtered" reason="no-response"/>
        <service name="upnp" method="table" conf="3"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack"/>
        <service name="http" product="lighttpd" version="1.4.59"/>
      </port>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack"/>
        <service name="ssh" product="OpenSSH" version="8.4p1" extrainfo="Raspbian 10"/>
      </port>
      <port protocol="tcp" portid="8883">
        <state state="filtered" reason="no-response"/>
      </port>
    </ports>
    <os>
      <portused state="open" proto="tcp" portid="22"/>
      <osmatch name="Linux 4.15 - 5.8" accuracy="96" line="67000">
        <osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="4.X" accuracy="96"/>
      </osmatch>
      <osmatch name="Linux 5.0 - 5.5" accuracy="91" line="67100">
        <osclass type="specialized" vendor="Linux" osfamily="Linux" osgen="5.X" accuracy="91"/>
      </osmatch>
    </os>
  </host>
</nmaprun>"#;

    #[test]
    fn test_parse_sweep() {
        let report = parse_nmap_xml(SWEEP_XML.as_bytes()).unwrap().into_report();
        assert_eq!(report.hosts.len(), 3);

        let router = &report.hosts[0];
        assert_eq!(router.address, "192.168.1.1");
        assert!(router.is_up());
        assert_eq!(router.mac.as_deref(), Some("AA:BB:CC:DD:EE:01"));

        assert!(report.hosts[1].mac.is_none());
        assert_eq!(report.hosts[2].state, HostStatus::Down);
    }

    #[test]
    fn test_parse_profile() {
        let report = parse_nmap_xml(PROFILE_XML.as_bytes()).unwrap().into_report();
        let host = report.host("192.168.1.20").unwrap();

        let tcp = &host.ports[&Protocol::Tcp];
        let tcp_ports: Vec<u16> = tcp.keys().copied().collect();
        assert_eq!(tcp_ports, vec![22, 80, 8883]);
        assert_eq!(tcp[&22].service.as_deref(), Some("ssh"));
        assert_eq!(tcp[&22].product.as_deref(), Some("OpenSSH"));
        assert_eq!(tcp[&8883].state, "filtered");
        assert!(tcp[&8883].service.is_none());

        let udp = &host.ports[&Protocol::Udp];
        assert_eq!(udp[&1900].state, "open|filtered");
        assert!(udp[&1900].product.is_none());

        assert_eq!(host.os_matches.len(), 2);
        assert_eq!(host.os_matches[0].name, "Linux 4.15 - 5.8");
        assert_eq!(host.os_matches[0].accuracy, Some(96));
        assert_eq!(
            host.os_matches[0].classes[0].device_type.as_deref(),
            Some("general purpose")
        );
    }

    #[test]
    fn test_parse_empty_scan() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sn 10.99.0.0/24">
  <runstats>
    <finished elapsed="1.00"/>
    <hosts up="0" down="256" total="256"/>
  </runstats>
</nmaprun>"#;

        let report = parse_nmap_xml(xml.as_bytes()).unwrap().into_report();
        assert!(report.hosts.is_empty());
    }

    #[test]
    fn test_host_without_ipv4_is_skipped() {
        let xml = r#"<nmaprun>
  <host>
    <status state="up"/>
    <address addr="fe80::1" addrtype="ipv6"/>
  </host>
</nmaprun>"#;

        let report = parse_nmap_xml(xml.as_bytes()).unwrap().into_report();
        assert!(report.hosts.is_empty());
    }

    /// `nmap -sn -oX - --noninteractive 192.168.1.0/24` as written by 7.94.
    const LIVE_SWEEP_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<!-- Nmap 7.94SVN scan initiated Mon Oct 19 10:00:00 2026 as: nmap -sn -oX - -&#45;noninteractive 192.168.1.0/24 -->
<nmaprun scanner="nmap" args="nmap -sn -oX - -&#45;noninteractive 192.168.1.0/24" start="1760868000" startstr="Mon Oct 19 10:00:00 2026" version="7.94SVN" xmloutputversion="1.05">
<verbose level="0"/>
<debugging level="0"/>
<hosthint><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.1" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="TP-Link Technologies"/>
<hostnames>
</hostnames>
</hosthint>
<host><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.1" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="TP-Link Technologies"/>
<hostnames>
<hostname name="router.lan" type="PTR"/>
</hostnames>
<times srtt="1520" rttvar="5000" to="100000"/>
</host>
<hosthint><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.7" addrtype="ipv4"/>
<address addr="18:B4:30:AA:BB:CC" addrtype="mac" vendor="Nest Labs"/>
<hostnames>
</hostnames>
</hosthint>
<host><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.7" addrtype="ipv4"/>
<address addr="18:B4:30:AA:BB:CC" addrtype="mac" vendor="Nest Labs"/>
<hostnames>
</hostnames>
<times srtt="48210" rttvar="48210" to="241050"/>
</host>
<host><status state="up" reason="localhost-response" reason_ttl="0"/>
<address addr="192.168.1.42" addrtype="ipv4"/>
<hostnames>
</hostnames>
</host>
<runstats><finished time="1760868002" timestr="Mon Oct 19 10:00:02 2026" summary="Nmap done at Mon Oct 19 10:00:02 2026; 256 IP addresses (3 hosts up) scanned in 2.31 seconds" elapsed="2.31" exit="success"/><hosts up="3" down="253" total="256"/>
</runstats>
</nmaprun>
"#;

    /// `nmap -sS -O -sV -oX - --noninteractive 192.168.1.20` as written by 7.94.
    const LIVE_PROFILE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<?xml-stylesheet href="file:///usr/bin/../share/nmap/nmap.xsl" type="text/xsl"?>
<nmaprun scanner="nmap" args="nmap -sS -O -sV -oX - -&#45;noninteractive 192.168.1.20" start="1760868100" startstr="Mon Oct 19 10:01:40 2026" version="7.94SVN" xmloutputversion="1.05">
<scaninfo type="syn" protocol="tcp" numservices="1000" services="1,3-4,6-7,9,13,17,19-26"/>
<verbose level="0"/>
<debugging level="0"/>
<taskbegin task="ARP Ping Scan" time="1760868100"/>
<taskend task="ARP Ping Scan" time="1760868100" extrainfo="1 total hosts"/>
<hosthint><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.20" addrtype="ipv4"/>
<address addr="B8:27:EB:00:11:22" addrtype="mac" vendor="Raspberry Pi Foundation"/>
<hostnames>
</hostnames>
</hosthint>
<taskbegin task="SYN Stealth Scan" time="1760868100"/>
<taskprogress task="SYN Stealth Scan" time="1760868130" percent="52.10" remaining="28" etc="1760868158"/>
<taskend task="SYN Stealth Scan" time="1760868104" extrainfo="1000 total ports"/>
<taskbegin task="Service scan" time="1760868104"/>
<taskend task="Service scan" time="1760868110" extrainfo="3 services on 1 host"/>
<host starttime="1760868100" endtime="1760868113"><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="192.168.1.20" addrtype="ipv4"/>
<address addr="B8:27:EB:00:11:22" addrtype="mac" vendor="Raspberry Pi Foundation"/>
<hostnames>
<hostname name="cam-frontdoor.lan" type="PTR"/>
</hostnames>
<ports><extraports state="closed" count="997">
<extrareasons reason="reset" count="997" proto="tcp" ports="1,3-4,6-7,9,13,17,19-21,23-26"/>
</extraports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="ssh" product="OpenSSH" version="8.4p1 Raspbian 2+deb11u1" extrainfo="protocol 2.0" ostype="Linux" method="probed" conf="10"><cpe>cpe:/a:openbsd:openssh:8.4p1</cpe><cpe>cpe:/o:linux:linux_kernel</cpe></service></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="http" product="lighttpd" version="1.4.59" method="probed" conf="10"><cpe>cpe:/a:lighttpd:lighttpd:1.4.59</cpe></service></port>
<port protocol="tcp" portid="554"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="rtsp" method="table" conf="3"/></port>
</ports>
<os><portused state="open" proto="tcp" portid="22"/>
<portused state="closed" proto="tcp" portid="1"/>
<portused state="closed" proto="udp" portid="35551"/>
<osmatch name="Linux 4.15 - 5.8" accuracy="100" line="67754">
<osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="4.X" accuracy="100"><cpe>cpe:/o:linux:linux_kernel:4</cpe></osclass>
<osclass type="general purpose" vendor="Linux" osfamily="Linux" osgen="5.X" accuracy="100"><cpe>cpe:/o:linux:linux_kernel:5</cpe></osclass>
</osmatch>
</os>
<uptime seconds="812345" lastboot="Fri Oct  9 22:22:35 2026"/>
<distance value="1"/>
<tcpsequence index="259" difficulty="Good luck!" values="6A1C2F4E,1B8D0C2A,9E3F5A71,2C7B9D10,F0E1D2C3,5A6B7C8D"/>
<ipidsequence class="All zeros" values="0,0,0,0,0,0"/>
<tcptssequence class="1000HZ" values="306A1C2F,306A1C8B,306A1CF0,306A1D55,306A1DBA,306A1E1F"/>
<times srtt="2803" rttvar="1466" to="100000"/>
</host>
<runstats><finished time="1760868113" timestr="Mon Oct 19 10:01:53 2026" summary="Nmap done at Mon Oct 19 10:01:53 2026; 1 IP address (1 host up) scanned in 13.02 seconds" elapsed="13.02" exit="success"/><hosts up="1" down="0" total="1"/>
</runstats>
</nmaprun>
"#;

    #[test]
    fn test_hosts_interleaved_with_hosthints() {
        let xml = r#"<nmaprun>
<verbose level="0"/>
<debugging level="0"/>
<hosthint><status state="up"/><address addr="192.168.1.1" addrtype="ipv4"/></hosthint>
<host><status state="up"/><address addr="192.168.1.1" addrtype="ipv4"/></host>
<hosthint><status state="up"/><address addr="192.168.1.7" addrtype="ipv4"/></hosthint>
<host><status state="up"/><address addr="192.168.1.7" addrtype="ipv4"/></host>
<runstats/>
</nmaprun>"#;

        let report = parse_nmap_xml(xml.as_bytes()).unwrap().into_report();
        let addrs: Vec<&str> = report.hosts.iter().map(|h| h.address.as_str()).collect();
        assert_eq!(addrs, vec!["192.168.1.1", "192.168.1.7"]);
    }

    #[test]
    fn test_parse_live_sweep_output() {
        let report = parse_nmap_xml(LIVE_SWEEP_XML.as_bytes()).unwrap().into_report();

        let addrs: Vec<&str> = report.hosts.iter().map(|h| h.address.as_str()).collect();
        assert_eq!(addrs, vec!["192.168.1.1", "192.168.1.7", "192.168.1.42"]);
        assert!(report.hosts.iter().all(EngineHost::is_up));
        assert_eq!(report.hosts[1].mac.as_deref(), Some("18:B4:30:AA:BB:CC"));
        assert!(report.hosts[2].mac.is_none());
        assert!(report.hosts[0].ports.is_empty());
    }

    #[test]
    fn test_parse_live_profile_output() {
        let report = parse_nmap_xml(LIVE_PROFILE_XML.as_bytes())
            .unwrap()
            .into_report();
        assert_eq!(report.hosts.len(), 1);

        let host = report.host("192.168.1.20").unwrap();
        assert_eq!(host.mac.as_deref(), Some("B8:27:EB:00:11:22"));

        let tcp = &host.ports[&Protocol::Tcp];
        assert_eq!(tcp.keys().copied().collect::<Vec<_>>(), vec![22, 80, 554]);
        assert_eq!(tcp[&22].product.as_deref(), Some("OpenSSH"));
        assert_eq!(tcp[&22].version.as_deref(), Some("8.4p1 Raspbian 2+deb11u1"));
        assert_eq!(tcp[&554].service.as_deref(), Some("rtsp"));
        assert!(tcp[&554].product.is_none());

        assert_eq!(host.os_matches.len(), 1);
        assert_eq!(host.os_matches[0].accuracy, Some(100));
        assert_eq!(host.os_matches[0].classes.len(), 2);
        assert_eq!(
            host.os_matches[0].classes[0].device_type.as_deref(),
            Some("general purpose")
        );
    }

    #[test]
    fn test_invalid_xml() {
        let err = parse_nmap_xml(b"<nmaprun><host><status state=\"up\"/>").unwrap_err();
        assert!(matches!(err, DiscoverError::XmlParse(_)));
    }
}
