//! BPF filter helpers for the sniffer

use std::net::Ipv4Addr;

/// Ports HTTP is commonly served on in the clear
pub const HTTP_PORTS: &[u16] = &[80, 8000, 8008, 8080];

/// ARP filter
pub fn arp_filter() -> String {
    "arp".to_string()
}

/// IPv4 filter
pub fn ipv4_filter() -> String {
    "ip".to_string()
}

/// TCP filter
pub fn tcp_filter() -> String {
    "tcp".to_string()
}

/// Filter for specific source or destination IP
pub fn host_filter(ip: Ipv4Addr) -> String {
    format!("host {}", ip)
}

/// Filter for specific TCP port (source or destination)
pub fn tcp_port_filter(port: u16) -> String {
    format!("tcp port {}", port)
}

/// TCP segments on any of the [`HTTP_PORTS`]
pub fn http_filter() -> String {
    let ports: Vec<String> = HTTP_PORTS.iter().map(|&p| tcp_port_filter(p)).collect();
    let refs: Vec<&str> = ports.iter().map(String::as_str).collect();
    combine_filters_or(&refs)
}

/// Everything worth seeing while sitting between `target` and `gateway`:
/// ARP chatter between the two, and every IPv4 packet the target sends or
/// receives.
pub fn mitm_filter(target: Ipv4Addr, gateway: Ipv4Addr) -> String {
    let arp_between = combine_filters(&[
        &arp_filter(),
        &combine_filters_or(&[&host_filter(target), &host_filter(gateway)]),
    ]);
    let target_ip = combine_filters(&[&ipv4_filter(), &host_filter(target)]);
    combine_filters_or(&[&arp_between, &target_ip])
}

/// Combine multiple filters with AND logic
pub fn combine_filters(filters: &[&str]) -> String {
    join_filters(filters, " and ")
}

/// Combine multiple filters with OR logic
pub fn combine_filters_or(filters: &[&str]) -> String {
    join_filters(filters, " or ")
}

fn join_filters(filters: &[&str], op: &str) -> String {
    filters
        .iter()
        .filter(|f| !f.is_empty())
        .map(|f| format!("({})", f))
        .collect::<Vec<_>>()
        .join(op)
}
