//! Internet checksum (RFC 1071) used by the IPv4 and TCP codecs

/// Calculates the Internet Checksum as defined in RFC 1071.
///
/// The data is summed as big-endian 16-bit words, folded to 16 bits and
/// complemented. An odd trailing byte is padded with zero.
///
/// # Examples
///
/// ```
/// use arpmitm_packet::checksum::internet_checksum;
///
/// let data = vec![0x45, 0x00, 0x00, 0x3c];
/// let checksum = internet_checksum(&data);
/// ```
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }

    if let Some(&byte) = chunks.remainder().first() {
        sum += (byte as u32) << 8;
    }

    while (sum >> 16) != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}

/// Checksum for a TCP or UDP segment including the IPv4 pseudo-header
pub fn transport_checksum(src_ip: &[u8; 4], dst_ip: &[u8; 4], protocol: u8, data: &[u8]) -> u16 {
    let mut pseudo_header = Vec::with_capacity(12 + data.len());

    pseudo_header.extend_from_slice(src_ip);
    pseudo_header.extend_from_slice(dst_ip);
    pseudo_header.push(0);
    pseudo_header.push(protocol);
    pseudo_header.extend_from_slice(&(data.len() as u16).to_be_bytes());
    pseudo_header.extend_from_slice(data);

    internet_checksum(&pseudo_header)
}

/// True when `data` (checksum field included) sums to zero
pub fn validate_checksum(data: &[u8]) -> bool {
    let result = internet_checksum(data);
    result == 0 || result == 0xFFFF
}
