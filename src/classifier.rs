// Packet classification: decoded packet -> PacketRecord.
// Pure; sub-field decode failures are dropped, never propagated.

use crate::error::QnameError;
use crate::models::{DecodedPacket, PacketRecord, Protocol};

/// Max encoded length of a DNS name (RFC 1035 2.3.4).
const MAX_QNAME_LEN: usize = 255;

/// Flag letters in rendering order, with their bit in the TCP flag field.
const TCP_FLAG_LETTERS: [(u16, char); 9] = [
    (0x001, 'F'),
    (0x002, 'S'),
    (0x004, 'R'),
    (0x008, 'P'),
    (0x010, 'A'),
    (0x020, 'U'),
    (0x040, 'E'),
    (0x080, 'C'),
    (0x100, 'N'),
];

/// Maps a decoded packet to a record for aggregation. `None` when there is no IP layer.
pub fn classify(packet: &DecodedPacket) -> Option<PacketRecord> {
    let ip = packet.ip.as_ref()?;

    let tcp_flags = packet.tcp.as_ref().map(|t| render_tcp_flags(t.flags));
    let dns_query = packet
        .dns
        .as_ref()
        .and_then(|d| d.qname.as_deref())
        .and_then(|raw| match decode_qname(raw) {
            Ok(name) if !name.is_empty() => Some(name),
            Ok(_) => None,
            Err(e) => {
                tracing::trace!(error = %e, src = %ip.src, dst = %ip.dst, "dropping undecodable DNS qname");
                None
            }
        });

    Some(PacketRecord {
        src: ip.src.clone(),
        dst: ip.dst.clone(),
        size: packet.wire_len,
        protocol: Protocol::of(packet),
        tcp_flags,
        dns_query,
        timestamp: packet.timestamp,
    })
}

/// Canonical flag string, e.g. SYN+ACK -> "SA", FIN+ACK -> "FA". No flags -> "".
pub fn render_tcp_flags(flags: u16) -> String {
    TCP_FLAG_LETTERS
        .iter()
        .filter(|(bit, _)| flags & bit != 0)
        .map(|(_, c)| *c)
        .collect()
}

/// Decodes a wire-format QNAME (length-prefixed labels ending in a zero byte) into
/// dotted form without the trailing dot. Invalid UTF-8 bytes are dropped.
pub fn decode_qname(raw: &[u8]) -> Result<String, QnameError> {
    if raw.len() > MAX_QNAME_LEN {
        return Err(QnameError::TooLong);
    }
    let mut labels: Vec<String> = Vec::new();
    let mut offset = 0;
    loop {
        let Some(&len) = raw.get(offset) else {
            return Err(QnameError::Unterminated);
        };
        if len == 0 {
            break;
        }
        // Top two bits set: message compression pointer, meaningless without the full message.
        if len & 0xC0 != 0 {
            return Err(QnameError::Compressed { offset });
        }
        let start = offset + 1;
        let end = start + len as usize;
        let label = raw.get(start..end).ok_or(QnameError::Truncated { offset })?;
        labels.push(
            String::from_utf8_lossy(label)
                .chars()
                .filter(|c| *c != char::REPLACEMENT_CHARACTER)
                .collect(),
        );
        offset = end;
    }
    let name = labels.join(".");
    Ok(name.trim_end_matches('.').to_string())
}
