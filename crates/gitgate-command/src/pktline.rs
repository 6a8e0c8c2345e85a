//! Minimal git pkt-line reading.
//!
//! Only what the custom action needs to know where a client request ends:
//! a flush packet for pushes, a `done` packet for fetches.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// The flush packet.
pub const FLUSH: &[u8] = b"0000";
/// The packet ending a fetch negotiation.
pub const DONE: &[u8] = b"0009done\n";

const PREFIX_LEN: usize = 4;
const OID_HEX_LEN: usize = 40;
const ZERO_OID: &[u8] = b"0000000000000000000000000000000000000000";

/// Read one packet, prefix included. `None` at end of input.
///
/// Special packets (`0000`, `0001`, `0002`) carry no payload.
///
/// # Errors
///
/// Returns an I/O error for a malformed length prefix or a short packet.
pub async fn read_packet<R>(input: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut prefix = [0u8; PREFIX_LEN];
    match input.read_exact(&mut prefix).await {
        Ok(_) => {},
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = std::str::from_utf8(&prefix)
        .ok()
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "invalid pkt-line length"))?;

    let mut packet = prefix.to_vec();
    let payload_len = len.saturating_sub(PREFIX_LEN);
    if payload_len > 0 {
        let mut payload = vec![0u8; payload_len];
        input.read_exact(&mut payload).await?;
        packet.extend_from_slice(&payload);
    }
    Ok(Some(packet))
}

/// Whether a ref-update packet deletes a ref (new object id all zeros).
#[must_use]
pub fn is_ref_removal(packet: &[u8]) -> bool {
    let Some(update) = packet.get(PREFIX_LEN..) else {
        return false;
    };
    let Some((old, rest)) = update.split_at_checked(OID_HEX_LEN) else {
        return false;
    };
    old.iter().all(u8::is_ascii_hexdigit)
        && rest.first() == Some(&b' ')
        && rest.get(1..=OID_HEX_LEN) == Some(ZERO_OID)
        && rest.get(OID_HEX_LEN.saturating_add(1)) == Some(&b' ')
}

/// Read a push request: ref updates up to the flush packet, then the pack
/// data if any update is not a ref removal.
///
/// # Errors
///
/// Propagates read failures and malformed packets.
pub async fn read_push<R>(input: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut request = Vec::new();
    let mut needs_pack = false;
    while let Some(packet) = read_packet(input).await? {
        request.extend_from_slice(&packet);
        if packet == FLUSH {
            break;
        }
        if !is_ref_removal(&packet) {
            needs_pack = true;
        }
    }
    if needs_pack {
        input.read_to_end(&mut request).await?;
    }
    Ok(request)
}

/// Read a fetch negotiation up to and including the `done` packet.
///
/// # Errors
///
/// Propagates read failures and malformed packets.
pub async fn read_until_done<R>(input: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut request = Vec::new();
    while let Some(packet) = read_packet(input).await? {
        request.extend_from_slice(&packet);
        if packet == DONE {
            break;
        }
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(payload: &str) -> Vec<u8> {
        format!("{:04x}{payload}", payload.len() + 4).into_bytes()
    }

    const OLD: &str = "1111111111111111111111111111111111111111";
    const NEW: &str = "2222222222222222222222222222222222222222";
    const ZERO: &str = "0000000000000000000000000000000000000000";

    #[tokio::test]
    async fn test_read_packet() {
        let mut input: &[u8] = b"0008abcd0000";
        assert_eq!(read_packet(&mut input).await.unwrap().unwrap(), b"0008abcd");
        assert_eq!(read_packet(&mut input).await.unwrap().unwrap(), FLUSH);
        assert!(read_packet(&mut input).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_length_is_an_error() {
        let mut input: &[u8] = b"zzzz";
        let err = read_packet(&mut input).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_ref_removal() {
        assert!(is_ref_removal(&pkt(&format!("{OLD} {ZERO} refs/heads/main\n"))));
        assert!(!is_ref_removal(&pkt(&format!("{OLD} {NEW} refs/heads/main\n"))));
        assert!(!is_ref_removal(FLUSH));
    }

    #[tokio::test]
    async fn test_push_with_update_reads_pack() {
        let mut raw = pkt(&format!("{OLD} {NEW} refs/heads/main\n"));
        raw.extend_from_slice(FLUSH);
        raw.extend_from_slice(b"PACKDATA");

        let mut input: &[u8] = &raw;
        assert_eq!(read_push(&mut input).await.unwrap(), raw);
    }

    #[tokio::test]
    async fn test_push_with_only_removals_stops_at_flush() {
        let mut raw = pkt(&format!("{OLD} {ZERO} refs/heads/gone\n"));
        raw.extend_from_slice(FLUSH);
        let expected = raw.clone();
        raw.extend_from_slice(b"trailing");

        let mut input: &[u8] = &raw;
        assert_eq!(read_push(&mut input).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_fetch_stops_at_done() {
        let mut raw = pkt(&format!("want {NEW}\n"));
        raw.extend_from_slice(FLUSH);
        raw.extend_from_slice(DONE);
        let expected = raw.clone();
        raw.extend_from_slice(b"0000");

        let mut input: &[u8] = &raw;
        assert_eq!(read_until_done(&mut input).await.unwrap(), expected);
    }
}
