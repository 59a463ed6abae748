//! Frame datagram wire codec (§3 FramePacket, §6 wire format).
//!
//! `[16-byte ASCII video_id space-padded][u16 packet_id BE][u32 frame_size BE][JPEG chunk bytes]`

use crate::protocol_constants::{FRAME_HEADER_LEN, MAX_CHUNK_PAYLOAD, VIDEO_ID_FIELD_LEN};

/// Encodes a video name into the fixed 16-byte, space-padded ASCII field.
/// Names longer than the field are truncated (the wire format has no escape
/// for overflow; callers should keep catalogue names short).
pub fn encode_video_id(name: &str) -> [u8; VIDEO_ID_FIELD_LEN] {
    let mut field = [b' '; VIDEO_ID_FIELD_LEN];
    let bytes = name.as_bytes();
    let n = bytes.len().min(VIDEO_ID_FIELD_LEN);
    field[..n].copy_from_slice(&bytes[..n]);
    field
}

/// Decodes the 16-byte video-id field, trimming trailing padding.
pub fn decode_video_id(field: &[u8]) -> String {
    let trimmed = field
        .iter()
        .rposition(|&b| b != b' ')
        .map(|last| &field[..=last])
        .unwrap_or(&[]);
    String::from_utf8_lossy(trimmed).to_string()
}

/// Number of chunks needed to carry `frame_size` bytes of JPEG payload.
pub fn chunk_count(frame_size: u32) -> u32 {
    frame_size.div_ceil(MAX_CHUNK_PAYLOAD as u32).max(1)
}

/// Builds one on-the-wire datagram for a single chunk.
pub fn encode_chunk(video_id: &str, packet_id: u16, frame_size: u32, payload: &[u8]) -> Vec<u8> {
    let mut datagram = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    datagram.extend_from_slice(&encode_video_id(video_id));
    datagram.extend_from_slice(&packet_id.to_be_bytes());
    datagram.extend_from_slice(&frame_size.to_be_bytes());
    datagram.extend_from_slice(payload);
    datagram
}

/// A decoded chunk header plus a borrowed view of its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk<'a> {
    pub video_id: String,
    pub packet_id: u16,
    pub frame_size: u32,
    pub payload: &'a [u8],
}

/// Parses a datagram's fixed header. Returns `None` if it is too short to
/// contain a full header; the caller drops it silently per §4.4.
pub fn decode_chunk(datagram: &[u8]) -> Option<DecodedChunk<'_>> {
    if datagram.len() < FRAME_HEADER_LEN {
        return None;
    }
    let video_id = decode_video_id(&datagram[..VIDEO_ID_FIELD_LEN]);
    let packet_id = u16::from_be_bytes([
        datagram[VIDEO_ID_FIELD_LEN],
        datagram[VIDEO_ID_FIELD_LEN + 1],
    ]);
    let frame_size = u32::from_be_bytes([
        datagram[VIDEO_ID_FIELD_LEN + 2],
        datagram[VIDEO_ID_FIELD_LEN + 3],
        datagram[VIDEO_ID_FIELD_LEN + 4],
        datagram[VIDEO_ID_FIELD_LEN + 5],
    ]);
    Some(DecodedChunk {
        video_id,
        packet_id,
        frame_size,
        payload: &datagram[FRAME_HEADER_LEN..],
    })
}

/// Splits one encoded JPEG frame into the chunk datagrams an origin sends
/// for it, each carrying the same `video_id` and `frame_size` and a dense,
/// zero-based, monotonic `packet_id` (§3 invariant).
pub fn split_frame(video_id: &str, jpeg_bytes: &[u8]) -> Vec<Vec<u8>> {
    let frame_size = jpeg_bytes.len() as u32;
    jpeg_bytes
        .chunks(MAX_CHUNK_PAYLOAD)
        .enumerate()
        .map(|(i, payload)| encode_chunk(video_id, i as u16, frame_size, payload))
        .collect()
}

/// Only the first 16 bytes of an inbound datagram, used by the relay
/// demultiplexer to route without decoding the whole header (§4.4).
pub fn peek_video_id(datagram: &[u8]) -> Option<String> {
    if datagram.len() < VIDEO_ID_FIELD_LEN {
        return None;
    }
    Some(decode_video_id(&datagram[..VIDEO_ID_FIELD_LEN]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_id_round_trips_with_padding() {
        let field = encode_video_id("clipA");
        assert_eq!(field.len(), VIDEO_ID_FIELD_LEN);
        assert_eq!(&field[..5], b"clipA");
        assert_eq!(&field[5..], b"           ");
        assert_eq!(decode_video_id(&field), "clipA");
    }

    #[test]
    fn video_id_longer_than_field_is_truncated() {
        let field = encode_video_id("this-name-is-definitely-too-long");
        assert_eq!(field.len(), VIDEO_ID_FIELD_LEN);
    }

    #[test]
    fn chunk_count_rounds_up() {
        assert_eq!(chunk_count(0), 1);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(MAX_CHUNK_PAYLOAD as u32), 1);
        assert_eq!(chunk_count(MAX_CHUNK_PAYLOAD as u32 + 1), 2);
    }

    #[test]
    fn split_frame_produces_dense_monotonic_packet_ids() {
        let jpeg = vec![0xAAu8; MAX_CHUNK_PAYLOAD * 2 + 10];
        let chunks = split_frame("clipA", &jpeg);
        assert_eq!(chunks.len(), 3);
        for (i, datagram) in chunks.iter().enumerate() {
            let decoded = decode_chunk(datagram).unwrap();
            assert_eq!(decoded.video_id, "clipA");
            assert_eq!(decoded.packet_id, i as u16);
            assert_eq!(decoded.frame_size, jpeg.len() as u32);
        }
    }

    #[test]
    fn decode_chunk_rejects_short_datagrams() {
        assert!(decode_chunk(&[0u8; 10]).is_none());
    }

    #[test]
    fn frame_round_trips_binary_exact() {
        let jpeg: Vec<u8> = (0u32..500).map(|i| (i % 256) as u8).collect();
        let chunks = split_frame("clipA", &jpeg);
        let mut reassembled = Vec::new();
        for datagram in &chunks {
            reassembled.extend_from_slice(decode_chunk(datagram).unwrap().payload);
        }
        assert_eq!(reassembled, jpeg);
    }
}
