//! Harvests one region's geodata over an already-established game session
//! by driving the server's `scan_geo` GM console command and collecting
//! its `GEODATA|` chat replies.

use std::time::{Duration, Instant};

use byteorder::{ByteOrder, LittleEndian};
use geo_codec::block::Block;
use geo_codec::region::{Region, REGION_BLOCKS_X, REGION_BLOCKS_Y};
use geo_protocol::game::{GameEvent, GameSession};
use thiserror::Error;

pub mod worker;

const BLOCK_ROWS: usize = 256;
const BLOCK_COLS: usize = 256;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);
const PAYLOAD_LEN: usize = 768; // 256 records * 3 bytes
const PROGRESS_EVERY_ROWS: usize = 16;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    Protocol(#[from] geo_protocol::ProtocolError),

    #[error("timed out waiting for GEODATA response to row {0}")]
    RowTimeout(usize),

    #[error("malformed GEODATA message: {0:?}")]
    MalformedMessage(String),

    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("GEODATA payload was {0} bytes, expected {PAYLOAD_LEN}")]
    WrongPayloadSize(usize),

    #[error(transparent)]
    Format(#[from] geo_codec::FormatError),
}

pub struct ScanProgress {
    pub cells_scanned: usize,
    pub total_cells: usize,
}

/// One scanned block-row: `heights[bx]` and `nswe[bx]` for `bx in 0..256`.
struct RowData {
    heights: [i16; BLOCK_COLS],
    nswe: [u8; BLOCK_COLS],
}

/// Scans region `(rx, ry)` by iterating `block_y` from 0 to 255, sending
/// `scan_geo <rx> <ry> <block_y>` and waiting for the matching GEODATA
/// reply, then materializes a Region of Flat blocks from the collected
/// heights.
pub fn harvest_region(
    session: &mut GameSession,
    rx: i64,
    ry: i64,
    mut on_progress: impl FnMut(ScanProgress),
) -> Result<Region, HarvestError> {
    drain_stale_geodata(session)?;

    let mut rows: Vec<RowData> = Vec::with_capacity(BLOCK_ROWS);

    for block_y in 0..BLOCK_ROWS {
        session.send_admin_command(&format!("scan_geo {rx} {ry} {block_y}"))?;
        let row = await_row(session, rx, ry, block_y)?;
        rows.push(row);

        if (block_y + 1) % PROGRESS_EVERY_ROWS == 0 || block_y + 1 == BLOCK_ROWS {
            on_progress(ScanProgress {
                cells_scanned: (block_y + 1) * BLOCK_COLS,
                total_cells: BLOCK_ROWS * BLOCK_COLS,
            });
        }
    }

    materialize_region(rx, ry, &rows)
}

fn drain_stale_geodata(session: &mut GameSession) -> Result<(), HarvestError> {
    loop {
        match session.poll_event()? {
            Some(GameEvent::GeodataResponse(_)) => continue,
            Some(_) => continue,
            None => return Ok(()),
        }
    }
}

fn await_row(
    session: &mut GameSession,
    rx: i64,
    ry: i64,
    block_y: usize,
) -> Result<RowData, HarvestError> {
    let deadline = Instant::now() + RESPONSE_TIMEOUT;
    loop {
        if Instant::now() >= deadline {
            return Err(HarvestError::RowTimeout(block_y));
        }
        match session.poll_event()? {
            Some(GameEvent::GeodataResponse(text)) => {
                return parse_geodata_message(&text, rx, ry, block_y);
            }
            _ => continue,
        }
    }
}

fn parse_geodata_message(text: &str, rx: i64, ry: i64, block_y: usize) -> Result<RowData, HarvestError> {
    let mut parts = text.splitn(5, '|');
    let tag = parts.next().ok_or_else(|| HarvestError::MalformedMessage(text.to_string()))?;
    if tag != "GEODATA" {
        return Err(HarvestError::MalformedMessage(text.to_string()));
    }
    let msg_rx: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HarvestError::MalformedMessage(text.to_string()))?;
    let msg_ry: i64 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HarvestError::MalformedMessage(text.to_string()))?;
    let msg_by: usize = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| HarvestError::MalformedMessage(text.to_string()))?;
    let payload_b64 = parts.next().ok_or_else(|| HarvestError::MalformedMessage(text.to_string()))?;

    if msg_rx != rx || msg_ry != ry || msg_by != block_y {
        return Err(HarvestError::MalformedMessage(text.to_string()));
    }

    use base64::Engine;
    let payload = base64::engine::general_purpose::STANDARD.decode(payload_b64)?;
    if payload.len() != PAYLOAD_LEN {
        return Err(HarvestError::WrongPayloadSize(payload.len()));
    }

    let mut heights = [0i16; BLOCK_COLS];
    let mut nswe = [0u8; BLOCK_COLS];
    for block_x in 0..BLOCK_COLS {
        let offset = block_x * 3;
        heights[block_x] = LittleEndian::read_i16(&payload[offset..offset + 2]);
        nswe[block_x] = payload[offset + 2];
    }

    Ok(RowData { heights, nswe })
}

fn materialize_region(rx: i64, ry: i64, rows: &[RowData]) -> Result<Region, HarvestError> {
    let mut blocks = Vec::with_capacity(REGION_BLOCKS_X * REGION_BLOCKS_Y);
    for bx in 0..REGION_BLOCKS_X {
        for by in 0..REGION_BLOCKS_Y {
            let row = &rows[by];
            blocks.push(Block::Flat {
                height: row.heights[bx],
            });
        }
    }
    Ok(Region::new(rx, ry, blocks)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_geodata_message() {
        use base64::Engine;
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        for bx in 0..BLOCK_COLS {
            let height = -3000i16 + 8 * bx as i16;
            payload.extend_from_slice(&height.to_le_bytes());
            payload.push(0xFF);
        }
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
        let text = format!("GEODATA|22|16|0|{encoded}");

        let row = parse_geodata_message(&text, 22, 16, 0).unwrap();
        for bx in 0..BLOCK_COLS {
            assert_eq!(row.heights[bx], -3000 + 8 * bx as i16);
            assert_eq!(row.nswe[bx], 0xFF);
        }
    }

    #[test]
    fn rejects_wrong_payload_size() {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(b"too short");
        let text = format!("GEODATA|22|16|0|{encoded}");
        let err = parse_geodata_message(&text, 22, 16, 0).unwrap_err();
        assert!(matches!(err, HarvestError::WrongPayloadSize(_)));
    }

    #[test]
    fn rejects_mismatched_coordinates() {
        use base64::Engine;
        let payload = vec![0u8; PAYLOAD_LEN];
        let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);
        let text = format!("GEODATA|22|16|5|{encoded}");
        let err = parse_geodata_message(&text, 22, 16, 0).unwrap_err();
        assert!(matches!(err, HarvestError::MalformedMessage(_)));
    }

    #[test]
    fn materializes_all_flat_blocks_from_scanned_rows() {
        let rows: Vec<RowData> = (0..BLOCK_ROWS)
            .map(|by| RowData {
                heights: [by as i16; BLOCK_COLS],
                nswe: [0xFF; BLOCK_COLS],
            })
            .collect();

        let region = materialize_region(5, 5, &rows).unwrap();
        assert_eq!(region.blocks().len(), REGION_BLOCKS_X * REGION_BLOCKS_Y);
        assert_eq!(region.get_block(3, 7), &Block::Flat { height: 7 });
    }
}
