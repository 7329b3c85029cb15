//! A full 2048x2048-cell region: 65,536 blocks in `bx * 256 + by` order.

use std::io::{Cursor, Read};
use std::path::Path;

use crate::block::{Block, BLOCK_CELLS_X, BLOCK_CELLS_Y};
use crate::cell::Cell;
use crate::FormatError;

pub const REGION_BLOCKS_X: usize = 256;
pub const REGION_BLOCKS_Y: usize = 256;
pub const REGION_BLOCKS: usize = REGION_BLOCKS_X * REGION_BLOCKS_Y;
pub const REGION_CELLS_X: usize = REGION_BLOCKS_X * BLOCK_CELLS_X;
pub const REGION_CELLS_Y: usize = REGION_BLOCKS_Y * BLOCK_CELLS_Y;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub region_x: i64,
    pub region_y: i64,
    blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct RegionStats {
    pub flat_blocks: usize,
    pub complex_blocks: usize,
    pub multilayer_blocks: usize,
    pub total_blocks: usize,
    pub height_min: i16,
    pub height_max: i16,
    pub fully_blocked_cells: usize,
    pub partial_blocked_cells: usize,
    pub max_layer_depth: usize,
}

impl Region {
    /// Builds a region from exactly [`REGION_BLOCKS`] blocks in storage order.
    pub fn new(region_x: i64, region_y: i64, blocks: Vec<Block>) -> Result<Self, FormatError> {
        if blocks.len() != REGION_BLOCKS {
            return Err(FormatError::WrongBlockCount(blocks.len()));
        }
        Ok(Self {
            region_x,
            region_y,
            blocks,
        })
    }

    /// Parses `(rx, ry)` out of a `"<rx>_<ry>"` region name; malformed or
    /// missing components default to `(0, 0)`.
    pub fn parse_region_name(name: &str) -> (i64, i64) {
        let mut parts = name.splitn(2, '_');
        let rx = parts.next().and_then(|s| s.parse().ok());
        let ry = parts.next().and_then(|s| s.parse().ok());
        (rx.unwrap_or(0), ry.unwrap_or(0))
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}.l2d", self.region_x, self.region_y)
    }

    /// Parses a whole region from its file bytes and the region's stem
    /// (the file name without the `.l2d` extension, e.g. `"22_16"`).
    pub fn parse(data: &[u8], region_name: &str) -> Result<Self, FormatError> {
        let (region_x, region_y) = Self::parse_region_name(region_name);

        let mut cursor = Cursor::new(data);
        let mut blocks = Vec::with_capacity(REGION_BLOCKS);
        for _ in 0..REGION_BLOCKS {
            blocks.push(Block::read(&mut cursor)?);
        }

        let mut trailing = [0u8; 1];
        if cursor.read(&mut trailing)? != 0 {
            return Err(FormatError::TrailingData);
        }

        Self::new(region_x, region_y, blocks)
    }

    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(REGION_BLOCKS * 3);
        for block in &self.blocks {
            block.write(&mut out).expect("writing to a Vec never fails");
        }
        out
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get_block(&self, bx: usize, by: usize) -> &Block {
        &self.blocks[bx * REGION_BLOCKS_Y + by]
    }

    pub fn get_block_mut(&mut self, bx: usize, by: usize) -> &mut Block {
        &mut self.blocks[bx * REGION_BLOCKS_Y + by]
    }

    fn split_cell(cx: usize, cy: usize) -> (usize, usize, usize, usize) {
        (
            cx / BLOCK_CELLS_X,
            cy / BLOCK_CELLS_Y,
            cx % BLOCK_CELLS_X,
            cy % BLOCK_CELLS_Y,
        )
    }

    pub fn get_cell(&self, cx: usize, cy: usize, layer: usize) -> Cell {
        let (bx, by, lx, ly) = Self::split_cell(cx, cy);
        self.get_block(bx, by).get_cell(lx, ly, layer)
    }

    pub fn get_layers(&self, cx: usize, cy: usize) -> Vec<Cell> {
        let (bx, by, lx, ly) = Self::split_cell(cx, cy);
        self.get_block(bx, by).get_layers(lx, ly)
    }

    /// Sets a single layer's cell. Returns `false` without mutating when the
    /// containing block is Flat (see [`Block::set_cell`]).
    pub fn set_cell(&mut self, cx: usize, cy: usize, layer: usize, cell: Cell) -> bool {
        let (bx, by, lx, ly) = Self::split_cell(cx, cy);
        self.get_block_mut(bx, by).set_cell(lx, ly, layer, cell)
    }

    pub fn in_bounds(cx: i64, cy: i64) -> bool {
        (0..REGION_CELLS_X as i64).contains(&cx) && (0..REGION_CELLS_Y as i64).contains(&cy)
    }

    pub fn stats(&self) -> RegionStats {
        let mut stats = RegionStats {
            height_min: i16::MAX,
            height_max: i16::MIN,
            total_blocks: self.blocks.len(),
            ..Default::default()
        };

        for block in &self.blocks {
            match block {
                Block::Flat { .. } => stats.flat_blocks += 1,
                Block::Complex { .. } => stats.complex_blocks += 1,
                Block::Multilayer { .. } => stats.multilayer_blocks += 1,
            }
            stats.max_layer_depth = stats.max_layer_depth.max(block.max_layer_depth());
        }

        for bx in 0..REGION_BLOCKS_X {
            for by in 0..REGION_BLOCKS_Y {
                let block = self.get_block(bx, by);
                for lx in 0..BLOCK_CELLS_X {
                    for ly in 0..BLOCK_CELLS_Y {
                        let cell = block.get_cell(lx, ly, 0);
                        stats.height_min = stats.height_min.min(cell.height);
                        stats.height_max = stats.height_max.max(cell.height);
                        if cell.is_blocked() {
                            stats.fully_blocked_cells += 1;
                        } else if !cell.is_fully_walkable() {
                            stats.partial_blocked_cells += 1;
                        }
                    }
                }
            }
        }

        stats
    }

    pub fn read_from_file(path: &Path) -> Result<Self, FormatError> {
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Self::parse(&data, name)
    }

    /// Writes the region atomically: write to a sibling temp file, then
    /// rename into place, so readers never observe a partial file.
    pub fn write_to_file(&self, path: &Path) -> Result<(), FormatError> {
        let data = self.write();
        let tmp_path = path.with_extension("l2d.tmp");
        std::fs::write(&tmp_path, &data)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flat_region(height: i16) -> Region {
        let blocks = vec![Block::Flat { height }; REGION_BLOCKS];
        Region::new(0, 0, blocks).unwrap()
    }

    #[test]
    fn region_name_parses_signed_components() {
        assert_eq!(Region::parse_region_name("22_16"), (22, 16));
        assert_eq!(Region::parse_region_name("garbage"), (0, 0));
        assert_eq!(Region::parse_region_name(""), (0, 0));
    }

    #[test]
    fn all_flat_region_writes_exact_size() {
        let region = all_flat_region(0);
        assert_eq!(region.write().len(), REGION_BLOCKS * 3);
    }

    #[test]
    fn all_complex_region_writes_exact_size() {
        let cells = [Cell::new(0, 0xFF); crate::block::BLOCK_CELLS];
        let blocks = vec![
            Block::Complex {
                cells: Box::new(cells)
            };
            REGION_BLOCKS
        ];
        let region = Region::new(0, 0, blocks).unwrap();
        assert_eq!(region.write().len(), REGION_BLOCKS * (1 + 192));
    }

    #[test]
    fn parse_write_parse_round_trips_a_mixed_region() {
        let mut blocks = vec![Block::Flat { height: 0 }; REGION_BLOCKS];
        blocks[0] = Block::Flat { height: -3450 };

        let mut cells = [Cell::new(0, 0x0F); crate::block::BLOCK_CELLS];
        for (i, cell) in cells.iter_mut().enumerate() {
            if i % 2 == 0 {
                *cell = Cell::new(0, 0xFF);
            }
        }
        blocks[1] = Block::Complex {
            cells: Box::new(cells),
        };

        let mut cell_layers = vec![vec![Cell::new(0, 0xFF)]; crate::block::BLOCK_CELLS];
        cell_layers[0] = vec![Cell::new(0, 0xFF), Cell::new(256, 0xFF)];
        blocks[2] = Block::Multilayer { cell_layers };

        let region = Region::new(22, 16, blocks).unwrap();
        let bytes = region.write();
        let parsed = Region::parse(&bytes, "22_16").unwrap();
        assert_eq!(parsed, region);

        let rewritten = parsed.write();
        assert_eq!(rewritten, bytes);
    }

    #[test]
    fn rejects_wrong_block_count() {
        let err = Region::new(0, 0, vec![Block::Flat { height: 0 }; 10]).unwrap_err();
        assert!(matches!(err, FormatError::WrongBlockCount(10)));
    }

    #[test]
    fn rejects_truncated_file() {
        let region = all_flat_region(0);
        let mut bytes = region.write();
        bytes.truncate(bytes.len() - 1);
        let err = Region::parse(&bytes, "0_0").unwrap_err();
        assert!(matches!(err, FormatError::Io(_)));
    }

    #[test]
    fn rejects_trailing_data() {
        let region = all_flat_region(0);
        let mut bytes = region.write();
        bytes.push(0xAB);
        let err = Region::parse(&bytes, "0_0").unwrap_err();
        assert!(matches!(err, FormatError::TrailingData));
    }
}
