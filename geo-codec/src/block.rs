//! Block variants: the three on-disk encodings of an 8x8 cell group.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::cell::{Cell, NSWE_ALL};
use crate::FormatError;

pub const BLOCK_CELLS_X: usize = 8;
pub const BLOCK_CELLS_Y: usize = 8;
pub const BLOCK_CELLS: usize = BLOCK_CELLS_X * BLOCK_CELLS_Y;

pub const TYPE_FLAT: u8 = 0xD0;
pub const TYPE_COMPLEX: u8 = 0xD1;
pub const TYPE_MULTILAYER: u8 = 0xD2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Flat { height: i16 },
    Complex { cells: Box<[Cell; BLOCK_CELLS]> },
    /// One layer stack per cell, each with at least one layer; layer 0 is
    /// the canonical surface.
    Multilayer { cell_layers: Vec<Vec<Cell>> },
}

impl Block {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Block::Flat { .. } => "Flat",
            Block::Complex { .. } => "Complex",
            Block::Multilayer { .. } => "Multilayer",
        }
    }

    /// `(local_x, local_y)` are cell offsets within the block, `0..8` each.
    pub fn get_cell(&self, local_x: usize, local_y: usize, layer: usize) -> Cell {
        match self {
            Block::Flat { height } => Cell::new(*height, NSWE_ALL),
            Block::Complex { cells } => cells[local_x * BLOCK_CELLS_Y + local_y],
            Block::Multilayer { cell_layers } => {
                let layers = &cell_layers[local_x * BLOCK_CELLS_Y + local_y];
                layers.get(layer).copied().unwrap_or(layers[0])
            }
        }
    }

    pub fn get_layers(&self, local_x: usize, local_y: usize) -> Vec<Cell> {
        match self {
            Block::Flat { height } => vec![Cell::new(*height, NSWE_ALL)],
            Block::Complex { cells } => vec![cells[local_x * BLOCK_CELLS_Y + local_y]],
            Block::Multilayer { cell_layers } => {
                cell_layers[local_x * BLOCK_CELLS_Y + local_y].clone()
            }
        }
    }

    /// Sets a single layer's cell. Returns `false` for a Flat block, which
    /// can only be reshaped wholesale via [`Block::set_flat_height`].
    pub fn set_cell(&mut self, local_x: usize, local_y: usize, layer: usize, cell: Cell) -> bool {
        match self {
            Block::Flat { .. } => false,
            Block::Complex { cells } => {
                cells[local_x * BLOCK_CELLS_Y + local_y] = cell;
                true
            }
            Block::Multilayer { cell_layers } => {
                let layers = &mut cell_layers[local_x * BLOCK_CELLS_Y + local_y];
                if layer < layers.len() {
                    layers[layer] = cell;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Reshapes a whole Flat block's shared height. No-op on other variants.
    pub fn set_flat_height(&mut self, height: i16) {
        if let Block::Flat { height: h } = self {
            *h = height;
        }
    }

    pub fn max_layer_depth(&self) -> usize {
        match self {
            Block::Flat { .. } | Block::Complex { .. } => 1,
            Block::Multilayer { cell_layers } => {
                cell_layers.iter().map(Vec::len).max().unwrap_or(0)
            }
        }
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Block, FormatError> {
        let block_type = r.read_u8()?;
        match block_type {
            TYPE_FLAT => {
                let height = r.read_i16::<LittleEndian>()?;
                Ok(Block::Flat { height })
            }
            TYPE_COMPLEX => {
                let mut cells = [Cell::new(0, 0); BLOCK_CELLS];
                for cell in cells.iter_mut() {
                    let nswe = r.read_u8()?;
                    let height = r.read_i16::<LittleEndian>()?;
                    *cell = Cell::new(height, nswe);
                }
                Ok(Block::Complex {
                    cells: Box::new(cells),
                })
            }
            TYPE_MULTILAYER => {
                let mut cell_layers = Vec::with_capacity(BLOCK_CELLS);
                for _ in 0..BLOCK_CELLS {
                    let layer_count = r.read_u8()? as usize;
                    let mut layers = Vec::with_capacity(layer_count);
                    for _ in 0..layer_count {
                        let nswe = r.read_u8()?;
                        let height = r.read_i16::<LittleEndian>()?;
                        layers.push(Cell::new(height, nswe));
                    }
                    if layers.is_empty() {
                        return Err(FormatError::EmptyLayerStack);
                    }
                    cell_layers.push(layers);
                }
                Ok(Block::Multilayer { cell_layers })
            }
            other => Err(FormatError::UnknownBlockType(other)),
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Block::Flat { height } => {
                w.write_u8(TYPE_FLAT)?;
                w.write_i16::<LittleEndian>(*height)?;
            }
            Block::Complex { cells } => {
                w.write_u8(TYPE_COMPLEX)?;
                for cell in cells.iter() {
                    w.write_u8(cell.nswe)?;
                    w.write_i16::<LittleEndian>(cell.height)?;
                }
            }
            Block::Multilayer { cell_layers } => {
                w.write_u8(TYPE_MULTILAYER)?;
                for layers in cell_layers {
                    w.write_u8(layers.len() as u8)?;
                    for cell in layers {
                        w.write_u8(cell.nswe)?;
                        w.write_i16::<LittleEndian>(cell.height)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Encoded size in bytes, matching [`Block::write`] exactly.
    pub fn encoded_len(&self) -> usize {
        match self {
            Block::Flat { .. } => 3,
            Block::Complex { .. } => 1 + BLOCK_CELLS * 3,
            Block::Multilayer { cell_layers } => {
                1 + cell_layers.iter().map(|l| 1 + l.len() * 3).sum::<usize>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_block_round_trips() {
        let block = Block::Flat { height: -3450 };
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 3);
        assert_eq!(block.encoded_len(), buf.len());

        let parsed = Block::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn complex_block_round_trips() {
        let mut cells = [Cell::new(0, 0xFF); BLOCK_CELLS];
        for (i, cell) in cells.iter_mut().enumerate() {
            *cell = Cell::new(i as i16, if i % 2 == 0 { 0xFF } else { 0x0F });
        }
        let block = Block::Complex {
            cells: Box::new(cells),
        };
        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        assert_eq!(buf.len(), 1 + BLOCK_CELLS * 3);

        let parsed = Block::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn multilayer_block_round_trips_and_falls_back_on_missing_layer() {
        let mut cell_layers = vec![vec![Cell::new(0, 0xFF)]; BLOCK_CELLS];
        cell_layers[0] = vec![Cell::new(0, 0xFF), Cell::new(256, 0xFF)];
        let block = Block::Multilayer { cell_layers };

        let mut buf = Vec::new();
        block.write(&mut buf).unwrap();
        let parsed = Block::read(&mut &buf[..]).unwrap();
        assert_eq!(parsed, block);

        assert_eq!(parsed.get_cell(0, 0, 99), Cell::new(0, 0xFF));
        assert_eq!(parsed.max_layer_depth(), 2);
    }

    #[test]
    fn rejects_unknown_block_type() {
        let err = Block::read(&mut &[0xFFu8][..]).unwrap_err();
        assert!(matches!(err, FormatError::UnknownBlockType(0xFF)));
    }
}
