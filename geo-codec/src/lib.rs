//! Binary codec for L2D geodata region files, plus world <-> region/cell
//! coordinate conversions and region-wide statistics.

pub mod block;
pub mod cell;
pub mod coords;
pub mod region;

pub use block::Block;
pub use cell::Cell;
pub use region::{Region, RegionStats};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("unknown block type 0x{0:02X}")]
    UnknownBlockType(u8),

    #[error("region has {0} blocks, expected {expected}", expected = region::REGION_BLOCKS)]
    WrongBlockCount(usize),

    #[error("multilayer cell has an empty layer stack")]
    EmptyLayerStack,

    #[error("region file has trailing data past the expected block count")]
    TrailingData,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
