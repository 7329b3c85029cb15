//! Inspection and editing operations over an in-memory [`Region`], the
//! layer the HTTP editor surface calls into.

pub mod render;

use geo_codec::block::Block;
use geo_codec::cell::Cell;
use geo_codec::region::{Region, RegionStats, REGION_CELLS_X, REGION_CELLS_Y};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditError {
    #[error("cell ({0}, {1}) is outside the 2048x2048 region bounds")]
    OutOfBounds(i64, i64),

    #[error("cannot edit a single cell inside a Flat block; use set_flat_height on the containing block instead")]
    FlatBlockCellImmutable,

    #[error("radius {0} must be within [0, 2048)")]
    RadiusOutOfRange(i64),
}

#[derive(Debug, Clone, Serialize)]
pub struct CellInspection {
    pub height: i16,
    pub nswe: u8,
    pub hex_nswe: String,
    pub direction_string: String,
    pub walkable: bool,
    pub blocked: bool,
    pub block_variant: &'static str,
}

fn check_bounds(cx: i64, cy: i64) -> Result<(), EditError> {
    if !Region::in_bounds(cx, cy) {
        return Err(EditError::OutOfBounds(cx, cy));
    }
    Ok(())
}

/// Returns the cell's height/NSWE plus the variant name of the block it
/// lives in, so the UI can explain why a write might be rejected.
pub fn inspect_cell(region: &Region, cx: i64, cy: i64) -> Result<CellInspection, EditError> {
    check_bounds(cx, cy)?;
    let (bx, by) = (cx as usize / 8, cy as usize / 8);
    let block = region.get_block(bx, by);
    let cell = region.get_cell(cx as usize, cy as usize, 0);

    Ok(CellInspection {
        height: cell.height,
        nswe: cell.nswe,
        hex_nswe: format!("0x{:02X}", cell.nswe),
        direction_string: cell.direction_string(),
        walkable: cell.is_fully_walkable(),
        blocked: cell.is_blocked(),
        block_variant: block.variant_name(),
    })
}

/// Writes `height`/`nswe` to a single cell. Dispatches on the containing
/// block's variant: Complex and Multilayer accept the write directly;
/// Flat rejects per-cell edits since it has no per-cell storage.
pub fn edit_cell(
    region: &mut Region,
    cx: i64,
    cy: i64,
    layer: usize,
    height: i16,
    nswe: u8,
) -> Result<(), EditError> {
    check_bounds(cx, cy)?;
    let cell = Cell::new(height, nswe);
    if !region.set_cell(cx as usize, cy as usize, layer, cell) {
        return Err(EditError::FlatBlockCellImmutable);
    }
    Ok(())
}

/// Clamps `radius` to `[0, 2048)`, then for every Complex/Multilayer cell
/// within that Chebyshev radius of `(center_x, center_y)` whose cardinal
/// nibble isn't already fully open, sets it to `0xFF`. Flat blocks are
/// skipped since their single height has no NSWE to unblock. Returns the
/// number of cells actually modified.
pub fn unblock_area(
    region: &mut Region,
    center_x: i64,
    center_y: i64,
    radius: i64,
) -> Result<usize, EditError> {
    if !(0..2048).contains(&radius) {
        return Err(EditError::RadiusOutOfRange(radius));
    }
    check_bounds(center_x, center_y)?;

    let min_x = (center_x - radius).max(0);
    let max_x = (center_x + radius).min(REGION_CELLS_X as i64 - 1);
    let min_y = (center_y - radius).max(0);
    let max_y = (center_y + radius).min(REGION_CELLS_Y as i64 - 1);

    let mut modified = 0;
    for cx in min_x..=max_x {
        for cy in min_y..=max_y {
            let (bx, by) = (cx as usize / 8, cy as usize / 8);
            if matches!(region.get_block(bx, by), Block::Flat { .. }) {
                continue;
            }
            let cell = region.get_cell(cx as usize, cy as usize, 0);
            if cell.nswe & geo_codec::cell::NSWE_CARDINAL != geo_codec::cell::NSWE_CARDINAL {
                let unblocked = Cell::new(cell.height, 0xFF);
                if region.set_cell(cx as usize, cy as usize, 0, unblocked) {
                    modified += 1;
                }
            }
        }
    }

    Ok(modified)
}

/// Sets a single cell's cardinal nibble fully open without touching height
/// or diagonal bits.
pub fn make_walkable(region: &mut Region, cx: i64, cy: i64, layer: usize) -> Result<(), EditError> {
    check_bounds(cx, cy)?;
    let cell = region.get_cell(cx as usize, cy as usize, layer);
    let walkable = Cell::new(cell.height, cell.nswe | geo_codec::cell::NSWE_CARDINAL);
    if !region.set_cell(cx as usize, cy as usize, layer, walkable) {
        return Err(EditError::FlatBlockCellImmutable);
    }
    Ok(())
}

pub fn region_stats(region: &Region) -> RegionStats {
    region.stats()
}

/// Applies diagonal derivation to a single cell as an explicit, opt-in
/// edit. Never call this implicitly from a save path.
pub fn derive_diagonals(region: &mut Region, cx: i64, cy: i64, layer: usize) -> Result<(), EditError> {
    check_bounds(cx, cy)?;
    let cell = region.get_cell(cx as usize, cy as usize, layer);
    let derived = cell.with_derived_diagonals();
    if !region.set_cell(cx as usize, cy as usize, layer, derived) {
        return Err(EditError::FlatBlockCellImmutable);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_codec::block::BLOCK_CELLS;

    fn mixed_region() -> Region {
        let mut blocks = vec![Block::Flat { height: 0 }; geo_codec::region::REGION_BLOCKS];
        let cells = [Cell::new(0, 0x0F); BLOCK_CELLS];
        blocks[0] = Block::Complex {
            cells: Box::new(cells),
        };
        Region::new(22, 16, blocks).unwrap()
    }

    #[test]
    fn inspect_reports_block_variant_and_direction_string() {
        let region = mixed_region();
        let info = inspect_cell(&region, 0, 0).unwrap();
        assert_eq!(info.block_variant, "Complex");
        assert_eq!(info.hex_nswe, "0x0F");
        assert!(info.walkable);
    }

    #[test]
    fn edit_cell_rejected_on_flat_block() {
        let mut region = mixed_region();
        let err = edit_cell(&mut region, 100, 100, 0, 0, 0xFF).unwrap_err();
        assert!(matches!(err, EditError::FlatBlockCellImmutable));
    }

    #[test]
    fn edit_cell_succeeds_on_complex_block() {
        let mut region = mixed_region();
        edit_cell(&mut region, 0, 0, 0, 500, 0x00).unwrap();
        let info = inspect_cell(&region, 0, 0).unwrap();
        assert_eq!(info.height, 500);
        assert!(info.blocked);
    }

    #[test]
    fn unblock_area_skips_flat_blocks_and_counts_complex_edits() {
        let mut region = mixed_region();
        let cells = [Cell::new(0, 0x00); BLOCK_CELLS];
        *region.get_block_mut(0, 0) = Block::Complex {
            cells: Box::new(cells),
        };

        // Radius 10 around (4, 4) sweeps well past block (0, 0)'s 8x8 cells
        // into the surrounding Flat blocks. Only the 64 Complex cells get
        // counted, confirming the Flat fringe was skipped rather than
        // (wrongly) reported as already-open.
        let modified = unblock_area(&mut region, 4, 4, 10).unwrap();
        assert_eq!(modified, 64);
        let info = inspect_cell(&region, 0, 0).unwrap();
        assert!(info.walkable);
    }

    #[test]
    fn unblock_area_rejects_out_of_range_radius() {
        let mut region = mixed_region();
        let err = unblock_area(&mut region, 0, 0, 2048).unwrap_err();
        assert!(matches!(err, EditError::RadiusOutOfRange(2048)));
    }

    #[test]
    fn make_walkable_opens_cardinal_nibble_only() {
        let mut region = mixed_region();
        let cells = [Cell::new(0, FLAG_NORTHEAST_FOR_TEST); BLOCK_CELLS];
        *region.get_block_mut(0, 0) = Block::Complex {
            cells: Box::new(cells),
        };
        make_walkable(&mut region, 0, 0, 0).unwrap();
        let cell = region.get_cell(0, 0, 0);
        assert!(cell.is_fully_walkable());
        assert_eq!(cell.nswe & FLAG_NORTHEAST_FOR_TEST, FLAG_NORTHEAST_FOR_TEST);
    }

    const FLAG_NORTHEAST_FOR_TEST: u8 = 1 << 6;

    #[test]
    fn derive_diagonals_is_explicit_and_does_not_run_on_edit_cell() {
        let mut region = mixed_region();
        edit_cell(&mut region, 0, 0, 0, 0, geo_codec::cell::FLAG_NORTH | geo_codec::cell::FLAG_EAST).unwrap();
        let before = region.get_cell(0, 0, 0);
        assert_eq!(before.nswe & FLAG_NORTHEAST_FOR_TEST, 0);

        derive_diagonals(&mut region, 0, 0, 0).unwrap();
        let after = region.get_cell(0, 0, 0);
        assert_eq!(after.nswe & FLAG_NORTHEAST_FOR_TEST, FLAG_NORTHEAST_FOR_TEST);
    }
}
