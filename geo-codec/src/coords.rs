//! World <-> region/cell coordinate conversions.
//!
//! A region is a 2048x2048 cell grid; the origin offsets below are fixed
//! constants of this world and not derived from anything else.

pub const REGION_CELLS: i64 = 2048;
pub const CELL_WORLD_UNITS: i64 = 16;
const WORLD_X_OFFSET: i64 = 327_680;
const WORLD_Y_OFFSET: i64 = 262_144;
const REGION_X_ORIGIN: i64 = 11;
const REGION_Y_ORIGIN: i64 = 10;

/// Floor division, since Rust's `/` truncates toward zero for negative operands.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod(a: i64, b: i64) -> i64 {
    a - floor_div(a, b) * b
}

/// Converts world coordinates to `(region_x, region_y, cell_x, cell_y)`.
pub fn world_to_region(world_x: i64, world_y: i64) -> (i64, i64, i64, i64) {
    let geo_x = floor_div(world_x + WORLD_X_OFFSET, CELL_WORLD_UNITS);
    let geo_y = floor_div(world_y + WORLD_Y_OFFSET, CELL_WORLD_UNITS);

    let region_x = floor_div(geo_x, REGION_CELLS) + REGION_X_ORIGIN;
    let region_y = floor_div(geo_y, REGION_CELLS) + REGION_Y_ORIGIN;
    let cell_x = floor_mod(geo_x, REGION_CELLS);
    let cell_y = floor_mod(geo_y, REGION_CELLS);

    (region_x, region_y, cell_x, cell_y)
}

/// Converts `(region_x, region_y, cell_x, cell_y)` back to world coordinates.
pub fn region_to_world(region_x: i64, region_y: i64, cell_x: i64, cell_y: i64) -> (i64, i64) {
    let world_x = ((region_x - REGION_X_ORIGIN) * REGION_CELLS + cell_x) * CELL_WORLD_UNITS - WORLD_X_OFFSET;
    let world_y = ((region_y - REGION_Y_ORIGIN) * REGION_CELLS + cell_y) * CELL_WORLD_UNITS - WORLD_Y_OFFSET;
    (world_x, world_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_region_round_trips_a_sample_point() {
        let (rx, ry, cx, cy) = world_to_region(83_000, 148_000);
        assert!((0..REGION_CELLS).contains(&cx));
        assert!((0..REGION_CELLS).contains(&cy));

        let (wx, wy) = region_to_world(rx, ry, cx, cy);
        assert_eq!((wx, wy), (83_000, 148_000));
    }

    #[test]
    fn region_origin_maps_to_the_fixed_world_offset() {
        assert_eq!(region_to_world(11, 10, 0, 0), (-327_680, -262_144));
        assert_eq!(world_to_region(-327_680, -262_144), (11, 10, 0, 0));
    }

    #[test]
    fn round_trips_negative_world_coordinates() {
        let (wx, wy) = (-200_000, -50_000);
        let (rx, ry, cx, cy) = world_to_region(wx, wy);
        let (wx2, wy2) = region_to_world(rx, ry, cx, cy);
        assert_eq!((wx, wy), (wx2, wy2));
    }

    #[test]
    fn round_trips_across_a_coarse_sweep() {
        for wx in (-400_000..400_000).step_by(4099) {
            for wy in (-400_000..400_000).step_by(11_321) {
                let (rx, ry, cx, cy) = world_to_region(wx, wy);
                assert!((0..REGION_CELLS).contains(&cx));
                assert!((0..REGION_CELLS).contains(&cy));
                let (wx2, wy2) = region_to_world(rx, ry, cx, cy);
                assert_eq!((wx, wy), (wx2, wy2));
            }
        }
    }
}
