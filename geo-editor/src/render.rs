//! PNG projections of a region: height map, NSWE flags, block type map,
//! a height/NSWE combined overlay, and a zoomed cell-detail view with
//! direction arrows.

use geo_codec::block::{Block, BLOCK_CELLS_X, BLOCK_CELLS_Y};
use geo_codec::cell::NSWE_CARDINAL;
use geo_codec::region::{Region, REGION_BLOCKS_X, REGION_BLOCKS_Y, REGION_CELLS_X, REGION_CELLS_Y};
use image::{ImageBuffer, Rgb, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Heightmap,
    Nswe,
    Blocks,
    Combined,
}

impl RenderMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "heightmap" => Some(Self::Heightmap),
            "nswe" => Some(Self::Nswe),
            "blocks" => Some(Self::Blocks),
            "combined" => Some(Self::Combined),
            _ => None,
        }
    }
}

fn height_range(region: &Region) -> (i32, i32) {
    let stats = region.stats();
    (stats.height_min as i32, stats.height_max as i32)
}

/// Brightness in `[0, 255]`, scaled across the region's own height range.
fn normalize_height(height: i16, h_min: i32, h_max: i32) -> u8 {
    let range = (h_max - h_min).max(1);
    (((height as i32 - h_min) as f32 / range as f32) * 255.0).clamp(0.0, 255.0) as u8
}

pub fn render_heightmap(region: &Region) -> RgbImage {
    let (h_min, h_max) = height_range(region);
    ImageBuffer::from_fn(REGION_CELLS_X as u32, REGION_CELLS_Y as u32, |x, y| {
        let cell = region.get_cell(x as usize, y as usize, 0);
        let v = normalize_height(cell.height, h_min, h_max);
        Rgb([v, v, v])
    })
}

fn nswe_color(nswe: u8, layer_count: usize) -> Rgb<u8> {
    let cardinal = nswe & NSWE_CARDINAL;
    let mut rgb = if cardinal == NSWE_CARDINAL {
        [40u8, 180, 40]
    } else if cardinal == 0 {
        [200, 40, 40]
    } else {
        [220, 200, 40]
    };
    if layer_count > 1 {
        rgb[2] = rgb[2].saturating_add(120).min(255);
    }
    Rgb(rgb)
}

pub fn render_nswe(region: &Region) -> RgbImage {
    ImageBuffer::from_fn(REGION_CELLS_X as u32, REGION_CELLS_Y as u32, |x, y| {
        let cell = region.get_cell(x as usize, y as usize, 0);
        let layers = region.get_layers(x as usize, y as usize).len();
        nswe_color(cell.nswe, layers)
    })
}

pub fn render_blocks(region: &Region) -> RgbImage {
    let mut img = RgbImage::new(REGION_CELLS_X as u32, REGION_CELLS_Y as u32);
    for bx in 0..REGION_BLOCKS_X {
        for by in 0..REGION_BLOCKS_Y {
            let color = match region.get_block(bx, by) {
                Block::Flat { .. } => Rgb([60, 60, 60]),
                Block::Complex { .. } => Rgb([160, 160, 160]),
                Block::Multilayer { .. } => Rgb([40, 200, 200]),
            };
            for lx in 0..BLOCK_CELLS_X {
                for ly in 0..BLOCK_CELLS_Y {
                    let x = (bx * BLOCK_CELLS_X + lx) as u32;
                    let y = (by * BLOCK_CELLS_Y + ly) as u32;
                    img.put_pixel(x, y, color);
                }
            }
        }
    }
    img
}

pub fn render_combined(region: &Region) -> RgbImage {
    let (h_min, h_max) = height_range(region);
    ImageBuffer::from_fn(REGION_CELLS_X as u32, REGION_CELLS_Y as u32, |x, y| {
        let cell = region.get_cell(x as usize, y as usize, 0);
        let brightness = normalize_height(cell.height, h_min, h_max) as f32 * 0.78 + 30.0;
        let cardinal = cell.nswe & NSWE_CARDINAL;
        let (rf, gf, bf) = if cardinal == NSWE_CARDINAL {
            (0.3, 1.0, 0.3)
        } else if cardinal == 0 {
            (1.0, 0.2, 0.2)
        } else {
            (1.0, 0.85, 0.15)
        };
        Rgb([
            (brightness * rf).clamp(0.0, 255.0) as u8,
            (brightness * gf).clamp(0.0, 255.0) as u8,
            (brightness * bf).clamp(0.0, 255.0) as u8,
        ])
    })
}

pub fn render(region: &Region, mode: RenderMode) -> RgbImage {
    match mode {
        RenderMode::Heightmap => render_heightmap(region),
        RenderMode::Nswe => render_nswe(region),
        RenderMode::Blocks => render_blocks(region),
        RenderMode::Combined => render_combined(region),
    }
}

/// Zoomed detail view around `(center_x, center_y)`: each cell is an
/// N-pixel tile colored by walkability, with arrow glyphs for open
/// directions and a yellow outline on the center cell.
pub fn render_cell_detail(region: &Region, center_x: i64, center_y: i64, radius: i64, cell_size: u32) -> RgbImage {
    let tiles = (radius * 2 + 1) as u32;
    let size = tiles * cell_size;
    let mut img = RgbImage::from_pixel(size, size, Rgb([30, 30, 30]));

    for dx in -radius..=radius {
        for dy in -radius..=radius {
            let x = center_x + dx;
            let y = center_y + dy;
            if x < 0 || y < 0 || x >= REGION_CELLS_X as i64 || y >= REGION_CELLS_Y as i64 {
                continue;
            }

            let cell = region.get_cell(x as usize, y as usize, 0);
            let cardinal = cell.nswe & NSWE_CARDINAL;
            let bg = if cardinal == NSWE_CARDINAL {
                Rgb([40, 120, 40])
            } else if cardinal == 0 {
                Rgb([140, 30, 30])
            } else {
                Rgb([160, 140, 30])
            };

            let px = ((dx + radius) as u32) * cell_size;
            let py = ((dy + radius) as u32) * cell_size;
            fill_rect(&mut img, px, py, cell_size, cell_size, bg);

            let mid = (px + cell_size / 2, py + cell_size / 2);
            let arrow_len = (cell_size / 3).max(1);
            let arrow_color = Rgb([220, 220, 220]);
            if cell.can_move_north() {
                draw_line(&mut img, mid, (mid.0, mid.1.saturating_sub(arrow_len)), arrow_color);
            }
            if cell.can_move_south() {
                draw_line(&mut img, mid, (mid.0, mid.1 + arrow_len), arrow_color);
            }
            if cell.can_move_east() {
                draw_line(&mut img, mid, (mid.0 + arrow_len, mid.1), arrow_color);
            }
            if cell.can_move_west() {
                draw_line(&mut img, mid, (mid.0.saturating_sub(arrow_len), mid.1), arrow_color);
            }

            if dx == 0 && dy == 0 {
                outline_rect(&mut img, px, py, cell_size, cell_size, Rgb([255, 255, 0]));
            }
        }
    }

    img
}

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for px in x..(x + w).min(img.width()) {
        for py in y..(y + h).min(img.height()) {
            img.put_pixel(px, py, color);
        }
    }
}

fn outline_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for px in x..(x + w).min(img.width()) {
        img.put_pixel(px, y, color);
        if y + h - 1 < img.height() {
            img.put_pixel(px, y + h - 1, color);
        }
    }
    for py in y..(y + h).min(img.height()) {
        img.put_pixel(x, py, color);
        if x + w - 1 < img.width() {
            img.put_pixel(x + w - 1, py, color);
        }
    }
}

fn draw_line(img: &mut RgbImage, from: (u32, u32), to: (u32, u32), color: Rgb<u8>) {
    let (x0, y0) = (from.0 as i64, from.1 as i64);
    let (x1, y1) = (to.0 as i64, to.1 as i64);
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
    for step in 0..=steps {
        let x = x0 + (x1 - x0) * step / steps;
        let y = y0 + (y1 - y0) * step / steps;
        if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
            img.put_pixel(x as u32, y as u32, color);
        }
    }
}

pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_codec::Block as BlockType;

    fn flat_region() -> Region {
        let blocks = vec![BlockType::Flat { height: 0 }; REGION_BLOCKS_X * REGION_BLOCKS_Y];
        Region::new(0, 0, blocks).unwrap()
    }

    #[test]
    fn render_mode_parses_known_names_only() {
        assert_eq!(RenderMode::parse("heightmap"), Some(RenderMode::Heightmap));
        assert_eq!(RenderMode::parse("bogus"), None);
    }

    #[test]
    fn heightmap_has_region_pixel_dimensions() {
        let region = flat_region();
        let img = render_heightmap(&region);
        assert_eq!(img.width(), REGION_CELLS_X as u32);
        assert_eq!(img.height(), REGION_CELLS_Y as u32);
    }

    #[test]
    fn all_flat_region_renders_uniform_nswe_color() {
        let region = flat_region();
        let img = render_nswe(&region);
        let first = *img.get_pixel(0, 0);
        assert!(img.pixels().all(|p| *p == first));
    }

    #[test]
    fn encode_png_produces_a_valid_png_signature() {
        let region = flat_region();
        let img = render_heightmap(&region);
        let bytes = encode_png(&img).unwrap();
        assert_eq!(&bytes[0..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn cell_detail_highlights_center_with_outline_color() {
        let region = flat_region();
        let img = render_cell_detail(&region, 100, 100, 2, 10);
        assert_eq!(img.width(), 5 * 10);
        let outline_present = img.pixels().any(|p| *p == Rgb([255, 255, 0]));
        assert!(outline_present);
    }
}
