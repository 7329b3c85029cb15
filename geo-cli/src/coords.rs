use clap::Parser;
use geo_codec::coords::{region_to_world, world_to_region};

#[derive(Debug, Parser)]
pub struct World2GeoArgs {
    /// World X coordinate
    x: i64,
    /// World Y coordinate
    y: i64,
}

pub fn run_world2geo(args: World2GeoArgs) -> anyhow::Result<()> {
    let (region_x, region_y, cell_x, cell_y) = world_to_region(args.x, args.y);
    println!("region=({region_x}, {region_y}) cell=({cell_x}, {cell_y}) file={region_x}_{region_y}.l2d");
    Ok(())
}

#[derive(Debug, Parser)]
pub struct Geo2WorldArgs {
    region_x: i64,
    region_y: i64,
    cell_x: i64,
    cell_y: i64,
}

pub fn run_geo2world(args: Geo2WorldArgs) -> anyhow::Result<()> {
    let (world_x, world_y) = region_to_world(args.region_x, args.region_y, args.cell_x, args.cell_y);
    println!("world=({world_x}, {world_y})");
    Ok(())
}
