use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use retroline_core::{Affine, BlendMode, Engine, Tile, TileFlags};

const WIDTH: usize = 256;
const HEIGHT: usize = 160;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("retroline demo");
    log::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = env::args().collect();
    let frames: u32 = args.get(1).map(|s| s.parse()).transpose()?.unwrap_or(3);

    let mut engine = build_scene()?;

    // sky gradient plus a horizon wobble on the front layer
    engine.set_raster_callback(|engine, line| {
        let shade = 40 + (line as u32 * 140 / HEIGHT as u32) as u8;
        engine.set_background_color(shade / 4, shade / 2, shade);
        if line >= 96 {
            let frame = engine.current_frame() as f32;
            let phase = (line as f32 / 8.0 + frame / 10.0).sin();
            let _ = engine.set_layer_position(0, (phase * 6.0) as i32 + frame as i32, 0);
        }
    });

    for frame in 1..=frames {
        engine.set_world_position(frame as i32 * 4, 0);
        engine.update_frame(frame);
        let path = format!("frame{:03}.ppm", frame);
        write_ppm(&engine, Path::new(&path))
            .with_context(|| format!("failed to write {}", path))?;
        log::info!("wrote {}", path);
    }
    Ok(())
}

/// Two scrolling checkerboard layers with parallax, a rotating affine
/// midlayer, and a couple of blended sprites
fn build_scene() -> Result<Engine> {
    let mut engine = Engine::new(WIDTH, HEIGHT, 3, 8);

    engine.create_palette(0, 16)?;
    engine.set_palette_color(0, 1, 216, 96, 48)?;
    engine.set_palette_color(0, 2, 96, 48, 160)?;
    engine.set_palette_color(0, 3, 255, 224, 64)?;
    engine.set_palette_color(0, 4, 48, 160, 96)?;

    let tileset = engine.create_tileset(4, 8, 8, None)?;
    for entry in 1..=4u16 {
        let mut pixels = [0u8; 64];
        for y in 0..8 {
            for x in 0..8 {
                // diagonal transparent seams through each tile
                let solid = (x + y) % 7 != 0;
                pixels[y * 8 + x] = if solid { entry as u8 } else { 0 };
            }
        }
        engine.set_tileset_pixels(tileset, entry, &pixels, 8)?;
    }

    // far layer: sparse checkerboard
    let mut far = vec![Tile::default(); 32 * 32];
    for (i, cell) in far.iter_mut().enumerate() {
        let (row, col) = (i / 32, i % 32);
        if (row + col) % 2 == 0 {
            *cell = Tile::new(2, TileFlags::empty());
        }
    }
    let far_map = engine.create_tilemap(32, 32, Some(&far), 0, Some(tileset))?;
    engine.set_layer_tilemap(2, far_map)?;
    engine.set_layer_parallax_factor(2, 0.25, 0.25)?;

    // middle layer: rotating plane
    let mut mid = vec![Tile::default(); 32 * 32];
    for (i, cell) in mid.iter_mut().enumerate() {
        if i % 3 != 0 {
            *cell = Tile::new(4, TileFlags::empty());
        }
    }
    let mid_map = engine.create_tilemap(32, 32, Some(&mid), 0, Some(tileset))?;
    engine.set_layer_tilemap(1, mid_map)?;
    engine.set_layer_affine_transform(
        1,
        Some(Affine {
            angle: 12.0,
            dx: 0.0,
            dy: 0.0,
            sx: 1.5,
            sy: 1.5,
        }),
    )?;
    engine.set_layer_blend_mode(1, BlendMode::Mix50)?;

    // front layer: dense ground strip
    let mut front = vec![Tile::default(); 32 * 32];
    for (i, cell) in front.iter_mut().enumerate() {
        if i / 32 >= 24 {
            *cell = Tile::new(1, TileFlags::empty());
        }
    }
    let front_map = engine.create_tilemap(32, 32, Some(&front), 0, Some(tileset))?;
    engine.set_layer_tilemap(0, front_map)?;
    engine.set_layer_parallax_factor(0, 1.0, 1.0)?;

    for nsprite in 0..4 {
        engine.set_sprite_picture(nsprite, tileset, 3)?;
        engine.set_sprite_pivot(nsprite, 0.5, 0.5)?;
        engine.set_sprite_position(nsprite, 40 + nsprite as i32 * 56, 60)?;
        engine.set_sprite_scaling(nsprite, 2.0, 2.0)?;
        engine.set_sprite_blend_mode(nsprite, BlendMode::Add)?;
    }

    Ok(engine)
}

/// Dumps the framebuffer as a binary PPM image
fn write_ppm(engine: &Engine, path: &Path) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "P6\n{} {}\n255", engine.width(), engine.height())?;
    let words = engine.pitch() / 4;
    for y in 0..engine.height() {
        for x in 0..engine.width() {
            let color = engine.framebuffer()[y * words + x];
            out.write_all(&[
                (color >> 16) as u8,
                (color >> 8) as u8,
                color as u8,
            ])?;
        }
    }
    Ok(())
}
