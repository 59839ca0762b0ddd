//! End-to-end rendering scenarios exercising the whole pipeline through
//! the public API: build a scene, render frames, check pixels.

use crate::blending::BlendMode;
use crate::engine::Engine;
use crate::layer::PixelMap;
use crate::tilemap::{Tile, TileFlags};
use crate::tileset::TileAttributes;
use crate::tileset::TilesetId;
use crate::tilemap::TilemapId;

const RED: u32 = 0xFFFF_0000;
const BLUE: u32 = 0xFF00_00FF;
const GREEN: u32 = 0xFF00_FF00;
const BLACK: u32 = 0xFF00_0000;

fn pixel(engine: &Engine, x: usize, y: usize) -> u32 {
    engine.framebuffer()[y * engine.pitch() / 4 + x]
}

fn snapshot(engine: &Engine) -> Vec<u32> {
    engine.framebuffer().to_vec()
}

/// 64x64 engine, palette 0 with red=1 blue=2, 8x8 tileset with tile 1
/// solid red and tile 2 solid blue
fn base_engine() -> (Engine, TilesetId) {
    let mut engine = Engine::new(64, 64, 2, 4);
    engine.create_palette(0, 256).unwrap();
    engine.set_palette_color(0, 1, 255, 0, 0).unwrap();
    engine.set_palette_color(0, 2, 0, 0, 255).unwrap();
    let tileset = engine.create_tileset(2, 8, 8, None).unwrap();
    engine.set_tileset_pixels(tileset, 1, &[1; 64], 8).unwrap();
    engine.set_tileset_pixels(tileset, 2, &[2; 64], 8).unwrap();
    (engine, tileset)
}

/// base engine + 8x8 tilemap of solid tile 1 bound to layer 0
fn solid_layer_engine() -> (Engine, TilesetId, TilemapId) {
    let (mut engine, tileset) = base_engine();
    let cells = vec![Tile::new(1, TileFlags::empty()); 64];
    let tilemap = engine
        .create_tilemap(8, 8, Some(&cells), 0, Some(tileset))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();
    (engine, tileset, tilemap)
}

/// like `solid_layer_engine` but cell (0,0) is tile 2 (blue), giving
/// each position a distinguishable color
fn varied_layer_engine() -> (Engine, TilesetId, TilemapId) {
    let (mut engine, tileset, tilemap) = solid_layer_engine();
    engine
        .set_tilemap_tile(tilemap, 0, 0, Tile::new(2, TileFlags::empty()))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();
    (engine, tileset, tilemap)
}

#[test]
fn test_solid_layer_fills_frame() {
    let (mut engine, _, _) = solid_layer_engine();
    engine.update_frame(1);
    assert!((0..64).all(|y| (0..64).all(|x| pixel(&engine, x, y) == RED)));
}

#[test]
fn test_transparent_pixel_shows_background() {
    let (mut engine, tileset, _) = solid_layer_engine();
    // tile 1 gets a hole in its top-left pixel
    let mut pixels = [1u8; 64];
    pixels[0] = 0;
    engine.set_tileset_pixels(tileset, 1, &pixels, 8).unwrap();
    engine.set_background_color(0, 255, 0);

    engine.update_frame(1);
    for block_y in (0..64).step_by(8) {
        for block_x in (0..64).step_by(8) {
            assert_eq!(pixel(&engine, block_x, block_y), GREEN);
            assert_eq!(pixel(&engine, block_x + 1, block_y), RED);
            assert_eq!(pixel(&engine, block_x, block_y + 1), RED);
        }
    }
}

#[test]
fn test_scaling_uniform_source_is_invariant() {
    let (mut engine, _, _) = solid_layer_engine();
    engine.set_layer_scaling(0, 2.0, 2.0).unwrap();
    engine.update_frame(1);
    assert!((0..64).all(|y| (0..64).all(|x| pixel(&engine, x, y) == RED)));

    engine.set_layer_scaling(0, 0.5, 0.5).unwrap();
    engine.update_frame(0);
    assert!((0..64).all(|y| (0..64).all(|x| pixel(&engine, x, y) == RED)));
}

#[test]
fn test_sprite_collision_flags_both() {
    let (mut engine, tileset) = base_engine();
    engine.set_sprite_picture(0, tileset, 1).unwrap();
    engine.set_sprite_picture(1, tileset, 2).unwrap();
    engine.set_sprite_position(0, 0, 0).unwrap();
    engine.set_sprite_position(1, 0, 0).unwrap();
    engine.enable_sprite_collision(0, true).unwrap();
    engine.enable_sprite_collision(1, true).unwrap();

    engine.update_frame(1);
    assert!(engine.sprite_collision(0).unwrap());
    assert!(engine.sprite_collision(1).unwrap());

    // flags reset per frame; disjoint sprites no longer collide
    engine.set_sprite_position(1, 16, 16).unwrap();
    engine.update_frame(0);
    assert!(!engine.sprite_collision(0).unwrap());
    assert!(!engine.sprite_collision(1).unwrap());
}

#[test]
fn test_hflip_mirrors_tile_row() {
    let (mut engine, tileset) = base_engine();
    // tile 1: index 1 at x=0, index 2 at x=7, transparent between
    let mut pixels = [0u8; 64];
    for y in 0..8 {
        pixels[y * 8] = 1;
        pixels[y * 8 + 7] = 2;
    }
    engine.set_tileset_pixels(tileset, 1, &pixels, 8).unwrap();
    let cells = vec![Tile::new(1, TileFlags::FLIPX); 64];
    let tilemap = engine
        .create_tilemap(8, 8, Some(&cells), 0, Some(tileset))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), BLUE);
    assert_eq!(pixel(&engine, 7, 0), RED);
    assert_eq!(pixel(&engine, 3, 0), BLACK);
}

#[test]
fn test_raster_callback_transition_line() {
    let mut engine = Engine::new(64, 64, 1, 1);
    engine.set_background_color(255, 0, 0);
    engine.set_raster_callback(|engine, line| {
        if line == 32 {
            engine.set_background_color(0, 0, 255);
        }
    });
    engine.update_frame(1);
    for y in 0..32 {
        assert_eq!(pixel(&engine, 0, y), RED, "line {}", y);
    }
    for y in 32..64 {
        assert_eq!(pixel(&engine, 0, y), BLUE, "line {}", y);
    }
}

#[test]
fn test_raster_line_scroll() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.set_raster_callback(|engine, line| {
        engine.set_layer_position(0, line, 0).unwrap();
    });
    engine.update_frame(1);
    // blue tile occupies source x in [0,8); line y is shifted by y
    assert_eq!(pixel(&engine, 3, 0), BLUE);
    assert_eq!(pixel(&engine, 3, 4), BLUE);
    assert_eq!(pixel(&engine, 4, 4), RED);
    assert_eq!(pixel(&engine, 7, 0), BLUE);
    assert_eq!(pixel(&engine, 8, 0), RED);
}

#[test]
fn test_empty_cells_leave_background() {
    let (mut engine, _, tilemap) = solid_layer_engine();
    engine
        .set_tilemap_tile(tilemap, 0, 0, Tile::default())
        .unwrap();
    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), BLACK);
    assert_eq!(pixel(&engine, 7, 7), BLACK);
    assert_eq!(pixel(&engine, 8, 0), RED);
    assert_eq!(pixel(&engine, 0, 8), RED);
}

#[test]
fn test_wraparound_scroll_is_periodic() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.set_layer_position(0, 3, 5).unwrap();
    engine.update_frame(1);
    let reference = snapshot(&engine);

    engine.set_layer_position(0, 3 + 64, 5 + 64).unwrap();
    engine.update_frame(0);
    assert_eq!(snapshot(&engine), reference);
}

#[test]
fn test_disabled_layer_is_invisible() {
    let (mut engine, _, _) = solid_layer_engine();
    engine.disable_layer(0).unwrap();
    engine.update_frame(1);
    assert!(engine.framebuffer().iter().all(|&c| c == BLACK));

    engine.enable_layer(0).unwrap();
    engine.update_frame(0);
    assert_eq!(pixel(&engine, 0, 0), RED);
}

#[test]
fn test_layer_blend_mix50() {
    let (mut engine, _, _) = solid_layer_engine();
    engine.set_layer_blend_mode(0, BlendMode::Mix50).unwrap();
    engine.update_frame(1);
    // red at 50% over the black background
    assert!(engine
        .framebuffer()
        .iter()
        .all(|&c| c == 0xFF7F_0000));
}

#[test]
fn test_mosaic_1x1_is_identity() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.update_frame(1);
    let reference = snapshot(&engine);

    engine.set_layer_mosaic(0, 1, 1).unwrap();
    engine.update_frame(0);
    assert_eq!(snapshot(&engine), reference);
}

#[test]
fn test_mosaic_quantizes_blocks() {
    let (mut engine, tileset) = base_engine();
    // tile 1: even rows index 1, odd rows index 2
    let mut pixels = [0u8; 64];
    for y in 0..8 {
        for x in 0..8 {
            pixels[y * 8 + x] = if y % 2 == 0 { 1 } else { 2 };
        }
    }
    engine.set_tileset_pixels(tileset, 1, &pixels, 8).unwrap();
    let cells = vec![Tile::new(1, TileFlags::empty()); 64];
    let tilemap = engine
        .create_tilemap(8, 8, Some(&cells), 0, Some(tileset))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();
    engine.set_layer_mosaic(0, 1, 3).unwrap();

    engine.update_frame(1);
    // lines 0..3 repeat the capture of line 0 (red), 3..6 of line 3 (blue)
    assert_eq!(pixel(&engine, 0, 0), RED);
    assert_eq!(pixel(&engine, 0, 1), RED);
    assert_eq!(pixel(&engine, 0, 2), RED);
    assert_eq!(pixel(&engine, 0, 3), BLUE);
    assert_eq!(pixel(&engine, 0, 4), BLUE);
    assert_eq!(pixel(&engine, 0, 6), RED);
}

#[test]
fn test_affine_identity_equals_normal() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.update_frame(1);
    let reference = snapshot(&engine);

    engine.set_layer_transform(0, 0.0, 0.0, 0.0, 1.0, 1.0).unwrap();
    engine.update_frame(0);
    assert_eq!(snapshot(&engine), reference);
}

#[test]
fn test_affine_rotation_90() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.set_layer_transform(0, 90.0, 0.0, 0.0, 1.0, 1.0).unwrap();
    engine.update_frame(1);
    // screen (x, y) samples source (y, 64 - x): the blue tile shows up
    // along the left edge and the right margin of the first tile rows
    assert_eq!(pixel(&engine, 0, 2), BLUE);
    assert_eq!(pixel(&engine, 60, 2), BLUE);
    assert_eq!(pixel(&engine, 7, 2), RED);
    assert_eq!(pixel(&engine, 30, 2), RED);
    assert_eq!(pixel(&engine, 0, 10), RED);
}

#[test]
fn test_pixel_map_identity_equals_normal() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.update_frame(1);
    let reference = snapshot(&engine);

    let mut table = Vec::with_capacity(64 * 64);
    for y in 0..64i16 {
        for x in 0..64i16 {
            table.push(PixelMap { dx: x, dy: y });
        }
    }
    engine.set_layer_pixel_mapping(0, Some(table)).unwrap();
    engine.update_frame(0);
    assert_eq!(snapshot(&engine), reference);
}

#[test]
fn test_column_offset_shifts_vertically() {
    let (mut engine, tileset) = base_engine();
    // alternating rows of red and blue tiles
    let mut cells = vec![Tile::default(); 64];
    for row in 0..8 {
        for col in 0..8 {
            cells[row * 8 + col] = Tile::new(if row % 2 == 0 { 1 } else { 2 }, TileFlags::empty());
        }
    }
    let tilemap = engine
        .create_tilemap(8, 8, Some(&cells), 0, Some(tileset))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();
    engine
        .set_layer_column_offset(0, Some(vec![8, 0, 0, 0, 0, 0, 0, 0]))
        .unwrap();

    engine.update_frame(1);
    // first tile column shifted one tile row down
    assert_eq!(pixel(&engine, 0, 0), BLUE);
    assert_eq!(pixel(&engine, 8, 0), RED);
    assert_eq!(pixel(&engine, 0, 8), RED);
    assert_eq!(pixel(&engine, 8, 8), BLUE);
}

#[test]
fn test_priority_tiles_cover_sprites() {
    let (mut engine, tileset) = base_engine();
    let attributes = [
        TileAttributes {
            tile_type: 0,
            priority: true,
        },
        TileAttributes::default(),
    ];
    let tileset_pri = engine.create_tileset(2, 8, 8, Some(&attributes)).unwrap();
    engine.set_tileset_pixels(tileset_pri, 1, &[1; 64], 8).unwrap();
    engine.set_tileset_pixels(tileset_pri, 2, &[2; 64], 8).unwrap();

    // only cell (0,0) holds the priority tile
    let mut cells = vec![Tile::default(); 64];
    cells[0] = Tile::new(1, TileFlags::empty());
    let tilemap = engine
        .create_tilemap(8, 8, Some(&cells), 0, Some(tileset_pri))
        .unwrap();
    engine.set_layer_tilemap(0, tilemap).unwrap();

    // blue sprite overlapping the tile and the empty area next to it
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_position(0, 4, 0).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 5, 0), RED, "priority tile covers sprite");
    assert_eq!(pixel(&engine, 9, 0), BLUE, "sprite visible over empty cell");
    assert_eq!(pixel(&engine, 0, 0), RED);
}

#[test]
fn test_priority_sprite_covers_priority_layer() {
    let (mut engine, tileset, _) = solid_layer_engine();
    engine.set_layer_priority(0, true).unwrap();
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_position(0, 0, 0).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), RED, "priority layer over regular sprite");

    engine
        .enable_sprite_flag(0, TileFlags::PRIORITY, true)
        .unwrap();
    engine.update_frame(0);
    assert_eq!(pixel(&engine, 0, 0), BLUE, "priority sprite in front");
    assert_eq!(pixel(&engine, 20, 20), RED);
}

#[test]
fn test_masked_sprites_skip_region() {
    let (mut engine, tileset) = base_engine();
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_position(0, 0, 12).unwrap();
    engine.enable_sprite_flag(0, TileFlags::MASKED, true).unwrap();
    engine.set_sprites_mask_region(16, 47);

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 12), BLUE);
    assert_eq!(pixel(&engine, 0, 15), BLUE);
    assert_eq!(pixel(&engine, 0, 16), BLACK);
    assert_eq!(pixel(&engine, 0, 19), BLACK);
}

#[test]
fn test_sprite_flip_and_clip() {
    let (mut engine, tileset) = base_engine();
    // asymmetric picture: index 1 at x=0, index 2 at x=7
    let mut pixels = [0u8; 64];
    for y in 0..8 {
        pixels[y * 8] = 1;
        pixels[y * 8 + 7] = 2;
    }
    engine.set_tileset_pixels(tileset, 1, &pixels, 8).unwrap();
    engine.set_sprite_picture(0, tileset, 1).unwrap();
    engine.set_sprite_position(0, 0, 0).unwrap();
    engine.enable_sprite_flag(0, TileFlags::FLIPX, true).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), BLUE);
    assert_eq!(pixel(&engine, 7, 0), RED);
}

#[test]
fn test_scaled_sprite() {
    let (mut engine, tileset) = base_engine();
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_position(0, 0, 0).unwrap();
    engine.set_sprite_scaling(0, 2.0, 2.0).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), BLUE);
    assert_eq!(pixel(&engine, 15, 15), BLUE);
    assert_eq!(pixel(&engine, 16, 16), BLACK);
}

#[test]
fn test_sprite_blend_over_background() {
    let (mut engine, tileset) = base_engine();
    engine.set_background_color(255, 0, 0);
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_position(0, 0, 0).unwrap();
    engine.set_sprite_blend_mode(0, BlendMode::Mix50).unwrap();

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), 0xFF7F_007F);
    assert_eq!(pixel(&engine, 8, 8), RED);
}

#[test]
fn test_world_parallax_matches_manual_scroll() {
    let (mut engine, _, _) = varied_layer_engine();
    engine.set_layer_position(0, 8, 0).unwrap();
    engine.update_frame(1);
    let reference = snapshot(&engine);

    let (mut engine, _, _) = varied_layer_engine();
    engine.set_layer_parallax_factor(0, 1.0, 1.0).unwrap();
    engine.set_world_position(8, 0);
    engine.update_frame(1);
    assert_eq!(snapshot(&engine), reference);
}

#[test]
fn test_world_space_sprite_follows_world() {
    let (mut engine, tileset) = base_engine();
    engine.set_sprite_picture(0, tileset, 2).unwrap();
    engine.set_sprite_world_position(0, 20, 10).unwrap();
    engine.set_world_position(16, 8);

    engine.update_frame(1);
    assert_eq!(pixel(&engine, 4, 2), BLUE);
    assert_eq!(pixel(&engine, 3, 2), BLACK);
    assert_eq!(pixel(&engine, 11, 9), BLUE);
    assert_eq!(pixel(&engine, 12, 10), BLACK);
}

#[test]
fn test_clip_restricts_layer() {
    let (mut engine, _, _) = solid_layer_engine();
    engine.set_layer_clip(0, 8, 8, 24, 24).unwrap();
    engine.update_frame(1);
    assert_eq!(pixel(&engine, 0, 0), BLACK);
    assert_eq!(pixel(&engine, 7, 8), BLACK);
    assert_eq!(pixel(&engine, 8, 8), RED);
    assert_eq!(pixel(&engine, 23, 23), RED);
    assert_eq!(pixel(&engine, 24, 23), BLACK);
    assert_eq!(pixel(&engine, 8, 25), BLACK);
}

#[test]
fn test_background_from_tilemap() {
    let (mut engine, tileset) = base_engine();
    let tilemap = engine
        .create_tilemap(8, 8, None, 0x0000_FF00, Some(tileset))
        .unwrap();
    engine.set_background_color_from_tilemap(tilemap).unwrap();
    engine.update_frame(1);
    assert!(engine.framebuffer().iter().all(|&c| c == GREEN));
}
