/// Scanline compositor
///
/// Renders one output line per call from the current scene state:
/// raster callback, background fill, regular layers back-to-front,
/// sprites in slot order, priority layers, priority-tile overlay, and
/// finally priority sprites. Only this module writes framebuffer lines.
mod blitters;
mod layers;
mod sprites;

use crate::engine::Engine;
use crate::layer::LayerMode;
use crate::tilemap::TileFlags;

/// Draws the scanline at the engine's line counter and advances it.
/// Returns whether lines remain in the frame.
pub(crate) fn draw_scanline(engine: &mut Engine) -> bool {
    let line = engine.line;

    // raster callback may retune the scene for this line onwards
    if let Some(mut callback) = engine.cb_raster.take() {
        callback(engine, line);
        if engine.cb_raster.is_none() {
            engine.cb_raster = Some(callback);
        }
    }

    // solid background color
    if let Some(color) = engine.bgcolor {
        blitters::blit_color(engine.framebuffer.line_mut(line as usize), color);
    }

    engine.priority.fill(0);
    engine.collision.fill(0xFFFF);

    // re-derive scroll positions from world space where stale
    for nlayer in 0..engine.layers.len() {
        if engine.layers[nlayer].ok && (engine.dirty || engine.layers[nlayer].dirty) {
            update_layer_position(engine, nlayer);
            engine.layers[nlayer].dirty = false;
        }
    }

    // regular background layers, painter's order: lower index in front
    let mut background_priority = false;
    for nlayer in (0..engine.layers.len()).rev() {
        background_priority |= draw_layer(engine, nlayer, line, false);
    }

    // regular sprites in slot order
    let mut sprite_priority = false;
    for nsprite in 0..engine.sprites.len() {
        if !engine.sprites[nsprite].ok {
            continue;
        }
        if engine.sprites[nsprite].world_space
            && (engine.sprites[nsprite].dirty || engine.dirty)
        {
            update_sprite_position(engine, nsprite);
        }
        let sprite = &engine.sprites[nsprite];
        if !sprites::check_coverage(sprite, line, engine.sprite_mask_top, engine.sprite_mask_bottom)
        {
            continue;
        }
        if sprite.flags.contains(TileFlags::PRIORITY) {
            sprite_priority = true;
        } else {
            sprites::draw_sprite(engine, nsprite, line);
        }
    }

    // whole layers flagged as priority render in front of sprites
    for nlayer in (0..engine.layers.len()).rev() {
        draw_layer(engine, nlayer, line, true);
    }

    // overlay priority tiles captured by the regular layer pass
    if background_priority {
        let Engine {
            framebuffer,
            priority,
            ..
        } = engine;
        let dst = framebuffer.line_mut(line as usize);
        for (out, &src) in dst.iter_mut().zip(priority.iter()) {
            if src != 0 {
                *out = src;
            }
        }
    }

    // priority sprites render in front of everything
    if sprite_priority {
        for nsprite in 0..engine.sprites.len() {
            let sprite = &engine.sprites[nsprite];
            if sprite.ok
                && sprite.flags.contains(TileFlags::PRIORITY)
                && sprites::check_coverage(
                    sprite,
                    line,
                    engine.sprite_mask_top,
                    engine.sprite_mask_bottom,
                )
            {
                sprites::draw_sprite(engine, nsprite, line);
            }
        }
    }

    engine.dirty = false;
    engine.line += 1;
    engine.line < engine.framebuffer.height as i32
}

/// Re-derives the layer scroll origin from the world position, parallax
/// factors and offsets
fn update_layer_position(engine: &mut Engine, nlayer: usize) {
    let layer = &engine.layers[nlayer];
    let x = (engine.xworld as f32 * layer.world_xfactor) as i32 - layer.world_offset_x;
    let y = (engine.yworld as f32 * layer.world_yfactor) as i32 - layer.world_offset_y;
    let _ = engine.set_layer_position(nlayer, x, y);
}

/// Re-derives a world-space sprite's screen position
fn update_sprite_position(engine: &mut Engine, nsprite: usize) {
    let fb_width = engine.framebuffer.width as i32;
    let fb_height = engine.framebuffer.height as i32;
    let (xworld, yworld) = (engine.xworld, engine.yworld);
    let sprite = &mut engine.sprites[nsprite];
    sprite.x = sprite.xworld - xworld;
    sprite.y = sprite.yworld - yworld;
    sprite.update_rects(fb_width, fb_height);
    sprite.dirty = false;
}

/// Draws one layer's scanline if it participates in this pass.
/// Returns whether priority tiles were rendered into the overlay.
fn draw_layer(engine: &mut Engine, nlayer: usize, line: i32, priority_pass: bool) -> bool {
    let Engine {
        layers,
        tilesets,
        tilemaps,
        palettes,
        blend_tables,
        framebuffer,
        priority,
        tmpindex,
        mosaic_lines,
        ..
    } = engine;

    let layer = &layers[nlayer];
    if !layer.ok || layer.priority != priority_pass {
        return false;
    }
    if line < layer.clip.y1 || line > layer.clip.y2 {
        return false;
    }
    let (Some(tileset_id), Some(tilemap_id)) = (layer.tileset, layer.tilemap) else {
        return false;
    };
    let Some(tileset) = tilesets.get(tileset_id.0).and_then(Option::as_ref) else {
        return false;
    };
    let Some(tilemap) = tilemaps.get(tilemap_id.0).and_then(Option::as_ref) else {
        return false;
    };

    let fb_width = framebuffer.width;
    let ctx = layers::LayerLine {
        layer,
        tileset,
        tilemap,
        palettes,
        blend: blend_tables.select(layer.blend),
        dst_line: framebuffer.line_mut(line as usize),
        dst_priority: priority,
        tmpindex,
        mosaic: &mut mosaic_lines[nlayer],
        fb_width,
        nscan: line,
    };
    match layer.mode {
        LayerMode::Normal => layers::draw_normal(ctx),
        LayerMode::Scaling => layers::draw_scaling(ctx),
        LayerMode::Affine => layers::draw_affine(ctx),
        LayerMode::PixelMap => layers::draw_pixel_map(ctx),
    }
}
