/// Sprite scanline renderers and per-pixel collision
use super::blitters;
use crate::engine::Engine;
use crate::math::{fix2int, int2fix, Fix};
use crate::sprite::{Sprite, SpriteMode};
use crate::tilemap::TileFlags;

/// Whether the sprite covers the scanline: inside the destination rect,
/// rect not empty, and not inside the masked span for MASKED sprites.
pub(super) fn check_coverage(sprite: &Sprite, nscan: i32, mask_top: i32, mask_bottom: i32) -> bool {
    if nscan < sprite.dstrect.y1 || nscan >= sprite.dstrect.y2 {
        return false;
    }
    if sprite.dstrect.x2 <= sprite.dstrect.x1 || sprite.srcrect.x2 < 0 {
        return false;
    }
    if sprite.flags.contains(TileFlags::MASKED) && nscan >= mask_top && nscan <= mask_bottom {
        return false;
    }
    true
}

/// Source row and horizontal stepping for the sprite at this scanline.
/// `start` and `step` are integers in normal mode, 16.16 fixed point in
/// scaling mode.
fn source_span(sprite: &Sprite, nscan: i32) -> (i32, Fix, Fix) {
    match sprite.mode {
        SpriteMode::Normal => {
            let mut srcx = sprite.srcrect.x1;
            let mut srcy = sprite.srcrect.y1 + (nscan - sprite.dstrect.y1);
            let step = if sprite.flags.contains(TileFlags::FLIPX) {
                srcx = sprite.info_w - srcx - 1;
                -1
            } else {
                1
            };
            if sprite.flags.contains(TileFlags::FLIPY) {
                srcy = sprite.info_h - srcy - 1;
            }
            (srcy, srcx, step)
        }
        SpriteMode::Scaling => {
            let mut srcx = sprite.srcrect.x1;
            let mut srcy = sprite.srcrect.y1 + (nscan - sprite.dstrect.y1) * sprite.dy;
            let step = if sprite.flags.contains(TileFlags::FLIPX) {
                srcx = int2fix(sprite.info_w) - srcx - 1;
                -sprite.dx
            } else {
                sprite.dx
            };
            if sprite.flags.contains(TileFlags::FLIPY) {
                srcy = int2fix(sprite.info_h) - srcy - 1;
            }
            let row = fix2int(srcy).clamp(0, sprite.info_h - 1);
            (row, srcx, step)
        }
    }
}

/// Draws one scanline of a sprite into the framebuffer line, then
/// updates the collision buffer when enabled.
pub(super) fn draw_sprite(engine: &mut Engine, nsprite: usize, nscan: i32) {
    // pixel pass
    {
        let Engine {
            sprites,
            tilesets,
            palettes,
            blend_tables,
            framebuffer,
            ..
        } = engine;
        let sprite = &sprites[nsprite];
        let Some(tileset) = sprite
            .tileset
            .and_then(|id| tilesets.get(id.0).and_then(Option::as_ref))
        else {
            return;
        };
        let Some(palette) = palettes.get(sprite.palette) else {
            return;
        };
        let blend = blend_tables.select(sprite.blend);

        let (row_y, start, step) = source_span(sprite, nscan);
        let row = tileset.row(sprite.tileset_entry, row_y);
        let dst_line = framebuffer.line_mut(nscan as usize);
        let dst = &mut dst_line[sprite.dstrect.x1 as usize..sprite.dstrect.x2 as usize];

        match sprite.mode {
            SpriteMode::Normal => blitters::blit_rgba(row, start, palette, dst, step, true, blend),
            SpriteMode::Scaling => {
                blitters::blit_rgba_scaling(row, start, palette, dst, step, true, blend);
            }
        }
    }

    // collision pass, after the pixels so both passes see the same span
    if engine.sprites[nsprite].do_collision {
        let Engine {
            sprites,
            tilesets,
            collision,
            ..
        } = engine;
        let sprite = &sprites[nsprite];
        let Some(tileset) = sprite
            .tileset
            .and_then(|id| tilesets.get(id.0).and_then(Option::as_ref))
        else {
            return;
        };
        let (row_y, start, step) = source_span(sprite, nscan);
        let scaling = sprite.mode == SpriteMode::Scaling;
        let span = sprite.dstrect.x1 as usize..sprite.dstrect.x2 as usize;
        let row = tileset.row(sprite.tileset_entry, row_y);
        update_collision(sprites, nsprite, row, start, step, scaling, &mut collision[span]);
    }
}

/// Marks collisions: for every opaque source pixel, if the buffer slot
/// already holds a sprite, both get flagged; the slot then records the
/// current sprite.
fn update_collision(
    sprites: &mut [Sprite],
    nsprite: usize,
    row: &[u8],
    start: Fix,
    step: Fix,
    scaling: bool,
    slots: &mut [u16],
) {
    let mut pos = start;
    for slot in slots.iter_mut() {
        let color = if scaling {
            blitters::sample(row, pos)
        } else {
            row[pos as usize]
        };
        if color != 0 {
            if *slot != 0xFFFF {
                sprites[nsprite].collision = true;
                sprites[*slot as usize].collision = true;
            }
            *slot = nsprite as u16;
        }
        pos += step;
    }
}
