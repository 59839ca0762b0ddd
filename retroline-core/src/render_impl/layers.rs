/// Layer scanline renderers - normal, scaling, affine and pixel-map
///
/// Each renderer produces one layer's contribution to the current line.
/// Normal and scaling walk the line in tile-sized spans and hand each
/// span to a blitter; affine and pixel-map resolve one source pixel per
/// destination pixel into the 8-bit intermediate line, then blit that
/// through the keyed blitter in a second pass.
///
/// With mosaic active, the first pass is redirected to the layer's
/// capture buffer: only lines at multiples of mosaic.h render fresh
/// content, the rest reuse the captured line, and a dedicated blitter
/// expands the buffer to the framebuffer in mosaic.w blocks.
use super::blitters;
use crate::engine::MosaicLine;
use crate::layer::Layer;
use crate::math::{fix2int, float2fix, int2fix, Point2D};
use crate::palette::{PaletteId, PaletteStore};
use crate::tilemap::{TileFlags, Tilemap};
use crate::tileset::Tileset;

/// Everything a layer renderer needs for one scanline
pub(super) struct LayerLine<'a> {
    pub layer: &'a Layer,
    pub tileset: &'a Tileset,
    pub tilemap: &'a Tilemap,
    pub palettes: &'a PaletteStore,
    pub blend: Option<&'a [u8]>,
    /// visible framebuffer line
    pub dst_line: &'a mut [u32],
    /// priority-tile capture line
    pub dst_priority: &'a mut [u32],
    /// 8-bit intermediate for the two-pass modes
    pub tmpindex: &'a mut [u8],
    pub mosaic: &'a mut MosaicLine,
    pub fb_width: usize,
    pub nscan: i32,
}

impl LayerLine<'_> {
    fn mosaic_active(&self) -> bool {
        self.layer.mosaic_h > 0
    }

    /// Whether this line renders fresh content or reuses the capture
    fn mosaic_capture(&self) -> bool {
        !self.mosaic_active() || self.nscan % self.layer.mosaic_h == 0
    }

    fn expand_mosaic(&mut self) {
        let x1 = self.layer.clip.x1 as usize;
        let x2 = self.layer.clip.x2 as usize;
        let Some(palette) = self.palettes.get(self.mosaic.palette) else {
            return;
        };
        let src = &self.mosaic.pixels[x1..x2];
        let dst = &mut self.dst_line[x1..x2];
        match self.blend {
            Some(table) => {
                blitters::blit_mosaic_blend(src, palette, dst, self.layer.mosaic_w, table);
            }
            None => blitters::blit_mosaic_solid(src, palette, dst, self.layer.mosaic_w),
        }
    }
}

/// Draws one scanline of a tiled background. Returns whether any
/// priority tile was rendered.
pub(super) fn draw_normal(mut ctx: LayerLine) -> bool {
    let layer = ctx.layer;
    let tileset = ctx.tileset;
    let tilemap = ctx.tilemap;
    let cols = tilemap.cols as i32;
    let mut priority = false;

    if ctx.mosaic_capture() {
        let mosaic = ctx.mosaic_active();
        if mosaic {
            ctx.mosaic.pixels.fill(0);
        }

        let mut x = layer.clip.x1;
        let xpos = (layer.hstart + x).rem_euclid(layer.width);
        let mut xtile = xpos >> tileset.hshift;
        let mut srcx = xpos & tileset.hmask;
        let mut column = x / tileset.width;
        let mut palette_recorded = false;

        while x < layer.clip.x2 {
            // column offsets shift the vertical position per tile span
            let mut ypos = layer.vstart + ctx.nscan;
            if let Some(offsets) = &layer.column {
                ypos += offsets.get(column as usize).copied().unwrap_or(0);
            }
            ypos = ypos.rem_euclid(layer.height);

            let ytile = ypos >> tileset.vshift;
            let mut srcy = ypos & tileset.vmask;

            let tile = tilemap.tiles[(ytile * cols + xtile) as usize];

            let tilewidth = tileset.width - srcx;
            let x1 = (x + tilewidth).min(layer.clip.x2);

            if tile.index != 0 {
                let tile_index = tileset.physical(tile.index);

                let (start, direction) = if tile.flags.contains(TileFlags::FLIPX) {
                    (tilewidth - 1, -1)
                } else {
                    (srcx, 1)
                };
                if tile.flags.contains(TileFlags::FLIPY) {
                    srcy = tileset.height - srcy - 1;
                }

                let row = tileset.row(tile_index, srcy);
                let keyed = tileset.row_has_key(tile_index, srcy);
                let span = x as usize..x1 as usize;

                if mosaic {
                    blitters::blit_indexed(
                        row,
                        start,
                        &mut ctx.mosaic.pixels[span],
                        direction,
                        keyed,
                    );
                    if !palette_recorded {
                        ctx.mosaic.palette = tile.flags.palette();
                        palette_recorded = true;
                    }
                } else if let Some(palette) = ctx.palettes.get(tile.flags.palette()) {
                    let dst = if tile.flags.contains(TileFlags::PRIORITY) {
                        priority = true;
                        &mut ctx.dst_priority[span]
                    } else {
                        &mut ctx.dst_line[span]
                    };
                    blitters::blit_rgba(row, start, palette, dst, direction, keyed, ctx.blend);
                }
            }

            x = x1;
            xtile = (xtile + 1) % cols;
            srcx = 0;
            column += 1;
        }
    }

    if ctx.mosaic_active() {
        ctx.expand_mosaic();
    }
    priority
}

/// Draws one scanline of a tiled background with scaling. Source
/// positions advance by fixed point deltas derived from the scale.
pub(super) fn draw_scaling(mut ctx: LayerLine) -> bool {
    let layer = ctx.layer;
    let tileset = ctx.tileset;
    let tilemap = ctx.tilemap;
    let cols = tilemap.cols as i32;
    let mut priority = false;

    if ctx.mosaic_capture() {
        let mosaic = ctx.mosaic_active();
        if mosaic {
            ctx.mosaic.pixels.fill(0);
        }

        let mut x = layer.clip.x1;
        let xpos = (layer.hstart + fix2int(x * layer.dx)).rem_euclid(layer.width);
        let mut xtile = xpos >> tileset.hshift;
        let mut srcx = xpos & tileset.hmask;
        let mut fix_x = int2fix(x);
        let mut column = x / tileset.width;
        let mut palette_recorded = false;

        while x < layer.clip.x2 {
            let mut ypos = ctx.nscan;
            if let Some(offsets) = &layer.column {
                ypos += offsets.get(column as usize).copied().unwrap_or(0);
            }
            ypos = (layer.vstart + fix2int(ypos * layer.dy)).rem_euclid(layer.height);

            let ytile = ypos >> tileset.vshift;
            let mut srcy = ypos & tileset.vmask;

            let tile = tilemap.tiles[(ytile * cols + xtile) as usize];

            // destination span covered by the remainder of this tile
            let tilewidth = tileset.width - srcx;
            let mut dx = int2fix(tilewidth);
            fix_x += tilewidth * layer.xfactor;
            let mut x1 = fix2int(fix_x);
            let tilescalewidth = x1 - x;
            if tilescalewidth != 0 {
                dx /= tilescalewidth;
            } else {
                dx = 0;
            }
            x1 = x1.min(layer.clip.x2);

            if tile.index != 0 && x1 > x {
                let tile_index = tileset.physical(tile.index);

                let (start, step) = if tile.flags.contains(TileFlags::FLIPX) {
                    (int2fix(tilewidth - 1), -dx)
                } else {
                    (int2fix(srcx), dx)
                };
                if tile.flags.contains(TileFlags::FLIPY) {
                    srcy = tileset.height - srcy - 1;
                }

                let row = tileset.row(tile_index, srcy);
                let keyed = tileset.row_has_key(tile_index, srcy);
                let span = x as usize..x1 as usize;

                if mosaic {
                    blitters::blit_indexed_scaling(
                        row,
                        start,
                        &mut ctx.mosaic.pixels[span],
                        step,
                        keyed,
                    );
                    if !palette_recorded {
                        ctx.mosaic.palette = tile.flags.palette();
                        palette_recorded = true;
                    }
                } else if let Some(palette) = ctx.palettes.get(tile.flags.palette()) {
                    let dst = if tile.flags.contains(TileFlags::PRIORITY) {
                        priority = true;
                        &mut ctx.dst_priority[span]
                    } else {
                        &mut ctx.dst_line[span]
                    };
                    blitters::blit_rgba_scaling(row, start, palette, dst, step, keyed, ctx.blend);
                }
            }

            x = x1.max(x);
            xtile = (xtile + 1) % cols;
            srcx = 0;
            column += 1;
        }
    }

    if ctx.mosaic_active() {
        ctx.expand_mosaic();
    }
    priority
}

/// Draws one scanline of a tiled background under the affine transform.
pub(super) fn draw_affine(mut ctx: LayerLine) -> bool {
    let layer = ctx.layer;
    let width = layer.clip.x2 - layer.clip.x1;
    if width <= 0 {
        return false;
    }

    if ctx.mosaic_capture() {
        // transform both line endpoints, derive per-pixel steps
        let ypos = (layer.vstart + ctx.nscan) as f32;
        let mut p1 = Point2D::new((layer.hstart + layer.clip.x1) as f32, ypos);
        let mut p2 = Point2D::new((layer.hstart + layer.clip.x2) as f32, ypos);
        p1.multiply(&layer.transform);
        p2.multiply(&layer.transform);

        let mut x1 = float2fix(p1.x);
        let mut y1 = float2fix(p1.y);
        let dx = (float2fix(p2.x) - x1) / width;
        let dy = (float2fix(p2.y) - y1) / width;

        let palette = first_pass(&mut ctx, |layer, _| {
            let xpos = ((fix2int(x1) + layer.width).abs()) % layer.width;
            let ypos = ((fix2int(y1) + layer.height).abs()) % layer.height;
            x1 += dx;
            y1 += dy;
            (xpos, ypos)
        });
        finish_line(&mut ctx, palette);
    } else {
        ctx.expand_mosaic();
    }
    false
}

/// Draws one scanline with per-pixel source displacement from the
/// user-supplied pixel map.
pub(super) fn draw_pixel_map(mut ctx: LayerLine) -> bool {
    let layer = ctx.layer;
    let Some(pixel_map) = &layer.pixel_map else {
        return false;
    };

    if ctx.mosaic_capture() {
        let hstart = layer.hstart + layer.width;
        let vstart = layer.vstart + layer.height;
        let row_base = ctx.nscan as usize * ctx.fb_width;

        let palette = first_pass(&mut ctx, |layer, x| {
            let entry = pixel_map[row_base + x as usize];
            (
                (hstart + entry.dx as i32).abs() % layer.width,
                (vstart + entry.dy as i32).abs() % layer.height,
            )
        });
        finish_line(&mut ctx, palette);
    } else {
        ctx.expand_mosaic();
    }
    false
}

/// Shared per-pixel sampling loop of the two-pass modes. `source` maps
/// the destination x to a wrapped position in layer space. Returns the
/// palette selector of the first non-empty tile on the line.
fn first_pass(
    ctx: &mut LayerLine,
    mut source: impl FnMut(&Layer, i32) -> (i32, i32),
) -> Option<PaletteId> {
    let layer = ctx.layer;
    let tileset = ctx.tileset;
    let tilemap = ctx.tilemap;
    let cols = tilemap.cols as i32;
    let mut palette = None;

    let dstbuf: &mut [u8] = if layer.mosaic_h > 0 {
        &mut ctx.mosaic.pixels
    } else {
        &mut ctx.tmpindex
    };
    dstbuf.fill(0);

    for x in layer.clip.x1..layer.clip.x2 {
        let (xpos, ypos) = source(layer, x);

        let xtile = xpos >> tileset.hshift;
        let ytile = ypos >> tileset.vshift;
        let mut srcx = xpos & tileset.hmask;
        let mut srcy = ypos & tileset.vmask;

        let tile = tilemap.tiles[(ytile * cols + xtile) as usize];
        if tile.index != 0 {
            if tile.flags.contains(TileFlags::FLIPX) {
                srcx = tileset.width - srcx - 1;
            }
            if tile.flags.contains(TileFlags::FLIPY) {
                srcy = tileset.height - srcy - 1;
            }
            dstbuf[x as usize] = tileset.pixel(tileset.physical(tile.index), srcx, srcy);
            if palette.is_none() {
                palette = Some(tile.flags.palette());
            }
        }
    }
    palette
}

/// Delivers the captured line: expands the mosaic buffer, or blits the
/// intermediate line through the keyed blitter with the line's palette.
fn finish_line(ctx: &mut LayerLine, palette: Option<PaletteId>) {
    if ctx.layer.mosaic_h > 0 {
        if let Some(palette) = palette {
            ctx.mosaic.palette = palette;
        }
        ctx.expand_mosaic();
        return;
    }
    let x1 = ctx.layer.clip.x1 as usize;
    let x2 = ctx.layer.clip.x2 as usize;
    let Some(palette) = ctx.palettes.get(palette.unwrap_or(0)) else {
        return;
    };
    let row = &ctx.tmpindex[x1..x2];
    let dst = &mut ctx.dst_line[x1..x2];
    blitters::blit_rgba(row, 0, palette, dst, 1, true, ctx.blend);
}
