/// Layers - scrollable, transformable background planes
///
/// A layer binds a tilemap (and through it a tileset) to one of the fixed
/// layer slots created at engine init. Lower slot indices render in front.
/// Every transform knob here only records state; the per-scanline work
/// happens in the render module, which re-reads the configuration each
/// line so raster callbacks can retune it mid-frame.
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::math::{float2fix, Fix, Matrix3, Rect, FIXED_ONE};
use crate::tilemap::{TileFlags, TilemapId};
use crate::tileset::TilesetId;

/// Layer render mode, selected implicitly by the transform setters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayerMode {
    #[default]
    Normal,
    Scaling,
    Affine,
    PixelMap,
}

/// Affine transform parameters: rotation in degrees around the scroll
/// origin, translation, and scaling
#[derive(Debug, Clone, Copy)]
pub struct Affine {
    pub angle: f32,
    pub dx: f32,
    pub dy: f32,
    pub sx: f32,
    pub sy: f32,
}

/// Per-pixel source displacement for pixel-map mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelMap {
    pub dx: i16,
    pub dy: i16,
}

/// Tile found under a point by `get_layer_tile`
#[derive(Debug, Clone, Copy, Default)]
pub struct TileInfo {
    /// 0-based user tile index
    pub index: u16,
    pub flags: TileFlags,
    pub row: i32,
    pub col: i32,
    /// horizontal position inside the tile
    pub xoffset: i32,
    /// vertical position inside the tile
    pub yoffset: i32,
    /// color index at the queried point
    pub color: u8,
    /// application-defined tile type
    pub tile_type: u8,
    /// cell is empty
    pub empty: bool,
}

pub(crate) struct Layer {
    pub tileset: Option<TilesetId>,
    pub tilemap: Option<TilemapId>,
    pub mode: LayerMode,
    pub hstart: i32,
    pub vstart: i32,
    /// layer size in pixels, cols * tile width by rows * tile height
    pub width: i32,
    pub height: i32,
    pub clip: Rect,
    pub column: Option<Vec<i32>>,
    pub pixel_map: Option<Vec<PixelMap>>,
    pub mosaic_w: i32,
    pub mosaic_h: i32,
    pub transform: Matrix3,
    /// scaling mode steppers: destination factor and source deltas
    pub xfactor: Fix,
    pub dx: Fix,
    pub dy: Fix,
    pub blend: crate::blending::BlendMode,
    pub ok: bool,
    pub priority: bool,
    pub dirty: bool,
    pub world_xfactor: f32,
    pub world_yfactor: f32,
    pub world_offset_x: i32,
    pub world_offset_y: i32,
}

impl Layer {
    pub fn new(fb_width: i32, fb_height: i32) -> Self {
        Self {
            tileset: None,
            tilemap: None,
            mode: LayerMode::Normal,
            hstart: 0,
            vstart: 0,
            width: 0,
            height: 0,
            clip: Rect::new(0, 0, fb_width, fb_height),
            column: None,
            pixel_map: None,
            mosaic_w: 0,
            mosaic_h: 0,
            transform: Matrix3::identity(),
            xfactor: FIXED_ONE,
            dx: FIXED_ONE,
            dy: FIXED_ONE,
            blend: crate::blending::BlendMode::None,
            ok: false,
            priority: false,
            dirty: false,
            world_xfactor: 0.0,
            world_yfactor: 0.0,
            world_offset_x: 0,
            world_offset_y: 0,
        }
    }
}

impl Engine {
    fn check_layer(&mut self, nlayer: usize) -> Result<()> {
        if nlayer >= self.layers.len() {
            return Err(self.fail(Error::IdxLayer));
        }
        Ok(())
    }

    /// Configures a layer with a tilemap. The tilemap's own tileset is
    /// selected; priority attributes of its tiles are applied to the
    /// cells. The layer becomes ready to draw if the tilemap is visible.
    pub fn set_layer_tilemap(&mut self, nlayer: usize, tilemap_id: TilemapId) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].ok = false;

        let Ok((tileset_ref, rows, cols, max_index, visible)) = self
            .tilemap(tilemap_id)
            .map(|t| (t.tileset, t.rows, t.cols, t.max_index, t.visible))
        else {
            return Err(self.fail(Error::RefTilemap));
        };
        let Some(tileset_id) = tileset_ref else {
            return Err(self.fail(Error::RefTileset));
        };
        let Ok((tile_w, tile_h, num_tiles)) = self
            .tileset(tileset_id)
            .map(|t| (t.width, t.height, t.num_tiles))
        else {
            return Err(self.fail(Error::RefTileset));
        };
        if max_index as usize > num_tiles {
            return Err(self.fail(Error::IdxPicture));
        }

        // propagate per-tile priority attributes into the cells
        let attributes = self.tilesets[tileset_id.0].as_ref().unwrap().attributes.clone();
        let tilemap = self.tilemaps[tilemap_id.0].as_mut().unwrap();
        for tile in tilemap.tiles.iter_mut().filter(|t| t.index != 0) {
            if attributes[tile.index as usize - 1].priority {
                tile.flags |= TileFlags::PRIORITY;
            } else {
                tile.flags &= !TileFlags::PRIORITY;
            }
        }

        let layer = &mut self.layers[nlayer];
        layer.tileset = Some(tileset_id);
        layer.tilemap = Some(tilemap_id);
        layer.width = cols as i32 * tile_w;
        layer.height = rows as i32 * tile_h;
        if visible {
            layer.ok = true;
        }
        Ok(())
    }

    /// Moves the scroll origin to the given position, wrapped to the
    /// layer size. Calling this from a raster callback per scanline is
    /// the classic line-scroll effect.
    pub fn set_layer_position(&mut self, nlayer: usize, hstart: i32, vstart: i32) -> Result<()> {
        self.check_layer(nlayer)?;
        if self.layers[nlayer].width == 0 || self.layers[nlayer].height == 0 {
            return Err(self.fail(Error::RefTilemap));
        }
        let layer = &mut self.layers[nlayer];
        layer.hstart = hstart.rem_euclid(layer.width);
        layer.vstart = vstart.rem_euclid(layer.height);
        let visible = layer
            .tilemap
            .and_then(|id| self.tilemaps.get(id.0).and_then(Option::as_ref))
            .map(|t| t.visible)
            .unwrap_or(false);
        if visible {
            self.layers[nlayer].ok = true;
        }
        Ok(())
    }

    /// Enables simple scaling. Factors below 1.0 shrink, above enlarge.
    pub fn set_layer_scaling(&mut self, nlayer: usize, sx: f32, sy: f32) -> Result<()> {
        self.check_layer(nlayer)?;
        // factors so small they vanish in fixed point would stall the span walk
        if sx <= 0.0 || sy <= 0.0 || float2fix(sx) == 0 || float2fix(sy) == 0 {
            return Err(self.fail(Error::WrongSize));
        }
        let layer = &mut self.layers[nlayer];
        layer.xfactor = float2fix(sx);
        layer.dx = float2fix(1.0 / sx);
        layer.dy = float2fix(1.0 / sy);
        layer.mode = LayerMode::Scaling;
        Ok(())
    }

    /// Enables the affine transform (rotation + scaling), Mode 7 style.
    /// Pass None to return the layer to normal rendering. Setting the
    /// transform per scanline from a raster callback fakes perspective.
    pub fn set_layer_affine_transform(
        &mut self,
        nlayer: usize,
        affine: Option<Affine>,
    ) -> Result<()> {
        self.check_layer(nlayer)?;
        let Some(affine) = affine else {
            return self.reset_layer_mode(nlayer);
        };
        if affine.sx == 0.0 || affine.sy == 0.0 {
            return Err(self.fail(Error::WrongSize));
        }

        let layer = &mut self.layers[nlayer];
        let dx = layer.hstart as f32 + affine.dx;
        let dy = layer.vstart as f32 + affine.dy;

        let mut transform = Matrix3::translation(-dx, -dy);
        transform.multiply(&Matrix3::rotation((-affine.angle) % 360.0));
        transform.multiply(&Matrix3::scale(1.0 / affine.sx, 1.0 / affine.sy));
        transform.multiply(&Matrix3::translation(dx, dy));
        layer.transform = transform;
        layer.mode = LayerMode::Affine;
        Ok(())
    }

    /// Convenience wrapper over `set_layer_affine_transform`
    pub fn set_layer_transform(
        &mut self,
        nlayer: usize,
        angle: f32,
        dx: f32,
        dy: f32,
        sx: f32,
        sy: f32,
    ) -> Result<()> {
        self.set_layer_affine_transform(
            nlayer,
            Some(Affine {
                angle,
                dx,
                dy,
                sx,
                sy,
            }),
        )
    }

    /// Enables per-pixel mapping. The table holds one displacement per
    /// framebuffer pixel; None returns the layer to normal rendering.
    pub fn set_layer_pixel_mapping(
        &mut self,
        nlayer: usize,
        table: Option<Vec<PixelMap>>,
    ) -> Result<()> {
        self.check_layer(nlayer)?;
        let expected = self.framebuffer.width * self.framebuffer.height;
        match table {
            Some(table) => {
                if table.len() != expected {
                    return Err(self.fail(Error::WrongSize));
                }
                let layer = &mut self.layers[nlayer];
                layer.pixel_map = Some(table);
                layer.mode = LayerMode::PixelMap;
            }
            None => {
                let layer = &mut self.layers[nlayer];
                layer.pixel_map = None;
                layer.mode = LayerMode::Normal;
            }
        }
        Ok(())
    }

    /// Disables scaling, affine or pixel-map rendering for the layer
    pub fn reset_layer_mode(&mut self, nlayer: usize) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].mode = LayerMode::Normal;
        Ok(())
    }

    pub fn set_layer_blend_mode(
        &mut self,
        nlayer: usize,
        mode: crate::blending::BlendMode,
    ) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].blend = mode;
        Ok(())
    }

    /// Sets per-column vertical offsets, one entry per tile column on
    /// screen. The layer keeps the vector; pass None to disable.
    pub fn set_layer_column_offset(
        &mut self,
        nlayer: usize,
        offsets: Option<Vec<i32>>,
    ) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].column = offsets;
        Ok(())
    }

    /// Restricts rendering of the layer to a rectangle. Out-of-range
    /// coordinates fall back to the framebuffer edges.
    pub fn set_layer_clip(
        &mut self,
        nlayer: usize,
        x1: i32,
        y1: i32,
        x2: i32,
        y2: i32,
    ) -> Result<()> {
        self.check_layer(nlayer)?;
        let width = self.framebuffer.width as i32;
        let height = self.framebuffer.height as i32;
        let layer = &mut self.layers[nlayer];
        layer.clip.x1 = if (0..=width).contains(&x1) { x1 } else { 0 };
        layer.clip.x2 = if (0..=width).contains(&x2) { x2 } else { width };
        layer.clip.y1 = if (0..=height).contains(&y1) { y1 } else { 0 };
        layer.clip.y2 = if (0..=height).contains(&y2) { y2 } else { height };
        Ok(())
    }

    pub fn disable_layer_clip(&mut self, nlayer: usize) -> Result<()> {
        self.check_layer(nlayer)?;
        let width = self.framebuffer.width as i32;
        let height = self.framebuffer.height as i32;
        self.layers[nlayer].clip = Rect {
            x1: 0,
            y1: 0,
            x2: width,
            y2: height,
        };
        Ok(())
    }

    /// Enables the mosaic (pixelation) effect with the given block size
    pub fn set_layer_mosaic(&mut self, nlayer: usize, width: i32, height: i32) -> Result<()> {
        self.check_layer(nlayer)?;
        if width <= 0 || height <= 0 {
            return Err(self.fail(Error::WrongSize));
        }
        let layer = &mut self.layers[nlayer];
        layer.mosaic_w = width;
        layer.mosaic_h = height;
        Ok(())
    }

    pub fn disable_layer_mosaic(&mut self, nlayer: usize) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].mosaic_h = 0;
        Ok(())
    }

    /// Makes the whole layer render in front of sprites
    pub fn set_layer_priority(&mut self, nlayer: usize, enable: bool) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].priority = enable;
        Ok(())
    }

    /// Re-enables a previously configured layer
    pub fn enable_layer(&mut self, nlayer: usize) -> Result<()> {
        self.check_layer(nlayer)?;
        let layer = &self.layers[nlayer];
        if layer.tilemap.is_some() && layer.tileset.is_some() {
            self.layers[nlayer].ok = true;
            Ok(())
        } else {
            Err(self.fail(Error::NullPointer))
        }
    }

    pub fn disable_layer(&mut self, nlayer: usize) -> Result<()> {
        self.check_layer(nlayer)?;
        self.layers[nlayer].ok = false;
        Ok(())
    }

    pub fn layer_tileset(&self, nlayer: usize) -> Result<TilesetId> {
        let layer = self.layers.get(nlayer).ok_or(Error::IdxLayer)?;
        layer.tileset.ok_or(Error::RefTileset)
    }

    pub fn layer_tilemap(&self, nlayer: usize) -> Result<TilemapId> {
        let layer = self.layers.get(nlayer).ok_or(Error::IdxLayer)?;
        layer.tilemap.ok_or(Error::RefTilemap)
    }

    /// Layer width in pixels. Errs when no tilemap is bound.
    pub fn layer_width(&self, nlayer: usize) -> Result<i32> {
        let layer = self.layers.get(nlayer).ok_or(Error::IdxLayer)?;
        if layer.width == 0 {
            return Err(Error::RefTilemap);
        }
        Ok(layer.width)
    }

    /// Layer height in pixels. Errs when no tilemap is bound.
    pub fn layer_height(&self, nlayer: usize) -> Result<i32> {
        let layer = self.layers.get(nlayer).ok_or(Error::IdxLayer)?;
        if layer.height == 0 {
            return Err(Error::RefTilemap);
        }
        Ok(layer.height)
    }

    /// Looks up the tile under a point in layer space, for collision
    /// detection against the background.
    pub fn get_layer_tile(&self, nlayer: usize, x: i32, y: i32) -> Result<TileInfo> {
        let layer = self.layers.get(nlayer).ok_or(Error::IdxLayer)?;
        let tileset = self.tileset(layer.tileset.ok_or(Error::RefTileset)?)?;
        let tilemap = self.tilemap(layer.tilemap.ok_or(Error::RefTilemap)?)?;

        let xpos = x.rem_euclid(layer.width);
        let xtile = xpos >> tileset.hshift;
        let srcx = xpos & tileset.hmask;

        let mut column_offset = 0;
        if let Some(offsets) = &layer.column {
            let mut column = x / tileset.width;
            if xpos != 0 && x > xpos {
                column += 1;
            }
            column_offset = offsets.get(column as usize).copied().unwrap_or(0);
        }

        let ypos = (y + column_offset).rem_euclid(layer.height);
        let ytile = ypos >> tileset.vshift;
        let srcy = ypos & tileset.vmask;

        let tile = tilemap.cell(ytile as usize, xtile as usize);
        let mut info = TileInfo {
            row: ytile,
            col: xtile,
            xoffset: srcx,
            yoffset: srcy,
            ..TileInfo::default()
        };
        if tile.index != 0 {
            info.index = tile.index - 1;
            info.flags = tile.flags;
            info.color = tileset.pixel(tileset.physical(tile.index), srcx, srcy);
            info.tile_type = tileset.attributes[info.index as usize].tile_type;
        } else {
            info.empty = true;
        }
        Ok(info)
    }
}
