/// Sprites - independently positioned bitmaps drawn from tileset entries
///
/// Sprites render between the regular and the priority background layers,
/// in slot-index order. The source/destination rectangles are computed
/// once per configuration change (pre-clipped against the framebuffer) so
/// the per-scanline path only checks coverage and blits one row.
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::math::{int2fix, Fix, Rect};
use crate::palette::PaletteId;
use crate::tilemap::TileFlags;
use crate::tileset::TilesetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SpriteMode {
    #[default]
    Normal,
    Scaling,
}

/// Snapshot of a sprite's runtime state
#[derive(Debug, Clone, Copy, Default)]
pub struct SpriteState {
    /// screen position after pivot and clipping
    pub x: i32,
    pub y: i32,
    /// on-screen size after scaling
    pub w: i32,
    pub h: i32,
    pub flags: TileFlags,
    /// tileset entry used as picture
    pub index: u16,
    pub enabled: bool,
    /// per-pixel collision detection enabled
    pub collision: bool,
}

pub(crate) struct Sprite {
    pub palette: PaletteId,
    pub tileset: Option<TilesetId>,
    pub tileset_entry: u16,
    /// picture size in pixels
    pub info_w: i32,
    pub info_h: i32,
    /// screen space position of the pivot
    pub x: i32,
    pub y: i32,
    /// fixed point source steps, scaling mode only
    pub dx: Fix,
    pub dy: Fix,
    pub xworld: i32,
    pub yworld: i32,
    pub sx: f32,
    pub sy: f32,
    /// normalized pivot inside the sprite, (0,0) = top-left
    pub ptx: f32,
    pub pty: f32,
    /// source rect; fixed point in scaling mode
    pub srcrect: Rect,
    /// destination rect, clipped to the framebuffer
    pub dstrect: Rect,
    pub mode: SpriteMode,
    pub blend: crate::blending::BlendMode,
    pub flags: TileFlags,
    pub ok: bool,
    pub do_collision: bool,
    pub collision: bool,
    pub world_space: bool,
    pub dirty: bool,
}

impl Sprite {
    pub fn new() -> Self {
        Self {
            palette: 0,
            tileset: None,
            tileset_entry: 0,
            info_w: 0,
            info_h: 0,
            x: 0,
            y: 0,
            dx: 0,
            dy: 0,
            xworld: 0,
            yworld: 0,
            sx: 1.0,
            sy: 1.0,
            ptx: 0.0,
            pty: 0.0,
            srcrect: Rect::default(),
            dstrect: Rect::default(),
            mode: SpriteMode::Normal,
            blend: crate::blending::BlendMode::None,
            flags: TileFlags::empty(),
            ok: false,
            do_collision: false,
            collision: false,
            world_space: false,
            dirty: false,
        }
    }

    /// Recomputes the source and destination rectangles from position,
    /// pivot and scale, clipping against the framebuffer. In scaling mode
    /// the source rect is kept in fixed point.
    pub(crate) fn update_rects(&mut self, fb_width: i32, fb_height: i32) {
        let (w, h) = match self.mode {
            SpriteMode::Scaling => (
                (self.info_w as f32 * self.sx) as i32,
                (self.info_h as f32 * self.sy) as i32,
            ),
            SpriteMode::Normal => (self.info_w, self.info_h),
        };
        if w <= 0 || h <= 0 {
            self.srcrect = Rect::default();
            self.dstrect = Rect::default();
            return;
        }

        let x = self.x - (w as f32 * self.ptx) as i32;
        let y = self.y - (h as f32 * self.pty) as i32;
        self.dstrect = Rect::new(x, y, w, h);

        match self.mode {
            SpriteMode::Normal => {
                self.srcrect = Rect::new(0, 0, self.info_w, self.info_h);
                if self.dstrect.x1 < 0 {
                    self.srcrect.x1 -= self.dstrect.x1;
                    self.dstrect.x1 = 0;
                }
                if self.dstrect.y1 < 0 {
                    self.srcrect.y1 -= self.dstrect.y1;
                    self.dstrect.y1 = 0;
                }
                if self.dstrect.x2 > fb_width {
                    self.srcrect.x2 -= self.dstrect.x2 - fb_width;
                    self.dstrect.x2 = fb_width;
                }
                if self.dstrect.y2 > fb_height {
                    self.srcrect.y2 -= self.dstrect.y2 - fb_height;
                    self.dstrect.y2 = fb_height;
                }
            }
            SpriteMode::Scaling => {
                self.dx = int2fix(self.info_w) / w;
                self.dy = int2fix(self.info_h) / h;
                self.srcrect = Rect {
                    x1: 0,
                    y1: 0,
                    x2: int2fix(self.info_w),
                    y2: int2fix(self.info_h),
                };
                if self.dstrect.x1 < 0 {
                    self.srcrect.x1 -= self.dstrect.x1 * self.dx;
                    self.dstrect.x1 = 0;
                }
                if self.dstrect.y1 < 0 {
                    self.srcrect.y1 -= self.dstrect.y1 * self.dy;
                    self.dstrect.y1 = 0;
                }
                if self.dstrect.x2 > fb_width {
                    self.srcrect.x2 -= (self.dstrect.x2 - fb_width) * self.dx;
                    self.dstrect.x2 = fb_width;
                }
                if self.dstrect.y2 > fb_height {
                    self.srcrect.y2 -= (self.dstrect.y2 - fb_height) * self.dy;
                    self.dstrect.y2 = fb_height;
                }
            }
        }

        // fully offscreen sprites collapse to an empty destination
        self.dstrect.x1 = self.dstrect.x1.min(self.dstrect.x2);
        self.dstrect.y1 = self.dstrect.y1.min(self.dstrect.y2);
    }
}

impl Engine {
    fn check_sprite(&mut self, nsprite: usize) -> Result<()> {
        if nsprite >= self.sprites.len() {
            return Err(self.fail(Error::IdxSprite));
        }
        Ok(())
    }

    fn refresh_sprite(&mut self, nsprite: usize) {
        let fb_width = self.framebuffer.width as i32;
        let fb_height = self.framebuffer.height as i32;
        let sprite = &mut self.sprites[nsprite];
        sprite.update_rects(fb_width, fb_height);
        if sprite.world_space {
            sprite.dirty = true;
        }
    }

    /// Assigns a tileset entry as the sprite picture and enables the
    /// sprite. `entry` is 1-based like tilemap cells.
    pub fn set_sprite_picture(
        &mut self,
        nsprite: usize,
        tileset: TilesetId,
        entry: u16,
    ) -> Result<()> {
        self.check_sprite(nsprite)?;
        let Ok((width, height, num_tiles)) = self
            .tileset(tileset)
            .map(|t| (t.width, t.height, t.num_tiles))
        else {
            return Err(self.fail(Error::RefTileset));
        };
        if entry == 0 || entry as usize > num_tiles {
            return Err(self.fail(Error::IdxPicture));
        }
        let sprite = &mut self.sprites[nsprite];
        sprite.tileset = Some(tileset);
        sprite.tileset_entry = entry;
        sprite.info_w = width;
        sprite.info_h = height;
        sprite.ok = true;
        self.refresh_sprite(nsprite);
        Ok(())
    }

    /// Places the sprite pivot at screen coordinates
    pub fn set_sprite_position(&mut self, nsprite: usize, x: i32, y: i32) -> Result<()> {
        self.check_sprite(nsprite)?;
        let sprite = &mut self.sprites[nsprite];
        sprite.x = x;
        sprite.y = y;
        sprite.world_space = false;
        self.refresh_sprite(nsprite);
        Ok(())
    }

    /// Sets the normalized pivot point, (0.5, 0.5) = sprite center
    pub fn set_sprite_pivot(&mut self, nsprite: usize, px: f32, py: f32) -> Result<()> {
        self.check_sprite(nsprite)?;
        if !(0.0..=1.0).contains(&px) || !(0.0..=1.0).contains(&py) {
            return Err(self.fail(Error::WrongSize));
        }
        let sprite = &mut self.sprites[nsprite];
        sprite.ptx = px;
        sprite.pty = py;
        self.refresh_sprite(nsprite);
        Ok(())
    }

    pub fn set_sprite_scaling(&mut self, nsprite: usize, sx: f32, sy: f32) -> Result<()> {
        self.check_sprite(nsprite)?;
        if sx <= 0.0 || sy <= 0.0 {
            return Err(self.fail(Error::WrongSize));
        }
        let sprite = &mut self.sprites[nsprite];
        sprite.sx = sx;
        sprite.sy = sy;
        sprite.mode = SpriteMode::Scaling;
        self.refresh_sprite(nsprite);
        Ok(())
    }

    pub fn reset_sprite_scaling(&mut self, nsprite: usize) -> Result<()> {
        self.check_sprite(nsprite)?;
        let sprite = &mut self.sprites[nsprite];
        sprite.sx = 1.0;
        sprite.sy = 1.0;
        sprite.mode = SpriteMode::Normal;
        self.refresh_sprite(nsprite);
        Ok(())
    }

    pub fn set_sprite_palette(&mut self, nsprite: usize, palette: PaletteId) -> Result<()> {
        self.check_sprite(nsprite)?;
        if self.palettes.get(palette).is_none() {
            return Err(self.fail(Error::RefPalette));
        }
        self.sprites[nsprite].palette = palette;
        Ok(())
    }

    pub fn sprite_palette(&self, nsprite: usize) -> Result<PaletteId> {
        let sprite = self.sprites.get(nsprite).ok_or(Error::IdxSprite)?;
        Ok(sprite.palette)
    }

    pub fn set_sprite_blend_mode(
        &mut self,
        nsprite: usize,
        mode: crate::blending::BlendMode,
    ) -> Result<()> {
        self.check_sprite(nsprite)?;
        self.sprites[nsprite].blend = mode;
        Ok(())
    }

    /// Sets or clears one attribute flag (FLIPX, FLIPY, PRIORITY, MASKED)
    pub fn enable_sprite_flag(
        &mut self,
        nsprite: usize,
        flag: TileFlags,
        enable: bool,
    ) -> Result<()> {
        self.check_sprite(nsprite)?;
        let sprite = &mut self.sprites[nsprite];
        if enable {
            sprite.flags |= flag;
        } else {
            sprite.flags &= !flag;
        }
        self.refresh_sprite(nsprite);
        Ok(())
    }

    /// Enables per-pixel collision detection for the sprite. The result
    /// flag is cleared when toggled and at the start of every frame.
    pub fn enable_sprite_collision(&mut self, nsprite: usize, enable: bool) -> Result<()> {
        self.check_sprite(nsprite)?;
        let sprite = &mut self.sprites[nsprite];
        sprite.do_collision = enable;
        sprite.collision = false;
        Ok(())
    }

    /// Whether the sprite overlapped another collision-enabled sprite
    /// during the last rendered frame
    pub fn sprite_collision(&self, nsprite: usize) -> Result<bool> {
        let sprite = self.sprites.get(nsprite).ok_or(Error::IdxSprite)?;
        Ok(sprite.collision)
    }

    pub fn sprite_state(&self, nsprite: usize) -> Result<SpriteState> {
        let sprite = self.sprites.get(nsprite).ok_or(Error::IdxSprite)?;
        Ok(SpriteState {
            x: sprite.dstrect.x1,
            y: sprite.dstrect.y1,
            w: sprite.dstrect.x2 - sprite.dstrect.x1,
            h: sprite.dstrect.y2 - sprite.dstrect.y1,
            flags: sprite.flags,
            index: sprite.tileset_entry,
            enabled: sprite.ok,
            collision: sprite.do_collision,
        })
    }

    pub fn sprite_picture(&self, nsprite: usize) -> Result<u16> {
        let sprite = self.sprites.get(nsprite).ok_or(Error::IdxSprite)?;
        Ok(sprite.tileset_entry)
    }

    /// First sprite slot not currently enabled
    pub fn first_available_sprite(&self) -> Option<usize> {
        self.sprites.iter().position(|sprite| !sprite.ok)
    }

    /// Defines the scanline span in which MASKED sprites are not drawn
    pub fn set_sprites_mask_region(&mut self, top_line: i32, bottom_line: i32) {
        self.sprite_mask_top = top_line;
        self.sprite_mask_bottom = bottom_line;
    }

    /// Re-enables a sprite previously disabled. It must have a picture.
    pub fn enable_sprite(&mut self, nsprite: usize) -> Result<()> {
        self.check_sprite(nsprite)?;
        if self.sprites[nsprite].tileset.is_none() {
            return Err(self.fail(Error::NullPointer));
        }
        self.sprites[nsprite].ok = true;
        Ok(())
    }

    pub fn disable_sprite(&mut self, nsprite: usize) -> Result<()> {
        self.check_sprite(nsprite)?;
        self.sprites[nsprite].ok = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_sprite() -> Engine {
        let mut engine = Engine::new(64, 64, 1, 4);
        engine.create_palette(0, 16).unwrap();
        let tileset = engine.create_tileset(1, 8, 8, None).unwrap();
        engine.set_tileset_pixels(tileset, 1, &[1; 64], 8).unwrap();
        engine.set_sprite_picture(0, tileset, 1).unwrap();
        engine
    }

    #[test]
    fn test_picture_enables_sprite() {
        let engine = engine_with_sprite();
        let state = engine.sprite_state(0).unwrap();
        assert!(state.enabled);
        assert_eq!(state.index, 1);
        assert_eq!((state.w, state.h), (8, 8));
        assert_eq!(engine.first_available_sprite(), Some(1));
    }

    #[test]
    fn test_rects_follow_position_and_pivot() {
        let mut engine = engine_with_sprite();
        engine.set_sprite_position(0, 10, 20).unwrap();
        let state = engine.sprite_state(0).unwrap();
        assert_eq!((state.x, state.y), (10, 20));

        engine.set_sprite_pivot(0, 0.5, 0.5).unwrap();
        engine.set_sprite_position(0, 10, 20).unwrap();
        let state = engine.sprite_state(0).unwrap();
        assert_eq!((state.x, state.y), (6, 16));
    }

    #[test]
    fn test_rects_clip_to_framebuffer() {
        let mut engine = engine_with_sprite();
        engine.set_sprite_position(0, -3, 60).unwrap();
        let sprite = &engine.sprites[0];
        assert_eq!(sprite.dstrect, Rect { x1: 0, y1: 60, x2: 5, y2: 64 });
        assert_eq!(sprite.srcrect, Rect { x1: 3, y1: 0, x2: 8, y2: 4 });
    }

    #[test]
    fn test_offscreen_sprite_collapses() {
        let mut engine = engine_with_sprite();
        engine.set_sprite_position(0, 100, 0).unwrap();
        let sprite = &engine.sprites[0];
        assert!(sprite.dstrect.x2 <= sprite.dstrect.x1);
    }

    #[test]
    fn test_scaling_steppers() {
        let mut engine = engine_with_sprite();
        engine.set_sprite_scaling(0, 2.0, 0.5).unwrap();
        let sprite = &engine.sprites[0];
        assert_eq!(sprite.dstrect.x2 - sprite.dstrect.x1, 16);
        assert_eq!(sprite.dstrect.y2 - sprite.dstrect.y1, 4);
        assert_eq!(sprite.dx, int2fix(8) / 16);
        assert_eq!(sprite.dy, int2fix(8) / 4);
    }

    #[test]
    fn test_validation_errors() {
        let mut engine = engine_with_sprite();
        assert_eq!(
            engine.set_sprite_position(9, 0, 0).unwrap_err(),
            Error::IdxSprite
        );
        assert_eq!(
            engine.set_sprite_pivot(0, 1.5, 0.0).unwrap_err(),
            Error::WrongSize
        );
        assert_eq!(
            engine.set_sprite_palette(0, 200).unwrap_err(),
            Error::RefPalette
        );
        assert_eq!(engine.enable_sprite(1).unwrap_err(), Error::NullPointer);
    }

    #[test]
    fn test_flags_toggle() {
        let mut engine = engine_with_sprite();
        engine.enable_sprite_flag(0, TileFlags::FLIPX, true).unwrap();
        assert!(engine.sprites[0].flags.contains(TileFlags::FLIPX));
        engine.enable_sprite_flag(0, TileFlags::FLIPX, false).unwrap();
        assert!(!engine.sprites[0].flags.contains(TileFlags::FLIPX));
    }

    #[test]
    fn test_collision_toggle_clears_result() {
        let mut engine = engine_with_sprite();
        engine.enable_sprite_collision(0, true).unwrap();
        engine.sprites[0].collision = true;
        engine.enable_sprite_collision(0, true).unwrap();
        assert!(!engine.sprite_collision(0).unwrap());
    }
}
