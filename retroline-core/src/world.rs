/// World space - global scroll origin with per-layer parallax
///
/// Setting the world position marks the engine dirty; the rasterizer
/// re-derives every layer's scroll origin (world * parallax - offset) and
/// every world-space sprite's screen position at the next scanline.
use crate::engine::Engine;
use crate::error::Result;

impl Engine {
    /// Moves the world origin, scrolling all layers in sync according to
    /// their parallax factors.
    pub fn set_world_position(&mut self, x: i32, y: i32) {
        self.xworld = x;
        self.yworld = y;
        self.dirty = true;
    }

    /// Sets the layer's parallax multiplier over the world position
    pub fn set_layer_parallax_factor(&mut self, nlayer: usize, x: f32, y: f32) -> Result<()> {
        if nlayer >= self.layers.len() {
            return Err(self.fail(crate::error::Error::IdxLayer));
        }
        let layer = &mut self.layers[nlayer];
        layer.world_xfactor = x;
        layer.world_yfactor = y;
        layer.dirty = true;
        Ok(())
    }

    /// Positions the sprite pivot in world space coordinates
    pub fn set_sprite_world_position(&mut self, nsprite: usize, x: i32, y: i32) -> Result<()> {
        if nsprite >= self.sprites.len() {
            return Err(self.fail(crate::error::Error::IdxSprite));
        }
        let sprite = &mut self.sprites[nsprite];
        sprite.xworld = x;
        sprite.yworld = y;
        sprite.world_space = true;
        sprite.dirty = true;
        Ok(())
    }
}
