//! retroline - a software-rendered, retro-style 2D raster graphics engine
//!
//! Renders a fixed-resolution 32-bit RGBA framebuffer one scanline at a
//! time, in the manner of 1990s tile-based console hardware: indexed-color
//! tilemaps composed into scrolling background layers, sprites drawn from
//! tileset entries, per-scanline raster callbacks for mid-frame parameter
//! changes, and per-layer transforms (scaling, affine, per-pixel remap).
//!
//! The [`Engine`] owns the whole scene; build it through the resource and
//! layer/sprite methods, then call [`Engine::update_frame`] and read the
//! framebuffer back.

pub mod blending;
pub mod context;
pub mod engine;
pub mod error;
pub mod layer;
pub mod math;
pub mod palette;
mod render_impl;
#[cfg(test)]
mod render_tests;
pub mod sprite;
pub mod tilemap;
pub mod tileset;
mod world;

pub use blending::BlendMode;
pub use engine::Engine;
pub use error::{Error, Result};
pub use layer::{Affine, LayerMode, PixelMap, TileInfo};
pub use palette::{pack_rgb, PaletteId};
pub use sprite::SpriteState;
pub use tilemap::{Tile, TileFlags, TilemapId};
pub use tileset::{TileAttributes, TilesetId};
