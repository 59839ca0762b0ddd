/// Engine - scene state and the frame loop
///
/// The engine owns every piece of the scene: the render target, the layer
/// and sprite slots, the tileset/tilemap arenas, the palette store, the
/// precomputed blend tables and the per-line scratch buffers. Rendering is
/// synchronous: `update_frame` runs the whole scanline loop on the caller's
/// thread, invoking the raster callback at the start of every line.
use crate::blending::BlendTables;
use crate::error::{Error, Result};
use crate::layer::Layer;
use crate::palette::{pack_rgb, PaletteId, PaletteStore};
use crate::render_impl;
use crate::sprite::Sprite;
use crate::tilemap::{Tilemap, TilemapId};
use crate::tileset::Tileset;

/// Raster callback, invoked at the start of every scanline with the line
/// index. It may mutate any scene state; changes take effect for that line.
/// It must not re-enter `update_frame`.
pub type RasterCallback = Box<dyn FnMut(&mut Engine, i32)>;

/// Frame callback, invoked once at the start of every frame
pub type FrameCallback = Box<dyn FnMut(&mut Engine, u32)>;

/// Engine-owned 32-bit RGBA render target
pub(crate) struct FrameBuffer {
    pub data: Vec<u32>,
    pub width: usize,
    pub height: usize,
    /// bytes per scanline, always a multiple of 4
    pub pitch: usize,
}

impl FrameBuffer {
    fn new(width: usize, height: usize) -> Self {
        let pitch = (width * 4 + 3) & !3;
        Self {
            data: vec![0; pitch / 4 * height],
            width,
            height,
            pitch,
        }
    }

    #[inline]
    pub fn line_mut(&mut self, y: usize) -> &mut [u32] {
        let words = self.pitch / 4;
        &mut self.data[y * words..y * words + self.width]
    }
}

/// Per-layer mosaic capture line. The palette recorded on a capture line
/// is reused when the following lines repeat the buffer.
pub(crate) struct MosaicLine {
    pub pixels: Vec<u8>,
    pub palette: PaletteId,
}

/// The graphic engine: scene state plus the scanline rasterizer
pub struct Engine {
    pub(crate) framebuffer: FrameBuffer,
    pub(crate) line: i32,
    pub(crate) frame: u32,
    /// None = background disabled, line content is left untouched
    pub(crate) bgcolor: Option<u32>,
    pub(crate) layers: Vec<Layer>,
    pub(crate) sprites: Vec<Sprite>,
    pub(crate) tilesets: Vec<Option<Tileset>>,
    pub(crate) tilemaps: Vec<Option<Tilemap>>,
    pub(crate) palettes: PaletteStore,
    pub(crate) blend_tables: BlendTables,
    pub(crate) xworld: i32,
    pub(crate) yworld: i32,
    pub(crate) sprite_mask_top: i32,
    pub(crate) sprite_mask_bottom: i32,
    /// world position changed, layer scroll needs re-deriving
    pub(crate) dirty: bool,
    pub(crate) last_error: Option<Error>,
    pub(crate) cb_raster: Option<RasterCallback>,
    pub(crate) cb_frame: Option<FrameCallback>,
    /// priority-tile pixels captured for the current line
    pub(crate) priority: Vec<u32>,
    /// sprite index occupying each pixel, 0xFFFF = empty
    pub(crate) collision: Vec<u16>,
    /// 8-bit intermediate line for the affine/pixel-map first pass
    pub(crate) tmpindex: Vec<u8>,
    pub(crate) mosaic_lines: Vec<MosaicLine>,
}

impl Engine {
    /// Creates an engine with the given resolution and fixed numbers of
    /// layer and sprite slots.
    pub fn new(hres: usize, vres: usize, num_layers: usize, num_sprites: usize) -> Self {
        log::info!(
            "retroline v{}: {}x{}, {} layers, {} sprites",
            env!("CARGO_PKG_VERSION"),
            hres,
            vres,
            num_layers,
            num_sprites
        );
        Self {
            framebuffer: FrameBuffer::new(hres, vres),
            line: 0,
            frame: 0,
            bgcolor: Some(pack_rgb(0, 0, 0)),
            layers: (0..num_layers)
                .map(|_| Layer::new(hres as i32, vres as i32))
                .collect(),
            sprites: (0..num_sprites).map(|_| Sprite::new()).collect(),
            tilesets: Vec::new(),
            tilemaps: Vec::new(),
            palettes: PaletteStore::new(),
            blend_tables: BlendTables::new(),
            xworld: 0,
            yworld: 0,
            sprite_mask_top: 0,
            sprite_mask_bottom: 0,
            dirty: false,
            last_error: None,
            cb_raster: None,
            cb_frame: None,
            priority: vec![0; hres],
            collision: vec![0xFFFF; hres],
            tmpindex: vec![0; hres],
            mosaic_lines: (0..num_layers)
                .map(|_| MosaicLine {
                    pixels: vec![0; hres],
                    palette: 0,
                })
                .collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.framebuffer.width
    }

    pub fn height(&self) -> usize {
        self.framebuffer.height
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn num_sprites(&self) -> usize {
        self.sprites.len()
    }

    /// The rendered target: `height` scanlines of `pitch / 4` words each,
    /// `width` of which are visible. Valid once `update_frame` returns;
    /// must not be read while a frame is in flight.
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer.data
    }

    /// Bytes per scanline of the render target
    pub fn pitch(&self) -> usize {
        self.framebuffer.pitch
    }

    /// Restrides the render target. `pitch` is bytes per scanline, at
    /// least `4 * width` and a multiple of 4. Contents are reset.
    pub fn set_render_pitch(&mut self, pitch: usize) -> Result<()> {
        if pitch < self.framebuffer.width * 4 || pitch % 4 != 0 {
            return Err(self.fail(Error::WrongSize));
        }
        self.framebuffer.pitch = pitch;
        self.framebuffer.data = vec![0; pitch / 4 * self.framebuffer.height];
        Ok(())
    }

    /// Scanline currently being rendered
    pub fn line(&self) -> i32 {
        self.line
    }

    pub fn current_frame(&self) -> u32 {
        self.frame
    }

    /// Renders a whole frame into the render target. Pass 0 to
    /// autoincrement the frame number from the previous value.
    pub fn update_frame(&mut self, frame: u32) {
        self.begin_frame(frame);
        while render_impl::draw_scanline(self) {}
    }

    fn begin_frame(&mut self, frame: u32) {
        if frame != 0 {
            self.frame = frame;
        } else {
            self.frame += 1;
        }
        self.line = 0;
        for sprite in &mut self.sprites {
            sprite.collision = false;
        }
        if let Some(mut callback) = self.cb_frame.take() {
            let frame = self.frame;
            callback(self, frame);
            if self.cb_frame.is_none() {
                self.cb_frame = Some(callback);
            }
        }
    }

    /// Sets the solid background color drawn where no layer or sprite
    /// covers the line. Can be called from a raster callback to create
    /// gradients.
    pub fn set_background_color(&mut self, r: u8, g: u8, b: u8) {
        self.bgcolor = Some(pack_rgb(r, g, b));
    }

    /// Takes the background color from a tilemap definition
    pub fn set_background_color_from_tilemap(&mut self, id: TilemapId) -> Result<()> {
        let bgcolor = match self.tilemap(id) {
            Ok(tilemap) => tilemap.bgcolor,
            Err(error) => return Err(self.fail(error)),
        };
        self.bgcolor = Some(bgcolor | 0xFF00_0000);
        Ok(())
    }

    /// Disables background color rendering. Worth doing when the last
    /// background layer always covers the whole screen.
    pub fn disable_background_color(&mut self) {
        self.bgcolor = None;
    }

    pub fn set_raster_callback(&mut self, callback: impl FnMut(&mut Engine, i32) + 'static) {
        self.cb_raster = Some(Box::new(callback));
    }

    pub fn clear_raster_callback(&mut self) {
        self.cb_raster = None;
    }

    pub fn set_frame_callback(&mut self, callback: impl FnMut(&mut Engine, u32) + 'static) {
        self.cb_frame = Some(Box::new(callback));
    }

    pub fn clear_frame_callback(&mut self) {
        self.cb_frame = None;
    }

    /// Precomputes the custom blend table from a user function. The
    /// function is evaluated once per (src, dst) pair here, never during
    /// rendering.
    pub fn set_custom_blend_function(&mut self, function: impl Fn(u8, u8) -> u8) {
        self.blend_tables.set_custom(function);
    }

    /// Last error recorded by a failing operation
    pub fn last_error(&self) -> Option<Error> {
        self.last_error
    }

    pub(crate) fn fail(&mut self, error: Error) -> Error {
        log::error!("{}", error);
        self.last_error = Some(error);
        error
    }
}

impl Default for Engine {
    fn default() -> Self {
        // GBA-ish defaults: 4 layers, 64 sprites on a 240x160 viewport
        Self::new(240, 160, 4, 64)
    }
}

/// Inserts into the first free arena slot, growing if none is free
pub(crate) fn alloc_slot<T>(arena: &mut Vec<Option<T>>, value: T) -> usize {
    if let Some(index) = arena.iter().position(Option::is_none) {
        arena[index] = Some(value);
        index
    } else {
        arena.push(Some(value));
        arena.len() - 1
    }
}
