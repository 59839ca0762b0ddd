/// Tilesets - banks of fixed-size indexed-color tiles
///
/// A tileset stores N user tiles plus the empty sentinel in slot 0, which
/// is never drawn. Pixel data is 8-bit palette indices, laid out tile by
/// tile, row by row. Alongside the pixels it keeps one flag per tile line
/// telling whether that line contains transparent (index 0) pixels - the
/// renderers use it to pick the keyed or the solid inner loop - plus the
/// per-tile attribute records and the logical-to-physical remap table
/// reserved for tile animation.
use crate::engine::{alloc_slot, Engine};
use crate::error::{Error, Result};

/// Handle to a tileset owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilesetId(pub(crate) usize);

/// Per-tile metadata supplied at creation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileAttributes {
    /// Application-defined tile type
    pub tile_type: u8,
    /// Tile renders in front of sprites
    pub priority: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Tileset {
    pub num_tiles: usize,
    pub width: i32,
    pub height: i32,
    pub hshift: u32,
    pub vshift: u32,
    pub hmask: i32,
    pub vmask: i32,
    /// (num_tiles + 1) * width * height palette indices, slot 0 empty
    pub data: Vec<u8>,
    /// one flag per tile line: line has transparent pixels
    pub color_key: Vec<bool>,
    /// one record per user tile, indexed by tile index - 1
    pub attributes: Vec<TileAttributes>,
    /// logical tile index -> physical slot, identity until animated
    pub remap: Vec<u16>,
}

impl Tileset {
    #[inline]
    pub fn line(&self, index: u16, y: i32) -> usize {
        ((index as usize) << self.vshift) + y as usize
    }

    #[inline]
    pub fn pixel(&self, index: u16, x: i32, y: i32) -> u8 {
        self.data[(self.line(index, y) << self.hshift) + x as usize]
    }

    /// One line of tile pixels
    #[inline]
    pub fn row(&self, index: u16, y: i32) -> &[u8] {
        let start = self.line(index, y) << self.hshift;
        &self.data[start..start + self.width as usize]
    }

    /// Whether the line contains transparent pixels (keyed blit required)
    #[inline]
    pub fn row_has_key(&self, index: u16, y: i32) -> bool {
        self.color_key[self.line(index, y)]
    }

    /// Resolves a logical tile index through the animation remap table
    #[inline]
    pub fn physical(&self, logical: u16) -> u16 {
        self.remap[logical as usize]
    }
}

fn pow2_shift(size: i32) -> Option<u32> {
    (1u32..=8).find(|&shift| 1_i32 << shift == size)
}

fn has_transparent_pixels(row: &[u8]) -> bool {
    row.contains(&0)
}

impl Engine {
    /// Creates a tileset of `num_tiles` tiles of `width` x `height` pixels.
    /// Sizes must be powers of two up to 256.
    pub fn create_tileset(
        &mut self,
        num_tiles: usize,
        width: i32,
        height: i32,
        attributes: Option<&[TileAttributes]>,
    ) -> Result<TilesetId> {
        let (Some(hshift), Some(vshift)) = (pow2_shift(width), pow2_shift(height)) else {
            return Err(self.fail(Error::WrongSize));
        };
        if num_tiles == 0 || num_tiles > u16::MAX as usize - 1 {
            return Err(self.fail(Error::WrongSize));
        }

        let slots = num_tiles + 1;
        let mut tile_attributes = vec![TileAttributes::default(); num_tiles];
        if let Some(attributes) = attributes {
            let count = attributes.len().min(num_tiles);
            tile_attributes[..count].copy_from_slice(&attributes[..count]);
        }

        let tileset = Tileset {
            num_tiles,
            width,
            height,
            hshift,
            vshift,
            hmask: width - 1,
            vmask: height - 1,
            data: vec![0; slots * (width * height) as usize],
            color_key: vec![false; slots * height as usize],
            attributes: tile_attributes,
            remap: (0..slots as u16).collect(),
        };
        let id = TilesetId(alloc_slot(&mut self.tilesets, tileset));
        log::trace!(
            "tileset {}: {} tiles of {}x{}",
            id.0,
            num_tiles,
            width,
            height
        );
        Ok(id)
    }

    /// Sets pixel data for one tile. `entry` is 1-based (0 is the empty
    /// sentinel); `pitch` is bytes per line of the source data.
    pub fn set_tileset_pixels(
        &mut self,
        id: TilesetId,
        entry: u16,
        data: &[u8],
        pitch: usize,
    ) -> Result<()> {
        let Some((width, height, num_tiles)) = self
            .tilesets
            .get(id.0)
            .and_then(Option::as_ref)
            .map(|ts| (ts.width as usize, ts.height as usize, ts.num_tiles))
        else {
            return Err(self.fail(Error::RefTileset));
        };
        if entry == 0 || entry as usize > num_tiles {
            return Err(self.fail(Error::IdxPicture));
        }
        if pitch < width || data.len() < pitch * (height - 1) + width {
            return Err(self.fail(Error::WrongSize));
        }

        let tileset = self.tilesets[id.0].as_mut().unwrap();
        let mut line = entry as usize * height;
        let mut dst = entry as usize * width * height;
        for y in 0..height {
            let src = &data[y * pitch..y * pitch + width];
            tileset.data[dst..dst + width].copy_from_slice(src);
            tileset.color_key[line] = has_transparent_pixels(src);
            line += 1;
            dst += width;
        }
        Ok(())
    }

    /// Pixel data of one tile, `width * height` indices
    pub fn tileset_pixels(&self, id: TilesetId, entry: u16) -> Result<&[u8]> {
        let tileset = self.tileset(id)?;
        if entry as usize > tileset.num_tiles {
            return Err(Error::IdxPicture);
        }
        let size = (tileset.width * tileset.height) as usize;
        let start = entry as usize * size;
        Ok(&tileset.data[start..start + size])
    }

    /// Creates an independent duplicate of a tileset
    pub fn clone_tileset(&mut self, id: TilesetId) -> Result<TilesetId> {
        let Some(copy) = self.tilesets.get(id.0).and_then(Option::as_ref).cloned() else {
            return Err(self.fail(Error::RefTileset));
        };
        Ok(TilesetId(alloc_slot(&mut self.tilesets, copy)))
    }

    /// Deletes a tileset. Layers or sprites still referencing it simply
    /// stop drawing.
    pub fn delete_tileset(&mut self, id: TilesetId) -> Result<()> {
        match self.tilesets.get_mut(id.0).map(Option::take) {
            Some(Some(_)) => Ok(()),
            _ => Err(self.fail(Error::RefTileset)),
        }
    }

    pub fn tile_width(&self, id: TilesetId) -> Result<i32> {
        Ok(self.tileset(id)?.width)
    }

    pub fn tile_height(&self, id: TilesetId) -> Result<i32> {
        Ok(self.tileset(id)?.height)
    }

    pub fn tileset_num_tiles(&self, id: TilesetId) -> Result<usize> {
        Ok(self.tileset(id)?.num_tiles)
    }

    pub(crate) fn tileset(&self, id: TilesetId) -> Result<&Tileset> {
        self.tilesets
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::RefTileset)
    }
}
