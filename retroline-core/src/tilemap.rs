/// Tilemaps - 2D grids of tile references composing a scrollable layer
use bitflags::bitflags;

use crate::engine::{alloc_slot, Engine};
use crate::error::{Error, Result};
use crate::palette::PaletteId;
use crate::tileset::TilesetId;

bitflags! {
    /// Cell and sprite attribute flags, stored in the high half of the
    /// 32-bit cell word. The low byte selects the palette.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u16 {
        /// Horizontal flip
        const FLIPX = 0x8000;
        /// Vertical flip
        const FLIPY = 0x4000;
        /// Row/column flip (reserved, Tiled compatibility)
        const ROTATE = 0x2000;
        /// Tile goes in front of the sprite layer
        const PRIORITY = 0x1000;
        /// Sprite is not drawn inside the masked region
        const MASKED = 0x0800;
        /// Palette selector mask
        const PALETTE = 0x00FF;
    }
}

impl TileFlags {
    /// Palette selected by the low byte of the flag word
    #[inline]
    pub fn palette(self) -> PaletteId {
        (self.bits() & TileFlags::PALETTE.bits()) as PaletteId
    }

    /// Returns the flags with the palette selector replaced
    pub fn with_palette(self, palette: PaletteId) -> Self {
        TileFlags::from_bits_retain(
            (self.bits() & !TileFlags::PALETTE.bits()) | palette as u16,
        )
    }
}

/// One tilemap cell: tile index plus flip/priority/palette flags.
///
/// The 32-bit interchange encoding is little-endian: low 16 bits hold the
/// tile index (0 = empty), high 16 bits the flag word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tile {
    pub index: u16,
    pub flags: TileFlags,
}

impl Tile {
    pub fn new(index: u16, flags: TileFlags) -> Self {
        Self { index, flags }
    }

    pub fn from_u32(value: u32) -> Self {
        Self {
            index: value as u16,
            flags: TileFlags::from_bits_retain((value >> 16) as u16),
        }
    }

    pub fn to_u32(self) -> u32 {
        (self.flags.bits() as u32) << 16 | self.index as u32
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.index == 0
    }
}

/// Handle to a tilemap owned by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilemapId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) struct Tilemap {
    pub rows: usize,
    pub cols: usize,
    /// highest tile index referenced by any cell
    pub max_index: u16,
    pub bgcolor: u32,
    pub visible: bool,
    pub tileset: Option<TilesetId>,
    pub tiles: Vec<Tile>,
}

impl Tilemap {
    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> Tile {
        self.tiles[row * self.cols + col]
    }
}

impl Engine {
    /// Creates a tilemap. `cells` must hold `rows * cols` entries when
    /// given; an omitted grid starts empty. The optional tileset becomes
    /// the default one selected when the tilemap is bound to a layer.
    pub fn create_tilemap(
        &mut self,
        rows: usize,
        cols: usize,
        cells: Option<&[Tile]>,
        bgcolor: u32,
        tileset: Option<TilesetId>,
    ) -> Result<TilemapId> {
        if rows == 0 || cols == 0 {
            return Err(self.fail(Error::WrongSize));
        }
        if let Some(cells) = cells {
            if cells.len() != rows * cols {
                return Err(self.fail(Error::WrongSize));
            }
        }
        if let Some(id) = tileset {
            if self.tilesets.get(id.0).and_then(Option::as_ref).is_none() {
                return Err(self.fail(Error::RefTileset));
            }
        }

        let tiles = match cells {
            Some(cells) => cells.to_vec(),
            None => vec![Tile::default(); rows * cols],
        };
        let max_index = tiles.iter().map(|t| t.index).max().unwrap_or(0);
        let tilemap = Tilemap {
            rows,
            cols,
            max_index,
            bgcolor,
            visible: true,
            tileset,
            tiles,
        };
        let id = TilemapId(alloc_slot(&mut self.tilemaps, tilemap));
        log::trace!("tilemap {}: {}x{} cells", id.0, rows, cols);
        Ok(id)
    }

    pub fn tilemap_tile(&self, id: TilemapId, row: usize, col: usize) -> Result<Tile> {
        let tilemap = self.tilemap(id)?;
        if row >= tilemap.rows || col >= tilemap.cols {
            return Err(Error::IdxPicture);
        }
        Ok(tilemap.cell(row, col))
    }

    pub fn set_tilemap_tile(
        &mut self,
        id: TilemapId,
        row: usize,
        col: usize,
        tile: Tile,
    ) -> Result<()> {
        let Some(tilemap) = self.tilemaps.get(id.0).and_then(Option::as_ref) else {
            return Err(self.fail(Error::RefTilemap));
        };
        if row >= tilemap.rows || col >= tilemap.cols {
            return Err(self.fail(Error::IdxPicture));
        }
        let tilemap = self.tilemaps[id.0].as_mut().unwrap();
        let index = row * tilemap.cols + col;
        tilemap.tiles[index] = tile;
        tilemap.max_index = tilemap.max_index.max(tile.index);
        Ok(())
    }

    /// Copies a sub-rectangle of cells between tilemaps (or within one)
    #[allow(clippy::too_many_arguments)]
    pub fn copy_tiles(
        &mut self,
        src: TilemapId,
        src_row: usize,
        src_col: usize,
        rows: usize,
        cols: usize,
        dst: TilemapId,
        dst_row: usize,
        dst_col: usize,
    ) -> Result<()> {
        let Some((src_rows, src_cols)) = self
            .tilemaps
            .get(src.0)
            .and_then(Option::as_ref)
            .map(|t| (t.rows, t.cols))
        else {
            return Err(self.fail(Error::RefTilemap));
        };
        if src_row + rows > src_rows || src_col + cols > src_cols {
            return Err(self.fail(Error::WrongSize));
        }
        let Some((dst_rows, dst_cols)) = self
            .tilemaps
            .get(dst.0)
            .and_then(Option::as_ref)
            .map(|t| (t.rows, t.cols))
        else {
            return Err(self.fail(Error::RefTilemap));
        };
        if dst_row + rows > dst_rows || dst_col + cols > dst_cols {
            return Err(self.fail(Error::WrongSize));
        }

        let source = self.tilemaps[src.0].as_ref().unwrap();
        let mut block = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            let start = (src_row + row) * src_cols + src_col;
            block.extend_from_slice(&source.tiles[start..start + cols]);
        }
        let target = self.tilemaps[dst.0].as_mut().unwrap();
        for row in 0..rows {
            let start = (dst_row + row) * target.cols + dst_col;
            target.tiles[start..start + cols].copy_from_slice(&block[row * cols..(row + 1) * cols]);
        }
        let copied_max = block.iter().map(|t| t.index).max().unwrap_or(0);
        target.max_index = target.max_index.max(copied_max);
        Ok(())
    }

    pub fn clone_tilemap(&mut self, id: TilemapId) -> Result<TilemapId> {
        let Some(copy) = self.tilemaps.get(id.0).and_then(Option::as_ref).cloned() else {
            return Err(self.fail(Error::RefTilemap));
        };
        Ok(TilemapId(alloc_slot(&mut self.tilemaps, copy)))
    }

    pub fn delete_tilemap(&mut self, id: TilemapId) -> Result<()> {
        match self.tilemaps.get_mut(id.0).map(Option::take) {
            Some(Some(_)) => Ok(()),
            _ => Err(self.fail(Error::RefTilemap)),
        }
    }

    pub fn tilemap_rows(&self, id: TilemapId) -> Result<usize> {
        Ok(self.tilemap(id)?.rows)
    }

    pub fn tilemap_cols(&self, id: TilemapId) -> Result<usize> {
        Ok(self.tilemap(id)?.cols)
    }

    pub fn tilemap_tileset(&self, id: TilemapId) -> Result<Option<TilesetId>> {
        Ok(self.tilemap(id)?.tileset)
    }

    pub(crate) fn tilemap(&self, id: TilemapId) -> Result<&Tilemap> {
        self.tilemaps
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(Error::RefTilemap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_encoding_is_bit_exact() {
        // H-flip + priority, palette 3, tile 0x0105
        let tile = Tile::from_u32(0x9003_0105);
        assert_eq!(tile.index, 0x0105);
        assert!(tile.flags.contains(TileFlags::FLIPX));
        assert!(tile.flags.contains(TileFlags::PRIORITY));
        assert!(!tile.flags.contains(TileFlags::FLIPY));
        assert_eq!(tile.flags.palette(), 3);
        assert_eq!(tile.to_u32(), 0x9003_0105);

        // flag bit positions
        assert_eq!(TileFlags::FLIPX.bits(), 1 << 15);
        assert_eq!(TileFlags::FLIPY.bits(), 1 << 14);
        assert_eq!(TileFlags::ROTATE.bits(), 1 << 13);
        assert_eq!(TileFlags::PRIORITY.bits(), 1 << 12);
        assert_eq!(TileFlags::MASKED.bits(), 1 << 11);
    }

    #[test]
    fn test_palette_selector_replacement() {
        let flags = TileFlags::FLIPY.with_palette(7);
        assert_eq!(flags.palette(), 7);
        assert!(flags.contains(TileFlags::FLIPY));
        let flags = flags.with_palette(0);
        assert_eq!(flags.palette(), 0);
        assert!(flags.contains(TileFlags::FLIPY));
    }

    #[test]
    fn test_create_and_edit_cells() {
        let mut engine = Engine::new(32, 32, 1, 1);
        let id = engine.create_tilemap(4, 4, None, 0, None).unwrap();
        assert_eq!(engine.tilemap_rows(id).unwrap(), 4);
        assert_eq!(engine.tilemap_cols(id).unwrap(), 4);
        assert!(engine.tilemap_tile(id, 0, 0).unwrap().is_empty());

        let tile = Tile::new(9, TileFlags::FLIPX);
        engine.set_tilemap_tile(id, 2, 3, tile).unwrap();
        assert_eq!(engine.tilemap_tile(id, 2, 3).unwrap(), tile);
        assert_eq!(engine.tilemap(id).unwrap().max_index, 9);

        assert_eq!(
            engine.tilemap_tile(id, 4, 0).unwrap_err(),
            Error::IdxPicture
        );
    }

    #[test]
    fn test_cells_size_must_match() {
        let mut engine = Engine::new(32, 32, 1, 1);
        let cells = vec![Tile::default(); 5];
        assert_eq!(
            engine
                .create_tilemap(2, 4, Some(&cells), 0, None)
                .unwrap_err(),
            Error::WrongSize
        );
    }

    #[test]
    fn test_copy_tiles_subrectangle() {
        let mut engine = Engine::new(32, 32, 1, 1);
        let mut cells = vec![Tile::default(); 16];
        for (i, cell) in cells.iter_mut().enumerate() {
            cell.index = i as u16 + 1;
        }
        let src = engine.create_tilemap(4, 4, Some(&cells), 0, None).unwrap();
        let dst = engine.create_tilemap(4, 4, None, 0, None).unwrap();

        engine.copy_tiles(src, 1, 1, 2, 2, dst, 0, 0).unwrap();
        assert_eq!(engine.tilemap_tile(dst, 0, 0).unwrap().index, 6);
        assert_eq!(engine.tilemap_tile(dst, 0, 1).unwrap().index, 7);
        assert_eq!(engine.tilemap_tile(dst, 1, 0).unwrap().index, 10);
        assert_eq!(engine.tilemap_tile(dst, 1, 1).unwrap().index, 11);
        assert_eq!(engine.tilemap_tile(dst, 2, 2).unwrap().index, 0);
        assert_eq!(engine.tilemap(dst).unwrap().max_index, 11);

        assert_eq!(
            engine.copy_tiles(src, 3, 3, 2, 2, dst, 0, 0).unwrap_err(),
            Error::WrongSize
        );
    }

    #[test]
    fn test_clone_and_delete() {
        let mut engine = Engine::new(32, 32, 1, 1);
        let id = engine.create_tilemap(2, 2, None, 0x123456, None).unwrap();
        let copy = engine.clone_tilemap(id).unwrap();
        engine.delete_tilemap(id).unwrap();
        assert_eq!(engine.tilemap_rows(id), Err(Error::RefTilemap));
        assert_eq!(engine.tilemap_rows(copy), Ok(2));
    }
}
