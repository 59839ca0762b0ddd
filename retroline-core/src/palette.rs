/// Palettes - indexed color tables
///
/// Source art is always 8-bit palette indices; palettes hold the packed
/// 32-bit colors (`0xAARRGGBB`, alpha forced opaque). Palettes live in an
/// engine-owned store of 256 id-indexed slots; layers and sprites reference
/// them by id, resolved at draw time. Re-creating an id replaces (and
/// drops) the previous palette.
use crate::blending::{self, BlendMode};
use crate::engine::Engine;
use crate::error::{Error, Result};

/// Identifier of a palette slot in the engine store
pub type PaletteId = u8;

/// Packs an opaque color in the internal pixel format
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    0xFF00_0000 | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Ordered, fixed-length table of packed colors
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<u32>,
}

impl Palette {
    pub fn new(entries: usize) -> Self {
        Self {
            colors: vec![pack_rgb(0, 0, 0); entries],
        }
    }

    pub fn entries(&self) -> usize {
        self.colors.len()
    }

    /// Color for a source pixel index. Out-of-range indices resolve to
    /// opaque black so short palettes stay safe in the inner loops.
    #[inline]
    pub fn color(&self, index: u8) -> u32 {
        self.colors
            .get(index as usize)
            .copied()
            .unwrap_or(0xFF00_0000)
    }

    pub fn set_color(&mut self, index: usize, r: u8, g: u8, b: u8) {
        self.colors[index] = pack_rgb(r, g, b);
    }
}

/// Id-indexed palette slots owned by the engine
pub(crate) struct PaletteStore {
    slots: Vec<Option<Palette>>,
}

impl PaletteStore {
    pub fn new() -> Self {
        Self {
            slots: (0..256).map(|_| None).collect(),
        }
    }

    #[inline]
    pub fn get(&self, id: PaletteId) -> Option<&Palette> {
        self.slots[id as usize].as_ref()
    }

    pub fn get_mut(&mut self, id: PaletteId) -> Option<&mut Palette> {
        self.slots[id as usize].as_mut()
    }

    pub fn insert(&mut self, id: PaletteId, palette: Palette) {
        self.slots[id as usize] = Some(palette);
    }

    pub fn remove(&mut self, id: PaletteId) -> Option<Palette> {
        self.slots[id as usize].take()
    }
}

impl Engine {
    /// Creates a color table under the given id, replacing any palette
    /// previously registered there.
    pub fn create_palette(&mut self, id: PaletteId, entries: usize) -> Result<()> {
        if entries == 0 || entries > 256 {
            return Err(self.fail(Error::WrongSize));
        }
        if self.palettes.get(id).is_some() {
            log::debug!("palette {} replaced", id);
        }
        self.palettes.insert(id, Palette::new(entries));
        Ok(())
    }

    pub fn delete_palette(&mut self, id: PaletteId) -> Result<()> {
        match self.palettes.remove(id) {
            Some(_) => Ok(()),
            None => Err(self.fail(Error::RefPalette)),
        }
    }

    /// Sets the RGB value of one palette entry
    pub fn set_palette_color(
        &mut self,
        id: PaletteId,
        index: usize,
        r: u8,
        g: u8,
        b: u8,
    ) -> Result<()> {
        let Some(entries) = self.palettes.get(id).map(Palette::entries) else {
            return Err(self.fail(Error::RefPalette));
        };
        if index >= entries {
            return Err(self.fail(Error::IdxPicture));
        }
        let palette = self.palettes.get_mut(id).unwrap();
        palette.set_color(index, r, g, b);
        Ok(())
    }

    /// Returns the packed color of one palette entry
    pub fn palette_color(&self, id: PaletteId, index: usize) -> Result<u32> {
        let palette = self.palettes.get(id).ok_or(Error::RefPalette)?;
        if index >= palette.entries() {
            return Err(Error::IdxPicture);
        }
        Ok(palette.color(index as u8))
    }

    /// Brightens a range of entries by adding a color (saturating)
    pub fn add_palette_color(
        &mut self,
        id: PaletteId,
        r: u8,
        g: u8,
        b: u8,
        start: u8,
        num: u8,
    ) -> Result<()> {
        self.edit_palette_color(id, BlendMode::Add, r, g, b, start, num)
    }

    /// Darkens a range of entries by subtracting a color (saturating)
    pub fn sub_palette_color(
        &mut self,
        id: PaletteId,
        r: u8,
        g: u8,
        b: u8,
        start: u8,
        num: u8,
    ) -> Result<()> {
        self.edit_palette_color(id, BlendMode::Sub, r, g, b, start, num)
    }

    /// Modulates a range of entries by a color (normalized product)
    pub fn mod_palette_color(
        &mut self,
        id: PaletteId,
        r: u8,
        g: u8,
        b: u8,
        start: u8,
        num: u8,
    ) -> Result<()> {
        self.edit_palette_color(id, BlendMode::Mod, r, g, b, start, num)
    }

    fn edit_palette_color(
        &mut self,
        id: PaletteId,
        mode: BlendMode,
        r: u8,
        g: u8,
        b: u8,
        start: u8,
        num: u8,
    ) -> Result<()> {
        let Some(entries) = self.palettes.get(id).map(Palette::entries) else {
            return Err(self.fail(Error::RefPalette));
        };
        if start as usize >= entries {
            return Err(self.fail(Error::IdxPicture));
        }
        let end = (start as usize + num.max(1) as usize - 1).min(entries - 1);

        let table = self
            .blend_tables
            .select(mode)
            .expect("edit modes always carry a table");
        let palette = self.palettes.get_mut(id).unwrap();
        for index in start as usize..=end {
            let color = palette.color(index as u8);
            palette.set_color(
                index,
                blending::blend(table, (color >> 16) as u8, r),
                blending::blend(table, (color >> 8) as u8, g),
                blending::blend(table, color as u8, b),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_forces_opaque_alpha() {
        assert_eq!(pack_rgb(0x12, 0x34, 0x56), 0xFF12_3456);
        assert_eq!(pack_rgb(0, 0, 0), 0xFF00_0000);
    }

    #[test]
    fn test_create_set_get() {
        let mut engine = Engine::new(32, 32, 1, 1);
        engine.create_palette(3, 16).unwrap();
        engine.set_palette_color(3, 5, 10, 20, 30).unwrap();
        assert_eq!(engine.palette_color(3, 5).unwrap(), 0xFF0A_141E);
        assert_eq!(engine.palette_color(3, 0).unwrap(), 0xFF00_0000);
    }

    #[test]
    fn test_invalid_references() {
        let mut engine = Engine::new(32, 32, 1, 1);
        assert_eq!(engine.palette_color(9, 0), Err(Error::RefPalette));
        assert_eq!(
            engine.set_palette_color(9, 0, 1, 2, 3),
            Err(Error::RefPalette)
        );
        engine.create_palette(9, 4).unwrap();
        assert_eq!(engine.palette_color(9, 4), Err(Error::IdxPicture));
        assert_eq!(engine.delete_palette(9), Ok(()));
        assert_eq!(engine.delete_palette(9), Err(Error::RefPalette));
        assert_eq!(engine.last_error(), Some(Error::RefPalette));
    }

    #[test]
    fn test_recreate_replaces() {
        let mut engine = Engine::new(32, 32, 1, 1);
        engine.create_palette(0, 8).unwrap();
        engine.set_palette_color(0, 1, 200, 0, 0).unwrap();
        engine.create_palette(0, 8).unwrap();
        assert_eq!(engine.palette_color(0, 1).unwrap(), 0xFF00_0000);
    }

    #[test]
    fn test_add_sub_range_edit() {
        let mut engine = Engine::new(32, 32, 1, 1);
        engine.create_palette(0, 4).unwrap();
        for index in 0..4 {
            engine
                .set_palette_color(0, index, 100, 50, 25)
                .unwrap();
        }
        // edit entries 1..=2 only
        engine.add_palette_color(0, 10, 10, 10, 1, 2).unwrap();
        assert_eq!(engine.palette_color(0, 0).unwrap(), 0xFF64_3219);
        assert_eq!(engine.palette_color(0, 1).unwrap(), 0xFF6E_3C23);
        assert_eq!(engine.palette_color(0, 2).unwrap(), 0xFF6E_3C23);
        assert_eq!(engine.palette_color(0, 3).unwrap(), 0xFF64_3219);

        engine.sub_palette_color(0, 10, 10, 10, 1, 2).unwrap();
        assert_eq!(engine.palette_color(0, 1).unwrap(), 0xFF64_3219);
    }

    #[test]
    fn test_sub_saturates_at_zero() {
        let mut engine = Engine::new(32, 32, 1, 1);
        engine.create_palette(0, 2).unwrap();
        engine.set_palette_color(0, 1, 50, 0, 0).unwrap();
        engine.sub_palette_color(0, 100, 0, 0, 1, 1).unwrap();
        assert_eq!(engine.palette_color(0, 1).unwrap(), 0xFF00_0000);
        // adding the same color back does not restore the original
        engine.add_palette_color(0, 100, 0, 0, 1, 1).unwrap();
        assert_eq!(engine.palette_color(0, 1).unwrap(), 0xFF64_0000);
    }

    #[test]
    fn test_mod_darkens() {
        let mut engine = Engine::new(32, 32, 1, 1);
        engine.create_palette(0, 2).unwrap();
        engine.set_palette_color(0, 0, 200, 100, 255).unwrap();
        engine.mod_palette_color(0, 128, 128, 128, 0, 1).unwrap();
        assert_eq!(engine.palette_color(0, 0).unwrap(), 0xFF64_3280);
    }
}
