//! X11 Graphics Context

use crate::wire::Xid;

/// Graphics Context - holds the fill state used to paint back buffers
#[derive(Debug, Clone, PartialEq)]
pub struct GC {
    pub id: Xid,
    pub drawable: Xid,
    pub foreground: u32,
    pub background: u32,
    pub fill_style: FillStyle,
    pub tile: Xid,
    pub tile_stipple_x: i32,
    pub tile_stipple_y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStyle {
    Solid = 0,
    Tiled = 1,
    Stippled = 2,
    OpaqueStippled = 3,
}

/// One GC attribute change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GCValue {
    Foreground(u32),
    FillStyle(FillStyle),
    Tile(Xid),
    TileStippleOrigin(i32, i32),
}

impl Default for GC {
    fn default() -> Self {
        Self {
            id: 0,
            drawable: 0,
            foreground: 0,
            background: 1,
            fill_style: FillStyle::Solid,
            tile: 0,
            tile_stipple_x: 0,
            tile_stipple_y: 0,
        }
    }
}

impl GC {
    pub fn new(id: Xid, drawable: Xid) -> Self {
        Self {
            id,
            drawable,
            ..Default::default()
        }
    }

    /// Apply a batch of attribute changes.
    ///
    /// A tiled fill without a tile pixmap is rejected and leaves the GC untouched.
    pub fn change(&mut self, values: &[GCValue]) -> bool {
        let mut next = self.clone();
        for value in values {
            match *value {
                GCValue::Foreground(pixel) => next.foreground = pixel,
                GCValue::FillStyle(style) => next.fill_style = style,
                GCValue::Tile(pixmap) => next.tile = pixmap,
                GCValue::TileStippleOrigin(x, y) => {
                    next.tile_stipple_x = x;
                    next.tile_stipple_y = y;
                }
            }
        }
        if next.fill_style == FillStyle::Tiled && next.tile == 0 {
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_applies_all_values() {
        let mut gc = GC::new(1, 2);
        assert!(gc.change(&[
            GCValue::FillStyle(FillStyle::Tiled),
            GCValue::Tile(0x0020_0004),
            GCValue::TileStippleOrigin(-3, -4),
        ]));
        assert_eq!(gc.fill_style, FillStyle::Tiled);
        assert_eq!(gc.tile, 0x0020_0004);
        assert_eq!((gc.tile_stipple_x, gc.tile_stipple_y), (-3, -4));
    }

    #[test]
    fn test_tiled_without_tile_rejected() {
        let mut gc = GC::new(1, 2);
        assert!(!gc.change(&[GCValue::Foreground(5), GCValue::FillStyle(FillStyle::Tiled)]));
        assert_eq!(gc, GC::new(1, 2));
    }
}
