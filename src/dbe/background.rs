//! Painting a window's background into a back buffer

use crate::gc::{FillStyle, GCValue, GC};
use crate::wire::Xid;
use crate::window::{Background, WindowTree};

/// What a prepared GC fills with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Solid(u32),
    /// Tile pixmap with the tile origin relative to the window
    Tiled { tile: Xid, x: i32, y: i32 },
}

impl Fill {
    pub fn from_gc(gc: &GC) -> Option<Self> {
        match gc.fill_style {
            FillStyle::Solid => Some(Fill::Solid(gc.foreground)),
            FillStyle::Tiled => Some(Fill::Tiled {
                tile: gc.tile,
                x: gc.tile_stipple_x,
                y: gc.tile_stipple_y,
            }),
            FillStyle::Stippled | FillStyle::OpaqueStippled => None,
        }
    }
}

/// Set up `gc` so that filling the window paints its background.
///
/// A parent-relative background is taken from the nearest ancestor with a
/// background of its own, shifting the tile origin by each window's offset.
/// Returns false for a window without background or an unknown window.
pub fn setup_background_painter(windows: &WindowTree, window: Xid, gc: &mut GC) -> bool {
    let Some(mut win) = windows.get(window) else {
        return false;
    };
    let (mut x, mut y) = (0i32, 0i32);
    while win.attributes.background == Background::ParentRelative {
        x -= i32::from(win.x);
        y -= i32::from(win.y);
        match windows.get(win.parent) {
            Some(parent) => win = parent,
            None => return false,
        }
    }

    let values = match win.attributes.background {
        Background::None | Background::ParentRelative => return false,
        Background::Pixel(pixel) => vec![GCValue::Foreground(pixel), GCValue::FillStyle(FillStyle::Solid)],
        Background::Pixmap(tile) => vec![
            GCValue::FillStyle(FillStyle::Tiled),
            GCValue::Tile(tile),
            GCValue::TileStippleOrigin(x, y),
        ],
    };
    gc.change(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{Window, WindowClass};

    fn tree() -> WindowTree {
        let mut windows = WindowTree::new();
        windows.add_root(Window::new_root(0x100, 0, 640, 480, 24, 0x21));
        for (id, parent, x, y) in [(0x1, 0x100, 10, 20), (0x2, 0x1, 3, 4), (0x3, 0x2, 1, 1)] {
            windows.create_window(Window::new(id, parent, x, y, 50, 50, 0, 0, WindowClass::InputOutput, 0));
        }
        windows
    }

    fn set_background(windows: &mut WindowTree, id: Xid, background: Background) {
        windows.get_mut(id).unwrap().attributes.background = background;
    }

    #[test]
    fn test_pixel_background() {
        let mut windows = tree();
        set_background(&mut windows, 0x1, Background::Pixel(0xff00ff));
        let mut gc = GC::new(0x50, 0x1);
        assert!(setup_background_painter(&windows, 0x1, &mut gc));
        assert_eq!(Fill::from_gc(&gc), Some(Fill::Solid(0xff00ff)));
    }

    #[test]
    fn test_no_background() {
        let windows = tree();
        let mut gc = GC::new(0x50, 0x1);
        assert!(!setup_background_painter(&windows, 0x1, &mut gc));
        assert!(!setup_background_painter(&windows, 0x999, &mut gc));
        assert_eq!(gc, GC::new(0x50, 0x1));
    }

    #[test]
    fn test_parent_relative_walks_up() {
        let mut windows = tree();
        set_background(&mut windows, 0x1, Background::Pixmap(0x77));
        set_background(&mut windows, 0x2, Background::ParentRelative);
        set_background(&mut windows, 0x3, Background::ParentRelative);
        let mut gc = GC::new(0x50, 0x3);
        assert!(setup_background_painter(&windows, 0x3, &mut gc));
        assert_eq!(Fill::from_gc(&gc), Some(Fill::Tiled { tile: 0x77, x: -4, y: -5 }));
    }

    #[test]
    fn test_parent_relative_to_root_pixel() {
        let mut windows = tree();
        set_background(&mut windows, 0x1, Background::ParentRelative);
        let mut gc = GC::new(0x50, 0x1);
        assert!(setup_background_painter(&windows, 0x1, &mut gc));
        assert_eq!(Fill::from_gc(&gc), Some(Fill::Solid(0)));
    }
}
