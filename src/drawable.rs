//! X11 Drawables (Windows and Pixmaps)

use std::collections::HashMap;

use crate::wire::Xid;

/// A drawable is either a window or a pixmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawableType {
    Window,
    Pixmap,
}

/// What a drawable lookup resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawableRef {
    pub id: Xid,
    pub kind: DrawableType,
    pub screen: usize,
}

/// Pixmap data
#[derive(Debug)]
pub struct Pixmap {
    pub id: Xid,
    pub screen: usize,
    pub width: u16,
    pub height: u16,
    pub depth: u8,
}

/// Manages pixmaps
pub struct PixmapStore {
    pixmaps: HashMap<Xid, Pixmap>,
}

impl PixmapStore {
    pub fn new() -> Self {
        Self {
            pixmaps: HashMap::new(),
        }
    }

    pub fn create(&mut self, id: Xid, screen: usize, width: u16, height: u16, depth: u8) {
        self.pixmaps.insert(id, Pixmap {
            id,
            screen,
            width,
            height,
            depth,
        });
    }

    pub fn get(&self, id: Xid) -> Option<&Pixmap> {
        self.pixmaps.get(&id)
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.pixmaps.contains_key(&id)
    }

    pub fn free(&mut self, id: Xid) -> Option<Pixmap> {
        self.pixmaps.remove(&id)
    }

    /// Free every pixmap whose id satisfies `pred`
    pub fn free_matching(&mut self, pred: impl Fn(Xid) -> bool) -> usize {
        let before = self.pixmaps.len();
        self.pixmaps.retain(|&id, _| !pred(id));
        before - self.pixmaps.len()
    }
}

impl Default for PixmapStore {
    fn default() -> Self {
        Self::new()
    }
}
