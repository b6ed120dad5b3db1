//! X11 Window management

use std::collections::HashMap;

use crate::wire::Xid;

/// X11 Window
#[derive(Debug, Clone)]
pub struct Window {
    pub id: Xid,
    pub parent: Xid,
    /// Index of the screen the window lives on
    pub screen: usize,
    /// Position relative to the parent
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub border_width: u16,
    pub depth: u8,
    pub class: WindowClass,
    pub visual: u32,
    pub attributes: WindowAttributes,
    pub children: Vec<Xid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowClass {
    CopyFromParent,
    InputOutput,
    InputOnly,
}

impl WindowClass {
    pub fn from_wire(value: u16) -> Option<Self> {
        match value {
            0 => Some(WindowClass::CopyFromParent),
            1 => Some(WindowClass::InputOutput),
            2 => Some(WindowClass::InputOnly),
            _ => None,
        }
    }
}

/// How a window's background is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    #[default]
    None,
    /// Use the parent's background, aligned to the parent's origin
    ParentRelative,
    Pixel(u32),
    Pixmap(Xid),
}

impl Background {
    /// Decode a background-pixmap window attribute value
    pub fn from_pixmap_value(value: u32) -> Self {
        match value {
            0 => Background::None,
            1 => Background::ParentRelative,
            pixmap => Background::Pixmap(pixmap),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WindowAttributes {
    pub background: Background,
}

impl Window {
    pub fn new_root(id: Xid, screen: usize, width: u16, height: u16, depth: u8, visual: u32) -> Self {
        Self {
            id,
            parent: 0,
            screen,
            x: 0,
            y: 0,
            width,
            height,
            border_width: 0,
            depth,
            class: WindowClass::InputOutput,
            visual,
            attributes: WindowAttributes {
                background: Background::Pixel(0),
            },
            children: Vec::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Xid,
        parent: Xid,
        x: i16,
        y: i16,
        width: u16,
        height: u16,
        border_width: u16,
        depth: u8,
        class: WindowClass,
        visual: u32,
    ) -> Self {
        Self {
            id,
            parent,
            screen: 0,
            x,
            y,
            width,
            height,
            border_width,
            depth,
            class,
            visual,
            attributes: WindowAttributes::default(),
            children: Vec::new(),
        }
    }

    /// Input-only windows have no pixels and cannot be drawn to
    pub fn is_drawable(&self) -> bool {
        self.class == WindowClass::InputOutput
    }
}

/// Window tree management, one root per screen
pub struct WindowTree {
    windows: HashMap<Xid, Window>,
    roots: Vec<Xid>,
}

impl WindowTree {
    pub fn new() -> Self {
        Self {
            windows: HashMap::new(),
            roots: Vec::new(),
        }
    }

    /// Add the root window of the next screen
    pub fn add_root(&mut self, root: Window) {
        self.roots.push(root.id);
        self.windows.insert(root.id, root);
    }

    pub fn root_id(&self, screen: usize) -> Option<Xid> {
        self.roots.get(screen).copied()
    }

    pub fn is_root(&self, id: Xid) -> bool {
        self.roots.contains(&id)
    }

    pub fn get(&self, id: Xid) -> Option<&Window> {
        self.windows.get(&id)
    }

    pub fn get_mut(&mut self, id: Xid) -> Option<&mut Window> {
        self.windows.get_mut(&id)
    }

    pub fn contains(&self, id: Xid) -> bool {
        self.windows.contains_key(&id)
    }

    /// Insert a window under an existing parent.
    ///
    /// CopyFromParent class, depth and visual are resolved from the parent;
    /// the window inherits the parent's screen. Returns false if the parent
    /// does not exist.
    pub fn create_window(&mut self, mut window: Window) -> bool {
        let Some(parent) = self.windows.get_mut(&window.parent) else {
            return false;
        };
        window.screen = parent.screen;
        if window.class == WindowClass::CopyFromParent {
            window.class = parent.class;
        }
        if window.depth == 0 && window.class == WindowClass::InputOutput {
            window.depth = parent.depth;
        }
        if window.visual == 0 {
            window.visual = parent.visual;
        }
        parent.children.push(window.id);
        self.windows.insert(window.id, window);
        true
    }

    /// Remove a window and all of its descendants.
    ///
    /// Returns the destroyed ids, children before their parents.
    pub fn destroy_window(&mut self, id: Xid) -> Vec<Xid> {
        let mut destroyed = Vec::new();
        let Some(parent) = self.windows.get(&id).map(|w| w.parent) else {
            return destroyed;
        };
        if let Some(parent) = self.windows.get_mut(&parent) {
            parent.children.retain(|&child| child != id);
        }
        self.destroy_subtree(id, &mut destroyed);
        destroyed
    }

    fn destroy_subtree(&mut self, id: Xid, destroyed: &mut Vec<Xid>) {
        if let Some(window) = self.windows.remove(&id) {
            for child in window.children {
                self.destroy_subtree(child, destroyed);
            }
            destroyed.push(id);
        }
    }

    /// Non-root windows whose ids satisfy `pred`, used when a client goes away
    pub fn ids_matching(&self, pred: impl Fn(Xid) -> bool) -> Vec<Xid> {
        self.windows
            .keys()
            .copied()
            .filter(|&id| !self.is_root(id) && pred(id))
            .collect()
    }
}

impl Default for WindowTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> WindowTree {
        let mut tree = WindowTree::new();
        tree.add_root(Window::new_root(0x100, 0, 1280, 720, 24, 0x21));
        tree.add_root(Window::new_root(0x200, 1, 800, 600, 24, 0x41));
        tree
    }

    #[test]
    fn test_create_resolves_copy_from_parent() {
        let mut tree = tree();
        let win = Window::new(0x0020_0001, 0x200, 1, 2, 30, 40, 0, 0, WindowClass::CopyFromParent, 0);
        assert!(tree.create_window(win));
        let win = tree.get(0x0020_0001).unwrap();
        assert_eq!(win.class, WindowClass::InputOutput);
        assert_eq!(win.screen, 1);
        assert_eq!(win.visual, 0x41);
        assert_eq!(win.depth, 24);
        assert!(win.is_drawable());
    }

    #[test]
    fn test_create_without_parent_fails() {
        let mut tree = tree();
        let win = Window::new(0x0020_0001, 0x999, 0, 0, 1, 1, 0, 0, WindowClass::InputOnly, 0);
        assert!(!tree.create_window(win));
        assert!(!tree.contains(0x0020_0001));
    }

    #[test]
    fn test_destroy_is_recursive_children_first() {
        let mut tree = tree();
        tree.create_window(Window::new(0x0020_0001, 0x100, 0, 0, 10, 10, 0, 0, WindowClass::InputOutput, 0));
        tree.create_window(Window::new(0x0020_0002, 0x0020_0001, 0, 0, 5, 5, 0, 0, WindowClass::InputOutput, 0));
        tree.create_window(Window::new(0x0020_0003, 0x0020_0002, 0, 0, 2, 2, 0, 0, WindowClass::InputOnly, 0));

        let destroyed = tree.destroy_window(0x0020_0001);
        assert_eq!(destroyed, vec![0x0020_0003, 0x0020_0002, 0x0020_0001]);
        assert!(tree.get(0x100).unwrap().children.is_empty());
        assert!(tree.destroy_window(0x0020_0001).is_empty());
    }

    #[test]
    fn test_background_pixmap_values() {
        assert_eq!(Background::from_pixmap_value(0), Background::None);
        assert_eq!(Background::from_pixmap_value(1), Background::ParentRelative);
        assert_eq!(Background::from_pixmap_value(0x0020_0009), Background::Pixmap(0x0020_0009));
    }
}
