//! Server-side objects shared by the core protocol and extensions

use crate::client::Client;
use crate::drawable::{DrawableRef, DrawableType, PixmapStore};
use crate::error::ProtocolError;
use crate::resource::ResourceTable;
use crate::wire::Xid;
use crate::window::{Window, WindowTree};

/// TrueColor visual class
pub const TRUE_COLOR: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualType {
    pub id: u32,
    pub class: u8,
    pub bits_per_rgb: u8,
    pub colormap_entries: u16,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
}

impl VisualType {
    pub fn true_color(id: u32) -> Self {
        Self {
            id,
            class: TRUE_COLOR,
            bits_per_rgb: 8,
            colormap_entries: 256,
            red_mask: 0x00ff_0000,
            green_mask: 0x0000_ff00,
            blue_mask: 0x0000_00ff,
        }
    }
}

/// A display surface and the visuals it offers at its root depth
#[derive(Debug, Clone)]
pub struct ScreenInfo {
    pub root: Xid,
    pub default_colormap: Xid,
    pub width: u16,
    pub height: u16,
    pub root_depth: u8,
    pub root_visual: u32,
    pub visuals: Vec<VisualType>,
}

/// Windows, pixmaps and the resource table, passed by reference into every
/// request handler.
pub struct ServerObjects {
    pub screens: Vec<ScreenInfo>,
    pub windows: WindowTree,
    pub pixmaps: PixmapStore,
    pub resources: ResourceTable,
}

impl ServerObjects {
    pub fn new(screens: Vec<ScreenInfo>, resource_limit: Option<usize>) -> Self {
        let mut windows = WindowTree::new();
        for (index, screen) in screens.iter().enumerate() {
            windows.add_root(Window::new_root(
                screen.root,
                index,
                screen.width,
                screen.height,
                screen.root_depth,
                screen.root_visual,
            ));
        }
        Self {
            screens,
            windows,
            pixmaps: PixmapStore::new(),
            resources: ResourceTable::new(resource_limit),
        }
    }

    pub fn is_id_in_use(&self, id: Xid) -> bool {
        self.windows.contains(id) || self.pixmaps.contains(id) || self.resources.contains(id)
    }

    /// A new resource id must be in the client's range and not in use
    pub fn legal_new_resource(&self, client: &Client, id: Xid) -> Result<(), ProtocolError> {
        if !client.owns_id(id) || self.is_id_in_use(id) {
            return Err(ProtocolError::IdChoice(id));
        }
        Ok(())
    }

    pub fn lookup_window(&self, id: Xid) -> Result<&Window, ProtocolError> {
        self.windows.get(id).ok_or(ProtocolError::Window(id))
    }

    pub fn lookup_drawable(&self, id: Xid) -> Result<DrawableRef, ProtocolError> {
        if let Some(window) = self.windows.get(id) {
            return Ok(DrawableRef {
                id,
                kind: DrawableType::Window,
                screen: window.screen,
            });
        }
        if let Some(pixmap) = self.pixmaps.get(id) {
            return Ok(DrawableRef {
                id,
                kind: DrawableType::Pixmap,
                screen: pixmap.screen,
            });
        }
        Err(ProtocolError::Drawable(id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::wire::ByteOrder;

    /// Two screens: screen 0 with visuals 0x21 and 0x22, screen 1 with 0x41
    pub(crate) fn two_screens() -> Vec<ScreenInfo> {
        vec![
            ScreenInfo {
                root: 0x100,
                default_colormap: 0x101,
                width: 1280,
                height: 720,
                root_depth: 24,
                root_visual: 0x21,
                visuals: vec![VisualType::true_color(0x21), VisualType::true_color(0x22)],
            },
            ScreenInfo {
                root: 0x200,
                default_colormap: 0x201,
                width: 800,
                height: 600,
                root_depth: 24,
                root_visual: 0x41,
                visuals: vec![VisualType::true_color(0x41)],
            },
        ]
    }

    #[test]
    fn test_legal_new_resource() {
        let objects = ServerObjects::new(two_screens(), None);
        let client = Client::new(1, ByteOrder::LittleEndian);
        assert!(objects.legal_new_resource(&client, 0x0020_0001).is_ok());
        assert_eq!(
            objects.legal_new_resource(&client, 0x0040_0001),
            Err(ProtocolError::IdChoice(0x0040_0001))
        );
    }

    #[test]
    fn test_lookup_drawable_screens() {
        let mut objects = ServerObjects::new(two_screens(), None);
        objects.pixmaps.create(0x0020_0005, 1, 4, 4, 24);
        assert_eq!(objects.lookup_drawable(0x200).unwrap().screen, 1);
        let pixmap = objects.lookup_drawable(0x0020_0005).unwrap();
        assert_eq!(pixmap.kind, DrawableType::Pixmap);
        assert_eq!(pixmap.screen, 1);
        assert_eq!(objects.lookup_drawable(7), Err(ProtocolError::Drawable(7)));
        assert_eq!(objects.lookup_window(7).unwrap_err(), ProtocolError::Window(7));
    }
}
