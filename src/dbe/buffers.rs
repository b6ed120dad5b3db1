//! Back buffer names: allocation, deallocation and resource cleanup

use crate::client::Client;
use crate::error::ProtocolError;
use crate::objects::ServerObjects;
use crate::resource::{FreedResource, ResourceTable, ResourceType};
use crate::wire::Xid;
use crate::window::Window;

use super::ids::BufferIds;
use super::{DbeExtension, DbeScreen, SwapAction};

/// Double-buffer state of one window.
///
/// Exists exactly while the window has at least one live buffer id.
#[derive(Debug, Clone)]
pub struct WindowBufferRecord {
    pub window: Xid,
    pub screen: usize,
    /// Geometry when the first buffer was allocated
    pub width: u16,
    pub height: u16,
    pub x: i16,
    pub y: i16,
    /// Swap action of the most recent successful allocation
    pub swap_action: SwapAction,
    pub ids: BufferIds,
}

impl WindowBufferRecord {
    fn new(window: &Window) -> Self {
        Self {
            window: window.id,
            screen: window.screen,
            width: window.width,
            height: window.height,
            x: window.x,
            y: window.y,
            swap_action: SwapAction::Undefined,
            ids: BufferIds::new(),
        }
    }
}

/// Register both resource entries of a new buffer id, or neither
fn register_buffer(
    resources: &mut ResourceTable,
    drawable_type: ResourceType,
    window_priv_type: ResourceType,
    buffer: Xid,
    window: Xid,
) -> bool {
    if !resources.add(buffer, drawable_type, window) {
        return false;
    }
    if !resources.add(buffer, window_priv_type, window) {
        resources.free_type(buffer, drawable_type);
        return false;
    }
    true
}

impl DbeExtension {
    /// AllocateBackBufferName
    ///
    /// Checks run in protocol order: window, window class, swap action, id
    /// choice, then the window's visual against the screen's list.
    pub fn allocate_back_buffer_name(
        &mut self,
        objects: &mut ServerObjects,
        client: &Client,
        window: Xid,
        buffer: Xid,
        swap_action: u8,
    ) -> Result<(), ProtocolError> {
        let win = objects.lookup_window(window)?;
        if !win.is_drawable() {
            return Err(ProtocolError::Match);
        }
        let swap_action = SwapAction::try_from(swap_action)?;
        objects.legal_new_resource(client, buffer)?;

        let Some(backend) = self.screens.get_mut(win.screen).and_then(DbeScreen::backend_mut) else {
            return Err(ProtocolError::Match);
        };
        let visuals = backend.visual_info(win.screen)?;
        if !visuals.iter().any(|v| v.visual == win.visual) {
            return Err(ProtocolError::Match);
        }

        let record = self
            .records
            .entry(window)
            .or_insert_with(|| WindowBufferRecord::new(win));
        let slot = record.ids.reserve_slot();

        if let Err(err) = backend.allocate_back_buffer(win, buffer, swap_action) {
            if record.ids.is_empty() {
                self.records.remove(&window);
            }
            return Err(err);
        }

        if !register_buffer(
            &mut objects.resources,
            self.drawable_type,
            self.window_priv_type,
            buffer,
            window,
        ) {
            // the backend already backs this id; let it release it
            backend.delete_window_priv(record, buffer);
            if record.ids.is_empty() {
                self.records.remove(&window);
                return Err(ProtocolError::Alloc);
            }
            log::warn!(
                "AllocateBackBufferName: could not register {:#x}, window {:#x} keeps {} buffers",
                buffer,
                window,
                record.ids.len()
            );
            return Ok(());
        }

        record.ids.fill_slot(slot, buffer);
        record.swap_action = swap_action;
        log::debug!(
            "AllocateBackBufferName: {:#x} for window {:#x} ({:?}, {} ids)",
            buffer,
            window,
            swap_action,
            record.ids.len()
        );
        Ok(())
    }

    /// DeallocateBackBufferName
    pub fn deallocate_back_buffer_name(
        &mut self,
        objects: &mut ServerObjects,
        buffer: Xid,
    ) -> Result<(), ProtocolError> {
        let window = objects
            .resources
            .lookup(buffer, self.window_priv_type)
            .ok_or(ProtocolError::Buffer(buffer))?;
        objects
            .resources
            .lookup(buffer, self.drawable_type)
            .ok_or(ProtocolError::Buffer(buffer))?;

        let owned = self
            .records
            .get(&window)
            .is_some_and(|record| record.ids.contains(buffer));
        if !owned {
            return Err(ProtocolError::Buffer(buffer));
        }

        self.free_buffer(&mut objects.resources, buffer);
        log::debug!("DeallocateBackBufferName: {:#x} of window {:#x}", buffer, window);
        Ok(())
    }

    /// Window id a buffer belongs to, if `buffer` names a live back buffer
    pub fn buffer_window(&self, resources: &ResourceTable, buffer: Xid) -> Option<Xid> {
        let window = resources.lookup(buffer, self.window_priv_type)?;
        self.records.get(&window).map(|record| record.window)
    }

    /// Free every resource entry of `buffer` and deliver each deletion
    pub fn free_buffer(&mut self, resources: &mut ResourceTable, buffer: Xid) {
        for freed in resources.free(buffer) {
            self.resource_deleted(freed);
        }
    }

    /// Deletion callback for the extension's resource types.
    ///
    /// The two entries of a buffer id may be deleted in either order. The
    /// drawable entry is a marker; all cleanup hangs off the window entry.
    pub fn resource_deleted(&mut self, freed: FreedResource) {
        if freed.rtype == self.window_priv_type {
            // an id that was already removed is harmless here
            self.window_priv_delete(freed.value, freed.id);
        }
    }

    /// Remove `buffer` from `window`'s record, notify the backend, and drop
    /// the record once its last id is gone. Returns false if `buffer` was
    /// not listed on the window.
    fn window_priv_delete(&mut self, window: Xid, buffer: Xid) -> bool {
        let Some(record) = self.records.get_mut(&window) else {
            log::warn!("buffer {:#x}: window {:#x} has no buffer record", buffer, window);
            return false;
        };
        if !record.ids.remove(buffer) {
            log::warn!("buffer {:#x} not found on window {:#x}", buffer, window);
            return false;
        }

        if let Some(backend) = self.screens.get_mut(record.screen).and_then(DbeScreen::backend_mut) {
            backend.delete_window_priv(record, buffer);
        }

        if record.ids.is_empty() {
            self.records.remove(&window);
            log::debug!("window {:#x} is no longer double buffered", window);
        }
        true
    }

    /// The window is being destroyed: free its buffer ids one at a time until
    /// the record goes away with the last of them.
    pub fn window_destroyed(&mut self, resources: &mut ResourceTable, window: Xid) {
        while let Some(first) = self.records.get(&window).and_then(|r| r.ids.first()) {
            let freed = resources.free(first);
            let delivered = freed.iter().any(|f| f.rtype == self.window_priv_type);
            for f in freed {
                self.resource_deleted(f);
            }
            if !delivered {
                // the table lost this id; drop it directly so the loop advances
                self.window_priv_delete(window, first);
            }
        }
    }
}
