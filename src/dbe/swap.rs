//! SwapBuffers: batch validation and the backend negotiation loop

use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::objects::ServerObjects;
use crate::wire::Xid;

use super::backend::SwapInfo;
use super::{DbeExtension, SwapAction};

/// Most entries a SwapBuffers request can carry: the request length field
/// counts 4-byte units, the header is 8 bytes and each entry 8.
pub const MAX_SWAP_ENTRIES: usize = (u16::MAX as usize * 4 - 8) / 8;

/// One (window, action) pair as decoded from the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapEntry {
    pub window: Xid,
    pub swap_action: u8,
}

impl DbeExtension {
    /// SwapBuffers
    ///
    /// The whole batch is validated before anything is swapped. The backend
    /// of the first pending window's screen then gets the remaining entries,
    /// pass after pass, until none are left; swaps done before a backend
    /// error stay done.
    pub fn swap_buffers(
        &mut self,
        objects: &ServerObjects,
        entries: &[SwapEntry],
    ) -> Result<(), ProtocolError> {
        if entries.is_empty() {
            return Ok(());
        }
        if entries.len() > MAX_SWAP_ENTRIES {
            return Err(ProtocolError::Alloc);
        }

        // occurrences not yet visited, to spot a window listed again later
        let mut remaining: HashMap<Xid, usize> = HashMap::new();
        for entry in entries {
            *remaining.entry(entry.window).or_default() += 1;
        }

        let mut swaps = Vec::with_capacity(entries.len());
        for entry in entries {
            objects.lookup_window(entry.window)?;
            if !self.records.contains_key(&entry.window) {
                return Err(ProtocolError::Match);
            }
            let later = remaining.get_mut(&entry.window).map_or(0, |n| {
                *n -= 1;
                *n
            });
            if later > 0 {
                return Err(ProtocolError::Match);
            }
            let swap_action = SwapAction::try_from(entry.swap_action)?;
            swaps.push(SwapInfo {
                window: entry.window,
                swap_action,
            });
        }

        // each pass goes to the screen of the first window still pending
        while let Some(first) = swaps.first() {
            let screen = self.records[&first.window].screen;
            let before = swaps.len();
            let backend = self.backend_mut(screen).ok_or(ProtocolError::Match)?;
            backend.swap_buffers(&objects.windows, &mut swaps)?;
            if swaps.len() >= before {
                log::error!(
                    "SwapBuffers: backend of screen {} made no progress with {} windows left",
                    screen,
                    before
                );
                return Err(ProtocolError::Implementation);
            }
        }
        log::debug!("SwapBuffers: {} windows swapped", entries.len());
        Ok(())
    }
}
