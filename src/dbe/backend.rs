//! Per-screen backend interface
//!
//! A screen either implements every double-buffer operation or none of them.
//! That is expressed as [`DbeScreen::Capable`] holding a [`DbeBackend`], or
//! [`DbeScreen::Stubbed`]; a partially implemented screen cannot be built.

use crate::error::ProtocolError;
use crate::gc::GC;
use crate::wire::Xid;
use crate::window::{Window, WindowTree};

use super::background;
use super::buffers::WindowBufferRecord;
use super::SwapAction;

/// A visual that can be double buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisualInfo {
    pub visual: u32,
    pub depth: u8,
    /// Relative performance, higher is better
    pub perf_level: u8,
}

/// One window of a SwapBuffers batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapInfo {
    pub window: Xid,
    pub swap_action: SwapAction,
}

pub trait DbeBackend {
    /// Every double-bufferable visual of `screen`.
    ///
    /// Failing to build the list is reported as `ProtocolError::Alloc`.
    fn visual_info(&self, screen: usize) -> Result<Vec<VisualInfo>, ProtocolError>;

    /// Back `buffer` with storage for `window`.
    ///
    /// All ids of one window name the same back buffer, so this is called
    /// once per id but only the first call needs to allocate.
    fn allocate_back_buffer(
        &mut self,
        window: &Window,
        buffer: Xid,
        swap_action: SwapAction,
    ) -> Result<(), ProtocolError>;

    /// Swap the windows this backend knows how to handle.
    ///
    /// Handled entries are removed from `swaps`; the caller calls again with
    /// whatever remains. Swaps already performed are not rolled back when an
    /// error is returned.
    fn swap_buffers(
        &mut self,
        windows: &WindowTree,
        swaps: &mut Vec<SwapInfo>,
    ) -> Result<(), ProtocolError>;

    /// `buffer` was removed from `record`; release whatever backs it.
    /// When `record` has no ids left the window's back buffer can go.
    fn delete_window_priv(&mut self, record: &WindowBufferRecord, buffer: Xid);

    /// Prepare `gc` to paint `window`'s background into a back buffer.
    /// Returns false when the window has no background to paint.
    fn setup_background_painter(&self, windows: &WindowTree, window: Xid, gc: &mut GC) -> bool {
        background::setup_background_painter(windows, window, gc)
    }
}

pub enum DbeScreen {
    Capable(Box<dyn DbeBackend>),
    Stubbed,
}

impl DbeScreen {
    pub fn capable(backend: impl DbeBackend + 'static) -> Self {
        DbeScreen::Capable(Box::new(backend))
    }

    pub fn supports_double_buffering(&self) -> bool {
        matches!(self, DbeScreen::Capable(_))
    }

    pub fn backend(&self) -> Option<&dyn DbeBackend> {
        match self {
            DbeScreen::Capable(backend) => Some(backend.as_ref()),
            DbeScreen::Stubbed => None,
        }
    }

    pub fn backend_mut(&mut self) -> Option<&mut dyn DbeBackend> {
        match self {
            DbeScreen::Capable(backend) => Some(backend.as_mut()),
            DbeScreen::Stubbed => None,
        }
    }
}

impl std::fmt::Debug for DbeScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbeScreen::Capable(_) => f.write_str("Capable"),
            DbeScreen::Stubbed => f.write_str("Stubbed"),
        }
    }
}
