//! In-memory double-buffer backend
//!
//! Keeps one back buffer per window and models the contents of both buffers
//! instead of pixels, which is enough to observe every swap action.

use std::collections::HashMap;

use crate::error::ProtocolError;
use crate::gc::GC;
use crate::wire::Xid;
use crate::window::{Window, WindowTree};

use super::background::Fill;
use super::backend::{DbeBackend, SwapInfo, VisualInfo};
use super::buffers::WindowBufferRecord;
use super::SwapAction;

/// How many entries one `swap_buffers` call handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapPolicy {
    /// The first remaining entry only
    OnePerCall,
    /// Every remaining entry on the first entry's screen
    #[default]
    SameScreen,
}

/// Contents of a front or back buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Contents {
    #[default]
    Undefined,
    /// Painted with the window background
    Cleared(Fill),
    /// A frame drawn by the client
    Frame(u32),
}

#[derive(Debug, Default)]
struct BufferPair {
    front: Contents,
    back: Contents,
}

pub struct SoftwareBackend {
    screen: usize,
    visuals: Vec<VisualInfo>,
    policy: SwapPolicy,
    buffers: HashMap<Xid, BufferPair>,
    swap_calls: usize,
}

impl SoftwareBackend {
    pub fn new(screen: usize, visuals: Vec<VisualInfo>, policy: SwapPolicy) -> Self {
        Self {
            screen,
            visuals,
            policy,
            buffers: HashMap::new(),
            swap_calls: 0,
        }
    }

    /// Render `frame` into the window's back buffer
    pub fn draw(&mut self, window: Xid, frame: u32) -> bool {
        match self.buffers.get_mut(&window) {
            Some(pair) => {
                pair.back = Contents::Frame(frame);
                true
            }
            None => false,
        }
    }

    pub fn front(&self, window: Xid) -> Option<Contents> {
        self.buffers.get(&window).map(|pair| pair.front)
    }

    pub fn back(&self, window: Xid) -> Option<Contents> {
        self.buffers.get(&window).map(|pair| pair.back)
    }

    pub fn has_back_buffer(&self, window: Xid) -> bool {
        self.buffers.contains_key(&window)
    }

    pub fn swap_calls(&self) -> usize {
        self.swap_calls
    }

    fn swap_one(&mut self, windows: &WindowTree, info: SwapInfo) -> Result<(), ProtocolError> {
        let cleared = if info.swap_action == SwapAction::Background {
            let mut gc = GC::new(0, info.window);
            if self.setup_background_painter(windows, info.window, &mut gc) {
                Fill::from_gc(&gc).map(Contents::Cleared)
            } else {
                None
            }
        } else {
            None
        };

        let Some(pair) = self.buffers.get_mut(&info.window) else {
            log::warn!("screen {}: window {:#x} has no back buffer here", self.screen, info.window);
            return Err(ProtocolError::Match);
        };
        match info.swap_action {
            SwapAction::Undefined => {
                pair.front = pair.back;
                pair.back = Contents::Undefined;
            }
            SwapAction::Background => {
                pair.front = pair.back;
                // without a background the old contents stay
                if let Some(cleared) = cleared {
                    pair.back = cleared;
                }
            }
            SwapAction::Untouched => std::mem::swap(&mut pair.front, &mut pair.back),
            SwapAction::Copied => pair.front = pair.back,
        }
        Ok(())
    }
}

impl DbeBackend for SoftwareBackend {
    fn visual_info(&self, _screen: usize) -> Result<Vec<VisualInfo>, ProtocolError> {
        Ok(self.visuals.clone())
    }

    fn allocate_back_buffer(
        &mut self,
        window: &Window,
        buffer: Xid,
        _swap_action: SwapAction,
    ) -> Result<(), ProtocolError> {
        if window.screen != self.screen {
            return Err(ProtocolError::Match);
        }
        if !self.buffers.contains_key(&window.id) {
            log::debug!("screen {}: back buffer for window {:#x} ({:#x})", self.screen, window.id, buffer);
            self.buffers.insert(window.id, BufferPair::default());
        }
        Ok(())
    }

    fn swap_buffers(
        &mut self,
        windows: &WindowTree,
        swaps: &mut Vec<SwapInfo>,
    ) -> Result<(), ProtocolError> {
        self.swap_calls += 1;
        let Some(first) = swaps.first().copied() else {
            return Ok(());
        };

        match self.policy {
            SwapPolicy::OnePerCall => {
                self.swap_one(windows, first)?;
                swaps.remove(0);
            }
            SwapPolicy::SameScreen => {
                let screen_of = |info: &SwapInfo| windows.get(info.window).map(|w| w.screen);
                let screen = screen_of(&first);
                let mut pending = std::mem::take(swaps).into_iter();
                let mut result = Ok(());
                for info in pending.by_ref() {
                    if screen_of(&info) != screen {
                        swaps.push(info);
                    } else if let Err(e) = self.swap_one(windows, info) {
                        swaps.push(info);
                        result = Err(e);
                        break;
                    }
                }
                // entries after a failure were never looked at
                swaps.extend(pending);
                return result;
            }
        }
        Ok(())
    }

    fn delete_window_priv(&mut self, record: &WindowBufferRecord, buffer: Xid) {
        if record.ids.is_empty() && self.buffers.remove(&record.window).is_some() {
            log::debug!(
                "screen {}: released back buffer of window {:#x} with {:#x}",
                self.screen,
                record.window,
                buffer
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{Background, WindowClass};

    const WIN: Xid = 0x0020_0001;
    const WIN2: Xid = 0x0020_0002;

    fn tree() -> WindowTree {
        let mut windows = WindowTree::new();
        windows.add_root(Window::new_root(0x100, 0, 640, 480, 24, 0x21));
        for id in [WIN, WIN2] {
            windows.create_window(Window::new(id, 0x100, 0, 0, 10, 10, 0, 0, WindowClass::InputOutput, 0));
        }
        windows
    }

    fn backend(policy: SwapPolicy, windows: &WindowTree) -> SoftwareBackend {
        let visuals = vec![VisualInfo {
            visual: 0x21,
            depth: 24,
            perf_level: 1,
        }];
        let mut backend = SoftwareBackend::new(0, visuals, policy);
        for id in [WIN, WIN2] {
            let window = windows.get(id).unwrap();
            backend.allocate_back_buffer(window, id + 0x100, SwapAction::Undefined).unwrap();
        }
        backend
    }

    fn swap(backend: &mut SoftwareBackend, windows: &WindowTree, window: Xid, action: SwapAction) {
        let mut swaps = vec![SwapInfo {
            window,
            swap_action: action,
        }];
        backend.swap_buffers(windows, &mut swaps).unwrap();
        assert!(swaps.is_empty());
    }

    #[test]
    fn test_swap_actions() {
        let windows = tree();
        let mut b = backend(SwapPolicy::OnePerCall, &windows);

        b.draw(WIN, 1);
        swap(&mut b, &windows, WIN, SwapAction::Untouched);
        assert_eq!(b.front(WIN), Some(Contents::Frame(1)));
        assert_eq!(b.back(WIN), Some(Contents::Undefined));

        b.draw(WIN, 2);
        swap(&mut b, &windows, WIN, SwapAction::Untouched);
        assert_eq!(b.back(WIN), Some(Contents::Frame(1)));

        swap(&mut b, &windows, WIN, SwapAction::Copied);
        assert_eq!(b.front(WIN), Some(Contents::Frame(1)));
        assert_eq!(b.back(WIN), Some(Contents::Frame(1)));

        swap(&mut b, &windows, WIN, SwapAction::Undefined);
        assert_eq!(b.back(WIN), Some(Contents::Undefined));
    }

    #[test]
    fn test_background_action_paints_back_buffer() {
        let mut windows = tree();
        windows.get_mut(WIN).unwrap().attributes.background = Background::Pixel(0x336699);
        let mut b = backend(SwapPolicy::OnePerCall, &windows);

        b.draw(WIN, 5);
        swap(&mut b, &windows, WIN, SwapAction::Background);
        assert_eq!(b.front(WIN), Some(Contents::Frame(5)));
        assert_eq!(b.back(WIN), Some(Contents::Cleared(Fill::Solid(0x336699))));

        // no background: the back buffer keeps its contents
        b.draw(WIN2, 6);
        swap(&mut b, &windows, WIN2, SwapAction::Background);
        assert_eq!(b.back(WIN2), Some(Contents::Frame(6)));
    }

    #[test]
    fn test_policies() {
        let windows = tree();
        let batch = || {
            vec![
                SwapInfo { window: WIN, swap_action: SwapAction::Copied },
                SwapInfo { window: WIN2, swap_action: SwapAction::Copied },
            ]
        };

        let mut one = backend(SwapPolicy::OnePerCall, &windows);
        let mut swaps = batch();
        one.swap_buffers(&windows, &mut swaps).unwrap();
        assert_eq!(swaps.len(), 1);
        assert_eq!(swaps[0].window, WIN2);

        let mut all = backend(SwapPolicy::SameScreen, &windows);
        let mut swaps = batch();
        all.swap_buffers(&windows, &mut swaps).unwrap();
        assert!(swaps.is_empty());
        assert_eq!(all.swap_calls(), 1);
    }

    #[test]
    fn test_failed_swap_keeps_unhandled_entries() {
        const OTHER: Xid = 0x0020_0003;
        const BARE: Xid = 0x0020_0009;
        let mut windows = tree();
        windows.add_root(Window::new_root(0x200, 1, 640, 480, 24, 0x41));
        windows.create_window(Window::new(OTHER, 0x200, 0, 0, 10, 10, 0, 0, WindowClass::InputOutput, 0));
        windows.create_window(Window::new(BARE, 0x100, 0, 0, 10, 10, 0, 0, WindowClass::InputOutput, 0));

        let mut b = backend(SwapPolicy::SameScreen, &windows);
        b.draw(WIN, 3);
        let info = |window| SwapInfo {
            window,
            swap_action: SwapAction::Copied,
        };
        let mut swaps = vec![info(WIN), info(OTHER), info(BARE), info(WIN2)];
        assert_eq!(b.swap_buffers(&windows, &mut swaps), Err(ProtocolError::Match));
        assert_eq!(b.front(WIN), Some(Contents::Frame(3)));
        let left: Vec<Xid> = swaps.iter().map(|s| s.window).collect();
        assert_eq!(left, vec![OTHER, BARE, WIN2]);
    }

    #[test]
    fn test_allocation_is_per_window() {
        let windows = tree();
        let mut b = backend(SwapPolicy::SameScreen, &windows);
        let window = windows.get(WIN).unwrap();
        b.allocate_back_buffer(window, 0x0020_0500, SwapAction::Copied).unwrap();
        b.draw(WIN, 9);
        b.allocate_back_buffer(window, 0x0020_0501, SwapAction::Copied).unwrap();
        assert_eq!(b.back(WIN), Some(Contents::Frame(9)));

        let mut other_screen = window.clone();
        other_screen.screen = 1;
        assert_eq!(
            b.allocate_back_buffer(&other_screen, 0x0020_0502, SwapAction::Copied),
            Err(ProtocolError::Match)
        );
    }

    #[test]
    fn test_unknown_window_in_batch() {
        let windows = tree();
        let mut b = SoftwareBackend::new(0, Vec::new(), SwapPolicy::OnePerCall);
        let mut swaps = vec![SwapInfo {
            window: WIN,
            swap_action: SwapAction::Copied,
        }];
        assert_eq!(b.swap_buffers(&windows, &mut swaps), Err(ProtocolError::Match));
        assert_eq!(swaps.len(), 1);
    }
}
