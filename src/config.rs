//! Server configuration

use crate::dbe::{DbeScreen, SoftwareBackend, SwapPolicy, VisualInfo};
use crate::objects::{ScreenInfo, VisualType};
use crate::wire::Xid;

/// Depth of every root window and double-buffered visual
pub const ROOT_DEPTH: u8 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Number of screens
    pub screens: usize,
    /// Geometry of every screen
    pub width: u16,
    pub height: u16,
    /// Screens whose double-buffer backend is stubbed
    pub stubbed_screens: Vec<usize>,
    pub swap_policy: SwapPolicy,
    /// Bound on live resource table entries
    pub resource_limit: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            screens: 1,
            width: 1280,
            height: 720,
            stubbed_screens: Vec::new(),
            swap_policy: SwapPolicy::default(),
            resource_limit: None,
        }
    }
}

impl ServerConfig {
    /// Root window id of a screen; server-owned ids sit below every client range
    pub fn root_id(screen: usize) -> Xid {
        0x100 * (screen as Xid + 1)
    }

    /// Each screen offers two TrueColor visuals
    pub fn screen_infos(&self) -> Vec<ScreenInfo> {
        (0..self.screens)
            .map(|screen| {
                let root = Self::root_id(screen);
                let first_visual = 0x21 + 0x20 * screen as u32;
                ScreenInfo {
                    root,
                    default_colormap: root + 1,
                    width: self.width,
                    height: self.height,
                    root_depth: ROOT_DEPTH,
                    root_visual: first_visual,
                    visuals: vec![
                        VisualType::true_color(first_visual),
                        VisualType::true_color(first_visual + 1),
                    ],
                }
            })
            .collect()
    }

    /// Software backends for every screen that is not stubbed.
    ///
    /// All visuals of a screen can be double buffered; the root visual
    /// performs best.
    pub fn dbe_screens(&self) -> Vec<DbeScreen> {
        self.screen_infos()
            .iter()
            .enumerate()
            .map(|(index, screen)| {
                if self.stubbed_screens.contains(&index) {
                    return DbeScreen::Stubbed;
                }
                let visuals = screen
                    .visuals
                    .iter()
                    .map(|visual| VisualInfo {
                        visual: visual.id,
                        depth: screen.root_depth,
                        perf_level: u8::from(visual.id == screen.root_visual),
                    })
                    .collect();
                DbeScreen::capable(SoftwareBackend::new(index, visuals, self.swap_policy))
            })
            .collect()
    }
}
