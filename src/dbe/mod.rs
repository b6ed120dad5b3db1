//! DOUBLE-BUFFER extension
//!
//! Lets clients name back buffers of their windows, release them, and swap
//! front and back buffers of several windows in one request. The actual
//! buffer storage and swapping is done by a per-screen [`DbeBackend`].

mod background;
mod backend;
mod buffers;
mod dispatch;
mod ids;
mod software;
mod swap;

use std::collections::HashMap;

use x11rb::protocol::dbe;

use crate::error::ProtocolError;
use crate::objects::ServerObjects;
use crate::resource::ResourceType;
use crate::wire::Xid;

pub use background::{setup_background_painter, Fill};
pub use backend::{DbeBackend, DbeScreen, SwapInfo, VisualInfo};
pub use buffers::WindowBufferRecord;
pub use dispatch::DbeRequest;
pub use ids::{BufferIds, INCR_MAX_IDS, INIT_MAX_IDS};
pub use software::{Contents, SoftwareBackend, SwapPolicy};
pub use swap::{SwapEntry, MAX_SWAP_ENTRIES};

pub const EXTENSION_NAME: &str = dbe::X11_EXTENSION_NAME;
pub const MAJOR_VERSION: u8 = 1;
pub const MINOR_VERSION: u8 = 0;
/// The extension defines one error (BadBuffer) and no events
pub const NUMBER_ERRORS: u8 = 1;
pub const NUMBER_EVENTS: u8 = 0;

/// What happens to the back buffer's contents after a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwapAction {
    #[default]
    Undefined = 0,
    /// Cleared to the window background
    Background = 1,
    /// Holds the old front buffer
    Untouched = 2,
    /// Keeps the contents just swapped to the front
    Copied = 3,
}

impl TryFrom<u8> for SwapAction {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SwapAction::Undefined),
            1 => Ok(SwapAction::Background),
            2 => Ok(SwapAction::Untouched),
            3 => Ok(SwapAction::Copied),
            other => Err(ProtocolError::Value(other as u32)),
        }
    }
}

/// Extension state: the per-screen backend table and the window records
pub struct DbeExtension {
    screens: Vec<DbeScreen>,
    records: HashMap<Xid, WindowBufferRecord>,
    /// Marker entry for each buffer id; deleting it does nothing
    drawable_type: ResourceType,
    /// Entry tying each buffer id to its window record; deleting it does the cleanup
    window_priv_type: ResourceType,
    major_opcode: u8,
    error_base: u8,
}

impl DbeExtension {
    /// Set up the extension for every screen of the server.
    ///
    /// Screens without a backend entry are stubbed. Returns `None` when every
    /// screen is stubbed, in which case the extension is not offered at all.
    pub fn init(
        objects: &mut ServerObjects,
        mut screens: Vec<DbeScreen>,
        major_opcode: u8,
        error_base: u8,
    ) -> Option<Self> {
        screens.truncate(objects.screens.len());
        screens.resize_with(objects.screens.len(), || DbeScreen::Stubbed);

        let stubbed = screens.iter().filter(|s| !s.supports_double_buffering()).count();
        if stubbed == screens.len() {
            log::info!("{}: no screen supports double buffering, extension disabled", EXTENSION_NAME);
            return None;
        }

        let drawable_type = objects.resources.create_type("dbeDrawable");
        let window_priv_type = objects.resources.create_type("dbeWindow");

        log::info!(
            "{} {}.{}: major opcode {}, error base {}, {} of {} screens stubbed",
            EXTENSION_NAME,
            MAJOR_VERSION,
            MINOR_VERSION,
            major_opcode,
            error_base,
            stubbed,
            screens.len()
        );

        Some(Self {
            screens,
            records: HashMap::new(),
            drawable_type,
            window_priv_type,
            major_opcode,
            error_base,
        })
    }

    /// Server generation reset: forget every record and the screen table.
    pub fn reset(&mut self) {
        log::debug!("{}: reset, dropping {} window records", EXTENSION_NAME, self.records.len());
        self.records.clear();
        self.screens.clear();
    }

    pub fn major_opcode(&self) -> u8 {
        self.major_opcode
    }

    pub fn error_base(&self) -> u8 {
        self.error_base
    }

    pub fn screen(&self, index: usize) -> Option<&DbeScreen> {
        self.screens.get(index)
    }

    pub fn record(&self, window: Xid) -> Option<&WindowBufferRecord> {
        self.records.get(&window)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Whether resource entries of `rtype` belong to this extension
    pub fn owns_type(&self, rtype: ResourceType) -> bool {
        rtype == self.drawable_type || rtype == self.window_priv_type
    }

    fn backend_mut(&mut self, screen: usize) -> Option<&mut dyn DbeBackend> {
        self.screens.get_mut(screen).and_then(DbeScreen::backend_mut)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::client::Client;
    use crate::objects::tests::two_screens;
    use crate::window::{Window, WindowClass, WindowTree};
    use crate::wire::ByteOrder;

    /// Calls seen by a [`MockBackend`]
    #[derive(Debug, Default)]
    pub(crate) struct MockLog {
        pub visual_calls: usize,
        pub allocations: Vec<Xid>,
        pub swap_calls: usize,
        /// Screen of the backend that took each swap call
        pub swap_screens: Vec<usize>,
        pub swapped: Vec<(Xid, SwapAction)>,
        pub deleted: Vec<(Xid, usize)>,
    }

    /// Scriptable backend that records every call
    pub(crate) struct MockBackend {
        pub log: Rc<RefCell<MockLog>>,
        pub screen: usize,
        pub visuals: Vec<VisualInfo>,
        pub fail_visuals: bool,
        pub fail_allocate: bool,
        /// Entries handled per swap call
        pub swap_batch: usize,
        /// Fail the swap call with this index
        pub fail_swap_call: Option<usize>,
    }

    impl MockBackend {
        pub(crate) fn new(visuals: &[u32]) -> (Self, Rc<RefCell<MockLog>>) {
            let log = Rc::new(RefCell::new(MockLog::default()));
            let backend = Self {
                log: Rc::clone(&log),
                screen: 0,
                visuals: visuals
                    .iter()
                    .map(|&visual| VisualInfo {
                        visual,
                        depth: 24,
                        perf_level: 0,
                    })
                    .collect(),
                fail_visuals: false,
                fail_allocate: false,
                swap_batch: usize::MAX,
                fail_swap_call: None,
            };
            (backend, log)
        }
    }

    impl DbeBackend for MockBackend {
        fn visual_info(&self, _screen: usize) -> Result<Vec<VisualInfo>, ProtocolError> {
            self.log.borrow_mut().visual_calls += 1;
            if self.fail_visuals {
                return Err(ProtocolError::Alloc);
            }
            Ok(self.visuals.clone())
        }

        fn allocate_back_buffer(
            &mut self,
            _window: &Window,
            buffer: Xid,
            _swap_action: SwapAction,
        ) -> Result<(), ProtocolError> {
            if self.fail_allocate {
                return Err(ProtocolError::Alloc);
            }
            self.log.borrow_mut().allocations.push(buffer);
            Ok(())
        }

        fn swap_buffers(
            &mut self,
            _windows: &WindowTree,
            swaps: &mut Vec<SwapInfo>,
        ) -> Result<(), ProtocolError> {
            let mut log = self.log.borrow_mut();
            let call = log.swap_calls;
            log.swap_calls += 1;
            log.swap_screens.push(self.screen);
            if self.fail_swap_call == Some(call) {
                return Err(ProtocolError::Alloc);
            }
            let n = self.swap_batch.min(swaps.len());
            for info in swaps.drain(..n) {
                log.swapped.push((info.window, info.swap_action));
            }
            Ok(())
        }

        fn delete_window_priv(&mut self, record: &WindowBufferRecord, buffer: Xid) {
            self.log.borrow_mut().deleted.push((buffer, record.ids.len()));
        }
    }

    pub(crate) const WIN: Xid = 0x0020_0001;
    pub(crate) const WIN2: Xid = 0x0020_0002;
    pub(crate) const INPUT_ONLY: Xid = 0x0020_0003;
    pub(crate) const WIN_SCREEN1: Xid = 0x0020_0004;

    pub(crate) struct Fixture {
        pub objects: ServerObjects,
        pub dbe: DbeExtension,
        pub client: Client,
        pub log: Rc<RefCell<MockLog>>,
    }

    /// Two screens, both backed by one mock each (sharing a log). Screen 0
    /// double-buffers visual 0x21 only, screen 1 visual 0x41.
    pub(crate) fn fixture_with(configure: impl Fn(&mut MockBackend)) -> Fixture {
        let mut objects = ServerObjects::new(two_screens(), None);
        let (mut screen0, log) = MockBackend::new(&[0x21]);
        configure(&mut screen0);
        let (mut screen1, _) = MockBackend::new(&[0x41]);
        screen1.log = Rc::clone(&log);
        screen1.screen = 1;
        configure(&mut screen1);

        for (id, parent, class, visual) in [
            (WIN, 0x100, WindowClass::InputOutput, 0),
            (WIN2, 0x100, WindowClass::InputOutput, 0),
            (INPUT_ONLY, 0x100, WindowClass::InputOnly, 0),
            (WIN_SCREEN1, 0x200, WindowClass::InputOutput, 0),
        ] {
            let window = Window::new(id, parent, 5, 6, 100, 50, 0, 0, class, visual);
            assert!(objects.windows.create_window(window));
        }

        let dbe = DbeExtension::init(
            &mut objects,
            vec![DbeScreen::capable(screen0), DbeScreen::capable(screen1)],
            131,
            150,
        )
        .unwrap();

        Fixture {
            objects,
            dbe,
            client: Client::new(1, ByteOrder::LittleEndian),
            log,
        }
    }

    pub(crate) fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    #[test]
    fn test_swap_action_values() {
        assert_eq!(SwapAction::try_from(0), Ok(SwapAction::Undefined));
        assert_eq!(SwapAction::try_from(3), Ok(SwapAction::Copied));
        assert_eq!(SwapAction::try_from(4), Err(ProtocolError::Value(4)));
    }

    #[test]
    fn test_init_all_stubbed_disables_extension() {
        let mut objects = ServerObjects::new(two_screens(), None);
        let dbe = DbeExtension::init(&mut objects, vec![DbeScreen::Stubbed], 131, 150);
        assert!(dbe.is_none());
        assert!(objects.resources.is_empty());
    }

    #[test]
    fn test_init_pads_missing_screens_with_stubs() {
        let mut objects = ServerObjects::new(two_screens(), None);
        let (backend, _) = MockBackend::new(&[0x21]);
        let dbe = DbeExtension::init(&mut objects, vec![DbeScreen::capable(backend)], 131, 150).unwrap();
        assert!(dbe.screen(0).unwrap().supports_double_buffering());
        assert!(!dbe.screen(1).unwrap().supports_double_buffering());
        assert_eq!(dbe.major_opcode(), 131);
        assert_eq!(dbe.error_base(), 150);
    }

    #[test]
    fn test_reset_drops_records() {
        let mut f = fixture();
        f.dbe
            .allocate_back_buffer_name(&mut f.objects, &f.client, WIN, 0x0020_0100, 0)
            .unwrap();
        assert_eq!(f.dbe.record_count(), 1);
        f.dbe.reset();
        assert_eq!(f.dbe.record_count(), 0);
        assert!(f.dbe.screen(0).is_none());
    }
}
