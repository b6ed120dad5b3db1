//! X11 server core: windows, pixmaps and extension dispatch

use x11rb::protocol::xproto;

use crate::client::{client_of, Client};
use crate::config::ServerConfig;
use crate::dbe::{self, DbeExtension, DbeScreen};
use crate::error::ProtocolError;
use crate::objects::ServerObjects;
use crate::setup;
use crate::wire::{size_at_least, size_match, ByteOrder, ReplyWriter, RequestReader, Xid};
use crate::window::{Background, Window, WindowClass};

/// Core protocol opcodes handled here
mod opcodes {
    use super::xproto;

    pub const CREATE_WINDOW: u8 = xproto::CREATE_WINDOW_REQUEST;
    pub const CHANGE_WINDOW_ATTRIBUTES: u8 = xproto::CHANGE_WINDOW_ATTRIBUTES_REQUEST;
    pub const DESTROY_WINDOW: u8 = xproto::DESTROY_WINDOW_REQUEST;
    pub const CREATE_PIXMAP: u8 = xproto::CREATE_PIXMAP_REQUEST;
    pub const FREE_PIXMAP: u8 = xproto::FREE_PIXMAP_REQUEST;
    pub const QUERY_EXTENSION: u8 = xproto::QUERY_EXTENSION_REQUEST;
}

/// Window attribute mask bits we act on
const CW_BACK_PIXMAP: u32 = 1 << 0;
const CW_BACK_PIXEL: u32 = 1 << 1;

/// Extensions get major opcodes and error codes from here up
const FIRST_EXTENSION_OPCODE: u8 = 128;
const FIRST_EXTENSION_ERROR: u8 = 128;

/// X11 Server state
pub struct X11Server {
    config: ServerConfig,
    objects: ServerObjects,
    dbe: Option<DbeExtension>,
    /// Index handed to the next connecting client
    next_client: u32,
}

impl X11Server {
    pub fn new(config: ServerConfig) -> Self {
        let screens = config.dbe_screens();
        Self::with_dbe_screens(config, screens)
    }

    /// Build the server with explicit double-buffer backends
    pub fn with_dbe_screens(config: ServerConfig, screens: Vec<DbeScreen>) -> Self {
        let mut objects = ServerObjects::new(config.screen_infos(), config.resource_limit);
        let dbe = DbeExtension::init(&mut objects, screens, FIRST_EXTENSION_OPCODE, FIRST_EXTENSION_ERROR);
        Self {
            config,
            objects,
            dbe,
            next_client: 1,
        }
    }

    pub fn objects(&self) -> &ServerObjects {
        &self.objects
    }

    pub fn dbe(&self) -> Option<&DbeExtension> {
        self.dbe.as_ref()
    }

    /// Server generation reset: every client is gone, all state starts over
    pub fn reset(&mut self) {
        if let Some(dbe) = self.dbe.as_mut() {
            dbe.reset();
        }
        log::info!("server reset");
        *self = Self::new(self.config.clone());
    }

    pub fn connect(&mut self, byte_order: ByteOrder) -> Client {
        let client = Client::new(self.next_client, byte_order);
        self.next_client += 1;
        log::info!("client {} connected ({:?})", client.index, byte_order);
        client
    }

    pub fn setup_reply(&self, client: &Client) -> Vec<u8> {
        setup::setup_reply(client, &self.objects.screens)
    }

    /// Free everything the client created
    pub fn disconnect(&mut self, client: &Client) {
        let owned = |id: Xid| client_of(id) == client.index;

        for window in self.objects.windows.ids_matching(owned) {
            self.destroy_window_tree(window);
        }
        let freed = self.objects.resources.free_matching(owned);
        let count = freed.len();
        if let Some(dbe) = self.dbe.as_mut() {
            for resource in freed {
                dbe.resource_deleted(resource);
            }
        }
        let pixmaps = self.objects.pixmaps.free_matching(owned);
        log::info!(
            "client {} disconnected: {} resources, {} pixmaps freed",
            client.index,
            count,
            pixmaps
        );
    }

    /// Process one request and return the bytes to send back: a reply, an
    /// error, or nothing.
    pub fn process_request(&mut self, client: &mut Client, data: &[u8]) -> Vec<u8> {
        let sequence = client.next_sequence();
        let opcode = data.first().copied().unwrap_or(0);
        let dbe_opcode = self.dbe.as_ref().map(DbeExtension::major_opcode);

        let result = if data.len() < 4 {
            Err(ProtocolError::Length)
        } else {
            match opcode {
                opcodes::CREATE_WINDOW => self.handle_create_window(client, data),
                opcodes::CHANGE_WINDOW_ATTRIBUTES => self.handle_change_window_attributes(client, data),
                opcodes::DESTROY_WINDOW => self.handle_destroy_window(client, data),
                opcodes::CREATE_PIXMAP => self.handle_create_pixmap(client, data),
                opcodes::FREE_PIXMAP => self.handle_free_pixmap(client, data),
                opcodes::QUERY_EXTENSION => self.handle_query_extension(client, data),
                op if Some(op) == dbe_opcode => match self.dbe.as_mut() {
                    Some(dbe) => dbe.dispatch(&mut self.objects, client, data),
                    None => Err(ProtocolError::Request),
                },
                _ => {
                    log::warn!("unhandled opcode: {}", opcode);
                    Err(ProtocolError::Request)
                }
            }
        };

        match result {
            Ok(reply) => reply,
            Err(err) => {
                log::debug!("request {} (seq {}) failed: {}", opcode, sequence, err);
                let minor = if Some(opcode) == dbe_opcode {
                    data.get(1).copied().map_or(0, u16::from)
                } else {
                    0
                };
                let error_base = self.dbe.as_ref().map_or(0, DbeExtension::error_base);
                err.encode(error_base, sequence, opcode, minor, client.swapped())
            }
        }
    }

    // Window operations

    fn handle_create_window(&mut self, client: &Client, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        size_at_least(data, 32)?;
        let depth = data[1];
        let mut r = RequestReader::new(&data[4..], client.swapped());
        let wid = r.u32();
        let parent = r.u32();
        let x = r.i16();
        let y = r.i16();
        let width = r.u16();
        let height = r.u16();
        let border_width = r.u16();
        let class = r.u16();
        let visual = r.u32();
        let value_mask = r.u32();
        size_match(data, 32 + 4 * value_mask.count_ones() as usize)?;

        self.objects.legal_new_resource(client, wid)?;
        self.objects.lookup_window(parent)?;
        let class = WindowClass::from_wire(class).ok_or(ProtocolError::Value(u32::from(class)))?;
        if width == 0 || height == 0 {
            return Err(ProtocolError::Value(0));
        }

        let mut window = Window::new(wid, parent, x, y, width, height, border_width, depth, class, visual);
        window.attributes.background = self.read_background(&mut r, value_mask, Background::None)?;
        if !self.objects.windows.create_window(window) {
            return Err(ProtocolError::Window(parent));
        }

        log::debug!("CreateWindow: {:#x} parent={:#x} {}x{}", wid, parent, width, height);
        Ok(Vec::new())
    }

    fn handle_change_window_attributes(
        &mut self,
        client: &Client,
        data: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        size_at_least(data, 12)?;
        let mut r = RequestReader::new(&data[4..], client.swapped());
        let wid = r.u32();
        let value_mask = r.u32();
        size_match(data, 12 + 4 * value_mask.count_ones() as usize)?;

        let current = self.objects.lookup_window(wid)?.attributes.background;
        let background = self.read_background(&mut r, value_mask, current)?;
        if let Some(window) = self.objects.windows.get_mut(wid) {
            window.attributes.background = background;
        }
        log::debug!("ChangeWindowAttributes: {:#x} background={:?}", wid, background);
        Ok(Vec::new())
    }

    /// Walk a window attribute value list; only the background values matter here
    fn read_background(
        &self,
        r: &mut RequestReader<'_>,
        value_mask: u32,
        mut background: Background,
    ) -> Result<Background, ProtocolError> {
        for bit in 0..32 {
            let flag = 1u32 << bit;
            if value_mask & flag == 0 {
                continue;
            }
            let value = r.u32();
            match flag {
                CW_BACK_PIXMAP => {
                    background = Background::from_pixmap_value(value);
                    if let Background::Pixmap(pixmap) = background {
                        if !self.objects.pixmaps.contains(pixmap) {
                            return Err(ProtocolError::Pixmap(pixmap));
                        }
                    }
                }
                CW_BACK_PIXEL => background = Background::Pixel(value),
                _ => {}
            }
        }
        Ok(background)
    }

    fn handle_destroy_window(&mut self, client: &Client, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        size_match(data, 8)?;
        let wid = RequestReader::new(&data[4..], client.swapped()).u32();
        self.objects.lookup_window(wid)?;
        if self.objects.windows.is_root(wid) {
            return Ok(Vec::new());
        }
        self.destroy_window_tree(wid);
        Ok(Vec::new())
    }

    /// Destroy a window and its subwindows, tearing down their back buffers
    fn destroy_window_tree(&mut self, wid: Xid) {
        let destroyed = self.objects.windows.destroy_window(wid);
        if let Some(dbe) = self.dbe.as_mut() {
            for &id in &destroyed {
                dbe.window_destroyed(&mut self.objects.resources, id);
            }
        }
        if !destroyed.is_empty() {
            log::debug!("DestroyWindow: {:#x} ({} windows)", wid, destroyed.len());
        }
    }

    // Pixmap operations

    fn handle_create_pixmap(&mut self, client: &Client, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        size_match(data, 16)?;
        let depth = data[1];
        let mut r = RequestReader::new(&data[4..], client.swapped());
        let pid = r.u32();
        let drawable = r.u32();
        let width = r.u16();
        let height = r.u16();

        self.objects.legal_new_resource(client, pid)?;
        let screen = self.objects.lookup_drawable(drawable)?.screen;
        if width == 0 || height == 0 {
            return Err(ProtocolError::Value(0));
        }
        self.objects.pixmaps.create(pid, screen, width, height, depth);
        log::debug!("CreatePixmap: {:#x} {}x{} depth {}", pid, width, height, depth);
        Ok(Vec::new())
    }

    fn handle_free_pixmap(&mut self, client: &Client, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        size_match(data, 8)?;
        let pid = RequestReader::new(&data[4..], client.swapped()).u32();
        self.objects.pixmaps.free(pid).ok_or(ProtocolError::Pixmap(pid))?;
        Ok(Vec::new())
    }

    fn handle_query_extension(&mut self, client: &Client, data: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        size_at_least(data, 8)?;
        let name_len = RequestReader::new(&data[4..], client.swapped()).u16() as usize;
        size_match(data, 8 + ((name_len + 3) & !3))?;
        let name = std::str::from_utf8(&data[8..8 + name_len]).unwrap_or("");

        let dbe = self.dbe.as_ref().filter(|_| name == dbe::EXTENSION_NAME);
        log::debug!("QueryExtension: {} present={}", name, dbe.is_some());

        let mut reply = ReplyWriter::reply(client.sequence, 0, client.swapped());
        match dbe {
            Some(dbe) => {
                reply.u8(1);
                reply.u8(dbe.major_opcode());
                reply.u8(0); // first event
                reply.u8(dbe.error_base());
            }
            None => reply.pad(4),
        }
        Ok(reply.finish_reply())
    }
}
