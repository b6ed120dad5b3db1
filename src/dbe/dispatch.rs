//! DOUBLE-BUFFER request decoding and dispatch
//!
//! Requests from swapped clients are decoded by the swapped twin of the
//! parser; the handlers below only ever see decoded values. Replies are
//! written in the client's byte order.

use x11rb::protocol::dbe;

use crate::client::Client;
use crate::error::ProtocolError;
use crate::objects::ServerObjects;
use crate::wire::{size_at_least, size_match, ReplyWriter, RequestReader, Xid, NONE};

use super::backend::VisualInfo;
use super::swap::SwapEntry;
use super::{DbeExtension, MAJOR_VERSION, MINOR_VERSION};

/// DOUBLE-BUFFER minor opcodes
mod opcodes {
    use super::dbe;

    pub const GET_VERSION: u8 = dbe::QUERY_VERSION_REQUEST;
    pub const ALLOCATE_BACK_BUFFER_NAME: u8 = dbe::ALLOCATE_BACK_BUFFER_REQUEST;
    pub const DEALLOCATE_BACK_BUFFER_NAME: u8 = dbe::DEALLOCATE_BACK_BUFFER_REQUEST;
    pub const SWAP_BUFFERS: u8 = dbe::SWAP_BUFFERS_REQUEST;
    pub const BEGIN_IDIOM: u8 = dbe::BEGIN_IDIOM_REQUEST;
    pub const END_IDIOM: u8 = dbe::END_IDIOM_REQUEST;
    pub const GET_VISUAL_INFO: u8 = dbe::GET_VISUAL_INFO_REQUEST;
    pub const GET_BACK_BUFFER_ATTRIBUTES: u8 = dbe::GET_BACK_BUFFER_ATTRIBUTES_REQUEST;
}

/// A decoded DOUBLE-BUFFER request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbeRequest {
    GetVersion,
    AllocateBackBufferName { window: Xid, buffer: Xid, swap_action: u8 },
    DeallocateBackBufferName { buffer: Xid },
    SwapBuffers { entries: Vec<SwapEntry> },
    BeginIdiom,
    EndIdiom,
    GetVisualInfo { drawables: Vec<Xid> },
    GetBackBufferAttributes { buffer: Xid },
}

/// Byte size of a request carrying `count` list items of `item` bytes
/// after an 8-byte fixed part
fn list_request_size(count: u32, item: usize) -> Result<usize, ProtocolError> {
    (count as usize)
        .checked_mul(item)
        .and_then(|n| n.checked_add(8))
        .ok_or(ProtocolError::Length)
}

impl DbeRequest {
    /// Decode a request from a client with the server's byte order
    pub fn parse(data: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode(data, false)
    }

    /// Decode a request from a client with the opposite byte order
    pub fn parse_swapped(data: &[u8]) -> Result<Self, ProtocolError> {
        Self::decode(data, true)
    }

    /// Minor opcode of a raw request
    pub fn minor_opcode(data: &[u8]) -> u8 {
        data.get(1).copied().unwrap_or(0)
    }

    fn decode(data: &[u8], swapped: bool) -> Result<Self, ProtocolError> {
        size_at_least(data, 4)?;
        let mut r = RequestReader::new(data, swapped);
        r.skip(4); // major, minor, length

        match Self::minor_opcode(data) {
            opcodes::GET_VERSION => {
                // the client's version bytes carry no meaning
                size_match(data, 8)?;
                Ok(DbeRequest::GetVersion)
            }
            opcodes::ALLOCATE_BACK_BUFFER_NAME => {
                size_match(data, 16)?;
                let window = r.u32();
                let buffer = r.u32();
                let swap_action = r.u8();
                Ok(DbeRequest::AllocateBackBufferName {
                    window,
                    buffer,
                    swap_action,
                })
            }
            opcodes::DEALLOCATE_BACK_BUFFER_NAME => {
                size_match(data, 8)?;
                Ok(DbeRequest::DeallocateBackBufferName { buffer: r.u32() })
            }
            opcodes::SWAP_BUFFERS => {
                size_at_least(data, 8)?;
                let count = r.u32();
                size_match(data, list_request_size(count, 8)?)?;
                let entries = (0..count)
                    .map(|_| {
                        let window = r.u32();
                        let swap_action = r.u8();
                        r.skip(3);
                        SwapEntry { window, swap_action }
                    })
                    .collect();
                Ok(DbeRequest::SwapBuffers { entries })
            }
            opcodes::BEGIN_IDIOM => {
                size_match(data, 4)?;
                Ok(DbeRequest::BeginIdiom)
            }
            opcodes::END_IDIOM => {
                size_match(data, 4)?;
                Ok(DbeRequest::EndIdiom)
            }
            opcodes::GET_VISUAL_INFO => {
                size_at_least(data, 8)?;
                let count = r.u32();
                size_match(data, list_request_size(count, 4)?)?;
                let drawables = (0..count).map(|_| r.u32()).collect();
                Ok(DbeRequest::GetVisualInfo { drawables })
            }
            opcodes::GET_BACK_BUFFER_ATTRIBUTES => {
                size_match(data, 8)?;
                Ok(DbeRequest::GetBackBufferAttributes { buffer: r.u32() })
            }
            _ => Err(ProtocolError::Request),
        }
    }
}

impl DbeExtension {
    /// Handle one DOUBLE-BUFFER request.
    ///
    /// Returns the reply bytes, or an empty buffer for requests without reply.
    pub fn dispatch(
        &mut self,
        objects: &mut ServerObjects,
        client: &Client,
        data: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let request = if client.swapped() {
            DbeRequest::parse_swapped(data)?
        } else {
            DbeRequest::parse(data)?
        };
        self.handle_request(objects, client, request)
    }

    fn handle_request(
        &mut self,
        objects: &mut ServerObjects,
        client: &Client,
        request: DbeRequest,
    ) -> Result<Vec<u8>, ProtocolError> {
        match request {
            DbeRequest::GetVersion => Ok(self.handle_get_version(client)),
            DbeRequest::AllocateBackBufferName {
                window,
                buffer,
                swap_action,
            } => {
                self.allocate_back_buffer_name(objects, client, window, buffer, swap_action)?;
                Ok(Vec::new())
            }
            DbeRequest::DeallocateBackBufferName { buffer } => {
                self.deallocate_back_buffer_name(objects, buffer)?;
                Ok(Vec::new())
            }
            DbeRequest::SwapBuffers { entries } => {
                self.swap_buffers(objects, &entries)?;
                Ok(Vec::new())
            }
            DbeRequest::BeginIdiom | DbeRequest::EndIdiom => Ok(Vec::new()),
            DbeRequest::GetVisualInfo { drawables } => {
                self.handle_get_visual_info(objects, client, &drawables)
            }
            DbeRequest::GetBackBufferAttributes { buffer } => {
                Ok(self.handle_get_back_buffer_attributes(objects, client, buffer))
            }
        }
    }

    fn handle_get_version(&self, client: &Client) -> Vec<u8> {
        log::debug!("DbeGetVersion: {}.{}", MAJOR_VERSION, MINOR_VERSION);
        let mut out = ReplyWriter::reply(client.sequence, 0, client.swapped());
        out.u8(MAJOR_VERSION);
        out.u8(MINOR_VERSION);
        out.finish_reply()
    }

    fn handle_get_visual_info(
        &self,
        objects: &ServerObjects,
        client: &Client,
        drawables: &[Xid],
    ) -> Result<Vec<u8>, ProtocolError> {
        let screens = if drawables.is_empty() {
            (0..objects.screens.len()).collect::<Vec<_>>()
        } else {
            drawables
                .iter()
                .map(|&d| objects.lookup_drawable(d).map(|d| d.screen))
                .collect::<Result<Vec<_>, _>>()?
        };

        // build every list before writing anything, so a failure sends nothing
        let lists = screens
            .iter()
            .map(|&screen| self.screen_visuals(screen))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "DbeGetVisualInfo: {} screens, {} visuals",
            lists.len(),
            lists.iter().map(Vec::len).sum::<usize>()
        );

        let mut out = ReplyWriter::reply(client.sequence, 0, client.swapped());
        out.u32(lists.len() as u32);
        out.pad(20);
        for visuals in &lists {
            out.u32(visuals.len() as u32);
            for info in visuals {
                out.u32(info.visual);
                out.u8(info.depth);
                out.u8(info.perf_level);
                out.pad(2);
            }
        }
        Ok(out.finish_reply())
    }

    fn screen_visuals(&self, screen: usize) -> Result<Vec<VisualInfo>, ProtocolError> {
        match self.screens.get(screen).and_then(|s| s.backend()) {
            Some(backend) => backend.visual_info(screen),
            None => Ok(Vec::new()),
        }
    }

    fn handle_get_back_buffer_attributes(
        &self,
        objects: &ServerObjects,
        client: &Client,
        buffer: Xid,
    ) -> Vec<u8> {
        let window = self.buffer_window(&objects.resources, buffer).unwrap_or(NONE);
        log::debug!("DbeGetBackBufferAttributes: {:#x} -> {:#x}", buffer, window);
        let mut out = ReplyWriter::reply(client.sequence, 0, client.swapped());
        out.u32(window);
        out.finish_reply()
    }
}
