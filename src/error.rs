//! X11 protocol errors reported to clients

use x11rb::protocol::{dbe, xproto};

use crate::wire::{ReplyWriter, Xid};

/// A protocol error reported back to the requesting client.
///
/// Variants carrying a value report it as the error's bad-value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("bad request")]
    Request,
    #[error("bad value {0:#x}")]
    Value(u32),
    #[error("bad window {0:#x}")]
    Window(Xid),
    #[error("bad pixmap {0:#x}")]
    Pixmap(Xid),
    #[error("bad match")]
    Match,
    #[error("bad drawable {0:#x}")]
    Drawable(Xid),
    #[error("resource exhaustion")]
    Alloc,
    #[error("bad id choice {0:#x}")]
    IdChoice(Xid),
    #[error("bad request length")]
    Length,
    #[error("server implementation error")]
    Implementation,
    /// Extension-defined: the id does not name an owned back buffer.
    #[error("bad buffer {0:#x}")]
    Buffer(Xid),
}

impl ProtocolError {
    /// Wire error code; extension errors are offset by the registered error base.
    pub fn code(&self, error_base: u8) -> u8 {
        match self {
            ProtocolError::Request => xproto::REQUEST_ERROR,
            ProtocolError::Value(_) => xproto::VALUE_ERROR,
            ProtocolError::Window(_) => xproto::WINDOW_ERROR,
            ProtocolError::Pixmap(_) => xproto::PIXMAP_ERROR,
            ProtocolError::Match => xproto::MATCH_ERROR,
            ProtocolError::Drawable(_) => xproto::DRAWABLE_ERROR,
            ProtocolError::Alloc => xproto::ALLOC_ERROR,
            ProtocolError::IdChoice(_) => xproto::ID_CHOICE_ERROR,
            ProtocolError::Length => xproto::LENGTH_ERROR,
            ProtocolError::Implementation => xproto::IMPLEMENTATION_ERROR,
            ProtocolError::Buffer(_) => error_base.wrapping_add(dbe::BAD_BUFFER_ERROR),
        }
    }

    pub fn bad_value(&self) -> u32 {
        match *self {
            ProtocolError::Value(v)
            | ProtocolError::Window(v)
            | ProtocolError::Pixmap(v)
            | ProtocolError::Drawable(v)
            | ProtocolError::IdChoice(v)
            | ProtocolError::Buffer(v) => v,
            _ => 0,
        }
    }

    /// Encode the 32-byte error packet sent in place of a reply.
    pub fn encode(
        &self,
        error_base: u8,
        sequence: u16,
        major_opcode: u8,
        minor_opcode: u16,
        swapped: bool,
    ) -> Vec<u8> {
        let mut out = ReplyWriter::new(swapped);
        out.u8(0); // error
        out.u8(self.code(error_base));
        out.u16(sequence);
        out.u32(self.bad_value());
        out.u16(minor_opcode);
        out.u8(major_opcode);
        out.pad(21);
        out.finish()
    }
}
