//! Connection setup
//!
//! A client opens with a 12-byte prefix (byte order, protocol version and
//! the lengths of the authorization name and data) followed by the padded
//! authorization strings. The server answers with a setup block describing
//! every screen.

use crate::client::Client;
use crate::objects::ScreenInfo;
use crate::wire::{ByteOrder, ReplyWriter, RequestReader};

/// Size of the fixed setup prefix
pub const SETUP_PREFIX_LEN: usize = 12;

const VENDOR: &[u8] = b"xdbe";
const PROTOCOL_MAJOR: u16 = 11;
const PROTOCOL_MINOR: u16 = 0;

fn pad4(n: usize) -> usize {
    (n + 3) & !3
}

/// Byte order and total length of a setup request, from its prefix
pub fn setup_request_length(prefix: &[u8]) -> Option<(ByteOrder, usize)> {
    if prefix.len() < SETUP_PREFIX_LEN {
        return None;
    }
    let order = ByteOrder::from_setup_byte(prefix[0])?;
    let mut r = RequestReader::new(&prefix[6..10], order.is_swapped());
    let auth_name = r.u16() as usize;
    let auth_data = r.u16() as usize;
    Some((order, SETUP_PREFIX_LEN + pad4(auth_name) + pad4(auth_data)))
}

/// The setup block sent to `client`, in its byte order
pub fn setup_reply(client: &Client, screens: &[ScreenInfo]) -> Vec<u8> {
    let swapped = client.swapped();
    let mut body = ReplyWriter::new(swapped);

    body.u32(0); // release number
    body.u32(client.resource_id_base);
    body.u32(client.resource_id_mask);
    body.u32(0); // motion buffer size
    body.u16(VENDOR.len() as u16);
    body.u16(0xffff); // maximum request length
    body.u8(screens.len() as u8);
    body.u8(1); // pixmap formats
    body.u8(0); // image byte order: LSBFirst
    body.u8(0); // bitmap bit order: LSBFirst
    body.u8(32); // scanline unit
    body.u8(32); // scanline pad
    body.u8(8); // min keycode
    body.u8(255); // max keycode
    body.pad(4);
    body.bytes(VENDOR);
    body.align4();

    // the one pixmap format
    body.u8(24);
    body.u8(32);
    body.u8(32);
    body.pad(5);

    for screen in screens {
        body.u32(screen.root);
        body.u32(screen.default_colormap);
        body.u32(0x00ff_ffff); // white pixel
        body.u32(0); // black pixel
        body.u32(0); // current input masks
        body.u16(screen.width);
        body.u16(screen.height);
        body.u16(screen.width / 4); // millimeters
        body.u16(screen.height / 4);
        body.u16(1); // min installed maps
        body.u16(1); // max installed maps
        body.u32(screen.root_visual);
        body.u8(0); // backing stores: Never
        body.u8(0); // save unders
        body.u8(screen.root_depth);
        body.u8(1); // allowed depths

        body.u8(screen.root_depth);
        body.pad(1);
        body.u16(screen.visuals.len() as u16);
        body.pad(4);
        for visual in &screen.visuals {
            body.u32(visual.id);
            body.u8(visual.class);
            body.u8(visual.bits_per_rgb);
            body.u16(visual.colormap_entries);
            body.u32(visual.red_mask);
            body.u32(visual.green_mask);
            body.u32(visual.blue_mask);
            body.pad(4);
        }
    }
    let body = body.finish();

    let mut reply = ReplyWriter::new(swapped);
    reply.u8(1); // success
    reply.pad(1);
    reply.u16(PROTOCOL_MAJOR);
    reply.u16(PROTOCOL_MINOR);
    reply.u16((body.len() / 4) as u16);
    reply.bytes(&body);

    log::debug!("setup reply: {} bytes, {} screens", 8 + body.len(), screens.len());
    reply.finish()
}
