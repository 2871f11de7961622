/**
 * Framed message I/O.
 *
 * Every logical message on the controller channel is a big-endian 32-bit
 * length followed by that many bytes of ASCII payload, with no terminator.
 * Reads and writes loop until the frame is complete; a peer that goes away
 * mid-frame is a frame error, not a partial message.
 */

/***************************************/
/*             Libraries               */
/***************************************/
use std::io::{self, Read, Write};
use thiserror::Error;

/***************************************/
/*             Constants               */
/***************************************/

// Upper bound on a sane frame. A prefix beyond this is a corrupt or hostile
// peer, not a message.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/***************************************/
/*               Errors                */
/***************************************/
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed by peer")]
    Closed,
    #[error("frame length {0} exceeds limit")]
    Oversize(u32),
    #[error("frame payload is not valid UTF-8")]
    Encoding,
    #[error("frame I/O failed: {0}")]
    Io(#[from] io::Error),
}

/***************************************/
/*             Public API              */
/***************************************/

/// Writes one length-prefixed frame.
pub fn send_frame<W: Write>(writer: &mut W, message: &str) -> Result<(), FrameError> {
    if message.len() > MAX_FRAME_LEN as usize {
        return Err(FrameError::Oversize(message.len() as u32));
    }
    let len = message.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(message.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Reads one length-prefixed frame, looping over short reads.
pub fn recv_frame<R: Read>(reader: &mut R) -> Result<String, FrameError> {
    let mut prefix = [0u8; 4];
    read_full(reader, &mut prefix)?;

    let len = u32::from_be_bytes(prefix);
    if len > MAX_FRAME_LEN {
        return Err(FrameError::Oversize(len));
    }

    let mut payload = vec![0u8; len as usize];
    read_full(reader, &mut payload)?;
    String::from_utf8(payload).map_err(|_| FrameError::Encoding)
}

/***************************************/
/*           Local functions           */
/***************************************/

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), FrameError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(FrameError::Closed),
        Err(e) => Err(FrameError::Io(e)),
    }
}
