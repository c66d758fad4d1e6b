//! VCDIFF header parsing, scoped to exactly what the zero-delta witness check
//! needs (see the recognition rule in the component design): `data section
//! length == 0`, `copy window offset == 0`, `copy window length == target
//! window length == source_size`, and a single `CPY_0` instruction spanning
//! the whole window.
//!
//! We deliberately do not implement a general VCDIFF/RFC 3284 decoder. The
//! full default code table has 256 entries including two-instruction
//! compound entries (ADD+COPY, COPY+ADD) that a generic delta can use; none
//! of those can appear in a *zero-delta* encoding, because `data section
//! length == 0` already rules out any instruction that carries literal
//! bytes (ADD, RUN). The only instruction family left is COPY, so the
//! decoder below only resolves the single-instruction COPY region of the
//! default table (entries 0..=162: RUN at 0, ADD at 1..=18, COPY at
//! 19..=162 across the 9 address modes) and treats anything else —
//! including the compound entries 163..=255 — as "not a zero-delta
//! witness" rather than guessing at their shape. Rejecting an unrecognized
//! instruction is always the safe direction: a real non-trivial delta is
//! never misreported as zero-delta.

use std::io::Read;

use crate::error::EngineError;

const VCDIFF_MAGIC: [u8; 3] = [0xD6, 0xC3, 0xC4];

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn byte(&mut self) -> Result<u8, EngineError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| EngineError::XdeltaMismatch)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], EngineError> {
        let end = self.pos.checked_add(n).ok_or(EngineError::XdeltaMismatch)?;
        let slice = self.buf.get(self.pos..end).ok_or(EngineError::XdeltaMismatch)?;
        self.pos = end;
        Ok(slice)
    }

    /// VCDIFF integers are base-128, most-significant-byte first, with the
    /// continuation bit set on every byte but the last.
    fn varint(&mut self) -> Result<u64, EngineError> {
        let mut value: u64 = 0;
        for _ in 0..10 {
            let b = self.byte()?;
            value = (value << 7) | (b & 0x7f) as u64;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(EngineError::XdeltaMismatch)
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

const VCD_SOURCE: u8 = 0x01;
const VCD_TARGET: u8 = 0x02;
const VCD_ADLER32: u8 = 0x04;

const VCD_DECOMPRESS: u8 = 0x01;
const VCD_CODETABLE: u8 = 0x02;

#[derive(Debug, Clone, Copy)]
struct WindowHeader {
    source_segment_size: u64,
    source_segment_position: u64,
    target_window_length: u64,
    data_section_length: u64,
    instructions_section_length: u64,
    addresses_section_length: u64,
}

fn parse_file_header(c: &mut Cursor) -> Result<(), EngineError> {
    let magic = c.take(3)?;
    if magic != VCDIFF_MAGIC {
        return Err(EngineError::XdeltaMismatch);
    }
    let _version = c.byte()?;
    let hdr_indicator = c.byte()?;
    if hdr_indicator & VCD_DECOMPRESS != 0 {
        let _secondary_compressor_id = c.byte()?;
    }
    if hdr_indicator & VCD_CODETABLE != 0 {
        let len = c.varint()?;
        c.take(len as usize)?;
    }
    Ok(())
}

fn parse_window_header(c: &mut Cursor) -> Result<WindowHeader, EngineError> {
    let win_indicator = c.byte()?;
    let (source_segment_size, source_segment_position) = if win_indicator & (VCD_SOURCE | VCD_TARGET) != 0 {
        (c.varint()?, c.varint()?)
    } else {
        (0, 0)
    };
    let _delta_encoding_length = c.varint()?;
    let target_window_length = c.varint()?;
    let delta_indicator = c.byte()?;
    if delta_indicator != 0 {
        // Secondary-compressed delta section; never produced for a
        // zero-delta witness, so we don't decode it.
        return Err(EngineError::XdeltaMismatch);
    }
    let data_section_length = c.varint()?;
    let instructions_section_length = c.varint()?;
    let addresses_section_length = c.varint()?;
    if win_indicator & VCD_ADLER32 != 0 {
        c.take(4)?;
    }
    Ok(WindowHeader {
        source_segment_size,
        source_segment_position,
        target_window_length,
        data_section_length,
        instructions_section_length,
        addresses_section_length,
    })
}

/// Decoded shape of the single instruction in a COPY-only window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CopyInstruction {
    mode: u8,
    size: u64,
}

fn decode_single_copy_instruction(instructions: &[u8]) -> Result<CopyInstruction, EngineError> {
    let mut c = Cursor::new(instructions);
    let code = c.byte()?;
    let copy = match code {
        0 => return Err(EngineError::XdeltaMismatch), // RUN
        1..=18 => return Err(EngineError::XdeltaMismatch), // ADD
        19..=162 => {
            let offset = code - 19;
            let mode = offset / 16;
            let size_selector = offset % 16;
            let size = if size_selector == 0 {
                c.varint()?
            } else {
                (size_selector as u64) + 3
            };
            CopyInstruction { mode, size }
        }
        _ => return Err(EngineError::XdeltaMismatch), // compound entry
    };
    if c.remaining() != 0 {
        // More than one instruction in the window.
        return Err(EngineError::XdeltaMismatch);
    }
    Ok(copy)
}

fn decode_single_address(addresses: &[u8]) -> Result<u64, EngineError> {
    let mut c = Cursor::new(addresses);
    let addr = c.varint()?;
    if c.remaining() != 0 {
        return Err(EngineError::XdeltaMismatch);
    }
    Ok(addr)
}

/// Check whether `vcdiff_bytes` proves `flac_decode(encoded) == source` for
/// a source of `source_size` bytes, per the recognition rule in §6.
pub fn is_zero_delta_witness(vcdiff_bytes: &[u8], source_size: u64) -> Result<bool, EngineError> {
    let mut c = Cursor::new(vcdiff_bytes);
    parse_file_header(&mut c)?;
    let window = parse_window_header(&mut c)?;

    if window.data_section_length != 0 {
        return Ok(false);
    }
    if window.source_segment_position != 0 {
        return Ok(false);
    }
    if window.source_segment_size != source_size || window.target_window_length != source_size {
        return Ok(false);
    }

    let instructions = c.take(window.instructions_section_length as usize)?;
    let addresses = c.take(window.addresses_section_length as usize)?;

    let copy = match decode_single_copy_instruction(instructions) {
        Ok(c) => c,
        Err(_) => return Ok(false),
    };
    if copy.mode != 0 || copy.size != source_size {
        return Ok(false);
    }
    let addr = match decode_single_address(addresses) {
        Ok(a) => a,
        Err(_) => return Ok(false),
    };
    Ok(addr == 0)
}

/// Read a `.xdelta` file from disk and classify it.
pub fn is_zero_delta_witness_file(path: &std::path::Path, source_size: u64) -> Result<bool, EngineError> {
    let mut buf = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut buf))
        .map_err(EngineError::from)?;
    is_zero_delta_witness(&buf, source_size)
}

/// Hand-encodes exactly the VCDIFF shape our decoder expects: a single
/// window, one COPY mode-0 instruction spanning `source_size`, no secondary
/// compression, no checksum. Test-only: used to exercise the decoder above
/// and by fake `ExternalTools` in other modules' tests; it is not a general
/// VCDIFF encoder.
#[cfg(test)]
pub(crate) fn encode_zero_delta(source_size: u64) -> Vec<u8> {
    fn push_varint(out: &mut Vec<u8>, mut value: u64) {
        let mut stack = Vec::new();
        stack.push((value & 0x7f) as u8);
        value >>= 7;
        while value > 0 {
            stack.push(((value & 0x7f) as u8) | 0x80);
            value >>= 7;
        }
        out.extend(stack.into_iter().rev());
    }

    let mut out = Vec::new();
    out.extend_from_slice(&VCDIFF_MAGIC);
    out.push(0x00);
    out.push(0x00);
    out.push(VCD_SOURCE);
    push_varint(&mut out, source_size);
    push_varint(&mut out, 0);

    let mut instructions = Vec::new();
    instructions.push(19);
    push_varint(&mut instructions, source_size);
    let mut addresses = Vec::new();
    push_varint(&mut addresses, 0);

    let mut window_body = Vec::new();
    push_varint(&mut window_body, source_size);
    window_body.push(0x00);
    push_varint(&mut window_body, 0);
    push_varint(&mut window_body, instructions.len() as u64);
    push_varint(&mut window_body, addresses.len() as u64);
    window_body.extend_from_slice(&instructions);
    window_body.extend_from_slice(&addresses);

    push_varint(&mut out, window_body.len() as u64);
    out.extend_from_slice(&window_body);
    out
}
