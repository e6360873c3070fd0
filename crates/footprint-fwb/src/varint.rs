use std::io::{self, Read, Write};

const MAX_RECORD_ID_BYTES: usize = 4;
const MAX_RECORD_LEN_BYTES: usize = 4;
const MAX_RECORD_LEN: u32 = 0x0FFF_FFFF;

fn unexpected_eof(context: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, context)
}

/// Read an FWB record id from `r`.
///
/// Record ids use the BIFF12 continuation scheme rather than standard
/// LEB128: bytes form a little-endian integer and the high bit of each byte
/// doubles as the continuation flag.
///
/// Returns `Ok(None)` when `r` is at EOF before reading any bytes.
pub fn read_record_id(r: &mut impl Read) -> io::Result<Option<u32>> {
    let mut v: u32 = 0;
    for i in 0..MAX_RECORD_ID_BYTES {
        let mut buf = [0u8; 1];
        match r.read(&mut buf)? {
            0 if i == 0 => return Ok(None),
            0 => return Err(unexpected_eof("unexpected EOF while reading record id")),
            _ => {}
        }

        let byte = buf[0];
        v |= (byte as u32) << (8 * i);
        if byte & 0x80 == 0 {
            return Ok(Some(v));
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "invalid record id (more than 4 bytes)",
    ))
}

/// Write an FWB record id to `w`. Mirrors [`read_record_id`]; ids that the
/// continuation scheme cannot represent losslessly return `InvalidInput`.
pub fn write_record_id(w: &mut impl Write, id: u32) -> io::Result<()> {
    let bytes = id.to_le_bytes();

    // Emit bytes while the previous one has its continuation bit set.
    let mut n = 1usize;
    while n < MAX_RECORD_ID_BYTES && (bytes[n - 1] & 0x80) != 0 {
        n += 1;
    }

    // A fourth byte with its high bit set would make the reader expect a
    // fifth, which the encoding forbids.
    if n == MAX_RECORD_ID_BYTES && (bytes[3] & 0x80) != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record id requires more than 4 bytes",
        ));
    }

    if bytes[n..].iter().any(|&b| b != 0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record id cannot be encoded without truncation",
        ));
    }

    w.write_all(&bytes[..n])
}

/// Read an FWB record payload length: a 7-bit varint of up to 4 bytes
/// (28 usable bits).
///
/// Returns `Ok(None)` when `r` is at EOF before reading any bytes.
pub fn read_record_len(r: &mut impl Read) -> io::Result<Option<u32>> {
    let mut v: u32 = 0;
    for i in 0..MAX_RECORD_LEN_BYTES {
        let mut buf = [0u8; 1];
        match r.read(&mut buf)? {
            0 if i == 0 => return Ok(None),
            0 => return Err(unexpected_eof("unexpected EOF while reading record length")),
            _ => {}
        }

        let byte = buf[0];
        v |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some(v));
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "invalid record length (more than 4 bytes)",
    ))
}

/// Write an FWB record payload length as a 7-bit varint.
pub fn write_record_len(w: &mut impl Write, mut len: u32) -> io::Result<()> {
    if len > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "record length exceeds 28-bit varint encoding",
        ));
    }

    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if len == 0 {
            return Ok(());
        }
    }
}
