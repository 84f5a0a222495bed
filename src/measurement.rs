//! The measurement value type and its wire encoding.
//!
//! A session is a sequence of fixed-width records, each the
//! concatenation of `sensor_id` (u16), `value` (f64) and `timestamp`
//! (i64) in that order, in the platform's native byte order — no
//! framing, no header, no version. This is a known interoperability
//! hazard (sender and receiver must share representation); see
//! spec.md §9. Bit-exact behavior is preserved deliberately.

use std::io::{self, Read, Write};

/// One immutable sensor reading.
///
/// Produced once by a per-session reader, consumed once by each of the
/// Data Manager and Storage Manager reader positions, never mutated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Sensor that produced this reading.
    pub sensor_id: u16,
    /// Raw temperature reading.
    pub value: f64,
    /// Seconds since epoch, as reported by the sensor node.
    pub timestamp: i64,
}

const SENSOR_ID_LEN: usize = std::mem::size_of::<u16>();
const VALUE_LEN: usize = std::mem::size_of::<f64>();
const TIMESTAMP_LEN: usize = std::mem::size_of::<i64>();

impl Measurement {
    /// Read one field at a time off `reader`, in wire order, calling
    /// `before_field` before each read so the caller can arm an idle
    /// timeout. Returns `Ok(None)` on a clean peer close before any
    /// bytes of the first field arrive (a normal session end, not an
    /// error); returns `Err` on a short read mid-record or any I/O
    /// failure.
    pub fn read_from<R: Read>(
        reader: &mut R,
        mut before_field: impl FnMut() -> io::Result<()>,
    ) -> io::Result<Option<Self>> {
        let mut id_buf = [0u8; SENSOR_ID_LEN];
        before_field()?;
        if !read_exact_or_eof(reader, &mut id_buf)? {
            return Ok(None);
        }

        let mut value_buf = [0u8; VALUE_LEN];
        before_field()?;
        reader.read_exact(&mut value_buf)?;

        let mut ts_buf = [0u8; TIMESTAMP_LEN];
        before_field()?;
        reader.read_exact(&mut ts_buf)?;

        Ok(Some(Self {
            sensor_id: u16::from_ne_bytes(id_buf),
            value: f64::from_ne_bytes(value_buf),
            timestamp: i64::from_ne_bytes(ts_buf),
        }))
    }

    /// Encode in native-endian wire order, for use by test fixtures
    /// that play the sensor-node side of the protocol.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.sensor_id.to_ne_bytes())?;
        writer.write_all(&self.value.to_ne_bytes())?;
        writer.write_all(&self.timestamp.to_ne_bytes())?;
        Ok(())
    }
}

/// Like `read_exact`, but treats zero bytes read before any byte of
/// `buf` arrives as a clean EOF (`Ok(false)`) rather than an error,
/// and a short read partway through `buf` as `UnexpectedEof`.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "short read mid-record"))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}
