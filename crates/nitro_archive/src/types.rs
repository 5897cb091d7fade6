//! Base types for the framing of a Nitro archive.
//!
//! All integers are big endian regardless of the host.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use tracing::trace;

use crate::error::{Error, HeaderError, Result};

/// Size of the member count at the start of the archive
pub const MEMBER_COUNT_SIZE: usize = 2;

/// Size of the name length prefix of a member
pub const NAME_LENGTH_SIZE: usize = 2;

/// Size of the payload length prefix of a member
pub const PAYLOAD_LENGTH_SIZE: usize = 4;

/// A member as it is stored in the archive, before its payload is decoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NitroEntry {
    /// Name of the member, decoded from UTF-8
    pub name: Box<str>,

    /// Compressed payload
    pub payload: Vec<u8>,
}

fn remaining(reader: &Cursor<&[u8]>) -> usize {
    reader
        .get_ref()
        .len()
        .saturating_sub(reader.position() as usize)
}

fn ensure(reader: &Cursor<&[u8]>, index: usize, field: &'static str, needed: usize) -> Result<()> {
    let remaining = remaining(reader);
    if needed > remaining {
        return Err(Error::TruncatedMember {
            index,
            field,
            needed,
            remaining,
        });
    }
    Ok(())
}

/// Reads the member count that opens the archive
pub fn read_member_count(reader: &mut Cursor<&[u8]>) -> Result<u16> {
    if remaining(reader) < MEMBER_COUNT_SIZE {
        return Err(HeaderError::Missing(reader.get_ref().len()).into());
    }
    Ok(reader.read_u16::<BigEndian>()?)
}

/// Writes the member count that opens the archive
pub fn write_member_count<W: Write>(writer: &mut W, count: u16) -> Result<()> {
    writer.write_u16::<BigEndian>(count)?;
    Ok(())
}

impl NitroEntry {
    /// Reads the member at `index` from the current position.
    ///
    /// `declared` is the member count from the header. Running out of bytes exactly at
    /// a member boundary means the header over-counted; running out anywhere inside a
    /// member means the member itself is truncated.
    pub fn read(reader: &mut Cursor<&[u8]>, index: usize, declared: u16) -> Result<NitroEntry> {
        if remaining(reader) == 0 {
            return Err(HeaderError::CountMismatch {
                declared,
                found: index,
            }
            .into());
        }

        ensure(reader, index, "name length", NAME_LENGTH_SIZE)?;
        let name_len = reader.read_u16::<BigEndian>()? as usize;
        if name_len == 0 {
            return Err(Error::EmptyMemberName { index });
        }

        ensure(reader, index, "name", name_len)?;
        let mut name_raw = vec![0u8; name_len];
        reader.read_exact(&mut name_raw)?;

        ensure(reader, index, "payload length", PAYLOAD_LENGTH_SIZE)?;
        let payload_len = reader.read_u32::<BigEndian>()? as usize;

        ensure(reader, index, "payload", payload_len)?;
        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        let name: Box<str> = String::from_utf8_lossy(&name_raw).into();
        trace!(index, name = %name, payload_len, "read member framing");

        Ok(NitroEntry { name, payload })
    }

    /// Writes the framing and payload of this member
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let name_len = u16::try_from(self.name.len()).map_err(|_| {
            Error::InvalidArgument(format!(
                "member name is {} bytes, the limit is {}",
                self.name.len(),
                u16::MAX
            ))
        })?;
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            Error::InvalidArgument(format!(
                "payload of {} is {} bytes, the limit is {}",
                self.name,
                self.payload.len(),
                u32::MAX
            ))
        })?;

        writer.write_u16::<BigEndian>(name_len)?;
        writer.write_all(self.name.as_bytes())?;
        writer.write_u32::<BigEndian>(payload_len)?;
        writer.write_all(&self.payload)?;

        Ok(())
    }

    /// Number of bytes this member occupies in the archive
    pub fn framed_len(&self) -> usize {
        NAME_LENGTH_SIZE + self.name.len() + PAYLOAD_LENGTH_SIZE + self.payload.len()
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, HeaderError, Result};
    use crate::types::{read_member_count, write_member_count, NitroEntry};

    #[test]
    fn read_entry() -> Result<()> {
        #[rustfmt::skip]
        let input: &[u8] = &[
            0x00, 0x06,
            0x61, 0x2E, 0x6A, 0x73, 0x6F, 0x6E,
            0x00, 0x00, 0x00, 0x03,
            0x01, 0x02, 0x03,
        ];

        let mut reader = Cursor::new(input);
        let entry = NitroEntry::read(&mut reader, 0, 1)?;

        assert_eq!(
            entry,
            NitroEntry {
                name: "a.json".into(),
                payload: vec![0x01, 0x02, 0x03],
            }
        );
        assert_eq!(reader.position() as usize, input.len());
        assert_eq!(entry.framed_len(), input.len());

        Ok(())
    }

    #[test]
    fn write_entry() -> Result<()> {
        #[rustfmt::skip]
        let expected: Vec<u8> = vec![
            0x00, 0x01,
            0x61,
            0x00, 0x00, 0x01, 0x02,
        ];

        let entry = NitroEntry {
            name: "a".into(),
            payload: vec![0xEE; 0x0102],
        };

        let mut actual = Vec::new();
        entry.write(&mut actual)?;

        assert_eq!(&actual[..7], &expected[..]);
        assert_eq!(actual.len(), 7 + 0x0102);

        Ok(())
    }

    #[test]
    fn write_count_is_big_endian() -> Result<()> {
        let mut actual = Vec::new();
        write_member_count(&mut actual, 0x0102)?;
        assert_eq!(actual, vec![0x01, 0x02]);
        Ok(())
    }

    #[test]
    fn read_count_from_short_buffer() {
        let input: &[u8] = &[0x00];
        let err = read_member_count(&mut Cursor::new(input)).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedHeader(HeaderError::Missing(1))
        ));
    }

    #[test]
    fn read_entry_with_truncated_payload() {
        #[rustfmt::skip]
        let input: &[u8] = &[
            0x00, 0x01,
            0x61,
            0x00, 0x00, 0x01, 0xF4,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let err = NitroEntry::read(&mut Cursor::new(input), 3, 4).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedMember {
                index: 3,
                field: "payload",
                needed: 500,
                remaining: 10,
            }
        ));
    }

    #[test]
    fn read_entry_with_truncated_name() {
        let input: &[u8] = &[0x00, 0x09, 0x61, 0x62];

        let err = NitroEntry::read(&mut Cursor::new(input), 0, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::TruncatedMember {
                field: "name",
                needed: 9,
                remaining: 2,
                ..
            }
        ));
    }

    #[test]
    fn read_entry_with_empty_name() {
        let input: &[u8] = &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

        let err = NitroEntry::read(&mut Cursor::new(input), 2, 3).unwrap_err();
        assert!(matches!(err, Error::EmptyMemberName { index: 2 }));
    }

    #[test]
    fn read_entry_past_end() {
        let input: &[u8] = &[];

        let err = NitroEntry::read(&mut Cursor::new(input), 1, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedHeader(HeaderError::CountMismatch {
                declared: 2,
                found: 1
            })
        ));
    }
}
