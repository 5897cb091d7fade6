//! This library handles reading from and creating **Nitro** asset archives.
//!
//! # Nitro Archive Format Documentation
//!
//! A Nitro archive bundles the files that make up a single game asset, typically one
//! JSON metadata file and one PNG texture atlas, into one buffer. Each file is stored
//! as an independently compressed member. Archives are usually identified with the
//! `.nitro` extension.
//!
//! ## File Structure
//!
//! An archive is a member count followed by that many members. There is no magic
//! number, index, or checksum.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Member Count           | 2 bytes: Number of members that follow                     |
//! | 0x0002         | Members                | Member Count members, back to back                         |
//!
//! ### Member
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Name Length            | 2 bytes: Length of the name in bytes                       |
//! | 0x0002         | Name                   | Name Length bytes: UTF-8 file name                         |
//! | +0x0000        | Payload Length         | 4 bytes: Length of the compressed payload                  |
//! | +0x0004        | Payload                | Payload Length bytes: compressed file contents             |
//!
//! - **Name Length** is never zero and a name never reaches past the end of the buffer.
//! - **Payload Length** may be zero, but such a member cannot be decoded.
//!
//! ### Payload
//!
//! The framing does not record how a payload was compressed. Archives written by
//! [`NitroWriter`] always use gzip, but older encoders produced other wrappings. The
//! reader tries, in this order:
//!
//! 1. `0x78 0x9C` followed by a raw deflate stream
//! 2. a standard zlib stream
//! 3. a gzip stream
//!
//! See [`compression`] for the details.
//!
//! ## Additional Information
//!
//! - **File Extension**: `.nitro`
//! - **Endianness**: Big-endian for all multi-byte integers
//! - Members named `*.json` and `*.png` are surfaced through
//!   [`NitroArchive::first_json`] and [`NitroArchive::first_texture`]
//!

pub mod compression;
pub mod error;
pub mod read;
pub mod types;
pub mod write;

pub use compression::CompressionMethod;
pub use read::NitroArchive;
pub use write::NitroWriter;

use write::NitroWriterOptions;

/// Parse an archive buffer, decoding every member.
pub fn decode(buffer: &[u8]) -> error::Result<NitroArchive> {
    NitroArchive::new(buffer)
}

/// Build an archive from named buffers using the default options.
///
/// Members are written in iteration order. A repeated name replaces the earlier
/// contents but keeps the earlier position.
pub fn encode<I, N, D>(members: I) -> error::Result<Vec<u8>>
where
    I: IntoIterator<Item = (N, D)>,
    N: AsRef<str>,
    D: Into<Vec<u8>>,
{
    let mut writer = NitroWriter::new(NitroWriterOptions::default());
    for (name, data) in members {
        writer.add_member(name, data)?;
    }
    writer.serialize()
}
