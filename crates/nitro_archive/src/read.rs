//! Types for reading Nitro archives
//!

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use std::io::Cursor;
use tracing::{debug, instrument, warn};

use crate::{
    compression::{self, CompressionMethod},
    error::{DecompressionError, Error, FileNotFoundError, Result},
    types::{read_member_count, NitroEntry},
};

/// Extension of the member surfaced through [`NitroArchive::first_json`]
pub const JSON_EXTENSION: &str = ".json";

/// Extension of the member surfaced through [`NitroArchive::first_texture`]
pub const TEXTURE_EXTENSION: &str = ".png";

/// A decoded member of a Nitro archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NitroMember {
    name: Box<str>,
    data: Vec<u8>,
    compressed_size: u64,
    compression_method: CompressionMethod,
}

impl NitroMember {
    /// Get the name of the member
    ///
    /// # Warnings
    ///
    /// It is dangerous to use this name directly when extracting an archive.
    /// It may contain an absolute path (`/etc/shadow`), or break out of the
    /// current directory (`../runtime`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the decoded contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take ownership of the decoded contents
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Get the size of the member, in bytes, when decoded
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Get the size of the payload, in bytes, in the archive
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the strategy that decoded this member
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }
}

/// A member that was framed correctly but could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    /// Position of the member inside the archive
    pub index: usize,
    /// Name of the member
    pub name: Box<str>,
    /// Size of the payload that was rejected
    pub compressed_size: u64,
    /// Every strategy that was considered
    pub error: DecompressionError,
}

/// Nitro archive reader
///
/// The whole buffer is parsed and every member decoded when the archive is opened.
/// Members whose payload cannot be decoded are skipped and reported through
/// [`NitroArchive::failures`].
///
/// ```no_run
/// fn list_nitro_contents(buffer: &[u8]) -> nitro_archive::error::Result<()> {
///     let archive = nitro_archive::NitroArchive::new(buffer)?;
///
///     for member in archive.members() {
///         println!("{}: {} bytes", member.name(), member.size());
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct NitroArchive {
    members: IndexMap<Box<str>, NitroMember>,
    failures: Vec<MemberFailure>,
    first_json: Option<(Box<str>, serde_json::Value)>,
    first_texture: Option<(Box<str>, String)>,
}

impl NitroArchive {
    /// Parse a Nitro archive, decoding every member it contains.
    ///
    /// Framing errors abort the parse. Members that no strategy can decode are
    /// logged and skipped.
    #[instrument(skip(buffer), fields(size = buffer.len()), err)]
    pub fn new(buffer: &[u8]) -> Result<NitroArchive> {
        let mut reader = Cursor::new(buffer);
        let declared = read_member_count(&mut reader)?;
        debug!(declared, "reading archive");

        let mut archive = NitroArchive {
            members: IndexMap::with_capacity(declared as usize),
            ..Default::default()
        };

        for index in 0..declared as usize {
            let entry = NitroEntry::read(&mut reader, index, declared)?;
            archive.insert(index, entry);
        }

        let trailing = buffer.len() - reader.position() as usize;
        if trailing > 0 {
            debug!(trailing, "ignoring bytes after the last member");
        }

        Ok(archive)
    }

    fn insert(&mut self, index: usize, entry: NitroEntry) {
        let NitroEntry { name, payload } = entry;

        let (compression_method, data) = match compression::decompress(&payload) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(
                    index,
                    name = %name,
                    compressed_size = payload.len(),
                    %error,
                    "skipping member that could not be decompressed"
                );
                self.failures.push(MemberFailure {
                    index,
                    name,
                    compressed_size: payload.len() as u64,
                    error,
                });
                return;
            }
        };

        if self.first_json.is_none() && name.ends_with(JSON_EXTENSION) {
            match serde_json::from_slice(&data) {
                Ok(value) => self.first_json = Some((name.clone(), value)),
                Err(e) => warn!(name = %name, error = %e, "member is not valid json"),
            }
        }

        if self.first_texture.is_none() && name.ends_with(TEXTURE_EXTENSION) {
            self.first_texture = Some((name.clone(), STANDARD.encode(&data)));
        }

        let member = NitroMember {
            name: name.clone(),
            data,
            compressed_size: payload.len() as u64,
            compression_method,
        };

        if self.members.insert(name, member).is_some() {
            debug!(index, "member name repeated, keeping the later one");
        }
    }

    /// Number of decoded members contained in this archive.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether this archive contains no decoded members
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the decoded members, if it can be known.
    pub fn decompressed_size(&self) -> Option<u128> {
        let mut total = 0u128;
        for member in self.members.values() {
            total = total.checked_add(member.size() as u128)?;
        }
        Some(total)
    }

    /// Returns an iterator over the names of the decoded members, in archive order.
    pub fn file_names(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(|s| s.as_ref())
    }

    /// Returns an iterator over the decoded members, in archive order.
    pub fn members(&self) -> impl Iterator<Item = &NitroMember> {
        self.members.values()
    }

    /// Members that were skipped because their payload could not be decoded
    pub fn failures(&self) -> &[MemberFailure] {
        &self.failures
    }

    /// Get the index of a member by name, if it's present.
    #[inline(always)]
    pub fn index_for_name(&self, name: &str) -> Option<usize> {
        self.members.get_index_of(name)
    }

    /// Get the name of a member, if it's present.
    #[inline(always)]
    pub fn name_for_index(&self, index: usize) -> Option<&str> {
        self.members.get_index(index).map(|(name, _)| name.as_ref())
    }

    /// Search for a member by name
    pub fn by_name(&self, name: &str) -> Result<&NitroMember> {
        self.members
            .get(name)
            .ok_or_else(|| Error::FileNotFound(FileNotFoundError::Name(name.to_owned())))
    }

    /// Get a decoded member by index
    pub fn by_index(&self, index: usize) -> Result<&NitroMember> {
        self.members
            .get_index(index)
            .map(|(_, member)| member)
            .ok_or(Error::FileNotFound(FileNotFoundError::Index(index)))
    }

    /// Parsed contents of the first `.json` member that decoded to valid JSON
    pub fn first_json(&self) -> Option<&serde_json::Value> {
        self.first_json.as_ref().map(|(_, value)| value)
    }

    /// Name of the member behind [`NitroArchive::first_json`]
    pub fn first_json_name(&self) -> Option<&str> {
        self.first_json.as_ref().map(|(name, _)| name.as_ref())
    }

    /// Base64 encoded contents of the first decoded `.png` member
    pub fn first_texture(&self) -> Option<&str> {
        self.first_texture.as_ref().map(|(_, texture)| texture.as_str())
    }

    /// Name of the member behind [`NitroArchive::first_texture`]
    pub fn first_texture_name(&self) -> Option<&str> {
        self.first_texture.as_ref().map(|(name, _)| name.as_ref())
    }

    /// Consume the archive, returning the decoded contents keyed by name
    pub fn into_members(self) -> IndexMap<Box<str>, Vec<u8>> {
        self.members
            .into_iter()
            .map(|(name, member)| (name, member.data))
            .collect()
    }
}
