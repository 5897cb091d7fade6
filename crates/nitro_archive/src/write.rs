//! Types for writing Nitro archives
//!

use bon::Builder;
use indexmap::IndexMap;
use std::fmt::Debug;
use std::io::Write;
use tracing::{debug, instrument};

use crate::compression::compress;
use crate::error::{Error, Result};
use crate::types::{write_member_count, NitroEntry, MEMBER_COUNT_SIZE};

pub use flate2::Compression;

/// Options for how the archive should be written
#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct NitroWriterOptions {
    /// The gzip level used for every member
    #[builder(default)]
    pub compression: Compression,
}

/// Nitro archive generator
///
/// Members are kept in the order they were first added. Adding a name a second time
/// replaces its contents but keeps its position.
///
/// ```
/// # fn doit() -> nitro_archive::error::Result<()>
/// # {
/// use nitro_archive::{write::{Compression, NitroWriterOptions}, NitroWriter};
///
/// let mut nitro = NitroWriter::new(NitroWriterOptions::builder()
///            .compression(Compression::best())
///            .build());
///
/// nitro.add_member("chair.json", br#"{"name":"chair"}"#.to_vec())?;
/// nitro.add_member("chair.png", vec![0x89, 0x50, 0x4E, 0x47])?;
///
/// let buffer = nitro.serialize()?;
/// assert_eq!(&buffer[..2], &[0x00, 0x02]);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct NitroWriter {
    members: IndexMap<Box<str>, Vec<u8>>,
    options: NitroWriterOptions,
}

impl NitroWriter {
    /// Initializes an empty archive.
    pub fn new(options: NitroWriterOptions) -> NitroWriter {
        NitroWriter {
            members: IndexMap::new(),
            options,
        }
    }

    /// Number of members registered so far
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no member has been registered
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether a member with this name has been registered
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Register a member.
    ///
    /// Fails without touching previously added members when the name or the data is
    /// empty, or when the name does not fit the two byte length prefix.
    #[instrument(skip(self, name, data), fields(name = %name.as_ref()), err)]
    pub fn add_member(&mut self, name: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Result<()> {
        let name = name.as_ref();
        let data: Vec<u8> = data.into();

        if name.is_empty() {
            return Err(Error::InvalidArgument("member name is empty".into()));
        }
        if data.is_empty() {
            return Err(Error::InvalidArgument(format!("member {} has no data", name)));
        }
        if name.len() > u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "member name is {} bytes, the limit is {}",
                name.len(),
                u16::MAX
            )));
        }
        if !self.members.contains_key(name) && self.members.len() == u16::MAX as usize {
            return Err(Error::InvalidArgument(format!(
                "an archive holds at most {} members",
                u16::MAX
            )));
        }

        if self.members.insert(name.into(), data).is_some() {
            debug!("replaced existing member");
        }

        Ok(())
    }

    /// Compress every member and write the archive to `inner`
    ///
    /// This will return the writer, but one should normally not append any data to the end of the file.
    #[instrument(skip_all, fields(members = self.members.len()), err)]
    pub fn write_to<W: Write>(&self, mut inner: W) -> Result<W> {
        // the member limit is enforced by add_member
        write_member_count(&mut inner, self.members.len() as u16)?;

        for (name, data) in &self.members {
            let entry = NitroEntry {
                name: name.clone(),
                payload: compress(data, self.options.compression)?,
            };
            debug!(name = %name, size = data.len(), compressed = entry.payload.len(), "writing member");
            entry.write(&mut inner)?;
        }

        Ok(inner)
    }

    /// Produce the archive as a new buffer
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let capacity = MEMBER_COUNT_SIZE
            + self
                .members
                .iter()
                .map(|(name, data)| name.len() + data.len() / 2 + 32)
                .sum::<usize>();
        self.write_to(Vec::with_capacity(capacity))
    }
}
