//! Member compression and the decompression strategy selector.
//!
//! Archives in circulation were written by several encoders that disagree on how a
//! member payload is wrapped. Nothing in the framing says which one was used, so the
//! reader walks [`STRATEGIES`] in order and keeps the first one that decodes the
//! payload completely. The order is fixed: payloads that more than one strategy
//! accepts must resolve the same way every other reader resolves them.

use std::{
    fmt,
    io::{self, Read, Write},
};

use flate2::{read::GzDecoder, write::GzEncoder, Compression, Decompress, FlushDecompress, Status};
use tracing::{instrument, trace};

use crate::error::{AttemptOutcome, DecompressionError, StrategyAttempt};

/// Two byte prefix legacy encoders put in front of a bare deflate stream
pub const LEGACY_ZLIB_HEADER: [u8; 2] = [0x78, 0x9C];

/// Magic bytes opening every gzip member
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

const INFLATE_CHUNK: usize = 32 * 1024;

/// Identifies how a member payload was wrapped
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// `0x78 0x9C` followed by a raw deflate stream, without the adler32 trailer being trusted
    LegacyZlib,

    /// Deflate wrapped in a zlib header and adler32 trailer
    Zlib,

    /// Deflate wrapped in gzip framing, as written by [`crate::NitroWriter`]
    Gzip,
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::LegacyZlib => write!(f, "legacy-zlib"),
            CompressionMethod::Zlib => write!(f, "zlib"),
            CompressionMethod::Gzip => write!(f, "gzip"),
        }
    }
}

/// One entry of the selector table
#[derive(Clone, Copy)]
pub struct Strategy {
    /// The wrapping this strategy decodes
    pub method: CompressionMethod,
    /// Cheap check on the leading bytes of the payload
    pub detect: fn(&[u8]) -> bool,
    /// Full decode, only run when `detect` accepted the payload
    pub decompress: fn(&[u8]) -> io::Result<Vec<u8>>,
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Strategy({})", self.method)
    }
}

/// Strategies in the order they are tried
pub const STRATEGIES: [Strategy; 3] = [
    Strategy {
        method: CompressionMethod::LegacyZlib,
        detect: is_legacy_zlib,
        decompress: inflate_legacy_zlib,
    },
    Strategy {
        method: CompressionMethod::Zlib,
        detect: is_zlib,
        decompress: inflate_zlib,
    },
    Strategy {
        method: CompressionMethod::Gzip,
        detect: is_gzip,
        decompress: inflate_gzip,
    },
];

fn is_legacy_zlib(payload: &[u8]) -> bool {
    payload.starts_with(&LEGACY_ZLIB_HEADER)
}

/// CMF/FLG pair as defined by RFC 1950: deflate method and a header checksum divisible by 31
fn is_zlib(payload: &[u8]) -> bool {
    match payload {
        [cmf, flg, ..] => cmf & 0x0F == 8 && u16::from_be_bytes([*cmf, *flg]) % 31 == 0,
        _ => false,
    }
}

fn is_gzip(payload: &[u8]) -> bool {
    payload.starts_with(&GZIP_MAGIC)
}

fn inflate_legacy_zlib(payload: &[u8]) -> io::Result<Vec<u8>> {
    inflate(&payload[LEGACY_ZLIB_HEADER.len()..], false)
}

fn inflate_zlib(payload: &[u8]) -> io::Result<Vec<u8>> {
    inflate(payload, true)
}

fn inflate_gzip(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(payload.len() * 2);
    GzDecoder::new(payload).read_to_end(&mut output)?;
    Ok(output)
}

/// Inflates `input` and requires the deflate stream to reach its final block.
///
/// A stream that runs out of input before its end is an error rather than a short
/// result, so a truncated payload can fall through to the next strategy.
fn inflate(input: &[u8], zlib_header: bool) -> io::Result<Vec<u8>> {
    let mut decompress = Decompress::new(zlib_header);
    let mut output = Vec::with_capacity(input.len() * 2);

    loop {
        output.reserve(INFLATE_CHUNK);

        let before = (decompress.total_in(), decompress.total_out());
        let consumed = decompress.total_in() as usize;
        let status = decompress
            .decompress_vec(&input[consumed..], &mut output, FlushDecompress::None)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if status == Status::StreamEnd {
            return Ok(output);
        }

        if (decompress.total_in(), decompress.total_out()) == before {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "deflate stream ended before its final block",
            ));
        }
    }
}

/// Runs the selector over a member payload.
///
/// Returns the decoded bytes together with the strategy that produced them, or a
/// [`DecompressionError`] listing every strategy and why it was rejected.
#[instrument(skip(payload), fields(size = payload.len()))]
pub fn decompress(payload: &[u8]) -> Result<(CompressionMethod, Vec<u8>), DecompressionError> {
    let mut attempts = Vec::with_capacity(STRATEGIES.len());

    for strategy in &STRATEGIES {
        if !(strategy.detect)(payload) {
            attempts.push(StrategyAttempt {
                method: strategy.method,
                outcome: AttemptOutcome::NotDetected,
            });
            continue;
        }

        match (strategy.decompress)(payload) {
            Ok(data) => {
                trace!(method = %strategy.method, decoded = data.len(), "payload decoded");
                return Ok((strategy.method, data));
            }
            Err(e) => {
                trace!(method = %strategy.method, error = %e, "strategy rejected payload");
                attempts.push(StrategyAttempt {
                    method: strategy.method,
                    outcome: AttemptOutcome::Failed(e.to_string()),
                });
            }
        }
    }

    Err(DecompressionError {
        payload_len: payload.len(),
        attempts,
    })
}

/// Compresses a member the way [`crate::NitroWriter`] stores it
#[instrument(skip(data), fields(size = data.len()), err)]
pub fn compress(data: &[u8], level: Compression) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), level);
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use flate2::{
        write::{DeflateEncoder, ZlibEncoder},
        Compression,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    const TEXT: &[u8] = b"{\"name\":\"chair\",\"visualizations\":[64,32,1]}";

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn legacy(data: &[u8]) -> Vec<u8> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        let mut payload = LEGACY_ZLIB_HEADER.to_vec();
        payload.extend(encoder.finish().unwrap());
        payload
    }

    #[test]
    fn gzip_payload_is_decoded() {
        let payload = compress(TEXT, Compression::default()).unwrap();
        assert!(payload.starts_with(&GZIP_MAGIC));

        let (method, data) = decompress(&payload).unwrap();
        assert_eq!(method, CompressionMethod::Gzip);
        assert_eq!(data, TEXT);
    }

    #[test]
    fn legacy_payload_matches_standard_zlib() {
        let (legacy_method, legacy_data) = decompress(&legacy(TEXT)).unwrap();
        let (_, zlib_data) = decompress(&zlib(TEXT)).unwrap();

        assert_eq!(legacy_method, CompressionMethod::LegacyZlib);
        assert_eq!(legacy_data, zlib_data);
        assert_eq!(legacy_data, TEXT);
    }

    #[test]
    fn default_zlib_stream_resolves_to_legacy_strategy() {
        // the default encoder level also emits 0x78 0x9C, so the first strategy wins
        let (method, data) = decompress(&zlib(TEXT)).unwrap();
        assert_eq!(method, CompressionMethod::LegacyZlib);
        assert_eq!(data, TEXT);
    }

    #[test]
    fn best_zlib_stream_uses_zlib_strategy() {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(TEXT).unwrap();
        let payload = encoder.finish().unwrap();
        assert_eq!(&payload[..2], &[0x78, 0xDA]);

        let (method, data) = decompress(&payload).unwrap();
        assert_eq!(method, CompressionMethod::Zlib);
        assert_eq!(data, TEXT);
    }

    #[test]
    fn garbage_reports_every_strategy() {
        let err = decompress(b"definitely not compressed").unwrap_err();
        assert_eq!(err.payload_len, 25);
        assert_eq!(
            err.attempts
                .iter()
                .map(|a| (a.method, a.outcome.clone()))
                .collect::<Vec<_>>(),
            vec![
                (CompressionMethod::LegacyZlib, AttemptOutcome::NotDetected),
                (CompressionMethod::Zlib, AttemptOutcome::NotDetected),
                (CompressionMethod::Gzip, AttemptOutcome::NotDetected),
            ]
        );
    }

    #[test]
    fn empty_payload_is_rejected() {
        let err = decompress(&[]).unwrap_err();
        assert_eq!(err.payload_len, 0);
        assert!(err
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::NotDetected));
    }

    #[test]
    fn truncated_gzip_fails() {
        let payload = compress(TEXT, Compression::default()).unwrap();
        let err = decompress(&payload[..payload.len() - 6]).unwrap_err();

        let gzip = err.attempts.last().unwrap();
        assert_eq!(gzip.method, CompressionMethod::Gzip);
        assert!(matches!(gzip.outcome, AttemptOutcome::Failed(_)));
    }

    #[test]
    fn truncated_legacy_stream_fails() {
        let payload = legacy(TEXT);
        let err = decompress(&payload[..payload.len() / 2]).unwrap_err();
        assert!(matches!(err.attempts[0].outcome, AttemptOutcome::Failed(_)));
    }
}
