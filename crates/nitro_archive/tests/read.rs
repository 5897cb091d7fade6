use flate2::{
    write::{DeflateEncoder, GzEncoder, ZlibEncoder},
    Compression,
};
use nitro_archive::{
    compression::LEGACY_ZLIB_HEADER,
    error::{Error, Result},
    types::{write_member_count, NitroEntry},
    CompressionMethod, NitroArchive,
};
use std::io::Write;
use tracing_test::traced_test;

const METADATA: &[u8] = br#"{"name":"lamp","logicType":"furniture_basic"}"#;

fn legacy(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(LEGACY_ZLIB_HEADER.to_vec(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn zlib(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn archive(entries: Vec<(&str, Vec<u8>)>) -> Vec<u8> {
    let mut buffer = Vec::new();
    write_member_count(&mut buffer, entries.len() as u16).unwrap();
    for (name, payload) in entries {
        NitroEntry {
            name: name.into(),
            payload,
        }
        .write(&mut buffer)
        .unwrap();
    }
    buffer
}

#[test]
fn read_members_from_every_encoder() -> Result<()> {
    let input = archive(vec![
        ("legacy.json", legacy(METADATA)),
        ("zlib.json", zlib(METADATA)),
        ("gzip.json", gzip(METADATA)),
    ]);

    let archive = NitroArchive::new(&input)?;
    assert_eq!(archive.len(), 3);

    let methods = archive
        .members()
        .map(|m| (m.name(), m.compression_method()))
        .collect::<Vec<_>>();
    assert_eq!(
        methods,
        vec![
            ("legacy.json", CompressionMethod::LegacyZlib),
            ("zlib.json", CompressionMethod::Zlib),
            ("gzip.json", CompressionMethod::Gzip),
        ]
    );

    for member in archive.members() {
        assert_eq!(member.data(), METADATA);
    }
    assert_eq!(archive.first_json_name(), Some("legacy.json"));

    Ok(())
}

#[traced_test]
#[test]
fn read_tolerates_corrupt_middle_member() -> Result<()> {
    let input = archive(vec![
        ("lamp.json", gzip(METADATA)),
        ("lamp_64.png", vec![0x13, 0x37, 0xDE, 0xAD, 0xBE, 0xEF]),
        ("lamp_32.png", gzip(&[0x89, 0x50, 0x4E, 0x47])),
    ]);

    let archive = NitroArchive::new(&input)?;
    assert_eq!(archive.len(), 2);
    assert_eq!(archive.by_name("lamp.json")?.data(), METADATA);
    assert_eq!(archive.by_name("lamp_32.png")?.data(), &[0x89u8, 0x50, 0x4E, 0x47]);
    assert!(archive.by_name("lamp_64.png").is_err());

    let failures = archive.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(&*failures[0].name, "lamp_64.png");
    assert_eq!(failures[0].compressed_size, 6);
    assert_eq!(failures[0].error.attempts.len(), 3);

    // the corrupt texture does not claim the texture slot
    assert_eq!(archive.first_texture_name(), Some("lamp_32.png"));
    assert!(logs_contain("lamp_64.png"));

    Ok(())
}

#[test]
fn read_rejects_truncated_payload() {
    #[rustfmt::skip]
    let mut input = vec![
        // Count
        0x00, 0x01,
        // Name
        0x00, 0x06, 0x61, 0x2E, 0x6A, 0x73, 0x6F, 0x6E,
        // Payload length of 500
        0x00, 0x00, 0x01, 0xF4,
    ];
    input.extend_from_slice(&[0u8; 10]);

    let err = NitroArchive::new(&input).unwrap_err();
    assert!(matches!(
        err,
        Error::TruncatedMember {
            index: 0,
            needed: 500,
            remaining: 10,
            ..
        }
    ));
}

#[test]
fn read_rejects_every_truncation_point() {
    let input = archive(vec![
        ("lamp.json", gzip(METADATA)),
        ("lamp.png", gzip(&[0x89, 0x50, 0x4E, 0x47])),
    ]);

    for end in 0..input.len() {
        let result = NitroArchive::new(&input[..end]);
        assert!(
            matches!(
                result,
                Err(Error::MalformedHeader(_)) | Err(Error::TruncatedMember { .. })
            ),
            "buffer cut at {end} was accepted"
        );
    }

    assert!(NitroArchive::new(&input).is_ok());
}
