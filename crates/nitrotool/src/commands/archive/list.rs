use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use nitro_archive::NitroArchive;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// An input Nitro file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let buffer = std::fs::read(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let nitro = NitroArchive::new(&buffer)?;

        println!(
            "{:>10} {:>10}  {:<11} {}",
            "size".bold(),
            "packed".bold(),
            "method".bold(),
            "name".bold()
        );

        for member in nitro.members() {
            let role = if Some(member.name()) == nitro.first_json_name() {
                format!(" {}", "(metadata)".cyan())
            } else if Some(member.name()) == nitro.first_texture_name() {
                format!(" {}", "(texture)".magenta())
            } else {
                String::new()
            };

            println!(
                "{:>10} {:>10}  {:<11} {}{}",
                member.size(),
                member.compressed_size(),
                member.compression_method().to_string(),
                member.name(),
                role
            );
        }

        for failure in nitro.failures() {
            println!(
                "{:>10} {:>10}  {} {} {}",
                "-",
                failure.compressed_size,
                format!("{:<11}", "failed").red(),
                failure.name,
                failure.error.dimmed()
            );
        }

        println!(
            "{} members, {} bytes decoded, {} failed",
            nitro.len(),
            nitro.decompressed_size().unwrap_or_default(),
            nitro.failures().len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::ListArgs;

    #[test]
    fn list_archive_with_failures() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chair.nitro");

        let mut buffer = nitro_archive::encode([("chair.json", br#"{"name":"chair"}"#.to_vec())]).unwrap();
        // append a member no strategy can decode
        buffer[1] = 0x02;
        buffer.extend_from_slice(&[0x00, 0x05, b'b', b'.', b'b', b'i', b'n']);
        buffer.extend_from_slice(&[0x00, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
        std::fs::write(&file, buffer).unwrap();

        assert!(ListArgs { file }.handle().is_ok());
        assert!(ListArgs {
            file: dir.path().join("missing.nitro")
        }
        .handle()
        .is_err());
    }
}
