use clap::Args;
use itertools::Itertools;
use miette::miette;
use miette::{Context, IntoDiagnostic, Result};
use nitro_archive::{
    write::{Compression, NitroWriterOptions},
    NitroWriter,
};
use std::{fs::File, path::PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target Nitro file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Gzip level used for every member
    #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(0..=9))]
    level: u32,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = WalkDir::new(&self.directory)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| !e.file_type().is_dir())
            .collect::<Vec<_>>();

        if files.is_empty() {
            return Err(miette!("directory is empty"));
        }

        let mut nitro = NitroWriter::new(
            NitroWriterOptions::builder()
                .compression(Compression::new(self.level))
                .build(),
        );

        for file in files {
            let relative = file
                .path()
                .strip_prefix(&self.directory)
                .into_diagnostic()?;

            // member names always use forward slashes
            let name = relative
                .components()
                .map(|c| {
                    c.as_os_str()
                        .to_str()
                        .ok_or(miette!("unable to convert {} to a string", relative.display()))
                })
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .join("/");

            let data = std::fs::read(file.path())
                .into_diagnostic()
                .context(format!("reading {}", file.path().display()))?;

            if data.is_empty() {
                warn!("skipping empty file {}", name);
                continue;
            }

            info!("packing {}", name);
            nitro
                .add_member(&name, data)
                .context(format!("adding member {}", name))?;
        }

        if nitro.is_empty() {
            return Err(miette!("directory only holds empty files"));
        }

        let out = if !self.overwrite {
            File::create_new(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        } else {
            File::create(&self.file)
                .into_diagnostic()
                .context(format!("creating {}", &self.file.display()))?
        };

        nitro.write_to(out).context("finalizing nitro file")?;

        Ok(())
    }
}
