use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use nitro_archive::NitroArchive;
use rayon::prelude::*;
use std::{
    fs::File,
    io::Write,
    path::{Component, Path, PathBuf},
};
use tracing::{error, info, instrument, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// Input Nitro files
    #[arg(short, long, value_name = "FILE", num_args = 1.., required = true)]
    file: Vec<PathBuf>,

    /// A target directory, each archive is extracted into a folder named after it
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,

    /// Number of archives extracted at once, 0 uses one per core
    #[arg(short, long, env = "NITRO_JOBS", default_value_t = 0)]
    jobs: usize,
}

/// Resolve a member name to a path that stays inside the extraction directory
fn member_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(path.to_path_buf())
    } else {
        Err(miette!("refusing to extract {} outside the target directory", name))
    }
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .into_diagnostic()
            .context("building extraction pool")?;

        let failed = pool.install(|| {
            self.file
                .par_iter()
                .filter(|path| match self.extract(path) {
                    Ok(()) => false,
                    Err(e) => {
                        error!("{}: {:?}", path.display(), e);
                        true
                    }
                })
                .count()
        });

        if failed > 0 {
            return Err(miette!(
                "{} of {} archives failed to extract",
                failed,
                self.file.len()
            ));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    fn extract(&self, path: &Path) -> Result<()> {
        let buffer = std::fs::read(path)
            .into_diagnostic()
            .context(format!("path: {}", path.display()))?;
        let nitro = NitroArchive::new(&buffer).context(format!("decoding {}", path.display()))?;

        let target = self.directory.join(
            path.file_stem()
                .ok_or(miette!("unable to find file stem of {}", path.display()))?,
        );

        for member in nitro.members() {
            let p = target.join(member_path(member.name())?);
            info!("writing {}", p.display());

            if let Some(parent) = p.parent() {
                std::fs::create_dir_all(parent)
                    .into_diagnostic()
                    .context(format!("creating {}", parent.display()))?;
            }

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            out.write_all(member.data())
                .into_diagnostic()
                .context(format!("writing {}", &p.display()))?;
        }

        for failure in nitro.failures() {
            warn!(
                "skipped {} ({} bytes): {}",
                failure.name, failure.compressed_size, failure.error
            );
        }

        Ok(())
    }
}
