//! Directory copying and zip helpers for release bundles and lambda packages.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Recursively copies `src` into `dst`, creating `dst` as needed.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .context("walked path outside of source directory")?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn unix_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

/// Zips the contents of `src` into `dest`, naming every entry
/// `<prefix>/<relative path>`. File modes are preserved.
pub fn zip_dir(src: &Path, prefix: &str, dest: &Path) -> Result<()> {
    let file =
        File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
    let mut writer = ZipWriter::new(file);

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .context("walked path outside of source directory")?;
        let mut name = Path::new(prefix).join(relative).to_string_lossy().into_owned();
        if cfg!(windows) {
            name = name.replace('\\', "/");
        }
        let metadata = entry
            .metadata()
            .with_context(|| format!("failed to stat {}", entry.path().display()))?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(unix_mode(&metadata));

        if metadata.is_dir() {
            writer
                .add_directory(name, options)
                .context("failed to add directory to zip")?;
        } else {
            writer
                .start_file(name, options)
                .context("failed to add file to zip")?;
            let mut source = File::open(entry.path())
                .with_context(|| format!("failed to open {}", entry.path().display()))?;
            io::copy(&mut source, &mut writer)
                .with_context(|| format!("failed to compress {}", entry.path().display()))?;
        }
    }

    writer.finish().context("failed to finish zip")?;
    Ok(())
}

/// Extracts a zip held in memory into `dest`.
pub fn extract_zip(bytes: Vec<u8>, dest: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("failed to open zip")?;
    archive
        .extract(dest)
        .with_context(|| format!("failed to extract zip into {}", dest.display()))
}
