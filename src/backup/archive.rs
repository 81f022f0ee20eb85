// backuptool/src/backup/archive.rs
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::artifact::ArtifactRecord;
use crate::errors::CompressError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compresses a finished dump in place, replacing `name.sql` with
/// `name.sql.gz`.
///
/// The uncompressed original is removed only once the compressed file
/// verifies as present, non-empty and readable; a failure anywhere
/// leaves the original dump untouched and discards the partial `.gz`.
pub fn compress_dump(
    source: &Path,
    created_at: NaiveDateTime,
) -> Result<ArtifactRecord, CompressError> {
    if !source.is_file() {
        return Err(CompressError::SourceMissing(source.to_path_buf()));
    }
    let dest = gz_sibling(source);
    let original_size = fs::metadata(source)?.len();

    if let Err(e) = write_gz(source, &dest) {
        let _ = fs::remove_file(&dest);
        return Err(e);
    }

    let compressed_size = match verify_compressed(&dest) {
        Ok(size) => size,
        Err(e) => {
            let _ = fs::remove_file(&dest);
            return Err(e);
        }
    };

    fs::remove_file(source)?;

    log::info!(target: "archive",
        "Compressed {} from {:.2} MB to {:.2} MB",
        dest.display(),
        mb(original_size),
        mb(compressed_size)
    );
    Ok(ArtifactRecord::local(dest, compressed_size, created_at))
}

fn gz_sibling(source: &Path) -> PathBuf {
    let mut os = source.as_os_str().to_os_string();
    os.push(".gz");
    PathBuf::from(os)
}

fn write_gz(source: &Path, dest: &Path) -> Result<(), CompressError> {
    let mut input = File::open(source)?;
    let output = File::create(dest)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    Ok(())
}

/// The compressed file must be non-empty and start with the gzip magic
/// before the original may be discarded.
fn verify_compressed(dest: &Path) -> Result<u64, CompressError> {
    let size = fs::metadata(dest)?.len();
    if size == 0 {
        return Err(CompressError::Verification(dest.to_path_buf()));
    }
    let mut header = [0u8; 2];
    File::open(dest)?.read_exact(&mut header)?;
    if header != GZIP_MAGIC {
        return Err(CompressError::Verification(dest.to_path_buf()));
    }
    Ok(size)
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
