//! Package headers and the package directory.
//!
//! A package file starts with a managed [`PackageHeader`]; whatever follows
//! the header is opaque archive content. Files are named
//! `{name}.{version}.{extension}` and live flat in one directory.

use crate::error::ProtocolError;
use marshal_buffer::{composite, Codec, Timestamp};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Signature at the start of every package file.
pub const PACKAGE_FILE_SIGNATURE: u32 = 0x5F50_4B1C;

/// Extension of package files.
pub const DEFAULT_PACKAGE_EXTENSION: &str = "pack";

/// Header at the front of a package file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageHeader {
    pub signature: u32,
    pub date_created: Timestamp,
    pub version: f64,
    pub name: String,
}

composite!(PackageHeader {
    signature: u32,
    date_created: Timestamp,
    version: f64,
    name: String,
});

impl PackageHeader {
    /// Creates a header stamped with the current UTC time.
    pub fn new(name: impl Into<String>, version: f64) -> Self {
        Self {
            signature: PACKAGE_FILE_SIGNATURE,
            date_created: Timestamp::now(),
            version,
            name: name.into(),
        }
    }

    /// Checks the file signature and that the name is a single file name
    /// component.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.signature != PACKAGE_FILE_SIGNATURE {
            return Err(ProtocolError::InvalidSignature {
                expected: PACKAGE_FILE_SIGNATURE,
                actual: self.signature,
            });
        }
        validate_package_name(&self.name)
    }

    pub fn file_name(&self, extension: &str) -> String {
        package_file_name_with_extension(&self.name, self.version, extension)
    }
}

/// A package found on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: f64,
    pub date_created: Timestamp,
    pub location: PathBuf,
}

impl Package {
    pub fn from_header(header: PackageHeader, location: PathBuf) -> Self {
        Self {
            name: header.name,
            version: header.version,
            date_created: header.date_created,
            location,
        }
    }
}

/// Rejects names that could leave the package directory.
pub fn validate_package_name(name: &str) -> Result<(), ProtocolError> {
    let invalid = name.is_empty()
        || name.contains(['/', '\\', ':', '\0'])
        || name.contains("..")
        || Path::new(name).is_absolute();
    if invalid {
        return Err(ProtocolError::InvalidPackageName(name.to_string()));
    }
    Ok(())
}

/// `{name}.{version}.pack`
pub fn package_file_name(name: &str, version: f64) -> String {
    package_file_name_with_extension(name, version, DEFAULT_PACKAGE_EXTENSION)
}

pub fn package_file_name_with_extension(name: &str, version: f64, extension: &str) -> String {
    format!("{}.{}.{}", name, version, extension)
}

/// Writes a package header to `stream`.
pub async fn write_package_header<S>(
    codec: &Codec<'_>,
    stream: &mut S,
    header: &PackageHeader,
) -> Result<(), ProtocolError>
where
    S: AsyncWrite + Unpin,
{
    codec.write_managed(stream, header).await?;
    Ok(())
}

/// Reads a package header from `stream` and checks its signature.
pub async fn read_package_header<S>(
    codec: &Codec<'_>,
    stream: &mut S,
) -> Result<PackageHeader, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let header: PackageHeader = codec.read_managed(stream).await?;
    header.validate()?;
    Ok(header)
}

/// Reads the header of the package file at `path`.
pub async fn read_package_file(codec: &Codec<'_>, path: &Path) -> Result<Package, ProtocolError> {
    let mut reader = BufReader::new(File::open(path).await?);
    let header = read_package_header(codec, &mut reader).await?;
    Ok(Package::from_header(header, path.to_path_buf()))
}

/// Lists the valid packages in `dir`, ordered by name then version.
///
/// Files with the right extension whose header cannot be read are skipped.
pub async fn scan_packages(
    codec: &Codec<'_>,
    dir: &Path,
    extension: &str,
) -> Result<Vec<Package>, ProtocolError> {
    let mut packages = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }

        match read_package_file(codec, &path).await {
            Ok(package) => packages.push(package),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping invalid package");
            }
        }
    }

    packages.sort_by(|a, b| {
        a.name
            .cmp(&b.name)
            .then(a.version.total_cmp(&b.version))
    });
    tracing::debug!(dir = %dir.display(), count = packages.len(), "scanned packages");
    Ok(packages)
}

/// Finds the package `name` at `version` in `dir`.
pub async fn find_package(
    codec: &Codec<'_>,
    dir: &Path,
    extension: &str,
    name: &str,
    version: f64,
) -> Result<Package, ProtocolError> {
    scan_packages(codec, dir, extension)
        .await?
        .into_iter()
        .find(|p| p.name == name && p.version == version)
        .ok_or_else(|| ProtocolError::PackageNotFound {
            name: name.to_string(),
            version: version.to_string(),
        })
}

async fn create_package_file(path: &Path) -> Result<File, ProtocolError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => ProtocolError::PackageExists(path.to_path_buf()),
            _ => ProtocolError::Io(e),
        })
}

/// Creates `{dir}/{name}.{version}.{extension}` holding only `header`.
/// Fails with `PackageExists` rather than overwriting.
pub async fn write_package_header_file(
    codec: &Codec<'_>,
    dir: &Path,
    extension: &str,
    header: &PackageHeader,
) -> Result<Package, ProtocolError> {
    header.validate()?;
    let path = dir.join(header.file_name(extension));
    let mut file = create_package_file(&path).await?;

    write_package_header(codec, &mut file, header).await?;
    file.sync_all().await?;

    tracing::info!(path = %path.display(), "created package");
    Ok(Package::from_header(header.clone(), path))
}

/// Reads a package header from `stream` and stores the header and the rest of
/// the stream as a new package file in `dir`.
pub async fn import_package<S>(
    codec: &Codec<'_>,
    stream: &mut S,
    dir: &Path,
    extension: &str,
) -> Result<Package, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let header = read_package_header(codec, stream).await?;
    let path = dir.join(header.file_name(extension));
    let mut file = create_package_file(&path).await?;

    write_package_header(codec, &mut file, &header).await?;
    let copied = tokio::io::copy(stream, &mut file).await?;
    file.flush().await?;
    file.sync_all().await?;

    tracing::info!(
        path = %path.display(),
        content_bytes = copied,
        "imported package"
    );
    Ok(Package::from_header(header, path))
}
