//! Capture directory management.
//!
//! The directory is the only state: there is no index, so every listing
//! re-reads it.  Writers (capture, rename, delete) take one store-wide lock;
//! readers never do.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::cam::CameraClient;
use crate::error::{GatewayError, Result};
use crate::naming;

/// Extensions included in listings.
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

/// Page size bounds for [`Gallery::list`].
pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 500;

/// One image on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFile {
    pub filename:    String,
    pub filepath:    String,
    pub size_bytes:  u64,
    pub created_at:  String,
    pub modified_at: String,
}

/// A freshly saved capture and the time used to name it.
#[derive(Debug, Clone)]
pub struct Captured {
    pub file:     ImageFile,
    pub taken_at: NaiveDateTime,
}

pub struct Gallery {
    dir:    PathBuf,
    writes: Mutex<()>,
}

impl Gallery {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir:    dir.into(),
            writes: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List images newest-first by filename, then slice `offset..offset+limit`.
    ///
    /// `limit` is clamped to [`MIN_LIMIT`]..=[`MAX_LIMIT`].  An offset past
    /// the end, or a missing directory, gives an empty page.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<ImageFile>> {
        let limit = limit.clamp(MIN_LIMIT, MAX_LIMIT);
        let names = self.image_names().await?;

        let mut page = Vec::new();
        for name in names.into_iter().skip(offset).take(limit) {
            let path = self.dir.join(&name);
            match tokio::fs::metadata(&path).await {
                Ok(meta) => page.push(image_file(name, &path, &meta)),
                // removed between read_dir and stat
                Err(e) => debug!("skipping {}: {e}", path.display()),
            }
        }
        Ok(page)
    }

    /// Number of listable images.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.image_names().await?.len())
    }

    /// Read one image.
    pub async fn get(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.existing(filename).await?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Remove one image.
    pub async fn delete(&self, filename: &str) -> Result<()> {
        let _guard = self.writes.lock().await;
        let path = self.existing(filename).await?;
        tokio::fs::remove_file(&path).await?;
        info!("image deleted: {filename}");
        Ok(())
    }

    /// Give an image a new label.
    ///
    /// The new name is built from the current time, so the timestamp encoded
    /// in the old name is not carried over.  Returns the new filename.
    pub async fn rename(&self, filename: &str, new_label: &str) -> Result<String> {
        if new_label.is_empty() {
            return Err(GatewayError::InvalidArgument("new_label must not be empty".into()));
        }
        check_label(new_label)?;

        let _guard = self.writes.lock().await;
        let old_path = self.existing(filename).await?;
        let new_name = naming::make_name(&Local::now().naive_local(), Some(new_label));
        tokio::fs::rename(&old_path, self.dir.join(&new_name)).await?;
        info!("image renamed: {filename} -> {new_name}");
        Ok(new_name)
    }

    /// Fetch a frame from `camera` and save it.
    ///
    /// Nothing is written unless the camera returns a frame.
    pub async fn capture(&self, camera: &CameraClient, label: Option<&str>) -> Result<Captured> {
        let label = normalize_label(label)?;
        let bytes = camera.capture().await?;
        self.save(&bytes, label, Local::now().naive_local()).await
    }

    /// Write `bytes` under the name derived from `at` and `label`.
    ///
    /// An existing file with the same name is overwritten.
    pub async fn save(&self, bytes: &[u8], label: Option<&str>, at: NaiveDateTime) -> Result<Captured> {
        let label = normalize_label(label)?;
        let name = naming::make_name(&at, label);
        let path = self.dir.join(&name);

        let _guard = self.writes.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            warn!("overwriting existing image {name}");
        }
        tokio::fs::write(&path, bytes).await?;
        let meta = tokio::fs::metadata(&path).await?;
        info!("image captured and saved: {name} ({} bytes)", meta.len());

        Ok(Captured {
            file:     image_file(name, &path, &meta),
            taken_at: at,
        })
    }

    /// Names of all listable images, sorted descending.
    async fn image_names(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
                continue;
            }
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(name);
            }
        }
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Resolve `filename` to an existing regular file inside the directory.
    ///
    /// Symlinks are not followed, so they are as invisible here as they are
    /// in listings.
    async fn existing(&self, filename: &str) -> Result<PathBuf> {
        check_filename(filename)?;
        let path = self.dir.join(filename);
        if path.parent() != Some(self.dir.as_path()) {
            return Err(GatewayError::NotFound(filename.to_string()));
        }
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => Err(GatewayError::NotFound(filename.to_string())),
        }
    }
}

/// Reject names that could address anything but a direct child of the
/// capture directory.
fn check_filename(filename: &str) -> Result<()> {
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(GatewayError::InvalidArgument(format!("invalid filename {filename:?}")));
    }
    if filename.contains(['/', '\\', '\0']) {
        return Err(GatewayError::InvalidArgument(format!(
            "filename must not contain path separators: {filename:?}"
        )));
    }
    Ok(())
}

/// Labels end up inside filenames, so they obey the same character rules
/// and must leave the whole name within [`naming::MAX_LABEL_LEN`].
fn check_label(label: &str) -> Result<()> {
    if label.len() > naming::MAX_LABEL_LEN {
        return Err(GatewayError::InvalidArgument(format!(
            "label is {} bytes, at most {} allowed",
            label.len(),
            naming::MAX_LABEL_LEN
        )));
    }
    if label.contains(['/', '\\', '\0']) {
        return Err(GatewayError::InvalidArgument(format!(
            "label must not contain path separators: {label:?}"
        )));
    }
    Ok(())
}

/// An empty label means no label; anything else is kept verbatim.
fn normalize_label(label: Option<&str>) -> Result<Option<&str>> {
    match label {
        Some(l) if !l.is_empty() => {
            check_label(l)?;
            Ok(Some(l))
        }
        _ => Ok(None),
    }
}

fn image_file(filename: String, path: &Path, meta: &std::fs::Metadata) -> ImageFile {
    let modified = meta.modified().ok();
    let created = meta.created().ok().or(modified);
    ImageFile {
        filename,
        filepath:    path.display().to_string(),
        size_bytes:  meta.len(),
        created_at:  iso_local(created),
        modified_at: iso_local(modified),
    }
}

fn iso_local(t: Option<SystemTime>) -> String {
    t.map(|t| DateTime::<Local>::from(t).format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        .unwrap_or_default()
}
