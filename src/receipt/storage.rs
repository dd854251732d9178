//! Saving receipt uploads to, and removing them from, the upload directory.

use std::path::Path;

use axum::body::Bytes;
use uuid::Uuid;

use crate::{Error, receipt::Receipt};

/// The file extensions that may be uploaded as receipts.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "png", "jpg", "jpeg", "gif"];

/// A file taken from a multipart form, not yet saved.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub original_filename: String,
    pub data: Bytes,
}

/// A receipt file that has been written to the upload directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    /// The generated name of the file in the upload directory.
    pub filename: String,
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: &'static str,
}

/// The lowercase extension of `filename` if it is an allowed receipt type.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let extension = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    ALLOWED_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

pub fn mime_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// A new random file name with `extension`, unrelated to the uploaded name.
fn generate_filename(extension: &str) -> String {
    format!("{}.{extension}", Uuid::new_v4())
}

/// Write each allowed upload to `upload_dir` under a generated name.
///
/// Files with a disallowed extension are skipped with a warning.
///
/// # Errors
///
/// Returns [Error::FileError] if a file could not be written. Files written
/// before the failure are removed again.
pub async fn store_uploads(
    upload_dir: &Path,
    uploads: Vec<UploadedFile>,
) -> Result<Vec<StoredFile>, Error> {
    let mut stored_files = Vec::new();

    for upload in uploads {
        let Some(extension) = allowed_extension(&upload.original_filename) else {
            tracing::warn!(
                "Skipping receipt upload \"{}\": only {} files are allowed",
                upload.original_filename,
                ALLOWED_EXTENSIONS.join(", ")
            );
            continue;
        };

        let filename = generate_filename(&extension);
        let result = async {
            tokio::fs::create_dir_all(upload_dir).await?;
            tokio::fs::write(upload_dir.join(&filename), &upload.data).await
        }
        .await;

        if let Err(error) = result {
            tracing::error!("Could not save receipt \"{filename}\": {error}");
            remove_stored_files(upload_dir, &stored_files).await;
            return Err(Error::FileError(error.to_string()));
        }

        stored_files.push(StoredFile {
            filename,
            original_filename: upload.original_filename,
            file_size: upload.data.len() as u64,
            mime_type: mime_type_for(&extension),
        });
    }

    Ok(stored_files)
}

/// Delete the receipt file `filename` from `upload_dir`.
///
/// Failures are logged and otherwise ignored so that a missing or locked file
/// never blocks deleting the receipt's record. Call this after releasing the
/// database lock.
pub async fn remove_receipt_file(upload_dir: &Path, filename: &str) {
    let path = upload_dir.join(filename);

    if let Err(error) = tokio::fs::remove_file(&path).await {
        tracing::error!("Could not delete receipt file {}: {error}", path.display());
    }
}

/// Delete the files of `receipts` whose records have been deleted.
pub async fn remove_receipt_files(upload_dir: &Path, receipts: &[Receipt]) {
    for receipt in receipts {
        remove_receipt_file(upload_dir, &receipt.filename).await;
    }
}

/// Remove files saved by [store_uploads] whose records could not be created.
pub async fn remove_stored_files(upload_dir: &Path, stored_files: &[StoredFile]) {
    for stored_file in stored_files {
        remove_receipt_file(upload_dir, &stored_file.filename).await;
    }
}
