//! Utility functions and helpers

use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

use crate::errors::{CertforgotError, Result};

/// Regex for Key Vault object names used as state slots (RFC 1035 labels):
/// a letter first, letters, digits or hyphens after, no trailing hyphen, at most 63 chars
pub static VAULT_NAME_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").expect("static regex is valid")
});

/// Validate a Key Vault object name for use in configuration
pub fn validate_vault_name(name: &str) -> std::result::Result<(), validator::ValidationError> {
    if VAULT_NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        let mut error = validator::ValidationError::new("dns_rfc1035_label");
        error.message = Some("must be an RFC 1035 label (letters, digits, hyphens)".into());
        Err(error)
    }
}

/// Split a `https://<vault>/<name>` location into the vault URL and the object name.
///
/// The name is the last path segment, so `https://<vault>/certificates/<name>` also works.
pub fn split_vault_location(location: &str) -> Result<(String, String)> {
    let invalid = |reason: &str| {
        CertforgotError::validation_field(
            format!("Invalid Key Vault location '{}': {}", location, reason),
            "location",
        )
    };

    let url = url::Url::parse(location).map_err(|e| invalid(&e.to_string()))?;
    if url.scheme() != "https" {
        return Err(invalid("must use https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing vault host"))?;
    let name = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| invalid("missing object name"))?
        .to_string();

    let vault_url = match url.port() {
        Some(port) => format!("https://{}:{}", host, port),
        None => format!("https://{}", host),
    };
    Ok((vault_url, name))
}

/// Write each `(path, contents, mode)` into `directory` via temporary files and renames.
///
/// All files are staged before the first rename. `abort` is checked between
/// stages and once more before renaming; a cancelled write returns
/// [`CertforgotError::Cancelled`] and leaves every target untouched. `mode` is
/// applied on unix before a file becomes visible.
pub fn write_atomic(directory: &Path, files: &[(PathBuf, Vec<u8>, u32)], abort: &CancellationToken) -> Result<()> {
    let mut staged = Vec::with_capacity(files.len());
    for (path, contents, mode) in files {
        if abort.is_cancelled() {
            return Err(CertforgotError::cancelled("atomic write"));
        }
        staged.push((stage(directory, path, contents, *mode)?, path));
    }

    if abort.is_cancelled() {
        return Err(CertforgotError::cancelled("atomic write"));
    }
    for (tmp, path) in staged {
        tmp.persist(path)
            .map_err(|e| CertforgotError::io(e.error, format!("writing '{}'", path.display())))?;
    }
    Ok(())
}

fn stage(directory: &Path, path: &Path, contents: &[u8], mode: u32) -> Result<NamedTempFile> {
    let context = || format!("writing '{}'", path.display());
    let mut tmp = NamedTempFile::new_in(directory).map_err(|e| CertforgotError::io(e, context()))?;
    tmp.write_all(contents).map_err(|e| CertforgotError::io(e, context()))?;
    tmp.as_file().sync_all().map_err(|e| CertforgotError::io(e, context()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(mode))
            .map_err(|e| CertforgotError::io(e, context()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(tmp)
}
