use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::parsing::env_optional;

/// Signing key for access tokens. Generated on first start and kept in `.secret_key` (mode
/// 0600) so tokens survive restarts.
pub(super) fn load_or_create_secret_key() -> String {
    let path = env_optional("GRADEWISE_SECRET_KEY_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".secret_key"));
    load_or_create_at(&path)
}

fn load_or_create_at(path: &Path) -> String {
    if let Some(existing) = read_key(path) {
        return existing;
    }

    let new_key = generate_secret_key();
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(
                error = %err,
                path = %parent.display(),
                "Failed to create secret key directory"
            );
        }
    }

    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;

                if let Err(err) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
                    tracing::warn!(
                        error = %err,
                        path = %path.display(),
                        "Failed to restrict secret key file permissions"
                    );
                }
            }
            if let Err(err) = file.write_all(new_key.as_bytes()) {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "Failed to persist secret key"
                );
            }
            new_key
        }
        // Another process won the race; use its key.
        Err(err) if err.kind() == ErrorKind::AlreadyExists => read_key(path).unwrap_or(new_key),
        Err(err) => {
            tracing::warn!(
                error = %err,
                path = %path.display(),
                "Secret key file unavailable; tokens will not survive a restart"
            );
            new_key
        }
    }
}

fn read_key(path: &Path) -> Option<String> {
    let value = fs::read_to_string(path).ok()?;
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn generate_secret_key() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
