use std::path::Path;

use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
const MAX_FILENAME_LEN: usize = 255;

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Username may contain only letters, digits, '.', '_' and '-'".to_string(),
        ))
    }
}

/// Returns the lowercase extension of an uploaded file once it passes the allow-list and the
/// size limit.
pub(crate) fn validate_upload(
    filename: &str,
    size: usize,
    allowed_extensions: &[String],
    max_bytes: u64,
) -> Result<String, ApiError> {
    if filename.trim().is_empty() || filename.len() > MAX_FILENAME_LEN {
        return Err(ApiError::BadRequest("Invalid file name".to_string()));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .ok_or_else(|| ApiError::BadRequest("File must have an extension".to_string()))?;

    if !allowed_extensions.iter().any(|allowed| allowed == &extension) {
        return Err(ApiError::BadRequest(format!(
            "File extension '.{extension}' is not allowed; expected one of: {}",
            allowed_extensions.join(", ")
        )));
    }

    if size == 0 {
        return Err(ApiError::BadRequest(format!("File '{filename}' is empty")));
    }
    if size as u64 > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File '{filename}' exceeds the {} MB upload limit",
            max_bytes / (1024 * 1024)
        )));
    }

    Ok(extension)
}

/// Strips any client-supplied directory components.
pub(crate) fn sanitize_filename(filename: &str) -> String {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["pdf".to_string(), "txt".to_string()]
    }

    #[test]
    fn upload_accepts_allowed_extension_case_insensitively() {
        assert_eq!(validate_upload("Sheet.PDF", 10, &allowed(), 1024).expect("valid"), "pdf");
    }

    #[test]
    fn upload_rejects_bad_extension_and_size() {
        assert!(matches!(
            validate_upload("sheet.exe", 10, &allowed(), 1024),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_upload("sheet", 10, &allowed(), 1024),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_upload("sheet.txt", 0, &allowed(), 1024),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            validate_upload("sheet.txt", 2048, &allowed(), 1024),
            Err(ApiError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn filenames_lose_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(sanitize_filename("C:\\scans\\alice.pdf"), "alice.pdf");
        assert_eq!(sanitize_filename("bob.png"), "bob.png");
    }

    #[test]
    fn usernames_and_passwords() {
        assert!(validate_username("alice.smith-01").is_ok());
        assert!(validate_username("alice smith").is_err());
        assert!(validate_password_len("12345678").is_ok());
        assert!(validate_password_len("short").is_err());
    }
}
