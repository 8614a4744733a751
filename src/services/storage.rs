use anyhow::Context;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use sha2::{Digest, Sha256};

use crate::core::config::Settings;
use crate::db::types::DocumentKind;

/// Size in bytes and hex SHA-256 of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredObject {
    pub(crate) size_bytes: i64,
    pub(crate) sha256: String,
}

#[derive(Debug, Clone)]
pub(crate) struct StorageService {
    client: Client,
    bucket: String,
}

impl StorageService {
    /// `None` when S3 credentials are not configured.
    pub(crate) async fn from_settings(settings: &Settings) -> anyhow::Result<Option<Self>> {
        let s3 = settings.s3();
        if s3.access_key.is_empty() || s3.secret_key.is_empty() {
            return Ok(None);
        }

        let creds = Credentials::new(
            s3.access_key.clone(),
            s3.secret_key.clone(),
            None,
            None,
            "gradewise-static",
        );

        let config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(s3.endpoint.clone())
            .region(aws_config::Region::new(s3.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&config).force_path_style(true).build();

        Ok(Some(Self { client: Client::from_conf(s3_config), bucket: s3.bucket.clone() }))
    }

    pub(crate) async fn upload_bytes(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> anyhow::Result<StoredObject> {
        let object = describe(&bytes);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .with_context(|| format!("Failed to upload {key}"))?;

        Ok(object)
    }

    pub(crate) async fn download_bytes(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to download {key}"))?;

        let data = output
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of {key}"))?;
        Ok(data.into_bytes().to_vec())
    }

    pub(crate) async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete {key}"))?;
        Ok(())
    }
}

pub(crate) fn describe(bytes: &[u8]) -> StoredObject {
    StoredObject { size_bytes: bytes.len() as i64, sha256: hex::encode(Sha256::digest(bytes)) }
}

/// `answer-sheets/<owner>/<id>.<ext>` or `answer-keys/<owner>/<id>.<ext>`.
pub(crate) fn document_key(
    kind: DocumentKind,
    owner_id: &str,
    id: &str,
    extension: &str,
) -> String {
    format!("{}/{owner_id}/{id}.{extension}", kind.storage_prefix())
}

pub(crate) fn result_key(evaluation_id: &str) -> String {
    format!("results/{evaluation_id}.json")
}

pub(crate) fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain; charset=utf-8",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}
