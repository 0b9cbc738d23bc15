//! Image upload.
//!
//! Two raw requests: open an upload session at the configured URL, then
//! put the bytes to the URL it hands back. The second reply carries the
//! photo id to attach to a chat message.

use parrot_protocol::ProtocolError;
use parrot_transport::Transport;
use serde_json::{Value as Json, json};

use crate::{Client, ClientError};

const SESSION_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";
const UPLOAD_CONTENT_TYPE: &str = "application/octet-stream";

const PUT_URL: &str = "/sessionStatus/externalFieldTransfers/0/putInfo/url";
const PHOTO_ID: &str = "/sessionStatus/additionalInfo/uploader_service.GoogleRupioAdditionalInfo/completionInfo/customerSpecificInfo/photoid";

fn session_request(filename: &str, size: usize) -> Json {
    json!({
        "protocolVersion": "0.8",
        "createSessionRequest": {
            "fields": [{
                "external": {
                    "name": "file",
                    "filename": filename,
                    "put": {},
                    "size": size,
                }
            }]
        }
    })
}

/// The string at `pointer` in a JSON reply.
fn extract(reply: &[u8], pointer: &str) -> Result<String, ClientError> {
    let body: Json = serde_json::from_slice(reply).map_err(ProtocolError::Decode)?;
    body.pointer(pointer)
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| ClientError::Upload {
            path: pointer.to_string(),
        })
}

impl<T: Transport> Client<T> {
    /// Uploads an image and returns its photo id, for use with
    /// [`ImageAttachment::Own`](crate::ImageAttachment::Own).
    pub async fn upload_image(&self, data: &[u8], filename: &str) -> Result<String, ClientError> {
        let transport = &self.inner.transport;
        let session = session_request(filename, data.len()).to_string();

        let reply = transport
            .raw_request(
                &self.inner.config.upload_url,
                SESSION_CONTENT_TYPE,
                session.as_bytes(),
            )
            .await?;
        let put_url = extract(&reply, PUT_URL)?;
        tracing::debug!(%filename, bytes = data.len(), "upload session opened");

        let reply = transport
            .raw_request(&put_url, UPLOAD_CONTENT_TYPE, data)
            .await?;
        let photo_id = extract(&reply, PHOTO_ID)?;
        tracing::info!(%filename, %photo_id, "image uploaded");
        Ok(photo_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_request_shape() {
        let body = session_request("cat.png", 3);
        assert_eq!(body["protocolVersion"], "0.8");
        assert_eq!(
            body.pointer("/createSessionRequest/fields/0/external"),
            Some(&json!({"name": "file", "filename": "cat.png", "put": {}, "size": 3}))
        );
    }

    #[test]
    fn test_extract_reads_nested_key() {
        let reply = br#"{"sessionStatus": {"externalFieldTransfers": [{"putInfo": {"url": "https://up/1"}}]}}"#;
        assert_eq!(extract(reply, PUT_URL).unwrap(), "https://up/1");
    }

    #[test]
    fn test_extract_missing_key_fails() {
        let reply = br#"{"sessionStatus": {"externalFieldTransfers": []}}"#;
        let err = extract(reply, PUT_URL).unwrap_err();
        assert!(matches!(err, ClientError::Upload { ref path } if path == PUT_URL));
    }

    #[test]
    fn test_extract_rejects_non_json() {
        let err = extract(b"oops", PHOTO_ID).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
