//! Wire payloads exchanged with the out-of-process image edit worker.
//!
//! Requests and responses travel as camelCase JSON. Responses are parsed into
//! an [`EditResponse`]; anything that cannot be parsed is unrecoverable for
//! that message and is dropped by the consumer.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EditCompletion, Photo, PhotoId, StorageKey, UserId};

/// Default error recorded when a worker reports failure without a reason.
pub const UNSPECIFIED_EDIT_ERROR: &str = "edit failed";

/// Token linking one published edit request to its eventual response.
///
/// Generated from 122 random bits; never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Request published for every accepted edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditRequestMessage {
    #[serde(rename = "s3Key", alias = "storageKey")]
    pub storage_key: String,
    pub prompt: String,
    pub user_id: UserId,
    pub photo_id: PhotoId,
    pub edit_photo_id: PhotoId,
    pub correlation_id: CorrelationId,
}

impl EditRequestMessage {
    /// Build the request for `placeholder`, an edit of `original`.
    pub fn for_placeholder(
        original: &Photo,
        placeholder: &Photo,
        prompt: &str,
        requester: &UserId,
        correlation_id: CorrelationId,
    ) -> Self {
        Self {
            storage_key: original.storage_key().as_str().to_owned(),
            prompt: prompt.to_owned(),
            user_id: requester.clone(),
            photo_id: original.id(),
            edit_photo_id: placeholder.id(),
            correlation_id,
        }
    }
}

/// Reasons a response payload cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditResponseParseError {
    Malformed(String),
    MissingEditedKey,
    InvalidEditedKey,
}

impl fmt::Display for EditResponseParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(reason) => write!(f, "malformed edit response: {reason}"),
            Self::MissingEditedKey => {
                write!(f, "successful edit response carries no edited image key")
            }
            Self::InvalidEditedKey => {
                write!(f, "edited image key must not point at a pending sentinel")
            }
        }
    }
}

impl std::error::Error for EditResponseParseError {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditResponseDto {
    success: bool,
    correlation_id: CorrelationId,
    #[serde(default)]
    original_photo_id: Option<PhotoId>,
    #[serde(default)]
    edited_image_key: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    size: Option<u64>,
}

/// Parsed worker response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditResponse {
    pub correlation_id: CorrelationId,
    /// Echo of the original photo id; workers may omit it.
    pub original_photo_id: Option<PhotoId>,
    pub completion: EditCompletion,
}

impl EditResponse {
    /// Parse a raw payload.
    ///
    /// # Examples
    /// ```
    /// use photoshare::domain::{EditCompletion, EditResponse};
    ///
    /// let payload = br#"{
    ///     "success": false,
    ///     "error": "bad prompt",
    ///     "correlationId": "3fa85f64-5717-4562-b3fc-2c963f66afa6"
    /// }"#;
    /// let response = EditResponse::parse(payload).expect("valid payload");
    /// assert_eq!(
    ///     response.completion,
    ///     EditCompletion::Failed { error: "bad prompt".to_owned() }
    /// );
    /// ```
    pub fn parse(payload: &[u8]) -> Result<Self, EditResponseParseError> {
        let dto: EditResponseDto = serde_json::from_slice(payload)
            .map_err(|err| EditResponseParseError::Malformed(err.to_string()))?;

        let completion = if dto.success {
            let key = dto
                .edited_image_key
                .filter(|key| !key.trim().is_empty())
                .ok_or(EditResponseParseError::MissingEditedKey)?;
            let storage_key =
                StorageKey::new(key).map_err(|_| EditResponseParseError::MissingEditedKey)?;
            if storage_key.is_pending_sentinel() {
                return Err(EditResponseParseError::InvalidEditedKey);
            }
            EditCompletion::Succeeded {
                storage_key,
                size_bytes: dto.size.unwrap_or_default(),
            }
        } else {
            let error = dto
                .error
                .filter(|error| !error.trim().is_empty())
                .unwrap_or_else(|| UNSPECIFIED_EDIT_ERROR.to_owned());
            EditCompletion::Failed { error }
        };

        Ok(Self {
            correlation_id: dto.correlation_id,
            original_photo_id: dto.original_photo_id,
            completion,
        })
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.

    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn encode(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).expect("encode payload")
    }

    #[rstest]
    fn success_carries_key_and_size() {
        let correlation = CorrelationId::generate();
        let original = PhotoId::random();
        let payload = encode(json!({
            "success": true,
            "editedImageKey": "edited/groups/g/beach.png",
            "originalPhotoId": original,
            "size": 4096,
            "correlationId": correlation,
        }));

        let response = EditResponse::parse(&payload).expect("parses");
        assert_eq!(response.correlation_id, correlation);
        assert_eq!(response.original_photo_id, Some(original));
        assert_eq!(
            response.completion,
            EditCompletion::Succeeded {
                storage_key: StorageKey::new("edited/groups/g/beach.png").expect("key"),
                size_bytes: 4096,
            }
        );
    }

    #[rstest]
    fn failure_without_reason_gets_default_error() {
        let payload = encode(json!({
            "success": false,
            "correlationId": CorrelationId::generate(),
        }));
        let response = EditResponse::parse(&payload).expect("parses");
        assert_eq!(
            response.completion,
            EditCompletion::Failed {
                error: UNSPECIFIED_EDIT_ERROR.to_owned()
            }
        );
    }

    #[rstest]
    #[case(b"not json".to_vec())]
    #[case(encode(json!({ "success": true, "correlationId": "nope", "editedImageKey": "k" })))]
    #[case(encode(json!({ "success": true, "editedImageKey": "k" })))]
    fn malformed_payloads_are_rejected(#[case] payload: Vec<u8>) {
        assert!(matches!(
            EditResponse::parse(&payload),
            Err(EditResponseParseError::Malformed(_))
        ));
    }

    #[rstest]
    #[case(json!(null))]
    #[case(json!(""))]
    fn success_requires_edited_key(#[case] key: serde_json::Value) {
        let payload = encode(json!({
            "success": true,
            "editedImageKey": key,
            "correlationId": CorrelationId::generate(),
        }));
        assert_eq!(
            EditResponse::parse(&payload),
            Err(EditResponseParseError::MissingEditedKey)
        );
    }

    #[rstest]
    fn success_cannot_point_at_sentinel() {
        let correlation = CorrelationId::generate();
        let payload = encode(json!({
            "success": true,
            "editedImageKey": StorageKey::pending_edit(&correlation).as_str(),
            "correlationId": correlation,
        }));
        assert_eq!(
            EditResponse::parse(&payload),
            Err(EditResponseParseError::InvalidEditedKey)
        );
    }

    #[rstest]
    fn request_serialises_with_wire_names() {
        let message = EditRequestMessage {
            storage_key: "groups/g/a.jpg".to_owned(),
            prompt: "make it pop".to_owned(),
            user_id: UserId::random(),
            photo_id: PhotoId::random(),
            edit_photo_id: PhotoId::random(),
            correlation_id: CorrelationId::generate(),
        };
        let value = serde_json::to_value(&message).expect("serialise");
        assert_eq!(value["s3Key"], "groups/g/a.jpg");
        assert_eq!(value["editPhotoId"], json!(message.edit_photo_id));
        assert_eq!(value["correlationId"], json!(message.correlation_id));

        let legacy = json!({
            "storageKey": "groups/g/a.jpg",
            "prompt": "p",
            "userId": message.user_id,
            "photoId": message.photo_id,
            "editPhotoId": message.edit_photo_id,
            "correlationId": message.correlation_id,
        });
        let decoded: EditRequestMessage = serde_json::from_value(legacy).expect("alias accepted");
        assert_eq!(decoded.storage_key, "groups/g/a.jpg");
    }
}
