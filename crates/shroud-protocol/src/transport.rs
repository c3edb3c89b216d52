use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProtocolError, ProtocolResult};

/// Request headers as name/value pairs.
pub type Headers = [(String, String)];

/// A multipart form field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: FormValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl FormField {
    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn bytes(name: &str, value: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            value: FormValue::Bytes(value),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            FormValue::Text(t) => Some(t),
            FormValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            FormValue::Bytes(b) => Some(b),
            FormValue::Text(_) => None,
        }
    }
}

/// Body of a POST request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
    Empty,
    Json(String),
    Form(Vec<FormField>),
}

impl RequestBody {
    pub fn json<T: Serialize>(value: &T) -> ProtocolResult<Self> {
        serde_json::to_string(value)
            .map(RequestBody::Json)
            .map_err(|e| ProtocolError::Serialization(e.to_string()))
    }
}

/// Raw response: status and body bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetResponse {
    pub status: u16,
    pub data: Bytes,
}

impl NetResponse {
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        serde_json::from_slice(&self.data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    pub fn text(&self) -> ProtocolResult<String> {
        String::from_utf8(self.data.to_vec())
            .map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Turn a non-2xx response into [`ProtocolError::Status`].
    pub fn error_for_status(self) -> ProtocolResult<Self> {
        if self.ok() {
            Ok(self)
        } else {
            Err(ProtocolError::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.data).into_owned(),
            })
        }
    }
}

/// Network capability injected into the metadata and transfer layers.
///
/// Implementations only report transport failures as errors; HTTP error
/// statuses come back as regular responses.
#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn get(&self, url: &str, headers: &Headers) -> ProtocolResult<NetResponse>;

    async fn post(&self, url: &str, headers: &Headers, body: RequestBody)
        -> ProtocolResult<NetResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_helpers() {
        let ok = NetResponse {
            status: 204,
            data: Bytes::new(),
        };
        assert!(ok.ok());
        assert!(ok.error_for_status().is_ok());

        let bad = NetResponse {
            status: 404,
            data: Bytes::from_static(b"missing"),
        };
        assert_eq!(
            bad.error_for_status().unwrap_err(),
            ProtocolError::Status {
                status: 404,
                body: "missing".into()
            }
        );
    }

    #[test]
    fn json_body_and_response() {
        let body = RequestBody::json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(body, RequestBody::Json(r#"{"a":1}"#.into()));

        let res = NetResponse {
            status: 200,
            data: Bytes::from_static(br#"{"a":1}"#),
        };
        let value: serde_json::Value = res.json().unwrap();
        assert_eq!(value["a"], 1);
        assert_eq!(res.text().unwrap(), r#"{"a":1}"#);
    }
}
