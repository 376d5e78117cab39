use crate::domain_model::Headers;
use serde::de::DeserializeOwned;

pub const STATUS_UNAUTHORIZED: u16 = 401;

/// A response exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        ApiResponse {
            status,
            headers,
            body,
        }
    }

    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", "application/json");
        ApiResponse {
            status,
            headers,
            body: value.to_string().into_bytes(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_status() {
        let ok = ApiResponse::json_body(204, &json!(null));
        assert!(ok.is_success());
        assert!(!ok.is_unauthorized());

        let denied = ApiResponse::json_body(401, &json!({ "error": "expired" }));
        assert!(!denied.is_success());
        assert!(denied.is_unauthorized());
    }

    #[test]
    fn decodes_json_body() {
        let response = ApiResponse::json_body(200, &json!({ "orders": [1, 2] }));
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["orders"][1], 2);
        assert_eq!(response.headers.get("content-type"), Some("application/json"));
    }
}
