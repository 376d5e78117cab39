use crate::domain_model::Headers;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(format!("unsupported method: {other}")),
        }
    }
}

/// Request payload. The client never looks inside it.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(serde_json::Value),
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl Body {
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Body::Json(serde_json::to_value(value)?))
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Body::Empty => None,
            Body::Json(_) => Some("application/json"),
            Body::Raw { content_type, .. } => Some(content_type.as_str()),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Body::Empty => Ok(Vec::new()),
            Body::Json(value) => serde_json::to_vec(value),
            Body::Raw { bytes, .. } => Ok(bytes.clone()),
        }
    }
}

/// A caller's logical request. Immutable once built; a replay after a token
/// refresh resends the very same value.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub body: Body,
}

impl OutboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        OutboundRequest {
            method,
            path: path.into(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        Ok(self.body(Body::json(value)?))
    }
}

/// Which send of a logical request is in progress.
///
/// `Initial -> Replay` is the only transition, and it happens at most once:
/// a 401 on the replay is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    Replay,
}

impl Attempt {
    pub fn next(self) -> Option<Attempt> {
        match self {
            Attempt::Initial => Some(Attempt::Replay),
            Attempt::Replay => None,
        }
    }
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attempt::Initial => f.write_str("initial"),
            Attempt::Replay => f.write_str("replay"),
        }
    }
}

/// What actually goes over the wire: the caller's request plus the headers the
/// client injects. `path` is relative to the transport's base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub body: Body,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_advances_once() {
        assert_eq!(Attempt::Initial.next(), Some(Attempt::Replay));
        assert_eq!(Attempt::Replay.next(), None);
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn json_body_reports_content_type() {
        let request = OutboundRequest::post("orders")
            .json(&serde_json::json!({ "sku": "A-1", "qty": 2 }))
            .unwrap();
        assert_eq!(request.body.content_type(), Some("application/json"));
        let sent: serde_json::Value =
            serde_json::from_slice(&request.body.to_bytes().unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({ "sku": "A-1", "qty": 2 }));
    }
}
