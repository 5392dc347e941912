//! Request and response types
//!
//! The option structs mirror what a host binding hands over: methods and
//! formats arrive as strings and descriptors as loose JSON, and are checked
//! by [`crate::SecureTransport`] when used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;
use crate::pinning::ServerKeyPin;

/// Supported HTTP methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl FromStr for HttpMethod {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            other => Err(TransportError::InvalidHttpMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format of a request body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestFormat {
    /// Opaque body, sent as-is
    #[default]
    Generic,
    /// JSON body, eligible for descriptor substitution
    Json,
}

impl FromStr for RequestFormat {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GENERIC" => Ok(RequestFormat::Generic),
            "JSON" => Ok(RequestFormat::Json),
            other => Err(TransportError::InvalidRequestFormat(other.to_string())),
        }
    }
}

/// Options for opening a transport session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOptions {
    /// Server URL (https only)
    pub url: String,
    /// HTTP method, `GET` when absent
    #[serde(default)]
    pub method: Option<String>,
    /// Server public key or certificate in PEM form, pinned when present
    #[serde(default)]
    pub server_key: Option<String>,
    /// Response timeout in milliseconds
    #[serde(default, rename = "timeout")]
    pub timeout_ms: Option<u64>,
}

impl OpenOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method.as_str().to_string());
        self
    }

    pub fn server_key(mut self, pem: impl Into<String>) -> Self {
        self.server_key = Some(pem.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Options for sending the session's request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequestOptions {
    /// Body to send
    #[serde(default)]
    pub request_body: Option<String>,
    /// `GENERIC` or `JSON`, `GENERIC` when absent
    #[serde(default)]
    pub request_format: Option<String>,
    /// Array of `{instanceID, path}` descriptors
    #[serde(default)]
    pub secure_data_descriptors: Option<serde_json::Value>,
}

impl SendRequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.request_body = Some(body.into());
        self
    }

    pub fn format(mut self, format: RequestFormat) -> Self {
        self.request_format = Some(
            match format {
                RequestFormat::Generic => "GENERIC",
                RequestFormat::Json => "JSON",
            }
            .to_string(),
        );
        self
    }

    pub fn descriptors(mut self, descriptors: serde_json::Value) -> Self {
        self.secure_data_descriptors = Some(descriptors);
        self
    }
}

/// Response returned by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "responseHttpStatus")]
    pub status: u16,
    #[serde(rename = "responseHeader")]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "responseBody")]
    pub body: String,
}

/// Fully resolved request handed to an executor
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: Url,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    /// Key the server must present, when pinned
    pub pinned_key: Option<ServerKeyPin>,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        for m in ["GET", "POST", "PUT", "DELETE", "HEAD", "OPTIONS"] {
            assert_eq!(m.parse::<HttpMethod>().unwrap().as_str(), m);
        }
        assert!(matches!(
            "PATCH".parse::<HttpMethod>(),
            Err(TransportError::InvalidHttpMethod(_))
        ));
        assert!("get".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_request_format_parsing() {
        assert_eq!("JSON".parse::<RequestFormat>().unwrap(), RequestFormat::Json);
        assert!(matches!(
            "XML".parse::<RequestFormat>(),
            Err(TransportError::InvalidRequestFormat(_))
        ));
    }

    #[test]
    fn test_options_wire_names() {
        let opts: OpenOptions = serde_json::from_str(
            r#"{"url":"https://api.example/v1","method":"POST","timeout":500}"#,
        )
        .unwrap();
        assert_eq!(opts.method.as_deref(), Some("POST"));
        assert_eq!(opts.timeout_ms, Some(500));

        let send: SendRequestOptions = serde_json::from_str(
            r#"{"requestBody":"{}","requestFormat":"JSON","secureDataDescriptors":[]}"#,
        )
        .unwrap();
        assert_eq!(send.request_format.as_deref(), Some("JSON"));

        let response = Response {
            status: 200,
            ..Default::default()
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["responseHttpStatus"], 200);
    }
}
