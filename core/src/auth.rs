//! Token acquisition.
//!
//! `get_token` depends only on the credentials, the configuration and a
//! transport, so it can be called (and tested) without a client.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{check_status, ApiError};
use crate::http::{HttpMethod, HttpRequest, Transport};
use crate::types::parse_utc;

/// Username and password used to obtain tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Both username and password are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `Authorization` value for HTTP basic auth.
pub fn basic_auth_header(credentials: &Credentials) -> String {
    let raw = format!("{}:{}", credentials.username, credentials.password);
    format!("Basic {}", STANDARD.encode(raw))
}

pub(crate) fn json_headers() -> Vec<(String, String)> {
    vec![
        ("Accept".to_string(), "application/json".to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ]
}

/// Exchange credentials for a token and its expiry (naive UTC).
pub fn get_token<T: Transport + ?Sized>(
    transport: &T,
    config: &ClientConfig,
    credentials: &Credentials,
) -> Result<(String, NaiveDateTime), ApiError> {
    let mut headers = json_headers();
    headers.push(("Authorization".to_string(), basic_auth_header(credentials)));
    let request = HttpRequest {
        method: HttpMethod::Post,
        url: config.url("authenticate"),
        headers,
        body: None,
    };

    debug!(url = %request.url, username = %credentials.username, "requesting token");
    let response = transport
        .execute(&request)
        .map_err(|e| ApiError::Timeout { message: e.message })?;

    if response.status == 401 {
        return Err(ApiError::Authentication {
            message: "unable to authenticate with given username/password".to_string(),
            status: Some(401),
            body: Some(response.body),
        });
    }
    check_status(&response)?;

    const ENTITY: &str = "token";
    let body: Value = serde_json::from_str(&response.body)
        .map_err(|_| ApiError::malformed(ENTITY, &response.body))?;
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::malformed(ENTITY, &body))?;
    let expiry = body
        .get("expires_at")
        .and_then(Value::as_str)
        .and_then(parse_utc)
        .ok_or_else(|| ApiError::malformed(ENTITY, &body))?;

    Ok((token.to_string(), expiry))
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::NaiveDate;

    use super::*;
    use crate::http::{HttpResponse, TransportError};

    struct OneShot {
        response: Result<HttpResponse, TransportError>,
        seen: RefCell<Option<HttpRequest>>,
    }

    impl OneShot {
        fn answering(status: u16, body: &str) -> Self {
            Self {
                response: Ok(HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                }),
                seen: RefCell::new(None),
            }
        }
    }

    impl Transport for OneShot {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            *self.seen.borrow_mut() = Some(request.clone());
            self.response.clone()
        }
    }

    fn creds() -> Credentials {
        Credentials::new("user", "pw")
    }

    #[test]
    fn basic_auth_is_base64_of_user_colon_password() {
        assert_eq!(basic_auth_header(&creds()), "Basic dXNlcjpwdw==");
    }

    #[test]
    fn blank_fields_are_incomplete() {
        assert!(creds().is_complete());
        assert!(!Credentials::new("", "pw").is_complete());
        assert!(!Credentials::new("user", "").is_complete());
    }

    #[test]
    fn debug_hides_password() {
        let shown = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(shown.contains("user"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn token_is_fetched_with_basic_auth() {
        let transport = OneShot::answering(
            200,
            r#"{"token":"abc","expires_at":"2019-03-16T16:48:48.550Z"}"#,
        );
        let config = ClientConfig::new("http://localhost:3000");
        let (token, expiry) = get_token(&transport, &config, &creds()).unwrap();

        assert_eq!(token, "abc");
        let expected = NaiveDate::from_ymd_opt(2019, 3, 16)
            .unwrap()
            .and_hms_milli_opt(16, 48, 48, 550)
            .unwrap();
        assert_eq!(expiry, expected);

        let request = transport.seen.borrow().clone().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "http://localhost:3000/authenticate");
        assert_eq!(request.header("authorization"), Some("Basic dXNlcjpwdw=="));
        assert_eq!(request.header("accept"), Some("application/json"));
    }

    #[test]
    fn rejected_credentials_are_an_authentication_error() {
        let transport = OneShot::answering(401, "");
        let err = get_token(&transport, &ClientConfig::default(), &creds()).unwrap_err();
        assert!(matches!(err, ApiError::Authentication { status: Some(401), .. }));
    }

    #[test]
    fn server_error_maps_through_status_table() {
        let transport = OneShot::answering(503, "down");
        let err = get_token(&transport, &ClientConfig::default(), &creds()).unwrap_err();
        assert!(matches!(err, ApiError::InternalServer { status: 503, .. }));
    }

    #[test]
    fn missing_expiry_is_malformed() {
        let transport = OneShot::answering(200, r#"{"token":"abc"}"#);
        let err = get_token(&transport, &ClientConfig::default(), &creds()).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { entity: "token", .. }));
    }

    #[test]
    fn transport_failure_is_a_timeout() {
        let transport = OneShot {
            response: Err(TransportError::new("connection refused")),
            seen: RefCell::new(None),
        };
        let err = get_token(&transport, &ClientConfig::default(), &creds()).unwrap_err();
        assert!(matches!(err, ApiError::Timeout { .. }));
    }
}
