//! Authenticated client for the Todoable API.
//!
//! # Design
//! `TodoableClient` owns the token state and nothing else that changes
//! between calls. Every operation funnels through `make_request`, which
//! refreshes a missing or expired token first, executes the request on the
//! configured `Transport`, and turns any non-2xx status into an `ApiError`.
//! Operations that return data come in pairs: one parses the body into
//! domain records, the `_raw` sibling returns the JSON untouched.

use chrono::{NaiveDateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::{get_token, json_headers, Credentials};
use crate::config::{ClientConfig, TOKEN_TTL};
use crate::error::{check_status, ApiError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::transport::UreqTransport;
use crate::types::{FromPayload, List, ListItem};

/// Blocking client for the Todoable API.
///
/// Operations take `&mut self` because any of them may replace the token.
/// Share a client across threads by wrapping it in a `Mutex`, which also
/// keeps two callers from reauthenticating at the same time.
pub struct TodoableClient<T: Transport = UreqTransport> {
    config: ClientConfig,
    transport: T,
    token: Option<String>,
    token_expiry: Option<NaiveDateTime>,
    credentials: Option<Credentials>,
}

impl TodoableClient<UreqTransport> {
    /// Authenticate against the public API and keep the credentials for
    /// later reauthentication.
    pub fn from_credentials(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let config = ClientConfig::default();
        let transport = UreqTransport::new(config.timeout);
        Self::connect(config, transport, Credentials::new(username, password))
    }

    /// Reuse an existing token. Without credentials the client cannot
    /// recover once the token expires.
    pub fn from_token(
        token: impl Into<String>,
        expiry: Option<NaiveDateTime>,
        credentials: Option<Credentials>,
    ) -> Self {
        let config = ClientConfig::default();
        let transport = UreqTransport::new(config.timeout);
        Self::with_token(config, transport, token, expiry, credentials)
    }
}

impl<T: Transport> TodoableClient<T> {
    pub fn connect(config: ClientConfig, transport: T, credentials: Credentials) -> Result<Self, ApiError> {
        let (token, expiry) = get_token(&transport, &config, &credentials)?;
        Ok(Self {
            config,
            transport,
            token: Some(token),
            token_expiry: Some(expiry),
            credentials: Some(credentials),
        })
    }

    /// An empty `token` counts as no token and is fetched on first use.
    /// Credentials with a blank username or password count as none.
    pub fn with_token(
        config: ClientConfig,
        transport: T,
        token: impl Into<String>,
        expiry: Option<NaiveDateTime>,
        credentials: Option<Credentials>,
    ) -> Self {
        let credentials = credentials.filter(Credentials::is_complete);
        if credentials.is_none() {
            warn!(
                "tokens expire after {} seconds, username/password required for automatic reauthentication",
                TOKEN_TTL.as_secs()
            );
        }
        let token = token.into();
        Self {
            config,
            transport,
            token: (!token.is_empty()).then_some(token),
            token_expiry: expiry,
            credentials,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn token_expiry(&self) -> Option<NaiveDateTime> {
        self.token_expiry
    }

    /// Headers sent when the caller passes none: JSON content negotiation
    /// plus the current token.
    pub fn default_headers(&self) -> Vec<(String, String)> {
        let mut headers = json_headers();
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Token token={token}")));
        }
        headers
    }

    /// Fetch a fresh token with the stored credentials.
    pub fn update_token(&mut self) -> Result<(), ApiError> {
        let credentials = self
            .credentials
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or_else(|| ApiError::Authentication {
                message: "unable to update token without username and password".to_string(),
                status: None,
                body: None,
            })?;
        let (token, expiry) = get_token(&self.transport, &self.config, credentials)?;
        self.token = Some(token);
        self.token_expiry = Some(expiry);
        Ok(())
    }

    fn token_is_stale(&self) -> bool {
        match (&self.token, self.token_expiry) {
            (None, _) => true,
            (Some(_), Some(expiry)) => Utc::now().naive_utc() >= expiry,
            (Some(_), None) => false,
        }
    }

    /// Execute one request, reauthenticating first if the token is missing
    /// or expired. Only 2xx responses are returned.
    pub fn make_request(
        &mut self,
        method: HttpMethod,
        url: &str,
        headers: Option<Vec<(String, String)>>,
        body: Option<String>,
    ) -> Result<HttpResponse, ApiError> {
        if self.token_is_stale() {
            info!("token missing or expired, reauthenticating");
            self.update_token()?;
        }

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers: headers
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| self.default_headers()),
            body,
        };

        debug!(%method, url, "sending request");
        let response = self
            .transport
            .execute(&request)
            .map_err(|e| ApiError::Timeout { message: e.message })?;
        debug!(%method, url, status = response.status, "received response");

        check_status(&response)?;
        Ok(response)
    }

    fn request_json(&mut self, method: HttpMethod, url: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let response = self.make_request(method, url, None, body.map(|b| b.to_string()))?;
        serde_json::from_str(&response.body).map_err(|_| ApiError::malformed("response body", &response.body))
    }

    fn lists_url(&self) -> String {
        self.config.url("lists")
    }

    fn list_url(&self, list_id: &str) -> String {
        self.config.url(&format!("lists/{list_id}"))
    }

    fn item_url(&self, list_id: &str, item_id: &str) -> String {
        self.config.url(&format!("lists/{list_id}/items/{item_id}"))
    }

    pub fn get_lists_raw(&mut self) -> Result<Value, ApiError> {
        let url = self.lists_url();
        self.request_json(HttpMethod::Get, &url, None)
    }

    /// All lists. With `include_items`, each list's items are fetched with
    /// one extra request per list.
    pub fn get_lists(&mut self, include_items: bool) -> Result<Vec<List>, ApiError> {
        let body = self.get_lists_raw()?;
        let mut lists = body
            .get("lists")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiError::malformed("lists", &body))?
            .iter()
            .map(List::parse)
            .collect::<Result<Vec<_>, _>>()?;

        if include_items {
            debug!(count = lists.len(), "loading items, one request per list");
            for list in &mut lists {
                let Some(id) = list.id.clone() else { continue };
                let detail = self.get_list_raw(&id)?;
                list.items = List::parse(&detail)?.items;
            }
        }

        Ok(lists)
    }

    /// The list body with `id` merged in, since the endpoint omits it.
    pub fn get_list_raw(&mut self, list_id: &str) -> Result<Value, ApiError> {
        let url = self.list_url(list_id);
        let mut body = self.request_json(HttpMethod::Get, &url, None)?;
        match body.as_object_mut() {
            Some(fields) => {
                fields.insert("id".to_string(), Value::String(list_id.to_string()));
            }
            None => return Err(ApiError::malformed("List", &body)),
        }
        Ok(body)
    }

    pub fn get_list(&mut self, list_id: &str) -> Result<List, ApiError> {
        let body = self.get_list_raw(list_id)?;
        List::parse(&body)
    }

    pub fn create_list_raw(&mut self, name: &str) -> Result<Value, ApiError> {
        let url = self.lists_url();
        self.request_json(HttpMethod::Post, &url, Some(json!({"list": {"name": name}})))
    }

    pub fn create_list(&mut self, name: &str) -> Result<List, ApiError> {
        let body = self.create_list_raw(name)?;
        List::parse(&body)
    }

    /// Rename a list. The server's reply is discarded.
    pub fn update_list(&mut self, list_id: &str, new_name: &str) -> Result<(), ApiError> {
        let url = self.list_url(list_id);
        let body = json!({"list": {"name": new_name}}).to_string();
        self.make_request(HttpMethod::Patch, &url, None, Some(body))?;
        Ok(())
    }

    pub fn delete_list(&mut self, list_id: &str) -> Result<(), ApiError> {
        let url = self.list_url(list_id);
        self.make_request(HttpMethod::Delete, &url, None, None)?;
        Ok(())
    }

    pub fn create_list_item_raw(&mut self, list_id: &str, name: &str) -> Result<Value, ApiError> {
        let url = self.config.url(&format!("lists/{list_id}/items"));
        self.request_json(HttpMethod::Post, &url, Some(json!({"item": {"name": name}})))
    }

    pub fn create_list_item(&mut self, list_id: &str, name: &str) -> Result<ListItem, ApiError> {
        let body = self.create_list_item_raw(list_id, name)?;
        ListItem::parse(&body)
    }

    /// Mark an item finished. The server's reply is discarded.
    pub fn complete_list_item(&mut self, list_id: &str, item_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/finish", self.item_url(list_id, item_id));
        self.make_request(HttpMethod::Put, &url, None, None)?;
        Ok(())
    }

    pub fn delete_list_item(&mut self, list_id: &str, item_id: &str) -> Result<(), ApiError> {
        let url = self.item_url(list_id, item_id);
        self.make_request(HttpMethod::Delete, &url, None, None)?;
        Ok(())
    }
}
