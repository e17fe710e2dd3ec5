use crate::paging::QueryParams;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::convert::Infallible;

/// Top level navigation entry a page belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Section {
    #[default]
    Home,
    Sensors,
    Things,
    Admin,
    Error,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Home => "home",
            Section::Sensors => "sensors",
            Section::Things => "things",
            Section::Admin => "admin",
            Section::Error => "error",
        }
    }
}

/// Per-request state threaded through composers and renderers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: String,
    pub section: Section,
    pub query: QueryParams,
}

impl RequestContext {
    pub fn new(token: impl Into<String>) -> Self {
        RequestContext {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn in_section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }
}

fn bearer_token(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .unwrap_or(value)
        .trim()
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(bearer_token)
            .unwrap_or_default()
            .to_string();

        let query = parts.uri.query().map(QueryParams::parse).unwrap_or_default();

        Ok(RequestContext {
            token,
            section: Section::default(),
            query,
        })
    }
}
