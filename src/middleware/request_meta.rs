//! Client-observed request metadata attached to activity log entries.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::models::activity_log::NewActivityLog;

/// Originating host and user agent of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub hostname: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        // Prefer the host the browser saw when behind a proxy
        let hostname = headers
            .get("x-forwarded-host")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| text(header::HOST));

        Self {
            hostname,
            user_agent: text(header::USER_AGENT),
        }
    }

    /// Stamp this metadata onto an entry.
    pub fn stamp(&self, entry: NewActivityLog) -> NewActivityLog {
        entry.with_origin(self.hostname.clone(), self.user_agent.clone())
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_host_wins_over_host() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("internal:3000"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("club.example, proxy"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let meta = RequestMeta::from_headers(&headers);
        assert_eq!(meta.hostname.as_deref(), Some("club.example"));
        assert_eq!(meta.user_agent.as_deref(), Some("Mozilla/5.0"));
    }

    #[test]
    fn missing_headers_are_none() {
        let meta = RequestMeta::from_headers(&HeaderMap::new());
        assert_eq!(meta, RequestMeta::default());
    }
}
