pub mod admin;
pub mod chat;
pub mod widget;

use axum::{
    extract::ConnectInfo,
    http::{header, HeaderMap, StatusCode},
    response::Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use std::net::SocketAddr;
use time::Duration;

pub const VISITOR_COOKIE: &str = "site_assistant_visitor";
pub const SESSION_COOKIE: &str = "site_assistant_session";
pub const VISITOR_COOKIE_MAX_AGE: i64 = 365 * 24 * 60 * 60;
pub const SESSION_COOKIE_MAX_AGE: i64 = 24 * 60 * 60;

/// Error half of the public `{ success, data }` envelope.
pub type EnvelopeError = (StatusCode, Json<Value>);

pub fn envelope(data: Value) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

pub fn envelope_error(status: StatusCode, message: impl Into<String>) -> EnvelopeError {
    (
        status,
        Json(json!({ "success": false, "data": { "message": message.into() } })),
    )
}

/// Cookie value with percent-encoding and any surrounding quotes removed.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value_trimmed().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn site_cookie(name: &'static str, value: String, max_age_secs: i64, http_only: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .same_site(SameSite::Lax)
        .http_only(http_only)
        .build()
}

/// First `X-Forwarded-For` hop when behind a proxy, else the socket peer.
pub fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| ip.parse::<std::net::IpAddr>().is_ok())
        .map(str::to_string)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|ua| ua.chars().take(512).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn jar(cookie_header: &'static str) -> CookieJar {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static(cookie_header));
        CookieJar::from_headers(&headers)
    }

    #[test]
    fn test_cookie_value_among_others() {
        let jar = jar("theme=dark; site_assistant_visitor=abc-123; other=1");
        assert_eq!(cookie_value(&jar, VISITOR_COOKIE).as_deref(), Some("abc-123"));
        assert_eq!(cookie_value(&jar, SESSION_COOKIE), None);
    }

    #[test]
    fn test_cookie_value_quoted_and_encoded() {
        let quoted = jar("site_assistant_visitor=\"abc-123\"");
        assert_eq!(cookie_value(&quoted, VISITOR_COOKIE).as_deref(), Some("abc-123"));

        let encoded = jar("site_assistant_visitor=abc%2D123");
        assert_eq!(cookie_value(&encoded, VISITOR_COOKIE).as_deref(), Some("abc-123"));

        let blank = jar("site_assistant_visitor=");
        assert_eq!(cookie_value(&blank, VISITOR_COOKIE), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = site_cookie(SESSION_COOKIE, "s-1".to_string(), SESSION_COOKIE_MAX_AGE, true);
        assert_eq!(cookie.name(), "site_assistant_session");
        assert_eq!(cookie.value(), "s-1");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86400)));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.http_only(), Some(true));

        let visitor = site_cookie(VISITOR_COOKIE, "v-1".to_string(), VISITOR_COOKIE_MAX_AGE, false);
        assert_eq!(visitor.http_only(), Some(false));
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        let peer = ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000)));
        assert_eq!(client_ip(&headers, Some(&peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), Some(&peer)).as_deref(), Some("127.0.0.1"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
