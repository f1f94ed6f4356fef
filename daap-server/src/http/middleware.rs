use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::prelude::*;

use super::AppState;

/// iTunes occasionally prefixes the request path with the scheme and
/// host it thinks it's talking to (`daap://host:port/...` or even
/// `http://host:port/...`). Strip that down to a bare absolute path
/// before the router ever sees it.
pub async fn rewrite_wsgi_style_path(mut request: Request, next: Next) -> Response {
    let uri = request.uri();
    if let Some(rewritten) = strip_scheme_and_host(uri) {
        *request.uri_mut() = rewritten;
    }
    next.run(request).await
}

fn strip_scheme_and_host(uri: &Uri) -> Option<Uri> {
    let raw = uri.path();
    let after_scheme = raw
        .strip_prefix("daap://")
        .or_else(|| raw.strip_prefix("http://"))?;
    let path_start = after_scheme.find('/').unwrap_or(after_scheme.len());
    let rest = &after_scheme[path_start..];
    let rest = if rest.is_empty() { "/" } else { rest };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(rest.parse().ok()?);
    Uri::from_parts(parts).ok()
}

/// HTTP Basic auth, password-only. A no-op pass-through when no
/// password is configured.
pub async fn basic_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.server.password.as_deref() else {
        return next.run(request).await;
    };

    let unauthorized = || {
        let realm = format!("Basic realm=\"{}\"", state.config.server.name);
        let mut response = StatusCode::UNAUTHORIZED.into_response();
        if let Ok(value) = HeaderValue::from_str(&realm) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    };

    let Some(header_value) = request.headers().get(header::AUTHORIZATION) else {
        return unauthorized();
    };
    let Ok(header_str) = header_value.to_str() else {
        return unauthorized();
    };
    let Some(encoded) = header_str.strip_prefix("Basic ") else {
        return unauthorized();
    };
    let Ok(decoded) = BASE64_STANDARD.decode(encoded) else {
        return unauthorized();
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return unauthorized();
    };
    // DAAP Basic auth is password-only; the username half is ignored.
    let password = decoded.splitn(2, ':').nth(1).unwrap_or("");

    if password == expected {
        next.run(request).await
    } else {
        unauthorized()
    }
}

/// Stamps the headers every DAAP response carries, success or failure.
pub async fn stamp_daap_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&state.config.server.name) {
        headers.insert("DAAP-Server", value);
    }
    headers.insert(header::CONTENT_LANGUAGE, HeaderValue::from_static("en_us"));
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daap_scheme_prefix_is_stripped_to_bare_path() {
        let uri: Uri = "daap://myserver:3689/databases/1/items?session-id=1"
            .parse()
            .unwrap();
        let rewritten = strip_scheme_and_host(&uri).unwrap();
        assert_eq!(rewritten.path(), "/databases/1/items");
        assert_eq!(rewritten.query(), Some("session-id=1"));
    }

    #[test]
    fn ordinary_absolute_path_is_left_alone() {
        let uri: Uri = "/server-info".parse().unwrap();
        assert!(strip_scheme_and_host(&uri).is_none());
    }
}
