use crate::bencode::encoder::DictWriter;
use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};

pub async fn fallback_handler(headers: HeaderMap) -> Response {
    // Check if this is a browser request
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let is_browser = ["Mozilla", "Chrome", "Safari", "Firefox", "Edge"]
        .iter()
        .any(|name| user_agent.contains(name));

    if is_browser {
        return (StatusCode::NOT_FOUND, Html("Nothing to see here. Lost in the void!")).into_response();
    }

    let mut body = Vec::with_capacity(72);
    let mut dict = DictWriter::begin(&mut body);
    dict.entry("failure reason", &"invalid endpoint, use /announce or /scrape instead");
    dict.end();

    (StatusCode::NOT_FOUND, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_fallback_for_clients_is_bencoded() {
        let response = fallback_handler(HeaderMap::new()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            &body[..],
            b"d14:failure reason50:invalid endpoint, use /announce or /scrape insteade"
        );
    }

    #[tokio::test]
    async fn test_fallback_for_browsers_is_html() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "Mozilla/5.0".parse().unwrap());

        let response = fallback_handler(headers).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
    }
}
