use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// CSP for server-rendered pages: same-origin forms and inline styles only.
const PAGE_CSP: &str = "default-src 'self'; \
                        style-src 'self' 'unsafe-inline'; \
                        img-src 'self' data:; \
                        script-src 'none'; \
                        form-action 'self'; \
                        frame-ancestors 'none'";

/// CSP for JSON routes.
const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'";

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_api_route = req.uri().path().starts_with("/api/");

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        header::HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static(if is_api_route { API_CSP } else { PAGE_CSP }),
    );

    response
}
