use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Paths that serve HTML pages with inline script and style.
const PAGE_ROUTES: &[&str] = &["/", "/dbview"];

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_page_route = PAGE_ROUTES.contains(&req.uri().path());

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        header::HeaderValue::from_static("DENY"),
    );

    if is_page_route {
        // Pages call the JSON API on the same origin.
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static(
                "default-src 'self'; \
                 script-src 'self' 'unsafe-inline'; \
                 style-src 'self' 'unsafe-inline'; \
                 connect-src 'self'; \
                 frame-ancestors 'none'",
            ),
        );
    } else {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        );
    }

    response
}
