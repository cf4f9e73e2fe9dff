//! Response headers for token-bearing endpoints.

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Middleware that keeps every response out of shared and browser caches.
///
/// Signup, login and refresh responses carry bearer credentials:
///
/// - **Cache-Control: no-store** and **Pragma: no-cache**
///   No cache, proxy or HTTP/1.0 intermediary may retain the body.
///
/// - **X-Content-Type-Options: nosniff**
///   Browsers must respect the declared JSON content type.
///
/// # Usage
///
/// ```rust,no_run
/// use axum::Router;
/// use axum::middleware;
/// use ballotbox::middleware::no_store;
///
/// let app: Router = Router::new()
///     .layer(middleware::from_fn(no_store));
/// ```
pub async fn no_store(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    response
}
