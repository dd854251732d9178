//! Where to send a user after they log in.

use axum::{extract::Request, http::Uri};

use crate::endpoints;

/// Return the path and query of `raw_url` if it is safe to redirect to after log-in.
///
/// Only relative paths on this site are allowed, and never the log-in page itself.
pub fn normalize_redirect_url(raw_url: &str) -> Option<String> {
    let uri = raw_url.parse::<Uri>().ok()?;
    if uri.scheme().is_some() || uri.authority().is_some() {
        return None;
    }

    let path_and_query = uri.path_and_query()?.as_str();
    let is_safe = path_and_query.starts_with('/')
        && !path_and_query.starts_with("//")
        && uri.path() != endpoints::LOG_IN_VIEW;

    is_safe.then(|| path_and_query.to_owned())
}

/// Build the log-in page URL that returns the user to the page they requested.
///
/// HTMX requests to the API come from a page, so the page in `HX-Current-URL` is
/// used instead of the API route. Falls back to the dashboard.
pub fn build_log_in_redirect_url(request: &Request) -> String {
    let target = if request.uri().path().starts_with("/api") {
        request
            .headers()
            .get("hx-current-url")
            .and_then(|header| header.to_str().ok())
            .and_then(|current_url| current_url.parse::<Uri>().ok())
            .and_then(|uri| uri.path_and_query().map(|path| path.as_str().to_owned()))
            .and_then(|path| normalize_redirect_url(&path))
    } else {
        request
            .uri()
            .path_and_query()
            .and_then(|path| normalize_redirect_url(path.as_str()))
    };

    let target = target.unwrap_or_else(|| {
        tracing::warn!(
            "No usable redirect target for {}, falling back to the dashboard.",
            request.uri()
        );
        endpoints::DASHBOARD_VIEW.to_owned()
    });

    log_in_url_with_redirect(&target)
}

fn log_in_url_with_redirect(target: &str) -> String {
    match serde_urlencoded::to_string([("redirect_url", target)]) {
        Ok(query) => format!("{}?{query}", endpoints::LOG_IN_VIEW),
        Err(error) => {
            tracing::error!("Could not encode redirect URL {target}: {error}");
            endpoints::LOG_IN_VIEW.to_owned()
        }
    }
}

#[cfg(test)]
mod redirect_tests {
    use axum::{body::Body, extract::Request};

    use crate::endpoints;

    use super::{build_log_in_redirect_url, normalize_redirect_url};

    #[test]
    fn accepts_relative_path_with_query() {
        assert_eq!(
            normalize_redirect_url("/transactions?page=2"),
            Some("/transactions?page=2".to_owned())
        );
    }

    #[test]
    fn rejects_other_sites() {
        assert_eq!(normalize_redirect_url("https://example.com/"), None);
        assert_eq!(normalize_redirect_url("//example.com/"), None);
    }

    #[test]
    fn rejects_log_in_page() {
        assert_eq!(normalize_redirect_url(endpoints::LOG_IN_VIEW), None);
    }

    #[test]
    fn page_request_redirects_back_to_page() {
        let request = Request::builder()
            .uri("/reports")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            build_log_in_redirect_url(&request),
            "/log_in?redirect_url=%2Freports"
        );
    }

    #[test]
    fn api_request_uses_current_url() {
        let request = Request::builder()
            .uri("/api/transactions")
            .header("hx-request", "true")
            .header("hx-current-url", "http://localhost:3000/transactions/new")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            build_log_in_redirect_url(&request),
            "/log_in?redirect_url=%2Ftransactions%2Fnew"
        );
    }

    #[test]
    fn api_request_without_current_url_falls_back_to_dashboard() {
        let request = Request::builder()
            .uri("/api/transactions")
            .body(Body::empty())
            .unwrap();

        assert_eq!(
            build_log_in_redirect_url(&request),
            "/log_in?redirect_url=%2Fdashboard"
        );
    }
}
