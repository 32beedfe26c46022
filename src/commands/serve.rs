use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse};
use flatpage::site::{Request, Site};
use tower_http::services::ServeDir;

use crate::ServeArgs;

#[derive(Clone)]
struct AppState {
    site: Arc<Site>,
    /// Normalized mount path: `/` or `/prefix` without a trailing slash
    mount_path: String,
}

/// Run every non-asset request through the site pipeline.
async fn page_handler(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> axum::response::Response {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let request = Request::new(path.clone())
        .with_mount_path(state.mount_path.clone())
        .with_base_url(request_base_url(&headers, &state.mount_path));

    let site = Arc::clone(&state.site);
    let result = tokio::task::spawn_blocking(move || site.handle(&request)).await;

    match result {
        Ok(Ok(response)) => {
            let status = StatusCode::from_u16(response.status.code()).unwrap_or(StatusCode::OK);
            tracing::info!(path = %path, status = status.as_u16(), "served page");
            (status, Html(response.body)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(path = %path, error = %e, "failed to render page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render {path}: {e}"),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(path = %path, error = %e, "page task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `scheme://host/mount`, as seen by the client.
fn request_base_url(headers: &HeaderMap, mount_path: &str) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");
    format!("{scheme}://{host}{}", mount_path.trim_end_matches('/'))
}

fn normalize_mount(mount: &str) -> String {
    let trimmed = mount.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Theme assets are served as static files; everything else is a page.
fn router(site: Arc<Site>, mount_path: &str) -> Router {
    let mount_path = normalize_mount(mount_path);
    let themes_route = format!(
        "{}/{}",
        mount_path.trim_end_matches('/'),
        site.themes_url_segment()
    );
    let themes_dir = site.themes_dir();

    Router::new()
        .nest_service(&themes_route, ServeDir::new(themes_dir))
        .fallback(page_handler)
        .with_state(AppState { site, mount_path })
}

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let site = Site::load(args.config_file.as_deref())?;
    tracing::info!(
        root = %site.root_dir().display(),
        theme = %site.config().theme,
        "loaded site"
    );

    let mount_path = normalize_mount(&args.mount);
    let app = router(Arc::new(site), &mount_path);

    // Parse the address
    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;

    // Determine the URL to display
    let display_host = if args.bind == "0.0.0.0" {
        "localhost"
    } else {
        &args.bind
    };
    let url = format!(
        "http://{}:{}{}",
        display_host,
        args.port,
        mount_path.trim_end_matches('/')
    );

    tracing::info!("serving site at {url}, press Ctrl+C to stop");

    // Open browser if requested
    if args.open
        && let Err(e) = open::that(&url)
    {
        tracing::warn!(error = %e, "failed to open browser");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
