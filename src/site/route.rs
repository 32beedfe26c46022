//! Mapping request paths to content files.
//!
//! A request path is first reduced to a *route*: the part after the mount
//! path, without query string and surrounding slashes. The route is then
//! resolved against the content directory:
//!
//! ```ignore
//! ""            => content/index.md
//! "about"       => content/about.md
//! "blog"        => content/blog/index.md   (when content/blog is a directory)
//! "missing"     => content/404.md          (status NotFound)
//! ```

use std::path::{Component, Path, PathBuf};

/// Name of the document served when nothing matches a route.
pub const NOT_FOUND_NAME: &str = "404";

/// Name of the document that serves its directory's URL.
pub const INDEX_NAME: &str = "index";

/// Whether the route matched a real content file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Found,
    NotFound,
}

/// The outcome of resolving a route to a file under the content directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub path: PathBuf,
    pub status: RouteStatus,
}

/// Reduce a raw request path to a route relative to the mount path.
///
/// The query string is dropped before anything else, so `/?page=2` and `/`
/// are the same route.
pub fn request_route(request_path: &str, mount_path: &str) -> String {
    let path = request_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    let mount = mount_path.trim_end_matches('/');
    let relative = match path.strip_prefix(mount) {
        // Only strip whole segments: "/blogroll" is not under "/blog".
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    };

    let decoded = urlencoding::decode(relative)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| relative.to_string());

    decoded.trim_matches('/').to_string()
}

/// Resolve a route to the content file that serves it.
///
/// Falls back to the not-found document when the route does not name an
/// existing file. Routes that would escape the content directory are
/// treated as not found.
pub fn resolve_content_file(route: &str, content_dir: &Path, content_ext: &str) -> ResolvedFile {
    let not_found = ResolvedFile {
        path: content_dir.join(format!("{NOT_FOUND_NAME}{content_ext}")),
        status: RouteStatus::NotFound,
    };

    let route = if route.is_empty() { INDEX_NAME } else { route };
    let relative = Path::new(route);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return not_found;
    }

    let base = content_dir.join(relative);
    let path = if base.is_dir() {
        base.join(format!("{INDEX_NAME}{content_ext}"))
    } else {
        // Append rather than `with_extension`: "v1.2" must become "v1.2.md".
        let mut file = base.into_os_string();
        file.push(content_ext);
        PathBuf::from(file)
    };

    if path.is_file() {
        ResolvedFile {
            path,
            status: RouteStatus::Found,
        }
    } else {
        not_found
    }
}
