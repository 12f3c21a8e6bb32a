//! Helpers for resource identifiers
//!
//! Workspace folders, settings files and scoped reads are all addressed by URL.
//! Folder URLs are compared without their trailing slash.

use url::Url;

/// Strip a trailing slash from the path, keeping the root `/`
pub fn normalize(resource: &Url) -> Url {
    let mut normalized = resource.clone();
    let path = resource.path();
    if path.len() > 1 && path.ends_with('/') {
        normalized.set_path(path.trim_end_matches('/'));
    }
    normalized.set_fragment(None);
    normalized
}

/// Compare two resources ignoring a trailing slash
pub fn is_equal(a: &Url, b: &Url) -> bool {
    normalize(a) == normalize(b)
}

/// Whether `parent` is `resource` itself or one of its ancestors
pub fn is_equal_or_parent(resource: &Url, parent: &Url) -> bool {
    let resource = normalize(resource);
    let parent = normalize(parent);

    if resource.scheme() != parent.scheme()
        || resource.host_str() != parent.host_str()
        || resource.port() != parent.port()
    {
        return false;
    }

    let child_path = resource.path();
    let parent_path = parent.path();
    if child_path == parent_path {
        return true;
    }
    if parent_path == "/" {
        return child_path.starts_with('/');
    }
    child_path.starts_with(parent_path)
        && child_path.as_bytes().get(parent_path.len()) == Some(&b'/')
}

/// Append a relative, `/`-separated path to a resource
pub fn join_path(resource: &Url, relative: &str) -> Url {
    let mut joined = normalize(resource);
    let pushed = match joined.path_segments_mut() {
        Ok(mut segments) => {
            segments.pop_if_empty();
            segments.extend(relative.split('/').filter(|segment| !segment.is_empty()));
            true
        }
        Err(()) => false,
    };
    if pushed {
        joined
    } else {
        resource.join(relative).unwrap_or_else(|_| resource.clone())
    }
}

/// Parent directory of a resource
pub fn dirname(resource: &Url) -> Url {
    let normalized = normalize(resource);
    let path = normalized.path();
    match path.rfind('/') {
        Some(0) | None => {
            let mut root = normalized.clone();
            root.set_path("/");
            root
        }
        Some(index) => {
            let mut parent = normalized.clone();
            parent.set_path(&path[..index]);
            parent
        }
    }
}

/// Last path segment, decoded
pub fn basename(resource: &Url) -> String {
    let normalized = normalize(resource);
    let segment = normalized
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("")
        .to_string();
    percent_decode(&segment)
}

/// Path of `resource` relative to `base`, if `base` contains it
pub fn relative_path(base: &Url, resource: &Url) -> Option<String> {
    if !is_equal_or_parent(resource, base) {
        return None;
    }
    let base = normalize(base);
    let resource = normalize(resource);
    let rest = resource.path()[base.path().len()..].trim_start_matches('/');
    Some(percent_decode(rest))
}

fn percent_decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(&urlencoding::decode_binary(value.as_bytes())).into_owned())
}
