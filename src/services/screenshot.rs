use std::path::{Component, Path};

/// Build the public URL of a screenshot saved under `static_dir`.
///
/// Returns `None` when the file lives outside the static directory.
pub fn screenshot_url(base_url: &str, static_dir: &Path, screenshot_path: &str) -> Option<String> {
    let path = Path::new(screenshot_path);

    let relative = match path.strip_prefix(static_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) if path.is_absolute() && static_dir.is_relative() => {
            let absolute = std::env::current_dir().ok()?.join(static_dir);
            path.strip_prefix(&absolute).ok()?.to_path_buf()
        }
        Err(_) => return None,
    };

    let segments: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if segments.is_empty() {
        return None;
    }

    Some(format!(
        "{}/static/{}",
        base_url.trim_end_matches('/'),
        segments.join("/")
    ))
}
