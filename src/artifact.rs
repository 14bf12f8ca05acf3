use super::*;
use std::path::{Path, PathBuf};

const MAX_NAME_BYTES: usize = 244;

/// File name for the page saved when a test fails: non-word characters become `.`,
/// the result is cut to a byte budget on a character boundary, then `.fail.<ext>`.
pub(crate) fn failure_file_name(signature: &str, content_type: Option<&str>) -> Result<String> {
    let sanitized = fancy_regex::Regex::new(r"\W")?.replace_all(signature, ".");
    let mut cut = sanitized.len().min(MAX_NAME_BYTES);
    while !sanitized.is_char_boundary(cut) {
        cut -= 1;
    }
    Ok(format!(
        "{}.fail.{}",
        &sanitized[..cut],
        extension_for(content_type.unwrap_or_default())
    ))
}

pub(crate) fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime {
        "application/json" => "json",
        "text/xml" | "application/xml" => "xml",
        "text/plain" => "txt",
        _ => "html",
    }
}

pub(crate) fn write_artifact(dir: &Path, file_name: &str, content: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(Error::io)?;
    let path = dir.join(file_name);
    std::fs::write(&path, content).map_err(Error::io)?;
    tracing::info!(target: "inner_browser", path = %path.display(), "saved page source");
    Ok(path)
}

/// Default snapshot name: a local timestamp with sub-second suffix.
pub(crate) fn snapshot_name() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S_%6f").to_string()
}
