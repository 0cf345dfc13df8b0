///! Static site publishing

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use reelstack_common::retry::RetryPolicy;
use reelstack_common::Error;

use crate::client::ControlPlaneClient;
use crate::commands::Targets;
use crate::output;
use crate::retry;

/// Retry budget for uploads against a just-configured static-site endpoint.
fn upload_policy() -> RetryPolicy {
    RetryPolicy::new(5, Duration::from_secs(2), 2.0).with_jitter()
}

pub async fn handle_publish_command(
    group: &str,
    site_dir: &Path,
    api: &ControlPlaneClient,
) -> Result<()> {
    let targets = Targets::for_group(group);

    let files = collect_files(site_dir)
        .with_context(|| format!("cannot read site directory {}", site_dir.display()))?;

    if files.is_empty() {
        anyhow::bail!("site directory {} contains no files", site_dir.display());
    }

    output::print_info(&format!(
        "Publishing {} files from {} to storage '{}'...",
        files.len(),
        site_dir.display(),
        targets.storage
    ));

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=> "),
    );
    progress.set_message("Uploading");

    let policy = upload_policy();
    let storage = targets.storage.as_str();

    for (blob_path, local_path) in &files {
        let bytes = std::fs::read(local_path)
            .with_context(|| format!("cannot read {}", local_path.display()))?;
        let content_type = content_type_for(blob_path);
        let blob_path = blob_path.as_str();

        retry::retry(&format!("upload of {}", blob_path), &policy, move || {
            let bytes = bytes.clone();
            async move {
                api.upload_blob(group, storage, blob_path, bytes, content_type)
                    .await
                    .map_err(Error::from)
            }
        })
        .await?;

        progress.inc(1);
    }

    progress.finish_and_clear();
    output::print_success(&format!("Published {} files", files.len()));

    match api.get_resource(group, &targets.storage).await {
        Ok(resource) => {
            if let Some(endpoint) = resource.endpoint {
                output::print_info(&format!("Site available at {}", endpoint));
            }
        }
        Err(e) => tracing::debug!("could not fetch site endpoint: {}", e),
    }

    Ok(())
}

/// Walk the site directory, returning `(blob path, local path)` pairs with
/// '/'-separated blob paths relative to the root.
fn collect_files(root: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("walked path is under the root");
                let blob_path = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((blob_path, path));
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Content type for an uploaded file, by extension.
fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next().unwrap_or_default() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "txt" => "text/plain",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("index.html"), "text/html");
        assert_eq!(content_type_for("assets/site.css"), "text/css");
        assert_eq!(content_type_for("app.js"), "application/javascript");
        assert_eq!(content_type_for("favicon.ico"), "image/x-icon");
        assert_eq!(content_type_for("data.bin"), "application/octet-stream");
        assert_eq!(content_type_for("no-extension"), "application/octet-stream");
    }

    #[test]
    fn collects_files_recursively_with_blob_paths() {
        let dir = std::env::temp_dir().join(format!("reelstack-test-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("index.html"), "<html></html>").unwrap();
        std::fs::write(dir.join("assets/site.css"), "body {}").unwrap();

        let files = collect_files(&dir).unwrap();
        let paths: Vec<&str> = files.iter().map(|(blob, _)| blob.as_str()).collect();
        assert_eq!(paths, vec!["assets/site.css", "index.html"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
