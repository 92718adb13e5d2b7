use super::*;

const FORMAT_SELECTOR: &str = "bestvideo+bestaudio/best";
const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Fetches every link in order. A failing link is recorded and the batch
/// moves on; nothing is retried.
pub(super) fn download_batch<F>(links: &[String], mut fetch: F) -> DownloadReport
where
    F: FnMut(&str) -> Result<String>,
{
    let mut report = DownloadReport::default();
    for link in links {
        match fetch(link) {
            Ok(filename) => report.files.push(DownloadedFile {
                link: link.clone(),
                filename,
            }),
            Err(_) => report.failed.push(link.clone()),
        }
    }
    report
}

pub(super) async fn download_links(
    state: &std::sync::Arc<AppState>,
    links: Vec<String>,
) -> Result<DownloadReport> {
    let target_dir = state.config.download_dir.clone();
    ensure_download_dir(&target_dir)?;
    let options = state.config.download.clone();
    let report = tokio::task::spawn_blocking(move || {
        download_batch(&links, |link| run_ytdlp_download(&target_dir, link, &options))
    })
    .await
    .context("yt-dlp task failed")?;
    Ok(report)
}

/// Downloads one link into `target_dir` and returns the resulting file name.
pub(super) fn run_ytdlp_download(
    target_dir: &Path,
    link: &str,
    options: &DownloadOptions,
) -> Result<String> {
    let template = target_dir.join(OUTPUT_TEMPLATE);
    let output = Command::new(&options.ytdlp_bin)
        .arg("--no-playlist")
        .arg("-f")
        .arg(FORMAT_SELECTOR)
        .arg("--merge-output-format")
        .arg(&options.merge_output_format)
        .arg("--socket-timeout")
        .arg(options.socket_timeout_secs.to_string())
        .arg("--print")
        .arg("after_move:filepath")
        .arg("-o")
        .arg(template.to_string_lossy().to_string())
        .arg(link)
        .output()
        .context("run yt-dlp")?;
    if !output.status.success() {
        return Err(anyhow!(format_ytdlp_error(&output)));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let path_line = stdout
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("yt-dlp did not return a filepath"))?;
    let mut path = PathBuf::from(path_line.trim());
    if path.is_relative() {
        path = target_dir.join(path);
    }
    if !path.exists() {
        return Err(anyhow!("yt-dlp output not found: {}", path.display()));
    }
    let filename = path
        .file_name()
        .ok_or_else(|| anyhow!("yt-dlp output has no file name: {}", path.display()))?;
    Ok(filename.to_string_lossy().to_string())
}

pub(super) fn format_ytdlp_error(output: &std::process::Output) -> String {
    let mut message = "yt-dlp failed.".to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if !stdout.is_empty() {
        message.push_str("\nstdout:\n");
        message.push_str(&stdout);
    }
    if !stderr.is_empty() {
        message.push_str("\nstderr:\n");
        message.push_str(&stderr);
    }
    message
}
