//! Interactive startup prompts.

use std::path::{Path, PathBuf};

use super::display::{show_error, show_text, DisplaySink};
use super::input::InputSource;
use super::runner::resolve_keyword_path;
use crate::api::youtube::VideoId;
use crate::engine::KeywordSet;
use crate::io::keyword_file::{list_files, load_keyword_file};

/// Show `question` and read one trimmed answer.
pub async fn prompt(
    input: &mut dyn InputSource,
    sink: &dyn DisplaySink,
    question: &str,
) -> Option<String> {
    show_text(sink, question);
    input.next_line().await.map(|line| line.trim().to_string())
}

/// Load the keyword file named by `initial`, or keep asking until one loads.
///
/// Returns `None` if the input closes first.
pub async fn choose_keywords(
    input: &mut dyn InputSource,
    sink: &dyn DisplaySink,
    keyword_dir: &Path,
    mut initial: Option<String>,
) -> Option<(PathBuf, KeywordSet)> {
    loop {
        let name = match initial.take() {
            Some(name) => name,
            None => {
                if let Ok(entries) = list_files(keyword_dir) {
                    show_text(sink, &format!("Keyword files in {}:", keyword_dir.display()));
                    for entry in entries.iter().filter(|e| !e.is_settings) {
                        show_text(sink, &format!("  {}", entry.name));
                    }
                }
                prompt(input, sink, "Keyword file to load:").await?
            }
        };
        if name.is_empty() {
            continue;
        }

        let path = resolve_keyword_path(keyword_dir, &name);
        match load_keyword_file(&path) {
            Ok(keywords) => {
                for keyword in keywords.iter() {
                    show_text(sink, &format!("  {}", keyword));
                }
                return Some((path, keywords));
            }
            Err(e) => show_error(sink, &format!("Failed to load {}: {}", path.display(), e)),
        }
    }
}

/// Parse the video given by `initial`, or keep asking until one parses.
pub async fn choose_video(
    input: &mut dyn InputSource,
    sink: &dyn DisplaySink,
    mut initial: Option<String>,
) -> Option<VideoId> {
    loop {
        let answer = match initial.take() {
            Some(answer) => answer,
            None => prompt(input, sink, "Video id or URL:").await?,
        };
        match VideoId::parse(&answer) {
            Some(video_id) => return Some(video_id),
            None => show_error(sink, "Please enter a video id or URL"),
        }
    }
}
