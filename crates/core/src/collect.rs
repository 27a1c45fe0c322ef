use crate::error::CollectError;
use crate::models::RawCorpus;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];

pub fn discover_text_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_text = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                TEXT_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            });

        if is_text {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug)]
pub struct CollectionReport {
    pub corpus: RawCorpus,
    pub skipped_files: Vec<SkippedFile>,
}

/// Reads every text file under `folder` as one corpus fragment, in path
/// order. Files that cannot be read as UTF-8 are reported, not fatal.
pub fn collect_corpus_best_effort(folder: &Path) -> Result<CollectionReport, CollectError> {
    let files = discover_text_files(folder);

    if files.is_empty() {
        return Err(CollectError::NoInput(format!(
            "no text files found in {}",
            folder.display()
        )));
    }

    let mut fragments = Vec::new();
    let mut skipped_files = Vec::new();

    for path in files {
        match fs::read_to_string(&path) {
            Ok(text) => fragments.push(text),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                skipped_files.push(SkippedFile {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    Ok(CollectionReport {
        corpus: RawCorpus::from_fragments(fragments),
        skipped_files,
    })
}

pub fn read_corpus<R: Read>(mut reader: R) -> Result<RawCorpus, CollectError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(RawCorpus::from(text))
}
