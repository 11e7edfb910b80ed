//! Writes scraped records as one JSON object keyed by title, or as one JSON
//! file per record.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crawl::characters::CHARACTERS;
use crawl::utils::sanitize_file_stem;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;
use tokio::fs;
use tracing::info;
use url::Url;

use crate::model::Initiative;

/// Subdirectory, next to the outfile, that receives one file per record.
pub const SPLIT_DIR: &str = "iniciativas";
pub const SPLIT_SUFFIX: &str = ".json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("initiative {id} has no document url to name its file after")]
    MissingDocumentUrl { id: u32 },

    #[error("initiatives {first} and {second} would both be written to {name}")]
    DuplicateFileName { name: String, first: u32, second: u32 },

    #[error("{0} output is not implemented")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    #[default]
    Json,
    /// Accepted on the command line but not implemented.
    Csv,
}

impl Format {
    pub fn default_outfile(self) -> &'static str {
        match self {
            Format::Json => "iniciativas.json",
            Format::Csv => "iniciativas.csv",
        }
    }
}

/// Serializes `value` with every object key sorted and `indent` spaces per level.
pub fn to_json<T: Serialize>(value: &T, indent: usize) -> Result<String, OutputError> {
    // Going through `Value` sorts struct fields as well as map keys.
    let value = serde_json::to_value(value)?;

    let indent = " ".repeat(indent);
    let mut buf = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
    value.serialize(&mut serializer)?;

    let json = String::from_utf8_lossy(&buf).replace(CHARACTERS::CARRIAGE_RETURN, "");
    Ok(json)
}

pub async fn write_aggregate(
    path: &Path,
    records: &BTreeMap<String, Initiative>,
    indent: usize,
) -> Result<(), OutputError> {
    info!(path = %path.display(), records = records.len(), "saving aggregate");
    let json = to_json(records, indent)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, json).await?;
    Ok(())
}

/// File name for a record in split mode, derived from its document url.
pub fn split_file_name(record: &Initiative) -> Result<String, OutputError> {
    let doc_url = record
        .doc_url
        .as_deref()
        .ok_or(OutputError::MissingDocumentUrl { id: record.id })?;

    let fragment = document_fragment(doc_url);
    let stem = fragment
        .rsplit_once('.')
        .map(|(stem, _ext)| stem)
        .filter(|stem| !stem.is_empty())
        .unwrap_or(&fragment);

    Ok(format!("{}{SPLIT_SUFFIX}", sanitize_file_stem(stem)))
}

/// The `fich` query parameter when present, otherwise the last path segment.
fn document_fragment(doc_url: &str) -> String {
    // Relative links are resolved against a dummy base; only path and query matter.
    let base = Url::parse("http://localhost/").ok();
    let parsed = Url::options().base_url(base.as_ref()).parse(doc_url);

    match parsed {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key.eq_ignore_ascii_case("fich"))
            .map(|(_, value)| value.into_owned())
            .or_else(|| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| doc_url.to_string()),
        Err(_) => doc_url.to_string(),
    }
}

/// Writes every record to `<dir>/iniciativas/<fragment>.json`.
///
/// Every record must have a document url and a file name of its own; the
/// names are all resolved before anything is written.
pub async fn write_split<'a>(
    dir: &Path,
    records: impl IntoIterator<Item = &'a Initiative>,
    indent: usize,
) -> Result<Vec<PathBuf>, OutputError> {
    let out_dir = dir.join(SPLIT_DIR);
    let mut claimed: HashMap<String, u32> = HashMap::new();
    let mut named = Vec::new();
    for record in records {
        let name = split_file_name(record)?;
        if let Some(&first) = claimed.get(&name) {
            return Err(OutputError::DuplicateFileName {
                name,
                first,
                second: record.id,
            });
        }
        claimed.insert(name.clone(), record.id);
        named.push((out_dir.join(name), record));
    }

    fs::create_dir_all(&out_dir).await?;
    let mut written = Vec::with_capacity(named.len());
    for (path, record) in named {
        fs::write(&path, to_json(record, indent)?).await?;
        written.push(path);
    }

    info!(dir = %out_dir.display(), files = written.len(), "saved split output");
    Ok(written)
}
