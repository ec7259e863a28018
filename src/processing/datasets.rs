/*! Dataset naming and discovery

Datasets are identified by keys of the form `<importer>_<name>`, e.g. `opus_CCAligned/v1`.
Keys are escaped into file names before datasets get written to disk as
`<file safe key>.<lang>.zst`.
!*/
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::Error;
use crate::progress::format_bytes;

/// Escaped names longer than this are truncated, then suffixed with a hash.
pub const DATASET_NAME_MAX_LENGTH: usize = 50;

/// Structured dataset key.
///
/// ```
/// use mtcorpus::processing::datasets::Dataset;
///
/// let dataset = Dataset::new("opus_CCAligned/v1").unwrap();
/// assert_eq!(dataset.importer(), "opus");
/// assert_eq!(dataset.name(), "CCAligned/v1");
/// assert_eq!(dataset.file_safe_key(), "opus_CCAligned_v1");
/// assert_eq!(dataset.file_safe_name(), "CCAligned_v1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    key: String,
    importer: String,
    name: String,
}

impl Dataset {
    pub fn new(key: &str) -> Result<Self, Error> {
        let (importer, name) = key.split_once('_').unwrap_or((key, ""));
        if importer.is_empty() {
            return Err(Error::config(format!(
                "could not find the importer in the dataset key {:?}",
                key
            )));
        }
        if name.is_empty() {
            return Err(Error::config(format!(
                "could not find the name in the dataset key {:?}",
                key
            )));
        }
        Ok(Self {
            key: key.to_string(),
            importer: importer.to_string(),
            name: name.to_string(),
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn importer(&self) -> &str {
        &self.importer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_safe_key(&self) -> String {
        escape(&self.key)
    }

    pub fn file_safe_name(&self) -> String {
        escape(&self.name)
    }
}

/// First 6 hex digits of the SHA-256 of `s`.
fn short_hash(s: &str) -> String {
    let mut hash = format!("{:x}", Sha256::digest(s.as_bytes()));
    hash.truncate(6);
    hash
}

/// Shortens URLs into `<host>_<file stem>_<hash>`.
fn shorten_url(dataset: &str, url: &Url) -> String {
    let hostname = match url.host_str() {
        Some("storage.googleapis.com") => "gcp",
        Some(host) => host,
        None => "",
    };
    let file = Path::new(url.path())
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
        .replace(".[LANG]", "")
        .replace("[LANG]", "");
    format!("{}_{}_{}", hostname, file, short_hash(dataset))
}

/// Makes a dataset key usable as a file name.
pub fn escape(dataset: &str) -> String {
    let shortened = if dataset.starts_with("https://") || dataset.starts_with("http://") {
        match Url::parse(dataset) {
            Ok(url) => shorten_url(dataset, &url),
            Err(_) => dataset.to_string(),
        }
    } else if dataset.chars().count() > DATASET_NAME_MAX_LENGTH {
        let truncated: String = dataset.chars().take(DATASET_NAME_MAX_LENGTH).collect();
        format!("{}_{}", truncated, short_hash(dataset))
    } else {
        dataset.to_string()
    };

    shortened
        .replace("://", "_")
        .replace(['/', '.', ':', '[', ']'], "_")
}

/// Name of a dataset file without its language and compression suffixes:
/// `ada83_v1.en.zst` is `ada83_v1`.
pub fn dataset_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut parts = name.rsplitn(3, '.');
    let (_compression, _lang) = (parts.next(), parts.next());
    match parts.next() {
        Some(stem) => stem.to_string(),
        None => name,
    }
}

fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let mut paths = glob::glob(pattern)?.collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}

fn file_size(path: &Path) -> Result<u64, Error> {
    Ok(fs::metadata(path)?.len())
}

/// Source/target dataset files, paired by name.
#[derive(Debug, Clone, Default)]
pub struct ParallelDatasets {
    pub pairs: Vec<(PathBuf, PathBuf)>,
    /// On-disk size of every file.
    pub total_bytes: u64,
}

/// Finds the `<name>.<src>.zst`/`<name>.<trg>.zst` files matching `pattern` and pairs them by name.
pub fn find_parallel_datasets(src: &str, trg: &str, pattern: &str) -> Result<ParallelDatasets, Error> {
    let src_suffix = format!(".{}.zst", src);
    let trg_suffix = format!(".{}.zst", trg);

    let mut src_paths = Vec::new();
    let mut trg_paths = Vec::new();
    let mut total_bytes = 0;

    for path in expand_glob(pattern)? {
        let name = path.to_string_lossy().into_owned();
        let size = file_size(&path)?;
        info!(" - {} {:?}", format_bytes(size), path);
        total_bytes += size;

        if name.ends_with(&src_suffix) {
            src_paths.push(path);
        } else if name.ends_with(&trg_suffix) {
            trg_paths.push(path);
        } else {
            return Err(Error::config(format!(
                "dataset {:?} does not match the language pair {}-{}",
                path, src, trg
            )));
        }
    }

    if src_paths.len() != trg_paths.len() {
        return Err(Error::config(format!(
            "found {} {} datasets and {} {} datasets",
            src_paths.len(),
            src,
            trg_paths.len(),
            trg
        )));
    }

    // sorting full names does not sort stems: `a.en.zst` < `a.f.en.zst` but `a.f.ru.zst` < `a.ru.zst`
    let mut trg_by_stem: BTreeMap<String, PathBuf> = trg_paths
        .into_iter()
        .map(|path| (dataset_stem(&path), path))
        .collect();
    let src_by_stem: BTreeMap<String, PathBuf> = src_paths
        .into_iter()
        .map(|path| (dataset_stem(&path), path))
        .collect();

    let mut pairs = Vec::with_capacity(src_by_stem.len());
    for (stem, src_path) in src_by_stem {
        match trg_by_stem.remove(&stem) {
            Some(trg_path) => pairs.push((src_path, trg_path)),
            None => {
                return Err(Error::config(format!(
                    "no matching {} dataset for {:?}",
                    trg, src_path
                )))
            }
        }
    }
    if let Some(trg_path) = trg_by_stem.values().next() {
        return Err(Error::config(format!(
            "no matching {} dataset for {:?}",
            src, trg_path
        )));
    }

    if pairs.is_empty() {
        return Err(Error::config(format!("no dataset matches {:?}", pattern)));
    }
    info!(
        "{} parallel datasets, {}",
        pairs.len(),
        format_bytes(total_bytes)
    );

    Ok(ParallelDatasets { pairs, total_bytes })
}

/// Finds the datasets matching `pattern` and returns them with their total on-disk size.
pub fn find_mono_datasets(pattern: &str) -> Result<(Vec<PathBuf>, u64), Error> {
    let paths = expand_glob(pattern)?;
    if paths.is_empty() {
        return Err(Error::config(format!("no dataset matches {:?}", pattern)));
    }
    let mut total_bytes = 0;
    for path in &paths {
        let size = file_size(path)?;
        info!(" - {} {:?}", format_bytes(size), path);
        total_bytes += size;
    }
    Ok((paths, total_bytes))
}
