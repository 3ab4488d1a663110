use crate::error::Result;
use crate::index::InvertedIndex;
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    pub doc_count: u64,
    pub term_count: usize,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn for_index(index: &InvertedIndex) -> Self {
        Self {
            doc_count: index.doc_count,
            term_count: index.term_count(),
            created_at: OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default(),
            version: FORMAT_VERSION,
        }
    }
}

/// Layout of an index directory: the artifact plus a small metadata file.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn index(&self) -> PathBuf { self.root.join("index.json") }
    pub fn meta(&self) -> PathBuf { self.root.join("meta.json") }
    pub fn exists(&self) -> bool { self.index().is_file() }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`, so readers
/// only ever see the old or the new content.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut f = File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    drop(f);
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn write_index_file(path: &Path, index: &InvertedIndex) -> Result<()> {
    write_atomic(path, &index.serialize()?)
}

pub fn read_index_file(path: &Path) -> Result<InvertedIndex> {
    let bytes = fs::read(path)?;
    InvertedIndex::deserialize(&bytes)
}

/// Persist the index and its metadata. The artifact goes first so a crash
/// never leaves metadata describing an index that isn't there.
pub fn save_index(paths: &IndexPaths, index: &InvertedIndex) -> Result<MetaFile> {
    create_dir_all(&paths.root)?;
    write_index_file(&paths.index(), index)?;
    let meta = MetaFile::for_index(index);
    save_meta(paths, &meta)?;
    Ok(meta)
}

pub fn load_index(paths: &IndexPaths) -> Result<InvertedIndex> {
    read_index_file(&paths.index())
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let buf = fs::read_to_string(paths.meta())?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}
