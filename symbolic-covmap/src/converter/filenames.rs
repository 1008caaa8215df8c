//! The module-wide filename table and the filenames section.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexSet;

use crate::error::PathError;
use crate::format::varint::write_uleb128_usize;

/// An absolute source path without `.` and `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// The normalized path as string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the normalized path into its owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn current_dir() -> Result<PathBuf, PathError> {
    std::env::current_dir().map_err(PathError::WorkingDir)
}

/// Normalizes `path` relative to the process working directory.
///
/// See [`normalize_in`] for details.
pub fn normalize(path: impl AsRef<Path>) -> Result<NormalizedPath, PathError> {
    let path = path.as_ref();
    if path.is_absolute() {
        normalize_in(path, Path::new(""))
    } else {
        normalize_in(path, &current_dir()?)
    }
}

/// Normalizes `path`, resolving relative paths against `working_dir`.
///
/// This is pure path arithmetic: `.` segments are dropped and `..` removes the preceding
/// segment. A `..` at the root stays at the root. Symlinks are not resolved and the filesystem
/// is never touched. A relative `working_dir` is itself resolved against the process working
/// directory, so the result is always absolute.
pub fn normalize_in(
    path: impl AsRef<Path>,
    working_dir: impl AsRef<Path>,
) -> Result<NormalizedPath, PathError> {
    let path = path.as_ref();
    let as_str = path
        .to_str()
        .ok_or_else(|| PathError::NonUtf8(path.to_owned()))?;
    if as_str.is_empty() {
        return Err(PathError::Empty);
    }
    if as_str.contains('\0') {
        return Err(PathError::NulByte(as_str.to_owned()));
    }

    let mut joined = working_dir.as_ref().join(path);
    if !joined.is_absolute() {
        joined = current_dir()?.join(joined);
    }
    let mut normalized = PathBuf::new();
    // number of `Normal` segments that a `..` may still remove
    let mut depth = 0usize;
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => normalized.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                }
            }
            Component::Normal(segment) => {
                normalized.push(segment);
                depth += 1;
            }
        }
    }

    match normalized.into_os_string().into_string() {
        Ok(normalized) => Ok(NormalizedPath(normalized)),
        Err(normalized) => Err(PathError::NonUtf8(normalized.into())),
    }
}

/// Deduplicates normalized source paths and assigns them dense indices in first-seen order.
///
/// The table is append-only: an index, once assigned, always refers to the same path.
#[derive(Clone, Debug, Default)]
pub struct FilenameTable {
    working_dir: Option<PathBuf>,
    filenames: IndexSet<String>,
}

impl FilenameTable {
    /// Creates a table that resolves relative paths against the process working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table that resolves relative paths against `working_dir`.
    ///
    /// A relative `working_dir` is resolved against the process working directory whenever a
    /// path is normalized.
    pub fn with_working_dir(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(working_dir.into()),
            filenames: IndexSet::new(),
        }
    }

    /// Normalizes a path with this table's working directory, without interning it.
    pub fn normalize(&self, path: impl AsRef<Path>) -> Result<NormalizedPath, PathError> {
        match self.working_dir {
            Some(ref working_dir) => normalize_in(path, working_dir),
            None => normalize(path),
        }
    }

    /// Normalizes and interns a path, returning its index.
    ///
    /// If the normalized path was already present, it is not added again.
    pub fn intern(&mut self, path: impl AsRef<Path>) -> Result<u32, PathError> {
        let normalized = self.normalize(path)?;
        Ok(self.intern_normalized(normalized))
    }

    /// Interns an already normalized path, returning its index.
    pub fn intern_normalized(&mut self, path: NormalizedPath) -> u32 {
        if let Some(existing_idx) = self.filenames.get_index_of(path.as_str()) {
            return existing_idx as u32;
        }
        let (idx, _) = self.filenames.insert_full(path.into_string());
        log::trace!("interned filename {} as {}", self.filenames[idx], idx);
        idx as u32
    }

    /// Returns the path with the given index.
    pub fn get(&self, index: u32) -> Option<&str> {
        self.filenames.get_index(index as usize).map(String::as_str)
    }

    /// Returns the index of an already interned normalized path.
    pub fn index_of(&self, path: &str) -> Option<u32> {
        self.filenames.get_index_of(path).map(|idx| idx as u32)
    }

    /// Number of interned paths.
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    /// Whether no path has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// An iterator over all paths in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.filenames.iter().map(String::as_str)
    }

    /// Encodes the table as filenames section, see [`write_filenames_section`].
    pub fn to_section_bytes(&self) -> Vec<u8> {
        let filenames: Vec<&str> = self.iter().collect();
        write_filenames_section(&filenames)
    }
}

/// Encodes the module-wide filenames section.
///
/// The section is a varint count followed by every filename as varint length and raw UTF-8
/// bytes, in the given order.
pub fn write_filenames_section<S: AsRef<str>>(filenames: &[S]) -> Vec<u8> {
    let mut out = Vec::new();
    write_uleb128_usize(&mut out, filenames.len());
    for filename in filenames {
        let filename = filename.as_ref();
        write_uleb128_usize(&mut out, filename.len());
        out.extend_from_slice(filename.as_bytes());
    }
    out
}

/// A [`FilenameTable`] shared between threads.
///
/// Cloning the handle shares the same table. Calls to [`intern`](Self::intern) are serialized by
/// a mutex, so all threads observe a single consistent index assignment.
#[derive(Clone, Debug, Default)]
pub struct SharedFilenameTable {
    inner: Arc<Mutex<FilenameTable>>,
}

impl SharedFilenameTable {
    /// Wraps a table for sharing.
    pub fn new(table: FilenameTable) -> Self {
        Self {
            inner: Arc::new(Mutex::new(table)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FilenameTable> {
        // Every insert into the table is a single step, so a panicking holder cannot leave it
        // half-updated.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Normalizes and interns a path, see [`FilenameTable::intern`].
    pub fn intern(&self, path: impl AsRef<Path>) -> Result<u32, PathError> {
        let mut table = self.lock();
        table.intern(path)
    }

    /// Runs `f` with exclusive access to the table.
    pub fn with<R>(&self, f: impl FnOnce(&mut FilenameTable) -> R) -> R {
        let mut table = self.lock();
        f(&mut table)
    }

    /// Number of interned paths.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no path has been interned yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Encodes the current table contents as filenames section.
    pub fn to_section_bytes(&self) -> Vec<u8> {
        self.lock().to_section_bytes()
    }

    /// Returns a copy of the current table.
    pub fn snapshot(&self) -> FilenameTable {
        self.lock().clone()
    }
}

impl From<FilenameTable> for SharedFilenameTable {
    fn from(table: FilenameTable) -> Self {
        Self::new(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(path: &str) -> String {
        normalize_in(path, "/work").unwrap().into_string()
    }

    #[test]
    fn normalizes_dot_segments() {
        assert_eq!(normalized("a.rs"), "/work/a.rs");
        assert_eq!(normalized("./b/../b.rs"), "/work/b.rs");
        assert_eq!(normalized("src/./lib/../main.rs"), "/work/src/main.rs");
        assert_eq!(normalized("/abs/path.rs"), "/abs/path.rs");
        assert_eq!(normalized("../../../../up.rs"), "/up.rs");
        assert_eq!(normalized("/a/b/.."), "/a");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(matches!(normalize_in("", "/work"), Err(PathError::Empty)));
        assert!(matches!(
            normalize_in("a\0.rs", "/work"),
            Err(PathError::NulByte(_))
        ));
    }

    #[test]
    fn relative_to_process_working_dir() {
        let expected = std::env::current_dir().unwrap().join("lib.rs");
        let path = normalize("lib.rs").unwrap();
        assert_eq!(Path::new(path.as_str()), expected);
    }

    #[test]
    fn relative_working_dir() {
        let cwd = std::env::current_dir().unwrap();
        let expected = cwd.parent().unwrap_or(&cwd).join("x.rs");

        let mut table = FilenameTable::with_working_dir("rel");
        let idx = table.intern("../../x.rs").unwrap();
        let interned = table.get(idx).unwrap();
        assert!(Path::new(interned).is_absolute());
        assert!(!interned.contains(".."));
        assert_eq!(Path::new(interned), expected);
    }

    #[test]
    fn interning() {
        let mut table = FilenameTable::with_working_dir("/work");
        assert_eq!(table.intern("a.rs").unwrap(), 0);
        assert_eq!(table.intern("./b/../b.rs").unwrap(), 1);
        assert_eq!(table.intern("/work/a.rs").unwrap(), 0);
        assert_eq!(table.intern("b.rs").unwrap(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1), Some("/work/b.rs"));
        assert_eq!(table.get(2), None);
        assert_eq!(table.index_of("/work/a.rs"), Some(0));
    }

    #[test]
    fn failed_intern_leaves_table_untouched() {
        let mut table = FilenameTable::with_working_dir("/work");
        table.intern("a.rs").unwrap();
        assert!(table.intern("b\0.rs").is_err());
        assert_eq!(table.iter().collect::<Vec<_>>(), ["/work/a.rs"]);
    }

    #[test]
    fn section_bytes() {
        let bytes = write_filenames_section(&["/a.rs", "/bc.rs"]);
        let mut expected = vec![2, 5];
        expected.extend_from_slice(b"/a.rs");
        expected.push(6);
        expected.extend_from_slice(b"/bc.rs");
        assert_eq!(bytes, expected);

        assert_eq!(write_filenames_section::<&str>(&[]), [0]);
    }

    #[test]
    fn shared_table_across_threads() {
        let shared = SharedFilenameTable::new(FilenameTable::with_working_dir("/work"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    (0..16)
                        .map(|i| shared.intern(format!("file{}.rs", i)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let results: Vec<Vec<u32>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for result in &results[1..] {
            assert_eq!(result, &results[0]);
        }
        assert_eq!(shared.len(), 16);

        let snapshot = shared.snapshot();
        for (i, idx) in results[0].iter().enumerate() {
            assert_eq!(snapshot.get(*idx), Some(format!("/work/file{}.rs", i).as_str()));
        }
    }
}
