//! File helpers for document uploads.

use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Calculate SHA-256 checksum of content.
pub fn calculate_checksum(content: &str) -> String {
    let hash = Sha256::digest(content.as_bytes());
    hex::encode(hash)
}

/// Check if a file is likely a text file.
pub fn is_text_file(path: &Path) -> bool {
    // Check by extension
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    // Check by reading first bytes
    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            return !looks_binary(&buffer[..n]);
        }
    }

    false
}

/// Null bytes near the start of the content mark it as binary.
pub fn looks_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(8192)].contains(&0)
}

/// Read raw file bytes, refusing files larger than `max_size`.
pub fn read_file_bytes(path: &Path, max_size: u64) -> std::io::Result<Vec<u8>> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read(path)
}

/// Whether a file can be uploaded: any text file, or a PDF.
pub fn is_document_file(path: &Path) -> bool {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    is_pdf || is_text_file(path)
}

/// Collect the files under `path`, or `path` itself when it is a file.
///
/// Directory entries are filtered with [`is_document_file`] and sorted.
pub fn collect_files(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("path does not exist: {}", path.display()),
        ));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_document_file(p))
        .collect();
    files.sort();
    Ok(files)
}

/// Check if extension indicates a binary file.
pub fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe"
            | "dll"
            | "so"
            | "dylib"
            | "a"
            | "o"
            | "obj"
            | "png"
            | "jpg"
            | "jpeg"
            | "gif"
            | "bmp"
            | "ico"
            | "webp"
            | "svg"
            | "mp3"
            | "mp4"
            | "avi"
            | "mkv"
            | "mov"
            | "wav"
            | "flac"
            | "zip"
            | "tar"
            | "gz"
            | "bz2"
            | "xz"
            | "7z"
            | "rar"
            | "pdf"
            | "doc"
            | "docx"
            | "xls"
            | "xlsx"
            | "ppt"
            | "pptx"
            | "woff"
            | "woff2"
            | "ttf"
            | "otf"
            | "eot"
            | "class"
            | "jar"
            | "pyc"
            | "pyo"
            | "db"
            | "sqlite"
            | "sqlite3"
            | "bin"
            | "dat"
            | "pak"
    )
}

/// Check if extension indicates a text file.
fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        // Source code
        "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "go" | "java" | "kt" | "kts"
            | "c" | "h" | "cpp" | "hpp" | "cc" | "cxx" | "hh"
            | "rb" | "php" | "swift" | "scala" | "clj" | "cljs" | "erl" | "ex" | "exs"
            | "hs" | "ml" | "fs" | "fsi" | "fsx"
            | "sh" | "bash" | "zsh" | "fish" | "ps1" | "bat" | "cmd"
            | "lua" | "pl" | "pm" | "r" | "R" | "jl"
            // Web
            | "html" | "htm" | "css" | "scss" | "sass" | "less"
            | "vue" | "svelte" | "astro"
            // Data/Config
            | "json" | "yaml" | "yml" | "toml" | "xml" | "ini" | "cfg"
            | "env" | "properties" | "conf"
            // Documentation
            | "md" | "markdown" | "rst" | "txt" | "adoc" | "org"
            // Other
            | "sql" | "graphql" | "gql" | "prisma"
            | "dockerfile" | "makefile" | "justfile"
            | "gitignore" | "gitattributes" | "editorconfig"
    )
}
