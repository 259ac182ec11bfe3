use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Extension of every persisted artifact, without the dot.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_code(code: &str) -> String {
    code.chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect()
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// `{dest_dir}/{sanitize(code)}.pdf`
pub fn output_path(dest_dir: &Path, code: &str) -> PathBuf {
    dest_dir.join(format!("{}.{ARTIFACT_EXTENSION}", sanitize_code(code)))
}

/// `{parent(dest_dir)}/{basename(dest_dir)}.zip`
pub fn archive_path_for(dest_dir: &Path) -> PathBuf {
    let base = dest_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifacts".to_string());
    let parent = dest_dir.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!("{base}.zip"))
}

/// First 8 hex chars of the SHA-256 of `input`.
pub fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

/// Assigns output paths for one run.
///
/// Distinct codes that sanitize to the same token would otherwise overwrite
/// each other; the later one gets a `--{short_hash(code)}` suffix. Repeats of
/// the exact same code keep sharing a path.
#[derive(Debug)]
pub struct PathPlanner {
    dest_dir: PathBuf,
    claimed: HashMap<String, String>,
}

impl PathPlanner {
    pub fn new(dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            dest_dir: dest_dir.into(),
            claimed: HashMap::new(),
        }
    }

    pub fn plan(&mut self, code: &str) -> PathBuf {
        let sanitized = sanitize_code(code);
        match self.claimed.get(&sanitized) {
            None => {
                self.claimed.insert(sanitized.clone(), code.to_string());
                output_path(&self.dest_dir, code)
            }
            Some(owner) if owner == code => output_path(&self.dest_dir, code),
            Some(_) => {
                let name = format!("{sanitized}--{}", short_hash(code));
                self.claimed.insert(name.clone(), code.to_string());
                self.dest_dir.join(format!("{name}.{ARTIFACT_EXTENSION}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_stable_hex() {
        let h = short_hash("abc");
        assert_eq!(h, "ba7816bf");
        assert_eq!(h, short_hash("abc"));
    }

    #[test]
    fn archive_path_sits_next_to_dest_dir() {
        let zip = archive_path_for(Path::new("output/pdfs"));
        assert_eq!(zip, PathBuf::from("output/pdfs.zip"));
    }
}
