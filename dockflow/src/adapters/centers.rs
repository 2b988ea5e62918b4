//! Docking box-center index handling.
//!
//! Pocket prediction writes one `center_<key>.txt` per receptor (workers own
//! disjoint files, so no locking); the coordinator merges them into the
//! stage's `docking-center.txt` before the docking join. Prebuilt receptor
//! sets ship a ready-made index whose entry names may carry pocket prefixes,
//! so lookup falls back to substring matching the way the source pipeline
//! matched receptors to center lines.

use crate::errors::DockflowError;
use std::fs;
use std::path::Path;
use tracing::warn;

/// A docking search-box center in Angstroms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCenter {
    /// Center X.
    pub x: f64,
    /// Center Y.
    pub y: f64,
    /// Center Z.
    pub z: f64,
}

/// Parses a center index: one `name,x,y,z` line per entry.
///
/// Malformed lines are skipped with a warning; the docking stage will fail
/// per-receptor when a center is missing, which keeps one bad line from
/// sinking the batch.
pub fn parse_center_file(path: &Path) -> Result<Vec<(String, BoxCenter)>, DockflowError> {
    let text = fs::read_to_string(path)?;
    let mut centers = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let parsed = (parts.len() == 4)
            .then(|| {
                let x = parts[1].parse::<f64>().ok()?;
                let y = parts[2].parse::<f64>().ok()?;
                let z = parts[3].parse::<f64>().ok()?;
                Some((parts[0].to_string(), BoxCenter { x, y, z }))
            })
            .flatten();
        match parsed {
            Some(entry) => centers.push(entry),
            None => warn!(line_no = idx + 1, content = %line, "skipping malformed center line"),
        }
    }
    Ok(centers)
}

/// Finds the center for a receptor key: exact name match first, then the
/// first entry whose name contains the key (pocket-prefixed names in
/// prebuilt sets).
#[must_use]
pub fn lookup_center<'a>(centers: &'a [(String, BoxCenter)], key: &str) -> Option<&'a BoxCenter> {
    centers
        .iter()
        .find(|(name, _)| name == key)
        .or_else(|| centers.iter().find(|(name, _)| name.contains(key)))
        .map(|(_, center)| center)
}

/// Merges every `center_*.txt` in `pocket_dir` into `out_path`, sorted by
/// file name for a deterministic index.
pub fn merge_center_files(pocket_dir: &Path, out_path: &Path) -> std::io::Result<()> {
    let mut fragments: Vec<_> = fs::read_dir(pocket_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy())
                .is_some_and(|name| name.starts_with("center_") && name.ends_with(".txt"))
        })
        .collect();
    fragments.sort();

    let mut merged = String::new();
    for fragment in fragments {
        merged.push_str(fs::read_to_string(&fragment)?.trim_end());
        merged.push('\n');
    }
    fs::write(out_path, merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_center_file_skips_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docking-center.txt");
        fs::write(&path, "1abc,10.0,11.5,-3.25\nnot-a-line\n2xyz,0.1,0.2,0.3\n").unwrap();

        let centers = parse_center_file(&path).unwrap();
        assert_eq!(centers.len(), 2);
        assert_eq!(centers[0].0, "1abc");
        assert_eq!(centers[0].1, BoxCenter { x: 10.0, y: 11.5, z: -3.25 });
    }

    #[test]
    fn test_lookup_center_exact_then_substring() {
        let centers = vec![
            ("pocket_9.11_out-1abc".to_string(), BoxCenter { x: 1.0, y: 2.0, z: 3.0 }),
            ("2xyz".to_string(), BoxCenter { x: 4.0, y: 5.0, z: 6.0 }),
        ];
        assert_eq!(lookup_center(&centers, "2xyz").unwrap().x, 4.0);
        assert_eq!(lookup_center(&centers, "1abc").unwrap().x, 1.0);
        assert!(lookup_center(&centers, "9zzz").is_none());
    }

    #[test]
    fn test_merge_center_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("center_b.txt"), "b,4.0,5.0,6.0\n").unwrap();
        fs::write(dir.path().join("center_a.txt"), "a,1.0,2.0,3.0").unwrap();
        fs::write(dir.path().join("pocket_1.2_a.pdb"), "ATOM").unwrap();

        let out = dir.path().join("docking-center.txt");
        merge_center_files(dir.path(), &out).unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), "a,1.0,2.0,3.0\nb,4.0,5.0,6.0\n");
    }
}
