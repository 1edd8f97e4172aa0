//! Tile manifests: CSV files listing pre-generated tiles and their extents.
//!
//! A manifest has a header row naming its columns. Column order is free
//! and extra columns are ignored, but `image_path`, `south`, `west`,
//! `north` and `east` must all be present. Rows whose bounds are blank
//! or invalid cannot take part in overlap search and are skipped with a
//! warning.

use std::path::{Path, PathBuf};

use vani_coverage::{GeoBounds, TileRecord};

use crate::error::IoError;

/// Manifest files read from a manifest directory, in this order.
pub const MANIFEST_FILES: [&str; 3] = ["tiles.csv", "train.csv", "val.csv"];

/// Columns every manifest must have.
pub const REQUIRED_COLUMNS: [&str; 5] = ["image_path", "south", "west", "north", "east"];

/// Read every manifest in `dir` and concatenate their records.
///
/// Files are read in [`MANIFEST_FILES`] order; missing files are
/// skipped.
///
/// # Errors
///
/// Returns [`IoError::NoManifests`] if none of the files exist. Errors
/// from [`read_manifest`] are propagated.
pub fn read_manifest_dir(dir: &Path) -> Result<Vec<TileRecord>, IoError> {
    let paths: Vec<PathBuf> = MANIFEST_FILES
        .iter()
        .map(|name| dir.join(name))
        .filter(|path| path.is_file())
        .collect();
    if paths.is_empty() {
        return Err(IoError::NoManifests(dir.to_path_buf()));
    }

    let mut records = Vec::new();
    for path in &paths {
        records.extend(read_manifest(path)?);
    }
    tracing::debug!(
        dir = %dir.display(),
        manifests = paths.len(),
        tiles = records.len(),
        "loaded tile catalog"
    );
    Ok(records)
}

/// Read one manifest file.
///
/// # Errors
///
/// Returns [`IoError::Read`] if the file cannot be read. Errors from
/// [`parse_manifest`] are propagated.
pub fn read_manifest(path: &Path) -> Result<Vec<TileRecord>, IoError> {
    let content = std::fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content, path)
}

/// Parse manifest text. `path` is used only in errors and log events.
///
/// # Errors
///
/// Returns [`IoError::ManifestMissingColumns`] if the header lacks any
/// of [`REQUIRED_COLUMNS`].
pub fn parse_manifest(content: &str, path: &Path) -> Result<Vec<TileRecord>, IoError> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let header = lines
        .next()
        .map(|(_, line)| split_record(line))
        .unwrap_or_default();
    let column = |name: &str| header.iter().position(|h| h.trim() == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| column(name).is_none())
        .map(|name| (*name).to_owned())
        .collect();
    let [Some(image_path), Some(south), Some(west), Some(north), Some(east)] =
        REQUIRED_COLUMNS.map(column)
    else {
        return Err(IoError::ManifestMissingColumns {
            path: path.to_path_buf(),
            missing,
        });
    };

    let mut records = Vec::new();
    let mut skipped = 0_usize;
    for (index, line) in lines {
        let fields = split_record(line);
        let cell = |i: usize| fields.get(i).map_or("", |f| f.trim());

        let reference = cell(image_path);
        if reference.is_empty() {
            tracing::warn!(path = %path.display(), line = index + 1, "skipping row without image_path");
            skipped += 1;
            continue;
        }

        let bounds = parse_bounds([cell(south), cell(west), cell(north), cell(east)]);
        match bounds {
            Ok(bounds) => records.push(TileRecord::new(bounds, reference)),
            Err(reason) => {
                tracing::warn!(
                    path = %path.display(),
                    line = index + 1,
                    %reason,
                    "skipping row with unusable bounds"
                );
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        tracing::warn!(path = %path.display(), skipped, kept = records.len(), "manifest rows skipped");
    }
    Ok(records)
}

fn parse_bounds(cells: [&str; 4]) -> Result<GeoBounds, String> {
    let mut values = [0.0_f64; 4];
    for (value, cell) in values.iter_mut().zip(cells) {
        if cell.is_empty() {
            return Err("blank bound".to_owned());
        }
        *value = cell
            .parse()
            .map_err(|_| format!("bound {cell:?} is not a number"))?;
    }
    GeoBounds::try_from(values).map_err(|e| e.to_string())
}

/// Split one CSV record on commas, honouring double-quoted fields with
/// `""` escapes.
fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Result<Vec<TileRecord>, IoError> {
        parse_manifest(content, Path::new("tiles.csv"))
    }

    #[test]
    fn header_order_is_free() {
        let records = parse(
            "east,north,split,image_path,west,south\n\
             86.0,21.0,train,tiles/a.png,85.0,20.0\n",
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].data_reference, "tiles/a.png");
        assert_eq!(records[0].bounds.to_array(), [20.0, 85.0, 21.0, 86.0]);
    }

    #[test]
    fn missing_columns_are_listed() {
        let err = parse("image_path,south,west\nx.png,1,2\n").unwrap_err();
        assert!(
            matches!(
                err,
                IoError::ManifestMissingColumns { ref missing, .. }
                    if *missing == vec!["north".to_owned(), "east".to_owned()]
            ),
            "{err}"
        );
    }

    #[test]
    fn empty_file_misses_every_column() {
        let err = parse("").unwrap_err();
        assert!(
            matches!(err, IoError::ManifestMissingColumns { ref missing, .. } if missing.len() == 5),
            "{err}"
        );
    }

    #[test]
    fn unusable_rows_are_skipped() {
        let records = parse(
            "image_path,south,west,north,east\n\
             a.png,0,0,1,1\n\
             b.png,,,,\n\
             c.png,0,0,abc,1\n\
             d.png,2,0,1,1\n\
             ,0,0,1,1\n\
             \n\
             e.png,0,0,1\n\
             f.png,5,5,6,6\n",
        )
        .unwrap();
        let refs: Vec<&str> = records.iter().map(|r| r.data_reference.as_str()).collect();
        assert_eq!(refs, vec!["a.png", "f.png"]);
    }

    #[test]
    fn quoted_fields_may_contain_commas() {
        let records = parse(
            "image_path,south,west,north,east\n\
             \"tiles/odisha, 2024/a.png\",0,0,1,1\n",
        )
        .unwrap();
        assert_eq!(records[0].data_reference, "tiles/odisha, 2024/a.png");
    }

    #[test]
    fn split_record_handles_escaped_quotes() {
        assert_eq!(split_record(r#"a,"b ""c""",d"#), vec!["a", "b \"c\"", "d"]);
        assert_eq!(split_record("a,,"), vec!["a", "", ""]);
    }

    #[test]
    fn directory_reads_manifests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("val.csv"),
            "image_path,south,west,north,east\nval.png,0,0,1,1\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("tiles.csv"),
            "image_path,south,west,north,east\ntiles.png,0,0,1,1\n",
        )
        .unwrap();
        let records = read_manifest_dir(dir.path()).unwrap();
        let refs: Vec<&str> = records.iter().map(|r| r.data_reference.as_str()).collect();
        assert_eq!(refs, vec!["tiles.png", "val.png"]);
    }

    #[test]
    fn directory_without_manifests_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_manifest_dir(dir.path()),
            Err(IoError::NoManifests(_))
        ));
    }
}
