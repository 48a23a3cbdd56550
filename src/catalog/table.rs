use super::{source_identity_from_path, CatalogError, WorkCatalog, WorkItem};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Catalog backed by a flat listing file exported from object storage.
///
/// `.json` files hold an array of `{container, path, size}` objects; anything else is read as
/// CSV with a header naming the `container`, `path` and `size` columns (any order).
#[derive(Debug, Clone)]
pub struct TableCatalog {
    path: PathBuf,
    identity: String,
}

#[derive(Debug, Deserialize)]
struct JsonRow {
    container: Option<String>,
    path: Option<String>,
    #[serde(alias = "sizeBytes", alias = "size_bytes")]
    size: Option<u64>,
}

impl TableCatalog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = source_identity_from_path(&path);
        Self { path, identity }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn malformed(&self, reason: impl Into<String>) -> CatalogError {
        CatalogError::Malformed {
            path: self.path.display().to_string(),
            reason: reason.into(),
        }
    }

    fn parse_json(&self, raw: &str) -> Result<Vec<WorkItem>, CatalogError> {
        let rows: Vec<JsonRow> =
            serde_json::from_str(raw).map_err(|err| self.malformed(err.to_string()))?;
        rows.into_iter()
            .enumerate()
            .map(|(idx, row)| {
                let container = row
                    .container
                    .ok_or_else(|| self.malformed(format!("row {idx}: missing `container`")))?;
                let path = row
                    .path
                    .ok_or_else(|| self.malformed(format!("row {idx}: missing `path`")))?;
                let size = row
                    .size
                    .ok_or_else(|| self.malformed(format!("row {idx}: missing `size`")))?;
                WorkItem::from_object(&container, &path, size)
                    .map_err(|reason| self.malformed(format!("row {idx}: {reason}")))
            })
            .collect()
    }

    fn parse_csv(&self, raw: &str) -> Result<Vec<WorkItem>, CatalogError> {
        let mut lines = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header) = lines
            .next()
            .ok_or_else(|| self.malformed("missing header row"))?;
        let header = split_csv_line(header).map_err(|reason| self.malformed(reason))?;
        let container_col = find_column(&header, &["container", "bucket"])
            .ok_or_else(|| self.malformed("header has no `container` column"))?;
        let path_col = find_column(&header, &["path", "name"])
            .ok_or_else(|| self.malformed("header has no `path` column"))?;
        let size_col = find_column(&header, &["size", "size_bytes", "bytes"])
            .ok_or_else(|| self.malformed("header has no `size` column"))?;

        let mut items = Vec::new();
        for (line_idx, line) in lines {
            let line_no = line_idx + 1;
            let fields = split_csv_line(line)
                .map_err(|reason| self.malformed(format!("line {line_no}: {reason}")))?;
            if fields.len() != header.len() {
                return Err(self.malformed(format!(
                    "line {line_no}: expected {} fields, found {}",
                    header.len(),
                    fields.len()
                )));
            }
            let size = fields[size_col].trim().parse::<u64>().map_err(|err| {
                self.malformed(format!(
                    "line {line_no}: invalid size `{}`: {err}",
                    fields[size_col]
                ))
            })?;
            let item = WorkItem::from_object(&fields[container_col], &fields[path_col], size)
                .map_err(|reason| self.malformed(format!("line {line_no}: {reason}")))?;
            items.push(item);
        }
        Ok(items)
    }
}

impl WorkCatalog for TableCatalog {
    fn source_identity(&self) -> &str {
        &self.identity
    }

    fn list(&self) -> Result<Vec<WorkItem>, CatalogError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| CatalogError::Unavailable {
            path: self.path.display().to_string(),
            reason: err.to_string(),
        })?;
        let is_json = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            self.parse_json(&raw)
        } else {
            self.parse_csv(&raw)
        }
    }
}

fn find_column(header: &[String], names: &[&str]) -> Option<usize> {
    header.iter().position(|h| {
        let h = h.trim().to_ascii_lowercase();
        names.iter().any(|name| *name == h)
    })
}

fn split_csv_line(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.trim().is_empty() => {
                current.clear();
                in_quotes = true;
            }
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            '\r' if !in_quotes => {}
            other => current.push(other),
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(current);
    Ok(fields)
}
