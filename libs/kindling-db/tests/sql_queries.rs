//! Static checks over the SQL embedded in this crate's sources.

use std::fs;
use std::path::{Path, PathBuf};

const SQL_VERBS: [&str; 5] = ["select", "insert", "update", "delete", "with"];

struct SqlLiteral {
    file: PathBuf,
    line: usize,
    /// Lowercased, whitespace collapsed to single spaces.
    text: String,
}

impl SqlLiteral {
    fn location(&self) -> String {
        format!("{}:{}", self.file.display(), self.line)
    }
}

fn source_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir).unwrap().flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Every string literal in `src` with the line it starts on. Line comments
/// and char literals are skipped; lifetimes pass through untouched.
fn string_literals(src: &str) -> Vec<(usize, String)> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'\'' => {
                if bytes.get(i + 1) == Some(&b'\\') {
                    i += 2;
                    while i < bytes.len() && bytes[i] != b'\'' {
                        i += 1;
                    }
                    i += 1;
                } else if bytes.get(i + 2) == Some(&b'\'') {
                    i += 3;
                } else {
                    i += 1;
                }
            }
            b'r' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'#'))
                && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric()) =>
            {
                let hashes = bytes[i + 1..].iter().take_while(|b| **b == b'#').count();
                let open = i + 1 + hashes;
                if bytes.get(open) != Some(&b'"') {
                    i += 1;
                    continue;
                }
                let close = format!("\"{}", "#".repeat(hashes));
                let start = open + 1;
                let end = src[start..].find(&close).map_or(bytes.len(), |rel| start + rel);
                out.push((line, src[start..end].to_string()));
                line += src[start..end].matches('\n').count();
                i = end + close.len();
            }
            b'"' => {
                let start = i + 1;
                let mut j = start;
                while j < bytes.len() && bytes[j] != b'"' {
                    j += if bytes[j] == b'\\' { 2 } else { 1 };
                }
                let end = j.min(bytes.len());
                out.push((line, src[start..end].to_string()));
                line += src[start..end].matches('\n').count();
                i = end + 1;
            }
            _ => i += 1,
        }
    }
    out
}

fn sql_literals() -> Vec<SqlLiteral> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut found = Vec::new();
    for file in source_files(&root) {
        let src = fs::read_to_string(&file).unwrap();
        for (line, raw) in string_literals(&src) {
            let text = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
            let verb = text.split(' ').next().unwrap_or_default();
            if SQL_VERBS.contains(&verb) {
                found.push(SqlLiteral { file: file.clone(), line, text });
            }
        }
    }
    found
}

#[test]
fn scanner_sees_the_repositories() {
    let literals = sql_literals();
    assert!(literals.iter().any(|sql| sql.text.starts_with("insert into license_keys")));
    assert!(literals.iter().any(|sql| sql.text.starts_with("insert into users")));
    assert!(literals.iter().any(|sql| sql.text.starts_with("delete from records")));
}

#[test]
fn queries_use_numbered_placeholders() {
    let offenders: Vec<String> = sql_literals()
        .iter()
        .filter(|sql| sql.text.contains('?'))
        .map(SqlLiteral::location)
        .collect();
    assert!(offenders.is_empty(), "'?' placeholder in:\n{}", offenders.join("\n"));
}

#[test]
fn redemption_is_a_single_guarded_update() {
    let redemptions: Vec<SqlLiteral> = sql_literals()
        .into_iter()
        .filter(|sql| sql.text.starts_with("update license_keys set state = 'used'"))
        .collect();
    assert!(!redemptions.is_empty(), "no redemption query found");

    for sql in &redemptions {
        assert!(
            sql.text.contains("state = 'unused'") && sql.text.contains("returning"),
            "{} redeems without a conditional update",
            sql.location()
        );
    }
}

#[test]
fn record_writes_are_scoped_to_their_owner() {
    let writes: Vec<SqlLiteral> = sql_literals()
        .into_iter()
        .filter(|sql| {
            sql.text.starts_with("update records") || sql.text.starts_with("delete from records")
        })
        .collect();
    assert_eq!(writes.len(), 2);

    for sql in &writes {
        assert!(sql.text.contains("user_id = $"), "{} is not scoped by user_id", sql.location());
    }
}

#[test]
fn select_lists_name_their_columns() {
    let offenders: Vec<String> = sql_literals()
        .iter()
        .filter(|sql| sql.text.contains("select *"))
        .map(SqlLiteral::location)
        .collect();
    assert!(offenders.is_empty(), "SELECT * in:\n{}", offenders.join("\n"));
}
