use std::fs;
use std::path::{Path, PathBuf};

/// A string literal passed to `sqlx::query*`, lowercased.
struct SqlLiteral {
    location: String,
    sql: String,
}

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    for entry in fs::read_dir(dir).into_iter().flatten().flatten() {
        let path = entry.path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

/// First string literal after `(`, raw (`r#"..."#`) or plain.
fn first_literal(call: &str) -> Option<&str> {
    let args = call[call.find('(')? + 1..].trim_start();
    if let Some(raw) = args.strip_prefix('r') {
        let hashes = raw.len() - raw.trim_start_matches('#').len();
        let body = raw[hashes..].strip_prefix('"')?;
        let close = format!("\"{}", "#".repeat(hashes));
        return body.find(&close).map(|end| &body[..end]);
    }
    let body = args.strip_prefix('"')?;
    let mut escaped = false;
    for (i, ch) in body.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(&body[..i]),
            _ => {}
        }
    }
    None
}

fn sql_literals() -> Vec<SqlLiteral> {
    let mut files = Vec::new();
    rust_files(&Path::new(env!("CARGO_MANIFEST_DIR")).join("src"), &mut files);

    let mut literals = Vec::new();
    for file in files {
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for (idx, _) in content.match_indices("sqlx::query") {
            if let Some(sql) = first_literal(&content[idx..]) {
                let line = content[..idx].lines().count() + 1;
                literals.push(SqlLiteral {
                    location: format!("{}:{}", file.display(), line),
                    sql: sql.to_lowercase(),
                });
            }
        }
    }
    literals
}

fn migrations() -> String {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "sql"))
        .collect();
    files.sort();
    files
        .iter()
        .filter_map(|p| fs::read_to_string(p).ok())
        .collect::<Vec<_>>()
        .join("\n")
        .to_lowercase()
}

#[test]
fn queries_use_postgres_dialect() {
    let violations: Vec<String> = sql_literals()
        .into_iter()
        .filter(|q| {
            q.sql.contains('?')
                || ["insert or ignore", "strftime(", "datetime(", "autoincrement"]
                    .iter()
                    .any(|bad| q.sql.contains(bad))
        })
        .map(|q| q.location)
        .collect();

    assert!(
        violations.is_empty(),
        "SQLite placeholders or syntax in query literals:\n{}",
        violations.join("\n")
    );
}

#[test]
fn stock_claims_skip_locked_rows() {
    let claims: Vec<SqlLiteral> = sql_literals()
        .into_iter()
        .filter(|q| q.sql.contains("from stock_units") && q.sql.contains("for update"))
        .collect();
    assert!(!claims.is_empty(), "No stock claim query found");

    let unsafe_claims: Vec<&str> = claims
        .iter()
        .filter(|q| !q.sql.contains("skip locked") || !q.sql.contains("seq"))
        .map(|q| q.location.as_str())
        .collect();
    assert!(
        unsafe_claims.is_empty(),
        "Stock claims without SKIP LOCKED or the seq tie-break:\n{}",
        unsafe_claims.join("\n")
    );
}

#[test]
fn pending_depositors_are_unique_in_schema() {
    let schema = migrations();
    assert!(schema.contains("create unique index if not exists idx_purchases_pending_depositor"));
    assert!(schema.contains("where status = 'pending' and payment_method like 'bank_transfer:%'"));
}
