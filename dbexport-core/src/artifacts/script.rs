//! Artifact file names and the import orchestration script.

use crate::plan::ExportPlan;
use std::fmt::Write as _;

/// File name of the user-provisioning script.
pub const USERS_FILE: &str = "00users.sql";

/// File name of the import orchestration script.
pub const IMPORT_SCRIPT_FILE: &str = "import.sh";

const USERS_STEM: &str = "00users";

/// Derives the dump file stem for a schema name.
///
/// ASCII alphanumerics, `_`, `$` and `-` are kept; anything else becomes
/// `@xxxx` (lower-hex code point). A stem that would collide with the user
/// script gets a leading `@`, which the encoding never produces on its own.
pub fn schema_file_stem(schema: &str) -> String {
    let mut stem = String::with_capacity(schema.len());
    for c in schema.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-') {
            stem.push(c);
        } else {
            let _ = write!(stem, "@{:04x}", u32::from(c));
        }
    }
    if stem.eq_ignore_ascii_case(USERS_STEM) {
        stem.insert(0, '@');
    }
    stem
}

/// Uncompressed dump file name for a schema.
pub fn schema_file_name(schema: &str) -> String {
    format!("{}.sql", schema_file_stem(schema))
}

/// Quotes a word for a POSIX shell.
pub fn shell_quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}

/// How schema files are stored, as far as the import script is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportEncoding {
    /// Plain `.sql` files fed by redirection
    Plain,
    /// Compressed files with the given extension, expanded by `command`
    Compressed { extension: String, command: String },
}

impl ImportEncoding {
    /// Gzip-compressed files expanded with `gunzip -c`.
    pub fn gzip() -> Self {
        Self::Compressed {
            extension: "gz".to_string(),
            command: "gunzip -c".to_string(),
        }
    }

    /// Final on-disk file name of a schema's dump.
    pub fn schema_artifact_name(&self, schema: &str) -> String {
        match self {
            Self::Plain => schema_file_name(schema),
            Self::Compressed { extension, .. } => {
                format!("{}.{}", schema_file_name(schema), extension)
            }
        }
    }
}

/// Renders the import orchestration script.
///
/// The user script is always applied first, then every schema file. The
/// script stops at the first failing step, including a failing decompressor
/// inside a pipeline.
pub fn render_import_script(plan: &ExportPlan, client_args: &str, encoding: &ImportEncoding) -> String {
    let mut script = String::new();

    let _ = writeln!(script, "#!/usr/bin/env bash");
    let _ = writeln!(script, "set -euo pipefail");
    let _ = writeln!(script, "cd \"$(dirname \"$0\")\"");
    let _ = writeln!(script, "MYSQL_ARGS={}", shell_quote(client_args));

    // Phase one: principals must exist before any grant references them
    let _ = writeln!(script, "mysql $MYSQL_ARGS < {}", shell_quote(USERS_FILE));

    // Phase two: schemas, in any order
    for schema in plan.schemas() {
        let file = shell_quote(&encoding.schema_artifact_name(&schema.name));
        match encoding {
            ImportEncoding::Plain => {
                let _ = writeln!(script, "mysql $MYSQL_ARGS < {file}");
            }
            ImportEncoding::Compressed { command, .. } => {
                let _ = writeln!(script, "{command} {file} | mysql $MYSQL_ARGS");
            }
        }
    }

    script
}
