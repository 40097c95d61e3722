//! SQL text rendering for the user script and schema file headers.
//!
//! Every statement is idempotent on replay: each create is preceded by an
//! unconditional drop of the same object.

use crate::models::{Credential, Principal, Schema};
use crate::plan::ExportPlan;
use std::fmt::Write as _;

/// Quotes an identifier with backticks, doubling embedded backticks.
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quotes a string literal using MySQL escape sequences.
pub fn quote_literal(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len().saturating_add(2));
    quoted.push('\'');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\0' => quoted.push_str("\\0"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\u{1a}' => quoted.push_str("\\Z"),
            other => quoted.push(other),
        }
    }
    quoted.push('\'');
    quoted
}

/// Renders an account name as `'user'@'host'`.
pub fn account(principal: &Principal) -> String {
    format!(
        "{}@{}",
        quote_literal(&principal.username),
        quote_literal(&principal.host)
    )
}

/// Renders the drop/create pair recreating one principal.
pub fn render_user(principal: &Principal, credential: &Credential) -> String {
    let account = account(principal);
    format!(
        "DROP USER IF EXISTS {account};\nCREATE USER {account} IDENTIFIED WITH {} AS {};\n",
        quote_literal(credential.scheme.plugin_name()),
        quote_literal(credential.secret())
    )
}

/// Renders the user-provisioning script for every principal in the plan.
pub fn render_users(plan: &ExportPlan) -> String {
    plan.credentials()
        .map(|(principal, credential)| render_user(principal, credential))
        .collect()
}

/// Renders the header of a schema dump-request file.
///
/// Drop, create with the stored character set and collation, one grant per
/// authorized principal, then a `USE` so appended content lands in the schema.
/// An empty character set or collation leaves its clause out, so the server
/// default applies.
pub fn render_schema_header(schema: &Schema) -> String {
    let name = quote_identifier(&schema.name);
    let mut header = String::new();

    let _ = writeln!(header, "DROP DATABASE IF EXISTS {name};");
    let _ = write!(header, "CREATE DATABASE {name}");
    if !schema.charset.is_empty() {
        let _ = write!(header, " CHARACTER SET {}", schema.charset);
    }
    if !schema.collation.is_empty() {
        let _ = write!(header, " COLLATE {}", schema.collation);
    }
    header.push_str(";\n");
    for principal in &schema.authorized {
        let _ = writeln!(
            header,
            "GRANT ALL PRIVILEGES ON {name}.* TO {};",
            account(principal)
        );
    }
    let _ = writeln!(header, "USE {name};");

    header
}
