//! Command-line surface of `dbexport`.

use clap::Parser;
use dbexport_core::config::{ConnectionConfig, ExportOptions};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Output directory used when stdout is a terminal and none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "./mysql-export";

#[derive(Parser)]
#[command(name = "dbexport")]
#[command(about = "Export MySQL schemas, grants and users into re-importable scripts")]
#[command(version)]
#[command(long_about = "
dbexport - Logical export of a MySQL or MariaDB server

Writes into an existing output directory:
- 00users.sql: DROP USER / CREATE USER for every account granted on an
  exported schema, with its stored credential hash
- <schema>.sql.gz: schema DDL, schema grants and row content (mysqldump)
- import.sh: replays the users script first, then every schema

SECURITY FEATURES:
- Read-only catalog queries only
- The password is passed to mysqldump through MYSQL_PWD, never argv
- Passwords never appear in logs or error messages

EXAMPLES:
  dbexport --output-dir /backup/mysql
  dbexport --host db.internal --ask-password --database-exclude scratch --output-dir out
  MYSQL_PWD=secret dbexport --no-content --no-compress --output-dir out
")]
pub struct Cli {
    /// Server host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Server port
    #[arg(long, default_value_t = dbexport_core::config::DEFAULT_PORT)]
    pub port: u16,

    /// Administrative user
    #[arg(long, default_value = "root")]
    pub user: String,

    /// Administrative password
    #[arg(
        long,
        env = "MYSQL_PWD",
        hide_env_values = true,
        help = "Administrative password (prefer MYSQL_PWD or --ask-password)"
    )]
    pub password: Option<String>,

    /// Prompt for the password
    #[arg(long, help = "Prompt for the administrative password without echo")]
    pub ask_password: bool,

    /// Schemas to leave out
    #[arg(long, value_name = "SCHEMA", help = "Schema to exclude (repeatable)")]
    pub database_exclude: Vec<String>,

    /// Skip row content
    #[arg(long, help = "Export schema definitions and grants only")]
    pub no_content: bool,

    /// Skip compression
    #[arg(long, help = "Keep schema files as plain .sql")]
    pub no_compress: bool,

    /// Output directory
    #[arg(
        long,
        help = "Existing output directory (defaults to ./mysql-export on a terminal)"
    )]
    pub output_dir: Option<PathBuf>,

    /// Concurrent schema exports
    #[arg(long, default_value = "1", help = "Number of schemas exported concurrently")]
    pub jobs: NonZeroUsize,

    /// Row-dump program
    #[arg(long = "mysqldump", default_value = "mysqldump", value_name = "PROGRAM")]
    pub dump_program: String,

    /// Extra row-dump arguments
    #[arg(
        long = "dump-arg",
        value_name = "ARG",
        allow_hyphen_values = true,
        help = "Extra argument passed to mysqldump (repeatable)"
    )]
    pub dump_args: Vec<String>,

    /// Compression program
    #[arg(long = "gzip", default_value = "gzip", value_name = "PROGRAM")]
    pub compress_program: String,

    /// Client arguments in import.sh
    #[arg(
        long,
        default_value = "-u root",
        allow_hyphen_values = true,
        help = "mysql client arguments written into import.sh"
    )]
    pub import_client_args: String,

    /// Log level
    #[arg(
        long,
        default_value = "info",
        value_parser = parse_log_level,
        help = "Log level: error, warn, info, debug or trace"
    )]
    pub log_level: tracing::Level,
}

fn parse_log_level(value: &str) -> Result<tracing::Level, String> {
    dbexport_core::logging::parse_level(value)
        .ok_or_else(|| format!("unknown log level '{value}' (expected error, warn, info, debug or trace)"))
}

impl Cli {
    /// The output directory, if one is known.
    ///
    /// An explicit `--output-dir` always wins; otherwise the default is only
    /// used when stdout is a terminal.
    pub fn resolve_output_dir(&self, stdout_is_terminal: bool) -> Option<PathBuf> {
        match &self.output_dir {
            Some(dir) => Some(dir.clone()),
            None if stdout_is_terminal => Some(PathBuf::from(DEFAULT_OUTPUT_DIR)),
            None => None,
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.host.clone()).with_port(self.port)
    }

    pub fn export_options(&self, output_dir: PathBuf) -> ExportOptions {
        ExportOptions {
            output_dir,
            excluded: self.database_exclude.iter().cloned().collect(),
            export_content: !self.no_content,
            compress: !self.no_compress,
            jobs: self.jobs.get(),
            dump_program: self.dump_program.clone(),
            dump_args: self.dump_args.clone(),
            compress_program: self.compress_program.clone(),
            import_client_args: self.import_client_args.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("dbexport").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_defaults() {
        let cli = parse(&[]);
        assert_eq!(cli.host, "localhost");
        assert_eq!(cli.port, 3306);
        assert_eq!(cli.user, "root");
        assert!(!cli.ask_password);
        assert_eq!(cli.jobs.get(), 1);
        assert_eq!(cli.dump_program, "mysqldump");
        assert_eq!(cli.compress_program, "gzip");
        assert_eq!(cli.import_client_args, "-u root");
        assert_eq!(cli.log_level, tracing::Level::INFO);

        let options = cli.export_options(PathBuf::from("out"));
        assert!(options.export_content);
        assert!(options.compress);
        assert!(options.excluded.is_empty());
    }

    #[test]
    fn test_cli_repeatable_exclusions_and_dump_args() {
        let cli = parse(&[
            "--database-exclude",
            "scratch",
            "--database-exclude",
            "tmp",
            "--dump-arg",
            "--single-transaction",
            "--dump-arg=--routines",
            "--no-content",
            "--no-compress",
        ]);

        let options = cli.export_options(PathBuf::from("out"));
        assert_eq!(
            options.excluded.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["scratch", "tmp"]
        );
        assert_eq!(options.dump_args, vec!["--single-transaction", "--routines"]);
        assert!(!options.export_content);
        assert!(!options.compress);
    }

    #[test]
    fn test_cli_log_level_is_case_insensitive() {
        assert_eq!(parse(&["--log-level", "DEBUG"]).log_level, tracing::Level::DEBUG);
        assert_eq!(parse(&["--log-level", "Warn"]).log_level, tracing::Level::WARN);
        assert!(Cli::try_parse_from(["dbexport", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_cli_rejects_zero_jobs() {
        assert!(Cli::try_parse_from(["dbexport", "--jobs", "0"]).is_err());
        assert_eq!(parse(&["--jobs", "4"]).export_options(PathBuf::new()).jobs, 4);
    }

    #[test]
    fn test_cli_connection_config() {
        let config = parse(&["--host", "db.internal", "--port", "3307"]).connection_config();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 3307);
        assert!(config.read_only);
    }

    #[test]
    fn test_output_dir_resolution() {
        let cli = parse(&[]);
        assert_eq!(cli.resolve_output_dir(true), Some(PathBuf::from(DEFAULT_OUTPUT_DIR)));
        assert_eq!(cli.resolve_output_dir(false), None);

        let cli = parse(&["--output-dir", "/backup"]);
        assert_eq!(cli.resolve_output_dir(false), Some(PathBuf::from("/backup")));
        assert_eq!(cli.resolve_output_dir(true), Some(PathBuf::from("/backup")));
    }

    #[test]
    fn test_import_client_args_accepts_flags() {
        let cli = parse(&["--import-client-args", "-u admin -h target"]);
        assert_eq!(cli.import_client_args, "-u admin -h target");
    }
}
