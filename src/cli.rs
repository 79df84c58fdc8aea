use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "querius")]
#[command(author, version, about = "A small in-memory SQL engine")]
pub struct Cli {
    /// SQL script to run; statements are separated by `;`. Reads stdin when
    /// neither a script nor --query is given
    pub script: Option<PathBuf>,

    /// Execute SQL text directly instead of a script
    #[arg(short, long, conflicts_with = "script")]
    pub query: Option<String>,

    /// Output format for result sets
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Log filter used when RUST_LOG is unset (e.g. "debug", "querius=trace")
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["querius"]).unwrap();
        assert!(cli.script.is_none());
        assert!(cli.query.is_none());
        assert_eq!(cli.format, OutputFormat::Table);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_query_and_format() {
        let cli = Cli::try_parse_from(["querius", "-q", "SELECT * FROM t", "--format", "json"]).unwrap();
        assert_eq!(cli.query.as_deref(), Some("SELECT * FROM t"));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_query_conflicts_with_script() {
        assert!(Cli::try_parse_from(["querius", "init.sql", "-q", "SELECT 1"]).is_err());
    }
}
