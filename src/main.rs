use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use tracing::{debug, error};

use querius::cli::{Cli, OutputFormat};
use querius::{split_statements, Engine, QueryResult, ResultSet, Value};

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse_args();
    init_logging(&cli.log_level);

    let script = match (&cli.query, &cli.script) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let mut engine = Engine::new();
    let failures = run_script(&mut engine, &script, cli.format);

    if failures > 0 {
        debug!(failures, "script finished with errors");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn init_logging(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(true)
        .init();
}

/// Runs each statement in turn; a failing statement is reported and the
/// rest still run. Returns the number of failures.
fn run_script(engine: &mut Engine, script: &str, format: OutputFormat) -> usize {
    let mut failures = 0;
    for sql in split_statements(script) {
        match engine.execute(sql) {
            Ok(QueryResult::Rows(rows)) => match format {
                OutputFormat::Table => println!("{}", rows),
                OutputFormat::Csv => print_csv(&rows),
                OutputFormat::Json => print_json(&rows),
            },
            Ok(ack) => println!("{}", ack),
            Err(e) => {
                error!(statement = sql, "statement failed");
                eprintln!("Error: {}", e);
                failures += 1;
            }
        }
    }

    failures
}

fn print_csv(result: &ResultSet) {
    println!("{}", result.columns.join(","));

    for row in &result.rows {
        let values: Vec<String> = row
            .values
            .iter()
            .map(|v| match v {
                Value::Null => String::new(),
                _ => {
                    let s = v.to_string();
                    if s.contains(',') || s.contains('"') || s.contains('\n') {
                        format!("\"{}\"", s.replace('"', "\"\""))
                    } else {
                        s
                    }
                }
            })
            .collect();
        println!("{}", values.join(","));
    }
}

fn json_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn print_json(result: &ResultSet) {
    let objects: Vec<String> = result
        .rows
        .iter()
        .map(|row| {
            let fields: Vec<String> = result
                .columns
                .iter()
                .zip(&row.values)
                .map(|(col, val)| {
                    let val_str = match val {
                        Value::Text(s) => json_string(s),
                        Value::Null => "null".to_string(),
                        Value::Float(f) if !f.is_finite() => "null".to_string(),
                        _ => val.to_string(),
                    };
                    format!("{}:{}", json_string(col), val_str)
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        })
        .collect();
    println!("[{}]", objects.join(","));
}
