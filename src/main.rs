use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use segment_dsl::config::ColumnType;
use segment_dsl::{
    canonicalize, reverse_json, transform_with, Classifier, ColumnCatalog, TransformConfig,
};

/// Converts segment definitions to reporting API dynamic segments and back.
#[derive(Parser, Debug)]
#[clap(name = "segment_dsl", version)]
struct Cli {
    /// Input files; standard input is read when none are given.
    files: Vec<PathBuf>,
    /// Read dynamic segment JSON and print segment definitions.
    #[clap(long, conflicts_with = "canonical")]
    reverse: bool,
    /// Print the canonical segment definition instead of JSON.
    #[clap(long)]
    canonical: bool,
    /// Reject values longer than the reporting API accepts.
    #[clap(long)]
    validate: bool,
    /// `name` of the produced dynamic segments.
    #[clap(long, default_value = "-")]
    name: String,
    /// Start an interactive session.
    #[clap(long)]
    repl: bool,
    /// Column metadata JSON to use instead of the bundled catalog.
    #[clap(long, value_name = "FILE")]
    columns: Option<PathBuf>,
    /// Print the columns usable in segments and exit.
    #[clap(long)]
    list_columns: bool,
    /// Log debug output to stderr.
    #[clap(long, short)]
    verbose: bool,
}

impl Cli {
    fn transform_config(&self) -> TransformConfig {
        TransformConfig {
            segment_name: self.name.clone(),
            validate: self.validate,
        }
    }

    /// Converts one input according to the selected mode.
    fn convert(&self, classifier: &Classifier, input: &str) -> Result<String> {
        if self.reverse {
            return Ok(reverse_json(input)?);
        }
        if self.canonical {
            return Ok(canonicalize(input)?);
        }
        let segment = transform_with(input, classifier, self.transform_config())?;
        Ok(serde_json::to_string_pretty(&segment)?)
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Each input is `(label, text)`. A file is one input; stdin is one input per
/// line, or a single JSON document in reverse mode.
fn collect_inputs(cli: &Cli) -> Result<Vec<(String, String)>> {
    if cli.files.is_empty() {
        let mut content = String::new();
        io::stdin()
            .read_to_string(&mut content)
            .context("cannot read standard input")?;
        if cli.reverse {
            return Ok(vec![("<stdin>".to_string(), content)]);
        }
        return Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (format!("<stdin>:{}", i + 1), line.trim_end().to_string()))
            .collect());
    }

    cli.files
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read {}", path.display()))?;
            Ok((
                path.display().to_string(),
                content.trim_end_matches(['\r', '\n']).to_string(),
            ))
        })
        .collect()
}

/// The one stderr line reported for a failed input.
fn failure_line(label: &str, error: &anyhow::Error) -> String {
    format!("error: {label}: {error:#}")
}

fn run_batch(cli: &Cli, classifier: &Classifier) -> Result<bool> {
    let inputs = collect_inputs(cli)?;
    let mut all_ok = true;

    for (label, input) in &inputs {
        debug!(%label, "converting input");
        match cli.convert(classifier, input) {
            Ok(output) => println!("{output}"),
            Err(e) => {
                all_ok = false;
                eprintln!("{}", failure_line(label, &e));
            }
        }
    }
    Ok(all_ok)
}

fn run_repl(cli: &Cli, classifier: &Classifier) -> Result<()> {
    let mut rl = DefaultEditor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    println!("segment_dsl: enter a segment definition, `exit` to quit.");

    loop {
        let line = match rl.readline("segment> ") {
            Ok(line) => line,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }
        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        match cli.convert(classifier, line) {
            Ok(output) => println!("{output}"),
            Err(e) => eprintln!("error: {e:#}"),
        }
    }
    Ok(())
}

fn load_classifier(path: &Path) -> Result<Classifier> {
    let catalog = ColumnCatalog::from_json_file(path)
        .with_context(|| format!("cannot load columns from {}", path.display()))?;
    info!(path = %path.display(), columns = catalog.len(), "using column catalog");
    Ok(Classifier::new(Arc::new(catalog)))
}

fn list_columns(classifier: &Classifier) {
    for column in classifier.catalog().columns() {
        if !column.allowed_in_segments {
            continue;
        }
        let kind = match column.column_type {
            ColumnType::Dimension => "dimension",
            ColumnType::Metric => "metric",
            ColumnType::Unknown => "unknown",
        };
        match &column.replaced_by {
            Some(replacement) => println!(
                "{}\t{kind}\t{}\treplaced by {replacement}",
                column.id, column.data_type
            ),
            None => println!("{}\t{kind}\t{}", column.id, column.data_type),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let loaded;
    let classifier = match &cli.columns {
        Some(path) => {
            loaded = load_classifier(path)?;
            &loaded
        }
        None => Classifier::shared()?,
    };

    if cli.list_columns {
        list_columns(classifier);
        return Ok(());
    }
    if cli.repl {
        return run_repl(&cli, classifier);
    }
    if !run_batch(&cli, classifier)? {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_is_one_line_with_cause() {
        let error = anyhow::Error::from(segment_dsl::parse("nonsense").unwrap_err())
            .context("cannot convert");
        let line = failure_line("<stdin>:3", &error);
        assert!(line.starts_with("error: <stdin>:3: cannot convert: "));
        assert!(line.contains("no segment scope"));
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_columns_option() {
        let cli = Cli::parse_from(["segment_dsl", "--columns", "cols.json", "--list-columns"]);
        assert_eq!(cli.columns, Some(PathBuf::from("cols.json")));
        assert!(cli.list_columns);

        let err = load_classifier(Path::new("no_such_columns.json")).unwrap_err();
        assert!(format!("{err:#}").contains("column file does not exist"));
    }
}
