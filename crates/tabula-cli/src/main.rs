//! Tabula CLI - formula fields over CSV tables

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use tabula::prelude::*;
use tabula::{CsvWriteOptions, EngineOptions, FormulaTemplate};

#[derive(Parser)]
#[command(name = "tabula")]
#[command(author, version, about = "Formula fields for CSV tables")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List loaded sheets with their row counts and columns
    Sheets {
        /// Input CSV files (`PATH` or `NAME=PATH`)
        #[arg(required = true)]
        inputs: Vec<String>,
    },

    /// Check a formula against the loaded sheets
    Validate {
        /// Input CSV files (`PATH` or `NAME=PATH`)
        #[arg(short, long = "sheet", required = true)]
        sheets: Vec<String>,

        /// Sheet the formula belongs to
        #[arg(short, long)]
        target: String,

        /// Formula expression
        expression: String,
    },

    /// Create a formula field and export the target sheet as CSV
    Calc {
        /// Input CSV files (`PATH` or `NAME=PATH`)
        #[arg(short, long = "sheet", required = true)]
        sheets: Vec<String>,

        /// Sheet the formula belongs to
        #[arg(short, long)]
        target: String,

        /// Name of the new field
        #[arg(short, long)]
        field: String,

        /// Result type (number, text, auto)
        #[arg(long = "type", default_value = "number")]
        result_type: ResultType,

        /// Row filter applied before computing (`column:kind:value`)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Sort the output by a column (`column` or `column:desc`); repeat for more levels
        #[arg(long = "sort")]
        sort: Vec<SortKey>,

        /// Compute hidden rows too
        #[arg(long)]
        all_rows: bool,

        /// Output CSV file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Formula expression
        expression: String,
    },

    /// Manage stored formula templates
    Template {
        /// Template file
        #[arg(long, default_value = TemplateStore::DEFAULT_FILE)]
        file: PathBuf,

        #[command(subcommand)]
        action: TemplateAction,
    },
}

#[derive(Subcommand)]
enum TemplateAction {
    /// List template names
    List,

    /// Save a formula as a template
    Save {
        /// Template name
        name: String,

        /// Field name the template creates
        #[arg(short, long)]
        field: String,

        /// Result type (number, text, auto)
        #[arg(long = "type", default_value = "number")]
        result_type: ResultType,

        /// Formula expression
        expression: String,
    },

    /// Show a template
    Show {
        /// Template name
        name: String,
    },

    /// Remove a template
    Remove {
        /// Template name
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Sheets { inputs } => list_sheets(&inputs),
        Commands::Validate {
            sheets,
            target,
            expression,
        } => validate(&sheets, &target, &expression),
        Commands::Calc {
            sheets,
            target,
            field,
            result_type,
            filters,
            sort,
            all_rows,
            output,
            expression,
        } => calc(
            &sheets,
            &target,
            &field,
            result_type,
            &filters,
            sort,
            all_rows,
            output.as_deref(),
            &expression,
        ),
        Commands::Template { file, action } => template(&file, action),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load every `PATH` or `NAME=PATH` input into a store
fn load_sheets(inputs: &[String]) -> Result<TableStore> {
    let mut store = TableStore::new();
    for input in inputs {
        match input.split_once('=') {
            Some((name, path)) => store
                .open_csv_as(path, name)
                .with_context(|| format!("Failed to load '{}'", path))?,
            None => store
                .open_csv(input)
                .with_context(|| format!("Failed to load '{}'", input))?,
        };
    }
    log::debug!("Loaded {} sheets", store.sheet_count());
    Ok(store)
}

fn list_sheets(inputs: &[String]) -> Result<()> {
    let store = load_sheets(inputs)?;

    for sheet in store.sheets() {
        let table = sheet.table();
        println!(
            "{}\t{} rows\t{}",
            table.name(),
            table.row_count(),
            table.columns().join(", ")
        );
    }

    Ok(())
}

fn validate(inputs: &[String], target: &str, expression: &str) -> Result<()> {
    let store = load_sheets(inputs)?;
    let engine = FormulaEngine::new();

    match engine.validate_formula(&store, target, expression) {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(EngineError::Validation(err)) => bail!("{}: {}", err.kind, err.detail),
        Err(err) => Err(err).context("Invalid formula"),
    }
}

#[allow(clippy::too_many_arguments)]
fn calc(
    inputs: &[String],
    target: &str,
    field: &str,
    result_type: ResultType,
    filters: &[String],
    sort: Vec<SortKey>,
    all_rows: bool,
    output: Option<&Path>,
    expression: &str,
) -> Result<()> {
    let mut store = load_sheets(inputs)?;

    {
        let sheet = store
            .sheet_mut(target)
            .with_context(|| format!("Sheet '{}' not loaded", target))?;
        for filter in filters {
            sheet.add_filter(parse_filter(filter)?);
        }
        sheet.set_sort(sort);
    }

    let mut engine = FormulaEngine::with_options(EngineOptions {
        respect_visibility: !all_rows,
    });
    let column = engine
        .create_formula_field(&mut store, target, field, expression, result_type)
        .with_context(|| format!("Failed to create field '{}'", field))?;

    eprintln!(
        "Computed '{}': {} rows evaluated, {} skipped, {} faulted",
        field, column.stats.rows_evaluated, column.stats.rows_skipped, column.stats.rows_faulted
    );

    match output {
        Some(path) => {
            store
                .save_csv(target, path)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Wrote '{}' to '{}'", target, path.display());
        }
        None => {
            let view = store
                .sheet(target)
                .with_context(|| format!("Sheet '{}' not loaded", target))?
                .view();
            CsvWriter::write(&view, io::stdout().lock(), &CsvWriteOptions::default())
                .context("Failed to write to stdout")?;
        }
    }

    Ok(())
}

/// Parse `column:kind:value` (the value may be omitted for emptiness checks)
fn parse_filter(spec: &str) -> Result<RowFilter> {
    let mut parts = spec.splitn(3, ':');
    let (Some(column), Some(kind)) = (parts.next(), parts.next()) else {
        bail!("Invalid filter '{}', expected column:kind:value", spec);
    };
    let kind: FilterKind = kind
        .parse()
        .with_context(|| format!("Invalid filter '{}'", spec))?;
    let value = parts.next().unwrap_or_default();
    if kind.takes_value() && value.is_empty() {
        bail!("Filter '{}' needs a value", spec);
    }
    Ok(RowFilter::new(column.trim(), kind, value))
}

fn template(file: &Path, action: TemplateAction) -> Result<()> {
    let mut templates = TemplateStore::load(file)
        .with_context(|| format!("Failed to load templates from '{}'", file.display()))?;

    match action {
        TemplateAction::List => {
            for (name, template) in templates.iter() {
                println!("{}\t{}\t{}", name, template.name, template.result_type);
            }
        }
        TemplateAction::Show { name } => {
            let template = templates
                .get(&name)
                .with_context(|| format!("Template '{}' not found", name))?;
            println!("name: {}", template.name);
            println!("expression: {}", template.expression);
            println!("type: {}", template.result_type);
        }
        TemplateAction::Save {
            name,
            field,
            result_type,
            expression,
        } => {
            templates.insert(
                name.as_str(),
                FormulaTemplate::new(field, expression, result_type),
            );
            templates
                .save(file)
                .with_context(|| format!("Failed to write '{}'", file.display()))?;
            eprintln!("Saved template '{}'", name);
        }
        TemplateAction::Remove { name } => {
            if templates.remove(&name).is_none() {
                bail!("Template '{}' not found", name);
            }
            templates
                .save(file)
                .with_context(|| format!("Failed to write '{}'", file.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        let filter = parse_filter("Type:not equals:bolt").unwrap();
        assert_eq!(filter.column, "Type");
        assert_eq!(filter.kind, FilterKind::NotEquals);
        assert_eq!(filter.value, "bolt");

        let filter = parse_filter("Time:equals:12:30").unwrap();
        assert_eq!(filter.value, "12:30");

        let filter = parse_filter("Note:is_empty").unwrap();
        assert_eq!(filter.kind, FilterKind::IsEmpty);

        assert!(parse_filter("Type").is_err());
        assert!(parse_filter("Type:equals").is_err());
        assert!(parse_filter("Type:resembles:x").is_err());
    }

    #[test]
    fn test_cli_parses_calc() {
        let cli = Cli::try_parse_from([
            "tabula", "calc", "-s", "Parts=parts.csv", "-s", "stock.csv", "-t", "Parts", "-f",
            "Area", "--type", "auto", "--filter", "Type:equals:bolt", "--sort", "Type", "--sort",
            "Length:desc", "[Length] * [Width]",
        ])
        .unwrap();
        match cli.command {
            Commands::Calc {
                sheets,
                result_type,
                filters,
                sort,
                expression,
                ..
            } => {
                assert_eq!(sheets, vec!["Parts=parts.csv", "stock.csv"]);
                assert_eq!(result_type, ResultType::Auto);
                assert_eq!(filters.len(), 1);
                assert_eq!(
                    sort,
                    vec![SortKey::ascending("Type"), SortKey::descending("Length")]
                );
                assert_eq!(expression, "[Length] * [Width]");
            }
            _ => panic!("expected calc"),
        }
    }
}
