//! Command-line front end.
//!
//! Usage:
//!   doc-translator serve
//!   doc-translator translate <target> [input.json] [--source xx] [--fields a,b] [--exclude c,d]
//!
//! `translate` reads a JSON document (or an array of documents) from the file
//! or from stdin and prints the translated JSON to stdout.

use crate::record::{FieldSelector, Record};
use crate::translator::DocumentTranslator;
use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

pub const USAGE: &str = "usage:
  doc-translator serve
  doc-translator translate <target> [input.json] [--source xx] [--fields a,b] [--exclude c,d]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Translate(TranslateArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslateArgs {
    pub target_language: String,
    pub source_language: Option<String>,
    pub input: Option<PathBuf>,
    pub selector: FieldSelector,
}

/// Parse arguments (without the program name).
pub fn parse_args(args: &[String]) -> Result<Command> {
    let Some((command, rest)) = args.split_first() else {
        bail!("missing command\n{}", USAGE);
    };

    match command.as_str() {
        "serve" => Ok(Command::Serve),
        "translate" => parse_translate(rest).map(Command::Translate),
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

fn parse_translate(args: &[String]) -> Result<TranslateArgs> {
    let mut positional = Vec::new();
    let mut source_language = None;
    let mut selector = FieldSelector::all();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--source" => {
                source_language = Some(iter.next().context("--source needs a value")?.clone());
            }
            "--fields" => {
                let value = iter.next().context("--fields needs a value")?;
                for path in split_list(value) {
                    selector = selector.include(path);
                }
            }
            "--exclude" => {
                let value = iter.next().context("--exclude needs a value")?;
                for path in split_list(value) {
                    selector = selector.exclude(path);
                }
            }
            flag if flag.starts_with("--") => bail!("unknown option '{}'\n{}", flag, USAGE),
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let target_language = positional
        .next()
        .with_context(|| format!("missing target language\n{}", USAGE))?;
    let input = positional.next().map(PathBuf::from);
    if let Some(extra) = positional.next() {
        bail!("unexpected argument '{}'\n{}", extra, USAGE);
    }

    Ok(TranslateArgs {
        target_language,
        source_language,
        input,
        selector,
    })
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parsed command input.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Single(Record),
    Many(Vec<Record>),
}

/// Read JSON input from `path`, or stdin when `path` is `None` or `-`.
pub fn read_input(path: Option<&Path>) -> Result<Input> {
    let raw = match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    parse_input(&raw)
}

pub fn parse_input(raw: &str) -> Result<Input> {
    let value: Record = serde_json::from_str(raw).context("Input is not valid JSON")?;
    Ok(match value {
        Record::Array(documents) => Input::Many(documents),
        document => Input::Single(document),
    })
}

/// Run `translate` and return the pretty-printed result.
pub async fn run_translate(translator: &DocumentTranslator, args: &TranslateArgs) -> Result<String> {
    let input = read_input(args.input.as_deref())?;
    let source = args.source_language.as_deref();

    let output = match input {
        Input::Single(document) => translator
            .translate_document(&document, &args.target_language, source, &args.selector)
            .await
            .context("Translation failed")?,
        Input::Many(documents) => Record::Array(
            translator
                .translate_with_progress(
                    &documents,
                    &args.target_language,
                    source,
                    &args.selector,
                    |done, total| tracing::info!("Translated {}/{} documents", done, total),
                )
                .await
                .context("Translation failed")?,
        ),
    };

    serde_json::to_string_pretty(&output).context("Failed to serialize output")
}
