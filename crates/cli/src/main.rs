//! CLI tool for editing thesis documents (.docx).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thesis_core::caption::{self, CaptionKind};
use thesis_core::{
    audit, AccessDate, BibliographyNormalizer, Block, CaptionNumberer, ConclusionInserter, Config,
    DashNormalizer, DashSet, Document, Error, HeadingPredicate, Outline, Section,
};
use thesis_docx::DocxPackage;

/// Edit captions, references, dashes and chapter conclusions of a thesis.
#[derive(Parser, Debug)]
#[command(name = "thesis-edit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print reports as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct EditArgs {
    /// Input .docx file
    input: PathBuf,

    /// Output file (default: overwrite the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report what would change without writing anything
    #[arg(short = 'n', long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List outline headings with their depth
    Outline {
        /// Input .docx file
        input: PathBuf,
    },

    /// Print blocks with their index and style
    Dump {
        /// Input .docx file
        input: PathBuf,

        /// Include table cells, headers and footers
        #[arg(short, long)]
        all: bool,
    },

    /// Renumber figure or table captions inside a section
    Captions {
        #[command(flatten)]
        edit: EditArgs,

        /// Regex matching the section heading, e.g. "^3\.6 "
        #[arg(short, long)]
        section: String,

        /// Caption kind: figure or table
        #[arg(short, long, default_value = "figure")]
        kind: CaptionKind,

        /// First minor number (default: one past the captions preceding the section)
        #[arg(long)]
        offset: Option<usize>,

        /// Outline depth of the section heading
        #[arg(long)]
        depth: Option<usize>,
    },

    /// Renumber and reformat the reference list
    Bibliography {
        #[command(flatten)]
        edit: EditArgs,

        /// Access date for URL entries without one (DD.MM.YYYY, default: today)
        #[arg(long, value_parser = parse_date)]
        access_date: Option<NaiveDate>,
    },

    /// Replace long dashes with hyphens and fix caption separators
    Dashes {
        #[command(flatten)]
        edit: EditArgs,

        /// Also replace hyphen variants and the minus sign
        #[arg(short, long)]
        all: bool,
    },

    /// Insert the chapter conclusions listed in the configuration
    Conclusions {
        #[command(flatten)]
        edit: EditArgs,
    },

    /// Report what the editing commands would still change
    Audit {
        /// Input .docx file
        input: PathBuf,
    },

    /// Conclusions, dashes, caption separators and references in one pass
    Fix {
        #[command(flatten)]
        edit: EditArgs,

        /// Access date for URL entries without one (DD.MM.YYYY, default: today)
        #[arg(long, value_parser = parse_date)]
        access_date: Option<NaiveDate>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Outline { input } => outline(&cli, &config, input),
        Command::Dump { input, all } => dump(&cli, input, *all),
        Command::Captions {
            edit,
            section,
            kind,
            offset,
            depth,
        } => captions(&cli, &config, edit, section, *kind, *offset, *depth),
        Command::Bibliography { edit, access_date } => bibliography(&cli, &config, edit, *access_date),
        Command::Dashes { edit, all } => dashes(&cli, &config, edit, *all),
        Command::Conclusions { edit } => conclusions(&cli, &config, edit),
        Command::Audit { input } => run_audit(&cli, &config, input),
        Command::Fix { edit, access_date } => fix(&cli, &config, edit, *access_date),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    Config::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| format!("expected DD.MM.YYYY, got {:?}", s))
}

fn open(input: &Path) -> Result<(DocxPackage, Document)> {
    let package =
        DocxPackage::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
    let document = package.document();
    Ok((package, document))
}

/// Write the edited document unless this is a dry run or nothing changed in place.
fn finish(package: &DocxPackage, document: &Document, edit: &EditArgs, changed: bool) -> Result<()> {
    if edit.dry_run {
        eprintln!("Dry run, nothing written");
        return Ok(());
    }

    let target = edit.output.as_deref().unwrap_or(&edit.input);
    if !changed && target == edit.input {
        log::info!("No changes, {} left untouched", edit.input.display());
        return Ok(());
    }

    package
        .save(document, target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    if changed {
        eprintln!("Written to: {}", target.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn outline(cli: &Cli, config: &Config, input: &Path) -> Result<()> {
    let (_, document) = open(input)?;
    let outline = Outline::from_config(&config.outline)?;
    let headings = outline.headings(&document.body);

    if cli.json {
        return print_json(&headings);
    }
    for heading in &headings {
        println!(
            "{:>5} {}{}",
            heading.index,
            "  ".repeat(heading.depth.saturating_sub(1)),
            heading.text
        );
    }
    Ok(())
}

fn dump(cli: &Cli, input: &Path, all: bool) -> Result<()> {
    let (_, document) = open(input)?;

    if cli.json {
        return if all {
            print_json(&document)
        } else {
            print_json(&document.body)
        };
    }

    let stories = if all {
        document.stories()
    } else {
        vec![(thesis_core::StoryId::Body, document.body.as_slice())]
    };
    for (story, blocks) in stories {
        if all {
            println!("== {} ==", story);
        }
        for (index, block) in blocks.iter().enumerate() {
            print_block(index, block);
        }
    }
    Ok(())
}

fn print_block(index: usize, block: &Block) {
    println!("{:>5} [{}] {}", index, block.style, block.text());
}

/// Offset continuing the numbering of captions before the section.
fn default_offset(numberer: &CaptionNumberer, blocks: &[Block], section: &Section, kind: CaptionKind) -> usize {
    let major = blocks[section.range()]
        .iter()
        .filter_map(|b| caption::parse(&b.text()))
        .find(|c| c.kind == kind)
        .map(|c| c.major);
    match major {
        Some(major) => numberer.next_minor(blocks, section.start, kind, major),
        None => 1,
    }
}

fn captions(
    cli: &Cli,
    config: &Config,
    edit: &EditArgs,
    section: &str,
    kind: CaptionKind,
    offset: Option<usize>,
    depth: Option<usize>,
) -> Result<()> {
    let (package, mut document) = open(&edit.input)?;
    let outline = Outline::from_config(&config.outline)?;
    let numberer = CaptionNumberer::from_config(&config.captions);

    let mut predicate = HeadingPredicate::new(section)?;
    if let Some(depth) = depth {
        predicate = predicate.at_depth(depth);
    }
    let sections = outline.require(&document.body, &predicate)?;

    let mut reports = Vec::with_capacity(sections.len());
    for section in &sections {
        let offset = offset.unwrap_or_else(|| default_offset(&numberer, &document.body, section, kind));
        log::debug!("{:?}: numbering from {}", section.heading, offset);
        reports.push(numberer.renumber(&mut document.body, section.range(), kind, offset)?);
    }

    if cli.json {
        print_json(&reports)?;
    } else {
        for (section, report) in sections.iter().zip(&reports) {
            println!(
                "{}: {} captions, {} renumbered, {} malformed",
                section.heading,
                report.captions,
                report.changed.len(),
                report.malformed.len()
            );
            for change in &report.changed {
                println!("  {:>5} {} -> {}", change.index, change.before, change.after);
            }
        }
    }

    let changed = reports.iter().any(|r| !r.changed.is_empty());
    finish(&package, &document, edit, changed)
}

fn bibliography_normalizer(config: &Config, access_date: Option<NaiveDate>) -> Result<BibliographyNormalizer> {
    let normalizer = BibliographyNormalizer::from_config(&config.bibliography)?;
    Ok(match access_date {
        Some(date) => normalizer.with_access_date(AccessDate::Fixed(date)),
        None => normalizer,
    })
}

fn bibliography(cli: &Cli, config: &Config, edit: &EditArgs, access_date: Option<NaiveDate>) -> Result<()> {
    let (package, mut document) = open(&edit.input)?;
    let outline = Outline::from_config(&config.outline)?;
    let normalizer = bibliography_normalizer(config, access_date)?;

    let report = normalizer
        .normalize_document(&mut document, &outline)
        .context("Reference list not normalized")?;

    if cli.json {
        print_json(&report)?;
    } else {
        println!(
            "{}: {} entries, {} changed, {} dates assigned",
            report.section.heading,
            report.entries.len(),
            report.changed,
            report.entries.iter().filter(|e| e.date_assigned).count()
        );
        for index in &report.flagged {
            println!("  {:>5} left as is: {}", index, document.body[*index].text());
        }
    }

    finish(&package, &document, edit, report.changed > 0)
}

fn dashes(cli: &Cli, config: &Config, edit: &EditArgs, all: bool) -> Result<()> {
    let (package, mut document) = open(&edit.input)?;
    let mut dash_config = config.dashes.clone();
    if all {
        dash_config.set = DashSet::All;
    }
    let report = DashNormalizer::from_config(&dash_config).normalize_document(&mut document)?;

    if cli.json {
        print_json(&report)?;
    } else {
        println!(
            "{} dashes replaced, {} caption separators fixed",
            report.replaced, report.captions_fixed
        );
        for story in &report.stories {
            println!("  {}: {}", story.story, story.dashes);
        }
    }

    finish(&package, &document, edit, report.replaced > 0 || report.captions_fixed > 0)
}

fn conclusions(cli: &Cli, config: &Config, edit: &EditArgs) -> Result<()> {
    if config.conclusions.is_empty() {
        bail!("No conclusions configured (add [[conclusions]] entries to the config file)");
    }

    let (package, mut document) = open(&edit.input)?;
    let outline = Outline::from_config(&config.outline)?;
    let report = ConclusionInserter::from_config(&config.conclusions)?.apply(&mut document.body, &outline)?;

    if cli.json {
        print_json(&report)?;
    } else {
        for inserted in &report.inserted {
            println!("{}: {} blocks inserted", inserted.chapter, inserted.blocks);
        }
        for title in &report.skipped {
            println!("{}: already present", title);
        }
        for chapter in &report.missing {
            println!("{}: chapter not found", chapter);
        }
    }

    finish(&package, &document, edit, !report.inserted.is_empty())
}

fn run_audit(cli: &Cli, config: &Config, input: &Path) -> Result<()> {
    let (_, document) = open(input)?;
    let report = audit(&document, config)?;

    if cli.json {
        return print_json(&report);
    }

    for story in &report.dashes {
        println!("{}: {} long dashes", story.story, story.dashes);
    }
    println!(
        "Captions: {} figures, {} tables",
        report.captions.figures, report.captions.tables
    );
    for issue in &report.captions.unnormalized {
        println!("  {} [{}] separator: {}", issue.story, issue.index, issue.text);
    }
    for issue in &report.captions.malformed {
        println!("  {} [{}] malformed: {}", issue.story, issue.index, issue.text);
    }
    for chapter in &report.chapters_without_conclusions {
        println!("No chapter conclusions: {}", chapter);
    }
    match &report.bibliography {
        Some(bibliography) => {
            println!("{}: {} entries", bibliography.heading, bibliography.entries);
            for entry in &bibliography.undated {
                println!("  [{}] no access date: {}", entry.index, entry.description);
            }
        }
        None => println!("Reference list not found"),
    }
    if report.is_clean() {
        println!("Nothing to fix");
    }
    Ok(())
}

#[derive(Serialize)]
struct FixReport {
    conclusions: Option<thesis_core::ConclusionReport>,
    dashes: thesis_core::DashReport,
    bibliography: Option<thesis_core::BibliographyReport>,
}

fn fix(cli: &Cli, config: &Config, edit: &EditArgs, access_date: Option<NaiveDate>) -> Result<()> {
    let (package, mut document) = open(&edit.input)?;
    let outline = Outline::from_config(&config.outline)?;

    let conclusions = if config.conclusions.is_empty() {
        None
    } else {
        let inserter = ConclusionInserter::from_config(&config.conclusions)?;
        Some(inserter.apply(&mut document.body, &outline)?)
    };

    let dashes = DashNormalizer::from_config(&config.dashes).normalize_document(&mut document)?;

    let bibliography = match bibliography_normalizer(config, access_date)?.normalize_document(&mut document, &outline) {
        Ok(report) => Some(report),
        Err(Error::NotFound(what)) => {
            log::warn!("Reference list skipped: {}", what);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let report = FixReport {
        conclusions,
        dashes,
        bibliography,
    };
    let changed = report.conclusions.as_ref().is_some_and(|c| !c.inserted.is_empty())
        || report.dashes.replaced > 0
        || report.dashes.captions_fixed > 0
        || report.bibliography.as_ref().is_some_and(|b| b.changed > 0);

    if cli.json {
        print_json(&report)?;
    } else {
        if let Some(conclusions) = &report.conclusions {
            println!("Conclusions: {} inserted", conclusions.inserted.len());
        }
        println!(
            "Dashes: {} replaced, {} caption separators fixed",
            report.dashes.replaced, report.dashes.captions_fixed
        );
        if let Some(bibliography) = &report.bibliography {
            println!(
                "References: {} entries, {} changed",
                bibliography.entries.len(),
                bibliography.changed
            );
        }
    }

    finish(&package, &document, edit, changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(parse_date("14.03.2025"), Ok(expected));
        assert_eq!(parse_date("2025-03-14"), Ok(expected));
        assert!(parse_date("14/03/2025").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "thesis-edit",
            "captions",
            "thesis.docx",
            "--section",
            r"^3\.6 ",
            "--kind",
            "table",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Command::Captions { edit, kind, offset, .. } => {
                assert_eq!(kind, CaptionKind::Table);
                assert_eq!(offset, None);
                assert!(edit.dry_run);
                assert_eq!(edit.input, PathBuf::from("thesis.docx"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_default_offset_continues_chapter() {
        let blocks = vec![
            Block::new("Heading 2", "3.5 Архітектура"),
            Block::new("Caption", "Рисунок 3.3. Перший"),
            Block::new("Caption", "Рисунок 3.4. Другий"),
            Block::new("Heading 2", "3.6 Реалізація"),
            Block::new("Caption", "Рисунок 3.1 - Старий підпис"),
        ];
        let section = Section {
            start: 3,
            end: 5,
            depth: 2,
            heading: "3.6 Реалізація".to_string(),
        };
        let numberer = CaptionNumberer::new();
        assert_eq!(default_offset(&numberer, &blocks, &section, CaptionKind::Figure), 5);
        assert_eq!(default_offset(&numberer, &blocks, &section, CaptionKind::Table), 1);
    }
}
