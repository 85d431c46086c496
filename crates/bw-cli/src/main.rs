//! Blockwise CLI
//!
//! Loads filter lists and answers block and element-hide queries.

mod lists;

use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use bw_core::hide::write_stylesheet;
use bw_core::matcher::{EngineConfig, Matcher};
use bw_core::stats::MatchStats;
use bw_core::types::{ConstraintMatching, Verdict};

/// Placeholder returned for blocked requests.
const BLOCKED_URL: &str = "about:blank";

#[derive(Parser)]
#[command(name = "bw-cli")]
#[command(about = "Blockwise request filter and element hiding tools")]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineArgs {
    /// Filter list files
    #[arg(short, long = "rules", required = true)]
    rules: Vec<String>,

    /// Number of match results to cache
    #[arg(long, default_value_t = 50_000)]
    cache: usize,

    /// Match $domain= constraints against parent domains too
    #[arg(long)]
    hierarchical_domains: bool,

    /// Skip merging element hide entries by scope
    #[arg(long)]
    no_merge: bool,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            cache_capacity: self.cache,
            constraint_matching: if self.hierarchical_domains {
                ConstraintMatching::Hierarchical
            } else {
                ConstraintMatching::Exact
            },
            merge_hides_by_scope: !self.no_merge,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a single request would be blocked
    Check {
        /// Source page (URL or domain)
        src: String,
        /// Requested URL
        url: String,
    },

    /// Print the element hiding stylesheet for a page domain
    Hide {
        /// Page domain
        domain: String,

        /// Write the stylesheet here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Stylesheet to append after the generated rules
        #[arg(long)]
        user_stylesheet: Option<String>,
    },

    /// Filter "<src> <url>" lines from stdin, printing the URL or about:blank
    Filter,

    /// Show rule list statistics
    Info,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = run(&cli);

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    // stdout carries the stylesheet or the filter replies
    let mut stderr = io::stderr();
    let status = cli.verbose.then_some(&mut stderr as &mut dyn Write);
    let (matcher, report) = lists::load_matcher(&cli.engine.rules, cli.engine.config(), status)?;

    match &cli.command {
        Commands::Check { src, url } => cmd_check(&matcher, src, url, cli.json),
        Commands::Hide {
            domain,
            output,
            user_stylesheet,
        } => cmd_hide(&matcher, domain, output.as_deref(), user_stylesheet.as_deref()),
        Commands::Filter => cmd_filter(matcher, cli.verbose),
        Commands::Info => cmd_info(&matcher, &report, cli.json),
    }
}

#[derive(Serialize)]
struct CheckOutput<'a> {
    src: &'a str,
    url: &'a str,
    blocked: bool,
    verdict: &'static str,
    rule: Option<&'a str>,
}

fn cmd_check(matcher: &Matcher, src: &str, url: &str, json: bool) -> Result<(), String> {
    let verdict = matcher.match_request(src, url);

    if json {
        let output = CheckOutput {
            src,
            url,
            blocked: verdict.is_blocked(),
            verdict: match verdict {
                Verdict::Allowed => "allowed",
                Verdict::Blocked(_) => "blocked",
                Verdict::ExceptedBy(_) => "excepted",
            },
            rule: verdict.rule().map(|r| r.text.as_str()),
        };
        let text = serde_json::to_string_pretty(&output).map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{}", text);
    } else {
        println!("{}: {}", url, verdict);
    }

    Ok(())
}

fn cmd_hide(matcher: &Matcher, domain: &str, output: Option<&str>, user_stylesheet: Option<&str>) -> Result<(), String> {
    let entries = matcher.hide_entries(domain);
    log::debug!("{} hide entries for {}", entries.len(), domain);

    let mut writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path).map_err(|e| format!("Failed to create '{}': {}", path, e))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    write_stylesheet(&mut writer, entries).map_err(|e| format!("Failed to write stylesheet: {}", e))?;

    if let Some(path) = user_stylesheet {
        let extra = fs::read(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
        writer
            .write_all(&extra)
            .map_err(|e| format!("Failed to write stylesheet: {}", e))?;
    }

    writer.flush().map_err(|e| format!("Failed to write stylesheet: {}", e))
}

fn cmd_filter(matcher: Matcher, verbose: bool) -> Result<(), String> {
    let stats = Arc::new(MatchStats::new());
    let matcher = matcher.with_observer(stats.clone());

    let stdin = io::stdin();
    let mut out = BufWriter::new(io::stdout().lock());

    for line in stdin.lock().lines() {
        let line = line.map_err(|e| format!("Failed to read stdin: {}", e))?;
        let mut parts = line.split_whitespace();
        let (src, url) = match (parts.next(), parts.next()) {
            (Some(src), Some(url)) => (src, url),
            (Some(url), None) => ("", url),
            _ => continue,
        };

        let reply = if matcher.matches(src, url) { BLOCKED_URL } else { url };
        writeln!(out, "{}", reply).map_err(|e| format!("Failed to write stdout: {}", e))?;
    }

    out.flush().map_err(|e| format!("Failed to write stdout: {}", e))?;

    if verbose {
        eprintln!("{}", stats.snapshot());
    }
    Ok(())
}

fn cmd_info(matcher: &Matcher, report: &lists::LoadReport, json: bool) -> Result<(), String> {
    if json {
        let text = serde_json::to_string_pretty(report).map_err(|e| format!("Failed to encode JSON: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    let index = matcher.index();
    println!("Rule lists:   {}", report.lists);
    println!("  Lines:      {}", report.load.lines);
    println!("  Rejected:   {}", report.load.rejected);
    println!("  Time:       {:.1}ms", report.total_ms);
    println!();
    println!("Rules:");
    println!("  Block:      {} ({} keyword buckets)", index.block().len(), index.block().bucket_count());
    println!("  Exception:  {} ({} keyword buckets)", index.exception().len(), index.exception().bucket_count());
    println!("  No keyword: {} (checked on every request)", index.blank_count());
    println!();
    println!("Element hiding:");
    println!("  Rules:      {}", report.load.hides);
    match report.hides {
        Some(h) => println!("  Entries:    {} (merged from {})", h.after, h.before),
        None => println!("  Entries:    {}", index.hides().len()),
    }
    println!();
    println!("Cache capacity: {}", matcher.cache().capacity());

    Ok(())
}
