use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{SecondsFormat, Utc};
use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use llm_i18n::config::DEFAULT_CONFIG_FILE;
use llm_i18n::history::DEFAULT_HISTORY_FILE;
use llm_i18n::provider::{MockMode, MockProvider};
use llm_i18n::review::DEFAULT_REPORT_FILE;
use llm_i18n::{
    Config, CostSummary, LanguageModel, LanguageSelection, PendingReason, RunSummary, StateStore,
    UsageEstimate, create_provider, estimate_usage, load_history, review_outputs, run_generation,
};
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn config_arg() -> Arg {
    Arg::new("config")
        .long("config")
        .short('c')
        .help("Path to the config file")
        .default_value(DEFAULT_CONFIG_FILE)
}

fn mock_arg() -> Arg {
    Arg::new("mock")
        .long("mock")
        .short('m')
        .help("Use the deterministic mock provider instead of a real model")
        .action(ArgAction::SetTrue)
}

fn format_arg(formats: &'static [&'static str]) -> Arg {
    Arg::new("format")
        .long("format")
        .help("Output format")
        .value_parser(formats.to_vec())
        .default_value("text")
}

fn cli() -> Command {
    Command::new("llm-i18n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Incremental LLM-powered localization")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("generate")
                .about("Generate text for new, changed and missing keys")
                .arg(config_arg())
                .arg(
                    Arg::new("force")
                        .long("force")
                        .short('f')
                        .help("Regenerate every key in every language")
                        .action(ArgAction::SetTrue),
                )
                .arg(mock_arg()),
        )
        .subcommand(
            Command::new("review")
                .about("Review generated text and write a Markdown report")
                .arg(config_arg())
                .arg(
                    Arg::new("language")
                        .long("language")
                        .short('l')
                        .help("Language code to review (e.g. fr-FR)"),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .short('a')
                        .help("Review every target language")
                        .action(ArgAction::SetTrue),
                )
                .group(
                    ArgGroup::new("languages")
                        .args(["language", "all"])
                        .required(true),
                )
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Report file")
                        .default_value(DEFAULT_REPORT_FILE),
                )
                .arg(mock_arg()),
        )
        .subcommand(
            Command::new("stats")
                .about("Show state file statistics")
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("usage")
                .about("Estimate tokens and cost of generating every key from the schemas")
                .arg(config_arg())
                .arg(format_arg(&["text", "json", "markdown"]))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .short('o')
                        .help("Write the report to a file instead of stdout"),
                ),
        )
        .subcommand(
            Command::new("costs")
                .about("Summarize recorded generation costs")
                .arg(config_arg())
                .arg(
                    Arg::new("history")
                        .long("history")
                        .help("History file (defaults to historyPath from the config)"),
                )
                .arg(format_arg(&["text", "json"])),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let result = match matches.subcommand() {
        Some(("generate", sub)) => generate(sub).await,
        Some(("review", sub)) => review(sub).await,
        Some(("stats", sub)) => stats(sub),
        Some(("usage", sub)) => usage(sub),
        Some(("costs", sub)) => costs(sub),
        _ => Ok(()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn std::error::Error>> {
    let path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_FILE);
    Ok(Config::load(Path::new(path))?)
}

fn provider_for(
    config: &Config,
    matches: &ArgMatches,
) -> Result<Box<dyn LanguageModel>, Box<dyn std::error::Error>> {
    if matches.get_flag("mock") {
        return Ok(Box::new(MockProvider::new(MockMode::Suffix)));
    }
    Ok(create_provider(&config.provider)?)
}

async fn generate(matches: &ArgMatches) -> CliResult {
    let config = load_config(matches)?;
    let schemas = config.load_schemas()?;
    let provider = provider_for(&config, matches)?;

    println!(
        "🚀 Generating with {} ({}) for {} schema(s)",
        provider.provider_name(),
        provider.model(),
        schemas.len()
    );
    let summary = run_generation(&config, &schemas, provider.as_ref(), matches.get_flag("force")).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    if summary.is_up_to_date() {
        println!("✨ Everything is up to date ({} entries)", summary.total_entries);
    } else {
        let reason = |r: PendingReason| summary.reasons.get(&r).copied().unwrap_or(0);
        println!(
            "📋 Pending: {} (new {}, changed {}, missing {}, forced {})",
            summary.pending,
            reason(PendingReason::New),
            reason(PendingReason::Changed),
            reason(PendingReason::Missing),
            reason(PendingReason::Forced)
        );
        println!("✅ Generated: {}", summary.generated);
        if summary.failed > 0 {
            println!("❌ Failed: {} (will be retried on the next run)", summary.failed);
        }
        println!(
            "📦 Batches: {} ({} fell back to per-item calls)",
            summary.batches, summary.fallbacks
        );
        for (lang, tally) in &summary.by_language {
            println!(
                "   {}: {} created, {} updated, {} failed, {} tokens",
                lang, tally.created, tally.updated, tally.failed, tally.usage.total
            );
        }
    }
    if summary.orphans_removed > 0 {
        println!("🧹 Orphans removed: {}", summary.orphans_removed);
    }
    if summary.checkpoint_failures > 0 {
        println!("⚠️  State checkpoints failed: {}", summary.checkpoint_failures);
    }
    println!(
        "💾 Files written: {}, unchanged: {}",
        summary.writes.files_written, summary.writes.files_unchanged
    );
}

async fn review(matches: &ArgMatches) -> CliResult {
    let config = load_config(matches)?;
    let schemas = config.load_schemas()?;
    let provider = provider_for(&config, matches)?;

    let selection = match matches.get_one::<String>("language") {
        Some(lang) => LanguageSelection::One(lang.clone()),
        None => LanguageSelection::All,
    };
    println!("🔍 Starting translation review...");
    let report = review_outputs(&schemas, &config.output_dir, &selection, provider.as_ref()).await?;

    for lang in &report.languages {
        println!("📋 {}", lang.language);
        println!("  ✅ Passed: {}", lang.passed());
        println!("  ❌ Failed: {}", lang.failed());
    }

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_FILE));
    let generated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    report.write(&output, &generated_at)?;
    println!("📄 Review report saved to: {}", output.display());
    Ok(())
}

fn stats(matches: &ArgMatches) -> CliResult {
    let config = load_config(matches)?;
    let stats = StateStore::load(&config.state_path).stats();

    println!("📊 State: {}", config.state_path.display());
    println!("   Keys: {}", stats.total_keys);
    println!("   Generated texts: {}", stats.total_texts);
    for (lang, count) in &stats.by_language {
        println!("   {}: {}", lang, count);
    }
    Ok(())
}

fn output_format(matches: &ArgMatches) -> &str {
    matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("text")
}

fn usage(matches: &ArgMatches) -> CliResult {
    let config = load_config(matches)?;
    let schemas = config.load_schemas()?;
    let estimate = estimate_usage(&schemas);

    let rendered = match output_format(matches) {
        "json" => serde_json::to_string_pretty(&estimate)?,
        "markdown" => estimate.render_markdown(&Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        _ => usage_text(&estimate, &config),
    };
    match matches.get_one::<String>("output") {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("✅ Report saved to: {}", path);
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn usage_text(estimate: &UsageEstimate, config: &Config) -> String {
    let rule = "═".repeat(60);
    let mut lines = vec![
        "📊 Usage Estimate".to_string(),
        rule.clone(),
        format!("Total keys:              {}", estimate.total_keys),
        format!("Source words:            {}", estimate.source_words),
        format!("Source characters:       {}", estimate.source_chars),
        format!("Source tokens:           {}", estimate.source_tokens),
        format!("Target languages:        {}", estimate.target_languages.join(", ")),
        format!("Total translations:      {}", estimate.total_translations),
        format!("Estimated input tokens:  {}", estimate.input_tokens),
        format!("Estimated output tokens: {}", estimate.output_tokens),
        String::new(),
        "💰 Cost estimates (cheapest first)".to_string(),
    ];
    for estimate in &estimate.cost_estimates {
        let configured = estimate.provider == config.provider.provider
            && config.provider.model.as_deref() == Some(estimate.model.as_str());
        lines.push(format!(
            "  {:<8} {:<18} ${:.4}{}",
            estimate.provider,
            estimate.model,
            estimate.cost.total,
            if configured { "  ← configured" } else { "" }
        ));
    }
    lines.push(rule);
    lines.push("💡 Token estimates are approximate and exclude prompt instructions".to_string());
    lines.join("\n")
}

fn costs(matches: &ArgMatches) -> CliResult {
    let path = match matches.get_one::<String>("history") {
        Some(path) => PathBuf::from(path),
        None => {
            let config_path = matches
                .get_one::<String>("config")
                .map(String::as_str)
                .unwrap_or(DEFAULT_CONFIG_FILE);
            match Config::load(Path::new(config_path)) {
                Ok(config) => config.history_path.unwrap_or_else(|| {
                    Path::new(config_path)
                        .parent()
                        .unwrap_or(Path::new(""))
                        .join(DEFAULT_HISTORY_FILE)
                }),
                Err(_) => PathBuf::from(DEFAULT_HISTORY_FILE),
            }
        }
    };

    println!("🔍 Analyzing cost history from: {}", path.display());
    let summary = CostSummary::from_history(&load_history(&path));
    if summary.is_empty() {
        println!("ℹ️  No generation history found. Run `llm-i18n generate` with historyPath set first.");
        return Ok(());
    }
    if output_format(matches) == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("💰 Total cost: ${:.6} USD", summary.total_cost);
    println!("   Generations: {}", summary.total_generations);
    println!("   Keys: {}", summary.total_keys);
    println!("   Tokens: {}", summary.total_tokens);
    println!("🌍 By language");
    for (lang, cost) in by_cost_desc(&summary.by_language) {
        println!("   {:<15} ${:.6}", lang, cost);
    }
    println!("📅 By date");
    for (date, cost) in summary.by_date.iter().rev() {
        println!("   {}  ${:.6}", date, cost);
    }
    println!("🤖 By provider/model");
    for (provider, cost) in by_cost_desc(&summary.by_provider) {
        println!("   {:<30} ${:.6}", provider, cost);
    }
    Ok(())
}

fn by_cost_desc(costs: &BTreeMap<String, f64>) -> Vec<(&String, &f64)> {
    let mut sorted: Vec<_> = costs.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(a.1));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_review_requires_language_selection() {
        assert!(cli().try_get_matches_from(["llm-i18n", "review"]).is_err());
        let matches = cli()
            .try_get_matches_from(["llm-i18n", "review", "--all", "--mock"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert!(sub.get_flag("all"));
        assert_eq!(
            sub.get_one::<String>("output").map(String::as_str),
            Some(DEFAULT_REPORT_FILE)
        );
    }

    #[test]
    fn test_usage_and_costs_formats() {
        let matches = cli()
            .try_get_matches_from(["llm-i18n", "usage", "--format", "markdown", "-o", "report.md"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "usage");
        assert_eq!(output_format(sub), "markdown");
        assert_eq!(sub.get_one::<String>("output").map(String::as_str), Some("report.md"));

        let matches = cli()
            .try_get_matches_from(["llm-i18n", "costs", "--history", "h.json"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(output_format(sub), "text");
        assert!(cli()
            .try_get_matches_from(["llm-i18n", "costs", "--format", "markdown"])
            .is_err());
    }

    #[test]
    fn test_by_cost_desc() {
        let costs = BTreeMap::from([
            ("de".to_string(), 0.5),
            ("fr".to_string(), 2.0),
            ("es".to_string(), 1.0),
        ]);
        let order: Vec<&str> = by_cost_desc(&costs).into_iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["fr", "es", "de"]);
    }

    #[test]
    fn test_verbose_is_global() {
        let matches = cli()
            .try_get_matches_from(["llm-i18n", "generate", "--force", "-v"])
            .unwrap();
        assert!(matches.get_flag("verbose"));
    }
}
