use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use floortalk_backend::{Credentials, GeminiClient, HttpTransport};
use floortalk_clarify::{ClarificationChooser, SelectionSlot};
use floortalk_core::{AppConfig, ClarificationPrompt, LanguageTag};
use floortalk_pipeline::{HistoryLog, Pipeline, RoundOutcome, SpeechSink};
use floortalk_quota::{FileStore, QuotaGovernor, QuotaLimits, SystemClock};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "floortalk", about = "Mandarin/Thai factory-floor translation assistant")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print current quota usage and exit
    #[arg(long)]
    quota: bool,

    /// Override the source language (zh or th)
    #[arg(long)]
    from: Option<LanguageTag>,

    /// Override the target language (zh or th)
    #[arg(long)]
    to: Option<LanguageTag>,
}

/// Reads one line from stdin without blocking the runtime. None on EOF.
async fn read_line() -> Option<String> {
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end().to_string()),
            Err(_) => None,
        }
    })
    .await
    .ok()
    .flatten()
}

/// Presents clarification options on the terminal, in both languages, and
/// waits for a numeric choice. EOF abandons the round.
struct ConsoleChooser;

#[async_trait]
impl ClarificationChooser for ConsoleChooser {
    async fn present(&self, prompt: &ClarificationPrompt, mut slot: SelectionSlot) {
        println!();
        println!("? {}", prompt.question_source);
        println!("? {}", prompt.question_target);
        for (i, option) in prompt.options.iter().enumerate() {
            println!("  {}. {} / {}", i + 1, option.source_label, option.target_label);
        }

        loop {
            print!("select [1-{}]: ", prompt.options.len());
            use std::io::Write;
            let _ = std::io::stdout().flush();

            let Some(line) = read_line().await else {
                // Dropping the slot tells the coordinator nobody will answer.
                return;
            };
            match line.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= prompt.options.len() => {
                    let value = prompt.options[n - 1].resolved_value.clone();
                    if let Err(e) = slot.submit(&value) {
                        tracing::warn!("selection not accepted: {e}");
                    }
                    return;
                }
                _ => println!("enter a number between 1 and {}", prompt.options.len()),
            }
        }
    }
}

/// Terminal stand-in for speech synthesis: prints the sentence that would be
/// spoken, tagged with its locale.
struct ConsoleSink;

#[async_trait]
impl SpeechSink for ConsoleSink {
    async fn speak(&self, text: &str, lang: LanguageTag) {
        println!("[{}] {}", lang.speech_locale(), text);
    }
}

fn build_governor(config: &AppConfig) -> Arc<QuotaGovernor> {
    Arc::new(QuotaGovernor::new(
        Box::new(FileStore::new(&config.quota.state_dir)),
        Box::new(SystemClock),
        QuotaLimits {
            rpm: config.quota.rpm_limit,
            rpd: config.quota.rpd_limit,
        },
    ))
}

fn print_quota(governor: &QuotaGovernor) -> Result<()> {
    let snapshot = governor.evaluate().context("failed to read quota state")?;
    let limits = governor.limits();
    println!(
        "minute: {}/{} used, resets in {}s",
        snapshot.minute_used, limits.rpm, snapshot.minute_reset_in_seconds
    );
    println!("day:    {}/{} used", snapshot.day_used, limits.rpd);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from_file(&cli.config)
        .or_else(|e| {
            // A missing config file is normal on first run; anything else is not.
            if cli.config.exists() {
                Err(e)
            } else {
                Ok(AppConfig::default())
            }
        })
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let env_filter =
        EnvFilter::try_new(&config.general.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let governor = build_governor(&config);

    if cli.quota {
        return print_quota(&governor);
    }

    let from = cli.from.unwrap_or(config.languages.from);
    let to = cli.to.unwrap_or(config.languages.to);
    if from == to {
        anyhow::bail!("source and target language must differ");
    }

    let transport = HttpTransport::new(&config.backend.base_url, &config.backend.model);
    let client = GeminiClient::new(
        Box::new(transport),
        Credentials::from_config(config.backend.api_key.clone()),
        config.backend.temperature,
    );

    let history = config.history.enabled.then(|| {
        HistoryLog::new(
            Box::new(FileStore::new(&config.quota.state_dir)),
            config.history.max_entries,
        )
    });

    let mut pipeline = Pipeline::new(
        Arc::clone(&governor),
        Box::new(client),
        Box::new(ConsoleChooser),
        Box::new(ConsoleSink),
        history,
        from,
        to,
    );

    tracing::info!(
        model = %config.backend.model,
        from = from.code(),
        to = to.code(),
        "floortalk starting"
    );
    println!(
        "{} -> {} | type a sentence, or :quota :swap :history :quit",
        from.display_name(),
        to.display_name()
    );

    loop {
        print!("{}> ", pipeline.from_lang().code());
        use std::io::Write;
        let _ = std::io::stdout().flush();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":q" => break,
            ":quota" => {
                if let Err(e) = print_quota(&governor) {
                    eprintln!("{e:#}");
                }
            }
            ":swap" => {
                pipeline.swap_languages();
                println!(
                    "now translating {} -> {}",
                    pipeline.from_lang().display_name(),
                    pipeline.to_lang().display_name()
                );
            }
            ":history" => {
                let entries = pipeline.history_entries();
                if entries.is_empty() {
                    println!("no history yet");
                }
                for entry in entries {
                    println!(
                        "[{} -> {}] {} | {}",
                        entry.from.code(),
                        entry.to.code(),
                        entry.original,
                        entry.translated
                    );
                }
            }
            text => match pipeline.translate_text(text).await {
                RoundOutcome::Delivered(t) => {
                    if let Some(note) = &t.note {
                        println!("note: {note}");
                    }
                }
                RoundOutcome::Denied(reason) => println!("quota: {reason}"),
                RoundOutcome::NoSpeech => {}
                RoundOutcome::Failed(message) => println!("{message}"),
            },
        }
    }

    tracing::info!("shutting down");
    Ok(())
}
