use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use dubsync::cli::{Cli, Commands, ConfigAction};
use dubsync::config::Config;
use dubsync::diagnostics::check_dependencies;
use dubsync::job::{DubJob, JobContext, JobReport};
use dubsync::media::FfmpegTool;
use dubsync::services::{CommandSynthesizer, Passthrough, Translator};
use dubsync::sync::TempoAligner;
use dubsync::timeline::SegmentState;
use dubsync::transcript::SrtFile;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Options of the `dub` command that override the config file.
struct DubOverrides {
    job_id: Option<String>,
    target: Option<String>,
    output_dir: Option<PathBuf>,
    attenuation: Option<f32>,
    concurrency: Option<usize>,
    synth_timeout: Option<u64>,
    keep_temp: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match cli.command {
        Commands::Dub {
            video,
            transcript,
            job_id,
            target,
            output_dir,
            attenuation,
            concurrency,
            synth_timeout,
            keep_temp,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let overrides = DubOverrides {
                job_id,
                target,
                output_dir,
                attenuation,
                concurrency,
                synth_timeout,
                keep_temp,
            };
            let report = run_dub(config, &video, &transcript, overrides).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if !cli.quiet {
                print_report(&report, cli.verbose);
            }
        }
        Commands::Align { slot, clip } => {
            let config = load_config(cli.config.as_deref())?;
            let ctx = JobContext::from_config("align", &config)?;
            let factor = TempoAligner::new(ctx.tempo).align(slot, clip);
            println!("{factor:.4}");
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            if !check_dependencies(&config) {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "dubsync",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over the verbosity flags.
fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dubsync={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path()?)?
    };

    Ok(config.with_env_overrides())
}

async fn run_dub(
    mut config: Config,
    video: &Path,
    transcript: &Path,
    overrides: DubOverrides,
) -> Result<JobReport> {
    if let Some(target) = overrides.target {
        config.translate.target_language = target;
    }
    if let Some(dir) = overrides.output_dir {
        config.jobs.output_dir = dir;
    }
    if let Some(attenuation) = overrides.attenuation {
        config.audio.attenuation = attenuation;
    }
    if let Some(concurrency) = overrides.concurrency {
        config.jobs.concurrency = concurrency;
    }
    if let Some(secs) = overrides.synth_timeout {
        config.jobs.synth_timeout_secs = secs;
    }
    config.jobs.keep_temp |= overrides.keep_temp;

    let job_id = match overrides.job_id {
        Some(id) => id,
        None => video
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .context("Cannot derive a job id from the video path; pass --job-id")?,
    };
    let ctx = JobContext::from_config(&job_id, &config)?;

    let ffmpeg = Arc::new(FfmpegTool::new(
        config.audio.sample_rate,
        Duration::from_secs(config.jobs.tool_timeout_secs),
    ));
    let synthesizer = Arc::new(CommandSynthesizer::new(
        config.synth.program.clone(),
        config.synth.args.clone(),
        Duration::from_secs(config.jobs.synth_timeout_secs),
    ));
    let translator = build_translator(&config)?;
    let job = DubJob::new(ctx, ffmpeg.clone(), ffmpeg, synthesizer, translator);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling job");
            on_interrupt.cancel();
        }
    });

    let report = job
        .run(video, &SrtFile::new(transcript), &cancel)
        .await
        .with_context(|| format!("Dubbing {} failed", video.display()))?;
    Ok(report)
}

fn build_translator(config: &Config) -> Result<Arc<dyn Translator>> {
    let endpoint = config
        .translate
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    match endpoint {
        #[cfg(feature = "libretranslate")]
        Some(endpoint) => Ok(Arc::new(dubsync::services::LibreTranslate::new(
            endpoint,
            config.translate.api_key.clone(),
            Duration::from_secs(config.translate.timeout_secs),
        )?)),
        #[cfg(not(feature = "libretranslate"))]
        Some(_) => {
            tracing::warn!("built without libretranslate support, speaking source text");
            Ok(Arc::new(Passthrough))
        }
        None => Ok(Arc::new(Passthrough)),
    }
}

fn print_report(report: &JobReport, verbose: u8) {
    println!(
        "{} {}",
        "✓".green(),
        report.output.display().to_string().bold()
    );
    println!(
        "  {} placed, {} silent, {:.1}s dub track",
        report.placed(),
        report.skipped(),
        report.canvas_duration
    );
    if !report.rejected.is_empty() {
        println!(
            "  {} transcript entries dropped for invalid timing: {:?}",
            report.rejected.len(),
            report.rejected
        );
    }

    if verbose == 0 {
        return;
    }
    for segment in &report.segments {
        let tempo = segment
            .tempo_factor
            .map(|f| format!("x{f:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let line = format!(
            "  #{:<4} {:>8.2}s..{:<8.2}s {:>6}  {}",
            segment.index, segment.start, segment.end, tempo, segment.state
        );
        match segment.state {
            SegmentState::Placed => println!("{line}"),
            _ => println!(
                "{}  {}",
                line.yellow(),
                segment.skip_reason.as_deref().unwrap_or_default()
            ),
        }
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let config_path = match custom_path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    match action {
        ConfigAction::Show => {
            let config = Config::load_or_default(&config_path)?.with_env_overrides();
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&config_path, toml::to_string_pretty(&Config::default())?)?;
            println!("Wrote {}", config_path.display());
        }
    }
    Ok(())
}
