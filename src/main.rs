mod audio;
mod cli;
mod config;
mod error;
mod pipeline;
mod playback;
mod render;
mod visual;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;

use audio::decode::{self, Mp3FrameDecoder};
use cli::Cli;
use config::Config;
use pipeline::{Pipeline, PipelineReport};
use playback::{CommandSink, NullSink, PlaybackSink};
use render::{ConsumerOptions, FrameConsumer, StatsConsumer, VideoRenderer};
use visual::queue::SharedState;

const DEMO_DEFAULT_SECONDS: f64 = 10.0;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    if cli.input.is_none() && !cli.demo {
        eprintln!("Usage: auralis <input.mp3> [--output video.mp4] [--headless]");
        eprintln!("       auralis --demo [--duration SECONDS] [--output video.mp4]");
        std::process::exit(1);
    }

    let mut config = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };
    apply_cli_overrides(&cli, &mut config);
    config.validate().context("Invalid configuration")?;

    log::info!("auralis - stereo audio analysis visualizer");
    match cli.input {
        Some(ref input) if !cli.demo => log::info!("Input: {}", input.display()),
        _ => log::info!("Input: demo event generator"),
    }
    log::info!(
        "Analysis: N={} hop={} threshold={} dB, max {} peaks, {} FFT",
        config.analysis.fft_size,
        config.analysis.hop_size,
        config.analysis.threshold_db,
        config.analysis.max_peaks,
        config.analysis.fft_backend
    );

    let shared = SharedState::new(config.queue.capacity);
    log::info!(
        "Queue: {} events, {:.2}s lifetime",
        shared.queue.capacity(),
        config.queue.lifetime
    );

    let mut consumer: Box<dyn FrameConsumer> = match cli.output {
        Some(ref output) => {
            log::info!(
                "Output: {} ({}x{} @ {}fps)",
                output.display(),
                config.render.width,
                config.render.height,
                config.render.fps
            );
            let audio = cli.input.as_deref().filter(|_| !cli.demo && !cli.no_audio);
            Box::new(VideoRenderer::new(
                &config.render,
                config.queue.capacity,
                config.queue.lifetime,
                output,
                audio,
            )?)
        }
        None => Box::new(StatsConsumer::new()),
    };

    let duration = cli
        .duration
        .or(cli.demo.then_some(DEMO_DEFAULT_SECONDS))
        .map(Duration::from_secs_f64);
    let options = ConsumerOptions {
        fps: config.render.fps,
        lifetime: config.queue.lifetime,
        duration,
    };

    let report = std::thread::scope(|s| -> Result<Option<PipelineReport>> {
        let producer = s.spawn(|| -> Result<Option<PipelineReport>> {
            match cli.input {
                Some(ref input) if !cli.demo => run_analysis(input, &cli, &config, &shared).map(Some),
                _ => {
                    let mut rng = rand::rngs::StdRng::from_entropy();
                    visual::demo::run_demo_producer(&shared, &mut rng, visual::demo::DEMO_INTERVAL);
                    Ok(None)
                }
            }
        });

        let rendered = render::run_consumer(&shared, consumer.as_mut(), &options, || producer.is_finished());
        let produced = producer
            .join()
            .map_err(|_| anyhow::anyhow!("Producer thread panicked"))?;
        let frames = rendered?;
        log::info!("Rendered {} frames", frames);
        produced
    });

    // The encoder is finalized even when a task failed so the partial video is usable.
    let finished = consumer.finish();
    let report = report.and_then(|report| finished.map(|()| report)).inspect_err(|err| {
        log::error!("{:#}", err);
    })?;

    if let Some(report) = report {
        log::info!(
            "Done: {} frames decoded, {} windows analyzed, {} events pushed",
            report.frames_decoded, report.windows_analyzed, report.events_pushed
        );
    }
    if let Some(ref output) = cli.output {
        log::info!("Output: {}", output.display());
    }
    Ok(())
}

fn run_analysis(input: &Path, cli: &Cli, config: &Config, shared: &SharedState) -> Result<PipelineReport> {
    let data = decode::read_asset(input);

    let sink: Box<dyn PlaybackSink> = if cli.headless {
        Box::new(NullSink::new(!cli.fast))
    } else {
        Box::new(CommandSink::new(
            config.playback.command.clone(),
            config.playback.device.clone(),
        ))
    };
    let mut pipeline = Pipeline::new(
        &config.analysis,
        config.playback.require,
        Mp3FrameDecoder::new(),
        sink,
    )?;

    let pb = ProgressBar::new(data.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    pipeline.run(&data, shared, &pb)
}

/// CLI values win over the config file whenever they differ from their defaults.
fn apply_cli_overrides(cli: &Cli, config: &mut Config) {
    let analysis = &mut config.analysis;
    if cli.fft_size != 1024 { analysis.fft_size = cli.fft_size; }
    if cli.hop_size != 512 { analysis.hop_size = cli.hop_size; }
    if cli.threshold != -50.0 { analysis.threshold_db = cli.threshold; }
    if cli.max_peaks != 10 { analysis.max_peaks = cli.max_peaks; }
    if cli.backend != "radix2" { analysis.fft_backend = cli.backend.clone(); }

    if cli.lifetime != 1.0 { config.queue.lifetime = cli.lifetime; }
    if cli.device.is_some() { config.playback.device = cli.device.clone(); }

    let render = &mut config.render;
    if cli.width != 1000 { render.width = cli.width; }
    if cli.height != 1000 { render.height = cli.height; }
    if cli.fps != 60 { render.fps = cli.fps; }
    if cli.crf != 18 { render.crf = cli.crf; }
    if cli.codec != "libx264" { render.codec = cli.codec.clone(); }
    if cli.pix_fmt != "yuv420p" { render.pix_fmt = cli.pix_fmt.clone(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("auralis").chain(args.iter().copied())).expect("valid args")
    }

    #[test]
    fn default_cli_keeps_config_values() {
        let mut config = config::parse_config("[analysis]\nfft_size = 2048\n[render]\nfps = 30\n")
            .expect("config parses");
        apply_cli_overrides(&parse(&["song.mp3"]), &mut config);
        assert_eq!(config.analysis.fft_size, 2048);
        assert_eq!(config.render.fps, 30);
    }

    #[test]
    fn explicit_cli_values_override_config() {
        let mut config = config::parse_config("[analysis]\nfft_size = 2048\n").expect("config parses");
        let cli = parse(&[
            "song.mp3", "--fft-size", "512", "--hop-size", "256", "--threshold", "-60", "--backend", "rustfft",
        ]);
        apply_cli_overrides(&cli, &mut config);
        assert_eq!(config.analysis.fft_size, 512);
        assert_eq!(config.analysis.hop_size, 256);
        assert_eq!(config.analysis.threshold_db, -60.0);
        assert_eq!(config.analysis.fft_backend, "rustfft");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn input_is_optional_for_demo() {
        let cli = parse(&["--demo", "--duration", "2.5"]);
        assert!(cli.input.is_none());
        assert!(cli.demo);
        assert_eq!(cli.duration, Some(2.5));
    }
}
