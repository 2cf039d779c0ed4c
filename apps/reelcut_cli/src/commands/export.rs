//! Export a clip through the full pipeline.

use std::io::Write;
use std::sync::Arc;

use reelcut_core::config::ExportConfig;
use reelcut_core::estimate::estimate_file_size;
use reelcut_core::types::{
    Adjustment, FrameRate, ParameterSet, TextAnimation, TextOverlay, Trim,
};
use reelcut_render::engine::{FfmpegEngine, MediaEngine};
use reelcut_render::export::{ExportOrchestrator, SourceVideo};
use reelcut_render::memory::MemoryEngine;
use reelcut_render::probe::probe_source;
use reelcut_render::session::EngineSession;
use tokio::sync::broadcast;

use crate::ExportArgs;

pub async fn run(args: ExportArgs, config: &ExportConfig) -> anyhow::Result<()> {
    let duration = match args.duration {
        Some(d) => Some(d),
        None if args.dry_run || args.print_command => None,
        None => match probe_source(&args.input, &config.engine.ffprobe_bin).await {
            Ok(meta) if meta.duration_secs > 0.0 => Some(meta.duration_secs),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(input = %args.input.display(), error = %e, "could not probe source duration");
                None
            }
        },
    };

    let params = build_params(&args, config, duration)?;
    let mut source = SourceVideo::from_path(&args.input)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {e}", args.input.display()))?;
    source.duration_secs = duration;

    if args.dry_run {
        export_with(MemoryEngine::new(), &args, &source, &params).await
    } else {
        export_with(FfmpegEngine::new(&config.engine), &args, &source, &params).await
    }
}

fn build_params(
    args: &ExportArgs,
    config: &ExportConfig,
    duration: Option<f64>,
) -> anyhow::Result<ParameterSet> {
    let end = args
        .end
        .or(duration)
        .ok_or_else(|| anyhow::anyhow!("--end is required when the source duration is unknown"))?;

    let fps = match args.fps {
        Some(fps) => FrameRate::try_from(fps)?,
        None => config.defaults.fps,
    };

    let overlays = match &args.text {
        Some(text) => {
            let mut overlay = TextOverlay::new(text.clone());
            overlay.position = args.text_position.into();
            overlay.color = args.text_color.clone();
            overlay.font_size = args.text_size;
            if args.text_fade_in {
                overlay.animation = TextAnimation::FadeIn;
            }
            vec![overlay]
        }
        None => Vec::new(),
    };

    Ok(ParameterSet {
        trim: Trim::new(args.start, end)?,
        aspect: args.aspect.unwrap_or(config.defaults.aspect),
        fit: args.fit.map_or(config.defaults.fit, Into::into),
        filter: args
            .filter
            .clone()
            .unwrap_or_else(|| config.defaults.filter.clone()),
        adjustment: Adjustment {
            brightness: args.brightness,
            contrast: args.contrast,
            saturation: args.saturation,
            vibrance: args.vibrance,
        },
        quality: args.quality.unwrap_or(config.defaults.quality),
        format: args.format.unwrap_or(config.defaults.format),
        fps,
        overlays,
    })
}

async fn export_with<E: MediaEngine>(
    engine: E,
    args: &ExportArgs,
    source: &SourceVideo,
    params: &ParameterSet,
) -> anyhow::Result<()> {
    let orchestrator = ExportOrchestrator::new(Arc::new(EngineSession::new(engine)));

    if args.print_command {
        let command = orchestrator.plan(source, params)?;
        println!("{}", serde_json::to_string_pretty(&command.to_args())?);
        return Ok(());
    }

    println!(
        "Exporting {} [{:.1}s -> {:.1}s] {} ({}) {} {} @ {}fps (est. {})",
        source.name,
        params.trim.start_secs,
        params.trim.end_secs,
        params.aspect,
        params.fit,
        params.quality,
        params.format,
        params.fps,
        estimate_file_size(params.trim.duration_secs(), params.quality)
    );

    let mut rx = orchestrator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    eprint!("\r  {:>3}%  {:<28}", event.percent, event.phase().label());
                    let _ = std::io::stderr().flush();
                    if event.stage.is_terminal() {
                        eprintln!();
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let result = orchestrator.process(source, params).await;
    drop(orchestrator);
    let _ = printer.await;

    match result {
        Ok(artifact) => {
            let path = artifact.write_to(&args.output_dir).await?;
            println!(
                "Wrote {} ({} bytes, {})",
                path.display(),
                artifact.bytes.len(),
                artifact.mime_type
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}
