use crate::cli::{Cli, Commands, EncodeArgs, PresetAction};
use anyhow::{Context, Result};
use hardsub::config::Config;
use hardsub::engine::{
    self, BatchRunner, Capabilities, ConversionOptions, JobEvent, JobLog, JobOutcome, JobRunner,
    Preset, PresetBuilder, PresetCatalog, Watermark,
};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Encoder lines kept for the failure report
const LOG_TAIL_LINES: usize = 15;

/// Exit status used when a job was cancelled (as for SIGINT)
const EXIT_CANCELLED: i32 = 130;

pub fn run(cli: Cli) {
    let config_path = match cli.config.clone().map(Ok).unwrap_or_else(Config::config_path) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Encode {
            input,
            output,
            subtitle,
            no_subtitle,
            options,
        } => handle_encode(&config_path, input, output, subtitle, no_subtitle, options, cli.verbose),
        Commands::Batch {
            paths,
            output_dir,
            no_subtitle,
            options,
        } => handle_batch(&config_path, paths, output_dir, no_subtitle, options, cli.verbose),
        Commands::Probe { file } => handle_probe(&config_path, &file),
        Commands::Check => handle_check(&config_path),
        Commands::Presets { action } => handle_presets(&config_path, action),
        Commands::InitConfig => handle_init_config(&config_path),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

// ============================================================================
// Option resolution
// ============================================================================

/// Settings shared by every job of one invocation: CLI flags over config values
struct JobSettings {
    preset: engine::QualityPreset,
    watermark: Option<Watermark>,
    audio_track: Option<u32>,
    use_hardware_accel: bool,
    copy_audio: bool,
    preserve_metadata: bool,
}

impl JobSettings {
    fn resolve(config: &Config, catalog: &PresetCatalog, args: &EncodeArgs) -> Result<Self> {
        let preset_name = args.preset.as_deref().unwrap_or(&config.last_preset);
        let preset = catalog
            .find(preset_name)
            .with_context(|| {
                let names: Vec<String> =
                    catalog.list().iter().map(|p| p.name().to_string()).collect();
                format!(
                    "Unknown preset '{}' (available: {})",
                    preset_name,
                    names.join(", ")
                )
            })?
            .resolve();

        let watermark = if args.no_watermark {
            None
        } else {
            let text = args.watermark.as_deref().unwrap_or(&config.watermark_text);
            Some(text)
                .filter(|t| !t.trim().is_empty())
                .map(|t| {
                    Watermark::new(t)
                        .with_position(args.position.unwrap_or(config.watermark_position))
                        .with_font_size(args.font_size.unwrap_or(config.watermark_size))
                })
        };

        let audio_track = if args.all_audio {
            None
        } else {
            args.audio_track.or(config.audio_track)
        };

        let use_hardware_accel = if args.no_hw {
            false
        } else {
            args.hw || config.use_hardware_accel
        };

        Ok(Self {
            preset,
            watermark,
            audio_track,
            use_hardware_accel,
            copy_audio: if args.reencode_audio {
                false
            } else {
                args.copy_audio || config.copy_audio
            },
            preserve_metadata: if args.metadata {
                true
            } else {
                !args.no_metadata && config.preserve_metadata
            },
        })
    }

    fn options_for(&self, input: PathBuf, output: PathBuf, subtitle: Option<PathBuf>) -> ConversionOptions {
        let mut opts = ConversionOptions::new(input, output, self.preset.clone());
        opts.subtitle_path = subtitle;
        opts.watermark = self.watermark.clone();
        opts.audio_track_index = self.audio_track;
        opts.use_hardware_accel = self.use_hardware_accel;
        opts.copy_audio = self.copy_audio;
        opts.preserve_metadata = self.preserve_metadata;
        opts
    }

    /// Store this run's choices as the new "last used" values
    fn remember(&self, config: &mut Config, args: &EncodeArgs) {
        config.last_preset = self.preset.name.clone();
        if let Some(text) = &args.watermark {
            config.watermark_text = text.clone();
        }
        if let Some(watermark) = &self.watermark {
            config.watermark_position = watermark.position;
            config.watermark_size = watermark.font_size;
        }
        config.use_hardware_accel = self.use_hardware_accel;
        config.copy_audio = self.copy_audio;
        config.preserve_metadata = self.preserve_metadata;
        config.audio_track = self.audio_track;
    }
}

/// Loaded settings and whether they may be written back
struct Settings {
    config: Config,
    writable: bool,
}

impl Settings {
    /// Never fails. A file that could not be read in full is left untouched on disk.
    fn load(path: &Path) -> Self {
        match Config::load_lenient(path) {
            Ok((config, writable)) => Self { config, writable },
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Self {
                    config: Config::default(),
                    writable: false,
                }
            }
        }
    }

    fn save_quietly(&self, path: &Path) {
        if !self.writable {
            warn!(
                "Not saving settings: {} has entries that could not be read",
                path.display()
            );
            return;
        }
        if let Err(e) = self.config.save_to(path) {
            warn!("Could not save settings: {:#}", e);
        }
    }
}

fn encoder_program(caps: &Capabilities, dry_run: bool) -> Result<PathBuf> {
    match engine::require_encoder(caps) {
        Ok(path) => Ok(path.to_path_buf()),
        // A dry run can still show the command
        Err(_) if dry_run => Ok(PathBuf::from("ffmpeg")),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Console reporting
// ============================================================================

struct ConsoleReporter {
    log: Option<JobLog>,
    tail: VecDeque<String>,
    verbose: bool,
    last_percent: Option<u8>,
}

impl ConsoleReporter {
    fn new(log_file: Option<&Path>, verbose: bool) -> Result<Self> {
        let log = log_file.map(JobLog::open).transpose()?;
        Ok(Self {
            log,
            tail: VecDeque::with_capacity(LOG_TAIL_LINES),
            verbose,
            last_percent: None,
        })
    }

    /// Append to the log file; after the first write error the file is dropped
    fn note(&mut self, message: &str) {
        let Some(log) = self.log.as_mut() else {
            return;
        };
        if let Err(e) = log.write_line(message) {
            warn!("No longer logging to {}: {:#}", log.path().display(), e);
            self.log = None;
        }
    }

    fn on_event(&mut self, label: &str, event: &JobEvent) {
        match event {
            JobEvent::Progress { percent, .. } => {
                if self.last_percent != Some(*percent) {
                    self.last_percent = Some(*percent);
                    eprint!("\r{} {:>3}%", label, percent);
                    let _ = std::io::stderr().flush();
                }
            }
            JobEvent::Log { line, .. } => {
                if self.verbose {
                    eprintln!("\r{}", line);
                }
                if self.tail.len() == LOG_TAIL_LINES {
                    self.tail.pop_front();
                }
                self.tail.push_back(line.clone());
                self.note(line);
            }
            JobEvent::Finished { outcome, .. } => {
                if self.last_percent.is_some() {
                    eprintln!();
                }
                self.last_percent = None;
                self.note(&format!("{} {}", label, outcome));
                if matches!(outcome, JobOutcome::Failed { .. } | JobOutcome::LaunchFailed { .. })
                    && !self.verbose
                {
                    for line in self.tail.drain(..) {
                        eprintln!("  | {}", line);
                    }
                }
                self.tail.clear();
            }
        }
    }
}

/// First Ctrl+C cancels the running work, a second one exits immediately
fn install_interrupt_handler<F>(on_interrupt: F) -> Result<()>
where
    F: Fn() + Send + 'static,
{
    let interrupted = AtomicBool::new(false);
    ctrlc::set_handler(move || {
        if interrupted.swap(true, Ordering::SeqCst) {
            process::exit(EXIT_CANCELLED);
        }
        eprintln!("\nCancelling, press Ctrl+C again to quit immediately");
        on_interrupt();
    })
    .context("Failed to set Ctrl+C handler")
}

fn exit_code_for(outcome: &JobOutcome) -> i32 {
    match outcome {
        JobOutcome::Succeeded { .. } => 0,
        JobOutcome::Cancelled => EXIT_CANCELLED,
        JobOutcome::Failed { .. } | JobOutcome::LaunchFailed { .. } => 1,
    }
}

// ============================================================================
// Handlers
// ============================================================================

fn handle_encode(
    config_path: &Path,
    input: PathBuf,
    output: Option<PathBuf>,
    subtitle: Option<PathBuf>,
    no_subtitle: bool,
    args: EncodeArgs,
    verbose: bool,
) -> Result<i32> {
    let mut stored = Settings::load(config_path);
    let caps = Capabilities::detect(stored.config.encoder_path.as_deref());
    let settings = JobSettings::resolve(&stored.config, &stored.config.catalog(), &args)?;

    let subtitle = if no_subtitle {
        None
    } else if let Some(path) = subtitle {
        if !path.is_file() {
            warn!("Subtitle {} not found, encoding without it", path.display());
        }
        Some(path)
    } else if stored.config.auto_detect_subtitle {
        engine::detect_subtitle(&input)
    } else {
        None
    };

    let output = output.unwrap_or_else(|| engine::derive_output_path(&input));
    let opts = settings.options_for(input, output, subtitle);
    engine::validate_options(&opts)?;

    let program = encoder_program(&caps, args.dry_run)?;
    let command = engine::build_encode_cmd(&caps, &opts);

    if args.dry_run {
        println!("{}", command.display(&program));
        return Ok(0);
    }

    settings.remember(&mut stored.config, &args);
    stored.config.last_video_dir = opts.input_path.parent().map(Path::to_path_buf);
    stored.config.last_output_dir = opts.output_path.parent().map(Path::to_path_buf);
    stored.save_quietly(config_path);

    println!(
        "Encoding {} with preset '{}' ({})",
        opts.input_path.display(),
        opts.preset.name,
        command.encoder_label()
    );
    if let Some(subtitle) = &opts.subtitle_path {
        println!("Subtitle: {}", subtitle.display());
    }

    let mut reporter = ConsoleReporter::new(args.log_file.as_deref(), verbose)?;
    reporter.note(&command.display(&program));

    let (runner, events) = JobRunner::with_channel();
    let interrupt = runner.clone();
    install_interrupt_handler(move || interrupt.cancel())?;
    if let Err(e) = runner.start(&program, &command.args, &opts.output_path) {
        // Only possible when Ctrl+C landed first; the outcome is already queued
        debug!("Job not started: {}", e);
    }
    let outcome = engine::wait_for_outcome(&events, |event| reporter.on_event("Progress", event));
    runner.join();

    println!("{}", outcome);
    Ok(exit_code_for(&outcome))
}

fn handle_batch(
    config_path: &Path,
    paths: Vec<PathBuf>,
    output_dir: Option<PathBuf>,
    no_subtitle: bool,
    args: EncodeArgs,
    verbose: bool,
) -> Result<i32> {
    let mut stored = Settings::load(config_path);
    let caps = Capabilities::detect(stored.config.encoder_path.as_deref());
    let settings = JobSettings::resolve(&stored.config, &stored.config.catalog(), &args)?;

    let inputs = engine::collect_inputs(&paths)?;
    if inputs.is_empty() {
        println!("No video files found");
        return Ok(0);
    }

    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let subtitle = if no_subtitle || !stored.config.auto_detect_subtitle {
            None
        } else {
            engine::detect_subtitle(&input)
        };
        let output = match &output_dir {
            Some(dir) => engine::derive_output_path_in(&input, dir),
            None => engine::derive_output_path(&input),
        };
        let opts = settings.options_for(input, output, subtitle);
        engine::validate_options(&opts)?;
        jobs.push(opts);
    }

    let program = encoder_program(&caps, args.dry_run)?;
    if args.dry_run {
        for opts in &jobs {
            println!("{}", engine::build_encode_cmd(&caps, opts).display(&program));
        }
        return Ok(0);
    }

    if let Some(dir) = &output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    settings.remember(&mut stored.config, &args);
    stored.config.last_video_dir = jobs[0].input_path.parent().map(Path::to_path_buf);
    stored.config.last_output_dir = jobs[0].output_path.parent().map(Path::to_path_buf);
    stored.save_quietly(config_path);

    let total = jobs.len();
    let names: Vec<String> = jobs
        .iter()
        .map(|j| j.input_path.display().to_string())
        .collect();
    let mut reporter = ConsoleReporter::new(args.log_file.as_deref(), verbose)?;
    let mut current = None;

    let batch = BatchRunner::new(program, caps);
    let interrupt = batch.cancel_handle();
    install_interrupt_handler(move || interrupt.cancel())?;

    let summary = batch.run(jobs, |position, event| {
        let label = format!("[{}/{}]", position + 1, total);
        if current != Some(position) {
            current = Some(position);
            eprintln!("{} {}", label, names[position]);
            reporter.note(&format!("{} {}", label, names[position]));
        }
        reporter.on_event(&label, event);
    });

    println!("\nBatch summary:");
    for item in &summary.items {
        println!("  {} -> {}", item.input_path.display(), item.outcome);
    }
    if summary.skipped > 0 {
        println!("  {} file(s) not started", summary.skipped);
    }
    println!(
        "{} succeeded, {} failed of {}",
        summary.succeeded(),
        summary.failed(),
        total
    );

    Ok(if summary.was_cancelled() {
        EXIT_CANCELLED
    } else if summary.failed() > 0 {
        1
    } else {
        0
    })
}

fn handle_probe(config_path: &Path, file: &Path) -> Result<i32> {
    let config = Config::load_or_default(config_path);
    let caps = Capabilities::detect(config.encoder_path.as_deref());
    let prober = caps
        .prober_path
        .as_deref()
        .context("ffprobe was not found; install ffmpeg or set encoder_path in the config")?;

    let tracks = engine::probe_audio_tracks(prober, file);
    if tracks.is_empty() {
        println!("No audio tracks found in {}", file.display());
        return Ok(1);
    }

    for track in &tracks {
        println!("{}", track.title());
    }
    Ok(0)
}

fn handle_check(config_path: &Path) -> Result<i32> {
    let config = Config::load_or_default(config_path);
    let caps = Capabilities::detect(config.encoder_path.as_deref());

    println!(
        "NVENC / CUDA: {}",
        if caps.hw_accel { "available" } else { "not available" }
    );
    println!(
        "Video encoder: {}",
        caps.encoder_for(config.use_hardware_accel).display_name()
    );

    let mut ok = true;
    for (name, path) in [("ffmpeg", &caps.encoder_path), ("ffprobe", &caps.prober_path)] {
        match path {
            Some(path) => match engine::binary_version(path) {
                Ok(version) => println!("{}: {} ({})", name, path.display(), version),
                Err(e) => {
                    ok = false;
                    println!("{}: {} (not runnable: {:#})", name, path.display(), e);
                }
            },
            None => {
                ok = false;
                println!("{}: not found", name);
            }
        }
    }

    match &caps.font_path {
        Some(font) => println!("Watermark font: {}", font.display()),
        None => println!("Watermark font: none found (drawtext default)"),
    }

    Ok(if ok { 0 } else { 1 })
}

fn handle_presets(config_path: &Path, action: PresetAction) -> Result<i32> {
    let (mut config, complete) = Config::load_lenient(config_path)?;
    if !complete && !matches!(action, PresetAction::List) {
        anyhow::bail!(
            "{} has entries that could not be read; fix it before changing presets",
            config_path.display()
        );
    }
    let mut catalog = config.catalog();

    match action {
        PresetAction::List => {
            for preset in catalog.list() {
                match &preset {
                    Preset::BuiltIn(builtin) => {
                        println!("[built-in] {}", preset.summary());
                        println!("           {}", builtin.description);
                    }
                    Preset::Custom(_) => println!("[  custom] {}", preset.summary()),
                }
            }
        }
        PresetAction::Add {
            name,
            bitrate,
            maxrate,
            bufsize,
            speed,
            resolution,
            audio_bitrate,
        } => {
            let preset = PresetBuilder::new(name)
                .bitrate(bitrate)
                .maxrate(maxrate.unwrap_or_default())
                .bufsize(bufsize.unwrap_or_default())
                .speed(speed)
                .resolution(resolution)
                .audio_bitrate(audio_bitrate.unwrap_or_default())
                .build()?;
            let name = preset.name.clone();
            let replaced = catalog.add(preset);

            config.set_catalog(&catalog);
            config.save_to(config_path)?;
            println!(
                "{} preset '{}'",
                if replaced { "Replaced" } else { "Added" },
                name
            );
        }
        PresetAction::Remove { name } => {
            if catalog.find(&name).is_some_and(|p| p.is_builtin()) {
                anyhow::bail!("'{}' is a built-in preset and cannot be removed", name);
            }
            if !catalog.remove(&name) {
                anyhow::bail!("No custom preset named '{}'", name);
            }
            config.set_catalog(&catalog);
            config.save_to(config_path)?;
            println!("Removed preset '{}'", name);
        }
    }

    Ok(0)
}

fn handle_init_config(config_path: &Path) -> Result<i32> {
    if config_path.exists() {
        let cfg = Config::load_from(config_path)?;
        println!("Config loaded successfully from {}", config_path.display());
        println!("{:#?}", cfg);
    } else {
        Config::ensure_default(config_path)?;
        println!("Default config saved to {}", config_path.display());
    }
    Ok(0)
}
