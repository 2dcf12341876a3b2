use anyhow::Context;
use chatkeys::{
    actuator::{bundled_script_path, Actuator, NullActuator, ProcessActuator},
    api::youtube::{ApiKey, QuotaCounter, YoutubeTransport},
    app::{
        display::show_error, startup, ConsoleSink, Dispatcher, DisplaySink, Pipeline, Session,
        StdinInput,
    },
    engine::{PollerConfig, ScanOptions},
    io::{init_logging, AppSettings, SettingsManager},
};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// YouTube live chat keyword detector
#[derive(Parser, Debug)]
#[command(name = "chatkeys", version, about = "Presses keys when live chat spells out keywords")]
struct Args {
    /// Video id or URL of the live stream
    #[arg(long)]
    video: Option<String>,

    /// Keyword file, relative to the keyword directory unless absolute
    #[arg(long)]
    keywords: Option<String>,

    /// Desired delay between fetches in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Messages requested per fetch
    #[arg(long)]
    max_results: Option<usize>,

    /// Let the first character of longer messages count
    #[arg(short = 'a', long)]
    any_message: bool,

    /// Let a whole message spell a word at once
    #[arg(short = 'c', long)]
    full_messages: bool,

    /// Do not write a log file
    #[arg(short = 'l', long)]
    no_logging: bool,

    /// Run without starting the actuator process
    #[arg(short = 'n', long)]
    no_actuator: bool,

    /// Actuator script to run instead of the bundled one
    #[arg(short = 'p', long)]
    actuator_script: Option<PathBuf>,

    /// Python interpreter used to run the actuator
    #[arg(long)]
    python: Option<String>,
}

impl Args {
    fn apply_to(&self, settings: &mut AppSettings) {
        if let Some(delay_ms) = self.delay_ms {
            settings.delay_ms = delay_ms;
        }
        if let Some(max_results) = self.max_results {
            settings.max_results = max_results;
        }
        if let Some(script) = &self.actuator_script {
            settings.actuator_script = Some(script.clone());
        }
        if let Some(python) = &self.python {
            settings.python = python.clone();
        }
    }

    fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            any_message: self.any_message,
            full_messages: self.full_messages,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Args::parse()).await {
        // -1 becomes 255
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!("❌ {:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(255)
        }
    }
}

async fn start_actuator(
    args: &Args,
    settings: &AppSettings,
) -> anyhow::Result<(Arc<dyn Actuator>, Option<mpsc::Receiver<String>>)> {
    if args.no_actuator {
        tracing::info!("🔇 Actuator disabled");
        return Ok((Arc::new(NullActuator), None));
    }

    let script = settings
        .actuator_script
        .clone()
        .unwrap_or_else(bundled_script_path);
    let (actuator, status) = ProcessActuator::launch(&settings.python, &script, settings.tts_wpm)
        .await
        .with_context(|| format!("Failed to start actuator script {}", script.display()))?;

    Ok((Arc::new(actuator), Some(status)))
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let manager = SettingsManager::new()?;
    if !manager.exists() {
        let path = manager.create_default()?;
        println!("Created settings file: {}", path.display());
        println!("Add your YouTube Data API key to it and start chatkeys again.");
        return Ok(0);
    }

    let mut settings = manager.load()?;
    args.apply_to(&mut settings);

    let log_dir = manager.log_dir(&settings);
    let _log_guard = init_logging(&settings.log, &log_dir, !args.no_logging)?;
    settings.validate()?;

    tracing::info!("🎬 Starting chatkeys");

    let sink: Arc<dyn DisplaySink> = Arc::new(ConsoleSink);
    let mut input = StdinInput::new();

    let (actuator, actuator_status) = start_actuator(&args, &settings).await?;

    let keyword_dir = manager.keyword_dir(&settings);
    std::fs::create_dir_all(&keyword_dir).with_context(|| {
        format!("Failed to create keyword directory: {}", keyword_dir.display())
    })?;
    let Some((keyword_path, keywords)) =
        startup::choose_keywords(&mut input, sink.as_ref(), &keyword_dir, args.keywords.clone())
            .await
    else {
        return Ok(0);
    };

    let quota = QuotaCounter::default();
    let api_key = ApiKey::new(settings.api_key.clone());
    let mut requested_video = args.video.clone();
    let transport = loop {
        let Some(video_id) =
            startup::choose_video(&mut input, sink.as_ref(), requested_video.take()).await
        else {
            return Ok(0);
        };
        match YoutubeTransport::connect(
            api_key.clone(),
            video_id,
            settings.max_results,
            quota.clone(),
        )
        .await
        {
            Ok(transport) => break transport,
            Err(e) => show_error(sink.as_ref(), &format!("Could not open live chat: {}", e)),
        }
    };

    println!();
    println!(
        "{} {} with {}",
        "Reading chat of".bold(),
        transport.video_id.to_string().as_str().cyan(),
        keyword_path.display()
    );
    println!("Type 'help' for a list of commands.");
    println!();

    let session = Session {
        sink: Arc::clone(&sink),
        keyword_dir,
        video_id: transport.video_id.clone(),
        live_chat_id: transport.live_chat_id.clone(),
        quota,
        pipeline: Pipeline::start(
            Arc::new(transport),
            keywords,
            args.scan_options(),
            PollerConfig {
                desired_delay: Duration::from_millis(settings.delay_ms),
                max_results: settings.max_results,
            },
            Dispatcher::new(actuator, Arc::clone(&sink)),
        ),
        actuator_status,
    };

    let code = session.run(&mut input).await;
    tracing::info!("👋 chatkeys shutting down (exit code {})", code);
    Ok(code)
}
