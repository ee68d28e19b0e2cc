use anyhow::{Context, Result};
use clap::Parser;
use gemini_client::GeminiClient;
use std::io::BufReader;
use storytime_core::session::StorySession;
use storytime_native_utils::device::get_available_outputs;
use storytime_native_utils::player::CpalOutput;
use storytime_service::cli::Cli;
use storytime_service::config::Config;
use storytime_service::gemini_adapter::GeminiAdapter;
use storytime_service::input::{self, spawn_line_reader};
use storytime_service::prompt_loader::StoryPrompts;
use storytime_service::view::{self, StoryView};
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();
    if args.list_devices {
        println!("Output devices:");
        println!("{}", get_available_outputs()?);
        return Ok(());
    }

    // --- 2. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Configuration loaded successfully. Starting storyteller...");

    // --- 4. Load Prompts ---
    let prompts_dir = args.prompts.unwrap_or(config.prompts_dir);
    let prompts = StoryPrompts::load(&prompts_dir, &config.hero)
        .context("Failed to load story prompts")?;
    tracing::info!("Loaded story prompts from {}.", prompts_dir.display());

    // --- 5. Initialize API Clients ---
    let client = GeminiClient::new(config.gemini_api_key).with_base_url(&config.api_base);
    let adapter = GeminiAdapter::new(
        client,
        prompts,
        &config.story_model,
        &config.speech_model,
        &config.voice,
    );

    // --- 6. Open Audio Output ---
    // A missing output is not fatal here; the session reports it when a story is requested.
    let device = args.device.or(config.output_device);
    let audio = match CpalOutput::open(device) {
        Ok(output) => Some(output),
        Err(e) => {
            tracing::error!("Failed to open audio output: {:?}", e);
            None
        }
    };

    // --- 7. Session Setup ---
    let mut session = StorySession::new(adapter.clone(), adapter, audio);
    if let Some(settings) = config.settings {
        session = session.with_settings(settings);
    }
    let mut events = session.subscribe();

    let mut story_view = StoryView::new(&config.hero);
    for line in story_view.title() {
        println!("{line}");
    }
    println!("{}", view::START_ACTION);

    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            for line in story_view.apply(&event) {
                println!("{line}");
            }
        }
    });

    // --- 8. Run ---
    let lines = spawn_line_reader(BufReader::new(std::io::stdin()))
        .context("Failed to spawn stdin reader")?;
    tokio::select! {
        () = input::run(&mut session, lines) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down."),
    }

    drop(session);
    renderer.await.context("Renderer task failed")?;
    tracing::info!("Goodbye!");
    Ok(())
}
