use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use story_voices::config::Config;
use story_voices::playback::PlaybackController;
use story_voices::session::{LoadOutcome, StorySession};
use story_voices::{llm, script, server, setup, tts};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM and voice settings.");
            return Err(e);
        }
    };

    let llm: Arc<dyn llm::LlmClient> = Arc::from(llm::create_llm(&config)?);
    let tts: Arc<dyn tts::TtsClient> = Arc::from(tts::create_tts_client(&config)?);
    let parser = script::create_story_parser(&config, llm.clone())?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("serve") => server::serve(config, llm, tts, parser).await,
        Some("play") => {
            let Some(file) = args.get(1) else {
                bail!("Usage: story-voices play <story-file>");
            };
            play(&config, StorySession::new(&config, parser, tts), Path::new(file)).await
        }
        Some(other) => bail!(
            "Unknown command '{}'. Expected 'serve' or 'play <story-file>'",
            other
        ),
    }
}

async fn play(config: &Config, session: StorySession, file: &Path) -> Result<()> {
    let story = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read story file {:?}", file))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Splitting story into lines...");
    let count = match session.load_story(&story).await? {
        LoadOutcome::Loaded(count) => count,
        LoadOutcome::Superseded => bail!("Story load was superseded"),
    };
    spinner.finish_with_message(format!("Story split into {} lines", count));

    setup::assign_voices(&session, config)?;

    let bar = ProgressBar::new(count as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")?);
    bar.set_message("synthesizing");

    #[cfg(feature = "playback")]
    {
        use story_voices::playback::rodio_backend::RodioBackend;

        let mut player = PlaybackController::new(RodioBackend::try_new()?);
        session
            .generate_with_progress(&mut player, |done, _| bar.set_position(done as u64))
            .await?;
        bar.finish_with_message("done");
        let played = player.play_through(|backend| backend.wait_until_end())?;
        println!("Played {} lines.", played);
    }

    #[cfg(not(feature = "playback"))]
    {
        use story_voices::playback::ExportBackend;

        config.ensure_directories()?;
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("story");
        let out = Path::new(&config.output_folder).join(format!("{}.mp3", stem));

        let mut player = PlaybackController::new(ExportBackend::create(&out)?);
        session
            .generate_with_progress(&mut player, |done, _| bar.set_position(done as u64))
            .await?;
        bar.finish_with_message("done");
        let played = player.play_through(|_| {})?;
        println!("Wrote {} lines to {:?}", played, player.backend().path());
    }

    Ok(())
}
