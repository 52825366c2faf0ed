use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use tts_client::config::load_config;
use tts_client::VolcTts;

#[derive(Parser, Debug)]
#[command(author, version, about = "Synthesize text to an audio file", long_about = None)]
pub struct Args {
    /// Text to synthesize
    #[arg(long, conflicts_with = "input")]
    text: Option<String>,

    /// Read the text from a file instead
    #[arg(long)]
    input: Option<PathBuf>,

    /// Output audio file
    #[arg(short, long, default_value = "output.mp3")]
    output: PathBuf,

    /// Voice type (defaults to VOLC_TTS_VOICE)
    #[arg(long)]
    voice: Option<String>,

    /// Audio encoding such as mp3, wav, pcm or ogg_opus
    #[arg(long)]
    encoding: Option<String>,

    /// Maximum characters per request
    #[arg(long)]
    word_limit: Option<usize>,

    /// Stable user id sent with every request
    #[arg(long)]
    uid: Option<String>,

    /// Send the JSON request uncompressed
    #[arg(long)]
    no_compress: bool,

    /// Only check that the credentials are accepted
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    log::info!("🚀 Starting volc-tts with args: {:?}", args);

    let config = load_config().context("Failed to load configuration")?;
    let tts = VolcTts::from_config(&config).context("Failed to create TTS client")?;

    let voice = args.voice.clone().unwrap_or_else(|| config.voice.clone());
    let mut defaults = config.request_defaults();
    if let Some(encoding) = &args.encoding {
        defaults.encoding = encoding.clone();
    }
    if let Some(limit) = args.word_limit {
        if limit == 0 {
            bail!("--word-limit must be greater than zero");
        }
        defaults.max_chunk_chars = limit;
    }
    defaults.uid = args.uid.clone();
    defaults.compress = !args.no_compress;

    if args.check {
        tts.validate_credentials(&voice, &defaults)
            .context("Credential check failed")?;
        println!("Credentials OK");
        return Ok(());
    }

    let text = match (&args.text, &args.input) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Provide --text or --input"),
    };

    let started = Instant::now();
    let mut writer = BufWriter::new(
        File::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?,
    );

    let mut stream = tts.synthesize(&text, &voice, &defaults);
    let total = stream.total_chunks();
    let mut written = 0usize;

    while let Some(audio) = stream.next() {
        let audio = audio.with_context(|| {
            format!(
                "Synthesis failed after {}/{} chunks",
                stream.completed_chunks(),
                total
            )
        })?;
        writer.write_all(&audio).context("Failed to write audio")?;
        written += audio.len();
        log::info!(
            "📦 Chunk {}/{}: {} bytes",
            stream.completed_chunks(),
            total,
            audio.len()
        );
    }
    writer.flush().context("Failed to write audio")?;

    log::info!(
        "✅ Wrote {} bytes to {} in {:?}",
        written,
        args.output.display(),
        started.elapsed()
    );
    Ok(())
}
