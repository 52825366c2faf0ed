use clap::Parser;
use std::thread;
use std::time::Duration;
use tts_client::mock_server::{echo_responder, MockTtsServer};

#[derive(Parser, Debug)]
#[command(author, version, about = "Local mock of the binary TTS websocket API")]
struct Args {
    /// Address to bind to
    #[arg(long, default_value = "127.0.0.1:8765")]
    bind: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let server = MockTtsServer::bind(&args.bind, echo_responder())?.start()?;
    println!("Mock TTS server running, set VOLC_TTS_HOST={}", server.host());

    loop {
        thread::sleep(Duration::from_secs(60));
        log::info!("📊 {} connections served", server.connection_count());
    }
}
