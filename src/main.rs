#[tokio::main]
async fn main() {
    if let Err(err) = logview::mcp::server::run_stdio().await {
        eprintln!("logview: {}", err);
        if let Some(hint) = err.hint {
            eprintln!("hint: {}", hint);
        }
        std::process::exit(1);
    }
}
