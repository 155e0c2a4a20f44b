use std::fs;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use reshape_contracts::chat::{parse_intent, ChatMessage, Intent, CHAT_HELP_COMMANDS};
use reshape_contracts::events::EventWriter;
use reshape_contracts::images::GeneratedImage;
use reshape_contracts::mint::detect_in_text;
use reshape_contracts::tools::ToolCatalog;
use reshape_engine::{
    abbreviate_address, DryrunImageEndpoint, DryrunWallet, HttpChatTransport, HttpImageEndpoint,
    ImageEndpoint, ImageGenerationClient, JsonRpcWallet, Notice, Notifier, Studio, StudioBackends,
    StudioConfig, StudioContext, UploadClient, Wallet,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reshape", version, about = "AI artwork to NFT, from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive create session.
    Chat(ChatArgs),
    /// Generate one image and save the preview.
    Generate(GenerateArgs),
    /// Pin a local file through the upload endpoint.
    Upload(UploadArgs),
    /// Scan assistant text (file or stdin) for a mint transaction.
    Detect(DetectArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ImageBackend {
    Http,
    Dryrun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum WalletBackend {
    Rpc,
    Dryrun,
}

#[derive(Debug, Args)]
struct EndpointArgs {
    /// Base URL of the web app. Overrides RESHAPE_API_BASE.
    #[arg(long)]
    api_base: Option<String>,
    #[arg(long, value_enum, default_value = "http")]
    image_endpoint: ImageBackend,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    endpoints: EndpointArgs,
    #[arg(long, value_enum, default_value = "dryrun")]
    wallet: WalletBackend,
    /// JSON-RPC endpoint for `--wallet rpc`. Overrides RESHAPE_WALLET_RPC_URL.
    #[arg(long)]
    wallet_rpc_url: Option<String>,
    /// Account to connect with. Overrides RESHAPE_WALLET_ADDRESS.
    #[arg(long)]
    wallet_address: Option<String>,
    #[arg(long)]
    chain_id: Option<String>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    endpoints: EndpointArgs,
}

#[derive(Debug, Parser)]
struct UploadArgs {
    path: PathBuf,
    #[arg(long)]
    api_base: Option<String>,
}

#[derive(Debug, Parser)]
struct DetectArgs {
    /// Reads stdin when omitted.
    path: Option<PathBuf>,
}

fn main() {
    init_tracing();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("reshape error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Chat(args) => {
            run_chat(args)?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args),
        Command::Upload(args) => run_upload(args),
        Command::Detect(args) => run_detect(args),
    }
}

/// Prints notices as they arrive.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        println!("{}", format_notice(&notice));
    }
}

fn format_notice(notice: &Notice) -> String {
    match notice.description.as_deref() {
        Some(description) if !description.trim().is_empty() => {
            format!("[{}] {}: {description}", notice.level.as_str(), notice.title)
        }
        _ => format!("[{}] {}", notice.level.as_str(), notice.title),
    }
}

fn studio_context(out: &Path, events: Option<&Path>) -> Result<StudioContext> {
    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    let events_path = events
        .map(Path::to_path_buf)
        .unwrap_or_else(|| out.join("events.jsonl"));
    let session_id = format!("session-{}", compact_timestamp());
    Ok(StudioContext::new(
        EventWriter::new(events_path, session_id),
        Arc::new(ConsoleNotifier),
    ))
}

fn load_config(api_base: Option<&str>) -> StudioConfig {
    let mut config = StudioConfig::from_env();
    if let Some(api_base) = api_base.map(str::trim).filter(|value| !value.is_empty()) {
        config.api_base = api_base.trim_end_matches('/').to_string();
    }
    config
}

fn image_endpoint(backend: ImageBackend, config: &StudioConfig) -> Result<Box<dyn ImageEndpoint>> {
    Ok(match backend {
        ImageBackend::Http => Box::new(HttpImageEndpoint::new(config.image_url())?),
        ImageBackend::Dryrun => Box::new(DryrunImageEndpoint::new(config.gateway_url.clone())),
    })
}

fn wallet_backend(backend: WalletBackend, config: &StudioConfig) -> Result<Box<dyn Wallet>> {
    Ok(match backend {
        WalletBackend::Rpc => {
            let Some(url) = config.wallet_rpc_url.clone() else {
                bail!("--wallet rpc needs --wallet-rpc-url or RESHAPE_WALLET_RPC_URL");
            };
            Box::new(JsonRpcWallet::new(
                url,
                config.wallet_address.clone(),
                config.chain_id,
            )?)
        }
        WalletBackend::Dryrun => Box::new(DryrunWallet::new(config.wallet_address.clone())),
    })
}

fn run_chat(args: ChatArgs) -> Result<()> {
    let mut config = load_config(args.endpoints.api_base.as_deref());
    if args.wallet_rpc_url.is_some() {
        config.wallet_rpc_url = args.wallet_rpc_url.clone();
    }
    if args.wallet_address.is_some() {
        config.wallet_address = args.wallet_address.clone();
    }
    if let Some(raw) = args.chain_id.as_deref() {
        config.chain_id =
            Some(reshape_engine::config::parse_chain_id(raw).context("invalid --chain-id")?);
    }

    let ctx = studio_context(&args.out, args.events.as_deref())?;
    let backends = StudioBackends {
        chat: Box::new(HttpChatTransport::new(config.chat_url())?),
        images: image_endpoint(args.endpoints.image_endpoint, &config)?,
        wallet: wallet_backend(args.wallet, &config)?,
    };
    let mut studio = Studio::new(config, backends, ctx);
    let catalog = ToolCatalog::default();

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Reshape studio started. Type /help for commands, /connect to link a wallet.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        if intent.action == "quit" {
            break;
        }
        if let Err(err) = handle_intent(&mut studio, &catalog, &intent, &args.out) {
            println!("! {err:#}");
        }
    }

    let summary_path = args.out.join("summary.json");
    studio.finish(&summary_path)?;
    println!("Session summary written to {}", summary_path.display());
    Ok(())
}

fn handle_intent(
    studio: &mut Studio,
    catalog: &ToolCatalog,
    intent: &Intent,
    out: &Path,
) -> Result<()> {
    tracing::debug!(action = %intent.action, "handling intent");
    match intent.action.as_str() {
        "noop" => {}
        "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "list_tools" => {
            for tool in catalog.list() {
                let marker = if tool.prepares_transaction { "*" } else { " " };
                println!("{marker} {}: {}", tool.name, tool.description);
            }
            println!("(* prepares a transaction for confirmation)");
        }
        "status" => print_status(studio),
        "connect_wallet" => {
            studio.connect_wallet(intent.arg("address"))?;
        }
        "disconnect_wallet" => studio.disconnect_wallet(),
        "generate_image" => {
            let Some(prompt) = intent.arg("prompt") else {
                println!("/image requires a prompt");
                return Ok(());
            };
            let outcome = studio.generate_image(prompt);
            if let Some(image) = outcome.image.as_ref() {
                report_image(image, out)?;
            }
        }
        "clear_image" => {
            studio.clear_image();
            println!("Image cleared");
        }
        "upload" => {
            let Some(path) = intent.arg("path") else {
                println!("/upload requires a path");
                return Ok(());
            };
            let client = UploadClient::new(studio.config().upload_url())?;
            let receipt = client.upload(Path::new(path))?;
            studio.context().emit(
                "file_uploaded",
                json!({
                    "path": path,
                    "ipfs_hash": receipt.ipfs_hash,
                    "size": receipt.size,
                }),
            );
            println!("Pinned {} as {} ({})", receipt.filename, receipt.ipfs_hash, receipt.url);
        }
        "confirm_mint" => {
            studio.confirm_mint()?;
            print_mint_card(studio);
        }
        "retry_mint" => {
            if studio.retry_mint()? {
                print_mint_card(studio);
            } else {
                println!("Nothing to retry; the mint has not failed");
            }
        }
        "dismiss_mint" => {
            if studio.dismiss_mint() {
                println!("Mint dismissed");
            } else {
                println!("No mint to dismiss");
            }
        }
        "retry_chat" => {
            let turn = studio.retry_chat()?;
            print_assistant(&turn.message);
            print_mint_card(studio);
        }
        "prompt" => {
            let prompt = intent.prompt.as_deref().unwrap_or_default();
            let outcome = studio.submit_prompt(prompt)?;
            if let Some(image) = outcome.image.image.as_ref() {
                report_image(image, out)?;
            }
            print_assistant(&outcome.turn.message);
            if outcome.mint_ready {
                print_mint_card(studio);
            }
        }
        "unknown" => {
            let command = intent.arg("command").unwrap_or_default();
            println!("Unknown command: /{command}. Type /help for commands.");
        }
        other => println!("Unhandled action: {other}"),
    }
    Ok(())
}

fn print_status(studio: &Studio) {
    let wallet = studio
        .wallet_address()
        .map(abbreviate_address)
        .unwrap_or_else(|| "not connected".to_string());
    println!("Wallet: {wallet}");
    println!("Chat: {}", studio.chat().status().as_str());
    if let Some(error) = studio.chat().last_error() {
        println!("Last error: {error} (use /retry)");
    }
    match studio.images().current() {
        Some(image) => println!("Image: {} ({})", image.ipfs_hash, image.gateway_url),
        None => println!("Image: none"),
    }
    if studio.images().is_generating() {
        println!("Image generation in progress");
    }
    match studio.mint() {
        Some(_) => print_mint_card(studio),
        None => println!("Mint: none pending"),
    }
}

fn print_assistant(message: &ChatMessage) {
    let text = message.text();
    if !text.trim().is_empty() {
        println!("{}", text.trim());
    }
    for call in message.tool_calls() {
        let state = if call.is_result() { "done" } else { "pending" };
        println!("  [tool] {} ({state})", call.tool_name);
    }
}

fn print_mint_card(studio: &Studio) {
    let Some(handler) = studio.mint() else {
        return;
    };
    for line in handler.render_lines() {
        println!("  | {line}");
    }
    let hint = match handler.state() {
        reshape_engine::MintState::Ready => "/mint to confirm, /dismiss to cancel",
        reshape_engine::MintState::Failed { .. } => "/retry_mint to try again, /dismiss to cancel",
        reshape_engine::MintState::Success { .. } => return,
    };
    println!("  | {hint}");
}

fn report_image(image: &GeneratedImage, out: &Path) -> Result<()> {
    println!("Image: {} ({})", image.ipfs_url, image.gateway_url);
    if let Some(path) = save_preview(image, out)? {
        println!("Preview saved to {}", path.display());
    }
    Ok(())
}

/// Writes the inline preview as `<content address>.png`. No preview, no file.
fn save_preview(image: &GeneratedImage, out: &Path) -> Result<Option<PathBuf>> {
    if image.base64.trim().is_empty() {
        return Ok(None);
    }
    let file_name = preview_file_name(&image.ipfs_hash)?;
    let bytes = BASE64
        .decode(image.base64.trim())
        .context("image preview is not valid base64")?;
    let decoded = image::load_from_memory(&bytes).context("image preview is not decodable")?;
    fs::create_dir_all(out)?;
    let path = out.join(file_name);
    decoded
        .save(&path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// The content address comes from the server; only a bare alphanumeric CID names a file.
fn preview_file_name(ipfs_hash: &str) -> Result<String> {
    if ipfs_hash.is_empty() || !ipfs_hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        bail!("refusing to save preview for unexpected content address {ipfs_hash:?}");
    }
    Ok(format!("{ipfs_hash}.png"))
}

fn run_generate(args: GenerateArgs) -> Result<i32> {
    let config = load_config(args.endpoints.api_base.as_deref());
    let ctx = studio_context(&args.out, args.events.as_deref())?;
    let endpoint = image_endpoint(args.endpoints.image_endpoint, &config)?;
    let mut client = ImageGenerationClient::new(endpoint, ctx);
    let outcome = client.generate(
        &args.prompt,
        args.name.as_deref(),
        args.description.as_deref(),
    );
    let Some(image) = outcome.image.as_ref() else {
        return Ok(1);
    };
    report_image(image, &args.out)?;
    Ok(0)
}

fn run_upload(args: UploadArgs) -> Result<i32> {
    let config = load_config(args.api_base.as_deref());
    let receipt = UploadClient::new(config.upload_url())?.upload(&args.path)?;
    println!("{}", serde_json::to_string_pretty(&receipt)?);
    Ok(0)
}

fn run_detect(args: DetectArgs) -> Result<i32> {
    let text = match args.path.as_deref() {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    match detect_in_text(&text) {
        Some(pending) => {
            println!("{}", serde_json::to_string_pretty(&pending)?);
            Ok(0)
        }
        None => {
            println!("No pending transaction found");
            Ok(1)
        }
    }
}

fn compact_timestamp() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;

    #[test]
    fn notices_render_with_level_and_description() {
        assert_eq!(
            format_notice(&Notice::error("Image generation failed").with_description("quota")),
            "[error] Image generation failed: quota"
        );
        assert_eq!(
            format_notice(&Notice::info("Wallet disconnected").with_description(" ")),
            "[info] Wallet disconnected"
        );
    }

    #[test]
    fn save_preview_writes_png_named_by_content_address() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut png = Cursor::new(Vec::new());
        RgbImage::from_pixel(4, 4, Rgb([200, 10, 10])).write_to(&mut png, ImageFormat::Png)?;
        let image = GeneratedImage {
            ipfs_hash: "QmTest123".to_string(),
            ipfs_url: "ipfs://QmTest123".to_string(),
            gateway_url: "https://gw.example/ipfs/QmTest123".to_string(),
            base64: BASE64.encode(png.into_inner()),
        };

        let saved = save_preview(&image, temp.path())?;
        assert_eq!(saved, Some(temp.path().join("QmTest123.png")));
        assert_eq!(image::open(temp.path().join("QmTest123.png"))?.width(), 4);

        let empty = GeneratedImage {
            base64: String::new(),
            ..image
        };
        assert_eq!(save_preview(&empty, temp.path())?, None);
        Ok(())
    }

    #[test]
    fn save_preview_rejects_content_address_with_path_segments() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("out");
        let mut png = Cursor::new(Vec::new());
        RgbImage::from_pixel(2, 2, Rgb([0, 0, 0])).write_to(&mut png, ImageFormat::Png)?;
        let base64 = BASE64.encode(png.into_inner());

        for hash in ["../escaped", "nested/QmX", "..", "C:\\QmX", ""] {
            let image = GeneratedImage {
                ipfs_hash: hash.to_string(),
                ipfs_url: format!("ipfs://{hash}"),
                gateway_url: format!("https://gw.example/ipfs/{hash}"),
                base64: base64.clone(),
            };
            assert!(save_preview(&image, &out).is_err(), "accepted {hash:?}");
        }
        assert!(!temp.path().join("escaped.png").exists());
        assert!(!out.exists());
        Ok(())
    }

    #[test]
    fn cli_parses_backend_flags() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from([
            "reshape",
            "chat",
            "--out",
            "/tmp/session",
            "--image-endpoint",
            "dryrun",
            "--wallet",
            "rpc",
            "--wallet-rpc-url",
            "http://127.0.0.1:8545",
        ])?;
        let Command::Chat(args) = cli.command else {
            anyhow::bail!("expected chat subcommand");
        };
        assert_eq!(args.endpoints.image_endpoint, ImageBackend::Dryrun);
        assert_eq!(args.wallet, WalletBackend::Rpc);
        assert_eq!(args.wallet_rpc_url.as_deref(), Some("http://127.0.0.1:8545"));
        Ok(())
    }
}
