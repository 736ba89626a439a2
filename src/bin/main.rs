//! MonkeyMask bridge CLI
//!
//!   monkeymask-bridge serve [--port N] [--origin O]     → signature verification server
//!   monkeymask-bridge verify --message M --signature S --public-key K [--origin O]
//!   monkeymask-bridge address <hex | ban_...>           → convert key ⇄ account
//!   monkeymask-bridge demo                              → bridge walkthrough on an in-memory wallet
//!
//! Output format:
//!   --json     Compact JSON (default for non-tty)
//!   --pretty   Pretty-print JSON (default for tty)

use monkeymask_bridge::core::address;
use monkeymask_bridge::logging::init_logging;
use monkeymask_bridge::provider::{Encoding, Provider};
use monkeymask_bridge::server::{verify_request, VerifyRequest};
use monkeymask_bridge::{Bridge, BridgeConfig, MemoryWallet, ServerConfig, TokioTimer};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::rc::Rc;
use tracing::info;

const DEMO_ORIGIN: &str = "https://demo.monkeymask.local";

fn main() {
    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);
    init_logging();

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("monkeymask-bridge {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("serve") => cmd_serve(&opts),
        Some("verify") => cmd_verify(&opts),
        Some("address") => cmd_address(&opts),
        Some("demo") => cmd_demo(),
        Some(cmd) => Err(format!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || (!opts.json && std::io::stdout().is_terminal());
    let render = |value: &Value| {
        if pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        }
        .unwrap_or_else(|_| value.to_string())
    };

    match result {
        Ok(output) => println!("{}", render(&output)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": e})));
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    target: Option<String>,
    // Server options
    port: Option<u16>,
    origin: Option<String>,
    // Verify options
    message: Option<String>,
    signature: Option<String>,
    public_key: Option<String>,
    // Output options
    json: bool,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        // Load .env file if present
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((key, value)) = line.split_once('=') {
                    let value = value.trim().trim_matches('"');
                    if !value.is_empty() && env::var(key.trim()).is_err() {
                        env::set_var(key.trim(), value);
                    }
                }
            }
        }

        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            match arg.as_str() {
                "--help" | "-h" => opts.help = true,
                "--version" | "-V" => opts.version = true,
                "--json" => opts.json = true,
                "--pretty" => opts.pretty = true,
                "--port" | "-p" => {
                    opts.port = value.and_then(|v| v.parse().ok());
                    i += 1;
                }
                "--origin" | "-o" => {
                    opts.origin = value;
                    i += 1;
                }
                "--message" | "-m" => {
                    opts.message = value;
                    i += 1;
                }
                "--signature" | "-s" => {
                    opts.signature = value;
                    i += 1;
                }
                "--public-key" | "-k" => {
                    opts.public_key = value;
                    i += 1;
                }
                _ if !arg.starts_with('-') => positional.push(arg.clone()),
                _ => {} // Ignore unknown flags
            }
            i += 1;
        }

        let mut positional = positional.into_iter();
        opts.command = positional.next();
        opts.target = positional.next();
        opts
    }

    /// Environment first, then flags.
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(origin) = self.origin.as_deref().filter(|o| !o.is_empty()) {
            config = config.with_default_origin(origin);
        }
        config
    }
}

fn print_usage() {
    println!(
        r#"monkeymask-bridge - MonkeyMask provider bridge tools

USAGE:
    monkeymask-bridge <command> [options]

COMMANDS:
    serve                   Start the signature verification server
    verify                  Verify a signed message locally
    address <key|account>   Convert a hex public key to a ban_ account or back
    demo                    Walk the bridge through a session with an in-memory wallet

SERVER OPTIONS:
    --port, -p <port>       Server port (default: 3000, env: MONKEYMASK_PORT)
    --origin, -o <origin>   Origin used when a request names none (env: MONKEYMASK_ORIGIN)

VERIFY OPTIONS:
    --message, -m <text>    Message as the user saw it
    --signature, -s <hex>   128 hex chars
    --public-key, -k <key>  ban_ account or 64 hex chars
    --origin, -o <origin>   Origin the message was signed for

OUTPUT OPTIONS:
    --json                  Compact JSON output
    --pretty                Pretty-print JSON

ENVIRONMENT:
    RUST_LOG                Log filter (default: info)
    MONKEYMASK_LOG_JSON=1   JSON log lines on stderr
"#
    );
}

fn cmd_serve(opts: &ParsedArgs) -> Result<Value, String> {
    let config = opts.server_config();
    let port = config.port;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| format!("Failed to create runtime: {}", e))?;

    info!("Endpoints:");
    info!("  GET  /health            - Health check");
    info!("  GET  /verify-signature  - Usage");
    info!("  POST /verify-signature  - Verify a signed message");

    rt.block_on(monkeymask_bridge::serve(config))
        .map_err(|e| format!("{:#}", e))?;

    Ok(json!({"status": "stopped", "port": port}))
}

fn cmd_verify(opts: &ParsedArgs) -> Result<Value, String> {
    let config = opts.server_config();
    let request = VerifyRequest {
        message: opts.message.clone(),
        signature: opts.signature.clone(),
        public_key: opts.public_key.clone(),
        origin: None,
    };
    let response = verify_request(&request, &config.default_origin).map_err(|e| e.to_string())?;
    let mut output = serde_json::to_value(&response).map_err(|e| e.to_string())?;
    output["origin"] = json!(config.default_origin);
    Ok(output)
}

fn cmd_address(opts: &ParsedArgs) -> Result<Value, String> {
    let target = opts.target.as_deref().ok_or("Usage: monkeymask-bridge address <hex|ban_...>")?;
    let public_key = address::parse_public_key(target).map_err(|e| e.to_string())?;
    Ok(json!({
        "publicKey": hex::encode_upper(public_key),
        "address": address::public_key_to_address(&public_key),
    }))
}

fn cmd_demo() -> Result<Value, String> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create runtime: {}", e))?;
    let local = tokio::task::LocalSet::new();
    local.block_on(&rt, run_demo())
}

async fn run_demo() -> Result<Value, String> {
    let seed = [7u8; 32];
    let probe = MemoryWallet::from_seed(&seed, 2, DEMO_ORIGIN);
    let [primary, savings]: [String; 2] = probe
        .accounts()
        .try_into()
        .map_err(|_| "demo wallet must have two accounts".to_string())?;

    let wallet = Rc::new(
        MemoryWallet::from_seed(&seed, 2, DEMO_ORIGIN)
            .with_balance(primary, 42 * 10u128.pow(29))
            .with_name("savings.ban", savings.clone())
            .trusted(),
    );
    let slot = {
        let wallet = wallet.clone();
        move || Some(wallet.clone() as Rc<dyn Provider>)
    };
    let config = BridgeConfig::default()
        .on_connect(|public_key| info!(%public_key, "demo: connected"))
        .on_error(|error| info!(error, "demo: bridge error"));
    let bridge = Bridge::new(config, slot, Rc::new(TokioTimer::new()));

    let runner = {
        let bridge = bridge.clone();
        tokio::task::spawn_local(async move { bridge.run().await })
    };

    // Silent reconnect fires after the reconnect delay.
    tokio::time::sleep(std::time::Duration::from_millis(bridge.config().reconnect_delay_ms + 100)).await;
    let reconnected = bridge.snapshot();

    let before = bridge.get_account_info(None).await;
    let hash = bridge.send_transaction("savings.ban", "1.5").await;
    let after = bridge.get_account_info(None).await;
    let savings_balance = bridge.get_balance(Some(&savings)).await;

    let message = "Sign in to the demo";
    let signed = bridge.sign_message(message, Encoding::Utf8).await;
    let verification = signed.as_ref().map(|s| {
        let request = VerifyRequest {
            message: Some(message.to_string()),
            signature: Some(s.signature.clone()),
            public_key: Some(s.public_key.clone()),
            origin: None,
        };
        match verify_request(&request, DEMO_ORIGIN) {
            Ok(response) => json!(response.valid),
            Err(e) => json!({"error": e.to_string()}),
        }
    });

    let unresolved = bridge.send_transaction("nobody.ban", "1").await;
    let unresolved_error = bridge.error();

    bridge.disconnect().await;
    bridge.detach();
    let _ = runner.await;

    Ok(json!({
        "reconnected": reconnected,
        "accountInfo": before,
        "send": {"to": "savings.ban", "resolved": savings, "hash": hash},
        "accountInfoAfterSend": after,
        "savingsBalance": savings_balance,
        "signedMessage": signed,
        "verified": verification,
        "unresolvedSend": {"hash": unresolved, "error": unresolved_error},
        "final": bridge.snapshot(),
    }))
}
