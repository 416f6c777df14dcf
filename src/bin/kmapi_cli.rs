//! kmapi-cli: 命令行宿主：调用加载项函数、探测连通性、读写设置
//!
//! Usage:
//!   kmapi-cli functions                          List host-callable functions
//!   kmapi-cli call <FUNCTION> [ARGS...]          Invoke a function by name
//!   kmapi-cli fetch <url>                        Shortcut for `call FETCHTEXT <url>`
//!   kmapi-cli probe                              Check API connectivity
//!   kmapi-cli settings get [KEY...]              Show resolved settings
//!   kmapi-cli settings set KEY=VALUE...          Save settings

use anyhow::{bail, Context};
use kmapi_relay::config::{
    keys, ConfigStore, EnvConfigStore, FileConfigStore, KeyringConfigStore, LayeredConfigStore,
    WritableConfigStore,
};
use kmapi_relay::logging::{CompositeLogSink, MemoryLogSink, TracingLogSink};
use kmapi_relay::AddinRuntime;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

struct Options {
    settings_file: PathBuf,
    keyring: bool,
    verbose: bool,
    rest: Vec<String>,
}

fn parse_options(args: Vec<String>) -> Options {
    let mut settings_file = std::env::var("KMAPI_SETTINGS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("kmapi-settings.yaml"));
    let mut keyring = false;
    let mut verbose = false;
    let mut rest = Vec::new();

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--settings" => {
                if let Some(path) = it.next() {
                    settings_file = PathBuf::from(path);
                }
            }
            "--keyring" => keyring = true,
            "--verbose" | "-v" => verbose = true,
            _ => rest.push(arg),
        }
    }
    Options {
        settings_file,
        keyring,
        verbose,
        rest,
    }
}

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let opts = parse_options(std::env::args().skip(1).collect());
    if opts.rest.is_empty() {
        print_usage();
        std::process::exit(1);
    }

    if let Err(e) = run(opts).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"kmapi-cli: knowledge-model add-in host

USAGE:
    kmapi-cli [OPTIONS] <COMMAND> [ARGS...]

COMMANDS:
    functions                   List host-callable functions
    call <FUNCTION> [ARGS...]   Invoke a function ("" leaves an argument blank)
    fetch <url>                 Fetch text through the relay chain
    probe                       Check connectivity to the knowledge-model API
    settings get [KEY...]       Show resolved settings (API key masked)
    settings set KEY=VALUE...   Save settings
    help                        Show this help message

OPTIONS:
    --settings <path>           Settings file (default: kmapi-settings.yaml)
    --keyring                   Keep secrets in the OS keychain
    -v, --verbose               Print relay attempts after the result

ENVIRONMENT:
    KMAPI_SETTINGS_FILE         Settings file path
    KMAPI_<KEY>                 Setting override, e.g. KMAPI_API_KEY
    KMAPI_LOCAL_PROXY_URL       Append a self-hosted envelope relay
    RUST_LOG                    Log filter"#
    );
}

fn settings_store(opts: &Options) -> LayeredConfigStore {
    let mut store = LayeredConfigStore::new()
        .layer(Arc::new(EnvConfigStore::new()))
        .layer(Arc::new(FileConfigStore::new(&opts.settings_file)));
    if opts.keyring {
        store = store.layer(Arc::new(KeyringConfigStore::new()));
    }
    store
}

async fn run(opts: Options) -> anyhow::Result<()> {
    let command = opts.rest[0].clone();
    match command.as_str() {
        "functions" => {
            for f in kmapi_relay::functions::FunctionTable::builtin().entries() {
                println!("{:<80} {}", f.signature(), f.description);
                if !f.aliases.is_empty() {
                    println!("    aliases: {}", f.aliases.join(", "));
                }
            }
            Ok(())
        }
        "call" => {
            let name = opts.rest.get(1).context("missing function name")?.clone();
            let args: Vec<Option<String>> = opts.rest[2..].iter().cloned().map(Some).collect();
            invoke(&opts, &name, args).await
        }
        "fetch" => {
            let url = opts.rest.get(1).context("missing url")?.clone();
            invoke(&opts, "FETCHTEXT", vec![Some(url)]).await
        }
        "probe" => {
            let runtime = AddinRuntime::builder().build()?;
            let report = runtime.probe_connectivity().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.reachable {
                std::process::exit(2);
            }
            Ok(())
        }
        "settings" => settings(&opts).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn invoke(opts: &Options, name: &str, args: Vec<Option<String>>) -> anyhow::Result<()> {
    let attempts = Arc::new(MemoryLogSink::default());
    let sink = CompositeLogSink::new()
        .add_sink(Arc::new(TracingLogSink))
        .add_sink(attempts.clone());
    let runtime = AddinRuntime::builder()
        .config_store(Arc::new(settings_store(opts)))
        .log_sink(Arc::new(sink))
        .build()?;

    let result = runtime.call(name, &args).await;
    if opts.verbose {
        for line in attempts.lines() {
            eprintln!("  {line}");
        }
    }
    println!("{}", result?);
    Ok(())
}

async fn settings(opts: &Options) -> anyhow::Result<()> {
    match opts.rest.get(1).map(String::as_str) {
        Some("get") => {
            let requested: Vec<&str> = if opts.rest.len() > 2 {
                opts.rest[2..].iter().map(String::as_str).collect()
            } else {
                keys::COMPLETION.to_vec()
            };
            let values = settings_store(opts).get(&requested).await?;
            for key in requested {
                let shown = match values.get(key) {
                    Some(v) if keys::is_secret(key) => mask(v),
                    Some(v) => v.clone(),
                    None => "<unset>".to_string(),
                };
                println!("{key} = {shown}");
            }
            Ok(())
        }
        Some("set") => {
            let mut plain = HashMap::new();
            let mut secrets = HashMap::new();
            for pair in &opts.rest[2..] {
                let Some((k, v)) = pair.split_once('=') else {
                    bail!("expected KEY=VALUE, got '{pair}'");
                };
                let target = if opts.keyring && keys::is_secret(k) {
                    &mut secrets
                } else {
                    &mut plain
                };
                target.insert(k.trim().to_string(), v.trim().to_string());
            }
            if plain.is_empty() && secrets.is_empty() {
                bail!("nothing to save");
            }
            if !plain.is_empty() {
                FileConfigStore::new(&opts.settings_file).set(plain).await?;
            }
            if !secrets.is_empty() {
                KeyringConfigStore::new().set(secrets).await?;
            }
            println!("Settings saved successfully");
            Ok(())
        }
        _ => bail!("usage: settings get [KEY...] | settings set KEY=VALUE..."),
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("****{visible}")
    }
}
