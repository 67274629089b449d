use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use tierlens::config::Config;
use tierlens::dispatch::HostedProvider;
use tierlens::health::{HostedOptions, StartupStatus};
use tierlens::prompts::PRESET_PROMPTS;
use tierlens::router::{Route, Router};
use tierlens::session::Session;
use tierlens::tiers::{self, TIERS};

const HELP: &str = "\
commands:
  <text>              set the prompt
  /preset <title>     load a preset prompt
  /provider <name>    choose the tier 3 provider (anthropic | openai)
  /send <1|2|3>       send the prompt to a tier
  /show <1|2|3>       show the cached response for a tier
  /status             re-check backends
  /tiers              describe each tier
  /quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    // Prefer a .env next to the binary, then fall back to dotenvy's CWD search.
    match std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(".env")))
        .filter(|path| path.exists())
    {
        Some(path) => {
            dotenvy::from_path(&path).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let router = Router::new(Config::from_env())?;
    let mut status = router.startup_status().await;
    print_status(&status);

    let mut session = Session::new();
    session.select_provider(status.hosted_options().select(session.selected_provider()));

    println!("{HELP}");
    println!("presets: {}", preset_titles());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => {}
            "/quit" => break,
            "/tiers" => print_tiers(&router),
            "/status" => {
                status = router.startup_status().await;
                print_status(&status);
                session.select_provider(
                    status.hosted_options().select(session.selected_provider()),
                );
            }
            "/preset" => {
                if !session.use_preset(arg.trim()) {
                    println!("unknown preset; choose one of: {}", preset_titles());
                }
            }
            "/provider" => select_provider(&mut session, &status, arg.trim()),
            "/show" => match parse_route(arg.trim(), &session) {
                Some(route) => match session.cached(route.into()) {
                    Some(text) => println!("{text}"),
                    None => println!("(no response yet, use {})", session.send_label(route)),
                },
                None => println!("usage: /show <1|2|3>"),
            },
            "/send" => match parse_route(arg.trim(), &session) {
                Some(route) => send(&mut session, &router, &status, route).await,
                None => println!("usage: /send <1|2|3> (tier 3 needs a configured provider)"),
            },
            _ if line.starts_with('/') => println!("{HELP}"),
            _ => session.set_prompt(line),
        }
    }

    tracing::info!("tierlens shutting down");
    Ok(())
}

async fn send(session: &mut Session, router: &Router, status: &StartupStatus, route: Route) {
    if !session.can_send(route, status) {
        println!("tier {} is not available: set a prompt and check /status", route.tier());
        return;
    }

    let model = tiers::model_label(router.config(), route.provider());
    println!("--- {} ({model}) ---", session.send_label(route));

    let result = session
        .send(router, route, |fragment| {
            print!("{fragment}");
            std::io::stdout().flush().ok();
        })
        .await;

    match result {
        Ok(_) => println!(),
        Err(e) => {
            println!();
            tracing::warn!("tier {} failed: {e}", route.tier());
            println!("error: {}", e.user_message());
        }
    }
}

fn parse_route(arg: &str, session: &Session) -> Option<Route> {
    let tier = arg.parse().ok()?;
    Route::for_tier(tier, session.selected_provider())
}

fn select_provider(session: &mut Session, status: &StartupStatus, name: &str) {
    let wanted = HostedProvider::ALL
        .into_iter()
        .find(|p| p.name().eq_ignore_ascii_case(name) || p.label().eq_ignore_ascii_case(name));
    match wanted {
        Some(p) if status.has_key(p) => session.select_provider(Some(p)),
        Some(p) => println!("{}_API_KEY not found.", p.env_prefix()),
        None => println!("unknown provider: {name}"),
    }
}

fn print_status(status: &StartupStatus) {
    for warning in status.warnings() {
        println!("warning: {warning}");
    }
    if status.hosted_options() == HostedOptions::None {
        println!("no hosted provider configured; tier 3 is disabled");
    }
}

fn print_tiers(router: &Router) {
    for tier in &TIERS {
        println!("Tier {}: {} [{}]", tier.number, tier.label, tier.badge);
        println!("  {}", tier.explanation);
        for provider in tier.providers {
            println!("  model: {}", tiers::model_label(router.config(), *provider));
        }
    }
}

fn preset_titles() -> String {
    PRESET_PROMPTS
        .iter()
        .map(|(title, _)| *title)
        .collect::<Vec<_>>()
        .join(", ")
}
