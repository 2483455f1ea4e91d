use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use codecolors_core::{
    ConversationEvent, PlatformArguments, PromptFragment, RouteOutcome, UserState,
    FAKE_COLOR_CATALOG,
};
use codecolors_fulfillment::{build_router, FulfillmentAgent};
use codecolors_i18n::LocaleBundles;
use codecolors_observability::{init_tracing, AppMetrics};
use codecolors_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "codecolors")]
#[command(about = "Code Colors fulfillment CLI")]
struct Cli {
    #[arg(long, env = "CODECOLORS_LOCALES_DIR", default_value = "locales")]
    locales_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Route a single event and print the turn as JSON.
    Route {
        #[arg(long)]
        intent: String,
        /// Intent parameter as `name=value`; repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
        #[arg(long, default_value = "en")]
        locale: String,
        #[arg(long)]
        screen: bool,
        /// Display name already in user storage.
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        reprompt_count: Option<u32>,
        #[arg(long)]
        final_reprompt: bool,
        #[arg(long)]
        option: Option<String>,
        #[arg(long)]
        permission: Option<bool>,
        #[arg(long)]
        profile_name: Option<String>,
    },
    /// Interactive session; state is kept in the configured store.
    Chat {
        #[arg(long, default_value = "local-user")]
        user: String,
        #[arg(long, default_value = "en")]
        locale: String,
        #[arg(long)]
        screen: bool,
    },
    Locales {
        #[command(subcommand)]
        command: LocalesCommand,
    },
    /// Print the fake color catalog.
    Catalog,
}

#[derive(Debug, Subcommand)]
enum LocalesCommand {
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("codecolors_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Route {
            intent,
            params,
            locale,
            screen,
            name,
            reprompt_count,
            final_reprompt,
            option,
            permission,
            profile_name,
        } => {
            let agent = build_agent(&cli.locales_dir).await?;

            let mut event = ConversationEvent::new(intent)
                .with_locale(locale)
                .with_arguments(PlatformArguments {
                    reprompt_count,
                    is_final_reprompt: final_reprompt,
                    selected_option: option,
                    permission_granted: permission,
                    profile_display_name: profile_name,
                });
            for (key, value) in params {
                event = event.with_parameter(key, value);
            }
            if screen {
                event = event.with_screen();
            }
            if let Some(name) = name {
                event = event.with_state(UserState::with_display_name(name));
            }

            match agent.handle_event(&event)? {
                RouteOutcome::Handled(turn) => {
                    println!("{}", serde_json::to_string_pretty(&turn)?)
                }
                RouteOutcome::Unhandled => {
                    println!("{}", serde_json::json!({ "handled": false }))
                }
            }
        }
        Command::Chat {
            user,
            locale,
            screen,
        } => {
            let agent = build_agent(&cli.locales_dir).await?;
            run_chat(agent, &user, &locale, screen).await?;
        }
        Command::Locales { command } => match command {
            LocalesCommand::Check => {
                let bundles = LocaleBundles::from_dir(&cli.locales_dir).with_context(|| {
                    format!("failed loading locales from {}", cli.locales_dir.display())
                })?;
                let report = bundles.check();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "stats": bundles.stats(),
                        "report": report,
                    }))?
                );
                bundles.validate()?;
                if !report.is_clean() {
                    bail!("locale bundles have gaps");
                }
            }
        },
        Command::Catalog => {
            println!(
                "{}",
                serde_json::to_string_pretty(FAKE_COLOR_CATALOG.entries())?
            );
        }
    }

    Ok(())
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// `intent name; key=value; @option=pink unicorn`. `@` keys set platform arguments.
fn parse_chat_line(line: &str) -> Result<ConversationEvent> {
    let mut parts = line.split(';');
    let intent = parts.next().unwrap_or_default().trim();
    if intent.is_empty() {
        bail!("missing intent name");
    }

    let mut event = ConversationEvent::new(intent);
    for part in parts.map(str::trim).filter(|part| !part.is_empty()) {
        let (key, value) = parse_param(part).map_err(anyhow::Error::msg)?;
        match key.as_str() {
            "@option" => event.arguments.selected_option = Some(value),
            "@reprompt" => {
                event.arguments.reprompt_count =
                    Some(value.parse().context("@reprompt must be a number")?)
            }
            "@final" => {
                event.arguments.is_final_reprompt =
                    value.parse().context("@final must be true or false")?
            }
            "@permission" => {
                event.arguments.permission_granted =
                    Some(value.parse().context("@permission must be true or false")?)
            }
            "@profile" => event.arguments.profile_display_name = Some(value),
            other if other.starts_with('@') => bail!("unknown argument {other}"),
            _ => event = event.with_parameter(key, value),
        }
    }
    Ok(event)
}

async fn run_chat(agent: FulfillmentAgent<Store>, user: &str, locale: &str, screen: bool) -> Result<()> {
    println!("Code Colors chat mode. enter `intent; name=value`, 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.eq_ignore_ascii_case("forget") {
            agent.forget_user(user).await?;
            println!("\n(stored name cleared)\n");
            continue;
        }
        if message.is_empty() {
            continue;
        }

        let mut event = match parse_chat_line(message) {
            Ok(event) => event.with_locale(locale),
            Err(error) => {
                println!("\n{error}\n");
                continue;
            }
        };
        if screen {
            event = event.with_screen();
        }

        let RouteOutcome::Handled(turn) = agent.handle_turn(user, event).await? else {
            println!("\n(no handler for that intent)\n");
            continue;
        };

        println!();
        for prompt in &turn.directive.prompts {
            match prompt {
                PromptFragment::PlainText { text } => println!("{text}"),
                PromptFragment::Speech { display_text, .. } => println!("{display_text}"),
                PromptFragment::RichCard { title, text, .. } => println!("[card] {title}: {text}"),
                PromptFragment::Carousel { items } => {
                    let titles = items.iter().map(|item| item.title.as_str()).collect::<Vec<_>>();
                    println!("[carousel] {}", titles.join(" | "));
                }
                PromptFragment::PermissionRequest { context, .. } => {
                    println!("[permission] {context}")
                }
            }
        }
        if !turn.directive.suggestions.is_empty() {
            println!("Suggestions: {}", turn.directive.suggestions.join(", "));
        }
        println!();

        if turn.directive.terminal {
            break;
        }
    }

    Ok(())
}

async fn build_agent(locales_dir: &PathBuf) -> Result<FulfillmentAgent<Store>> {
    let metrics = AppMetrics::shared();
    let router = build_router(locales_dir)?;

    let store = if let Ok(database_url) = env::var("CODECOLORS_DATABASE_URL") {
        Store::sqlite(&database_url).await?
    } else {
        Store::memory()
    };

    Ok(FulfillmentAgent::new(
        Arc::new(router),
        Arc::new(store),
        metrics,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_line_splits_parameters_and_arguments() {
        let event =
            parse_chat_line("favorite fake color; fakeColor = pink unicorn; @option=indigo taco")
                .unwrap();
        assert_eq!(event.intent_name, "favorite fake color");
        assert_eq!(
            event.parameter_text("fakeColor").as_deref(),
            Some("pink unicorn")
        );
        assert_eq!(event.arguments.selected_option.as_deref(), Some("indigo taco"));
    }

    #[test]
    fn chat_line_rejects_bad_input() {
        assert!(parse_chat_line("  ; color=blue").is_err());
        assert!(parse_chat_line("actions_intent_NO_INPUT; @reprompt=twice").is_err());
        assert!(parse_chat_line("test; @mystery=1").is_err());
        assert!(parse_param("novalue").is_err());
    }
}
