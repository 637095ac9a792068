#![deny(dead_code)]
use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn, LevelFilter};
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use std::env;
use zeroize::Zeroizing;

mod config;
mod credentials;
mod ui;
mod utils;

use crate::{
    config::{Config, ACCOUNTS_FILE, LOG_FILE, STORE_FILE},
    credentials::{clear_credentials, load_credentials, save_credentials, Credentials},
    ui::{ChatUI, UiAction},
};
use chatsphere::backend::memory::{MemoryIdentity, MemoryStore};
use chatsphere::backend::IdentityBackend;
use chatsphere::feedback::Feedback;
use chatsphere::{AuthError, ChatRoom, Provider, Session};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Google,
    Github,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Google => Provider::Google,
            ProviderArg::Github => Provider::Github,
        }
    }
}

/// Command line arguments for chatsphere
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "chatsphere: a terminal client for a shared real-time chat room.",
    long_about = "chatsphere signs you in and opens the shared chat room.\n\n\
    Credentials may also come from CHATSPHERE_EMAIL and CHATSPHERE_PASSWORD.\n\
    Use -h or --help to see all options."
)]
struct Args {
    /// Directory for config, accounts, messages, cached credentials and the log
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Email to sign in with (prompted for when absent)
    #[arg(long)]
    email: Option<String>,

    /// Create a new account instead of signing in
    #[arg(long)]
    sign_up: bool,

    /// Display name for a new account
    #[arg(long, requires = "sign_up")]
    display_name: Option<String>,

    /// Sign in through an identity provider instead of a password
    #[arg(long, value_enum)]
    provider: Option<ProviderArg>,

    /// Delay before the local store acknowledges a write
    #[arg(long, value_name = "MS")]
    ack_delay_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Sign out when leaving the chat
    #[arg(long)]
    sign_out_on_exit: bool,
}

/// Prints pending feedback below the sign-in prompt
fn print_feedback(feedback: &mut Feedback) {
    if let Some(text) = feedback.inline() {
        eprintln!("  ! {}", text);
    }
    feedback.clear_inline();
    while let Some(notice) = feedback.dismiss() {
        eprintln!("[notice] {} (try again in a moment)", notice.text);
    }
}

fn prompt_password_credentials(email: Option<&str>) -> Result<Option<(String, Zeroizing<String>)>> {
    let email = match email {
        Some(email) => email.to_string(),
        None => {
            eprintln!("Email (leave empty to quit):");
            utils::read_line()?
        }
    };
    if email.is_empty() {
        return Ok(None);
    }
    eprintln!("Password for {} (input will not be shown):", email);
    let password = utils::read_password()?;
    if password.is_empty() {
        return Ok(None);
    }
    Ok(Some((email, password)))
}

/// Signs in through the provider flag, the environment, cached credentials or
/// the prompt, in that order. Permanent failures are shown inline and the
/// prompt repeats.
async fn sign_in(args: &Args, identity: &dyn IdentityBackend, dir: &Path) -> Result<Session> {
    let mut feedback = Feedback::new();

    if let Some(provider) = args.provider {
        match identity.sign_in_with_provider(provider.into()).await {
            Ok(session) => return Ok(session),
            Err(e) => {
                error!("Provider sign-in failed: {}", e);
                feedback.report_auth(&e);
                print_feedback(&mut feedback);
                eprintln!("Falling back to email and password.");
            }
        }
    }

    // (email, password, cache on success)
    let mut attempt = match (env::var("CHATSPHERE_EMAIL"), env::var("CHATSPHERE_PASSWORD")) {
        (Ok(email), Ok(password)) => Some((email, Zeroizing::new(password), false)),
        _ if args.sign_up => None,
        _ => match load_credentials(dir)? {
            Some(creds) => creds
                .get_password()
                .map(|password| (creds.email.clone(), password, true)),
            None => None,
        },
    };
    let mut prompt_email = args.email.clone();

    loop {
        let (email, password, remember) = match attempt.take() {
            Some(attempt) => attempt,
            None => match prompt_password_credentials(prompt_email.take().as_deref())? {
                Some((email, password)) => (email, password, true),
                None => return Err(anyhow!("Sign-in cancelled")),
            },
        };

        let result = if args.sign_up {
            identity
                .create_account(&email, &password, args.display_name.as_deref())
                .await
        } else {
            identity.sign_in_with_password(&email, &password).await
        };

        match result {
            Ok(session) => {
                if remember {
                    if let Err(e) = save_credentials(dir, &Credentials::new(&email, &password)) {
                        warn!("Failed to save credentials: {}", e);
                    }
                }
                return Ok(session);
            }
            Err(e) => {
                error!("Sign-in as {} failed: {}", email, e);
                if e == AuthError::WrongCredentials {
                    if let Err(e) = clear_credentials(dir) {
                        warn!("Failed to clear cached credentials: {}", e);
                    }
                }
                feedback.report_auth(&e);
                print_feedback(&mut feedback);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(dir) = &args.data_dir {
        config::set_data_dir_override(dir.clone());
    }
    let dir = config::data_dir()?;
    let mut config: Config = config::load_config(&dir)?;
    if let Some(delay) = args.ack_delay_ms {
        config.ack_delay_ms = delay;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    let log_file_path = dir.join(LOG_FILE);
    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::Debug);
    utils::setup_logging(Some(log_file_path.as_path()), level)?;

    info!("chatsphere starting up");
    info!("System information: {} {}", std::env::consts::OS, std::env::consts::ARCH);
    info!("Logging to file: {}", log_file_path.display());

    let mut identity = MemoryIdentity::open(&dir.join(ACCOUNTS_FILE))?;
    for (provider, session) in config.provider_identities() {
        identity = identity.with_provider_identity(provider, session);
    }
    let identity = Arc::new(identity);
    let store = Arc::new(
        MemoryStore::open(&dir.join(STORE_FILE))?
            .with_ack_delay(Duration::from_millis(config.ack_delay_ms)),
    );

    let session = sign_in(&args, &*identity, &dir).await?;
    println!(
        "Signed in as {} via {}",
        session.display_name.as_deref().unwrap_or(&session.uid),
        session.provider
    );

    let mut terminal = ui::setup_terminal()?;
    let mut chat_ui = ChatUI::new();
    let mut room = ChatRoom::mount(&*identity, store.clone(), &config.collection);

    let result = run_main_loop(&mut chat_ui, &mut terminal, &mut room, &config).await;

    // Release subscriptions and the terminal whether or not the loop failed
    room.unmount();
    ui::restore_terminal(terminal)?;
    result?;

    if args.sign_out_on_exit {
        if let Err(e) = identity.sign_out().await {
            error!("Sign-out failed: {}", e);
            room.report_auth_error(&e);
        }
    }
    // Anything still pending from the session, plus a failed sign-out
    print_feedback(room.feedback_mut());

    println!("Chat session ended.");
    Ok(())
}

async fn run_main_loop(
    chat_ui: &mut ChatUI,
    terminal: &mut ui::Terminal<ui::CrosstermBackend<io::Stdout>>,
    room: &mut ChatRoom,
    config: &Config,
) -> Result<()> {
    loop {
        room.poll(chat_ui.scroll_surface());
        room.feedback_mut().expire(config.notice_timeout_secs);
        chat_ui.sync_input(room);

        terminal.draw(|f| chat_ui.draw(f, room))?;

        match chat_ui.handle_input(room)? {
            UiAction::Quit => break,
            UiAction::Submit => {
                if !room.submit() {
                    info!("Nothing to send");
                }
            }
            UiAction::DismissNotice => {
                room.feedback_mut().dismiss();
            }
            UiAction::None => {}
        }

        // Let in-flight sends make progress between frames
        tokio::task::yield_now().await;
    }
    Ok(())
}
