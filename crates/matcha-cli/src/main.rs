use clap::{Parser, Subcommand};
use tracing::{info, warn};

use matcha_client::{
    ChannelStatus, Client, ClientConfig, ConnectionState, HttpApi, LoadOutcome, Presence, TracingView,
    TungsteniteConnector,
};
use matcha_types::UserId;

#[derive(Parser)]
#[command(name = "matcha")]
#[command(about = "Follow Matcha chat and notifications from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream counters, toasts and (optionally) one conversation until Ctrl-C
    Watch {
        /// Open the conversation with this user
        #[arg(long)]
        peer: Option<UserId>,
    },
    /// Send a message
    Send {
        /// Recipient user id
        peer: UserId,
        /// Message text
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// List conversations
    Conversations,
    /// List recent notifications
    Notifications {
        /// Number of notifications to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Mark every notification as read
    MarkAllRead,
    /// Show whether a user is online
    Status {
        /// User id
        user: UserId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "matcha=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?;
    let api = HttpApi::new(&config)?;
    let cookie = config.session_cookie.clone();
    let client = Client::new(api, TracingView, config);

    match cli.command {
        Commands::Watch { peer } => watch(client, cookie, peer).await?,
        Commands::Send { peer, text } => {
            let sent = client.send_message_to(peer, &text.join(" ")).await?;
            println!("sent #{} at {}", sent.id, sent.created_at.format("%Y-%m-%d %H:%M:%S"));
        }
        Commands::Conversations => {
            let conversations = client.conversations().await?;
            if conversations.is_empty() {
                println!("No conversations yet.");
            }
            for c in conversations {
                let last = match &c.last_message {
                    Some(m) => m.content.as_str(),
                    None => "(new match, say hi)",
                };
                println!("{:>6}  {:<20} {:>3} unread  {}", c.user_id, c.display_name(), c.unread_count, last);
            }
        }
        Commands::Notifications { limit } => {
            for n in client.notifications(limit).await? {
                let marker = if n.is_read { ' ' } else { '*' };
                println!(
                    "{} {:>6}  {}  {:?}  {}",
                    marker,
                    n.id,
                    n.created_at.format("%Y-%m-%d %H:%M"),
                    n.kind,
                    n.message
                );
            }
        }
        Commands::MarkAllRead => {
            client.mark_all_notifications_read().await?;
            let counters = client.counters();
            println!(
                "notifications marked read ({} unread messages)",
                counters.unread_messages.map_or_else(|| "?".to_string(), |n| n.to_string())
            );
        }
        Commands::Status { user } => match client.peer_presence(user).await? {
            Presence::Online => println!("{} is online", user),
            Presence::Away { idle } => println!("{} is away (idle {} min)", user, idle.as_secs() / 60),
            Presence::Offline { last_seen: Some(at) } => {
                println!("{} is offline, last seen {}", user, at.format("%Y-%m-%d %H:%M"))
            }
            Presence::Offline { last_seen: None } => println!("{} is offline", user),
        },
    }

    Ok(())
}

async fn watch(client: Client<HttpApi, TracingView>, cookie: Option<String>, peer: Option<UserId>) -> anyhow::Result<()> {
    client.start(TungsteniteConnector::new(cookie))?;

    if let Some(peer) = peer {
        match client.open_conversation(peer).await? {
            LoadOutcome::Loaded(n) => info!(peer, "Loaded {} messages", n),
            LoadOutcome::NoConversation => info!(peer, "New match, no messages yet"),
            LoadOutcome::Stale | LoadOutcome::Skipped => {}
        }
    }

    let mut status = client
        .subscribe_channel()
        .ok_or_else(|| anyhow::anyhow!("realtime channel did not start"))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                report(*status.borrow_and_update());
            }
        }
    }

    info!("Shutting down");
    client.shutdown().await;
    Ok(())
}

fn report(status: ChannelStatus) {
    match status.state {
        ConnectionState::Open => info!("Realtime connected"),
        ConnectionState::Connecting => info!(attempt = status.reconnect_attempts, "Realtime connecting"),
        ConnectionState::Closed if status.exhausted => {
            warn!("Realtime gave up; counters and conversation fall back to polling")
        }
        ConnectionState::Closed => warn!(attempt = status.reconnect_attempts, "Realtime disconnected"),
    }
}
