use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use mahalla::backend::{ConversationBackend, LocalBackend, ProfileBackend};
use mahalla::bus::EventBus;
use mahalla::chat::{ConversationId, ConversationStatus};
use mahalla::config::Config;
use mahalla::entity::{Actor, Role};
use mahalla::portal::auth::admit_staff;
use mahalla::portal::{
    self, DashboardStats, DepartmentDetail, FeedFilter, Location, RequestDraft, StatusCounts,
    RECENT_REQUESTS,
};
use mahalla::store::Store;
use mahalla::sync::{AuthorBadge, ChatSurface, Delivery, Entry, ReadOnlyHistory, ViewState};

const HELP: &str = "\
Commands:
  /open <id>                      open a request's chat
  /close                          close the chat
  /history <id>                   read-only transcript (super admin)
  /requests                       your requests, or the staff feed
  /new <role> <lat>,<lng> <title> | <description>
  /status <id> <status> [reason]  change a request's status (staff)
  /reason <id>                    why a request was rejected
  /stats [<role>|json]            dashboard, or one department (super admin)
  /quit
Anything else is sent to the open chat.";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before the subscriber so RUST_LOG from it applies
    let dotenv = dotenvy::dotenv();

    // Initialize logging with default filter if RUST_LOG is not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenv {
        info!("No .env file found or failed to load: {}", e);
    }

    let config = Config::from_env()?;
    info!("Mahalla client starting...");

    info!("Initializing store at {}", config.db_path.display());
    let store = Store::new(&config.db_path).await?;
    store.init().await?;

    let bus = Arc::new(EventBus::with_capacity(config.bus_capacity));
    let backend = Arc::new(LocalBackend::new(store, bus));

    let actor_id = config
        .actor_id
        .clone()
        .context("MAHALLA_ACTOR_ID is not set")?;
    let actor = backend
        .get_profile(&actor_id)
        .await?
        .with_context(|| format!("No profile for actor {}", actor_id))?;
    info!("Signed in as {} [{}]", actor, actor.role.display_name());

    let mut surface = ChatSurface::new(actor, backend.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
            push = surface.next_push() => {
                if let Some(message) = push {
                    if surface.apply_push(message) {
                        if let Some(entry) = surface.view().entries().last() {
                            print_entry(entry);
                        }
                    }
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match handle_line(&mut surface, &backend, line.trim()).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => error!("{:#}", e),
                }
            }
        }
    }

    surface.close().await;
    Ok(())
}

/// Returns `Ok(false)` when the user asked to quit.
async fn handle_line(
    surface: &mut ChatSurface,
    backend: &Arc<LocalBackend>,
    line: &str,
) -> Result<bool> {
    if line.is_empty() {
        return Ok(true);
    }
    if !line.starts_with('/') {
        send(surface, line).await;
        return Ok(true);
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let actor = surface.actor().clone();

    match command {
        "/quit" => return Ok(false),
        "/help" => println!("{}", HELP),
        "/open" => {
            let id = ConversationId::new(rest);
            let conversation = backend.get_conversation(&id).await?;
            println!(
                "#{} • {} • {} ({})",
                conversation.id.short(),
                conversation.status.label(),
                conversation.title,
                conversation.target_role.display_name()
            );
            if let Err(e) = surface.open(id, conversation.status).await {
                warn!("Failed to open chat: {}", e);
            }
            print_view(surface);
        }
        "/close" => surface.close().await,
        "/history" => {
            if !actor.is_super_admin() {
                println!("Only the super admin can browse transcripts.");
                return Ok(true);
            }
            let history = ReadOnlyHistory::load(backend.as_ref(), &ConversationId::new(rest)).await?;
            if let Some(placeholder) = history.placeholder() {
                println!("{}", placeholder);
            }
            for entry in &history.entries {
                let badge = match entry.badge {
                    AuthorBadge::Official => "official",
                    AuthorBadge::Citizen => "citizen",
                };
                println!(
                    "[{}] {} ({}): {}",
                    entry.message.created_at.format("%H:%M"),
                    entry.author_name,
                    badge,
                    entry.message.text
                );
            }
        }
        "/requests" => print_requests(backend, &actor).await?,
        "/new" => {
            let draft = parse_draft(rest)?;
            let conversation = portal::submit_request(backend.as_ref(), &actor, &draft).await?;
            println!("Request #{} filed ({})", conversation.id.short(), conversation.id);
        }
        "/status" => {
            let mut parts = rest.splitn(3, ' ');
            let id = ConversationId::new(parts.next().unwrap_or_default());
            let status: ConversationStatus = parts
                .next()
                .unwrap_or_default()
                .parse()
                .map_err(anyhow::Error::msg)?;
            let reason = parts.next();
            portal::update_status(backend.as_ref(), backend.as_ref(), &actor, &id, status, reason)
                .await?;
            println!("#{} → {}", id.short(), status.label());
        }
        "/reason" => {
            let reason = portal::rejection_reason(backend.as_ref(), &ConversationId::new(rest)).await?;
            println!("{}", reason);
        }
        "/stats" => match rest {
            "" => print_dashboard(&portal::load_dashboard(backend.as_ref(), &actor).await?),
            "json" => {
                let stats = portal::load_dashboard(backend.as_ref(), &actor).await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            role => {
                let role: Role = role.parse()?;
                print_department(&portal::load_department(backend.as_ref(), &actor, role).await?);
            }
        },
        other => println!("Unknown command {}. Try /help.", other),
    }

    Ok(true)
}

async fn send(surface: &mut ChatSurface, text: &str) {
    match surface.send(text).await {
        Ok(_) => {
            if let Some(entry) = surface.view().entries().last() {
                print_entry(entry);
            }
        }
        Err(e) => warn!("Message not sent: {}", e),
    }
    for notice in surface.take_notices() {
        println!("! {}", notice.text());
    }
}

async fn print_requests(backend: &Arc<LocalBackend>, actor: &Actor) -> Result<()> {
    if admit_staff(actor).is_err() {
        let summaries = portal::load_my_requests(backend.as_ref(), actor, Some(RECENT_REQUESTS)).await?;
        if summaries.is_empty() {
            println!("No requests yet.");
        }
        for summary in summaries {
            let c = &summary.conversation;
            let unread = if summary.has_unread() { " *" } else { "" };
            println!("#{} [{}] {}{}", c.id.short(), c.status.label(), c.title, unread);
        }
    } else {
        let feed = portal::load_staff_feed(backend.as_ref(), actor, &FeedFilter::default()).await?;
        if feed.is_empty() {
            println!("No requests found.");
        }
        for c in feed {
            println!(
                "{} [{}] {} ({})",
                c.id,
                c.status.label(),
                c.title,
                c.requester_name.as_deref().unwrap_or("Foydalanuvchi")
            );
        }
    }
    Ok(())
}

fn counts_line(counts: &StatusCounts) -> String {
    format!(
        "{}/{} hal qilindi ({}%)  ⏳ {}  🔄 {}  ✅ {}  ❌ {}",
        counts.done,
        counts.total,
        counts.done_percent(),
        counts.pending,
        counts.progress,
        counts.done,
        counts.rejected
    )
}

fn print_dashboard(stats: &DashboardStats) {
    println!("Jami: {}", counts_line(&stats.overall));

    let departments = stats.ranked_departments();
    if departments.is_empty() {
        println!("Hali murojaatlar yo'q");
    }
    for (role, counts) in departments {
        println!("  {:<24} {}", role.display_name(), counts_line(&counts));
    }

    if !stats.recent.is_empty() {
        println!("So'nggi murojaatlar:");
    }
    for c in &stats.recent {
        println!(
            "  #{} [{}] {} → {}",
            c.id.short(),
            c.status.label(),
            c.title,
            c.target_role.display_name()
        );
    }
}

fn print_department(detail: &DepartmentDetail) {
    println!("{}: {}", detail.role.display_name(), counts_line(&detail.counts));
    if detail.requests.is_empty() {
        println!("Murojaatlar yo'q");
    }
    for c in &detail.requests {
        println!(
            "  {} [{}] {} ({}, {})",
            c.id,
            c.status.label(),
            c.title,
            c.requester_name.as_deref().unwrap_or("Noma'lum"),
            c.created_at.format("%d.%m.%Y")
        );
    }
}

fn parse_draft(rest: &str) -> Result<RequestDraft> {
    let mut parts = rest.splitn(3, ' ');
    let role: Role = parts.next().unwrap_or_default().parse()?;
    let coords = parts.next().unwrap_or_default();
    let (lat, lng) = coords
        .split_once(',')
        .context("Location must look like <lat>,<lng>")?;
    let (title, description) = parts.next().unwrap_or_default().split_once('|').unwrap_or(("", ""));

    Ok(RequestDraft {
        title: title.to_string(),
        description: description.to_string(),
        target_role: Some(role),
        location: Some(Location {
            lat: lat.trim().parse().context("Bad latitude")?,
            lng: lng.trim().parse().context("Bad longitude")?,
        }),
        image_url: None,
    })
}

fn print_view(surface: &ChatSurface) {
    match surface.view().state() {
        ViewState::Empty(placeholder) => println!("{}", placeholder.text()),
        ViewState::Error(_) => println!("Xatolik yuz berdi"),
        ViewState::Ready => surface.view().entries().iter().for_each(print_entry),
        ViewState::Idle | ViewState::Loading => {}
    }
    if surface.active().is_some() && !surface.is_live() {
        println!("(live updates unavailable; reopen to refresh)");
    }
}

fn print_entry(entry: &Entry) {
    let time = entry.created_at.format("%H:%M");
    if entry.mine {
        let check = match entry.delivery {
            Some(Delivery::Delivered) => "✓✓",
            _ => "✓",
        };
        println!("[{}] Siz: {} {}", time, entry.text, check);
    } else {
        println!("[{}] {}: {}", time, entry.sender_id, entry.text);
    }
}
