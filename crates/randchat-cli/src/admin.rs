//! Polling session viewer
//!
//! Renders the server's counters and recent sessions, refreshing on an
//! interval. A failed fetch is logged and retried on the next tick.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use randchat_core::protocol::parse_timestamp;
use randchat_core::reporting::Snapshot;
use randchat_core::{
    ClientConfig, ReportingClient, ReportingConfig, SessionDetail, SessionSummary, Stats,
};
use serde_json::json;

use crate::AdminArgs;

pub async fn run_admin(
    config: &ClientConfig,
    reporting: &ReportingConfig,
    args: &AdminArgs,
    json_output: bool,
) -> Result<(), String> {
    let client = ReportingClient::new(config).map_err(|e| e.to_string())?;
    tracing::info!("Reading sessions from {}", client.api_url());

    if let Some(session_id) = &args.session {
        let detail = client.session(session_id).await.map_err(|e| e.to_string())?;
        if json_output {
            println!("{}", json!(detail));
        } else {
            print!("{}", render_detail(&detail));
        }
        return Ok(());
    }

    if args.once {
        let snapshot = client
            .snapshot(reporting.session_limit)
            .await
            .map_err(|e| e.to_string())?;
        print_snapshot(&snapshot, json_output);
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_millis(reporting.poll_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }

        match client.snapshot(reporting.session_limit).await {
            Ok(snapshot) => print_snapshot(&snapshot, json_output),
            Err(e) => tracing::warn!("Failed to fetch data: {}", e),
        }
    }
}

fn print_snapshot(snapshot: &Snapshot, json_output: bool) {
    if json_output {
        println!(
            "{}",
            json!({ "stats": snapshot.stats, "sessions": snapshot.sessions })
        );
    } else {
        println!("{}", render_stats(&snapshot.stats));
        print!("{}", render_sessions(&snapshot.sessions));
    }
}

fn render_stats(stats: &Stats) -> String {
    format!(
        "online {} | active sessions {} | total sessions {} | waiting {}",
        stats.online_users, stats.active_sessions, stats.total_sessions, stats.waiting_queue
    )
}

fn render_sessions(sessions: &[SessionSummary]) -> String {
    if sessions.is_empty() {
        return "No sessions yet\n".to_string();
    }

    let mut out = format!(
        "{:<38} {:<30} {:>8} {:<19} {}\n",
        "SESSION", "USERS", "MESSAGES", "STARTED", "STATUS"
    );
    for s in sessions {
        let users = format!("{} <-> {}", s.user1_username, s.user2_username);
        let status = if s.is_active() { "Active" } else { "Ended" };
        out.push_str(&format!(
            "{:<38} {:<30} {:>8} {:<19} {}\n",
            s.session_id,
            users,
            s.message_count,
            local_time(s.started(), &s.started_at),
            status
        ));
    }
    out
}

fn render_detail(detail: &SessionDetail) -> String {
    let ended = match &detail.ended_at {
        Some(raw) if !detail.is_active() => local_time(parse_timestamp(raw), raw),
        _ => "Active".to_string(),
    };
    let started = local_time(
        parse_timestamp(&detail.started_at),
        &detail.started_at,
    );

    let mut out = format!(
        "Session {}\n  {} <-> {}\n  started {}\n  ended   {}\n\nMessages ({})\n",
        detail.session_id,
        detail.user1_username,
        detail.user2_username,
        started,
        ended,
        detail.messages.len()
    );
    if detail.messages.is_empty() {
        out.push_str("  No messages in this session\n");
    }
    for m in &detail.messages {
        let at = local_time(
            parse_timestamp(&m.timestamp),
            &m.timestamp,
        );
        out.push_str(&format!("  [{}] {}: {}\n", at, m.sender_username, m.message));
    }
    out
}

/// Local time for display, or the raw value when it does not parse
fn local_time(parsed: Option<DateTime<Utc>>, raw: &str) -> String {
    parsed
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| raw.to_string())
}
