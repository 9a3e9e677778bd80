use crate::assistant::Assistant;
use crate::backend::admin::{ load_dashboard, ContactFilter, ReportFilter, TrustBand };
use crate::backend::{ BackendError, ReportingBackend };
use crate::chat::ConversationEvent;
use crate::cli::Command;
use crate::models::backend::{ Contact, ContactSubmission, Report, ReportSubmission };

use log::{ error, warn };
use std::error::Error;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio::sync::broadcast::error::RecvError;

const QUIT_COMMANDS: [&str; 3] = ["/quit", "/exit", "/q"];

/// Terminal rendition of the chat widget. Typing the number of a suggestion
/// sends it as a quick reply.
pub async fn run_chat(assistant: &Assistant) -> Result<(), Box<dyn Error + Send + Sync>> {
    let conversation = assistant.start_conversation().await;
    let suggestions = assistant.suggestions().await;

    for message in conversation.transcript() {
        println!("EcoVoice: {}\n", message.text);
    }
    if !suggestions.is_empty() {
        println!("Try asking:");
        for (i, suggestion) in suggestions.iter().enumerate() {
            println!("  [{}] {}", i + 1, suggestion);
        }
        println!("(type /quit to leave)\n");
    }

    let mut events = conversation.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConversationEvent::Typing) => println!("EcoVoice is typing..."),
                Ok(ConversationEvent::Reply(message)) => println!("EcoVoice: {}\n", message.text),
                Ok(ConversationEvent::UserMessage(_)) => {}
                Err(RecvError::Lagged(skipped)) => warn!("Console skipped {} chat events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if QUIT_COMMANDS.contains(&line) {
            break;
        }
        let text = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| suggestions.get(i))
            .map(String::as_str)
            .unwrap_or(line);
        if text != line {
            println!("You: {}", text);
        }
        conversation.submit(text);
    }

    conversation.settled().await;
    drop(conversation);
    if let Err(e) = printer.await {
        error!("Console printer task failed: {}", e);
    }
    Ok(())
}

pub async fn run_admin(
    command: Command,
    backend: &dyn ReportingBackend
) -> Result<(), Box<dyn Error + Send + Sync>> {
    match command {
        Command::Report { name, phone, description, location, incident_type, language } => {
            let submission = ReportSubmission {
                reporter_name: name,
                reporter_phone: phone,
                description,
                location,
                incident_type,
                language,
            };
            let receipt = backend.submit_report(&submission).await.map_err(explain)?;
            println!("Report submitted successfully! ID: {}...", receipt.short_id());
            println!("Trust Score: {}%", receipt.trust_score);
        }
        Command::Contact { name, email, organization, message } => {
            let submission = ContactSubmission { name, email, organization, message };
            backend.submit_contact(&submission).await.map_err(explain)?;
            println!("Message sent successfully! We'll get back to you soon.");
        }
        Command::Reports { search, status, incident_type } => {
            let reports = backend.list_reports().await.map_err(explain)?;
            let filter = ReportFilter { search, status, incident_type };
            let shown = filter.apply(&reports);
            println!("{} of {} reports", shown.len(), reports.len());
            for report in shown {
                println!("{}", format_report(report));
            }
        }
        Command::Contacts { search } => {
            let contacts = backend.list_contacts().await.map_err(explain)?;
            let shown = ContactFilter { search }.apply(&contacts);
            println!("{} of {} contact messages", shown.len(), contacts.len());
            for contact in shown {
                println!("{}", format_contact(contact));
            }
        }
        Command::Stats => {
            let dashboard = load_dashboard(backend).await.map_err(explain)?;
            let stats = &dashboard.stats;
            println!(
                "Reports: {} total, {} verified, {} pending, {} resolved",
                stats.total_reports,
                stats.verified_reports,
                stats.pending_reports,
                stats.resolved_reports
            );
            println!("Contacts: {}", stats.total_contacts);
            for (incident_type, count) in &stats.incident_types {
                println!("  {:<18} {}", incident_type, count);
            }
            println!("\nRecent reports:");
            for report in &dashboard.recent_reports {
                println!("{}", format_report(report));
            }
            println!("\nRecent contacts:");
            for contact in &dashboard.recent_contacts {
                println!("{}", format_contact(contact));
            }
        }
        Command::SetStatus { report_id, status } => {
            backend.update_report_status(&report_id, status).await.map_err(explain)?;
            println!("Report {} is now {}", report_id, status.label());
        }
        Command::PopulateDemo => {
            backend.populate_demo().await.map_err(explain)?;
            println!("Demo data populated.");
        }
        Command::Chat | Command::Ask { .. } | Command::Serve => {
            return Err("not an admin command".into());
        }
    }
    Ok(())
}

fn explain(err: BackendError) -> Box<dyn Error + Send + Sync> {
    if !err.is_validation() {
        error!("{}", err);
    }
    Box::new(err)
}

pub fn format_report(report: &Report) -> String {
    let status = report
        .status()
        .map(|s| s.label().to_string())
        .unwrap_or_else(|| report.status.replace('_', " "));
    format!(
        "{:<10} {:<12} {:>5.1}% ({:<6}) {:<17} {} | {}",
        report.id.chars().take(8).collect::<String>(),
        status,
        report.trust_score,
        TrustBand::from_score(report.trust_score),
        report.incident_type,
        report.location,
        report.description
    )
}

pub fn format_contact(contact: &Contact) -> String {
    let org = contact.organization
        .as_deref()
        .filter(|o| !o.is_empty())
        .map(|o| format!(" ({})", o))
        .unwrap_or_default();
    format!(
        "[{}] {} <{}>{} at {}: {}",
        contact.status,
        contact.name,
        contact.email,
        org,
        contact.created_at,
        contact.message
    )
}
