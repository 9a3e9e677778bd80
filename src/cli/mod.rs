use crate::models::backend::{ IncidentType, Language, ReportStatus };
use clap::{ Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat Assistant Args ---
    /// Path to the knowledge file (greetings, topics, fallbacks, suggestions).
    /// The built-in knowledge is used when the file does not exist.
    #[arg(long, env = "KNOWLEDGE_PATH", default_value = "json/knowledge.json")]
    pub knowledge_path: String,

    /// Base "thinking" delay before the assistant replies, in milliseconds.
    #[arg(long, env = "REPLY_DELAY_MS", default_value = "800")]
    pub reply_delay_ms: u64,

    /// Random extra delay added on top of the base delay, up to this many milliseconds.
    #[arg(long, env = "REPLY_JITTER_MS", default_value = "600")]
    pub reply_jitter_ms: u64,

    // --- Backend Args ---
    /// Base URL of the EcoVoice REST backend.
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Bearer token sent to the backend for admin operations.
    #[arg(long, env = "ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Timeout for backend requests, in seconds.
    #[arg(long, env = "BACKEND_TIMEOUT_SECS", default_value = "10")]
    pub backend_timeout_secs: u64,

    // --- Server Args ---
    /// Host address and port for the WebSocket chat server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Optional port for the HTTP API (suggestions, one-shot answers, knowledge reload).
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Optional key WebSocket clients must sign their connection timestamp with. If set, clients must provide ts/sig.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Chat with the assistant in the terminal (default).
    Chat,
    /// Print the assistant's answer to a single message.
    Ask {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Run the WebSocket chat server (and the HTTP API when --http-port is set).
    Serve,
    /// Submit an environmental incident report.
    Report {
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, short = 'd')]
        description: String,
        #[arg(long, short = 'l')]
        location: String,
        /// One of: Illegal Dumping, Water Pollution, Air Pollution, Illegal Logging,
        /// Wildlife Crime, Land Degradation, Coastal Damage, Other
        #[arg(long, short = 't', default_value = "Illegal Dumping")]
        incident_type: IncidentType,
        /// en, fil or ceb
        #[arg(long, default_value = "en")]
        language: Language,
    },
    /// Send a message to the EcoVoice team.
    Contact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        organization: String,
        #[arg(long, short = 'm')]
        message: String,
    },
    /// List reports, optionally filtered.
    Reports {
        /// Matches description, location or reporter name (case-insensitive).
        #[arg(long, short = 's')]
        search: Option<String>,
        #[arg(long)]
        status: Option<ReportStatus>,
        #[arg(long, short = 't')]
        incident_type: Option<IncidentType>,
    },
    /// List contact messages, optionally filtered.
    Contacts {
        /// Matches name, email, message or organization (case-insensitive).
        #[arg(long, short = 's')]
        search: Option<String>,
    },
    /// Show the admin dashboard: stats, recent reports and contacts.
    Stats,
    /// Change a report's status.
    SetStatus {
        report_id: String,
        /// pending_verification, verified, in_progress, resolved or rejected
        status: ReportStatus,
    },
    /// Ask the backend to seed demo data.
    PopulateDemo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_subcommand() {
        let args = Args::try_parse_from(["ecovoice"]).unwrap();
        assert!(args.command.is_none());
        assert_eq!(args.reply_delay_ms, 800);
        assert_eq!(args.reply_jitter_ms, 600);
    }

    #[test]
    fn parses_report_fields() {
        let args = Args::try_parse_from([
            "ecovoice",
            "report",
            "-d",
            "Oil slick",
            "-l",
            "Manila Bay",
            "-t",
            "water-pollution",
            "--language",
            "fil",
        ]).unwrap();
        match args.command {
            Some(Command::Report { incident_type, language, .. }) => {
                assert_eq!(incident_type, IncidentType::WaterPollution);
                assert_eq!(language, Language::Fil);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn contacts_take_a_search_term() {
        let args = Args::try_parse_from(["ecovoice", "contacts", "--search", "reef"]).unwrap();
        match args.command {
            Some(Command::Contacts { search }) => assert_eq!(search.as_deref(), Some("reef")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Args::try_parse_from(["ecovoice", "set-status", "abc", "archived"]).is_err());
    }
}
