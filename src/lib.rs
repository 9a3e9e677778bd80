pub mod assistant;
pub mod backend;
pub mod chat;
pub mod cli;
pub mod config;
pub mod console;
pub mod models;
pub mod server;

use assistant::Assistant;
use backend::{ BackendConfig, HttpBackend };
use cli::{ Args, Command };
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let command = args.command.clone().unwrap_or(Command::Chat);

    match command {
        Command::Chat => {
            let assistant = Assistant::new(&args)?;
            console::run_chat(&assistant).await
        }
        Command::Ask { message } => {
            let assistant = Assistant::new(&args)?;
            println!("{}", assistant.ask(&message.join(" ")).await);
            Ok(())
        }
        Command::Serve => serve(args).await,
        admin => {
            info!("Backend URL: {}", args.backend_url);
            let backend = HttpBackend::new(BackendConfig {
                base_url: args.backend_url.clone(),
                token: args.admin_token.clone(),
                timeout: Duration::from_secs(args.backend_timeout_secs),
            })?;
            console::run_admin(admin, &backend).await
        }
    }
}

async fn serve(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP Port: {:?}", args.http_port);
    info!("Knowledge Path: {}", args.knowledge_path);
    info!("Reply Delay: {}ms (+ up to {}ms)", args.reply_delay_ms, args.reply_jitter_ms);
    info!("Client Auth: {}", if args.server_api_key.is_some() { "HMAC" } else { "none" });
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let assistant = Arc::new(Assistant::new(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, assistant, args.server_api_key.clone(), args.clone());
    server.run().await?;

    Ok(())
}
