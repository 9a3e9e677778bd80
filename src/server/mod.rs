pub mod api;
pub mod websocket;

use crate::assistant::Assistant;
use crate::cli::Args;
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    assistant: Arc<Assistant>,
    api_key: Option<String>,
    args: Args,
}

impl Server {
    pub fn new(
        addr: String,
        assistant: Arc<Assistant>,
        api_key: Option<String>,
        args: Args,
    ) -> Self {
        Self {
            addr,
            assistant,
            api_key,
            args,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.args.http_port {
            self.start_http_server(http_port).await?;
        }

        self.start_ws_server().await
    }

    async fn start_http_server(&self, http_port: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        api::start_http_server(
            http_port,
            Arc::clone(&self.assistant),
            self.args.clone(),
        ).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            Arc::clone(&self.assistant),
            self.api_key.clone(),
            self.args.clone(),
        ).await
    }
}
