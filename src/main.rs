use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use intake_assist::config::{GatewayConfig, ServerConfig};
use intake_assist::gateway::{HttpGateway, SubmissionGateway};
use intake_assist::routes::{SessionRouteState, session_routes};
use intake_assist::session::SessionController;
use intake_assist::transcript::Role;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let gateway_config = GatewayConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    eprintln!("💧 Intake Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Backend: {}", gateway_config.api_base);

    let gateway: Arc<dyn SubmissionGateway> = Arc::new(HttpGateway::new(gateway_config)?);
    let controller = Arc::new(SessionController::new(gateway));

    match server_config.http_port {
        Some(port) => serve(controller, port).await,
        None => repl(controller).await,
    }
}

async fn serve(controller: Arc<SessionController>, port: u16) -> anyhow::Result<()> {
    let app = session_routes(SessionRouteState { controller });
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    eprintln!("   Session API: http://0.0.0.0:{port}/api/session");
    tracing::info!(port, "Session server started");
    axum::serve(listener, app).await?;
    Ok(())
}

/// stdin/stdout chat. `/reiniciar`, `/inicio`, `/foto <ruta>`, `/quit`.
async fn repl(controller: Arc<SessionController>) -> anyhow::Result<()> {
    eprintln!("   Escribe tu mensaje y presiona Enter. /quit para salir.\n");

    let mut cursor = Cursor::default();
    cursor.print_new(&controller).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "/quit" | "/exit" => break,
            "/reiniciar" => controller.restart().await,
            "/inicio" => controller.go_home().await,
            _ => {
                if let Some(path) = line.strip_prefix("/foto ") {
                    if let Err(e) = controller.handle_image_file(path.trim()).await {
                        tracing::debug!(error = %e, "Image not attached");
                    }
                } else {
                    controller.handle_user_input(line).await;
                }
            }
        }
        cursor.print_new(&controller).await;
        eprint!("> ");
    }
    Ok(())
}

/// How much of the transcript has been printed. Every reset rotates the
/// conversation epoch and clears the transcript, so a new epoch prints from
/// the top.
#[derive(Default)]
struct Cursor {
    epoch: Option<Uuid>,
    shown: usize,
}

impl Cursor {
    async fn print_new(&mut self, controller: &SessionController) {
        let session = controller.session();
        let session = session.lock().await;
        let epoch = session.state().epoch;
        if self.epoch != Some(epoch) {
            self.epoch = Some(epoch);
            self.shown = 0;
        }
        let transcript = session.transcript();
        for entry in transcript.since(self.shown) {
            if entry.role == Role::Assistant {
                println!("\n{}\n", entry.text);
            }
        }
        self.shown = transcript.len();
    }
}
