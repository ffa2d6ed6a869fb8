//src/main.rs

use chrono::Utc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use booking_backend::{
    config::{AppState, Settings},
    routes,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let settings = Settings::from_env()?;
    let (app_state, db_pool) = AppState::new(&settings).await?;

    sqlx::migrate!().run(&db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    // Varredura periódica de lembretes
    let reminders = app_state.reminder_service.clone();
    let every = settings.reminder_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            if let Err(e) = reminders.send_due_reminders(Utc::now()).await {
                tracing::error!("Falha na varredura de lembretes: {}", e);
            }
        }
    });

    let app = routes::app(app_state);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
