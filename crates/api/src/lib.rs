mod job_schedulers;
pub mod reminder;
pub mod scheduler;
mod shared;
mod status;

use actix_cors::Cors;
use actix_web::{dev::Server, web, App, HttpServer};
use job_schedulers::{start_channel_status_job, start_reminder_scheduler};
use nudge_infra::NudgeContext;
use scheduler::{shutdown, Scheduler};
use std::{net::TcpListener, sync::Arc};
use tracing::info;
use tracing_actix_web::TracingLogger;

pub use shared::usecase::{execute, UseCase};

pub fn configure_server_api(cfg: &mut web::ServiceConfig) {
    status::configure_routes(cfg);
}

pub struct Application {
    server: Server,
    port: u16,
    context: NudgeContext,
    scheduler: Arc<Scheduler>,
}

impl Application {
    pub async fn new(context: NudgeContext) -> Result<Self, std::io::Error> {
        let scheduler = Arc::new(Scheduler::new(&context));
        let (server, port) =
            Application::configure_server(context.clone(), scheduler.clone()).await?;
        Application::start_job_schedulers(context.clone(), scheduler.clone());

        Ok(Self {
            server,
            port,
            context,
            scheduler,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn start_job_schedulers(context: NudgeContext, scheduler: Arc<Scheduler>) {
        start_reminder_scheduler(context.clone(), scheduler.clone());
        start_channel_status_job(context, scheduler);
    }

    async fn configure_server(
        context: NudgeContext,
        scheduler: Arc<Scheduler>,
    ) -> Result<(Server, u16), std::io::Error> {
        let port = context.config.port;
        let address = format!("0.0.0.0:{}", port);
        let listener = TcpListener::bind(&address)?;
        let port = listener.local_addr()?.port();

        let server = HttpServer::new(move || {
            let ctx = context.clone();

            App::new()
                .wrap(Cors::permissive())
                .wrap(TracingLogger::default())
                .app_data(web::Data::new(ctx))
                .app_data(web::Data::from(scheduler.clone()))
                .service(web::scope("/api/v1").configure(configure_server_api))
        })
        .listen(listener)?
        .workers(2)
        // Signals are handled by `start` so in-flight reminders can drain first
        .disable_signals()
        .run();

        Ok((server, port))
    }

    /// Runs until the server stops or a termination signal arrives. On a
    /// signal the scheduler stops picking up reminders and waits for the
    /// in-flight ones before the server is stopped.
    pub async fn start(self) -> Result<(), std::io::Error> {
        let handle = self.server.handle();
        let mut server = self.server;

        tokio::select! {
            res = &mut server => return res,
            signal = shutdown_signal() => {
                info!("Received {}", signal);
            }
        }

        let forced = shutdown::drain(
            &self.scheduler.state,
            self.context.config.shutdown_grace_period,
        )
        .await;
        handle.stop(!forced).await;
        server.await
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::warn!("Unable to listen for SIGTERM: {:?}", e);
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
