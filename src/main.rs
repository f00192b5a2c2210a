mod telemetry;

use nudge_api::Application;
use nudge_infra::{run_migration, setup_context};
use telemetry::{get_subscriber, init_subscriber};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    openssl_probe::init_ssl_cert_env_vars();

    let subscriber = get_subscriber("nudge_server".into(), "info".into());
    init_subscriber(subscriber);

    run_migration().await.map_err(into_io_error)?;
    let context = setup_context().await.map_err(into_io_error)?;

    let app = Application::new(context).await?;
    app.start().await
}

fn into_io_error(e: anyhow::Error) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{:?}", e))
}
