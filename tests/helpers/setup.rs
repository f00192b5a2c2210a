use nudge_api::Application;
use nudge_infra::NudgeContext;
use nudge_sdk::NudgeSDK;
use std::time::Duration;

// Launch the application as a background task
pub async fn spawn_app() -> (NudgeSDK, String) {
    let mut ctx = NudgeContext::create_inmemory();
    ctx.config.port = 0; // Random port
    // Keep the scheduler loop out of the way of the status assertions
    ctx.config.startup_delay = Duration::from_secs(60 * 60);

    let application = Application::new(ctx)
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    let sdk = NudgeSDK::new(address.clone());
    (sdk, address)
}
