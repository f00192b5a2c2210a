mod helpers;

use helpers::setup::spawn_app;

#[actix_web::main]
#[test]
async fn test_status_reports_starting_scheduler() {
    let (sdk, _) = spawn_app().await;
    let res = sdk.status.get().await.expect("Expected status response");

    assert_eq!(res.health.status, "starting");
    assert_eq!(res.health.last_run, None);
    assert_eq!(res.health.consecutive_failures, 0);
    assert_eq!(res.health.processed_total, 0);
    assert_eq!(res.health.active_processing, 0);
    assert_eq!(
        res.health.circuit_breakers.get("github").map(String::as_str),
        Some("closed")
    );
    assert_eq!(
        res.health.circuit_breakers.get("telegram").map(String::as_str),
        Some("closed")
    );
}

#[actix_web::main]
#[test]
async fn test_unknown_route_is_not_found() {
    let (_, address) = spawn_app().await;
    let res = reqwest::get(format!("{}/api/v1/reminders", address))
        .await
        .expect("Expected response");
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
}
