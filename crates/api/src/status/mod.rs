use crate::scheduler::{HealthReport, Scheduler};
use actix_web::{web, HttpResponse};
use nudge_api_structs::{dtos::HealthStatusDTO, get_service_health::*};
use nudge_infra::NudgeContext;

fn to_dto(report: HealthReport) -> HealthStatusDTO {
    HealthStatusDTO {
        status: report.status.to_string(),
        last_run: report.last_run,
        last_success: report.last_success,
        consecutive_failures: report.consecutive_failures,
        processed_total: report.processed_total,
        uptime_secs: report.uptime_secs,
        circuit_breakers: report.circuit_breakers,
        active_processing: report.active_processing,
    }
}

async fn status(
    ctx: web::Data<NudgeContext>,
    scheduler: web::Data<Scheduler>,
) -> HttpResponse {
    let report = scheduler.health_report(ctx.sys.get_timestamp_millis());
    HttpResponse::Ok().json(APIResponse::new(to_dto(report)))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::fakes::{TestEnv, NOW};
    use actix_web::{test, App};

    #[actix_web::test]
    async fn reports_the_scheduler_health() {
        let env = TestEnv::new().await;
        env.scheduler.state.record_cycle(NOW, true, 3);
        env.sys.advance(90 * 1000);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(env.ctx.clone()))
                .app_data(web::Data::from(env.scheduler.clone()))
                .configure(configure_routes),
        )
        .await;
        let req = test::TestRequest::get().uri("/status").to_request();
        let res: APIResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(res.health.status, "healthy");
        assert_eq!(res.health.last_success, Some(NOW));
        assert_eq!(res.health.processed_total, 3);
        assert_eq!(res.health.uptime_secs, 90);
        assert_eq!(res.health.active_processing, 0);
        assert_eq!(
            res.health.circuit_breakers.get("github").map(String::as_str),
            Some("closed")
        );
    }
}
