use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing to log one line per HTTP request with timing. Only the path is
/// logged; query strings and headers may carry tokens.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let start_time = request.local_cache(Instant::now);
        let duration = start_time.elapsed();
        let status = response.status();

        let line = format!(
            "{} {} -> {} ({:.2}ms)",
            request.method(),
            request.uri().path(),
            status.code,
            duration.as_secs_f64() * 1000.0
        );
        if status.code >= 500 {
            log::warn!("{}", line);
        } else {
            log::info!("{}", line);
        }
    }
}
