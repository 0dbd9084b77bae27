use actix_web::{get, post, web, HttpResponse, Responder};
use actix_multipart::Multipart;
use futures::{StreamExt, TryStreamExt};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{error, info};
use uuid::Uuid;

use crate::error::MatcherError;
use crate::job_manager::JobManager;
use crate::output_store;

pub struct AppState {
    pub job_manager: Arc<JobManager>,
    pub upload_dir: PathBuf,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(get_status)
        .service(start_processing)
        .service(stop_processing)
        .service(get_results)
        .service(download_results)
        .service(upload_input);
}

#[get("/api/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json("Server is running")
}

#[get("/api/status")]
async fn get_status(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.job_manager.snapshot())
}

#[post("/api/start")]
async fn start_processing(data: web::Data<AppState>) -> impl Responder {
    match data.job_manager.start() {
        Ok(run_id) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Processing started",
            "run_id": run_id,
        })),
        Err(e @ MatcherError::ConcurrentStartRejected) => {
            HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }))
        }
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() })),
    }
}

#[post("/api/stop")]
async fn stop_processing(data: web::Data<AppState>) -> impl Responder {
    let message = if data.job_manager.stop() {
        "Stop signal sent"
    } else {
        "No processing in progress"
    };
    HttpResponse::Ok().json(serde_json::json!({ "message": message }))
}

#[get("/api/results")]
async fn get_results(data: web::Data<AppState>) -> impl Responder {
    let output_path = data.job_manager.options().output_path.clone();
    if !output_path.exists() {
        return HttpResponse::Ok().json(serde_json::json!({ "error": "No results file found" }));
    }

    match output_store::read_rows(&output_path) {
        Ok(rows) => HttpResponse::Ok().json(rows),
        Err(e) => {
            error!("Failed to read results from {:?}: {}", output_path, e);
            HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }))
        }
    }
}

#[get("/api/download")]
async fn download_results(data: web::Data<AppState>) -> impl Responder {
    let output_path = &data.job_manager.options().output_path;
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "results.csv".to_string());

    match fs::read_to_string(output_path) {
        Ok(content) => HttpResponse::Ok()
            .content_type("text/csv")
            .append_header(("Content-Disposition", format!("attachment; filename=\"{}\"", file_name)))
            .body(content),
        Err(_) => HttpResponse::NotFound().body("Result file not generated yet."),
    }
}

/// Replaces the input file with the multipart field `file`. Refused while a
/// run is reading it.
#[post("/api/upload")]
async fn upload_input(mut payload: Multipart, data: web::Data<AppState>) -> impl Responder {
    if data.job_manager.is_processing() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": MatcherError::InputBusy.to_string()
        }));
    }

    let expected_ext = extension_of(&data.job_manager.options().input_path);
    let mut saved: Option<PathBuf> = None;

    while let Ok(Some(mut field)) = payload.try_next().await {
        let content_disposition = field.content_disposition();
        if content_disposition.get_name().unwrap_or("") != "file" {
            continue;
        }

        let original_ext = content_disposition
            .get_filename()
            .map(|name| extension_of(Path::new(name)))
            .unwrap_or_else(|| expected_ext.clone());
        if original_ext != expected_ext {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("Expected a .{} file", expected_ext)
            }));
        }

        if let Err(e) = fs::create_dir_all(&data.upload_dir) {
            return upload_failed(e);
        }
        let upload_path = data.upload_dir.join(format!("{}.{}", Uuid::new_v4(), expected_ext));
        let mut f = match fs::File::create(&upload_path) {
            Ok(f) => f,
            Err(e) => return upload_failed(e),
        };
        while let Some(chunk) = field.next().await {
            let written = match chunk {
                Ok(bytes) => f.write_all(&bytes),
                Err(e) => Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
            };
            if let Err(e) = written {
                return upload_failed(e);
            }
        }
        saved = Some(upload_path);
    }

    let Some(upload_path) = saved else {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "Missing 'file' field" }));
    };
    // A run may have started while the body was streaming in.
    match data.job_manager.replace_input(&upload_path) {
        Ok(()) => {}
        Err(e @ MatcherError::InputBusy) => {
            return HttpResponse::BadRequest().json(serde_json::json!({ "error": e.to_string() }));
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            return HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }));
        }
    }

    info!("Input replaced from upload {:?}", upload_path);
    HttpResponse::Ok().json(serde_json::json!({
        "message": "File uploaded. Start processing to use it."
    }))
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| "csv".to_string())
}

fn upload_failed(e: std::io::Error) -> HttpResponse {
    error!("Upload failed: {}", e);
    HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::job_manager::ProviderFactory;
    use crate::models::{EnrichmentResult, Identity};
    use crate::pipeline::PipelineOptions;
    use crate::provider::{Credentials, EnrichmentProvider, PlaceholderProvider};
    use actix_web::{http::StatusCode, test, App};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    struct GatedProvider {
        release: Arc<AtomicBool>,
    }

    impl EnrichmentProvider for GatedProvider {
        fn login(&mut self, _credentials: &Credentials) -> Result<bool, ProviderError> {
            Ok(true)
        }

        fn lookup(&mut self, _identity: &Identity) -> Result<EnrichmentResult, ProviderError> {
            while !self.release.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(10));
            }
            Ok(EnrichmentResult::pending())
        }
    }

    fn state(dir: &tempfile::TempDir, factory: ProviderFactory) -> web::Data<AppState> {
        let input_path = dir.path().join("input_emails.csv");
        fs::write(&input_path, "Email,Name\na@x.com,A\n,B\nc@x.com,\n").unwrap();
        let options = PipelineOptions {
            input_path,
            output_path: dir.path().join("linkedin_results.csv"),
            delay: Duration::ZERO,
            credentials: Credentials { email: "me@x.com".into(), password: "pw".into() },
        };
        web::Data::new(AppState {
            job_manager: Arc::new(JobManager::new(options, factory)),
            upload_dir: dir.path().join("uploads"),
        })
    }

    fn placeholder_factory() -> ProviderFactory {
        Arc::new(|| Ok(Box::new(PlaceholderProvider) as Box<dyn EnrichmentProvider>))
    }

    async fn wait_until_idle(data: &web::Data<AppState>) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while data.job_manager.is_processing() {
            assert!(Instant::now() < deadline, "run did not finish");
            actix_web::rt::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[actix_web::test]
    async fn double_start_yields_one_run_and_one_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let gate = release.clone();
        let factory: ProviderFactory = Arc::new(move || {
            Ok(Box::new(GatedProvider { release: gate.clone() }) as Box<dyn EnrichmentProvider>)
        });
        let data = state(&dir, factory);
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        let first = test::call_service(&app, test::TestRequest::post().uri("/api/start").to_request()).await;
        let second = test::call_service(&app, test::TestRequest::post().uri("/api/start").to_request()).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(second).await;
        assert_eq!(body["error"], "Processing already in progress");

        let status: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/status").to_request(),
        )
        .await;
        assert_eq!(status["is_processing"], true);

        release.store(true, Ordering::SeqCst);
        wait_until_idle(&data).await;
        assert_eq!(data.job_manager.snapshot().status, "completed");
    }

    #[actix_web::test]
    async fn results_reflect_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(&dir, placeholder_factory());
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        let before: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/results").to_request(),
        )
        .await;
        assert_eq!(before["error"], "No results file found");

        test::call_service(&app, test::TestRequest::post().uri("/api/start").to_request()).await;
        wait_until_idle(&data).await;

        let rows: serde_json::Value = test::call_and_read_body_json(
            &app,
            test::TestRequest::get().uri("/api/results").to_request(),
        )
        .await;
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Email"], "a@x.com");
        assert_eq!(rows[0]["Status"], "Pending");
        assert_eq!(rows[1]["Email"], "c@x.com");

        let download = test::call_service(&app, test::TestRequest::get().uri("/api/download").to_request()).await;
        assert_eq!(download.status(), StatusCode::OK);
        let body = test::read_body(download).await;
        assert!(body.starts_with(b"Email,Name,LinkedIn_URL"));
    }

    #[actix_web::test]
    async fn stop_without_run_is_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(&dir, placeholder_factory());
        let app = test::init_service(App::new().app_data(data).configure(configure)).await;

        let resp = test::call_service(&app, test::TestRequest::post().uri("/api/stop").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "No processing in progress");
    }

    fn upload_request(email: &str) -> test::TestRequest {
        let boundary = "XBOUNDARYX";
        let payload = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"emails.csv\"\r\n\
             Content-Type: text/csv\r\n\r\nEmail\r\n{email}\r\n\r\n--{b}--\r\n",
            b = boundary,
            email = email
        );
        test::TestRequest::post()
            .uri("/api/upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(payload)
    }

    #[actix_web::test]
    async fn upload_refused_during_run() {
        let dir = tempfile::tempdir().unwrap();
        let release = Arc::new(AtomicBool::new(false));
        let gate = release.clone();
        let factory: ProviderFactory = Arc::new(move || {
            Ok(Box::new(GatedProvider { release: gate.clone() }) as Box<dyn EnrichmentProvider>)
        });
        let data = state(&dir, factory);
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        test::call_service(&app, test::TestRequest::post().uri("/api/start").to_request()).await;
        let resp = test::call_service(&app, upload_request("z@x.com").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        release.store(true, Ordering::SeqCst);
        wait_until_idle(&data).await;
        let input = fs::read_to_string(&data.job_manager.options().input_path).unwrap();
        assert!(input.contains("a@x.com"));
        assert!(!input.contains("z@x.com"));
    }

    #[actix_web::test]
    async fn upload_replaces_input() {
        let dir = tempfile::tempdir().unwrap();
        let data = state(&dir, placeholder_factory());
        let app = test::init_service(App::new().app_data(data.clone()).configure(configure)).await;

        let req = upload_request("z@x.com").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let input = fs::read_to_string(&data.job_manager.options().input_path).unwrap();
        assert!(input.contains("z@x.com"));
        assert!(!input.contains("a@x.com"));
    }
}
