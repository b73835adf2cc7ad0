// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The HTTP intake API.
//
// POST /print accepts a job and redirects to its status page; GET /job/{id}
// is the polling read path, with PNG variants for the verification photo.
// Every error is a well-formed JSON body.  Producers run one per request;
// all device work happens on the single print worker behind the queue.

use std::future::{ready, Ready};
use std::sync::{Arc, Mutex};

use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::web::{self, Data};
use actix_web::{get, middleware, post, App, FromRequest, HttpRequest, HttpResponse, HttpServer};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use labelproof_core::config::AppConfig;
use labelproof_core::error::LabelproofError;
use labelproof_core::types::{JobRecord, PLACEHOLDER_PNG};
use labelproof_print::advertise::ServiceAdvertiser;
use labelproof_print::camera::CommandCamera;
use labelproof_print::store::JobStore;
use labelproof_print::worker::{self, JobSender};
use labelproof_print::thumbnail;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServiceState {
    sender: JobSender,
    config: Arc<AppConfig>,
}

/// JSON error body shape used by every failure response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Authenticated identity of the caller.
///
/// The session/login layer in front of this service resolves the identity
/// and forwards it as the `X-Author` header; this extractor is the seam
/// where that layer plugs in.  Absent or unreadable headers extract as an
/// empty string and are rejected by intake validation.
pub struct Author(pub String);

impl FromRequest for Author {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let author = req
            .headers()
            .get("X-Author")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        ready(Ok(Author(author)))
    }
}

#[derive(Debug, Deserialize)]
struct PrintBody {
    /// Raw label markup.  Empty means photo-only.
    #[serde(rename = "ZPL", default)]
    zpl: String,
}

/// Cache policy for status reads: a terminal record is immutable, a live one
/// must never be cached.
fn cache_control(record: &JobRecord) -> &'static str {
    if record.done {
        "max-age=31536000"
    } else {
        "no-store"
    }
}

fn job_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Job not found".into(),
    })
}

#[post("/print")]
async fn print_job(
    state: Data<ServiceState>,
    body: web::Json<PrintBody>,
    author: Author,
) -> HttpResponse {
    match state.sender.submit(&body.zpl, &author.0).await {
        Ok(job_id) => HttpResponse::Found()
            .insert_header((header::LOCATION, format!("/job/{job_id}")))
            .finish(),
        Err(e @ (LabelproofError::Validation(_) | LabelproofError::QueueTimeout { .. })) => {
            HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            })
        }
        Err(e) => {
            error!(error = %e, "print submission failed");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            })
        }
    }
}

#[get("/job/{id}")]
async fn get_job(state: Data<ServiceState>, path: web::Path<String>) -> HttpResponse {
    match state.sender.status(&path.into_inner()) {
        Ok(record) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, cache_control(&record)))
            .json(record),
        Err(_) => job_not_found(),
    }
}

/// Full-resolution verification photo as a PNG download.
#[get("/job/{id}/original.png")]
async fn get_job_image(state: Data<ServiceState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let record = match state.sender.status(&id) {
        Ok(record) => record,
        Err(_) => return job_not_found(),
    };

    match BASE64.decode(&record.image_b64) {
        Ok(bytes) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, cache_control(&record)))
            .insert_header((
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{id}-original.png\""),
            ))
            .content_type("image/png")
            .body(bytes),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}

/// Thumbnail of the verification photo as PNG.
///
/// Derived lazily when the stored record has a real photo but no thumbnail
/// (the derivation failed at print time, or the record predates it).
#[get("/job/{id}/image.png")]
async fn get_job_thumbnail(state: Data<ServiceState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    let record = match state.sender.status(&id) {
        Ok(record) => record,
        Err(_) => return job_not_found(),
    };

    let needs_derivation = record.image_small_b64.is_empty()
        || (record.image_small_b64 == PLACEHOLDER_PNG && record.image_b64 != PLACEHOLDER_PNG);

    let small_b64 = if needs_derivation {
        match thumbnail::shrink_base64(&record.image_b64, state.config.thumbnail_width) {
            Ok(b64) => b64,
            Err(e) => {
                warn!(job_id = %id, error = %e, "lazy thumbnail derivation failed");
                return HttpResponse::InternalServerError().json(ErrorResponse {
                    error: e.to_string(),
                });
            }
        }
    } else {
        record.image_small_b64.clone()
    };

    match BASE64.decode(&small_b64) {
        Ok(bytes) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, cache_control(&record)))
            .content_type("image/png")
            .body(bytes),
        Err(e) => HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        }),
    }
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: "Resource not found".into(),
    })
}

fn routes(app: &mut web::ServiceConfig) {
    app.service(print_job)
        .service(get_job)
        .service(get_job_thumbnail)
        .service(get_job_image);
}

/// Open the store, spawn the worker, advertise on the LAN, and run the HTTP
/// listener until shutdown.
///
/// A store that cannot be opened makes the service meaningless, so failure
/// here aborts startup.  Everything after boot is best-effort: a dead
/// printer or camera fails individual jobs, never the process.
pub async fn start(config: AppConfig) -> std::io::Result<()> {
    let config = Arc::new(config);

    let store = JobStore::open(&config.database_path).map_err(std::io::Error::other)?;
    let store = Arc::new(Mutex::new(store));

    let camera =
        CommandCamera::from_command(&config.capture_command).map_err(std::io::Error::other)?;
    let (sender, _worker) = worker::spawn(store, camera, Arc::clone(&config));

    let mut advertiser = config
        .advertise
        .then(|| ServiceAdvertiser::register(config.listen_port));

    let state = ServiceState {
        sender,
        config: Arc::clone(&config),
    };

    info!(bind = %config.bind_address, port = config.listen_port, "HTTP listener starting");

    let result = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .configure(routes)
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .default_service(web::route().to(not_found))
    })
    .bind((config.bind_address.as_str(), config.listen_port))?
    .run()
    .await;

    if let Some(advertiser) = advertiser.as_mut() {
        advertiser.unregister();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use labelproof_core::types::{JobState, PrintRequest};
    use labelproof_print::store::Record as _;

    fn test_state() -> (ServiceState, Arc<Mutex<JobStore>>) {
        let store = Arc::new(Mutex::new(
            JobStore::open_in_memory().expect("open in-memory store"),
        ));
        let config = Arc::new(AppConfig {
            // Nothing listens here, so transport attempts fail fast.
            printer_address: "127.0.0.1:1".into(),
            connect_timeout_ms: 200,
            print_settle_secs: 0,
            enqueue_timeout_secs: 1,
            thumbnail_width: 16,
            ..AppConfig::default()
        });
        let camera = CommandCamera::from_command(&["false".into()]).expect("camera");
        let (sender, _worker) = worker::spawn(Arc::clone(&store), camera, Arc::clone(&config));
        (ServiceState { sender, config }, store)
    }

    fn seed_record(store: &Arc<Mutex<JobStore>>, record: &JobRecord) {
        store.lock().expect("lock").put(record).expect("seed record");
    }

    fn png_b64(width: u32, height: u32) -> String {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba([0, 80, 160, 255]),
        ));
        let mut buffer = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
            .expect("encode test png");
        BASE64.encode(buffer)
    }

    macro_rules! test_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(Data::new($state.clone()))
                    .configure(routes)
                    .default_service(web::route().to(not_found)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn unknown_job_is_404_with_error_body() {
        let (state, _store) = test_state();
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/job/unknown-id").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Job not found");
    }

    #[actix_web::test]
    async fn submit_redirects_to_job_page() {
        let (state, _store) = test_state();
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/print")
                .insert_header(("X-Author", "press@example.com"))
                .set_json(serde_json::json!({"ZPL": ""}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 302);

        let location = resp
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location header")
            .to_string();
        assert!(location.starts_with("/job/"));

        // The job is pollable straight away.
        let resp = test::call_service(&app, test::TestRequest::get().uri(&location).to_request())
            .await;
        assert_eq!(resp.status(), 200);
        let record: JobRecord = test::read_body_json(resp).await;
        assert_eq!(record.author, "press@example.com");
    }

    #[actix_web::test]
    async fn missing_author_is_rejected() {
        let (state, _store) = test_state();
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/print")
                .set_json(serde_json::json!({"ZPL": "^XA^XZ"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 400);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("author"));
    }

    #[actix_web::test]
    async fn live_record_is_never_cached() {
        let (state, store) = test_state();
        let record = JobRecord::new(&PrintRequest::new("^XA^XZ", "press@example.com"));
        seed_record(&store, &record);
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/job/{}", record.key()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store"
        );
    }

    #[actix_web::test]
    async fn done_record_is_cached_long_term() {
        let (state, store) = test_state();
        let mut record = JobRecord::new(&PrintRequest::new("^XA^XZ", "press@example.com"));
        record.begin_processing();
        record.finish_failure("printer connect failed: refused");
        seed_record(&store, &record);
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/job/{}", record.key()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(header::CACHE_CONTROL).unwrap(),
            "max-age=31536000"
        );

        let back: JobRecord = test::read_body_json(resp).await;
        assert_eq!(back.status, JobState::Failed);
        assert!(back.done);
    }

    #[actix_web::test]
    async fn original_png_serves_decoded_photo() {
        let (state, store) = test_state();
        let mut record = JobRecord::new(&PrintRequest::new("", "press@example.com"));
        let photo_b64 = png_b64(4, 4);
        record.begin_processing();
        record.finish_success(photo_b64.clone(), png_b64(2, 2));
        seed_record(&store, &record);
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/job/{}/original.png", record.key()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "image/png"
        );
        let disposition = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .expect("disposition header");
        assert!(disposition.contains(&format!("{}-original.png", record.key())));

        let body = test::read_body(resp).await;
        assert_eq!(body.to_vec(), BASE64.decode(photo_b64).unwrap());
    }

    #[actix_web::test]
    async fn thumbnail_is_derived_lazily_when_missing() {
        let (state, store) = test_state();
        let mut record = JobRecord::new(&PrintRequest::new("", "press@example.com"));
        record.begin_processing();
        // A real photo but only the placeholder thumbnail, as after a
        // tolerated derivation failure at print time.
        record.finish_success(png_b64(8, 8), PLACEHOLDER_PNG.to_string());
        seed_record(&store, &record);
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/job/{}/image.png", record.key()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body = test::read_body(resp).await;
        let img = image::load_from_memory(&body).expect("decode thumbnail");
        assert_eq!(img.width(), state.config.thumbnail_width);
    }

    #[actix_web::test]
    async fn thumbnail_without_photo_is_the_placeholder() {
        let (state, store) = test_state();
        let record = JobRecord::new(&PrintRequest::new("", "press@example.com"));
        seed_record(&store, &record);
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri(&format!("/job/{}/image.png", record.key()))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 200);

        let body = test::read_body(resp).await;
        assert_eq!(body.to_vec(), BASE64.decode(PLACEHOLDER_PNG).unwrap());
    }

    #[actix_web::test]
    async fn unmapped_route_is_json_404() {
        let (state, _store) = test_state();
        let app = test_app!(state);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/nothing/here").to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "Resource not found");
    }
}
