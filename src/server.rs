use actix_web::{web, App, HttpServer};
use actix_cors::Cors;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use profile_matcher_lib::api::{self, AppState};
use profile_matcher_lib::job_manager::{JobManager, ProviderFactory};
use profile_matcher_lib::{logger, MatcherArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "HTTP status API for the profile matcher.")]
struct ServerArgs {
    #[command(flatten)]
    matcher: MatcherArgs,

    #[arg(long, default_value = "0.0.0.0", env = "MATCHER_BIND")]
    bind: String,

    #[arg(long, default_value_t = 5000, env = "MATCHER_PORT")]
    port: u16,

    /// Built front-end served at `/`.
    #[arg(long, default_value = "./frontend/dist", env = "MATCHER_FRONTEND_DIR")]
    frontend_dir: PathBuf,

    /// Where uploaded input files are kept.
    #[arg(long, default_value = "uploads", env = "MATCHER_UPLOAD_DIR")]
    upload_dir: PathBuf,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = ServerArgs::parse();
    logger::init(args.matcher.log_file.as_deref());

    let config = match args.matcher.resolve() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            log::error!("Cannot start server: {}", e);
            std::process::exit(1);
        }
    };

    let factory_config = config.clone();
    let factory: ProviderFactory = Arc::new(move || factory_config.build_provider());
    let job_manager = Arc::new(JobManager::new(config.pipeline_options(), factory));
    let state = web::Data::new(AppState {
        job_manager,
        upload_dir: args.upload_dir.clone(),
    });

    log::info!("Starting Web Server at http://{}:{}", args.bind, args.port);

    let frontend_dir = args.frontend_dir.clone();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header();

        App::new()
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure)
            .service(actix_files::Files::new("/", frontend_dir.clone()).index_file("index.html"))
    })
    .bind((args.bind.as_str(), args.port))?
    .run()
    .await
}
