//! Run the HTTP service.

use std::path::Path;
use std::sync::Arc;
use thela_api::{ApiService, ServiceConfig, serve};
use thela_flow::Workflow;
use tracing::info;

pub fn run(config_path: String) {
    let config = if Path::new(&config_path).exists() {
        match ServiceConfig::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(1);
            }
        }
    } else {
        info!(config = %config_path, "config file not found, using defaults");
        ServiceConfig::default()
    };

    let workflow = match Workflow::load(&config.data_dir) {
        Ok(workflow) => workflow,
        Err(err) => {
            eprintln!("failed to hydrate {}: {err}", config.data_dir.display());
            std::process::exit(1);
        }
    };
    info!(
        data_dir = %config.data_dir.display(),
        foods = workflow.ledger().list().len(),
        resources = workflow.registry().list().len(),
        "workflow hydrated"
    );

    let bind = config.bind;
    let service = ApiService::new(Arc::new(workflow), &config);
    if let Err(err) = serve(service, bind) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
