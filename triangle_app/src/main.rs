//! Triangle demo application
//!
//! Opens a window and draws a single triangle until the window is closed or
//! Escape is pressed. An optional first argument names a `.toml` or `.ron`
//! configuration file.

use std::process::ExitCode;

use vk_renderer::config::{Config, EngineConfig, LogLevel};
use vk_renderer::foundation::logging;
use vk_renderer::{Engine, EngineError};

fn load_config() -> Result<EngineConfig, EngineError> {
    match std::env::args().nth(1) {
        Some(path) => {
            let config = EngineConfig::load_from_file(&path)?;
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run(config: &EngineConfig) -> Result<(), EngineError> {
    let mut engine = Engine::new(config)?;
    engine.run()
}

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC occurred: {panic_info}");
    }));

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            logging::init(LogLevel::default());
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(config.log_level);
    log::info!("Starting triangle demo");

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
