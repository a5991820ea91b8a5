//! Shadow Mapping demo

use shader_demos::{AppError, DemoConfig, DemoKind};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match shader_demos::run(DemoKind::ShadowMapping, DemoConfig::default()) {
        Ok(()) => {}
        // Already reported when it happened
        Err(AppError::Startup(_)) => std::process::exit(1),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
