use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
fn default_directives(service_name: &str) -> String {
    // crate targets use underscores even when the binary name is kebab-case
    let target = service_name.replace('-', "_");
    format!("info,{target}=debug,tower_http=debug")
}

fn is_production() -> bool {
    std::env::var("KINDRED_ENV")
        .map(|v| v == "production")
        .unwrap_or(false)
}

pub fn init_tracing(service_name: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name)));

    if is_production() {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    tracing::info!(service = service_name, "tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_use_crate_target() {
        let directives = default_directives("kindred-matching");
        assert_eq!(directives, "info,kindred_matching=debug,tower_http=debug");
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
