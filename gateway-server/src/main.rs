// gateway-server/src/main.rs
use std::time::Duration;
use actix_web::{middleware::Logger, web, App, HttpServer};
use common::{setup_tracing, Config, RuntimeMarkers};
use gateway_server::middleware::RateLimiter;
use gateway_server::{build_state, configure_app};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Setup tracing
    setup_tracing();

    // Load configuration
    let config = Config::from_env();
    let markers = RuntimeMarkers::from_env();

    // Save address before moving config into app state
    let server_addr = config.server.addr.clone();
    let admin_base = config.admin_base_path();
    let rate_limiter = RateLimiter::new(&config.rate_limit);

    let state = build_state(config, &markers)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    let state_data = web::Data::new(state);

    // Forget idle clients once per window
    let pruner = rate_limiter.clone();
    let window = Duration::from_secs(state_data.config.rate_limit.window_secs.max(1));
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(window);
        loop {
            interval.tick().await;
            pruner.prune();
        }
    });

    tracing::info!("Starting gateway on {}", server_addr);
    tracing::info!("Admin console mounted at {}/login", admin_base);

    HttpServer::new(move || {
        App::new()
            .wrap(rate_limiter.clone())
            .wrap(Logger::new("%a \"%r\" %s %b %Dms"))
            .app_data(state_data.clone())
            .configure(|cfg| configure_app(cfg, &admin_base))
    })
    .bind(&server_addr)?
    .run()
    .await
}
