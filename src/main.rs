use bearerline::cli::{
    ACCESS_SECRET_ENV, Args, REFRESH_SECRET_ENV, build_config, handle_generate_keys,
    init_logging, load_jwt_config, load_secret, load_users,
};
use bearerline::run_server;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if args.generate_keys {
        handle_generate_keys();
        return;
    }

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret(ACCESS_SECRET_ENV, args.access_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(refresh_secret) =
        load_secret(REFRESH_SECRET_ENV, args.refresh_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(jwt) = load_jwt_config(&access_secret, &refresh_secret) else {
        std::process::exit(1);
    };

    let Some(users) = load_users(args.users_file.as_deref()) else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap_or_else(|e| {
        error!(error = %e, "Failed to read local address");
        std::process::exit(1);
    });

    let config = build_config(
        jwt,
        users,
        args.login_rate_limit,
        args.login_burst,
        args.ip_header,
    );

    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
