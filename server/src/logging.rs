use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `MEDIA_LOG` overrides everything;
/// otherwise default to `info` with the noisier actix internals capped
/// at `warn`.
pub fn init() {
    let filter = EnvFilter::try_from_env("MEDIA_LOG").unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("actix_server=warn".parse().expect("static directive"))
            .add_directive("actix_http=warn".parse().expect("static directive"))
            .add_directive("h2=warn".parse().expect("static directive"))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
