// Broker connection helpers and JetStream stream administration.
use crate::config::BrokerConnection;
use anyhow::{Context, Result};
use async_nats::jetstream::context::{GetStreamError, GetStreamErrorKind};
use async_nats::jetstream::{self, stream, ErrorCode};

/// Open a client connection tagged with the scenario key so individual
/// benchmark runs are attributable on the broker side.
pub async fn client(settings: &BrokerConnection, name: &str) -> Result<async_nats::Client> {
    let mut options = async_nats::ConnectOptions::new()
        .name(name.to_string())
        .event_callback(|event| async move {
            tracing::info!(event = %event, "client connection event");
        });
    if let Some(token) = &settings.token {
        options = options.token(token.clone());
    }
    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        options = options.user_and_password(username.clone(), password.clone());
    }
    let servers = settings.servers.join(",");
    options
        .connect(servers.clone())
        .await
        .with_context(|| format!("connect to {servers}"))
}

pub async fn jetstream(
    settings: &BrokerConnection,
    name: &str,
) -> Result<(async_nats::Client, jetstream::Context)> {
    let client = client(settings, name).await?;
    let context = jetstream::new(client.clone());
    Ok((client, context))
}

/// Delete-then-create the stream so every measurement starts against a fresh,
/// empty resource. Idempotent: an absent stream is not an error, and repeated
/// calls leave exactly one stream of that name.
pub async fn recreate_stream(
    js: &jetstream::Context,
    config: stream::Config,
) -> Result<stream::Stream> {
    let name = config.name.clone();
    match js.get_stream(&name).await {
        Ok(_) => {
            js.delete_stream(&name)
                .await
                .with_context(|| format!("delete stream {name}"))?;
        }
        Err(err) if is_stream_not_found(&err) => {}
        Err(err) => return Err(err).with_context(|| format!("look up stream {name}")),
    }
    js.create_stream(config)
        .await
        .with_context(|| format!("create stream {name}"))
}

// "Not found" is the expected branch on a first run; everything else is fatal.
fn is_stream_not_found(err: &GetStreamError) -> bool {
    match err.kind() {
        GetStreamErrorKind::JetStream(api) => api.error_code() == ErrorCode::STREAM_NOT_FOUND,
        _ => false,
    }
}
