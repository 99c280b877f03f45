//! Pinger and answerer roles.

use crate::protocol::Ping;
use anyhow::Context;
use postchannel::adapters::loopback;
use postchannel::{ChannelConfig, ChannelOptions, Endpoint, PostChannel};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn loopback(config: &ChannelConfig, rounds: u32) -> anyhow::Result<()> {
    let (left, right) = loopback::pair();

    let answerer = {
        let options = ChannelOptions::from_endpoint(right)
            .with_config(config)
            .instance("answerer");
        tokio::spawn(answer(options))
    };

    let options = ChannelOptions::from_endpoint(left)
        .with_config(config)
        .instance("pinger");
    pinger(options, rounds).await?;
    answerer.await??;
    Ok(())
}

pub async fn serve(config: &ChannelConfig, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let config = config.clone();

        tokio::spawn(async move {
            let result = async {
                let ws = postchannel_websocket::accept(stream).await?;
                answer(options_for(ws.endpoint(), &config)).await
            };
            if let Err(e) = result.await {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

pub async fn connect(config: &ChannelConfig, url: &str, rounds: u32) -> anyhow::Result<()> {
    let ws = postchannel_websocket::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    pinger(options_for(ws.endpoint(), config), rounds).await?;
    ws.close();
    Ok(())
}

fn options_for(endpoint: Endpoint, config: &ChannelConfig) -> ChannelOptions {
    ChannelOptions::from_endpoint(endpoint)
        .with_config(config)
        .log(|me, payload| tracing::debug!("{} sent {}", me, payload))
}

/// Send `rounds` pings, each with a receipt, and wait for the matching pong.
async fn pinger(options: ChannelOptions, rounds: u32) -> anyhow::Result<()> {
    let (pong_tx, mut pongs) = mpsc::unbounded_channel();
    let channel = PostChannel::open(
        move |_, msg: Ping| {
            let _ = pong_tx.send(msg);
        },
        options,
    )?;

    timeout(HANDSHAKE_TIMEOUT, channel.ready())
        .await
        .context("peer never answered the handshake")?;
    tracing::info!(
        "{} connected to {}",
        channel.instance(),
        channel.peer().map(|p| p.to_string()).unwrap_or_default()
    );

    for seq in 0..rounds {
        let started = Instant::now();
        let receipt = channel.acknowledged_send(&Ping::Ping { seq })?;
        timeout(RECEIPT_TIMEOUT, receipt)
            .await
            .with_context(|| format!("ping {seq} was never acknowledged"))?;
        let acked = started.elapsed();

        loop {
            let reply = timeout(RECEIPT_TIMEOUT, pongs.recv())
                .await
                .with_context(|| format!("no pong for ping {seq}"))?
                .context("channel closed")?;
            match reply {
                Ping::Pong { seq: got } if got == seq => break,
                other => tracing::warn!("Unexpected reply: {:?}", other),
            }
        }
        tracing::info!("ping {}: acked in {:?}, pong in {:?}", seq, acked, started.elapsed());
    }

    let bye = channel.acknowledged_send(&Ping::Bye)?;
    timeout(RECEIPT_TIMEOUT, bye).await.context("bye was never acknowledged")?;
    channel.disconnect();
    Ok(())
}

/// Answer pings with pongs until the pinger says bye.
async fn answer(options: ChannelOptions) -> anyhow::Result<()> {
    let (tx, mut inbox) = mpsc::unbounded_channel();
    let channel = PostChannel::open(
        move |_, msg: Ping| {
            let _ = tx.send(msg);
        },
        options,
    )?;

    timeout(HANDSHAKE_TIMEOUT, channel.ready())
        .await
        .context("peer never answered the handshake")?;
    tracing::info!(
        "{} answering {}",
        channel.instance(),
        channel.peer().map(|p| p.to_string()).unwrap_or_default()
    );

    while let Some(msg) = inbox.recv().await {
        match msg {
            Ping::Ping { seq } => channel.send(&Ping::Pong { seq })?,
            Ping::Bye => break,
            Ping::Pong { .. } => tracing::warn!("Unexpected pong"),
        }
    }

    tracing::debug!("{} done", channel.instance());
    channel.disconnect();
    Ok(())
}
