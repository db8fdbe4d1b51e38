//! Run command - start the HelmRelease controller

use deckhand_kube::runtime::{self, RuntimeConfig};
use deckhand_kube::{
    EventSink, HelmCli, KubeEventSink, KubeResourceStore, NoopNotifier, Notifier, Reconciler,
    ReconcilerConfig, ReleaseBackend, ReleaseManager, SlackNotifier,
};
use deckhand_repo::{
    ChartDownloader, DownloaderRegistry, FileDownloader, HttpDownloader, S3Downloader,
    load_sdk_config,
};
use kube::Client;
use kube::config::{KubeConfigOptions, Kubeconfig};
use std::sync::Arc;
use tracing::info;

use crate::config::RunArgs;
use crate::error::Result;

/// Run the controller until a shutdown signal
pub async fn run(args: RunArgs) -> Result<()> {
    args.validate()?;

    let client = kube_client(args.kube_context.as_deref()).await?;
    let downloader = downloaders(&args).await?;

    let mut helm = HelmCli::new(&args.namespace)
        .with_binary(&args.helm_binary)
        .with_status_timeout(args.helm_timeout);
    if let Some(context) = &args.kube_context {
        helm = helm.with_kube_context(context);
    }
    let backend: Arc<dyn ReleaseBackend> = Arc::new(helm);
    let events: Arc<dyn EventSink> = Arc::new(KubeEventSink::new(client.clone()));

    let notifier: Arc<dyn Notifier> = match args.slack()? {
        Some(slack) => {
            info!(channel = %slack.channel, "Slack notifications enabled");
            Arc::new(SlackNotifier::new(slack.token, slack.channel)?)
        }
        None => Arc::new(NoopNotifier),
    };

    let manager = ReleaseManager::new(backend, events).with_timeout(args.helm_timeout);
    let reconciler = Reconciler::new(
        Arc::new(KubeResourceStore::new(client.clone())),
        manager,
        downloader,
        notifier,
        ReconcilerConfig {
            namespace: args.namespace.clone(),
            grace_period: args.grace_period,
        },
    );

    info!(
        namespace = %args.namespace,
        grace_period = %humantime::format_duration(args.grace_period),
        helm = %args.helm_binary.display(),
        "Starting deckhand"
    );

    runtime::run(
        client,
        reconciler,
        RuntimeConfig {
            watch_namespace: args.watch_namespace.clone(),
            workers: args.workers,
        },
    )
    .await;

    Ok(())
}

async fn kube_client(context: Option<&str>) -> Result<Client> {
    let Some(context) = context else {
        return Ok(Client::try_default().await?);
    };

    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        ..Default::default()
    };
    let config = kube::Config::from_custom_kubeconfig(Kubeconfig::read()?, &options).await?;
    Ok(Client::try_from(config)?)
}

async fn downloaders(args: &RunArgs) -> Result<Arc<dyn ChartDownloader>> {
    let sdk_config = load_sdk_config(args.aws_region.clone()).await;
    let http = HttpDownloader::new()?;

    let registry = DownloaderRegistry::new()
        .with_timeout(args.download_timeout)
        .register("s3", S3Downloader::from_config(&sdk_config))
        .register("https", http.clone())
        .register("http", http)
        .register("file", FileDownloader::new());

    info!(schemes = ?registry.schemes(), "Chart downloaders registered");
    Ok(Arc::new(registry))
}
