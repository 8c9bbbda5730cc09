use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;

use lib_watch::configs::{CollectionConfig, CollectionMode};
use lib_watch::core::{
    BountyQuestions, LogNotifier, Notifier, Poller, RecentQuestions, Scheduled, SiteRef, TagExcerptCache,
};
use lib_watch::ingestors::PushSession;
use lib_watch::stackexchange::{QuestionSource, StackExchangeApi};

mod watch_logic;
use watch_logic::{config, logger, notify, report};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    logger::setup_logging(&config.log_dir(), &config.log_level())?;
    let watch = config.watch_config()?;

    let api = Arc::new(StackExchangeApi::with_base_url(&config.api_url(), &config.api_key())?);
    let source: Arc<dyn QuestionSource> = api.clone();
    let site_names = site_names(&api).await;

    let notifier: Arc<dyn Notifier> = if config.notify_enabled() {
        Arc::new(notify::NotifySend)
    } else {
        Arc::new(LogNotifier)
    };

    let mut schedules = Vec::new();
    for collection in &watch.collections {
        let name = collection
            .name
            .clone()
            .or_else(|| site_names.get(&collection.api_site).cloned())
            .unwrap_or_else(|| collection.api_site.clone());
        let site = SiteRef::new(collection.site_id, collection.api_site.clone(), name);
        let (poller, interval) = match collection.mode {
            CollectionMode::Recent => (
                Poller::Recent(Arc::new(RecentQuestions::new(
                    site,
                    source.clone(),
                    collection.tags.clone(),
                    collection.ignored_tags.clone(),
                    config.recent_settings(),
                ))),
                config.recent_interval(),
            ),
            CollectionMode::Bounty => (
                Poller::Bounty(Arc::new(BountyQuestions::new(
                    site,
                    source.clone(),
                    collection.tags.clone(),
                    collection.ignored_tags.clone(),
                ))),
                config.bounty_interval(),
            ),
        };
        schedules.push(Arc::new(
            Scheduled::new(poller)
                .with_interval(interval)
                .with_notifier(notifier.clone()),
        ));
    }

    describe_tags(&TagExcerptCache::new(source.clone()), &watch.collections).await;

    let push = Arc::new(PushSession::new(config.push_config()));
    for scheduled in &schedules {
        if let Poller::Recent(_) = scheduled.poller() {
            let scheduled = scheduled.clone();
            push.add_listener(move |topic, message| {
                let scheduled = scheduled.clone();
                async move { scheduled.on_push_notification(topic, message).await }
            });
        }
    }
    match push.connect().await {
        Ok(()) => {
            for collection in watch.collections.iter().filter(|c| c.mode == CollectionMode::Recent) {
                for tag in &collection.tags {
                    push.subscribe_topic(collection.site_id, tag);
                }
            }
        }
        Err(e) => log::error!("Push socket unavailable, relying on polling only: {}", e),
    }

    let (shutdown_tx, _) = tokio::sync::broadcast::channel(1);
    let mut handles = Vec::new();
    for scheduled in &schedules {
        let poller = scheduled.clone();
        let shutdown = shutdown_tx.subscribe();
        handles.push(tokio::spawn(async move { poller.run(shutdown).await }));
        handles.push(tokio::spawn(report::run(
            scheduled.clone(),
            push.clone(),
            shutdown_tx.subscribe(),
        )));
    }

    // Wait for shutdown signal
    tokio::select! {
        _ = signal::ctrl_c() => {
            log::info!("Ctrl-C received, initiating shutdown.");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut term_signal) => {
                        term_signal.recv().await;
                        log::info!("SIGTERM received, initiating shutdown.");
                    }
                    Err(e) => {
                        log::warn!("Cannot listen for SIGTERM: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                // On non-unix platforms, just wait forever.
                std::future::pending::<()>().await;
            }
        } => {}
    }

    // Send shutdown signal to all components
    let _ = shutdown_tx.send(());
    push.shutdown();

    for handle in handles {
        let _ = handle.await;
    }

    log::info!("Shutdown complete.");
    Ok(())
}

/// Display names by API site parameter. Empty when the listing fails.
async fn site_names(api: &StackExchangeApi) -> HashMap<String, String> {
    match api.sites().await {
        Ok(sites) => sites
            .into_iter()
            .map(|site| (site.api_site_parameter, site.name))
            .collect(),
        Err(e) => {
            log::warn!("Could not list sites, using API names: {}", e);
            HashMap::new()
        }
    }
}

async fn describe_tags(excerpts: &TagExcerptCache, collections: &[CollectionConfig]) {
    for collection in collections {
        for tag in &collection.tags {
            match excerpts.get(&collection.api_site, tag).await {
                Some(excerpt) => log::info!("[{}] on {}: {}", tag, collection.display_name(), excerpt),
                None => log::info!("[{}] on {} has no excerpt", tag, collection.display_name()),
            }
        }
    }
}
