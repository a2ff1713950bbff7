pub mod cleanup;
pub mod dedupe;
pub mod enrichment;
pub mod event_mapper;
pub mod feed_client;
pub mod match_resolver;
pub mod odds_normalizer;
pub mod push;
pub mod reconciler;
#[cfg(test)]
pub mod scripted_feed;
pub mod timeline;
