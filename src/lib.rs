pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod playlist;
pub mod pls;
pub mod sandbox;
pub mod web;

pub mod state {
    use crate::{
        config::AppConfig,
        content::{ContentLister, EntryFilter, ListingCache},
        playlist::PlaylistStore,
        sandbox::PathSandbox,
    };

    #[derive(Clone)]
    pub struct AppState {
        pub lister: ContentLister,
        pub playlists: PlaylistStore,
    }

    impl AppState {
        /// Wire the core components from explicit configuration values.
        pub fn from_config(config: &AppConfig, base_url: &str) -> anyhow::Result<Self> {
            let cache = ListingCache::new(config.cache_ttl(), config.media.cache_capacity);
            let lister = ContentLister::new(
                PathSandbox::new(config.media_root()?),
                EntryFilter::new(&config.media.extensions),
                base_url,
                cache,
            );

            let mut playlists = PlaylistStore::new(PathSandbox::new(config.playlist_root()?));
            if config.playlists.lock_writes {
                playlists = playlists.with_write_locks();
            }

            Ok(Self { lister, playlists })
        }
    }
}
