//! Lists the sections of an OSM user, with their terms and a few figures.
//!
//! Credentials are read from the environment: either `OSM_CLIENT_ID` and `OSM_CLIENT_SECRET`,
//! or `OSM_API_ID` and `OSM_API_TOKEN` with a user id and secret in `osm.creds`.
//! Set `RUST_LOG` to see what is going on.

use std::path::Path;

use osm_accessor::config::{self, credential_from_env};
use osm_accessor::{Accessor, Cache, Osm, OsmOptions};


#[tokio::main]
async fn main() {
    env_logger::init();

    let credential = match credential_from_env(Path::new(config::DEFAULT_CREDENTIALS_FILE)) {
        Ok(c) => c,
        Err(err) => {
            eprintln!("No credentials: {}", err);
            return;
        },
    };
    let cache = Cache::load_or_new(Path::new(config::DEFAULT_CACHE_FILE));
    let accessor = match Accessor::new(config::DEFAULT_BASE_URL, credential, cache) {
        Ok(a) => a,
        Err(err) => {
            eprintln!("Unable to create an accessor: {}", err);
            return;
        },
    };

    let osm: Osm = match Osm::new(&accessor, OsmOptions::default()).await {
        Ok(osm) => osm,
        Err(err) => {
            log::error!("Unable to list sections: {}", err);
            return;
        },
    };

    for section in osm.sections() {
        let default_marker = if section.is_default() { " (default)" } else { "" };
        println!("{} [{}] {}{}", section.id(), section.section_type(), section.name(), default_marker);
        for term in section.terms() {
            println!("    term {}\t{} -> {}", term.name(), term.start_date(), term.end_date());
        }
        println!("    {} members, {} events, {} meetings",
            section.members().map(|m| m.len()).unwrap_or(0),
            section.events().map(|e| e.len()).unwrap_or(0),
            section.programme().map(|p| p.len()).unwrap_or(0));
        for issue in section.report().issues() {
            println!("    ! {}", issue);
        }
    }
    if let Some(terms) = osm.inconsistent_terms() {
        println!("Sections are not on the same term: {:?}", terms);
    }

    if let Err(err) = accessor.save_cache() {
        log::warn!("Unable to save the cache: {}", err);
    }
    let (hits, misses) = accessor.cache_stats();
    log::info!("Cache: {} hits, {} misses", hits, misses);
}
