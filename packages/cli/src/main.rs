#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for civic map communities.
//!
//! ```text
//! civic_map migrate
//! civic_map recommend --geometry '{"type":"Point","coordinates":[-103.35,20.67]}' [--k 5]
//! civic_map map [--region-id 1] [--category parques] [--limit 100] [--cursor 42]
//! civic_map show <id>
//! civic_map --caller-id 7 create --name Providencia --geometry '[[...]]'
//! civic_map update <id> [--name ...] [--geometry ...]
//! civic_map list [--name provi] [--with-total]
//! civic_map --caller-id 7 join <id>
//! civic_map remove <id>
//! ```
//!
//! Every command prints its result as JSON on stdout. `--caller-id` stands
//! in for the authenticated account.

use civic_map_community::{CommunityError, lifecycle, listing, map, recommend};
use civic_map_community_models::{
    CommunityPatch, CreateCommunityRequest, ListFilter, MapRequest, RecommendRequest,
};
use civic_map_database::DatabaseCommunityStore;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

#[derive(Parser)]
#[command(name = "civic_map", about = "Query and manage neighborhood communities")]
struct Cli {
    /// Account ID of the authenticated caller
    #[arg(long, global = true)]
    caller_id: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Recommend the communities nearest to a geometry
    Recommend {
        /// `GeoJSON` geometry or bare coordinate array
        #[arg(long)]
        geometry: String,
        /// Number of results (1-100)
        #[arg(long)]
        k: Option<f64>,
        /// Restrict to a region (municipality)
        #[arg(long)]
        region_id: Option<i64>,
        /// Restrict to a neighborhood
        #[arg(long)]
        neighborhood_id: Option<i64>,
        /// Restrict to communities created by this account
        #[arg(long)]
        creator_id: Option<i64>,
        /// Restrict to a category (case-insensitive)
        #[arg(long)]
        category: Option<String>,
    },
    /// List communities as map features, one page at a time
    Map {
        /// Restrict to a region (municipality)
        #[arg(long)]
        region_id: Option<i64>,
        /// Restrict to a neighborhood
        #[arg(long)]
        neighborhood_id: Option<i64>,
        /// Restrict to communities created by this account
        #[arg(long)]
        creator_id: Option<i64>,
        /// Case-insensitive name substring
        #[arg(long)]
        name: Option<String>,
        /// Category name, may be repeated
        #[arg(long = "category")]
        categories: Vec<String>,
        /// Page size (1-1000)
        #[arg(long)]
        limit: Option<i64>,
        /// Cursor returned by the previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Show one community with its map feature
    Show {
        /// Community ID
        id: i64,
    },
    /// Create a community owned by the caller
    Create {
        /// Display name
        #[arg(long)]
        name: String,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
        /// Single free-text category
        #[arg(long)]
        category: Option<String>,
        /// Boundary as `GeoJSON` geometry or bare coordinate array
        #[arg(long)]
        geometry: Option<String>,
        /// Neighborhood the community belongs to
        #[arg(long)]
        neighborhood_id: Option<i64>,
        /// Creator account, defaults to the caller
        #[arg(long)]
        creator_id: Option<i64>,
        /// Category ID to associate, may be repeated
        #[arg(long = "category-id")]
        category_ids: Vec<i64>,
    },
    /// Update fields of a live community
    Update {
        /// Community ID
        id: i64,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New single category
        #[arg(long)]
        category: Option<String>,
        /// New boundary geometry
        #[arg(long)]
        geometry: Option<String>,
        /// New neighborhood
        #[arg(long)]
        neighborhood_id: Option<i64>,
        /// Replacement category ID, may be repeated
        #[arg(long = "category-id")]
        category_ids: Option<Vec<i64>>,
    },
    /// List live communities by name, newest first
    List {
        /// Restrict to a neighborhood
        #[arg(long)]
        neighborhood_id: Option<i64>,
        /// Restrict to communities created by this account
        #[arg(long)]
        creator_id: Option<i64>,
        /// Case-insensitive name substring
        #[arg(long)]
        name: Option<String>,
        /// Include the number of matches
        #[arg(long)]
        with_total: bool,
    },
    /// Join a community as the caller
    Join {
        /// Community ID
        id: i64,
    },
    /// Soft-delete a community
    Remove {
        /// Community ID
        id: i64,
    },
}

fn print_json(value: &impl Serialize) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_geometry(text: &str) -> Result<Value, CommunityError> {
    serde_json::from_str(text)
        .map_err(|e| CommunityError::invalid_input(format!("geometry is not valid JSON: {e}")))
}

fn require_caller(caller_id: Option<i64>, command: &str) -> Result<i64, CommunityError> {
    caller_id.ok_or_else(|| CommunityError::invalid_input(format!("{command} requires --caller-id")))
}

const fn exit_code(error: &CommunityError) -> i32 {
    match error {
        CommunityError::InvalidInput { .. } => 2,
        CommunityError::NotFound { .. } => 3,
        CommunityError::AlreadyMember { .. } => 4,
        CommunityError::Store(_) => 1,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let store = DatabaseCommunityStore::new(civic_map_database::db::connect_from_env().await?);

    let result = match cli.command {
        Commands::Migrate => {
            civic_map_database::run_migrations(store.db()).await?;
            Ok(print_json(&serde_json::json!({"migrated": true})))
        }
        Commands::Recommend {
            geometry,
            k,
            region_id,
            neighborhood_id,
            creator_id,
            category,
        } => match parse_geometry(&geometry) {
            Ok(geometry) => {
                let request = RecommendRequest {
                    geometry: Some(geometry),
                    k,
                    region_id,
                    neighborhood_id,
                    creator_id,
                    category,
                };
                recommend::recommend(&store, &request)
                    .await
                    .map(|results| print_json(&results))
            }
            Err(e) => Err(e),
        },
        Commands::Map {
            region_id,
            neighborhood_id,
            creator_id,
            name,
            categories,
            limit,
            cursor,
        } => {
            let request = MapRequest {
                region_id,
                neighborhood_id,
                creator_id,
                name,
                limit,
                cursor,
                categories,
                caller_id: cli.caller_id,
            };
            map::map_features(&store, &request)
                .await
                .map(|page| print_json(&page))
        }
        Commands::Show { id } => map::community_detail(&store, id, cli.caller_id)
            .await
            .map(|detail| print_json(&detail)),
        Commands::Create {
            name,
            description,
            category,
            geometry,
            neighborhood_id,
            creator_id,
            category_ids,
        } => match (
            require_caller(cli.caller_id, "create"),
            geometry.as_deref().map(parse_geometry).transpose(),
        ) {
            (Ok(caller_id), Ok(geometry)) => {
                let request = CreateCommunityRequest {
                    name,
                    description,
                    category,
                    geometry,
                    neighborhood_id,
                    creator_id,
                    category_ids,
                };
                lifecycle::create(&store, &request, caller_id)
                    .await
                    .map(|created| print_json(&created))
            }
            (Err(e), _) | (_, Err(e)) => Err(e),
        },
        Commands::Update {
            id,
            name,
            description,
            category,
            geometry,
            neighborhood_id,
            category_ids,
        } => match geometry.as_deref().map(parse_geometry).transpose() {
            Ok(geometry) => {
                let patch = CommunityPatch {
                    name,
                    description,
                    category,
                    geometry,
                    neighborhood_id,
                    category_ids,
                };
                lifecycle::update(&store, id, &patch)
                    .await
                    .map(|updated| print_json(&updated))
            }
            Err(e) => Err(e),
        },
        Commands::List {
            neighborhood_id,
            creator_id,
            name,
            with_total,
        } => {
            let filter = ListFilter {
                neighborhood_id,
                creator_id,
                name,
            };
            if with_total {
                listing::list_with_total(&store, &filter)
                    .await
                    .map(|listed| print_json(&listed))
            } else {
                listing::list(&store, &filter)
                    .await
                    .map(|listed| print_json(&listed))
            }
        }
        Commands::Join { id } => match require_caller(cli.caller_id, "join") {
            Ok(caller_id) => lifecycle::join(&store, id, caller_id)
                .await
                .map(|outcome| print_json(&outcome)),
            Err(e) => Err(e),
        },
        Commands::Remove { id } => lifecycle::remove(&store, id)
            .await
            .map(|removed| print_json(&removed)),
    };

    match result {
        Ok(printed) => printed?,
        Err(e) => {
            log::debug!("Command failed: {e:?}");
            eprintln!("{e}");
            std::process::exit(exit_code(&e));
        }
    }

    Ok(())
}
