//! CLI entry point for the strand schema and storage operator tool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use strand_core::config::StrandConfig;
use strand_core::{
    Class, Context, DataType, Kind, MetaProperty, Pagination, Principal, Property,
    StatisticalAnalysis,
};
use strand_graph::{Neo4jConnector, StorageConnector};

use strand_schema::{
    AdminListAuthorizer, ConnectorMigrator, FileSchemaStore, SchemaManager, SchemaStore,
};

#[derive(Parser)]
#[command(name = "strand-schema")]
#[command(about = "Schema and storage operator tool for Strand")]
struct Cli {
    /// Config file prefix (default: strand).
    #[arg(short, long, default_value = "strand")]
    config: String,

    /// Act as this user. Requests are anonymous otherwise.
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge the bootstrap schema sources and prepare the backend.
    Init,
    /// Inspect or change the schema.
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// Inspect or delete things.
    Thing {
        #[command(subcommand)]
        command: ThingCommand,
    },
    /// Statistical analysis of a class's properties.
    Meta {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        class: String,
        /// Property to analyse; repeat for several.
        #[arg(long = "property", required = true)]
        properties: Vec<String>,
        /// type, count, topOccurrences.value or topOccurrences.occurs.
        #[arg(long = "analysis", required = true)]
        analyses: Vec<String>,
    },
}

#[derive(Subcommand)]
enum SchemaCommand {
    Show,
    AddClass {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// JSON file holding the class definition.
        #[arg(long)]
        file: PathBuf,
    },
    DeleteClass {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        name: String,
    },
    AddProperty {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: String,
        /// string, int, number, boolean, date or a class name.
        #[arg(long)]
        data_type: String,
        #[arg(long)]
        indexed: bool,
    },
    DeleteProperty {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        class: String,
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum ThingCommand {
    Get {
        id: Uuid,
    },
    List {
        #[arg(long, default_value_t = 20)]
        limit: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Delete {
        id: Uuid,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Thing,
    Action,
}

impl From<KindArg> for Kind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Thing => Kind::Thing,
            KindArg::Action => Kind::Action,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let config = StrandConfig::load(&cli.config)?;

    let ctx = if config.request_timeout_secs > 0 {
        Context::background().with_timeout(Duration::from_secs(config.request_timeout_secs))
    } else {
        Context::background()
    };
    let principal = cli.user.map(Principal::new);

    let connector: Arc<dyn StorageConnector> = Arc::new(Neo4jConnector::connect(&config.graph).await?);
    tracing::info!(backend = connector.name(), uri = %config.graph.uri, "Connected to backend");

    let store = Arc::new(FileSchemaStore::new(&config.schema.path));

    match cli.command {
        Command::Init => {
            let mut schema = store.load()?;
            connector
                .init(&ctx, &config.schema.sources, &mut schema)
                .await?;
            store.save(&schema)?;
            tracing::info!(
                things = schema.things.classes.len(),
                actions = schema.actions.classes.len(),
                "Backend initialized"
            );
        }
        Command::Schema { command } => {
            let manager = SchemaManager::load(
                store,
                Arc::new(ConnectorMigrator::new(Arc::clone(&connector))),
                Arc::new(AdminListAuthorizer::new(config.admin_list.clone())?),
            )?;
            let principal = principal.as_ref();

            match command {
                SchemaCommand::Show => print_json(&manager.get_schema(principal).await?)?,
                SchemaCommand::AddClass { kind, file } => {
                    let class: Class = serde_json::from_str(&std::fs::read_to_string(&file)?)?;
                    manager.add_class(&ctx, principal, kind.into(), class).await?;
                }
                SchemaCommand::DeleteClass { kind, name } => {
                    manager.delete_class(&ctx, principal, kind.into(), &name).await?;
                }
                SchemaCommand::AddProperty {
                    kind,
                    class,
                    name,
                    data_type,
                    indexed,
                } => {
                    let data_type = DataType::try_from(data_type).map_err(anyhow::Error::msg)?;
                    let property = Property {
                        name,
                        data_type,
                        indexed,
                        description: None,
                    };
                    manager
                        .add_property(&ctx, principal, kind.into(), &class, property)
                        .await?;
                }
                SchemaCommand::DeleteProperty { kind, class, name } => {
                    manager
                        .delete_property(&ctx, principal, kind.into(), &class, &name)
                        .await?;
                }
            }
        }
        Command::Thing { command } => match command {
            ThingCommand::Get { id } => print_json(&connector.get_thing(&ctx, id).await?)?,
            ThingCommand::List { limit, page } => {
                let page = Pagination::new(limit, page)?;
                print_json(&connector.list_things(&ctx, page).await?)?;
            }
            ThingCommand::Delete { id } => {
                connector.delete_thing(&ctx, id).await?;
                tracing::info!(thing = %id, "Thing deleted");
            }
        },
        Command::Meta {
            kind,
            class,
            properties,
            analyses,
        } => {
            let kind = Kind::from(kind);
            let analyses = analyses
                .iter()
                .map(|a| a.parse::<StatisticalAnalysis>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(anyhow::Error::msg)?;

            let schema = store.load()?;
            let Some(class) = schema.class(kind, &class) else {
                anyhow::bail!("Unknown {} class: {class}", kind.name());
            };
            let requests: Vec<MetaProperty> = properties
                .iter()
                .map(|name| MetaProperty::new(name.as_str(), &analyses))
                .collect();

            print_json(&connector.get_meta(&ctx, kind, class, &requests).await?)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
