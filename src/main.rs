use anyhow::Context as _;
use clap::{Parser, Subcommand};
use family_coffee::auth::hash_password;
use family_coffee::cart::{purge_expired, CartCookies};
use family_coffee::config::Config;
use family_coffee::domain::NewAdminUser;
use family_coffee::graphql::{create_schema, GraphQLContext, MediaUrls};
use family_coffee::mailer::{build_mailer, EmailTemplates, OrderNotifier};
use family_coffee::storage::{InMemoryStorage, SqliteStorage, Storage};
use family_coffee::{logging, metrics, seed, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "family_coffee")]
#[command(about = "FamilyCoffee web shop backend")]
#[command(version)]
struct Cli {
    /// TOML config file; missing is fine, environment variables still apply
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (GraphQL, login, health, metrics, media)
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Keep all data in memory instead of SQLite
        #[arg(long)]
        in_memory: bool,
    },
    /// Apply the database schema
    Migrate,
    /// Import categories and products from JSON files
    Seed {
        #[arg(long, default_value = "categories.json")]
        categories: PathBuf,
        #[arg(long, default_value = "products.json")]
        products: PathBuf,
    },
    /// Create a staff account for the login view
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        superuser: bool,
        /// Create the account without staff access
        #[arg(long)]
        not_staff: bool,
    },
    /// Delete expired carts
    PurgeCarts,
}

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    SqliteStorage::connect(&config.database.path)
        .with_context(|| format!("opening database {}", config.database.path))
}

async fn serve(config: Config, port: Option<u16>, in_memory: bool) -> anyhow::Result<()> {
    let storage: Arc<dyn Storage> = if in_memory {
        info!("Using in-memory storage");
        Arc::new(InMemoryStorage::new())
    } else {
        Arc::new(open_database(&config)?)
    };

    if config.uses_dev_cart_secret() {
        warn!("FC_CART_SECRET is not set; cart cookies are signed with the development key");
    }
    metrics::init();

    let mailer = build_mailer(&config.mail)?;
    let templates = Arc::new(EmailTemplates::new()?);
    let notifier = OrderNotifier::new(mailer, templates, storage.clone(), config.shop.name.clone());

    let cookies = CartCookies::from_config(&config.cart)?;
    let context = GraphQLContext::new(
        storage.clone(),
        MediaUrls::new(&config.server.public_base_url, &config.server.media_url),
        cookies.ttl(),
        Some(notifier),
    );
    let app = server::create_server(create_schema(context), storage, cookies, &config.server);

    let port = port.unwrap_or(config.server.port);
    server::start_server(app, &config.server.host, port).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { port, in_memory } => serve(config, port, in_memory).await?,
        Commands::Migrate => {
            open_database(&config)?;
            println!("Database ready at {}", config.database.path);
        }
        Commands::Seed {
            categories,
            products,
        } => {
            let storage = open_database(&config)?;
            let report = seed::run(&storage, &categories, &products).await?;
            println!(
                "Categories: created {}, skipped {}",
                report.categories_created, report.categories_skipped
            );
            println!(
                "Products: created {}, skipped {}",
                report.products_created, report.products_skipped
            );
            if report.invalid > 0 {
                println!("Invalid entries: {}", report.invalid);
            }
        }
        Commands::CreateAdmin {
            username,
            email,
            password,
            first_name,
            last_name,
            superuser,
            not_staff,
        } => {
            let storage = open_database(&config)?;
            let user = storage
                .create_admin_user(NewAdminUser {
                    username,
                    email: email.trim().to_string(),
                    password_hash: hash_password(&password)?,
                    first_name,
                    last_name,
                    is_staff: !not_staff,
                    is_superuser: superuser,
                })
                .await?;
            println!("Created admin user {} <{}>", user.username, user.email);
        }
        Commands::PurgeCarts => {
            let storage = open_database(&config)?;
            let purged = purge_expired(&storage).await?;
            println!("Purged {purged} expired carts");
        }
    }

    Ok(())
}
