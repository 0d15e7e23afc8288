//! mcpreg - MCP Registry CLI

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcpreg::commands::TokenSource;
use mcpreg::tree::{children_of, TreeNode};
use mcpreg::workspace::{find_server_configs, read_server_config, read_update_file, write_server_template};
use mcpreg::{set_config_value, Namespace, Paths, Registry, RegistryEntry, UpdateFields};

#[derive(Parser)]
#[command(name = "mcpreg")]
#[command(about = "MCP Registry client - browse, publish, update, and delete registry entries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List registry servers and their tools
    #[command(alias = "tree")]
    List {
        /// Search query
        #[arg(short, long)]
        query: Option<String>,

        /// Filter by tool names (comma-separated)
        #[arg(long, value_delimiter = ',')]
        tools: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show detailed info for a server
    Info {
        /// Server ID (e.g. kp.internal.example/my-server)
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Publish a server.json to the registry
    Publish {
        /// Path to server.json (default: search the current directory)
        #[arg(long)]
        file: Option<PathBuf>,

        /// Namespace prefix, e.g. kp.internal.example
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Create a starter server.json
    Init {
        /// Server name
        #[arg(long)]
        name: Option<String>,

        /// What the server does
        #[arg(long)]
        description: Option<String>,

        /// Server endpoint URL
        #[arg(long)]
        endpoint: Option<String>,

        /// Directory to write server.json into
        #[arg(long, default_value = ".")]
        dir: PathBuf,

        /// Overwrite an existing server.json
        #[arg(long)]
        force: bool,
    },

    /// Update an existing server
    Update {
        /// Server ID
        id: String,

        /// Path to a JSON file with updated fields
        #[arg(long)]
        file: Option<PathBuf>,

        /// Update server name
        #[arg(long)]
        name: Option<String>,

        /// Update server description
        #[arg(long)]
        description: Option<String>,

        /// Update server version
        #[arg(long)]
        version: Option<String>,

        /// Update server endpoint
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Delete a server from the registry
    Delete {
        /// Server ID
        id: String,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Check registry API health
    Health,

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Show or change client configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show resolved paths (for debugging)
    Paths,
}

#[derive(Subcommand)]
enum AuthAction {
    /// Store a token, or fetch a development token from the registry
    Login {
        /// Bearer token to store
        #[arg(long, env = "KP_MCP_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Send requests without a token (development registries)
    Disable,

    /// Send the stored token again
    Enable,

    /// Show authentication state
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a config value (api_base_url, auto_refresh, page_size, token_storage)
    Set {
        /// Config key
        key: String,

        /// Config value
        value: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let paths = Paths::resolve();
    run(&paths, cli.command).await
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "mcpreg=debug" } else { "mcpreg=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open(paths: &Paths) -> Result<Registry> {
    Registry::open(paths).context("Failed to load configuration")
}

async fn run(paths: &Paths, command: Commands) -> Result<()> {
    match command {
        Commands::List { query, tools, json } => {
            let mut registry = open(paths)?;
            refresh(&mut registry, query.as_deref(), &tools).await?;
            if json {
                let entries: Vec<&RegistryEntry> = registry.tree().entries().iter().map(|n| &n.entry).collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_tree(&registry);
            }
        }
        Commands::Info { id, json } => {
            let registry = open(paths)?;
            let entry = match registry.details(&id).await {
                Ok(e) => e,
                Err(e) => {
                    let message = if !e.is_not_authenticated() && registry.suggests_login().await {
                        "Failed to load server details. Try `mcpreg auth login` first"
                    } else {
                        "Failed to load server details"
                    };
                    return Err(e).context(message);
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                print_info_output(&entry);
            }
        }
        Commands::Publish { file, namespace } => {
            let mut registry = open(paths)?;
            // Check the session before asking anything else.
            registry.require_token().await?;

            let Some(file) = pick_server_config(file)? else {
                return Ok(());
            };
            let config = read_server_config(&file)?;
            let namespace = match namespace {
                Some(ns) => ns,
                None => prompt_namespace()?,
            };

            let id = registry
                .publish(&config, &namespace)
                .await
                .context("Failed to publish server")?;
            println!("Published {}", id);
            auto_refresh(&mut registry).await;
        }
        Commands::Init {
            name,
            description,
            endpoint,
            dir,
            force,
        } => run_init(name, description, endpoint, dir, force)?,
        Commands::Update {
            id,
            file,
            name,
            description,
            version,
            endpoint,
        } => {
            let mut registry = open(paths)?;
            let base = match file {
                Some(path) => read_update_file(&path)?,
                None => serde_json::Map::new(),
            };
            let updates = UpdateFields {
                name,
                description,
                version,
                endpoint,
            }
            .apply(base);

            registry
                .update(&id, &updates)
                .await
                .context("Failed to update server")?;
            println!("Updated {}", id);
            auto_refresh(&mut registry).await;
        }
        Commands::Delete { id, yes } => {
            let mut registry = open(paths)?;
            registry.require_token().await?;

            if !yes {
                let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                    .with_prompt(format!("Delete server \"{}\"?", id))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Deletion cancelled");
                    return Ok(());
                }
            }

            registry.delete(&id).await.context("Failed to delete server")?;
            println!("Deleted {}", id);
            auto_refresh(&mut registry).await;
        }
        Commands::Health => {
            let registry = open(paths)?;
            let url = registry.client().base_url().clone();
            if registry.health().await {
                println!("API is healthy ({})", url);
            } else {
                bail!("Cannot connect to MCP Registry API at {}", url);
            }
        }
        Commands::Auth { action } => {
            let mut registry = open(paths)?;
            run_auth(&mut registry, action).await?;
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => {
            let registry = open(paths)?;
            let settings = registry.settings();
            let status = registry.status().await?;
            println!("API Base URL:  {}", settings.api_base_url);
            println!("Auto refresh:  {}", settings.auto_refresh);
            println!("Page size:     {}", settings.page_size);
            println!("Token storage: {}", settings.token_storage);
            println!("Auth disabled: {}", status.auth_disabled);
            println!("Token set:     {}", if status.token_preview.is_some() { "yes" } else { "no" });
            if let Some(preview) = status.token_preview {
                println!("Token preview: {}", preview);
            }
        }
        Commands::Config {
            action: ConfigAction::Set { key, value },
        } => {
            // Works without opening the registry so a bad base URL can be fixed.
            set_config_value(paths.config_file(), &key, &value)?;
            println!("Set {} = {}", key, value.trim());
        }
        Commands::Paths => {
            let registry = open(paths)?;
            println!("Config file:   {}", paths.config_file().display());
            println!("Token store:   {}", registry.session().secrets_location());
            println!("Settings file: {}", paths.settings_file().display());
            println!("Config exists: {}", paths.config_file().exists());
        }
    }
    Ok(())
}

async fn run_auth(registry: &mut Registry, action: AuthAction) -> Result<()> {
    match action {
        AuthAction::Login { token } => {
            match registry.authenticate(token.as_deref()).await.context("Authentication failed")? {
                TokenSource::Provided => println!("Token stored."),
                TokenSource::DevEndpoint => println!("Successfully authenticated with MCP Registry!"),
            }
            if registry.session().is_auth_disabled().await? {
                println!("Note: authentication is disabled; run `mcpreg auth enable` to use the token.");
            }
        }
        AuthAction::Logout => {
            registry.logout().await?;
            println!("Logged out from MCP Registry");
        }
        AuthAction::Disable => {
            registry.disable_auth().await?;
            println!("Authentication disabled. API calls will be made without tokens.");
            auto_refresh(registry).await;
        }
        AuthAction::Enable => {
            registry.enable_auth().await?;
            if registry.session().is_authenticated().await? {
                println!("Authentication enabled.");
            } else {
                println!("Authentication enabled. Run `mcpreg auth login` to access the API.");
            }
        }
        AuthAction::Status => {
            let status = registry.status().await?;
            let state = match (status.auth_disabled, status.authenticated) {
                (true, _) => "disabled",
                (false, true) => "authenticated",
                (false, false) => "not authenticated",
            };
            println!("Authentication: {}", state);
            if let Some(preview) = status.token_preview {
                println!("Stored token:   {}", preview);
            }
        }
    }
    Ok(())
}

async fn refresh(registry: &mut Registry, query: Option<&str>, tools: &[String]) -> Result<u64> {
    match registry.refresh(query, tools).await {
        Ok(total) => Ok(total),
        Err(e) => {
            let message = if registry.suggests_login().await {
                "Failed to load MCP servers. Please authenticate first using `mcpreg auth login`"
            } else {
                "Failed to load MCP servers. Check your API connection"
            };
            Err(e).context(message)
        }
    }
}

async fn auto_refresh(registry: &mut Registry) {
    if !registry.settings().auto_refresh {
        return;
    }
    match refresh(registry, None, &[]).await {
        Ok(_) => {
            println!();
            print_tree(registry);
        }
        Err(e) => eprintln!("Warning: {:#}", e),
    }
}

fn run_init(
    name: Option<String>,
    description: Option<String>,
    endpoint: Option<String>,
    dir: PathBuf,
    force: bool,
) -> Result<()> {
    let theme = ColorfulTheme::default();
    let ask = |value: Option<String>, prompt: &str, placeholder: &str| -> Result<String> {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Ok(v),
            None => Ok(Input::<String>::with_theme(&theme)
                .with_prompt(format!("{} (e.g. {})", prompt, placeholder))
                .interact_text()?),
        }
    };

    let name = ask(name, "Server name", "My MCP Server")?;
    let description = ask(description, "Server description", "What does your server do?")?;
    let endpoint = ask(endpoint, "Server endpoint URL", "https://api.example.com/mcp")?;

    let path = write_server_template(&dir, &name, &description, &endpoint, force)?;
    println!("Server configuration created: {}", path.display());
    Ok(())
}

/// The server.json to publish: the given file, the only one found, or the
/// user's pick when there are several. `None` when there is none.
fn pick_server_config(file: Option<PathBuf>) -> Result<Option<PathBuf>> {
    if let Some(file) = file {
        return Ok(Some(file));
    }

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let mut found = find_server_configs(&cwd);
    match found.len() {
        0 => {
            println!("No server.json found. Create one with: mcpreg init");
            Ok(None)
        }
        1 => Ok(found.pop()),
        _ => {
            let labels: Vec<String> = found
                .iter()
                .map(|p| p.strip_prefix(&cwd).unwrap_or(p).display().to_string())
                .collect();
            let selection = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("Select server configuration to publish")
                .items(&labels)
                .default(0)
                .interact_opt()?;
            Ok(selection.map(|i| found.swap_remove(i)))
        }
    }
}

fn prompt_namespace() -> Result<String> {
    let namespace = Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt("Namespace")
        .default("kp.internal.example".to_string())
        .validate_with(|value: &String| -> Result<(), String> {
            Namespace::parse(value.trim())
                .map(|_| ())
                .map_err(|_| "Namespace must start with kp.internal., kp.public., or kp.experimental.".to_string())
        })
        .interact_text()?;
    Ok(namespace)
}

fn print_tree(registry: &Registry) {
    const INDENT: &str = "        ";

    let roots = registry.tree().roots();
    if roots.is_empty() {
        println!("No servers found in registry.");
        return;
    }

    for root in roots {
        println!("{}", root.id());
        if let TreeNode::Entry(entry) = root {
            println!("{}Name:      {}", INDENT, root.label());
            if !entry.version.is_empty() {
                println!("{}Version:   {}", INDENT, entry.version);
            }
            if !entry.owner.is_empty() {
                println!("{}Owner:     {}", INDENT, entry.owner);
            }
            if !entry.description.is_empty() {
                println!("{}Summary:   {}", INDENT, entry.description.lines().next().unwrap_or("").trim());
            }
        }
        let tools = children_of(root);
        if !tools.is_empty() {
            println!("{}Tools:", INDENT);
            for tool in tools {
                if tool.description().is_empty() {
                    println!("{}  - {}", INDENT, tool.label());
                } else {
                    println!("{}  - {}", INDENT, tool.tooltip());
                }
            }
        }
        println!();
    }
}

fn print_info_output(entry: &RegistryEntry) {
    const INDENT: &str = "        ";

    println!("{}", entry.id);
    println!("{}Name:        {}", INDENT, entry.name);
    println!("{}Version:     {}", INDENT, entry.version);
    if !entry.description.is_empty() {
        println!("{}Description:", INDENT);
        for line in entry.description.lines() {
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                println!("{}{}{}", INDENT, INDENT, trimmed);
            }
        }
    }
    println!("{}Endpoint:    {}", INDENT, entry.endpoint);
    println!("{}Owner:       {}", INDENT, entry.owner);
    println!("{}Team:        {}", INDENT, entry.team);
    if !entry.tools.is_empty() {
        let names: Vec<&str> = entry.tools.iter().map(|t| t.name.as_str()).collect();
        println!("{}Tools:       {}", INDENT, names.join(", "));
    }
    if !entry.auth_methods.is_empty() {
        println!("{}Auth:        {}", INDENT, entry.auth_methods.join(", "));
    }
    if !entry.tags.is_empty() {
        println!("{}Tags:        {}", INDENT, entry.tags.join(", "));
    }
}
