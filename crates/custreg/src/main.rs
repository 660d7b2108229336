//! `custreg` - CLI for the customer registry
//!
//! This binary provides the command-line interface for adding, searching and
//! inspecting customers whose emails are stored encrypted.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::{bail, Context};
use clap::Parser;

use custreg::cli::{
    shell, AddCommand, Cli, Command, ConfigCommand, SearchCommand, ShowCommand, XmlCommand,
};
use custreg::crypto::KeyStore;
use custreg::{init_logging, Config, Error, FormController, Registry, Storage};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    // Execute the command
    match cli.command {
        Command::Add(cmd) => handle_add(&config, &cmd),
        Command::Search(cmd) => handle_search(&config, &cmd),
        Command::Xml(cmd) => handle_xml(&config, &cmd),
        Command::Show(cmd) => handle_show(&config, &cmd),
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Shell => handle_shell(&config),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_registry(config: &Config) -> anyhow::Result<Registry> {
    Registry::open(config).with_context(|| {
        format!(
            "failed to open registry at {}",
            config.database_path().display()
        )
    })
}

fn handle_add(config: &Config, cmd: &AddCommand) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let id = registry.add_from_form(&cmd.name, &cmd.email, &cmd.phone, cmd.image.as_deref())?;
    println!("Customer added (encrypted) successfully");
    println!("ID: {id}");
    Ok(())
}

fn handle_search(config: &Config, cmd: &SearchCommand) -> anyhow::Result<()> {
    let mut registry = open_registry(config)?;
    if let Some(strategy) = cmd.strategy {
        registry.set_strategy(strategy.into());
    }

    let report = registry.search(&cmd.email)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(customer) = &report.customer {
        println!("ID:    {}", customer.id);
        println!("Name:  {}", customer.name);
        println!("Email: {}", customer.email);
        println!("Phone: {}", customer.phone);
    }

    if report.undecryptable > 0 {
        eprintln!(
            "warning: {} record(s) could not be decrypted with the current key",
            report.undecryptable
        );
    }
    if !report.is_found() {
        return Err(Error::NotFound.into());
    }
    Ok(())
}

fn handle_xml(config: &Config, cmd: &XmlCommand) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let customer = registry.find_by_email(&cmd.email)?;
    let xml = registry.generate_xml(customer.id, &customer.name)?;
    println!("{xml}");
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let customer = registry.get(cmd.id)?;

    if cmd.json {
        let mut value = serde_json::to_value(&customer)?;
        value["image_bytes"] = serde_json::json!(customer.image_len());
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("ID:      {}", customer.id);
        println!("Name:    {}", customer.name);
        println!("Email:   {}", customer.email);
        println!("Phone:   {}", customer.phone);
        match customer.image_len() {
            Some(len) => println!("Image:   {len} bytes"),
            None => println!("Image:   none"),
        }
        println!("Created: {}", customer.created_at.to_rfc3339());
        if let Some(xml) = &customer.derived_xml {
            println!("XML:     {xml}");
        }
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let key_store = KeyStore::new(config.key_path());
    let database_path = config.database_path();

    // Status never creates the database or the key.
    let stats = if database_path.exists() {
        Some(Storage::open(&database_path)?.stats()?)
    } else {
        None
    };

    if json {
        let status = serde_json::json!({
            "database_path": database_path,
            "database_exists": stats.is_some(),
            "key_path": key_store.path(),
            "key_exists": key_store.exists(),
            "search_strategy": config.search.strategy,
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("custreg status");
        println!("--------------");
        println!("Database:      {}", database_path.display());
        println!(
            "Key file:      {} ({})",
            key_store.path().display(),
            if key_store.exists() { "present" } else { "missing" }
        );
        println!("Search:        {}", config.search.strategy);
        match &stats {
            Some(stats) => {
                println!(
                    "Key id:        {}",
                    stats.key_id.as_deref().unwrap_or("(unbound)")
                );
                println!("Customers:     {}", stats.total_customers);
                println!("With image:    {}", stats.with_image);
                println!("With XML:      {}", stats.with_xml);
                println!("Size:          {} bytes", stats.db_size_bytes);
            }
            None => println!("Customers:     (database not created yet)"),
        }
    }
    Ok(())
}

fn handle_shell(config: &Config) -> anyhow::Result<()> {
    let mut controller = FormController::new(open_registry(config)?);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    shell::run(&mut controller, stdin.lock(), stdout.lock())?;
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Key path:           {}", config.key_path().display());
                println!();
                println!("[Search]");
                println!("  Strategy:           {}", config.search.strategy);
                println!();
                println!("[Image]");
                println!("  Max bytes:          {}", config.image.max_bytes);
                println!(
                    "  Extensions:         {}",
                    config.image.allowed_extensions.join(", ")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}
