use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::Password;

use storehouse_client::auth::{SigninRequest, SignupRequest};
use storehouse_client::config::{
    CliArgs, Command, Config, ObjectCommand, StorageCommand, TemplateCommand,
};
use storehouse_client::models::{ObjectQuery, StorageCreate, TemplateQuery};
use storehouse_client::{tree, AppContext};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = CliArgs::parse();
    let config = Config::from_args(&args)?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(api_url = %config.api_url, db = %config.session_db.display(), "Starting");

    let ctx = AppContext::new(config)?;

    // Restore the previous session before anything else
    match ctx.auth().initialize().await {
        Ok(true) => tracing::debug!("Session restored"),
        Ok(false) => {}
        Err(e) => eprintln!("Previous session could not be restored: {}", e.user_message()),
    }

    if let Err(e) = run(&ctx, args.command).await {
        match e.downcast_ref::<storehouse_client::ApiError>() {
            Some(api) => eprintln!("Error: {}", api.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(ctx: &AppContext, command: Command) -> Result<()> {
    match command {
        Command::Signin { login, password } => {
            let password = match password {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Password")
                    .interact()
                    .context("Failed to read password")?,
            };
            let identity = ctx
                .auth()
                .sign_in(&SigninRequest::new(login, password))
                .await?;
            println!("Signed in as {}", identity.login);
        }

        Command::Signup {
            login,
            email,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Password")
                    .with_confirmation("Repeat password", "Passwords do not match")
                    .interact()
                    .context("Failed to read password")?,
            };
            let request = SignupRequest {
                login,
                email,
                password,
            };
            ctx.auth().sign_up(&request).await?;
            println!("Account {} registered, sign in to continue", request.login);
        }

        Command::Signout => {
            ctx.auth().sign_out().await;
            println!("Signed out");
        }

        Command::Status => match ctx.auth().identity() {
            Some(identity) => println!(
                "Signed in as {} since {}",
                identity.login,
                identity.signed_in_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None => println!("Not signed in"),
        },

        Command::Whoami => {
            require_session(ctx)?;
            let user = ctx.auth().current_user().await?;
            println!("{} (id {})", user.login, user.id);
            if let Some(mail) = &user.mail {
                println!("  mail:  {}", mail);
            }
            println!("  roles: {:?}", user.role);
        }

        Command::Storages(cmd) => {
            require_session(ctx)?;
            storages(ctx, cmd).await?;
        }

        Command::Templates(cmd) => {
            require_session(ctx)?;
            templates(ctx, cmd).await?;
        }

        Command::Objects(cmd) => {
            require_session(ctx)?;
            objects(ctx, cmd).await?;
        }

        Command::Units => {
            require_session(ctx)?;
            for unit in ctx.units().list().await? {
                println!("{}  {} ({})", unit.id, unit.name, unit.symbol);
            }
        }
    }

    Ok(())
}

fn require_session(ctx: &AppContext) -> Result<()> {
    if !ctx.auth().is_authenticated() {
        anyhow::bail!("Not signed in (run `storehouse signin <login>`)");
    }
    Ok(())
}

async fn storages(ctx: &AppContext, cmd: StorageCommand) -> Result<()> {
    let api = ctx.storages();
    match cmd {
        StorageCommand::List { parent } => {
            for storage in api.list(parent).await? {
                println!(
                    "{}  {} [{}%]",
                    storage.id,
                    storage.name,
                    tree::fill_percentage(&storage)
                );
            }
        }
        StorageCommand::Tree => {
            let all = api.list(None).await?;
            print!("{}", tree::render(&tree::build_tree(&all)));
        }
        StorageCommand::Show { id } => {
            let storage = api.get(id).await?;
            let all = api.list(None).await?;
            let path: Vec<String> = tree::storage_path(&all, id)
                .into_iter()
                .map(|s| s.name)
                .collect();

            println!("{}", storage.name);
            println!("  id:       {}", storage.id);
            println!("  location: {}", path.join(" / "));
            println!(
                "  fill:     {}/{} ({}%)",
                storage.fullness,
                storage.capacity,
                tree::fill_percentage(&storage)
            );
            if let Some(unit) = &storage.unit {
                println!("  unit:     {}", unit.name);
            }
        }
        StorageCommand::Create(args) => {
            let storage = api
                .create(&StorageCreate {
                    name: args.name,
                    capacity: args.capacity,
                    unit_id: args.unit,
                    parent_id: args.parent,
                })
                .await?;
            println!("Created storage {}", storage.id);
        }
        StorageCommand::Delete { id } => {
            api.delete(id).await?;
            println!("Deleted storage {}", id);
        }
    }
    Ok(())
}

async fn templates(ctx: &AppContext, cmd: TemplateCommand) -> Result<()> {
    let api = ctx.templates();
    match cmd {
        TemplateCommand::List { all } => {
            let query = if all {
                TemplateQuery::default()
            } else {
                TemplateQuery::active()
            };
            for template in api.list(&query).await? {
                let marker = if template.deleted { " (deleted)" } else { "" };
                println!("{}  {}{}", template.id, template.name, marker);
            }
        }
        TemplateCommand::Show { id } => {
            let template = api.get(id).await?;
            println!("{}", template.name);
            if let Some(description) = &template.description {
                println!("  {}", description);
            }
            for (key, attribute) in template.attributes() {
                let required = if attribute.required.unwrap_or(false) {
                    ", required"
                } else {
                    ""
                };
                println!("  {}: {:?}{}", key, attribute.kind, required);
            }
        }
        TemplateCommand::Delete { id } => {
            api.delete(id).await?;
            println!("Deleted template {}", id);
        }
    }
    Ok(())
}

async fn objects(ctx: &AppContext, cmd: ObjectCommand) -> Result<()> {
    let api = ctx.objects();
    match cmd {
        ObjectCommand::List {
            storage,
            template,
            all,
        } => {
            let query = ObjectQuery {
                storage_id: storage,
                template_id: template,
                decommissioned: if all { None } else { Some(false) },
            };
            for object in api.list(&query).await? {
                println!("{}  {}", object.id, object.name);
            }
        }
        ObjectCommand::Show { id } => {
            let object = api.get(id).await?;
            println!("{}", object.name);
            if let Some(storage) = object.storage_id() {
                println!("  storage:  {}", storage);
            }
            if let Some(template) = object.template_id() {
                println!("  template: {}", template);
            }
            for (key, value) in object.attribute_map() {
                println!("  {}: {}", key, value);
            }
        }
        ObjectCommand::Delete { id } => {
            api.delete(id).await?;
            println!("Deleted object {}", id);
        }
        ObjectCommand::Qr { id, output } => {
            let image = api.qr_code(id).await?;
            std::fs::write(&output, &image)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("QR code saved to {}", output.display());
        }
    }
    Ok(())
}
