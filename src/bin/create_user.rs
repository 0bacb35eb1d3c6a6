use std::io::{self, Write};

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use vidtube_api::auth::passwords::PasswordService;
use vidtube_api::auth::store::{IdentityStore, PgIdentityStore};
use vidtube_api::auth::{AuthConfig, AuthError};
use vidtube_api::models::NewIdentity;

#[derive(Parser, Debug)]
#[command(name = "create_user", about = "Create a Vidtube account without the HTTP API")]
struct Args {
    /// Unique handle for the account (stored lower-case).
    #[arg(long)]
    username: String,

    /// Email address for the account (case insensitive).
    #[arg(long)]
    email: String,

    /// Plaintext password to hash and store for this user.
    #[arg(long)]
    password: String,

    /// Name shown on the user's channel.
    #[arg(long)]
    full_name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();
    let username = args.username.trim().to_lowercase();
    let email = args.email.trim().to_lowercase();

    if !email.contains('@') {
        writeln!(io::stderr(), "error: email must contain '@'")?;
        std::process::exit(1);
    }
    if username.is_empty() || args.full_name.trim().is_empty() || args.password.is_empty() {
        writeln!(io::stderr(), "error: all fields are required")?;
        std::process::exit(1);
    }

    let database_url = std::env::var("DATABASE_URL")?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await?;
    vidtube_api::db::run_migrations(&pool).await?;

    let (memory_kib, iterations) = AuthConfig::password_cost_from_env();
    let password_service = PasswordService::with_cost(memory_kib, iterations).map_err(|err| {
        io::Error::new(io::ErrorKind::Other, format!("argon2 init failed: {err}"))
    })?;
    let password_hash = password_service
        .hash_password(&args.password)
        .map_err(|err| {
            io::Error::new(io::ErrorKind::Other, format!("password hash failed: {err}"))
        })?;

    let store = PgIdentityStore::new(pool);
    let created = store
        .insert(NewIdentity {
            username,
            email,
            full_name: args.full_name.trim().to_string(),
            password_hash,
        })
        .await;

    match created {
        Ok(identity) => {
            println!(
                "Created user '{}' <{}> with id {}",
                identity.username, identity.email, identity.id
            );
            Ok(())
        }
        Err(AuthError::Conflict(message)) => {
            writeln!(io::stderr(), "error: {message}")?;
            std::process::exit(1);
        }
        Err(err) => Err(err.into()),
    }
}
