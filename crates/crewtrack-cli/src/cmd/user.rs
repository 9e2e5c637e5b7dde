use crate::output::{print_json, print_table};
use crate::session::{block_on, Session};
use anyhow::Context;
use clap::Subcommand;
use crewtrack_core::types::Role;
use std::path::Path;

#[derive(Subcommand)]
pub enum UserSubcommand {
    /// Register a user. The first user needs no --as; later ones need a manager.
    Add {
        username: String,
        /// manager or member
        #[arg(long)]
        role: Role,
        /// Password used to confirm destructive actions
        #[arg(long)]
        password: String,
    },
    /// List registered users
    List,
}

pub fn run(root: &Path, user: Option<&str>, subcmd: UserSubcommand, json: bool) -> anyhow::Result<()> {
    let session = Session::open(root, user)?;
    match subcmd {
        UserSubcommand::Add {
            username,
            role,
            password,
        } => block_on(add(&session, &username, role, &password, json)),
        UserSubcommand::List => block_on(list(&session, json)),
    }
}

async fn add(session: &Session, username: &str, role: Role, password: &str, json: bool) -> anyhow::Result<()> {
    let identity = session.identity();
    if !identity.list_users().await?.is_empty() {
        let ws = session.workspace();
        let actor = session.actor(&ws).await?;
        if actor.role != Role::Manager {
            anyhow::bail!("only a manager can register users");
        }
    }

    let account = identity
        .register(username, role, password)
        .await
        .with_context(|| format!("failed to register '{username}'"))?;

    if json {
        print_json(&serde_json::json!({
            "id": account.id,
            "username": account.username,
            "role": account.role,
        }))?;
    } else {
        println!("Registered {} ({}) [{}]", account.username, account.role, account.id);
    }
    Ok(())
}

async fn list(session: &Session, json: bool) -> anyhow::Result<()> {
    let users = session.identity().list_users().await?;

    if json {
        let items: Vec<_> = users
            .iter()
            .map(|u| serde_json::json!({ "id": u.id, "username": u.username, "role": u.role }))
            .collect();
        print_json(&items)?;
        return Ok(());
    }

    if users.is_empty() {
        println!("No users.");
        return Ok(());
    }
    let rows = users
        .iter()
        .map(|u| vec![u.username.clone(), u.role.to_string(), u.id.clone()])
        .collect();
    print_table(&["USERNAME", "ROLE", "ID"], rows);
    Ok(())
}
