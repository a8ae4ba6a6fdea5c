//! Keys command - issue and revoke API keys against the configured store

use clap::{Args, Subcommand};
use ipnet::IpNet;

use crate::config::AppConfig;
use crate::domain::api_key::{ApiKeyId, KeyType, Role};
use crate::infrastructure::api_key::IssueRequest;

#[derive(Args)]
pub struct KeysArgs {
    #[command(subcommand)]
    pub action: KeysAction,
}

#[derive(Subcommand)]
pub enum KeysAction {
    /// Issue a new API key; the secret is printed once and never recoverable
    Issue {
        /// Owner the key is issued to
        #[arg(long)]
        owner: String,

        /// Role granted to the key
        #[arg(long, default_value = "basic", value_parser = parse_role)]
        role: Role,

        /// Issue as a service account key instead of a standard one
        #[arg(long)]
        service_account: bool,

        /// Restrict the key to these source networks (repeatable)
        #[arg(long = "allow-ip")]
        ip_allowlist: Vec<IpNet>,

        /// Free-form description
        #[arg(long)]
        description: Option<String>,

        /// Validity window in days; omit for a non-expiring key
        #[arg(long)]
        expires_in_days: Option<i64>,
    },

    /// Revoke an API key by id
    Revoke {
        /// The key id (the middle segment of the full key)
        id: String,
    },
}

fn parse_role(value: &str) -> Result<Role, String> {
    match value {
        "anonymous" => Ok(Role::Anonymous),
        "basic" => Ok(Role::Basic),
        "premium" => Ok(Role::Premium),
        "developer" => Ok(Role::Developer),
        "admin" => Ok(Role::Admin),
        other => Err(format!(
            "unknown role '{}' (expected anonymous, basic, premium, developer or admin)",
            other
        )),
    }
}

pub async fn run(args: KeysArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    let state = crate::create_app_state_with_config(&config).await?;

    match args.action {
        KeysAction::Issue {
            owner,
            role,
            service_account,
            ip_allowlist,
            description,
            expires_in_days,
        } => {
            let issued = state
                .auth
                .issue(IssueRequest {
                    owner_id: owner,
                    role,
                    key_type: if service_account {
                        KeyType::ServiceAccount
                    } else {
                        KeyType::Standard
                    },
                    ip_allowlist,
                    description,
                    expires_in_days,
                })
                .await?;

            println!("Issued key id: {}", issued.api_key.id());
            println!("Role:          {}", issued.api_key.role());
            println!();
            println!("API key (shown once, store it now):");
            println!("{}", issued.secret);
        }
        KeysAction::Revoke { id } => {
            let id = ApiKeyId::new(id)?;
            if state.auth.revoke(&id).await? {
                println!("Revoked key {}", id);
            } else {
                println!("Key {} was already revoked", id);
            }
        }
    }

    Ok(())
}
