//! Create-superuser command - bootstraps the first administrator.

use std::sync::Arc;

use crate::cli::args::CreateSuperuserArgs;
use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Database, LocalMediaStore, LogMailer, NoCache};
use crate::services::{Collaborators, ServiceContainer, Services};

pub async fn execute(args: CreateSuperuserArgs, config: Config) -> AppResult<()> {
    let db = Database::connect(&config).await?;

    let collaborators = Collaborators {
        mailer: Arc::new(LogMailer),
        cache: Arc::new(NoCache),
        media: Arc::new(LocalMediaStore::new(config.media_root.as_str())),
    };
    let services = Services::from_connection(db.get_connection(), collaborators, config);

    let employee = services
        .accounts()
        .create_superuser(args.email, args.phone, args.password)
        .await?;

    println!("Superuser {} created ({})", employee.email, employee.id);
    Ok(())
}
