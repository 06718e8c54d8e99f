use anyhow::{bail, Context, Result};
use chrono::Utc;
use model::entities::{profile, user};
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set, TransactionTrait};
use tracing::{debug, info, warn};

use crate::auth::hash_password;

pub async fn create_admin(database_url: &str, username: &str, password: &str, email: &str) -> Result<()> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        bail!("Username and password must not be empty");
    }
    debug!("Database URL: {}", database_url);

    let db = Database::connect(database_url).await?;

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(&db)
        .await?;
    if existing.is_some() {
        warn!("Account '{}' already exists", username);
        bail!("Username '{}' already exists", username);
    }

    let password_hash = hash_password(password).context("Failed to hash password")?;

    let txn = db.begin().await?;
    let account = user::ActiveModel {
        username: Set(username.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        email: Set(email.trim().to_string()),
        password_hash: Set(password_hash),
        is_active: Set(true),
        is_staff: Set(true),
        is_superuser: Set(true),
        date_joined: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    profile::ActiveModel {
        user_id: Set(account.id),
        role: Set(Some("Admin".to_string())),
        status: Set("Active".to_string()),
        profile_picture: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!("Admin account '{}' created with ID {}", account.username, account.id);
    Ok(())
}
