//! This file serves as the root for all SeaORM entity modules.
//! We define the data models for the delivery and ride marketplace here.

pub mod chat_room;
pub mod delivery;
pub mod message;
pub mod payment;
pub mod product;
pub mod profile;
pub mod transportation;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::chat_room::Entity as ChatRoom;
    pub use super::delivery::Entity as Delivery;
    pub use super::message::Entity as Message;
    pub use super::payment::Entity as Payment;
    pub use super::product::Entity as Product;
    pub use super::profile::Entity as Profile;
    pub use super::transportation::Entity as Transportation;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, Set,
    };

    use super::*;
    use crate::status::{DEFAULT_PRODUCT_STATUS, DEFAULT_PROFILE_STATUS, FulfillmentStatus};
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn insert_user(db: &DatabaseConnection, username: &str, role: &str) -> Result<user::Model, DbErr> {
        let account = user::ActiveModel {
            username: Set(username.to_string()),
            first_name: Set(format!("{username}-first")),
            last_name: Set(String::new()),
            email: Set(String::new()),
            password_hash: Set("not-a-real-hash".to_string()),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            date_joined: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        profile::ActiveModel {
            user_id: Set(account.id),
            role: Set(Some(role.to_string())),
            status: Set(DEFAULT_PROFILE_STATUS.to_string()),
            profile_picture: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(account)
    }

    #[tokio::test]
    async fn test_entity_integration() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let customer = insert_user(&db, "0700000001", "Customer").await?;
        let rider = insert_user(&db, "0700000002", "Rider").await?;

        let rider_profile = rider
            .find_related(Profile)
            .one(&db)
            .await?
            .expect("rider profile");
        assert!(rider_profile.is_rider());
        assert_eq!(rider_profile.status, "Pending");

        let rice = product::ActiveModel {
            name: Set("Rice".to_string()),
            picture: Set(None),
            price: Set(Some("500".to_string())),
            status: Set(DEFAULT_PRODUCT_STATUS.to_string()),
            product_type: Set(Some("Grocery".to_string())),
            quantity: Set(10),
            date_posted: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let delivery = delivery::ActiveModel {
            customer_id: Set(customer.id),
            rider_id: Set(Some(rider.id)),
            product_id: Set(rice.id),
            status: Set(FulfillmentStatus::Assigned),
            location: Set(Some("Market street".to_string())),
            message: Set(None),
            price: Set(Some("500".to_string())),
            payment: Set(None),
            delivery_issued: Set(Utc::now()),
            quantity: Set(2),
            ..Default::default()
        }
        .insert(&db)
        .await?;
        assert_eq!(delivery.status, FulfillmentStatus::Assigned);

        let stored = Delivery::find_by_id(delivery.id).one(&db).await?.expect("delivery");
        assert_eq!(stored.status, FulfillmentStatus::Assigned);
        assert_eq!(stored.rider_id, Some(rider.id));

        // Deleting the rider clears the reference but keeps the delivery
        User::delete_by_id(rider.id).exec(&db).await?;
        let stored = Delivery::find_by_id(delivery.id).one(&db).await?.expect("delivery");
        assert_eq!(stored.rider_id, None);

        // Deleting the customer cascades to profile and deliveries
        User::delete_by_id(customer.id).exec(&db).await?;
        assert_eq!(Delivery::find().count(&db).await?, 0);
        assert_eq!(
            Profile::find()
                .filter(profile::Column::UserId.eq(customer.id))
                .count(&db)
                .await?,
            0
        );
        assert_eq!(Product::find().count(&db).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_chat_room_pair_is_unique() -> Result<(), DbErr> {
        let db = setup_db().await?;

        let a = insert_user(&db, "0700000011", "Customer").await?;
        let b = insert_user(&db, "0700000012", "Customer").await?;
        let (low, high) = chat_room::canonical_pair(b.id, a.id);

        let room = chat_room::ActiveModel {
            user1_id: Set(low),
            user2_id: Set(high),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let duplicate = chat_room::ActiveModel {
            user1_id: Set(low),
            user2_id: Set(high),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&db)
        .await;
        assert!(duplicate.is_err());

        message::ActiveModel {
            room_id: Set(room.id),
            sender_id: Set(a.id),
            content: Set("hello".to_string()),
            created_at: Set(Utc::now()),
            is_read: Set(false),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        assert_eq!(room.find_related(Message).count(&db).await?, 1);

        // Removing a member removes the room and its messages
        User::delete_by_id(a.id).exec(&db).await?;
        assert_eq!(ChatRoom::find().count(&db).await?, 0);
        assert_eq!(Message::find().count(&db).await?, 0);

        Ok(())
    }
}
