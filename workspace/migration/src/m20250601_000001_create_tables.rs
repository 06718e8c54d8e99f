use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string(Users::FirstName).default(""))
                    .col(string(Users::LastName).default(""))
                    .col(string(Users::Email).default(""))
                    .col(string(Users::PasswordHash))
                    .col(boolean(Users::IsActive).default(true))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(boolean(Users::IsSuperuser).default(false))
                    .col(timestamp_with_time_zone(Users::DateJoined))
                    .to_owned(),
            )
            .await?;

        // Create profiles table
        manager
            .create_table(
                Table::create()
                    .table(Profiles::Table)
                    .if_not_exists()
                    .col(pk_auto(Profiles::Id))
                    .col(integer(Profiles::UserId).unique_key())
                    .col(text_null(Profiles::Role))
                    .col(text(Profiles::Status).default("Pending"))
                    .col(string_null(Profiles::ProfilePicture))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_profiles_user")
                            .from(Profiles::Table, Profiles::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create products table
        manager
            .create_table(
                Table::create()
                    .table(Products::Table)
                    .if_not_exists()
                    .col(pk_auto(Products::Id))
                    .col(text(Products::Name))
                    .col(string_null(Products::Picture))
                    .col(text_null(Products::Price))
                    .col(text(Products::Status).default("Available"))
                    .col(text_null(Products::ProductType))
                    .col(integer(Products::Quantity).default(0))
                    .col(timestamp_with_time_zone(Products::DatePosted))
                    .to_owned(),
            )
            .await?;

        // Create deliveries table
        manager
            .create_table(
                Table::create()
                    .table(Deliveries::Table)
                    .if_not_exists()
                    .col(pk_auto(Deliveries::Id))
                    .col(integer(Deliveries::CustomerId))
                    .col(integer_null(Deliveries::RiderId))
                    .col(integer(Deliveries::ProductId))
                    .col(string_len(Deliveries::Status, 20).default("Pending"))
                    .col(text_null(Deliveries::Location))
                    .col(text_null(Deliveries::Message))
                    .col(text_null(Deliveries::Price))
                    .col(string_null(Deliveries::Payment))
                    .col(timestamp_with_time_zone(Deliveries::DeliveryIssued))
                    .col(integer(Deliveries::Quantity).default(1))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_customer")
                            .from(Deliveries::Table, Deliveries::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_rider")
                            .from(Deliveries::Table, Deliveries::RiderId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_deliveries_product")
                            .from(Deliveries::Table, Deliveries::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create transportations table
        manager
            .create_table(
                Table::create()
                    .table(Transportations::Table)
                    .if_not_exists()
                    .col(pk_auto(Transportations::Id))
                    .col(integer(Transportations::CustomerId))
                    .col(integer_null(Transportations::RiderId))
                    .col(string_len(Transportations::Status, 20).default("Pending"))
                    .col(text_null(Transportations::CurrentLocation))
                    .col(text_null(Transportations::Destination))
                    .col(text_null(Transportations::Message))
                    .col(text_null(Transportations::Price))
                    .col(string_null(Transportations::Payment))
                    .col(timestamp_with_time_zone(Transportations::DateRequested))
                    .col(text_null(Transportations::Passengers))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transportations_customer")
                            .from(Transportations::Table, Transportations::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transportations_rider")
                            .from(Transportations::Table, Transportations::RiderId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create payments table
        manager
            .create_table(
                Table::create()
                    .table(Payments::Table)
                    .if_not_exists()
                    .col(pk_auto(Payments::Id))
                    .col(integer(Payments::CustomerId))
                    .col(string(Payments::Pay))
                    .col(timestamp_with_time_zone(Payments::DateIssued))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_payments_customer")
                            .from(Payments::Table, Payments::CustomerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create chat_rooms table
        manager
            .create_table(
                Table::create()
                    .table(ChatRooms::Table)
                    .if_not_exists()
                    .col(pk_auto(ChatRooms::Id))
                    .col(integer(ChatRooms::User1Id))
                    .col(integer(ChatRooms::User2Id))
                    .col(timestamp_with_time_zone(ChatRooms::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_rooms_user1")
                            .from(ChatRooms::Table, ChatRooms::User1Id)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_chat_rooms_user2")
                            .from(ChatRooms::Table, ChatRooms::User2Id)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One room per unordered pair; pairs are stored as (min, max)
        manager
            .create_index(
                Index::create()
                    .name("idx_chat_rooms_pair")
                    .table(ChatRooms::Table)
                    .col(ChatRooms::User1Id)
                    .col(ChatRooms::User2Id)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create messages table
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(pk_auto(Messages::Id))
                    .col(integer(Messages::RoomId))
                    .col(integer(Messages::SenderId))
                    .col(text(Messages::Content))
                    .col(timestamp_with_time_zone(Messages::CreatedAt))
                    .col(boolean(Messages::IsRead).default(false))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_room")
                            .from(Messages::Table, Messages::RoomId)
                            .to(ChatRooms::Table, ChatRooms::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_messages_sender")
                            .from(Messages::Table, Messages::SenderId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_messages_room_created")
                    .table(Messages::Table)
                    .col(Messages::RoomId)
                    .col(Messages::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order of creation to respect foreign key constraints
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(ChatRooms::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Payments::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Transportations::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Deliveries::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Products::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Profiles::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

// Define identifiers for all tables

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    FirstName,
    LastName,
    Email,
    PasswordHash,
    IsActive,
    IsStaff,
    IsSuperuser,
    DateJoined,
}

#[derive(DeriveIden)]
enum Profiles {
    Table,
    Id,
    UserId,
    Role,
    Status,
    ProfilePicture,
}

#[derive(DeriveIden)]
enum Products {
    Table,
    Id,
    Name,
    Picture,
    Price,
    Status,
    ProductType,
    Quantity,
    DatePosted,
}

#[derive(DeriveIden)]
enum Deliveries {
    Table,
    Id,
    CustomerId,
    RiderId,
    ProductId,
    Status,
    Location,
    Message,
    Price,
    Payment,
    DeliveryIssued,
    Quantity,
}

#[derive(DeriveIden)]
enum Transportations {
    Table,
    Id,
    CustomerId,
    RiderId,
    Status,
    CurrentLocation,
    Destination,
    Message,
    Price,
    Payment,
    DateRequested,
    Passengers,
}

#[derive(DeriveIden)]
enum Payments {
    Table,
    Id,
    CustomerId,
    Pay,
    DateIssued,
}

#[derive(DeriveIden)]
enum ChatRooms {
    Table,
    Id,
    User1Id,
    User2Id,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    Id,
    RoomId,
    SenderId,
    Content,
    CreatedAt,
    IsRead,
}
