use super::user;
use crate::status::FulfillmentStatus;
use sea_orm::entity::prelude::*;

/// A ride request from a customer's current location to a destination.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transportations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    pub rider_id: Option<i32>,
    pub status: FulfillmentStatus,
    pub current_location: Option<String>,
    pub destination: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    pub payment: Option<String>,
    pub date_requested: DateTimeUtc,
    /// Number of passengers as entered by the customer.
    pub passengers: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::CustomerId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::RiderId",
        to = "user::Column::Id",
        on_delete = "SetNull"
    )]
    Rider,
}

impl ActiveModelBehavior for ActiveModel {}
