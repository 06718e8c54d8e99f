use super::{product, user};
use crate::status::FulfillmentStatus;
use sea_orm::entity::prelude::*;

/// A customer's order for a product to be brought to a location.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: i32,
    /// Account assigned to fulfil the delivery, if any.
    pub rider_id: Option<i32>,
    pub product_id: i32,
    pub status: FulfillmentStatus,
    pub location: Option<String>,
    pub message: Option<String>,
    pub price: Option<String>,
    /// Media key of the payment receipt.
    pub payment: Option<String>,
    pub delivery_issued: DateTimeUtc,
    pub quantity: i32,
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
    #[sea_orm(
        belongs_to = "product::Entity",
        from = "Column::ProductId",
        to = "product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
