use sea_orm::entity::prelude::*;

/// An item in the catalog that customers can order for delivery.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Media key of the product picture.
    pub picture: Option<String>,
    /// Kept as text, the way prices are entered by the shop.
    pub price: Option<String>,
    /// Free text, starts as [`crate::status::DEFAULT_PRODUCT_STATUS`].
    pub status: String,
    pub product_type: Option<String>,
    /// Units in stock. Never negative.
    pub quantity: i32,
    pub date_posted: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery::Entity")]
    Delivery,
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Delivery.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
