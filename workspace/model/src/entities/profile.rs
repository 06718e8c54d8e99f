use super::user;
use sea_orm::entity::prelude::*;

/// Role and status metadata attached one-to-one to an account.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub user_id: i32,
    /// Free text, e.g. "Customer", "Rider" or "Admin".
    pub role: Option<String>,
    /// Free text, starts as [`crate::status::DEFAULT_PROFILE_STATUS`].
    pub status: String,
    /// Media key of the uploaded picture.
    pub profile_picture: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Model {
    pub fn is_rider(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.trim().eq_ignore_ascii_case("rider"))
    }
}

impl ActiveModelBehavior for ActiveModel {}
