use super::user;
use sea_orm::entity::prelude::*;

/// The messaging channel between two accounts.
///
/// A pair is always stored as `(min id, max id)`, and the table carries a
/// unique index on the two columns, so every unordered pair maps to exactly
/// one room.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_rooms")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user1_id: i32,
    pub user2_id: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::User1Id",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User1,
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::User2Id",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User2,
    #[sea_orm(has_many = "super::message::Entity")]
    Message,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Message.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order a pair of account ids the way rooms are stored.
pub fn canonical_pair(a: i32, b: i32) -> (i32, i32) {
    (a.min(b), a.max(b))
}

impl Model {
    pub fn has_member(&self, user_id: i32) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The other member of the room, or `None` if `user_id` is not a member.
    pub fn counterpart_of(&self, user_id: i32) -> Option<i32> {
        if self.user1_id == user_id {
            Some(self.user2_id)
        } else if self.user2_id == user_id {
            Some(self.user1_id)
        } else {
            None
        }
    }
}
