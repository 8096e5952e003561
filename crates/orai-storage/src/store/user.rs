use anyhow::Result;
use chrono::Utc;
use orai_common::types::User;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};

use crate::entities::user::{self, Entity};
use crate::store::AlertStore;

fn to_user(m: user::Model) -> User {
    User {
        id: m.id,
        username: m.username,
        email: m.email,
        password_hash: m.password_hash,
        created_at: m.created_at.with_timezone(&Utc),
        updated_at: m.updated_at.with_timezone(&Utc),
    }
}

impl AlertStore {
    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>> {
        let model = Entity::find_by_id(user_id).one(self.db()).await?;
        Ok(model.map(to_user))
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<String> {
        let id = orai_common::id::next_id();
        let now = Utc::now().fixed_offset();
        let am = user::ActiveModel {
            id: Set(id.clone()),
            username: Set(username.to_owned()),
            email: Set(email.to_owned()),
            password_hash: Set(password_hash.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        am.insert(self.db()).await?;
        Ok(id)
    }
}
