use std::sync::Mutex;

use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

/// `(name, active)` of every person as seen by the delete hook.
pub static DELETED: Mutex<Vec<(String, bool)>> = Mutex::new(Vec::new());

pub fn deleted_snapshot(name: &str) -> Option<bool> {
    DELETED
        .lock()
        .unwrap()
        .iter()
        .find(|(deleted, _)| deleted == name)
        .map(|(_, active)| *active)
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "people")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: Option<String>,
    pub active: bool,
    pub is_admin: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            email: None,
            active: true,
            is_admin: false,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_delete<C>(self, _db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let name = self.name.clone().unwrap();
        let active = self.active.clone().unwrap();
        DELETED.lock().unwrap().push((name, active));
        Ok(self)
    }
}
