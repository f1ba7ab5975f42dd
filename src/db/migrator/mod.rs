use sea_orm_migration::prelude::*;

mod m20241001_create_content;
mod m20241002_create_users;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20241001_create_content::Migration),
            Box::new(m20241002_create_users::Migration),
        ]
    }
}
