pub use sea_orm_migration::prelude::*;

mod m20251201_000001_create_subscriptions;
mod m20251201_000002_create_signals;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251201_000001_create_subscriptions::Migration),
            Box::new(m20251201_000002_create_signals::Migration),
        ]
    }
}
