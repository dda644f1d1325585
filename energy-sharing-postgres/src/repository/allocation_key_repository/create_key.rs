use energy_sharing_db::models::allocation_key::{AllocationKeyModel, ConsumerModel, IterationModel};
use std::error::Error;

use super::repo_impl::AllocationKeyRepositoryImpl;

impl AllocationKeyRepositoryImpl {
    pub(super) async fn create_key_impl(
        repo: &AllocationKeyRepositoryImpl,
        key: &AllocationKeyModel,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        sqlx::query(
            r#"
            INSERT INTO allocation_key (id, community_id, name, description)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(key.id)
        .bind(key.community_id)
        .bind(key.name.as_str())
        .bind(key.description.as_deref())
        .execute(&mut **transaction)
        .await?;

        Ok(())
    }

    pub(super) async fn create_children_impl(
        repo: &AllocationKeyRepositoryImpl,
        iterations: &[IterationModel],
        consumers: &[ConsumerModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if iterations.is_empty() && consumers.is_empty() {
            return Ok(());
        }

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        // Iterations first: consumers reference them
        for iteration in iterations {
            sqlx::query(
                r#"
                INSERT INTO allocation_key_iteration (id, allocation_key_id, number, energy_allocated_percentage)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(iteration.id)
            .bind(iteration.allocation_key_id)
            .bind(iteration.number)
            .bind(iteration.energy_allocated_percentage)
            .execute(&mut **transaction)
            .await?;
        }

        for consumer in consumers {
            sqlx::query(
                r#"
                INSERT INTO allocation_key_consumer (id, iteration_id, member_id, position, energy_allocated_percentage)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(consumer.id)
            .bind(consumer.iteration_id)
            .bind(consumer.member_id)
            .bind(consumer.position)
            .bind(consumer.energy_allocated_percentage)
            .execute(&mut **transaction)
            .await?;
        }

        Ok(())
    }
}
