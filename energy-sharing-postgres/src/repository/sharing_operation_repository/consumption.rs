use chrono::{DateTime, Utc};
use energy_sharing_db::models::sharing_operation::SharingOpConsumptionModel;
use std::error::Error;
use uuid::Uuid;

use super::repo_impl::SharingOperationRepositoryImpl;
use crate::utils::TryFromRow;

impl SharingOperationRepositoryImpl {
    pub(super) async fn add_consumptions_impl(
        repo: &SharingOperationRepositoryImpl,
        consumptions: &[SharingOpConsumptionModel],
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if consumptions.is_empty() {
            return Ok(());
        }

        let mut tx = repo.executor.tx.lock().await;
        let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;

        for item in consumptions {
            sqlx::query(
                r#"
                INSERT INTO sharing_operation_consumption
                (id, sharing_operation_id, ean, member_id, period_start, period_end, allocated_quantity, computed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id)
            .bind(item.sharing_operation_id)
            .bind(item.ean.as_str())
            .bind(item.member_id)
            .bind(item.period_start)
            .bind(item.period_end)
            .bind(item.allocated_quantity)
            .bind(item.computed_at)
            .execute(&mut **transaction)
            .await?;
        }

        Ok(())
    }

    pub(super) async fn get_consumption_impl(
        repo: &SharingOperationRepositoryImpl,
        sharing_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<SharingOpConsumptionModel>, Box<dyn Error + Send + Sync>> {
        let rows = {
            let mut tx = repo.executor.tx.lock().await;
            let transaction = tx.as_mut().ok_or("Transaction has been consumed")?;
            sqlx::query(
                r#"
                SELECT * FROM sharing_operation_consumption
                WHERE sharing_operation_id = $1 AND period_start < $3 AND period_end > $2
                ORDER BY period_start, ean, member_id
                "#,
            )
            .bind(sharing_id)
            .bind(from)
            .bind(to)
            .fetch_all(&mut **transaction)
            .await?
        };

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(SharingOpConsumptionModel::try_from_row(&row)?);
        }
        Ok(items)
    }
}
