use async_trait::async_trait;
use derive_new::new;
use kernel::model::{
    id::SlotId,
    slot::{
        event::{CreateSlot, RelistSlot, UpdateSlot, UpdateSlotStatus},
        validate_rates, Slot, SlotListOptions, SlotStatus,
    },
};
use kernel::repository::slot::SlotRepository;
use shared::error::{AppError, AppResult};

use crate::database::{model::slot::SlotRow, ConnectionPool};

#[derive(new)]
pub struct SlotRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl SlotRepository for SlotRepositoryImpl {
    async fn create(&self, event: CreateSlot) -> AppResult<SlotId> {
        event.validate()?;

        let slot_id = SlotId::new();
        let res = sqlx::query(
            r#"
                INSERT INTO slots
                (slot_id, community_code, name, address, description,
                owner_id, kind, shareable, status, hourly_rate, daily_rate,
                available_from, available_until)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'available', $9, $10, $11, $12)
            "#,
        )
        .bind(slot_id)
        .bind(&event.community_code)
        .bind(&event.name)
        .bind(&event.address)
        .bind(&event.description)
        .bind(event.owner_id)
        .bind(event.kind.as_ref())
        .bind(event.shareable)
        .bind(event.hourly_rate)
        .bind(event.daily_rate)
        .bind(event.available_from)
        .bind(event.available_until)
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been created".into(),
            ));
        }

        Ok(slot_id)
    }

    async fn find_available(&self, options: SlotListOptions) -> AppResult<Vec<Slot>> {
        // 一覧を返す前に公開期間切れを掃除しておく（冪等なので何度走ってもよい）
        self.expire_stale().await?;

        let rows: Vec<SlotRow> = sqlx::query_as(
            r#"
                SELECT
                    slot_id, community_code, name, address, description,
                    owner_id, kind, shareable, status, hourly_rate, daily_rate,
                    available_from, available_until
                FROM slots
                WHERE community_code = $1
                  AND status = 'available'
                  AND ($2::text IS NULL OR kind = $2)
                ORDER BY created_at DESC
                LIMIT $3 OFFSET $4
            "#,
        )
        .bind(&options.community_code)
        .bind(options.kind.map(|k| k.as_ref().to_string()))
        .bind(options.limit)
        .bind(options.offset)
        .fetch_all(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        rows.into_iter().map(Slot::try_from).collect()
    }

    async fn find_by_id(&self, slot_id: SlotId) -> AppResult<Option<Slot>> {
        let row: Option<SlotRow> = sqlx::query_as(
            r#"
                SELECT
                    slot_id, community_code, name, address, description,
                    owner_id, kind, shareable, status, hourly_rate, daily_rate,
                    available_from, available_until
                FROM slots
                WHERE slot_id = $1
            "#,
        )
        .bind(slot_id)
        .fetch_optional(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.map(Slot::try_from).transpose()
    }

    // メタデータの編集は last-writer-wins。予約作成のような分離は不要。
    async fn update(&self, event: UpdateSlot) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let slot = self.find_for_update(&mut tx, event.slot_id).await?;
        if !slot.can_modify(event.requested_by, event.role) {
            return Err(AppError::ForbiddenOperation(format!(
                "スロット（{}）を編集する権限がありません。",
                event.slot_id
            )));
        }

        // 更新後の料金もスロットとして成立していること
        validate_rates(
            event.hourly_rate.or(slot.hourly_rate),
            event.daily_rate.or(slot.daily_rate),
        )?;

        let res = sqlx::query(
            r#"
                UPDATE slots
                SET
                    name = COALESCE($2, name),
                    address = COALESCE($3, address),
                    description = COALESCE($4, description),
                    shareable = COALESCE($5, shareable),
                    hourly_rate = COALESCE($6, hourly_rate),
                    daily_rate = COALESCE($7, daily_rate),
                    updated_at = now()
                WHERE slot_id = $1
            "#,
        )
        .bind(event.slot_id)
        .bind(event.name)
        .bind(event.address)
        .bind(event.description)
        .bind(event.shareable)
        .bind(event.hourly_rate)
        .bind(event.daily_rate)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(())
    }

    // ステータス変更の記録のみを行う。予約側への影響はここでは扱わない。
    async fn update_status(&self, event: UpdateSlotStatus) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let slot = self.find_for_update(&mut tx, event.slot_id).await?;
        if !slot.can_modify(event.requested_by, event.role) {
            return Err(AppError::ForbiddenOperation(format!(
                "スロット（{}）のステータスを変更する権限がありません。",
                event.slot_id
            )));
        }

        let res = sqlx::query(
            r#"
                UPDATE slots
                SET status = $2, updated_at = now()
                WHERE slot_id = $1
            "#,
        )
        .bind(event.slot_id)
        .bind(event.status.as_ref())
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been updated".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(())
    }

    // 期限切れスロットの再掲載。expired からのみ、新しい公開期間とともに
    // available へ戻す。期限切れの黙示的な復活は行わない。
    async fn relist(&self, event: RelistSlot) -> AppResult<()> {
        event.validate()?;

        let mut tx = self.db.begin().await?;

        let slot = self.find_for_update(&mut tx, event.slot_id).await?;
        if !slot.can_modify(event.requested_by, event.role) {
            return Err(AppError::ForbiddenOperation(format!(
                "スロット（{}）を再掲載する権限がありません。",
                event.slot_id
            )));
        }
        if slot.status != SlotStatus::Expired {
            return Err(AppError::UnprocessableEntity(format!(
                "スロット（{}）は期限切れではないため再掲載できません（status = {}）。",
                event.slot_id,
                slot.status.as_ref()
            )));
        }

        let res = sqlx::query(
            r#"
                UPDATE slots
                SET
                    status = 'available',
                    available_from = $2,
                    available_until = $3,
                    updated_at = now()
                WHERE slot_id = $1
            "#,
        )
        .bind(event.slot_id)
        .bind(event.available_from)
        .bind(event.available_until)
        .execute(&mut *tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        if res.rows_affected() < 1 {
            return Err(AppError::NoRowsAffectedError(
                "No slot record has been relisted".into(),
            ));
        }

        tx.commit().await.map_err(AppError::TransactionError)?;

        Ok(())
    }

    // 公開期間の過ぎた available スロットだけを expired に落とす。
    // taken / maintenance や公開期間のないスロットには触れない。
    // 単一の UPDATE なので並行実行しても結果は変わらない。
    async fn expire_stale(&self) -> AppResult<u64> {
        let res = sqlx::query(
            r#"
                UPDATE slots
                SET status = 'expired', updated_at = now()
                WHERE status = 'available'
                  AND available_until IS NOT NULL
                  AND available_until < now()
            "#,
        )
        .execute(self.db.inner_ref())
        .await
        .map_err(AppError::SpecificOperationError)?;

        Ok(res.rows_affected())
    }
}

impl SlotRepositoryImpl {
    async fn find_for_update(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        slot_id: SlotId,
    ) -> AppResult<Slot> {
        let row: Option<SlotRow> = sqlx::query_as(
            r#"
                SELECT
                    slot_id, community_code, name, address, description,
                    owner_id, kind, shareable, status, hourly_rate, daily_rate,
                    available_from, available_until
                FROM slots
                WHERE slot_id = $1
                FOR UPDATE
            "#,
        )
        .bind(slot_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::SpecificOperationError)?;

        row.ok_or_else(|| {
            AppError::EntityNotFound(format!("スロット（{}）が見つかりませんでした。", slot_id))
        })?
        .try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kernel::model::{id::UserId, role::Role, slot::SlotKind};
    use rust_decimal_macros::dec;

    fn listed_slot(owner_id: Option<UserId>, until_in_hours: i64) -> CreateSlot {
        let now = Utc::now();
        CreateSlot::new(
            "maple-court".into(),
            "B1-12".into(),
            "1-2-3 Sakura-dori".into(),
            "機械式・ハイルーフ不可".into(),
            owner_id,
            SlotKind::Resident,
            false,
            Some(dec!(10)),
            Some(dec!(150)),
            Some(now - Duration::hours(1)),
            Some(now + Duration::hours(until_in_hours)),
        )
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_register_and_list_slot(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));

        let slot_id = repo.create(listed_slot(None, 24)).await?;

        let listed = repo
            .find_available(SlotListOptions {
                community_code: "maple-court".into(),
                kind: None,
                limit: 20,
                offset: 0,
            })
            .await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].slot_id, slot_id);
        assert_eq!(listed[0].status, SlotStatus::Available);

        // 別コミュニティからは見えない
        let other = repo
            .find_available(SlotListOptions {
                community_code: "elm-heights".into(),
                kind: None,
                limit: 20,
                offset: 0,
            })
            .await?;
        assert!(other.is_empty());

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_create_rejects_rateless_slot(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool));

        let mut event = listed_slot(None, 24);
        event.hourly_rate = None;
        event.daily_rate = None;
        assert!(matches!(
            repo.create(event).await,
            Err(AppError::UnprocessableEntity(_))
        ));

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expire_stale_is_idempotent(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));

        let stale_id = repo.create(listed_slot(None, 24)).await?;
        let fresh_id = repo.create(listed_slot(None, 48)).await?;

        // 片方だけ公開期間を過去にする
        sqlx::query("UPDATE slots SET available_until = now() - interval '1 hour' WHERE slot_id = $1")
            .bind(stale_id)
            .execute(&pool)
            .await?;

        assert_eq!(repo.expire_stale().await?, 1);
        // 2回目は何も起きない
        assert_eq!(repo.expire_stale().await?, 0);

        let stale = repo.find_by_id(stale_id).await?.unwrap();
        assert_eq!(stale.status, SlotStatus::Expired);
        let fresh = repo.find_by_id(fresh_id).await?.unwrap();
        assert_eq!(fresh.status, SlotStatus::Available);

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_expire_stale_leaves_taken_and_maintenance(
        pool: sqlx::PgPool,
    ) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));

        let taken_id = repo.create(listed_slot(None, 24)).await?;
        let maintenance_id = repo.create(listed_slot(None, 24)).await?;
        sqlx::query(
            "UPDATE slots SET status = 'taken', available_until = now() - interval '1 hour' WHERE slot_id = $1",
        )
        .bind(taken_id)
        .execute(&pool)
        .await?;
        sqlx::query(
            "UPDATE slots SET status = 'maintenance', available_until = now() - interval '1 hour' WHERE slot_id = $1",
        )
        .bind(maintenance_id)
        .execute(&pool)
        .await?;

        assert_eq!(repo.expire_stale().await?, 0);
        assert_eq!(
            repo.find_by_id(taken_id).await?.unwrap().status,
            SlotStatus::Taken
        );
        assert_eq!(
            repo.find_by_id(maintenance_id).await?.unwrap().status,
            SlotStatus::Maintenance
        );

        Ok(())
    }

    #[sqlx::test(migrations = "../migrations")]
    async fn test_relist_requires_expired_status(pool: sqlx::PgPool) -> anyhow::Result<()> {
        let repo = SlotRepositoryImpl::new(ConnectionPool::new(pool.clone()));
        let owner = UserId::new();

        let slot_id = repo.create(listed_slot(Some(owner), 24)).await?;
        let now = Utc::now();
        let relist = |by: UserId, role: Role| {
            RelistSlot::new(
                slot_id,
                by,
                role,
                now,
                now + Duration::days(7),
            )
        };

        // まだ available なので再掲載できない
        assert!(matches!(
            repo.relist(relist(owner, Role::Member)).await,
            Err(AppError::UnprocessableEntity(_))
        ));

        sqlx::query("UPDATE slots SET status = 'expired' WHERE slot_id = $1")
            .bind(slot_id)
            .execute(&pool)
            .await?;

        // 所有者以外は不可
        assert!(matches!(
            repo.relist(relist(UserId::new(), Role::Member)).await,
            Err(AppError::ForbiddenOperation(_))
        ));

        repo.relist(relist(owner, Role::Member)).await?;
        let slot = repo.find_by_id(slot_id).await?.unwrap();
        assert_eq!(slot.status, SlotStatus::Available);

        Ok(())
    }
}
