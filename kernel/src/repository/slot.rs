use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{
    id::SlotId,
    slot::{
        event::{CreateSlot, RelistSlot, UpdateSlot, UpdateSlotStatus},
        Slot, SlotListOptions,
    },
};

#[async_trait]
pub trait SlotRepository: Send + Sync {
    // スロットを新規登録する
    async fn create(&self, event: CreateSlot) -> AppResult<SlotId>;
    // コミュニティ内の予約可能なスロット一覧を取得する
    async fn find_available(&self, options: SlotListOptions) -> AppResult<Vec<Slot>>;
    async fn find_by_id(&self, slot_id: SlotId) -> AppResult<Option<Slot>>;
    // メタデータの更新（last-writer-wins）
    async fn update(&self, event: UpdateSlot) -> AppResult<()>;
    async fn update_status(&self, event: UpdateSlotStatus) -> AppResult<()>;
    // 期限切れスロットを新しい公開期間で再掲載する
    async fn relist(&self, event: RelistSlot) -> AppResult<()>;
    // 公開期間の過ぎた available スロットを expired に落とし、件数を返す
    async fn expire_stale(&self) -> AppResult<u64>;
}
