use serde::{Deserialize, Serialize};
use uuid::Uuid;

// テーブルごとの ID を型レベルで区別するための newtype 群。
// sqlx には transparent として渡すので、バインド時はそのまま使える。
macro_rules! define_id {
    ($id_name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
        )]
        #[serde(transparent)]
        #[sqlx(transparent)]
        pub struct $id_name(Uuid);

        impl $id_name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn raw(self) -> Uuid {
                self.0
            }
        }

        impl Default for $id_name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $id_name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $id_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $id_name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

define_id!(SlotId);
define_id!(BookingId);
define_id!(EarningId);
define_id!(UserId);
