//! Status helper enums mapping to SMALLSERIAL/SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table. The transition rules
//! over these IDs live in `herald_core::state`.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Campaign lifecycle status.
    CampaignStatus {
        Draft = 1,
        Preview = 2,
        Scheduled = 3,
        Sending = 4,
        Done = 5,
        Cancelled = 6,
    }
}

define_status_enum! {
    /// Target delivery status. `Sending` is the transient in-flight claim.
    TargetStatus {
        Pending = 1,
        Rendered = 2,
        Sending = 3,
        Sent = 4,
        Failed = 5,
        Skipped = 6,
    }
}
