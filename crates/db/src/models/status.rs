//! Status enums mapping to SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed rows of the corresponding
//! `*_statuses` table.

use serde::Serialize;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lowercase name, as seeded in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            /// Map a database ID back to the enum.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Lifecycle of a generation request.
    GenerationStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Lifecycle of a durable queue entry.
    QueueJobStatus {
        Queued = 1 => "queued",
        Active = 2 => "active",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl GenerationStatus {
    /// `completed` and `failed` never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, GenerationStatus::Completed | GenerationStatus::Failed)
    }

    /// Whether moving from `self` to `next` keeps status monotonic.
    ///
    /// `processing -> processing` is allowed so a redelivered job can claim
    /// a request left behind by an earlier attempt.
    ///
    /// `pending -> failed` skips `processing`. It is only taken when the
    /// dispatcher persisted a request but could not enqueue it, so no worker
    /// will ever pick it up.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Statuses from which a transition to `self` is allowed.
    pub fn allowed_predecessors(self) -> Vec<StatusId> {
        [
            GenerationStatus::Pending,
            GenerationStatus::Processing,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ]
        .into_iter()
        .filter(|from| from.can_transition_to(self))
        .map(GenerationStatus::id)
        .collect()
    }
}
