use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How registry commands reach their handlers.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DispatchMode {
    /// Handlers run on the single drain thread, one job at a time.
    #[default]
    Queued,
    /// Handlers run on the connection thread. Only sound when every
    /// registered handler is safe to call concurrently.
    Direct,
}
