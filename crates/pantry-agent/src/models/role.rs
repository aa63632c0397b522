use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// The participant a message belongs to
pub enum Role {
    User,
    Assistant,
    Tool,
}
