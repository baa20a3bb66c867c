use std::fmt;

/// Identifies one shard of an index, the usual owner of a directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardId {
    pub index: String,
    pub index_uuid: String,
    pub id: u32,
}

impl ShardId {
    pub fn new(index: impl Into<String>, index_uuid: impl Into<String>, id: u32) -> Self {
        Self {
            index: index.into(),
            index_uuid: index_uuid.into(),
            id,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.index, self.id)
    }
}
