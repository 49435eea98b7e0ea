mod entry;
mod scope;

pub(crate) use self::entry::ChildRow;
pub(crate) use self::scope::ScopeRow;
