use crate::error::{Error, ErrorKind};
use sharefind_storage::ChildEntry;

#[derive(sqlx::FromRow)]
pub(crate) struct ChildRow {
    pub(crate) entry_name: String,
    pub(crate) is_directory: i64,
}
impl TryFrom<ChildRow> for ChildEntry {
    type Error = Error;
    fn try_from(row: ChildRow) -> Result<Self, Self::Error> {
        let is_directory = match row.is_directory {
            0 => false,
            1 => true,
            _ => exn::bail!(ErrorKind::InvalidData("directory flag")),
        };
        Ok(Self { name: row.entry_name, is_directory })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Some(false))]
    #[case(1, Some(true))]
    #[case(2, None)]
    #[case(-1, None)]
    fn test_directory_flag(#[case] flag: i64, #[case] expected: Option<bool>) {
        let row = ChildRow { entry_name: "report.pdf".to_string(), is_directory: flag };
        let entry = ChildEntry::try_from(row).ok();
        assert_eq!(entry.map(|e| e.is_directory), expected);
    }
}
