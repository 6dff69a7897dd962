use clap::ValueEnum;
use entity_enrich::InsertPosition;

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum InsertPositionFlag {
    Before,
    After,
}

impl InsertPositionFlag {
    pub(crate) const fn as_domain(self) -> InsertPosition {
        match self {
            InsertPositionFlag::Before => InsertPosition::Before,
            InsertPositionFlag::After => InsertPosition::After,
        }
    }
}
