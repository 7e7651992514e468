use tabled::{
    settings::{
        format::Format,
        object::{Columns, Rows},
        Alignment, Modify, Style, Width,
    },
    Table,
};

/// Widest a free-text column may grow before its cells wrap.
pub const TEXT_COLUMN_WIDTH: usize = 72;

/// Shared look of every table agicctl prints
pub struct TableTheme;

impl TableTheme {
    /// Rounded borders, uppercase headers, left aligned cells
    pub fn apply_default(mut table: Table) -> Table {
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Format::content(|s| s.to_uppercase())))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));
        table
    }

    /// Default theme with the last column wrapped, for tables that end in a message
    pub fn apply_messages(table: Table) -> Table {
        let mut table = Self::apply_default(table);
        table.with(
            Modify::new(Columns::last()).with(Width::wrap(TEXT_COLUMN_WIDTH)),
        );
        table
    }
}
