//! Buffering of consecutive table rows into a single table group.
//!
//! At most one group is open at a time; any non-table line (or end of
//! input) closes it. Separator rows are consumed without being stored.

/// Rows collected for one table. The first collected row is the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableGroup {
    pub header: Vec<String>,
    pub body: Vec<Vec<String>>,
}

/// Small state machine folded over the classified line sequence.
#[derive(Debug, Default)]
pub struct TableAccumulator {
    open: bool,
    rows: Vec<Vec<String>>,
}

impl TableAccumulator {
    /// Append a data row, opening a new group if none is open.
    pub fn push_row(&mut self, cells: Vec<String>) {
        self.open = true;
        self.rows.push(cells);
    }

    /// A markdown header separator keeps the group open but is not stored.
    pub fn push_separator(&mut self) {}

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Close the group and emit it. Emits nothing when zero non-separator
    /// rows were accumulated.
    pub fn flush(&mut self) -> Option<TableGroup> {
        if !self.open {
            return None;
        }
        self.open = false;
        let mut rows = std::mem::take(&mut self.rows);
        if rows.is_empty() {
            return None;
        }
        let header = rows.remove(0);
        Some(TableGroup { header, body: rows })
    }
}
