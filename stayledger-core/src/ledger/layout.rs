/// Layout descriptor of a property's ledger sheet.
///
/// Owners hand over their spreadsheets as-is, so column positions vary per
/// property. The descriptor names the aggregate columns, the label column
/// the year/month lookup scans, and the column span of the append-only
/// per-booking detail block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerLayout {
    /// Column holding year and month labels
    pub label_column: &'static str,

    /// Column of the aggregate revenue cell
    pub revenue_column: &'static str,

    /// Column of the cleaning-fee total cell
    pub cleaning_column: &'static str,

    /// Column of the expenses total cell
    pub expenses_column: &'static str,

    /// First column of the detail block
    pub detail_start_column: &'static str,

    /// Last column of the detail block
    pub detail_end_column: &'static str,

    /// How many rows the label scan and detail block cover
    pub scan_rows: u32,
}

const DEFAULT_LAYOUT: LedgerLayout = LedgerLayout {
    label_column: "A",
    revenue_column: "B",
    cleaning_column: "C",
    expenses_column: "D",
    detail_start_column: "F",
    detail_end_column: "M",
    scan_rows: 300,
};

// Legacy sheets that predate the standard template.
const CASA_MIRADOURO: LedgerLayout = LedgerLayout {
    label_column: "A",
    revenue_column: "C",
    cleaning_column: "D",
    expenses_column: "E",
    detail_start_column: "G",
    detail_end_column: "N",
    scan_rows: 300,
};

const VILLA_AURORA: LedgerLayout = LedgerLayout {
    label_column: "B",
    revenue_column: "D",
    cleaning_column: "E",
    expenses_column: "F",
    detail_start_column: "H",
    detail_end_column: "O",
    scan_rows: 400,
};

impl LedgerLayout {
    /// The layout for a property, by name, falling back to the standard
    /// template.
    pub fn for_property(name: &str) -> &'static LedgerLayout {
        match name {
            "Casa Miradouro" => &CASA_MIRADOURO,
            "Villa Aurora" => &VILLA_AURORA,
            _ => &DEFAULT_LAYOUT,
        }
    }

    /// A1-style range the year/month lookup scans.
    pub fn label_range(&self) -> String {
        format!("{}1:{}{}", self.label_column, self.label_column, self.scan_rows)
    }

    /// A1-style range of the detail block.
    pub fn detail_range(&self) -> String {
        format!(
            "{}2:{}{}",
            self.detail_start_column, self.detail_end_column, self.scan_rows
        )
    }

    /// A single cell address in the given column.
    pub fn cell(&self, column: &str, row: u32) -> String {
        format!("{}{}", column, row)
    }
}
