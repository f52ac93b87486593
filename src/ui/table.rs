use crate::construct::ConstructKind;
use crate::schema::TreeStats;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

#[derive(Tabled)]
pub struct ModuleRow {
    #[tabled(rename = "Module")]
    pub module: String,
    #[tabled(rename = "Nodes")]
    pub nodes: usize,
    #[tabled(rename = "Depth")]
    pub depth: usize,
    #[tabled(rename = "Containers")]
    pub containers: usize,
    #[tabled(rename = "Leaves")]
    pub leaves: usize,
    #[tabled(rename = "Copied")]
    pub copied: usize,
}

impl ModuleRow {
    pub fn new(module: &str, stats: &TreeStats) -> Self {
        Self {
            module: module.to_string(),
            nodes: stats.nodes,
            depth: stats.max_depth,
            containers: stats.count(ConstructKind::Container) + stats.count(ConstructKind::List),
            leaves: stats.count(ConstructKind::Leaf) + stats.count(ConstructKind::LeafList),
            copied: stats.cloned,
        }
    }
}

/// One row per module with its shape statistics
pub fn module_table(stats: &[(String, TreeStats)]) -> String {
    if stats.is_empty() {
        return String::new();
    }
    let rows: Vec<ModuleRow> = stats.iter().map(|(name, s)| ModuleRow::new(name, s)).collect();
    Table::new(&rows).with(Style::rounded()).to_string()
}
