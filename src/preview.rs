use anyhow::Result;
use log::info;

use crate::{cli::PreviewArgs, load_table, table};

pub fn execute(args: &PreviewArgs) -> Result<()> {
    let table = load_table(&args.input)?;
    print!("{}", table::render_preview(&table, args.rows));
    info!(
        "Displayed {} of {} row(s) from {:?}",
        table.row_count.min(args.rows),
        table.row_count,
        args.input.input
    );
    Ok(())
}
