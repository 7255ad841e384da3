//! Multi-sheet workbook streamed with options taken from the environment

use sheetstream::{StreamFileBuilder, StreamOptions};
use std::fs::File;
use std::io::BufWriter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Creating multi-sheet workbook...\n");

    let options = StreamOptions::from_env().creator("sheetstream demo");
    let sink = BufWriter::new(File::create("demos/multi_sheet.xlsx")?);
    let mut builder = StreamFileBuilder::with_options(sink, options);

    builder.add_shared_strings(["Engineering", "Sales", "Marketing"])?;
    builder.add_sheet("Sales", &["Month", "Revenue", "Costs", "Profit"])?;
    builder.add_sheet("Employees", &["ID", "Name", "Department", "Salary"])?;
    builder.add_sheet("Products", &["SKU", "Name", "Price", "Stock"])?;

    let mut file = builder.build()?;

    println!("Writing Sales sheet...");
    file.write_all([
        ["January", "50000", "30000", "20000"],
        ["February", "55000", "32000", "23000"],
        ["March", "60000", "35000", "25000"],
    ])?;

    println!("Writing Employees sheet...");
    file.next_sheet()?;
    for i in 1..=1000 {
        let department = match i % 3 {
            0 => "Engineering",
            1 => "Sales",
            _ => "Marketing",
        };
        file.write(&[
            i.to_string(),
            format!("Employee {}", i),
            department.to_string(),
            (50000 + i * 10).to_string(),
        ])?;
    }

    // Products is left for close(), which writes it with its header only
    println!("Skipping Products sheet...");
    file.close()?;

    println!("\nMulti-sheet workbook created successfully!");
    println!("File: demos/multi_sheet.xlsx");

    Ok(())
}
