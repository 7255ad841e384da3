//! Basic example of streaming an Excel file to disk

use sheetstream::StreamFileBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Register the sheet and its header row
    let mut builder = StreamFileBuilder::create("demos/output.xlsx")?;
    builder.add_sheet("People", &["ID", "Name", "Email", "Age", "Salary"])?;

    // Metadata is written here, the first sheet is ready for rows
    let mut file = builder.build()?;

    file.write(&["1", "Alice Johnson", "alice@example.com", "30", "75000"])?;
    file.write(&["2", "Bob Smith", "bob@example.com", "25", "65000"])?;
    file.write(&["3", "Carol White", "carol@example.com", "35", "85000"])?;
    file.write(&["4", "David Brown", "", "28", "70000"])?;

    // Finish the archive
    file.close()?;

    println!("Excel file created successfully: demos/output.xlsx");
    Ok(())
}
