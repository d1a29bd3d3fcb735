use std::fs::File;
use std::io::Error;
use std::path::Path;

pub fn write_investors_csv(path: &Path, rows: &[(u64, bool, bool, &str)]) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["investor", "onboarded", "sanctioned", "minimum_usd"])?;
    for (investor, onboarded, sanctioned, minimum) in rows {
        wtr.write_record([
            investor.to_string(),
            onboarded.to_string(),
            sanctioned.to_string(),
            minimum.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_allocations_csv(
    path: &Path,
    rows: &[(Option<u64>, Option<&str>, &str, &str, &str)],
) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["investor", "entity", "shares", "gross_usd", "qualified_usd"])?;
    for (investor, entity, shares, gross, qualified) in rows {
        wtr.write_record([
            investor.map(|id| id.to_string()).unwrap_or_default(),
            entity.unwrap_or_default().to_string(),
            shares.to_string(),
            gross.to_string(),
            qualified.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
